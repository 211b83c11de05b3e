//! AVI CLI Tool
//!
//! Command-line interface for inspecting AVI files and extracting their frames.

use anyhow::{Context, Result};
use avi_core::{AviInfo, AviParser};
use avi_decoder::{open, AviStack, OpenOptions};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "avi")]
#[command(about = "Reads uncompressed, YUV and MJPEG video from AVI files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stream information and how the frames were indexed
    Info {
        /// Input AVI file path
        input: PathBuf,

        /// Print the information as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode frames to PNG images
    Extract {
        /// Input AVI file path
        input: PathBuf,

        /// Output directory for the frames
        #[arg(short, long)]
        output: PathBuf,

        /// First frame to read (1-based)
        #[arg(long, default_value = "1")]
        first: u64,

        /// Last frame to read; 0 reads to the end, negative counts back from it
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        last: i64,

        /// Convert color frames to 8-bit grayscale
        #[arg(long)]
        gray: bool,

        /// Flip frames vertically
        #[arg(long)]
        flip: bool,

        /// Decode each frame only when it is written
        #[arg(long = "virtual")]
        virtual_stack: bool,

        /// Extract a single frame, counted from 1 within the selected range
        #[arg(long)]
        frame: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("avi_core=info".parse()?)
                .add_directive("avi_decoder=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input, json } => show_info(&input, json)?,

        Commands::Extract {
            input,
            output,
            first,
            last,
            gray,
            flip,
            virtual_stack,
            frame,
        } => {
            let options = OpenOptions {
                first_frame: first,
                last_frame: last,
                virtual_stack,
                convert_to_gray: gray,
                flip_vertical: flip,
                abort: None,
            };
            extract_frames(&input, &output, &options, frame)?
        }
    }

    Ok(())
}

fn show_info(input: &Path, json: bool) -> Result<()> {
    let file = File::open(input).context("Failed to open AVI file")?;
    let index = AviParser::default()
        .parse(BufReader::new(file))
        .context("Failed to read AVI file")?;
    let info = index.info();

    if json {
        let text = serde_json::to_string_pretty(&info).context("Failed to serialize info")?;
        println!("{}", text);
    } else {
        print_info(input, &info);
    }
    for message in &index.diagnostics {
        println!("Warning: {}", message);
    }
    Ok(())
}

fn print_info(input: &Path, info: &AviInfo) {
    println!("\n=== {} ===", input.display());
    println!("Resolution: {}x{}", info.width, info.height);
    println!("Compression: '{}', {} bits/pixel", info.compression, info.bits_per_pixel);
    match info.frames_per_second {
        Some(fps) => println!(
            "Frame rate: {:.3} fps ({} us/frame)",
            fps, info.microsec_per_frame
        ),
        None => println!("Frame rate: unknown"),
    }
    println!("Frames: {} indexed of {} total", info.frame_count, info.total_frames);
    println!("Index: {:?}", info.index_kind);
    if info.variable_length {
        println!("Frames are embedded JPEG/PNG images");
    }
}

fn extract_frames(
    input: &Path,
    output_dir: &Path,
    options: &OpenOptions,
    frame: Option<usize>,
) -> Result<()> {
    println!("Reading AVI file: {}", input.display());
    let stack = open(input, options).context("Failed to open AVI file")?;
    std::fs::create_dir_all(output_dir).context("Failed to create output directory")?;

    if let Some(number) = frame {
        let index = number
            .checked_sub(1)
            .filter(|&i| i < stack.len())
            .with_context(|| format!("Frame {} out of range 1..={}", number, stack.len()))?;
        let path = save_frame(&stack, index, output_dir)?;
        println!("Saved frame {} to {}", number, path.display());
    } else {
        println!("Extracting {} frames to {}", stack.len(), output_dir.display());
        let mut saved = 0;
        for i in 0..stack.len() {
            match save_frame(&stack, i, output_dir) {
                Ok(_) => saved += 1,
                Err(err) => tracing::warn!("Skipping frame {}: {:#}", i + 1, err),
            }
            if (i + 1) % 10 == 0 {
                println!("Extracted {} / {} frames", i + 1, stack.len());
            }
        }
        println!("Saved {} of {} frames", saved, stack.len());
    }

    if let Some(message) = stack.error_text() {
        println!("Warning: {}", message);
    }
    Ok(())
}

fn save_frame(stack: &AviStack, index: usize, output_dir: &Path) -> Result<PathBuf> {
    let raster = stack.get(index).context("Failed to decode frame")?;
    let image = raster
        .to_dynamic_image()
        .context("Frame has no image representation")?;
    let path = output_dir.join(format!("frame_{:06}.png", index + 1));
    image.save(&path).context("Failed to save frame")?;
    Ok(path)
}
