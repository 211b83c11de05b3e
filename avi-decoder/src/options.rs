//! Options for opening an AVI file

use avi_core::FrameRange;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How an AVI file is opened and decoded
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// First frame to read, 1-based
    pub first_frame: u64,
    /// Last frame to read; 0 reads to the end, negative counts back from the end
    pub last_frame: i64,
    /// Decode frames on access instead of up front
    pub virtual_stack: bool,
    /// Produce 8-bit grayscale instead of RGB
    pub convert_to_gray: bool,
    pub flip_vertical: bool,
    /// Checked between frames while decoding eagerly
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            first_frame: 1,
            last_frame: 0,
            virtual_stack: false,
            convert_to_gray: false,
            flip_vertical: false,
            abort: None,
        }
    }
}

impl OpenOptions {
    pub fn frame_range(&self) -> FrameRange {
        FrameRange::new(self.first_frame, self.last_frame)
    }

    pub fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
