//! Progress logging while a stack is decoded up front

use avi_core::FrameTableEntry;
use std::time::Instant;

const MIB: f64 = 1024.0 * 1024.0;

/// Tracks frames and bytes decoded against the frame table.
///
/// Logs about ten times per stack: position in the video, read rate and
/// time remaining.
#[derive(Debug)]
pub struct DecodeProgress {
    total: usize,
    decoded: usize,
    bytes: u64,
    report_every: usize,
    start_time: Instant,
}

impl DecodeProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            decoded: 0,
            bytes: 0,
            report_every: (total / 10).max(1),
            start_time: Instant::now(),
        }
    }

    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// Frame data read so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Counts `entry` as decoded
    pub fn record(&mut self, entry: &FrameTableEntry) {
        self.decoded += 1;
        self.bytes += entry.byte_size as u64;
        if self.decoded % self.report_every == 0 || self.decoded == self.total {
            self.report(entry.timestamp_micros);
        }
    }

    fn report(&self, timestamp_micros: i64) {
        let elapsed = self.start_time.elapsed().as_secs_f64().max(f64::EPSILON);
        let rate = self.bytes as f64 / MIB / elapsed;
        let position = clock(timestamp_micros as f64 / 1e6);
        if self.decoded < self.total {
            let left = (self.total - self.decoded) as f64 * elapsed / self.decoded as f64;
            tracing::info!(
                "Decoded {}/{} frames (at {}), {:.1} MiB/s, {} left",
                self.decoded,
                self.total,
                position,
                rate,
                clock(left)
            );
        } else {
            tracing::info!(
                "Decoded {} frames up to {} in {}, {:.1} MiB/s",
                self.decoded,
                position,
                clock(elapsed),
                rate
            );
        }
    }
}

/// Formats seconds as `m:ss`, or `h:mm:ss` from one hour on
pub fn clock(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let (hours, mins, secs) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
