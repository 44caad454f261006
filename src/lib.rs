//! # asciivid - video to ASCII frame streams
//!
//! `asciivid` converts a video into a numbered set of fixed-width ASCII art
//! frames on disk and streams them back in order, each frame followed by
//! [`FRAME_SEPARATOR`].
//!
//! ## Features
//!
//! - Decode any container the local `ffmpeg` understands (PNG/JPEG stills
//!   count as one-frame videos)
//! - Fixed 10-glyph luminance ramp, aspect-corrected row count
//! - One directory per job, addressed by id
//! - Lazy, numerically ordered frame streams with bounded read-ahead
//! - Progress reporting for integration with UI applications
//!
//! ## Example
//!
//! ```no_run
//! use asciivid::{FrameSequencer, FrameTranscoder, JobStore};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transcoder = FrameTranscoder::new();
//! let store = JobStore::from_config(transcoder.config());
//!
//! let job = store.start_job()?;
//! let report = transcoder.transcode(Path::new("clip.mp4"), 100, &job)?;
//! if let Some(stop) = &report.interruption {
//!     eprintln!("decoding stopped at frame {}: {}", stop.frame_index, stop.reason);
//! }
//!
//! // Later, possibly from another process:
//! let job = store.open_job(job.id())?;
//! for chunk in FrameSequencer::stream_job(&job)? {
//!     print!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod artifact;
pub mod ascii;
pub mod config;
pub mod decode;
pub mod error;
pub mod job;
pub mod probe;
pub mod sequencer;
pub mod transcoder;

pub use artifact::FrameArtifact;
pub use ascii::{AsciiFrame, DEFAULT_COLUMNS, FONT_RATIO, RAMP};
pub use config::{load_config, AppConfig, FfmpegConfig};
pub use decode::{FfmpegSource, FrameSource, ImageSequence, RasterFrame, StillImageSource};
pub use error::{Error, Result};
pub use job::{JobHandle, JobManifest, JobStore};
pub use probe::{probe, VideoInfo};
pub use sequencer::{BufferedFrameStream, FrameSequencer, FrameStream, FRAME_SEPARATOR};
pub use transcoder::{DecodeInterruption, FrameTranscoder, TranscodeReport};

/// Represents the current phase of a transcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// Probing and opening the source
    Opening,
    /// Decoding and converting frames
    ConvertingFrames,
    /// All frames written
    Complete,
}

/// Progress information for transcode operations
///
/// This struct provides detailed progress information that can be used
/// to display progress in UI applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Current phase of the conversion
    pub phase: ProgressPhase,
    /// Number of frames completed in the current phase
    pub completed: usize,
    /// Total number of frames (0 if unknown)
    pub total: usize,
    /// Percentage complete (0.0 to 100.0)
    pub percentage: f64,
    /// Human-readable message describing current status
    pub message: String,
}

impl Progress {
    pub fn opening() -> Self {
        Self {
            phase: ProgressPhase::Opening,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: "Opening video...".to_string(),
        }
    }

    pub fn converting_frames(completed: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            phase: ProgressPhase::ConvertingFrames,
            completed,
            total,
            percentage,
            message: format!("Converting frame {} of {}", completed, total),
        }
    }

    pub fn complete(total_frames: usize) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            completed: total_frames,
            total: total_frames,
            percentage: 100.0,
            message: format!("Conversion complete: {} frames", total_frames),
        }
    }
}
