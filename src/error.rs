use std::io;
use std::path::PathBuf;

/// Errors surfaced by the conversion and streaming pipeline.
///
/// Mid-stream decode failures are not represented here: a transcode that
/// stops early still succeeds and carries a
/// [`DecodeInterruption`](crate::DecodeInterruption) in its report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("target width must be at least 1 column, got {0}")]
    InvalidWidth(u32),

    #[error("could not open video {}: {reason}", path.display())]
    OpenVideo { path: PathBuf, reason: String },

    #[error("video {} reports zero width or height", path.display())]
    EmptyDimensions { path: PathBuf },

    #[error("probing {} failed: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    #[error("writing frame {frame} to {} failed: {source}", path.display())]
    Destination {
        path: PathBuf,
        frame: u64,
        #[source]
        source: io::Error,
    },

    #[error("frame stream unavailable at {}: {source}", path.display())]
    StreamUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading frame artifact {} failed: {source}", path.display())]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("more than one artifact carries sequence number {sequence}")]
    DuplicateSequence { sequence: u64 },

    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    #[error("job directory {}: {source}", path.display())]
    JobDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("job manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
