//! Naming of persisted frames.
//!
//! Frames are written as `frame_<sequence>.txt`. The sequence is zero-padded
//! to [`PAD_WIDTH`] digits for readability only; readers always order by the
//! parsed integer, so `frame_1000000.txt` sorts after `frame_999999.txt`.

use std::path::{Path, PathBuf};

pub const PREFIX: &str = "frame_";
pub const EXTENSION: &str = "txt";
pub const PAD_WIDTH: usize = 6;

/// A persisted frame located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameArtifact {
    pub sequence: u64,
    pub path: PathBuf,
}

impl FrameArtifact {
    /// Recognise a frame file by name; anything else yields `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        parse_sequence(name).map(|sequence| Self {
            sequence,
            path: path.to_path_buf(),
        })
    }
}

pub fn file_name(sequence: u64) -> String {
    format!("{PREFIX}{sequence:0width$}.{EXTENSION}", width = PAD_WIDTH)
}

pub fn artifact_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(file_name(sequence))
}

/// Sequence number embedded in a frame file name.
pub fn parse_sequence(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(PREFIX)?
        .strip_suffix(EXTENSION)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
