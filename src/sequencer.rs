//! Ordered, lazy retrieval of a job's frames.
//!
//! Artifacts are ordered by the integer parsed from their names, never by the
//! names themselves or by directory enumeration order. Each frame is read
//! from disk only when the consumer asks for it.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::JoinHandle;
use walkdir::WalkDir;

use crate::artifact::FrameArtifact;
use crate::error::{Error, Result};
use crate::job::JobHandle;

/// Marker emitted after every frame, including the last one.
pub const FRAME_SEPARATOR: &str = "<!--frame-separator-->";

/// Finds and orders the frames of a job.
pub struct FrameSequencer;

impl FrameSequencer {
    /// Open a lazy stream over the frames stored in `dir`.
    ///
    /// A missing or unreadable directory is [`Error::StreamUnavailable`]; a
    /// directory without frames gives an empty stream.
    pub fn stream_frames(dir: &Path) -> Result<FrameStream> {
        let artifacts = Self::discover(dir)?;
        log::debug!("streaming {} frames from {}", artifacts.len(), dir.display());
        Ok(FrameStream {
            pending: artifacts.into(),
            failed: false,
        })
    }

    pub fn stream_job(job: &JobHandle) -> Result<FrameStream> {
        Self::stream_frames(job.dir())
    }

    /// Frame artifacts in `dir`, ascending by sequence number.
    pub fn discover(dir: &Path) -> Result<Vec<FrameArtifact>> {
        let meta = fs::metadata(dir).map_err(|source| Error::StreamUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(Error::StreamUnavailable {
                path: dir.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let mut artifacts = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::StreamUnavailable {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match FrameArtifact::from_path(entry.path()) {
                Some(artifact) => artifacts.push(artifact),
                None => log::debug!("skipping {}", entry.path().display()),
            }
        }

        artifacts.sort_by_key(|a| a.sequence);
        let mut seen = HashSet::with_capacity(artifacts.len());
        for a in &artifacts {
            if !seen.insert(a.sequence) {
                return Err(Error::DuplicateSequence {
                    sequence: a.sequence,
                });
            }
        }
        Ok(artifacts)
    }
}

/// Pull-based stream of `frame text + FRAME_SEPARATOR` chunks.
///
/// Each call to `next` opens, reads and closes exactly one file, so dropping
/// the stream at any point leaves nothing open. After a read error the
/// stream ends.
#[derive(Debug)]
pub struct FrameStream {
    pending: VecDeque<FrameArtifact>,
    failed: bool,
}

impl FrameStream {
    /// Frames not yet yielded.
    pub fn len(&self) -> usize {
        if self.failed {
            0
        } else {
            self.pending.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the remaining stream into `out`, returning the number of frames
    /// written.
    pub fn write_to<W: Write>(self, out: &mut W) -> anyhow::Result<u64> {
        let mut frames = 0;
        for chunk in self {
            out.write_all(chunk?.as_bytes())?;
            frames += 1;
        }
        out.flush()?;
        Ok(frames)
    }

    /// Move reading onto a producer thread that stays at most `capacity`
    /// chunks ahead of the consumer.
    pub fn buffered(self, capacity: usize) -> BufferedFrameStream {
        let (tx, rx) = sync_channel(capacity);
        let producer = std::thread::spawn(move || {
            for chunk in self {
                if tx.send(chunk).is_err() {
                    // consumer hung up
                    break;
                }
            }
        });
        BufferedFrameStream {
            rx: Some(rx),
            producer: Some(producer),
        }
    }
}

impl Iterator for FrameStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let artifact = self.pending.pop_front()?;
        match fs::read_to_string(&artifact.path) {
            Ok(mut text) => {
                text.push_str(FRAME_SEPARATOR);
                Some(Ok(text))
            }
            Err(source) => {
                self.failed = true;
                Some(Err(Error::ReadArtifact {
                    path: artifact.path,
                    source,
                }))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.len()))
    }
}

/// A [`FrameStream`] read ahead on a background thread through a bounded
/// channel.
pub struct BufferedFrameStream {
    rx: Option<Receiver<Result<String>>>,
    producer: Option<JoinHandle<()>>,
}

impl Iterator for BufferedFrameStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.rx.as_ref()?.recv().ok();
        if item.is_none() {
            self.rx = None;
            if let Some(handle) = self.producer.take() {
                let _ = handle.join();
            }
        }
        item
    }
}

impl Drop for BufferedFrameStream {
    fn drop(&mut self) {
        // Closing the receiver makes the producer's next send fail.
        self.rx = None;
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
    }
}
