//! Frame sources.
//!
//! [`FfmpegSource`] pipes raw `rgb24` frames out of an `ffmpeg` child process.
//! [`StillImageSource`] treats a PNG/JPEG as a one-frame video and
//! [`ImageSequence`] wraps frames that are already in memory.

use image::RgbImage;
use std::collections::VecDeque;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use crate::config::FfmpegConfig;
use crate::error::{Error, Result};
use crate::probe::{probe, VideoInfo};

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    /// Position in the source, starting at 0
    pub index: u64,
    pub image: RgbImage,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("reading decoder output: {0}")]
    Io(#[from] io::Error),

    #[error("frame {index} truncated: got {got} of {expected} bytes")]
    Truncated {
        index: u64,
        got: usize,
        expected: usize,
    },

    #[error("decoder exited with {status}: {stderr}")]
    Process { status: ExitStatus, stderr: String },

    #[error("{0}")]
    Other(String),
}

/// A front-to-back supply of raster frames.
pub trait FrameSource {
    /// Original `(width, height)` of every frame.
    fn dimensions(&self) -> (u32, u32);

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RasterFrame>, DecodeError>;

    /// Expected number of frames, when the source knows it up front.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn next_frame(&mut self) -> Result<Option<RasterFrame>, DecodeError> {
        (**self).next_frame()
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (**self).frame_count_hint()
    }
}

/// Whether `path` should be decoded as a still image rather than a video.
pub fn is_image_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg")
    )
}

/// Open the right source for `path`.
pub fn open_source(path: &Path, ffmpeg: &FfmpegConfig) -> Result<Box<dyn FrameSource + Send>> {
    if is_image_path(path) {
        Ok(Box::new(StillImageSource::open(path)?))
    } else {
        Ok(Box::new(FfmpegSource::open(path, ffmpeg)?))
    }
}

/// Decodes a video by reading raw rgb24 frames from an ffmpeg pipe.
///
/// The child process is killed and reaped when the source is dropped.
pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    frame_size: usize,
    next_index: u64,
    finished: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path, ffmpeg: &FfmpegConfig) -> Result<Self> {
        let info = probe(path, ffmpeg)?;
        let frame_size = (info.width as usize)
            .checked_mul(info.height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| Error::OpenVideo {
                path: path.to_path_buf(),
                reason: format!("frame size {}x{} overflows", info.width, info.height),
            })?;

        let mut child = Command::new(ffmpeg.ffmpeg_cmd())
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map", "0:v:0", "-an", "-vsync", "passthrough", "-f", "rawvideo", "-pix_fmt",
                "rgb24", "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::OpenVideo {
                path: path.to_path_buf(),
                reason: format!("running {}: {e}", ffmpeg.ffmpeg_cmd()),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::OpenVideo {
            path: path.to_path_buf(),
            reason: "decoder stdout unavailable".to_string(),
        })?;
        // Drained on its own thread so a chatty decoder cannot block on a full pipe.
        let stderr = child.stderr.take().map(|mut err| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = err.read_to_string(&mut text);
                text
            })
        });

        log::debug!(
            "decoding {} ({}x{}, {} bytes per frame)",
            path.display(),
            info.width,
            info.height,
            frame_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout: BufReader::with_capacity(frame_size.clamp(8 * 1024, 8 * 1024 * 1024), stdout),
            stderr,
            frame_size,
            next_index: 0,
            finished: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn finish(&mut self) -> Result<(), DecodeError> {
        self.finished = true;
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(DecodeError::Process {
                status,
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

impl FrameSource for FfmpegSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.info.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<RasterFrame>, DecodeError> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_size];
        let got = read_full(&mut self.stdout, &mut buf)?;
        if got == 0 {
            self.finish()?;
            return Ok(None);
        }
        if got < self.frame_size {
            let _ = self.child.kill();
            self.finished = true;
            let _ = self.child.wait();
            return Err(DecodeError::Truncated {
                index: self.next_index,
                got,
                expected: self.frame_size,
            });
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .ok_or_else(|| DecodeError::Other("frame buffer size mismatch".to_string()))?;
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(RasterFrame { index, image }))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A PNG or JPEG treated as a video with exactly one frame.
pub struct StillImageSource {
    image: Option<RgbImage>,
    dims: (u32, u32),
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .map_err(|e| Error::OpenVideo {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_rgb8();
        let dims = image.dimensions();
        if dims.0 == 0 || dims.1 == 0 {
            return Err(Error::EmptyDimensions {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            image: Some(image),
            dims,
        })
    }
}

impl FrameSource for StillImageSource {
    fn dimensions(&self) -> (u32, u32) {
        self.dims
    }

    fn next_frame(&mut self) -> Result<Option<RasterFrame>, DecodeError> {
        Ok(self.image.take().map(|image| RasterFrame { index: 0, image }))
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(1)
    }
}

/// Frames already held in memory, all of the same size.
pub struct ImageSequence {
    dims: (u32, u32),
    frames: VecDeque<RgbImage>,
    next_index: u64,
}

impl ImageSequence {
    /// `dims` is reported even when `frames` is empty.
    pub fn new(dims: (u32, u32), frames: Vec<RgbImage>) -> Self {
        Self {
            dims,
            frames: frames.into(),
            next_index: 0,
        }
    }
}

impl FrameSource for ImageSequence {
    fn dimensions(&self) -> (u32, u32) {
        self.dims
    }

    fn next_frame(&mut self) -> Result<Option<RasterFrame>, DecodeError> {
        let Some(image) = self.frames.pop_front() else {
            return Ok(None);
        };
        if image.dimensions() != self.dims {
            return Err(DecodeError::Other(format!(
                "frame {} is {}x{}, expected {}x{}",
                self.next_index,
                image.width(),
                image.height(),
                self.dims.0,
                self.dims.1
            )));
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(RasterFrame { index, image }))
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.next_index + self.frames.len() as u64)
    }
}
