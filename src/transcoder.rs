use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::artifact::artifact_path;
use crate::ascii::{self, grid_dimensions};
use crate::config::AppConfig;
use crate::decode::{open_source, FrameSource, RasterFrame};
use crate::error::{Error, Result};
use crate::job::{JobHandle, JobManifest};
use crate::Progress;

/// Where and why decoding stopped before the end of the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeInterruption {
    /// Index of the frame that could not be decoded
    pub frame_index: u64,
    pub reason: String,
}

/// Outcome of a transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeReport {
    /// Artifacts written, numbered `0..frames_written`
    pub frames_written: u64,
    pub columns: u32,
    pub rows: u32,
    /// Set when the source failed part way through. Frames before the
    /// failure are kept.
    pub interruption: Option<DecodeInterruption>,
}

impl TranscodeReport {
    pub fn is_complete(&self) -> bool {
        self.interruption.is_none()
    }
}

/// Converts videos into numbered ASCII frame files.
pub struct FrameTranscoder {
    config: AppConfig,
}

impl FrameTranscoder {
    /// Create a transcoder with default configuration
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Transcode `input` into `job` at `columns` characters per row.
    ///
    /// The job directory is expected to be empty; nothing already in it is
    /// read or removed. On success the job manifest is written as well.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use asciivid::{FrameTranscoder, JobStore};
    /// use std::path::Path;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let transcoder = FrameTranscoder::new();
    /// let store = JobStore::from_config(transcoder.config());
    /// let job = store.start_job()?;
    /// let report = transcoder.transcode(Path::new("clip.mp4"), 100, &job)?;
    /// println!("{} frames in job {}", report.frames_written, job.id());
    /// # Ok(())
    /// # }
    /// ```
    pub fn transcode(&self, input: &Path, columns: u32, job: &JobHandle) -> Result<TranscodeReport> {
        self.transcode_with_progress(input, columns, job, |_| {})
    }

    /// Like [`transcode`](Self::transcode), reporting progress through
    /// `progress_callback`.
    pub fn transcode_with_progress<F>(
        &self,
        input: &Path,
        columns: u32,
        job: &JobHandle,
        progress_callback: F,
    ) -> Result<TranscodeReport>
    where
        F: Fn(Progress) + Send + Sync,
    {
        validate_columns(columns)?;

        progress_callback(Progress::opening());
        let source = open_source(input, &self.config.ffmpeg)?;
        let (source_width, source_height) = source.dimensions();

        let report = self.transcode_source(source, input, columns, job.dir(), &progress_callback)?;

        job.write_manifest(&JobManifest {
            source: input.to_path_buf(),
            source_width,
            source_height,
            columns: report.columns,
            rows: report.rows,
            frames: report.frames_written,
            interruption: report.interruption.clone(),
        })?;

        log::info!(
            "job {}: {} frames of {}x{} from {}",
            job.id(),
            report.frames_written,
            report.columns,
            report.rows,
            input.display()
        );
        Ok(report)
    }

    /// Drain `source` into `out_dir`.
    ///
    /// `source_path` only names the source in errors. Frames are decoded one
    /// at a time and rendered in batches of `batch_size` on the rayon pool,
    /// each written under its own sequence number.
    pub fn transcode_source<S, F>(
        &self,
        mut source: S,
        source_path: &Path,
        columns: u32,
        out_dir: &Path,
        progress_callback: &F,
    ) -> Result<TranscodeReport>
    where
        S: FrameSource,
        F: Fn(Progress) + Send + Sync,
    {
        validate_columns(columns)?;

        let (orig_w, orig_h) = source.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(Error::EmptyDimensions {
                path: source_path.to_path_buf(),
            });
        }
        let (_, rows) = grid_dimensions(orig_w, orig_h, columns);

        fs::create_dir_all(out_dir).map_err(|source| Error::Destination {
            path: out_dir.to_path_buf(),
            frame: 0,
            source,
        })?;

        let total = source.frame_count_hint().unwrap_or(0) as usize;
        let completed = AtomicUsize::new(0);
        progress_callback(Progress::converting_frames(0, total));

        let batch_size = self.config.batch_size.max(1);
        let mut batch: Vec<RasterFrame> = Vec::with_capacity(batch_size);
        let mut written: u64 = 0;
        let mut interruption = None;

        loop {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    batch.push(frame);
                    if batch.len() == batch_size {
                        written += write_batch(&batch, columns, out_dir, &completed, total, progress_callback)?;
                        batch.clear();
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let frame_index = written + batch.len() as u64;
                    if frame_index == 0 {
                        return Err(Error::OpenVideo {
                            path: source_path.to_path_buf(),
                            reason: e.to_string(),
                        });
                    }
                    log::warn!(
                        "decoding {} stopped at frame {}: {}",
                        source_path.display(),
                        frame_index,
                        e
                    );
                    interruption = Some(DecodeInterruption {
                        frame_index,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
        written += write_batch(&batch, columns, out_dir, &completed, total, progress_callback)?;
        drop(source);

        progress_callback(Progress::complete(written as usize));

        Ok(TranscodeReport {
            frames_written: written,
            columns,
            rows,
            interruption,
        })
    }
}

impl Default for FrameTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_columns(columns: u32) -> Result<()> {
    if columns == 0 {
        return Err(Error::InvalidWidth(columns));
    }
    Ok(())
}

fn write_batch<F>(
    batch: &[RasterFrame],
    columns: u32,
    out_dir: &Path,
    completed: &AtomicUsize,
    total: usize,
    progress_callback: &F,
) -> Result<u64>
where
    F: Fn(Progress) + Send + Sync,
{
    batch.par_iter().try_for_each(|frame| -> Result<()> {
        let rendered = ascii::render(&frame.image, columns);
        let path: PathBuf = artifact_path(out_dir, frame.index);
        fs::write(&path, rendered.text()).map_err(|source| Error::Destination {
            path,
            frame: frame.index,
            source,
        })?;

        let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
        progress_callback(Progress::converting_frames(current, total.max(current)));
        Ok(())
    })?;
    Ok(batch.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::file_name;
    use crate::decode::{DecodeError, ImageSequence};
    use crate::ascii::RAMP;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Yields `good` frames, then fails.
    struct FailingSource {
        good: u64,
        next: u64,
    }

    impl FrameSource for FailingSource {
        fn dimensions(&self) -> (u32, u32) {
            (8, 8)
        }

        fn next_frame(&mut self) -> Result<Option<RasterFrame>, DecodeError> {
            if self.next == self.good {
                return Err(DecodeError::Other("corrupt packet".to_string()));
            }
            let index = self.next;
            self.next += 1;
            Ok(Some(RasterFrame {
                index,
                image: RgbImage::from_pixel(8, 8, Rgb([200, 200, 200])),
            }))
        }
    }

    fn gradient(w: u32, h: u32, shift: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = ((x * 7 + y * 3 + shift) % 256) as u8;
            Rgb([v, v.wrapping_add(40), v.wrapping_mul(3)])
        })
    }

    fn transcoder(batch_size: usize) -> FrameTranscoder {
        FrameTranscoder::with_config(AppConfig {
            batch_size,
            ..AppConfig::default()
        })
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_one_artifact_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<RgbImage> = (0..7).map(|i| gradient(200, 100, i)).collect();
        let source = ImageSequence::new((200, 100), frames);

        let report = transcoder(3)
            .transcode_source(source, Path::new("mem"), 100, dir.path(), &|_: Progress| {})
            .unwrap();

        assert_eq!(report.frames_written, 7);
        assert_eq!((report.columns, report.rows), (100, 33));
        assert!(report.is_complete());
        let expected: Vec<String> = (0..7).map(file_name).collect();
        assert_eq!(names(dir.path()), expected);

        for name in expected {
            let text = fs::read_to_string(dir.path().join(name)).unwrap();
            let rows: Vec<&str> = text.split('\n').collect();
            assert_eq!(rows.len(), 33);
            assert!(rows.iter().all(|r| r.len() == 100));
            assert!(text.bytes().filter(|b| *b != b'\n').all(|b| RAMP.contains(&b)));
        }
    }

    #[test]
    fn output_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let frames: Vec<RgbImage> = (0..4).map(|i| gradient(64, 48, i * 11)).collect();

        transcoder(2)
            .transcode_source(ImageSequence::new((64, 48), frames.clone()), Path::new("mem"), 40, a.path(), &|_: Progress| {})
            .unwrap();
        transcoder(4)
            .transcode_source(ImageSequence::new((64, 48), frames), Path::new("mem"), 40, b.path(), &|_: Progress| {})
            .unwrap();

        for name in names(a.path()) {
            assert_eq!(
                fs::read(a.path().join(&name)).unwrap(),
                fs::read(b.path().join(&name)).unwrap(),
                "{name}"
            );
        }
    }

    #[test]
    fn zero_frames_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSequence::new((200, 100), Vec::new());
        let report = transcoder(8)
            .transcode_source(source, Path::new("mem"), 100, dir.path(), &|_: Progress| {})
            .unwrap();
        assert_eq!(report.frames_written, 0);
        assert!(names(dir.path()).is_empty());
    }

    #[test]
    fn zero_width_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSequence::new((200, 100), vec![gradient(200, 100, 0)]);
        let err = transcoder(8)
            .transcode_source(source, Path::new("mem"), 0, dir.path(), &|_: Progress| {})
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWidth(0)));
        assert!(names(dir.path()).is_empty());
    }

    #[test]
    fn empty_dimensions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSequence::new((0, 10), Vec::new());
        let err = transcoder(8)
            .transcode_source(source, Path::new("mem"), 10, dir.path(), &|_: Progress| {})
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDimensions { .. }));
    }

    #[test]
    fn mid_stream_failure_keeps_written_frames() {
        let dir = tempfile::tempdir().unwrap();
        let source = FailingSource { good: 5, next: 0 };
        let report = transcoder(2)
            .transcode_source(source, Path::new("mem"), 10, dir.path(), &|_: Progress| {})
            .unwrap();

        assert_eq!(report.frames_written, 5);
        let interruption = report.interruption.unwrap();
        assert_eq!(interruption.frame_index, 5);
        assert!(interruption.reason.contains("corrupt packet"));
        assert_eq!(names(dir.path()).len(), 5);
    }

    #[test]
    fn failure_before_first_frame_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FailingSource { good: 0, next: 0 };
        let err = transcoder(2)
            .transcode_source(source, Path::new("broken.mp4"), 10, dir.path(), &|_: Progress| {})
            .unwrap_err();
        assert!(matches!(err, Error::OpenVideo { .. }));
        assert!(names(dir.path()).is_empty());
    }

    #[test]
    fn unwritable_destination_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let source = ImageSequence::new((4, 4), vec![RgbImage::new(4, 4)]);

        let err = transcoder(2)
            .transcode_source(source, Path::new("mem"), 4, &blocker.join("out"), &|_: Progress| {})
            .unwrap_err();
        assert!(matches!(err, Error::Destination { .. }));
    }

    #[test]
    fn progress_reaches_complete() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSequence::new((16, 16), (0..5).map(|i| gradient(16, 16, i)).collect());
        let seen = Mutex::new(Vec::new());

        transcoder(2)
            .transcode_source(source, Path::new("mem"), 8, dir.path(), &|p: Progress| {
                seen.lock().unwrap().push(p)
            })
            .unwrap();

        let seen = seen.into_inner().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.phase, crate::ProgressPhase::Complete);
        assert_eq!(last.completed, 5);
        let converting = seen
            .iter()
            .filter(|p| p.phase == crate::ProgressPhase::ConvertingFrames)
            .count();
        assert_eq!(converting, 6);
    }

    #[test]
    fn transcode_still_image_into_job() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("still.png");
        RgbImage::from_pixel(200, 100, Rgb([0, 0, 0])).save(&input).unwrap();

        let store = crate::JobStore::new(root.path().join("jobs"));
        let job = store.start_job().unwrap();
        let report = FrameTranscoder::new().transcode(&input, 100, &job).unwrap();
        assert_eq!(report.frames_written, 1);

        let text = fs::read_to_string(job.dir().join(file_name(0))).unwrap();
        assert_eq!(text.lines().count(), 33);
        assert!(text.lines().all(|l| l == "@".repeat(100)));

        let manifest = job.read_manifest().unwrap();
        assert_eq!((manifest.source_width, manifest.source_height), (200, 100));
        assert_eq!((manifest.columns, manifest.rows, manifest.frames), (100, 33, 1));
    }
}
