//! End-to-end: transcode into a job, then stream it back from a fresh handle.

use asciivid::{
    AppConfig, Error, FrameSequencer, FrameTranscoder, ImageSequence, JobStore, Progress,
    FRAME_SEPARATOR, RAMP,
};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

fn shade(w: u32, h: u32, v: u8) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([v, v, v]))
}

fn transcoder(jobs_root: &Path) -> FrameTranscoder {
    FrameTranscoder::with_config(AppConfig {
        jobs_root: jobs_root.to_path_buf(),
        batch_size: 3,
        ..AppConfig::default()
    })
}

#[test]
fn frames_stream_back_in_order() {
    let root = tempfile::tempdir().unwrap();
    let transcoder = transcoder(root.path());
    let store = JobStore::from_config(transcoder.config());
    let job = store.start_job().unwrap();

    // 12 frames so names cross from one to two digits
    let frames: Vec<RgbImage> = (0..12).map(|i| shade(200, 100, (i * 21) as u8)).collect();
    let report = transcoder
        .transcode_source(
            ImageSequence::new((200, 100), frames),
            Path::new("memory"),
            100,
            job.dir(),
            &|_: Progress| {},
        )
        .unwrap();
    assert_eq!(report.frames_written, 12);

    let reopened = store.open_job(job.id()).unwrap();
    let chunks: Vec<String> = FrameSequencer::stream_job(&reopened)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(chunks.len(), 12);

    let mut previous = 0usize;
    for (i, chunk) in chunks.iter().enumerate() {
        let text = chunk.strip_suffix(FRAME_SEPARATOR).unwrap();
        let rows: Vec<&str> = text.split('\n').collect();
        assert_eq!(rows.len(), 33);
        assert!(rows.iter().all(|r| r.len() == 100));

        // Brightness rises with the frame index, so glyph positions in the ramp
        // must never go backwards.
        let glyph = text.as_bytes()[0];
        let pos = RAMP.iter().position(|g| *g == glyph).unwrap();
        if i > 0 {
            assert!(pos >= previous, "frame {i} out of order");
        }
        previous = pos;
    }
    assert!(chunks[0].starts_with('@'));
    assert!(chunks[11].starts_with(' '));
}

#[test]
fn zero_frame_job_streams_empty() {
    let root = tempfile::tempdir().unwrap();
    let transcoder = transcoder(root.path());
    let store = JobStore::from_config(transcoder.config());
    let job = store.start_job().unwrap();

    let report = transcoder
        .transcode_source(
            ImageSequence::new((32, 32), Vec::new()),
            Path::new("memory"),
            10,
            job.dir(),
            &|_: Progress| {},
        )
        .unwrap();
    assert_eq!(report.frames_written, 0);

    let mut stream = FrameSequencer::stream_job(&job).unwrap();
    assert!(stream.next().is_none());
}

#[test]
fn never_run_job_is_an_error_not_empty() {
    let root = tempfile::tempdir().unwrap();
    let store = JobStore::new(root.path());
    let job = store.start_job().unwrap();
    store.remove_job(&job).unwrap();

    let err = FrameSequencer::stream_job(&job).unwrap_err();
    assert!(matches!(err, Error::StreamUnavailable { .. }));
}

#[test]
fn streaming_old_job_unaffected_by_new_job() {
    let root = tempfile::tempdir().unwrap();
    let transcoder = transcoder(root.path());
    let store = JobStore::from_config(transcoder.config());

    let first = store.start_job().unwrap();
    transcoder
        .transcode_source(
            ImageSequence::new((8, 8), vec![shade(8, 8, 0), shade(8, 8, 0)]),
            Path::new("a"),
            4,
            first.dir(),
            &|_: Progress| {},
        )
        .unwrap();
    let mut stream = FrameSequencer::stream_job(&first).unwrap();
    assert!(stream.next().unwrap().unwrap().starts_with("@@@@"));

    let second = store.start_job().unwrap();
    transcoder
        .transcode_source(
            ImageSequence::new((8, 8), vec![shade(8, 8, 255)]),
            Path::new("b"),
            4,
            second.dir(),
            &|_: Progress| {},
        )
        .unwrap();

    assert!(stream.next().unwrap().unwrap().starts_with("@@@@"));
    assert!(stream.next().is_none());
    assert_eq!(fs::read_dir(second.dir()).unwrap().count(), 1);
}

#[test]
fn one_pixel_video() {
    let root = tempfile::tempdir().unwrap();
    let transcoder = transcoder(root.path());
    let store = JobStore::from_config(transcoder.config());
    let job = store.start_job().unwrap();

    let report = transcoder
        .transcode_source(
            ImageSequence::new((1, 1), vec![shade(1, 1, 255)]),
            Path::new("dot"),
            100,
            job.dir(),
            &|_: Progress| {},
        )
        .unwrap();
    assert_eq!((report.columns, report.rows), (100, 65));

    let chunk = FrameSequencer::stream_job(&job).unwrap().next().unwrap().unwrap();
    let text = chunk.strip_suffix(FRAME_SEPARATOR).unwrap();
    assert!(text.split('\n').all(|row| row == " ".repeat(100)));
}
