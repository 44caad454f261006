//! Example: transcode a video into a job, then stream its frames back.
//! Run with: cargo run --example transcode_and_stream -- clip.mp4 [columns]

use asciivid::{FrameSequencer, FrameTranscoder, JobStore};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().unwrap_or_else(|| "clip.mp4".to_string()));
    let columns: u32 = match args.next() {
        Some(c) => c.parse()?,
        None => 80,
    };

    if !input.exists() {
        println!("Note: {} not found, nothing to convert", input.display());
        return Ok(());
    }

    // Jobs go to a scratch directory so the example never touches real jobs
    let store = JobStore::new(std::env::temp_dir().join("asciivid-example-jobs"));
    let transcoder = FrameTranscoder::new();

    let job = store.start_job()?;
    let report = transcoder.transcode(&input, columns, &job)?;
    println!(
        "Job {}: {} frames at {}x{}",
        job.id(),
        report.frames_written,
        report.columns,
        report.rows
    );
    if let Some(stop) = &report.interruption {
        println!("Decoding stopped at frame {}: {}", stop.frame_index, stop.reason);
    }

    // A reader only needs the id
    let job = store.open_job(job.id())?;
    let mut stream = FrameSequencer::stream_job(&job)?;
    if let Some(first) = stream.next() {
        println!("\nFirst frame:\n{}", first?);
    }
    println!("{} more frames available", stream.len());

    store.remove_job(&job)?;
    Ok(())
}
