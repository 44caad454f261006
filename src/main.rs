use anyhow::{anyhow, Context, Result};
use asciivid::{
    load_config, probe, AppConfig, FrameSequencer, FrameTranscoder, JobStore, Progress,
    ProgressPhase,
};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, FuzzySelect};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the width and height of a video
    Probe {
        input: PathBuf,
        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Convert a video into a new job and print the job id
    Transcode {
        /// Input video or image (prompted for when omitted)
        input: Option<PathBuf>,
        /// Target columns (width) of each frame
        #[arg(long, short)]
        width: Option<u32>,
        /// Keep earlier jobs instead of replacing them
        #[arg(long, default_value_t = false)]
        keep_previous: bool,
    },
    /// Write a job's frames to stdout in order, separated by the frame marker
    Stream {
        job: String,
        /// Frames read ahead of the writer
        #[arg(long, default_value_t = 4)]
        buffer: usize,
    },
    /// List jobs
    Jobs,
    /// Remove all jobs
    Clean {
        #[arg(long, short, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Parser, Debug)]
#[command(version, about = "Video to ASCII frame converter and streamer.")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Config file (.json or .toml) overriding the default search
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding job outputs
    #[arg(long, global = true)]
    jobs_root: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(p) => AppConfig::from_file(p)?,
        None => load_config()?,
    };
    if let Some(root) = args.jobs_root {
        cfg.jobs_root = root;
    }
    let store = JobStore::from_config(&cfg);

    match args.cmd {
        Command::Probe { input, json } => {
            let info = probe(&input, &cfg.ffmpeg)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}x{}", info.width, info.height);
            }
        }
        Command::Transcode {
            input,
            width,
            keep_previous,
        } => {
            let input = match input {
                Some(p) => p,
                None => pick_input()?,
            };
            let width = width.unwrap_or(cfg.default_width);
            run_transcode(&cfg, &store, input, width, keep_previous)?;
        }
        Command::Stream { job, buffer } => {
            let job = store.open_job(&job)?;
            let stream = FrameSequencer::stream_job(&job)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let mut frames = 0u64;
            for chunk in stream.buffered(buffer.max(1)) {
                let chunk = chunk?;
                out.write_all(chunk.as_bytes()).context("writing stream")?;
                frames += 1;
            }
            out.flush()?;
            log::debug!("streamed {} frames of job {}", frames, job.id());
        }
        Command::Jobs => {
            let jobs = store.list_jobs()?;
            if jobs.is_empty() {
                println!("No jobs in {}", store.root().display());
            }
            for job in jobs {
                match job.read_manifest() {
                    Ok(m) => println!(
                        "{}  {} frames  {}x{} -> {}x{}  {}{}",
                        job.id(),
                        m.frames,
                        m.source_width,
                        m.source_height,
                        m.columns,
                        m.rows,
                        m.source.display(),
                        if m.interruption.is_some() { "  (partial)" } else { "" }
                    ),
                    Err(_) => println!("{}  (incomplete)", job.id()),
                }
            }
        }
        Command::Clean { yes } => {
            let jobs = store.list_jobs()?;
            if jobs.is_empty() {
                println!("Nothing to remove.");
                return Ok(());
            }
            if !yes
                && !Confirm::new()
                    .with_prompt(format!(
                        "Remove {} job(s) from {}?",
                        jobs.len(),
                        store.root().display()
                    ))
                    .default(false)
                    .interact()?
            {
                println!("Operation cancelled.");
                return Ok(());
            }
            for job in &jobs {
                store.remove_job(job)?;
            }
            println!("Removed {} job(s).", jobs.len());
        }
    }

    Ok(())
}

fn run_transcode(
    cfg: &AppConfig,
    store: &JobStore,
    input: PathBuf,
    width: u32,
    keep_previous: bool,
) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("Input file does not exist: {}", input.display()));
    }

    let transcoder = FrameTranscoder::with_config(cfg.clone());
    let job = store.start_job()?;

    // Created on the first conversion update, once the total is known
    let progress_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    let pb_clone = Arc::clone(&progress_bar);

    let result = transcoder.transcode_with_progress(&input, width, &job, move |p: Progress| {
        if p.phase != ProgressPhase::ConvertingFrames {
            return;
        }
        let Ok(mut pb_guard) = pb_clone.lock() else {
            return;
        };
        let pb = pb_guard.get_or_insert_with(|| new_progress_bar(p.total));
        pb.set_position(p.completed as u64);
    });

    let pb_opt = progress_bar.lock().ok().and_then(|mut g| g.take());
    if let Some(pb) = pb_opt {
        pb.finish_and_clear();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            // A failed job leaves nothing worth streaming
            let _ = store.remove_job(&job);
            return Err(e).with_context(|| format!("transcoding {}", input.display()));
        }
    };

    if !keep_previous {
        let removed = store.retire_others(&job)?;
        if removed > 0 {
            log::info!("replaced {} earlier job(s)", removed);
        }
    }

    if let Some(stop) = &report.interruption {
        log::warn!(
            "only {} frames converted; decoding failed at frame {}: {}",
            report.frames_written,
            stop.frame_index,
            stop.reason
        );
    }

    let manifest = job.read_manifest()?;
    println!("job: {}", job.id());
    println!("frames: {}", report.frames_written);
    println!("source: {}x{}", manifest.source_width, manifest.source_height);
    println!("grid: {}x{}", report.columns, report.rows);
    Ok(())
}

fn new_progress_bar(total: usize) -> ProgressBar {
    if total == 0 {
        let pb = ProgressBar::new_spinner();
        pb.set_message("Converting frames");
        return pb;
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("Converting frames");
    pb
}

fn pick_input() -> Result<PathBuf> {
    let files = find_media_files();
    if files.is_empty() {
        return Err(anyhow!("No media files found in current directory."));
    }
    let selection = FuzzySelect::with_theme(&dialoguer::theme::ColorfulTheme::default())
        .with_prompt("Choose an input file")
        .default(0)
        .items(&files)
        .interact()?;
    Ok(PathBuf::from(&files[selection]))
}

fn find_media_files() -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(".")
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path().extension().is_some_and(|ext| {
                    matches!(
                        ext.to_str(),
                        Some("mp4" | "mkv" | "mov" | "avi" | "webm" | "png" | "jpg" | "jpeg")
                    )
                })
        })
        .filter_map(|e| e.path().to_str().map(str::to_string))
        .collect();
    files.sort();
    files
}
