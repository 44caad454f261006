//! Video metadata via `ffprobe`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

use crate::config::FfmpegConfig;
use crate::error::{Error, Result};

/// Metadata of the first video stream in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
    /// Frame count advertised by the container, when it has one
    pub frame_count: Option<u64>,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Probe `path` for its width, height and frame rate.
///
/// Fails with [`Error::OpenVideo`] when ffprobe cannot read the file and with
/// [`Error::EmptyDimensions`] when the stream reports a zero size.
pub fn probe(path: &Path, ffmpeg: &FfmpegConfig) -> Result<VideoInfo> {
    let output = Command::new(ffmpeg.ffprobe_cmd())
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| Error::Probe {
            path: path.to_path_buf(),
            reason: format!("running {}: {e}", ffmpeg.ffprobe_cmd()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::OpenVideo {
            path: path.to_path_buf(),
            reason: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(path, &stdout)
}

fn parse_probe_output(path: &Path, json: &str) -> Result<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json).map_err(|e| Error::Probe {
        path: path.to_path_buf(),
        reason: format!("parsing ffprobe output: {e}"),
    })?;

    let stream = probe
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .ok_or_else(|| Error::OpenVideo {
            path: path.to_path_buf(),
            reason: "no video stream".to_string(),
        })?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(Error::EmptyDimensions {
            path: path.to_path_buf(),
        });
    }

    Ok(VideoInfo {
        width,
        height,
        frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
        frame_count: stream.nb_frames.as_deref().and_then(|n| n.parse().ok()),
    })
}

/// Parse "30/1", "30000/1001" or "29.97".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse().ok()
}
