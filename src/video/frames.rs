//! Frame extraction and metadata probing for uploaded videos.
//!
//! Both operations shell out to the ffmpeg suite; there is no decoding in
//! process.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Basic metadata for an uploaded video.
#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadata {
    pub duration_secs: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub total_frames: u64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Probe a video file with ffprobe.
pub async fn probe_video(path: &Path) -> Result<VideoMetadata> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool("ffprobe not found in PATH")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool(format!("ffprobe failed: {}", stderr.trim())));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::tool(format!("unparseable ffprobe output: {e}")))?;

    let duration_secs = parsed
        .format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| Error::invalid_request("file has no video stream"))?;

    let fps = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    let total_frames = video
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or_else(|| (duration_secs * fps).round() as u64);

    Ok(VideoMetadata {
        duration_secs,
        fps,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        total_frames,
    })
}

/// Extract frames at `fps` frames per second into `out_dir`.
///
/// Frames are written as `frame_0001.jpg`, `frame_0002.jpg`, ... and the
/// sorted list of paths is returned.
pub async fn extract_frames(video: &Path, out_dir: &Path, fps: u32) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir).await?;

    let pattern = out_dir.join("frame_%04d.jpg");
    tracing::debug!(video = %video.display(), fps, "extracting frames");

    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(video)
        .args(["-vf", &format!("fps={fps}"), "-q:v", "2"])
        .arg(&pattern)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool("ffmpeg not found in PATH")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool(format!("ffmpeg failed: {}", stderr.trim())));
    }

    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("frame_") && name.ends_with(".jpg") {
            frames.push(entry.path());
        }
    }
    frames.sort();

    tracing::info!(frames = frames.len(), "frame extraction complete");
    Ok(frames)
}

/// Keep every `rate`-th frame. Short sequences are kept whole, matching the
/// original sampling behavior.
pub fn sample_frames(frames: &[PathBuf], rate: usize) -> Vec<PathBuf> {
    if frames.len() <= rate || rate <= 1 {
        return frames.to_vec();
    }
    frames.iter().step_by(rate).cloned().collect()
}

/// Parse an ffprobe rational frame rate such as `"30000/1001"`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => s.parse().ok(),
    }
}
