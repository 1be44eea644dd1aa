//! Video upload bookkeeping and frame extraction.

pub mod frames;
pub mod tools;

pub use frames::{extract_frames, probe_video, sample_frames, VideoMetadata};
pub use tools::{check_tools, require_tool, ToolInfo};

use std::path::{Path, PathBuf};

use chrono::Utc;

/// New upload identifier, a second-resolution timestamp.
pub fn new_video_id() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Valid upload identifiers are exactly what [`new_video_id`] produces.
/// Anything else is rejected before it can touch the filesystem.
pub fn is_valid_video_id(id: &str) -> bool {
    id.len() == 15
        && id
            .chars()
            .enumerate()
            .all(|(i, c)| if i == 8 { c == '_' } else { c.is_ascii_digit() })
}

/// Whether the original filename carries an allowed video extension.
pub fn allowed_file(filename: &str, allowed: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext))
        }
        _ => false,
    }
}

/// Reduce a client-supplied filename to a safe basename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Locate an uploaded video by its id prefix.
pub fn find_video(uploads_dir: &Path, video_id: &str) -> Option<PathBuf> {
    let prefix = format!("{video_id}_");
    let entries = std::fs::read_dir(uploads_dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) {
            return Some(entry.path());
        }
    }
    None
}
