//! Filesystem image cache with content-hash naming.
//!
//! Rendered satellite images are stored flat in one directory as
//! `{layer}_{YYYYMMDD}_{hash16}.jpg` where the hash is the first 16 hex chars
//! of the content's SHA-256. The filename convention is what makes date-aware
//! selection and before/after pairing possible without a database.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::copernicus::Layer;
use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Metadata for one cached image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageMeta {
    pub filename: String,
    pub url: String,
    pub size_kb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// Before/after pair of the same layer on different dates.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePair {
    pub before: ImageMeta,
    pub after: ImageMeta,
}

/// Flat-directory image cache.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if it does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Store rendered image bytes under the filename convention. Saving the
    /// same content twice produces the same filename, so re-fetches are
    /// idempotent.
    pub fn save(&self, layer: Layer, date: NaiveDate, bytes: &[u8]) -> Result<ImageMeta> {
        self.ensure()?;

        let hash = content_hash(bytes);
        let filename = format!("{}_{}_{}.jpg", layer.as_str(), date.format("%Y%m%d"), hash);
        let path = self.dir.join(&filename);

        std::fs::write(&path, bytes)?;
        tracing::info!(file = %filename, size_kb = bytes.len() / 1024, "cached satellite image");

        Ok(ImageMeta {
            url: format!("/data/{filename}"),
            filename,
            size_kb: round_kb(bytes.len()),
            layer: Some(layer),
            date: Some(date),
        })
    }

    /// List every cached image, sorted by filename. Files that do not match
    /// the naming convention are still listed, just without layer/date.
    pub fn list(&self) -> Result<Vec<ImageMeta>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut images = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_image_file(&name) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let (layer, date) = parse_filename(&name)
                .map(|(l, d)| (Some(l), Some(d)))
                .unwrap_or((None, None));

            images.push(ImageMeta {
                url: format!("/data/{name}"),
                filename: name,
                size_kb: round_kb(size as usize),
                layer,
                date,
            });
        }

        images.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(images)
    }

    pub fn count(&self) -> usize {
        self.list().map(|v| v.len()).unwrap_or(0)
    }

    /// Earliest and latest dated image of a layer. Returns `None` unless the
    /// cache holds that layer on at least two distinct dates.
    pub fn pair_before_after(&self, layer: Layer) -> Result<Option<ImagePair>> {
        let mut dated: Vec<ImageMeta> = self
            .list()?
            .into_iter()
            .filter(|img| img.layer == Some(layer) && img.date.is_some())
            .collect();

        dated.sort_by_key(|img| img.date);

        let (Some(before), Some(after)) = (dated.first().cloned(), dated.last().cloned()) else {
            return Ok(None);
        };

        if before.date == after.date {
            return Ok(None);
        }

        Ok(Some(ImagePair { before, after }))
    }

    /// Absolute path for a cached filename. Rejects anything that could
    /// escape the cache directory.
    pub fn path_for(&self, filename: &str) -> Result<PathBuf> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(Error::invalid_request(format!(
                "invalid image filename: {filename}"
            )));
        }
        Ok(self.dir.join(filename))
    }
}

fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

fn round_kb(bytes: usize) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

fn is_image_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}

fn filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-z]+)_(\d{8})_[0-9a-f]+\.(?:jpg|jpeg|png)$").expect("valid regex")
    })
}

/// Parse `{layer}_{YYYYMMDD}_{hash}.{ext}` back into its parts.
fn parse_filename(name: &str) -> Option<(Layer, NaiveDate)> {
    let caps = filename_regex().captures(name)?;
    let layer: Layer = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::parse_from_str(caps.get(2)?.as_str(), "%Y%m%d").ok()?;
    Some((layer, date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn save_uses_filename_convention() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        let meta = store
            .save(Layer::Truecolor, date(2023, 10, 4), b"jpegbytes")
            .unwrap();

        assert!(meta.filename.starts_with("truecolor_20231004_"));
        assert!(meta.filename.ends_with(".jpg"));
        assert_eq!(meta.url, format!("/data/{}", meta.filename));
        assert!(dir.path().join(&meta.filename).exists());
    }

    #[test]
    fn save_is_idempotent_for_identical_content() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        let a = store.save(Layer::Nbr, date(2023, 10, 4), b"same").unwrap();
        let b = store.save(Layer::Nbr, date(2023, 10, 4), b"same").unwrap();

        assert_eq!(a.filename, b.filename);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn list_parses_convention_and_tolerates_strays() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());
        store
            .save(Layer::Ndvi, date(2023, 10, 10), b"img")
            .unwrap();
        std::fs::write(dir.path().join("holiday-photo.png"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let images = store.list().unwrap();
        assert_eq!(images.len(), 2);

        let stray = images
            .iter()
            .find(|i| i.filename == "holiday-photo.png")
            .unwrap();
        assert!(stray.layer.is_none());
        assert!(stray.date.is_none());

        let ndvi = images.iter().find(|i| i.layer == Some(Layer::Ndvi)).unwrap();
        assert_eq!(ndvi.date, Some(date(2023, 10, 10)));
    }

    #[test]
    fn pair_requires_two_distinct_dates() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());

        store
            .save(Layer::Truecolor, date(2023, 9, 1), b"before")
            .unwrap();
        assert!(store.pair_before_after(Layer::Truecolor).unwrap().is_none());

        store
            .save(Layer::Truecolor, date(2023, 10, 20), b"after")
            .unwrap();
        let pair = store
            .pair_before_after(Layer::Truecolor)
            .unwrap()
            .expect("pair");

        assert_eq!(pair.before.date, Some(date(2023, 9, 1)));
        assert_eq!(pair.after.date, Some(date(2023, 10, 20)));

        // other layers are unaffected
        assert!(store.pair_before_after(Layer::Nbr).unwrap().is_none());
    }

    #[test]
    fn path_for_rejects_traversal() {
        let store = ImageStore::new(PathBuf::from("/tmp/cache"));
        assert!(store.path_for("ok.jpg").is_ok());
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("a/b.jpg").is_err());
    }

    #[test]
    fn filename_round_trip() {
        let parsed = parse_filename("nbr_20231004_0123456789abcdef.jpg").unwrap();
        assert_eq!(parsed.0, Layer::Nbr);
        assert_eq!(parsed.1, date(2023, 10, 4));

        assert!(parse_filename("random.jpg").is_none());
        assert!(parse_filename("nbr_2023_x.jpg").is_none());
    }
}
