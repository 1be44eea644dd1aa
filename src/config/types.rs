use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub copernicus: CopernicusConfig,

    #[serde(default)]
    pub vlm: VlmConfig,

    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the frontend bundle, served with SPA fallback.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base data directory. Satellite imagery, uploaded videos, and extracted
    /// frames all live underneath it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn satellite_dir(&self) -> PathBuf {
        self.data_dir.join("satellite_data")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.data_dir.join("frames")
    }
}

/// Copernicus Data Space endpoints and query bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CopernicusConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    #[serde(default = "default_process_url")]
    pub process_url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Maximum acceptable cloud cover percentage for catalog results.
    #[serde(default = "default_max_cloud_cover")]
    pub max_cloud_cover: f64,

    /// OData page size ($top).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on continuation pages followed per search.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_output_size")]
    pub output_width: u32,

    #[serde(default = "default_output_size")]
    pub output_height: u32,
}

fn default_token_url() -> String {
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token"
        .to_string()
}
fn default_catalog_url() -> String {
    "https://catalogue.dataspace.copernicus.eu/odata/v1".to_string()
}
fn default_process_url() -> String {
    "https://sh.dataspace.copernicus.eu/api/v1/process".to_string()
}
fn default_client_id() -> String {
    "cdse-public".to_string()
}
fn default_max_cloud_cover() -> f64 {
    5.0
}
fn default_page_size() -> u32 {
    20
}
fn default_max_pages() -> u32 {
    5
}
fn default_output_size() -> u32 {
    2048
}

impl Default for CopernicusConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            catalog_url: default_catalog_url(),
            process_url: default_process_url(),
            username: None,
            password: None,
            client_id: default_client_id(),
            max_cloud_cover: default_max_cloud_cover(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            output_width: default_output_size(),
            output_height: default_output_size(),
        }
    }
}

/// Hosted vision-language-model API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VlmConfig {
    #[serde(default = "default_vlm_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for single-image satellite analysis.
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Model used for multi-frame video analysis.
    #[serde(default = "default_video_model")]
    pub video_model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Token-bucket rate limit for outbound VLM calls.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_vlm_api_url() -> String {
    "https://api.together.xyz/v1".to_string()
}
fn default_image_model() -> String {
    "meta-llama/Llama-Vision-Free".to_string()
}
fn default_video_model() -> String {
    "Qwen/Qwen2.5-VL-72B-Instruct".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f64 {
    0.7
}
fn default_requests_per_second() -> u32 {
    1
}

impl Default for VlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_vlm_api_url(),
            api_key: None,
            image_model: default_image_model(),
            video_model: default_video_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Frames per second extracted from uploaded videos.
    #[serde(default = "default_extract_fps")]
    pub extract_fps: u32,

    /// Every Nth extracted frame is sent to the VLM.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: usize,
}

fn default_max_upload_mb() -> u64 {
    500
}
fn default_allowed_extensions() -> Vec<String> {
    ["mp4", "mov", "avi", "mkv", "webm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_extract_fps() -> u32 {
    1
}
fn default_sample_rate() -> usize {
    5
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: default_max_upload_mb(),
            allowed_extensions: default_allowed_extensions(),
            extract_fps: default_extract_fps(),
            sample_rate: default_sample_rate(),
        }
    }
}
