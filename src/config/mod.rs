mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./burnsight.toml",
        "~/.config/burnsight/config.toml",
        "/etc/burnsight/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Pull secrets from the environment so they never have to live in the
/// config file. Environment values win over file values.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("BURNSIGHT_VLM_API_KEY") {
        if !key.is_empty() {
            config.vlm.api_key = Some(key);
        }
    }
    if let Ok(user) = std::env::var("BURNSIGHT_CDSE_USERNAME") {
        if !user.is_empty() {
            config.copernicus.username = Some(user);
        }
    }
    if let Ok(pass) = std::env::var("BURNSIGHT_CDSE_PASSWORD") {
        if !pass.is_empty() {
            config.copernicus.password = Some(pass);
        }
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.copernicus.page_size == 0 {
        anyhow::bail!("Copernicus page_size cannot be 0");
    }

    if config.copernicus.max_pages == 0 {
        anyhow::bail!("Copernicus max_pages cannot be 0");
    }

    if !(0.0..=100.0).contains(&config.copernicus.max_cloud_cover) {
        anyhow::bail!(
            "Copernicus max_cloud_cover must be between 0 and 100, got {}",
            config.copernicus.max_cloud_cover
        );
    }

    if config.vlm.requests_per_second == 0 {
        anyhow::bail!("VLM requests_per_second cannot be 0");
    }

    if config.video.extract_fps == 0 {
        anyhow::bail!("Video extract_fps cannot be 0");
    }

    if config.video.sample_rate == 0 {
        anyhow::bail!("Video sample_rate cannot be 0");
    }

    if config.video.allowed_extensions.is_empty() {
        anyhow::bail!("Video allowed_extensions cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn default_endpoints() {
        let config = Config::default();
        assert!(config.copernicus.token_url.contains("identity.dataspace"));
        assert!(config.copernicus.catalog_url.contains("odata/v1"));
        assert_eq!(config.copernicus.client_id, "cdse-public");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn rejects_zero_page_size() {
        let mut config = Config::default();
        config.copernicus.page_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_cloud_cover_out_of_range() {
        let mut config = Config::default();
        config.copernicus.max_cloud_cover = 150.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let toml = r#"
            [server]
            port = 8080

            [copernicus]
            max_cloud_cover = 20.0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.copernicus.max_cloud_cover, 20.0);
        // untouched sections fall back to defaults
        assert_eq!(config.video.max_upload_mb, 500);
        assert_eq!(config.vlm.max_tokens, 4096);
    }

    #[test]
    fn storage_subdirectories() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/tmp/bs"),
        };
        assert_eq!(
            storage.satellite_dir(),
            PathBuf::from("/tmp/bs/satellite_data")
        );
        assert_eq!(storage.uploads_dir(), PathBuf::from("/tmp/bs/uploads"));
        assert_eq!(storage.frames_dir(), PathBuf::from("/tmp/bs/frames"));
    }
}
