mod cli;

use burnsight::{config, server, video, vlm};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "burnsight=trace,tower_http=debug".to_string()
        } else {
            "burnsight=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Check => check_setup(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Analyze { image, prompt } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(analyze_image(&image, &prompt, cli.config.as_deref()))
        }
        Commands::Version => {
            println!("burnsight {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start_server(
    host: String,
    port: u16,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting Burnsight server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn check_setup(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Burnsight setup check");
    println!("=====================");

    let config = config::load_config_or_default(config_path)?;
    let mut issues: Vec<String> = Vec::new();

    // Credentials
    match &config.vlm.api_key {
        Some(key) if !key.is_empty() => {
            let prefix: String = key.chars().take(8).collect();
            println!("ok   VLM API key configured (starts with {prefix}...)");
        }
        _ => {
            println!("warn VLM API key not configured");
            issues.push(
                "Set BURNSIGHT_VLM_API_KEY or add [vlm] api_key to the config file".to_string(),
            );
        }
    }

    if config.copernicus.username.is_some() && config.copernicus.password.is_some() {
        println!("ok   Copernicus credentials configured");
    } else {
        println!("warn Copernicus credentials not configured");
        issues.push(
            "Set BURNSIGHT_CDSE_USERNAME / BURNSIGHT_CDSE_PASSWORD or fill the [copernicus] section"
                .to_string(),
        );
    }

    // Directories
    for (label, dir) in [
        ("satellite data", config.storage.satellite_dir()),
        ("uploads", config.storage.uploads_dir()),
        ("frames", config.storage.frames_dir()),
    ] {
        if dir.exists() {
            println!("ok   {} directory exists ({})", label, dir.display());
        } else {
            std::fs::create_dir_all(&dir)?;
            println!("ok   created {} directory ({})", label, dir.display());
        }
    }

    // Cached imagery
    let store = burnsight::imagery::ImageStore::new(config.storage.satellite_dir());
    let count = store.count();
    if count > 0 {
        println!("ok   {count} cached satellite image(s)");
    } else {
        println!("warn no cached satellite images yet (fetch-data will populate the cache)");
    }

    // External tools
    for tool in video::check_tools() {
        if tool.available {
            println!(
                "ok   {} available ({})",
                tool.name,
                tool.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            println!("warn {} not found in PATH", tool.name);
            issues.push(format!(
                "Install {} for video analysis support",
                tool.name
            ));
        }
    }

    println!();
    if issues.is_empty() {
        println!("All checks passed.");
    } else {
        println!("Issues found:");
        for (i, issue) in issues.iter().enumerate() {
            println!("{}. {}", i + 1, issue);
        }
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(path)?;
    config::validate_config(&config)?;
    println!("Configuration is valid");
    println!(
        "  server: {}:{}",
        config.server.host, config.server.port
    );
    println!("  data dir: {}", config.storage.data_dir.display());
    println!("  image model: {}", config.vlm.image_model);
    println!("  video model: {}", config.vlm.video_model);
    Ok(())
}

async fn analyze_image(
    image: &std::path::Path,
    prompt: &str,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !image.exists() {
        anyhow::bail!("Image file does not exist: {:?}", image);
    }

    let client = vlm::VlmClient::new(&config.vlm);
    let data_url = vlm::encode_image_data_url(image)?;
    let messages = vec![vlm::Message::user_with_images(prompt, vec![data_url])];

    println!("Analyzing {}...", image.display());
    let response = client
        .complete_streaming(&config.vlm.image_model, &messages)
        .await?;

    println!("\n{response}");
    Ok(())
}
