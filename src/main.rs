mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use dr_av::{DashSettings, FfmpegDashEncoder, ToolRegistry};
use dr_core::config::Config;
use dr_core::events::EventBus;
use dr_core::{sandbox, MediaKind, MediaSource};
use dr_server::transcode::TranscodeOrchestrator;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    media_root: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(root) = media_root {
        config.library.media_root = Some(root);
    }

    tracing::info!("Starting dashreel server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    match config.library.media_root {
        Some(ref root) => tracing::info!("Media root: {}", root.display()),
        None => tracing::warn!("No media root configured; library requests will fail"),
    }

    dr_server::start(config, config_path.map(Path::to_path_buf)).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "dashreel=trace,dr_server=trace,dr_av=debug,dr_core=debug,dr_player=debug,tower_http=debug".to_string()
        } else {
            "dashreel=info,dr_server=debug,dr_av=info,dr_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .init();

    match cli.command {
        Commands::Start {
            host,
            port,
            media_root,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, media_root, cli.config.as_deref()))
        }
        Commands::Transcode { file } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(transcode_file(&file, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("dashreel {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn transcode_file(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);

    // Inside a configured library the sandbox applies as it does over HTTP.
    let source_path = match config.library.media_root {
        Some(ref root) => sandbox::validate(root, file)?,
        None => file
            .canonicalize()
            .with_context(|| format!("Input file does not exist: {}", file.display()))?,
    };

    let tools = ToolRegistry::discover(&config.tools);
    let encoder = FfmpegDashEncoder::from_registry(&tools)?;
    let orchestrator = Arc::new(TranscodeOrchestrator::new(
        config.transcode.output_dir.clone(),
        DashSettings::from_config(&config.transcode),
        Arc::new(encoder),
        Arc::new(EventBus::default()),
    ));

    println!("Transcoding: {}", source_path.display());
    println!(
        "Output: {}",
        orchestrator.output_dir_for(&source_path).display()
    );

    let source = MediaSource::new(source_path, MediaKind::Adaptive);
    let manifest = orchestrator.ensure_manifest(&source).await?;

    println!("\nManifest: {}", manifest.path.display());
    println!("URL: {}", manifest.url);
    println!("Segment duration: {}s", manifest.segment_duration_secs);
    println!("Variants: {}", manifest.variants.len());
    for (i, variant) in manifest.variants.iter().enumerate() {
        println!(
            "  [{}] {} video {}k, audio {}k",
            i,
            variant.resolution(),
            variant.video_bitrate_kbps,
            variant.audio_bitrate_kbps
        );
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Direct playback works; adaptive playback needs it.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("✓ Configuration parses");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Media root: {}",
        config
            .library
            .media_root
            .as_deref()
            .map_or_else(|| "(unset)".to_string(), |p| p.display().to_string())
    );
    println!("  Extensions: {}", config.library.extensions.join(", "));
    println!("  Output dir: {}", config.transcode.output_dir.display());
    println!("  Ladder rungs: {}", config.transcode.ladder.len());

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("\nNo warnings");
    } else {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
