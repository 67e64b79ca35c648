//! facelink - facial tracking to 2D avatar pipeline
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use facelink::{
    avatar::{ManifestLoader, ModelDescriptor},
    config::{Config, SourceKind},
    settings::{model_name_from_url, FileSettings, MemorySettings, Preferences, SettingsStore},
    tracking::{create_source, StaticPermissions},
    Pipeline,
};

/// facelink - drive a 2D avatar from face tracking
#[derive(Parser, Debug)]
#[command(name = "facelink", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Tracking source: mediapipe or vmc (overrides config)
    #[arg(short, long)]
    source: Option<SourceKind>,

    /// Avatar model manifest path or file:// URL (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Preferences file (defaults to settings.toml in the config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Do not start tracking automatically
    #[arg(long)]
    no_autostart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", facelink::NAME, facelink::VERSION);

    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Stored preferences first, CLI overrides last
    let settings_path = args.settings.clone().unwrap_or_else(Config::settings_path);
    let settings: Box<dyn SettingsStore> = match FileSettings::open(&settings_path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!("Ignoring stored preferences: {}", e);
            Box::new(MemorySettings::new())
        }
    };
    Preferences::load(settings.as_ref(), &config).apply_to(&mut config);

    if let Some(source) = args.source {
        config.tracking.source = source;
    }
    if let Some(ref url) = args.model {
        config.avatar.model = ModelDescriptor {
            name: model_name_from_url(url),
            url: url.clone(),
        };
    }

    config.validate()?;

    info!("Tracking source: {:?} @ {} Hz", config.tracking.source, config.tracking.capture_fps);
    info!("Avatar model: {} ({})", config.avatar.model.name, config.avatar.model.url);
    info!("Smoothing factor: {}", config.smoothing.factor);

    let source = create_source(&config);
    let permissions = Arc::new(StaticPermissions {
        granted: config.tracking.permission_granted,
    });
    let loader = Arc::new(ManifestLoader::default());

    let mut pipeline = Pipeline::launch(&config, source, permissions, loader);

    let view = pipeline.toggle.refresh().await.clone();
    if !view.available {
        warn!("Face tracking is not available; the avatar will stay in its neutral pose");
    } else if !args.no_autostart && !pipeline.toggle.start().await {
        if let Some(notice) = &pipeline.toggle.view().notice {
            warn!("{}", notice);
        }
    }

    shutdown_signal().await;
    info!("Shutdown signal received");

    let stats = pipeline.shutdown().await?;
    info!(
        "facelink stopped ({} frames applied, {} taps, {} motions)",
        stats.frames_applied, stats.taps, stats.motions_played
    );
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
