//! Facerig - Real-time face tracking to 3D avatar head retargeting
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use facerig::{
    avatar::load_avatar,
    config::Config,
    render::{Camera, HeadlessRenderer, IntervalScheduler, RenderLoop, SystemClock},
    retarget::RetargetState,
    tracking::{initialize_replay, initialize_tracking},
};

/// Facerig - drive a 3D avatar head from live face tracking
#[derive(Parser, Debug)]
#[command(name = "facerig", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Avatar model path (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Replay recorded tracking packets instead of the live helper
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Render the avatar at rest without face tracking
    #[arg(long)]
    no_tracking: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render refresh rate in Hz (overrides config)
    #[arg(long)]
    refresh_hz: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
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

    info!("Starting {} v{}", facerig::NAME, facerig::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            Config::from_file(path)?
        }
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(model) = &args.model {
        config.avatar.model_path = model.clone();
    }
    if let Some(hz) = args.refresh_hz {
        config.render.refresh_hz = hz;
    }
    if args.no_tracking {
        config.tracking.enabled = false;
    }
    if args.replay.is_some() {
        // Replay stands in for the helper entirely
        config.tracking.enabled = true;
        config.tracking.auto_launch = false;
    }

    config.validate()?;

    // Tokio runtime for tracking initialization and signal handling; the
    // render loop itself stays on the main thread
    let runtime = tokio::runtime::Runtime::new()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        runtime.spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    let mut avatar = match load_avatar(&config.avatar.model_path) {
        Ok(avatar) => avatar,
        Err(e) => {
            error!("Failed to load avatar: {}", e);
            return Err(e.into());
        }
    };
    if avatar.normalize(config.avatar.target_size).is_none() {
        warn!("Avatar has no geometry bounds; skipping normalization");
    }

    let state = RetargetState::new(avatar);
    info!(
        "Avatar ready ({} meshes with morph targets)",
        state.meshes().len()
    );

    let renderer = HeadlessRenderer::new(config.render.width, config.render.height);
    let camera = Camera::from_config(&config.render);
    let mut render_loop = RenderLoop::new(state, renderer, camera);

    if config.tracking.enabled {
        let (tx, rx) = tokio::sync::oneshot::channel();
        render_loop.await_tracking(rx);

        match args.replay.clone() {
            Some(path) => {
                let result = initialize_replay(&path, Arc::new(SystemClock::new()));
                let _ = tx.send(result);
            }
            None => {
                let tracking = config.tracking.clone();
                let camera = config.camera.clone();
                runtime.spawn(async move {
                    let _ = tx.send(initialize_tracking(tracking, camera).await);
                });
            }
        }
    } else {
        info!("Face tracking disabled; rendering at rest pose");
    }

    let mut scheduler = IntervalScheduler::new(config.render.refresh_hz, Arc::clone(&shutdown));
    render_loop.run(&mut scheduler);

    // Dropping the loop releases the tracking session and its helper process
    drop(render_loop);
    runtime.shutdown_timeout(std::time::Duration::from_secs(3));

    info!("Facerig stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
