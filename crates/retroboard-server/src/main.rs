//! Retroboard server entry point.
//!
//! Runs one visual program at a time on a pixel display and accepts JSON
//! control messages over WebSocket.
//!
//! # Usage
//!
//! ```text
//! retroboard-server [OPTIONS]
//!
//! Options:
//!   -c, --config  <PATH>   TOML configuration file [default: retroboard.toml]
//!       --state   <PATH>   State file (overrides [manager].state_path)
//!       --bind    <ADDR>   Control bind address (overrides [control].bind_address)
//!       --port    <PORT>   Control port (overrides [control].port)
//!       --width   <PX>     Display width (overrides [display].width)
//!       --height  <PX>     Display height (overrides [display].height)
//!       --program <NAME>   Program for the very first launch
//! ```
//!
//! Every option can also be set through a `RETROBOARD_*` environment
//! variable; CLI arguments take precedence.
//!
//! # Architecture overview
//!
//! ```text
//! main()
//!  ├─ load ServerConfig, apply CLI overrides, init tracing
//!  ├─ ApplicationManager::restore() + resume()
//!  ├─ control server (Tokio task)  ── CommandSender ──► queue
//!  │                               ◄── watch<ManagerStatus>
//!  └─ manager.run() on a blocking thread until Ctrl-C
//! ```

use std::path::PathBuf;
use std::sync::{atomic::Ordering, Arc};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use retroboard_core::{DisplaySurface, SimulatedSurface};
use retroboard_server::application::manager::ApplicationManager;
use retroboard_server::infrastructure::control::{bind, serve, ControlHandler};
use retroboard_server::infrastructure::programs::builtin_registry;
use retroboard_server::infrastructure::storage::config::{load_config, ServerConfig};
use retroboard_server::infrastructure::storage::state_store::JsonStateStore;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Retroboard application server.
#[derive(Debug, Parser)]
#[command(
    name = "retroboard-server",
    about = "Runs visual programs on a shared pixel display",
    version
)]
struct Cli {
    /// TOML configuration file.  Missing file means built-in defaults.
    #[arg(short, long, default_value = "retroboard.toml", env = "RETROBOARD_CONFIG")]
    config: PathBuf,

    /// Path of the JSON state file.
    #[arg(long, env = "RETROBOARD_STATE")]
    state: Option<PathBuf>,

    /// IP address the control server binds to.
    #[arg(long, env = "RETROBOARD_BIND")]
    bind: Option<String>,

    /// TCP port of the control server.
    #[arg(long, env = "RETROBOARD_PORT")]
    port: Option<u16>,

    /// Display width in pixels.
    #[arg(long, env = "RETROBOARD_WIDTH")]
    width: Option<usize>,

    /// Display height in pixels.
    #[arg(long, env = "RETROBOARD_HEIGHT")]
    height: Option<usize>,

    /// Program started when no saved state exists.
    #[arg(long, env = "RETROBOARD_PROGRAM")]
    program: Option<String>,
}

impl Cli {
    /// Overrides `config` with every option given on the command line.
    fn apply_to(self, config: &mut ServerConfig) {
        if let Some(state) = self.state {
            config.manager.state_path = state;
        }
        if let Some(bind) = self.bind {
            config.control.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.control.port = port;
        }
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if let Some(program) = self.program {
            config.manager.default_program = Some(program);
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let mut config = load_config(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    cli.apply_to(&mut config);

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.manager.log_level)),
        )
        .init();

    let (width, height) = (config.display.width, config.display.height);
    if width == 0 || height == 0 {
        bail!("display dimensions must be non-zero, got {width}x{height}");
    }
    info!(width, height, "Retroboard server starting");

    // ── Display, registry, manager ────────────────────────────────────────────
    let registry = Arc::new(builtin_registry());
    let mut surface = SimulatedSurface::new(width, height);
    surface.set_brightness(config.display.brightness);

    let store = JsonStateStore::new(&config.manager.state_path);
    info!(path = %store.path().display(), "using state file");

    let mut manager = ApplicationManager::new(
        Arc::clone(&registry),
        Box::new(surface),
        Box::new(store),
        config.manager.options(),
    );
    manager.restore();
    match manager.resume(config.manager.default_program.as_deref()) {
        Some(program) => info!(program = %program, "program resumed"),
        None => info!("no program to resume; waiting for commands"),
    }

    // ── Control server ────────────────────────────────────────────────────────
    let running = manager.running_flag();
    let control_addr = config
        .control
        .socket_addr()
        .context("invalid control address")?;
    let listener = bind(control_addr).await?;
    let handler = ControlHandler::new(manager.sender(), manager.subscribe(), Arc::clone(&registry));
    let server = tokio::spawn(serve(listener, handler, Arc::clone(&running)));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── Run loop ──────────────────────────────────────────────────────────────
    info!("Retroboard ready.  Press Ctrl-C to exit.");
    tokio::task::spawn_blocking(move || manager.run())
        .await
        .context("application manager thread failed")?;

    running.store(false, Ordering::Relaxed);
    if let Err(e) = server.await {
        error!("control server task failed: {e}");
    }

    info!("Retroboard server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
