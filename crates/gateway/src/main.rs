use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sa_gateway::bootstrap;
use sa_gateway::cli::{Cli, Command, ConfigAction, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            run_server().await
        }
        Some(Command::Doctor) => {
            let home = bootstrap::halo_home();
            let config = bootstrap::load_runtime_config(&home)?;
            let family = bootstrap::load_family_config(&home)?;
            let passed = sa_gateway::cli::doctor::run(&config, &family);
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand { action })) => {
            let home = bootstrap::halo_home();
            let config = bootstrap::load_runtime_config(&home)?;
            let family = bootstrap::load_family_config(&home)?;
            match action {
                ConfigAction::Validate => {
                    if !sa_gateway::cli::config::validate(&config, &family) {
                        std::process::exit(1);
                    }
                }
                ConfigAction::Show => sa_gateway::cli::config::show(&config),
            }
            Ok(())
        }
    }
}

/// Structured tracing for the `serve` command only — `doctor` and `config`
/// print directly to stdout.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sa_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server() -> anyhow::Result<()> {
    tracing::info!("halo gateway starting");

    // ── Config ───────────────────────────────────────────────────────
    let home = bootstrap::halo_home();
    let config = Arc::new(bootstrap::load_runtime_config(&home)?);
    let family = Arc::new(bootstrap::load_family_config(&home)?);
    bootstrap::validate_configs(&config, &family)?;
    tracing::info!(home = %home.display(), "config loaded and validated");

    // ── App state ────────────────────────────────────────────────────
    let state = bootstrap::build_app_state(config.clone(), family).await?;
    tracing::info!("app state ready");

    // ── Background tasks ─────────────────────────────────────────────
    bootstrap::spawn_background_tasks(&state);

    // ── Router ───────────────────────────────────────────────────────
    let app = sa_gateway::api::router(state)
        .into_make_service_with_connect_info::<SocketAddr>();

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("binding to {addr}: {e}"))?;

    tracing::info!(addr = %addr, "halo gateway listening (loopback-only admin routes)");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("axum server error: {e}"))?;

    Ok(())
}
