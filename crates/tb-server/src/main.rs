use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tb_server::bootstrap;
use tb_server::config::AppConfig;
use tb_server::{handler, logging};

#[derive(Parser)]
#[command(name = "tb", about = "tutor-bridge educational chat proxy")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Validate configuration file and exit.
    Validate,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Validate) => run_validate(&cli.config),
        Some(Command::Serve) | None => run_serve(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run_validate(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    bootstrap::into_runtime(config).context("config invalid")?;
    println!("Config valid: {}", path.display());
    Ok(())
}

fn run_serve(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let runtime = bootstrap::into_runtime(config).context("config invalid")?;

    logging::init(&runtime.log_level, &runtime.log_format);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(serve(runtime))
}

async fn serve(runtime: bootstrap::RuntimeConfig) -> anyhow::Result<()> {
    if runtime.upstream.api_key.is_none() {
        tracing::warn!(
            env = bootstrap::API_KEY_ENV,
            "no upstream API key configured; upstream requests will be rejected"
        );
    }

    let listen_addr = runtime.listen_addr.clone();
    let models = runtime.catalog.models().len();
    let grade_levels = runtime.catalog.grade_levels().len();
    let state = bootstrap::build_app_state(runtime)?;
    let app = handler::build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        models,
        grade_levels,
        "tutor-bridge listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// A missing file is not an error: every section has defaults.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if !path.exists() {
        eprintln!("{} not found, using built-in defaults", path.display());
        return Ok(AppConfig::default());
    }
    AppConfig::from_file(path)
        .with_context(|| format!("failed to read config {}", path.display()))
}
