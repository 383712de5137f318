use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use wabridge::config::{self, TransportMode};
use wabridge::credentials::CredentialStore;
use wabridge::routes;
use wabridge::session::SessionManager;
use wabridge::state::AppState;
use wabridge::transport::{LoopbackTransport, Transport};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wabridge", about = "Single-session WhatsApp bridge", version)]
struct Cli {
    /// Path to TOML config file (default: the platform config directory)
    #[arg(short, long)]
    config: Option<String>,

    /// Bind host override
    #[arg(long)]
    host: Option<String>,

    /// Bind port override
    #[arg(long)]
    port: Option<u16>,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging from RUST_LOG (default: info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wabridge=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        cfg.host = host;
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }

    let api_key = cfg.api_key.clone().context(
        "no API key configured — set `api_key` in config.toml or the WABRIDGE_API_KEY env var",
    )?;

    let transport: Arc<dyn Transport> = match cfg.transport {
        TransportMode::Loopback => Arc::new(LoopbackTransport),
    };
    let store = CredentialStore::new(cfg.credentials_path.clone());
    let session = Arc::new(SessionManager::new(
        transport,
        store,
        cfg.reconnect_policy(),
        cfg.addressing(),
    ));

    session.clone().start().await;

    let state = AppState::new(api_key, session.clone());
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr()))?;
    let addr = listener.local_addr()?;

    info!("wabridge listening on http://{addr}");
    info!("  GET  /health        — liveness (public)");
    info!("  GET  /status        — connection status");
    info!("  GET  /qr            — pairing QR code");
    info!("  POST /send-message  — {{\"to\": \"...\", \"message\": \"...\"}}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.shutdown().await;
    info!("wabridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
