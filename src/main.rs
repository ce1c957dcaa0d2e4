use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tours_api::config::{AppConfig, Environment};
use tours_api::database::DatabaseManager;
use tours_api::services::mailer_from_config;
use tours_api::state::AppState;

#[derive(Parser)]
#[command(name = "tours-api")]
#[command(about = "Tour booking REST API server")]
#[command(version)]
struct Args {
    #[arg(long, help = "Bind host (overrides HOST)")]
    host: Option<String>,

    #[arg(long, help = "Bind port (overrides PORT)")]
    port: Option<u16>,

    #[arg(long, env = "SKIP_MIGRATIONS", help = "Do not create tables on startup")]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config);
    tracing::info!("Starting tours-api in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database).context("invalid database configuration")?;
    if args.skip_migrations {
        tracing::info!("Skipping schema migration");
    } else {
        DatabaseManager::migrate(&pool).await.context("schema migration failed")?;
    }

    let mailer = mailer_from_config(&config.email).context("failed to build mailer")?;

    let bind_addr = config.bind_addr();
    let state = AppState::new(config, pool, mailer);
    let app = tours_api::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let default = match (config.environment, config.api.enable_request_logging) {
        (Environment::Development, _) => "tours_api=debug,tower_http=debug",
        (_, true) => "tours_api=info,tower_http=info",
        (_, false) => "tours_api=info,tower_http=warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
