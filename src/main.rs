use std::sync::Arc;

use tokio::net::TcpListener;

use agromart_server::config::{generate_config_template, Config};
use agromart_server::fanout::FanoutDispatcher;
use agromart_server::mail::{Mailer, SmtpMailer};
use agromart_server::presence::PresenceRegistry;
use agromart_server::routes::build_router;
use agromart_server::state::AppState;
use agromart_server::db;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "agromart_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "agromart_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("AgroMart server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Outbound mail: optional, disabled unless configured
    let mailer: Option<Arc<dyn Mailer>> = match &config.smtp {
        Some(smtp) => SmtpMailer::from_config(smtp)?
            .map(|m| Arc::new(m) as Arc<dyn Mailer>),
        None => None,
    };
    if mailer.is_some() {
        tracing::info!("Email notification fallback enabled");
    }

    // Presence registry starts empty; clients re-announce on connect
    let presence = Arc::new(PresenceRegistry::new());
    let dispatcher = Arc::new(FanoutDispatcher::new(presence.clone(), mailer));

    let state = AppState {
        db,
        presence,
        dispatcher,
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {} (WebSocket at {})", addr, "/ws");

    axum::serve(listener, app).await?;

    Ok(())
}
