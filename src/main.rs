//! logbook - activity gateway for Mon journal de bord

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logbook::{
    config::Args,
    db::{MongoClient, RetryPolicy, Store},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("logbook={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  logbook - Mon journal de bord");
    info!("  activity gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Allowed source: {}", args.allowed_source);
    info!("Languages: {} (default {})", args.supported_langs, args.default_lang);
    info!(
        "Rate limit: {} requests / {}s",
        args.rate_limit_max, args.rate_limit_window_secs
    );
    info!("======================================");

    // Connect to MongoDB with bounded retries (optional in dev mode)
    let retry = RetryPolicy {
        attempts: args.store_connect_retries,
        delay: Duration::from_millis(args.store_retry_delay_ms),
    };
    let store = match MongoClient::connect_with_retry(&args.mongodb_uri, &args.mongodb_db, &retry)
        .await
    {
        Ok(client) => match Store::new(&client).await {
            Ok(store) => {
                info!("Record store ready");
                Some(store)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("Collection setup failed (dev mode, continuing without): {}", e);
                    None
                } else {
                    error!("Collection setup failed: {}", e);
                    std::process::exit(1);
                }
            }
        },
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Create application state
    let state = Arc::new(server::AppState::new(args, store));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
