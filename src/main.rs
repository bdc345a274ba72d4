use points_ledger::{
    api, config::Config, db::init_db, ChainSource, Dispatcher, JsonRpcChainSource, Ledger,
    Repository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let chain: Arc<dyn ChainSource> = Arc::new(JsonRpcChainSource::new(
        config.rpc_url.clone(),
        config.position_manager.clone(),
        config.pool_registry.clone(),
    ));
    let ledger = Arc::new(Ledger::new(repo.clone(), chain, config.clone()));
    let dispatcher = Arc::new(Dispatcher::new(ledger));

    // Settlement notifications go to the log.
    let mut notifications = dispatcher.subscribe();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(update) => tracing::info!(
                    address = %update.address,
                    linear_points = %update.new_linear_points,
                    boosted_points = %update.new_boosted_points,
                    "Points updated"
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Notification log fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let _sweeper = dispatcher.clone().spawn_sweeper(config.sweep_interval());
    tracing::info!(
        interval_secs = config.sweep_interval_secs,
        pool = %config.tracked_pool,
        token = %config.tracked_token,
        "Periodic sweep scheduled"
    );

    // Create router
    let app = api::create_router(api::AppState::new(repo, config, dispatcher));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
