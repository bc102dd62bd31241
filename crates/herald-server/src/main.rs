mod gateway;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use herald_notify::Notifier;
use herald_notify::dispatcher::Dispatcher;
use herald_notify::hooks::HookRegistry;
use herald_notify::settings::Settings;
use herald_notify::trigger;

use routes::AppStateInner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("HERALD_DB_PATH").unwrap_or_else(|_| "herald.db".into());
    let host = std::env::var("HERALD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HERALD_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let settings = Settings::from_env()?;

    // Init database
    let db = Arc::new(herald_db::Database::open(&PathBuf::from(&db_path))?);

    // Notification pipeline
    let dispatcher = Dispatcher::new();
    let notifier = Notifier::new(db.clone(), settings.clone(), dispatcher.clone());
    let hooks = HookRegistry::new();
    let _installation = trigger::install(&hooks, &notifier).await;
    info!("After-save hooks: {:?}", hooks.names().await);

    tokio::spawn(log_events(dispatcher.clone()));

    let state = Arc::new(AppStateInner { db, hooks, settings, dispatcher });

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Herald server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Trace every broadcast event, alongside the per-user event streams.
async fn log_events(dispatcher: Dispatcher) {
    let mut rx = dispatcher.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => debug!(room_id = ?event.room_id(), "event: {:?}", event),
            Err(RecvError::Lagged(n)) => warn!("Event logger lagged, skipped {} events", n),
            Err(RecvError::Closed) => break,
        }
    }
}
