use std::sync::Arc;

use chess_club_backend::api::{self, AppState};
use chess_club_backend::auth;
use chess_club_backend::config::{self, Config};
use chess_club_backend::db::Database;
use chess_club_backend::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    config::set_production(config.production);
    metrics::register_metrics();

    let admin_password_hash = match (&config.admin_password_hash, &config.admin_password) {
        (Some(hash), _) => Some(hash.clone()),
        (None, Some(password)) => {
            Some(auth::hash_password(password).expect("Failed to hash ADMIN_PASSWORD"))
        }
        (None, None) => {
            tracing::warn!("No ADMIN_PASSWORD configured; admin routes are unreachable");
            None
        }
    };

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    let state = AppState {
        db: db.clone(),
        admin_password_hash,
        token_ttl_hours: config.token_ttl_hours,
    };
    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
    }
    let app = api::router(state, config.static_dir.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(
        production = config.production,
        "Chess club backend listening on port {}",
        config.port
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    db.close().await;
    tracing::info!("Database closed, bye");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
