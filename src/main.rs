//! Fire Sessions - hookah lounge workflow engine
//!
//! HTTP backend driving each table's session through the
//! READY, OUT, DELIVERED, ACTIVE and CLOSE stages, gated by staff
//! permissions and trust levels, with every change audited.

mod api;
mod audit;
mod config;
mod db;
mod runtime;
mod state_machine;
mod trust;

use api::{create_router, AppState};
use config::{Config, StoreBackend};
use db::Database;
use runtime::{
    AuditStore, MemoryAuditLog, MemorySessionStore, RuntimeOptions, SessionStore,
    WorkflowRuntime,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use trust::UserDirectory;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fire_sessions=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();

    let (sessions, audit): (Arc<dyn SessionStore>, Arc<dyn AuditStore>) = match config.store {
        StoreBackend::Memory => {
            tracing::info!(audit_capacity = config.audit_capacity, "Using in-memory store");
            (
                Arc::new(MemorySessionStore::new()),
                Arc::new(MemoryAuditLog::new(config.audit_capacity)),
            )
        }
        StoreBackend::Sqlite => {
            // Ensure database directory exists
            if let Some(parent) = config.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %config.db_path.display(), "Opening database");
            let db = Arc::new(Database::open(&config.db_path, config.audit_capacity)?);
            (db.clone(), db)
        }
    };

    let runtime = WorkflowRuntime::new(
        sessions,
        audit,
        UserDirectory::demo(),
        RuntimeOptions {
            enforce_trust: config.enforce_trust,
        },
    );

    if config.seed > 0 {
        let total = runtime.seed_sessions(config.seed, false).await?;
        tracing::info!(seeded = config.seed, total, "Seeded demo sessions");
    }

    let state = AppState::new(runtime);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        enforce_trust = config.enforce_trust,
        "Fire sessions server listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
