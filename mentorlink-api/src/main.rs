//! mentorlink-api - mentoring program record service
//!
//! Stores the nested academic-session documents and serves the mutation,
//! aggregation and report endpoints for the mentoring program.

use anyhow::Result;
use mentorlink_common::{config, db};
use mentorlink_api::{build_router, AppState};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting MentorLink record service (mentorlink-api) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let root_folder = config::resolve_root_folder();
    config::ensure_root_folder(&root_folder)?;

    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match db::init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool);
    let app = build_router(state);

    let port = config::resolve_port();
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("mentorlink-api listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
