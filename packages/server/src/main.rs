use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use axum::http::{HeaderValue, Method, header};
use common::storage::FilesystemBlobStore;
use photovault_server::config::{AppConfig, CorsConfig};
use photovault_server::state::AppState;
use photovault_server::{build_router, database, seed};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    if config.auth.jwt_secret.trim().is_empty() {
        bail!("auth.jwt_secret is empty; set PHOTOVAULT__AUTH__JWT_SECRET");
    }

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    seed::ensure_indexes(&db)
        .await
        .context("Failed to create database indexes")?;
    seed::ensure_admin_user(&db, &config.admin)
        .await
        .context("Failed to bootstrap admin user")?;

    let blob_store = FilesystemBlobStore::new(
        config.storage.root.clone(),
        config.storage.max_upload_size,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to initialize storage root {}",
            config.storage.root.display()
        )
    })?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    let cors = cors_layer(&config.server.cors);

    let state = AppState {
        db,
        config,
        blob_store: Arc::new(blob_store),
    };

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("PhotoVault listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cors
        .allow_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::IF_NONE_MATCH])
        .expose_headers([header::ETAG, header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(cors.max_age))
}
