use axum::{
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use property_insights_api::config::Config;
use property_insights_api::handlers::{self, AppState};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading (threshold validated here, before any request).
/// - The reconciled-dataset cache.
/// - HTTP routes and middleware (CORS, tracing, body limit).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "property_insights_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Dataset cache: one entry per (source fingerprint, threshold). Capacity
    // stays tiny because the sources are two static files per session.
    let dataset_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.dataset_cache_ttl_secs))
        .max_capacity(16)
        .build();
    tracing::info!(
        "Dataset cache initialized ({}s TTL)",
        config.dataset_cache_ttl_secs
    );

    let port = config.port;
    let app_state = Arc::new(AppState {
        config,
        dataset_cache,
    });

    // API routes behind a request-size limit; the API is read-only but query
    // strings ride on GET so the limit is cheap to keep.
    let api_routes = Router::new()
        .route("/api/v1/records", get(handlers::get_records))
        .route("/api/v1/stats", get(handlers::get_stats))
        .route("/api/v1/export", get(handlers::export_records))
        .route("/api/v1/reprocess", post(handlers::reprocess))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(1024 * 1024)));

    // Build final app with health check outside the limited routes
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
