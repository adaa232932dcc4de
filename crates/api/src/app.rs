use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::ReviewStore;
use persistence::files::ExportFileStore;
use persistence::repositories::PgReviewStore;

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{export_jobs, health, reviews};
use crate::services::ReconciliationService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub engine: Arc<ReconciliationService>,
    pub files: ExportFileStore,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    let config = Arc::new(config);

    // Create rate limiter if rate limiting is enabled (rate_limit_per_minute > 0)
    let rate_limiter = if config.security.rate_limit_per_minute > 0 {
        Some(Arc::new(RateLimiterState::new(
            config.security.rate_limit_per_minute,
        )))
    } else {
        None
    };

    let files = ExportFileStore::new(&config.storage.export_root);
    let store: Arc<dyn ReviewStore> = Arc::new(PgReviewStore::new(pool.clone()));
    let engine = Arc::new(ReconciliationService::new(store, files.clone()));

    let state = AppState {
        pool,
        config: config.clone(),
        engine,
        files,
        rate_limiter,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Production: only allow specified origins
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Operator and sourcing-callback routes under /api/v1. Identity comes
    // from the x-operator-id header; handlers reject requests without it,
    // and rate limiting is keyed on it.
    let v1_routes = Router::new()
        .route(
            "/api/v1/export-jobs",
            get(export_jobs::list_export_jobs).post(export_jobs::create_export_job),
        )
        .route(
            "/api/v1/export-jobs/:log_id/leads",
            get(export_jobs::list_export_file_leads),
        )
        .route(
            "/api/v1/export-jobs/:log_id/file",
            put(export_jobs::store_export_file),
        )
        .route(
            "/api/v1/export-jobs/:log_id/fail",
            post(export_jobs::fail_export_job),
        )
        .route(
            "/api/v1/export-jobs/:log_id/reviews/accept",
            post(reviews::accept_reviews),
        )
        .route(
            "/api/v1/export-jobs/:log_id/reviews/reject",
            post(reviews::reject_reviews),
        )
        .route(
            "/api/v1/leads/:lead_id/review/undo",
            post(reviews::undo_review),
        )
        .route("/api/v1/reviews/recent", get(reviews::recent_reviews))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Public routes (no operator identity required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    // Merge all routes
    Router::new()
        .merge(public_routes)
        .merge(v1_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware)) // Security headers
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
