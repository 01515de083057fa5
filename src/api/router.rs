use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_auth;
use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes: health, metrics and the signed processor webhook
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render))
        .route("/api/payments/capture", post(handlers::payments::capture_callback));

    // Protected API routes: Bearer token required when API_TOKEN is set
    let protected = Router::new()
        // Catalog
        .route("/api/catalog/:service_type", get(handlers::catalog::for_service_type))
        // Orders
        .route("/api/orders", get(handlers::orders::list).post(handlers::orders::create))
        .route("/api/orders/:id", get(handlers::orders::detail))
        .route("/api/orders/:id/status", post(handlers::orders::transition))
        // Offers
        .route("/api/orders/:id/offers", get(handlers::offers::list).post(handlers::offers::submit))
        .route("/api/orders/:id/offers/:offer_id/response", post(handlers::offers::respond))
        .route("/api/offers/:id/decision", post(handlers::offers::decide))
        // Tracking
        .route("/api/orders/:id/tracking", get(handlers::tracking::timeline).post(handlers::tracking::append))
        .route("/api/orders/:id/tracking/current", get(handlers::tracking::current))
        // Payments
        .route("/api/orders/:id/payment", post(handlers::payments::charge))
        // Wallet
        .route("/api/wallet", get(handlers::wallet::list))
        .route("/api/wallet/summary/:user_id", get(handlers::wallet::summary))
        .route("/api/wallet/payouts", post(handlers::wallet::payout))
        .route("/api/wallet/:tx_id/release", post(handlers::wallet::release))
        .route("/api/wallet/:tx_id/reverse", post(handlers::wallet::reverse))
        .route("/api/wallet/:tx_id/fail", post(handlers::wallet::mark_failed))
        // Messages
        .route("/api/orders/:id/messages", get(handlers::messages::thread).post(handlers::messages::send))
        .route("/api/messages/pending", get(handlers::messages::pending))
        .route("/api/messages/:id/moderation", post(handlers::messages::moderate))
        .layer(middleware::from_fn(require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
