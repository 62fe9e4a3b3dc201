use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::billing::api;

pub fn api_routes() -> Router {
    Router::new()
        .route(
            "/api/pricing-tiers",
            get(api::list_tiers).post(api::create_tier),
        )
        .route("/api/pricing-tiers/:id", patch(api::update_tier))
        .route("/api/pricing-tiers/:id/sync", post(api::sync_single_tier))
        .route("/api/billing/sync", post(api::sync_catalog))
        .route("/api/billing/catalog-status", get(api::catalog_status))
}
