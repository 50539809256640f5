//! Router setup and configuration.

use axum::{Router, middleware, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::api::handlers::{health, property};
use crate::api::middleware::metrics::track_requests;
use crate::api::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    // Health routes
    let mut health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready));

    if state.config.observability.metrics_enabled {
        health_routes = health_routes.route("/metrics", get(health::metrics));
    }

    // Property resource routes
    let property_routes = Router::new()
        .route("/", get(property::index).post(property::create))
        .route(
            "/{id}",
            get(property::show)
                .put(property::upsert)
                .patch(property::patch)
                .delete(property::destroy),
        )
        .route_layer(middleware::from_fn(track_requests));

    Router::new()
        .merge(health_routes)
        .nest("/api/properties", property_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
