// The HTTP/WebSocket front door: wires `ServerContext` into axum route
// modules, one per resource, matching `everruns-api`'s layout.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod stream;

pub use config::ServerConfig;
pub use context::ServerContext;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Assembles the full router: resource routes, Swagger UI, CORS and request
/// tracing. Split out from `main` so integration tests can drive it with
/// `tower::ServiceExt::oneshot` without a bound socket.
pub fn app(ctx: ServerContext) -> Router {
    routes::build_router(ctx)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", openapi::ApiDoc::openapi()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
