// Per-resource route modules, each exposing a `routes() -> Router<ServerContext>`
// mirroring everruns-api's one-module-per-resource layout.

pub mod agents;
pub mod health;
pub mod scheduler;
pub mod stats;
pub mod tasks;
pub mod workflows;

use axum::Router;

use crate::context::ServerContext;

pub fn build_router(ctx: ServerContext) -> Router {
    Router::new()
        .merge(health::routes())
        .route("/auth/token", axum::routing::post(crate::auth::auth_token))
        .route("/ws", axum::routing::get(crate::stream::ws_handler))
        .merge(tasks::routes())
        .merge(stats::routes())
        .merge(scheduler::routes())
        .merge(workflows::routes())
        .merge(agents::routes())
        .with_state(ctx)
}
