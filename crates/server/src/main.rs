// Meridian API server entry point.

use anyhow::Context;
use server::{ServerConfig, ServerContext};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let ctx = ServerContext::bootstrap(&config).await.context("failed to bootstrap server context")?;

    if config.scheduler_enabled {
        ctx.scheduler.spawn_tick_loop();
        tracing::info!("scheduler tick loop started");
    }

    let app = server::app(ctx);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind listener")?;
    tracing::info!(%addr, "meridian-server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
