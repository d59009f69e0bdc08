use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::app::AppState;
use crate::settings::Settings;

mod app;
mod guard;
mod routes;
mod sessions;
mod settings;
mod views;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,web=debug,auth=debug")),
        )
        .init();

    let settings = Settings::new().context("failed to load settings")?;
    let state = match AppState::from_settings(&settings) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("refusing to start: {:#}", e);
            return Err(e);
        }
    };

    tokio::runtime::Runtime::new()
        .context("failed to start tokio runtime")?
        .block_on(launch_server(settings, state))
}

async fn launch_server(settings: Settings, state: AppState) -> anyhow::Result<()> {
    let router = routes::router(state);

    let addr = settings.server.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await
        .context("server error")
}
