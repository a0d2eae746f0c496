use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use datasheet_rag::api;
use datasheet_rag::config::Config;
use datasheet_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Index directory: {}", config.index_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let state = AppState::new(config.clone())?;
    if state.index.store().is_empty() {
        tracing::warn!("Vector store is empty; run the ingest binary first");
    }

    let app = Router::new()
        .route("/", get(serve_index))
        .route("/chat", post(api::chat::chat))
        .route("/api/scopes", get(api::scopes::list_scopes))
        .route("/health", get(api::scopes::health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}
