use anyhow::{Context, Result};

use smart_librarian_server::router;
use smart_librarian_server::startup::{
    api_key_from_env, build_embedder, build_model, build_state, build_store, init_tracing,
    load_config,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config()?;
    let api_key = api_key_from_env()?;

    tracing::info!(corpus = %config.corpus_path.display(), "Initializing Smart Librarian database...");
    let embedder = build_embedder(&config, &api_key)?;
    let store = build_store(&config).await?;
    let model = build_model(&config, &api_key)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config, embedder, store, model).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Smart Librarian API listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
