//! HTTP routes for the Smart Librarian API.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use smart_librarian::{load_corpus, ChatResponse, ConversationTurn, DatabaseInfo};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Option<Vec<ConversationTurn>>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookEntry {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct ReinitializeResponse {
    pub message: String,
    pub database_info: DatabaseInfo,
}

/// Error body in the `{ "detail": ... }` shape clients already expect.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn internal(context: &str, error: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{}: {}", context, error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/books", get(list_books))
        .route("/chat", post(chat))
        .route("/database/info", get(database_info))
        .route("/database/reinitialize", post(reinitialize_database))
        .route("/book/:title", get(book_summary))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if parsed.is_empty() || origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(parsed)
    }
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    let provider = state.orchestrator.model_info();
    Json(json!({
        "message": "Smart Librarian API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-powered book recommendation chatbot",
        "model": { "provider": provider.name, "name": provider.model },
        "endpoints": {
            "chat": "/chat",
            "books": "/books",
            "book": "/book/{title}",
            "database": "/database/info",
            "reinitialize": "/database/reinitialize",
            "health": "/health"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let library = state.library.read().await;
    let timestamp = chrono::Utc::now().to_rfc3339();
    match library.database_info().await {
        Ok(info) => {
            let database_status = if info.document_count > 0 { "connected" } else { "empty" };
            Json(json!({
                "status": "healthy",
                "database_status": database_status,
                "database_info": info,
                "timestamp": timestamp,
            }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read the vector store");
            Json(json!({
                "status": "unhealthy",
                "error": format!("{:#}", e),
                "timestamp": timestamp,
            }))
        }
    }
}

async fn list_books(State(state): State<AppState>) -> Json<Vec<BookEntry>> {
    let library = state.library.read().await;
    let books = library
        .catalog()
        .books()
        .iter()
        .map(|book| BookEntry {
            title: book.title.clone(),
            summary: book.summary.clone(),
        })
        .collect();
    Json(books)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Message must not be empty"));
    }

    let history = match (&request.session_id, request.conversation_history) {
        (_, Some(history)) if !history.is_empty() => history,
        (Some(session_id), _) => state.sessions.history(session_id),
        _ => Vec::new(),
    };

    tracing::info!(
        chars = request.message.len(),
        history = history.len(),
        session = request.session_id.is_some(),
        "📨 Chat request"
    );

    let response = {
        let library = state.library.read().await;
        state
            .orchestrator
            .chat(&library, &request.message, &history)
            .await
    };

    if let Some(session_id) = &request.session_id {
        if response.success && !response.filtered {
            state.sessions.record(
                session_id,
                ConversationTurn::user(request.message.as_str()),
                ConversationTurn::assistant(response.message.as_str()),
            );
        }
    }

    Ok(Json(response))
}

async fn database_info(State(state): State<AppState>) -> Result<Json<DatabaseInfo>, ApiError> {
    let library = state.library.read().await;
    library
        .database_info()
        .await
        .map(Json)
        .map_err(|e| ApiError::internal("Error fetching database info", format!("{:#}", e)))
}

async fn reinitialize_database(
    State(state): State<AppState>,
) -> Result<Json<ReinitializeResponse>, ApiError> {
    let corpus_path = state.config.corpus_path.clone();
    tracing::info!(path = %corpus_path.display(), "Reinitializing database");

    // Parse before locking; a bad corpus leaves the current library untouched.
    let records = load_corpus(&corpus_path)
        .map_err(|e| ApiError::internal("Error reinitializing database", e))?;

    let mut library = state.library.write().await;
    library
        .reload(records)
        .await
        .map_err(|e| ApiError::internal("Error reinitializing database", e))?;
    let info = library
        .database_info()
        .await
        .map_err(|e| ApiError::internal("Error reinitializing database", format!("{:#}", e)))?;

    tracing::info!(books = info.document_count, "Database reinitialized");
    Ok(Json(ReinitializeResponse {
        message: "Database reinitialized successfully".to_string(),
        database_info: info,
    }))
}

async fn book_summary(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> Result<Json<BookEntry>, ApiError> {
    let library = state.library.read().await;
    let catalog = library.catalog();
    match catalog.get_summary_by_title(&title) {
        Ok(summary) => Ok(Json(BookEntry {
            summary: summary.to_string(),
            title,
        })),
        Err(_) => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            catalog.not_found_message(&title),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use smart_librarian::config::StoreBackend;
    use smart_librarian::llm::ModelResponse;
    use smart_librarian::{
        BookRecord, ContentFilter, HashingEmbedder, LibrarianConfig, Library, MemoryStore,
        Orchestrator, ScriptedModel, VectorIndex,
    };
    use std::io::Write;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn records() -> Vec<BookRecord> {
        vec![
            BookRecord::new("1984", "A dystopian novel about Big Brother and total surveillance."),
            BookRecord::new("The Hobbit", "Bilbo Baggins joins a quest to reclaim a dragon's hoard."),
            BookRecord::new("Emma", "A young woman's misguided matchmaking in a country village."),
        ]
    }

    async fn state_with(model: Arc<ScriptedModel>, config: LibrarianConfig) -> AppState {
        let index = VectorIndex::new(Arc::new(HashingEmbedder::new(64)), Arc::new(MemoryStore::new()));
        let library = Library::build(records(), index).await.unwrap();
        let orchestrator = Orchestrator::new(ContentFilter::default(), model, config.pipeline_settings());
        AppState::new(library, orchestrator, config)
    }

    fn memory_config() -> LibrarianConfig {
        let mut config = LibrarianConfig::default();
        config.vector_store.backend = StoreBackend::Memory;
        config
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_connected() {
        let state = state_with(Arc::new(ScriptedModel::new(vec![])), memory_config()).await;
        let (status, body) = send(router(state), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database_status"], "connected");
        assert_eq!(body["database_info"]["document_count"], 3);
        assert_eq!(body["database_info"]["collection_name"], "book_summaries");
    }

    #[tokio::test]
    async fn test_root_lists_endpoints_and_model() {
        let state = state_with(Arc::new(ScriptedModel::new(vec![])), memory_config()).await;
        let (status, body) = send(router(state), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Smart Librarian API");
        assert_eq!(body["endpoints"]["chat"], "/chat");
        assert_eq!(body["model"]["provider"], "scripted");
    }

    #[tokio::test]
    async fn test_books_in_corpus_order() {
        let state = state_with(Arc::new(ScriptedModel::new(vec![])), memory_config()).await;
        let (status, body) = send(router(state), get("/books")).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["1984", "The Hobbit", "Emma"]);
    }

    #[tokio::test]
    async fn test_book_lookup_and_not_found() {
        let state = state_with(Arc::new(ScriptedModel::new(vec![])), memory_config()).await;
        let app = router(state);

        let (status, body) = send(app.clone(), get("/book/The%20Hobbit")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "The Hobbit");
        assert!(body["summary"].as_str().unwrap().contains("Bilbo"));

        let (status, body) = send(app, get("/book/Dune")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Sorry, I don't have a detailed summary for 'Dune'"));
    }

    #[tokio::test]
    async fn test_chat_runs_tool_call() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_call("get_summary_by_title", json!({"title": "1984"})),
            ModelResponse::Content("I recommend 1984.".into()),
        ]));
        let state = state_with(model.clone(), memory_config()).await;
        let (status, body) = send(
            router(state),
            post_json("/chat", json!({"message": "Something about surveillance?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["filtered"], false);
        assert_eq!(body["message"], "I recommend 1984.");
        assert_eq!(body["function_calls"][0]["name"], "get_summary_by_title");
        assert_eq!(body["search_results"].as_array().unwrap().len(), 3);
        assert!(body.get("error").is_none());
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_chat_blocked_message() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let state = state_with(model.clone(), memory_config()).await;
        let (status, body) = send(
            router(state),
            post_json("/chat", json!({"message": "you are a fucking idiot"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["filtered"], true);
        assert!(body["function_calls"].as_array().unwrap().is_empty());
        assert!(body["search_results"].as_array().unwrap().is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let state = state_with(Arc::new(ScriptedModel::new(vec![])), memory_config()).await;
        let (status, _) = send(router(state), post_json("/chat", json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_history_is_replayed() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse::Content("Try The Hobbit.".into()),
            ModelResponse::Content("It is about a dragon.".into()),
        ]));
        let state = state_with(model.clone(), memory_config()).await;
        let app = router(state.clone());

        send(
            app.clone(),
            post_json("/chat", json!({"message": "A fantasy book?", "session_id": "s1"})),
        )
        .await;
        let (_, body) = send(
            app,
            post_json("/chat", json!({"message": "What is it about?", "session_id": "s1"})),
        )
        .await;

        assert_eq!(body["message"], "It is about a dragon.");
        assert_eq!(state.sessions.history("s1").len(), 4);
        let sent = &model.received()[1];
        assert!(sent.iter().any(|m| m.content.as_deref() == Some("Try The Hobbit.")));
    }

    #[tokio::test]
    async fn test_reinitialize_swaps_corpus() {
        let mut corpus = tempfile::NamedTempFile::new().unwrap();
        writeln!(corpus, "## Title: Dune\nSpice, sand and prophecy.\n\n## Title: Emma\nMatchmaking.").unwrap();
        let mut config = memory_config();
        config.corpus_path = corpus.path().to_path_buf();

        let state = state_with(Arc::new(ScriptedModel::new(vec![])), config).await;
        let app = router(state);

        let (status, body) = send(app.clone(), post_json("/database/reinitialize", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Database reinitialized successfully");
        assert_eq!(body["database_info"]["document_count"], 2);

        let (status, _) = send(app, get("/book/Dune")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reinitialize_failure_keeps_library() {
        let mut config = memory_config();
        config.corpus_path = "/nonexistent/book_summaries.txt".into();
        let state = state_with(Arc::new(ScriptedModel::new(vec![])), config).await;
        let app = router(state);

        let (status, body) = send(app.clone(), post_json("/database/reinitialize", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().starts_with("Error reinitializing database"));

        let (_, body) = send(app, get("/database/info")).await;
        assert_eq!(body["document_count"], 3);
    }
}
