use std::sync::Arc;
use tokio::sync::RwLock;

use smart_librarian::{LibrarianConfig, Library, Orchestrator, SessionStore};

/// Shared server state. Requests hold the library read guard while they run;
/// reinitialisation takes the write guard.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<RwLock<Library>>,
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<LibrarianConfig>,
}

impl AppState {
    pub fn new(library: Library, orchestrator: Orchestrator, config: LibrarianConfig) -> Self {
        Self {
            library: Arc::new(RwLock::new(library)),
            orchestrator: Arc::new(orchestrator),
            sessions: Arc::new(SessionStore::new(config.conversation.session_capacity)),
            config: Arc::new(config),
        }
    }
}
