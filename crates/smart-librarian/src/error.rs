use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or parsing the summaries corpus. Always fatal at startup.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Failed to read corpus file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corpus contains no book records")]
    Empty,

    #[error("Title line without a title at line {line}")]
    MissingTitle { line: usize },
}

/// Pipeline errors. `Corpus` and `Ingest` are fatal at startup; everything
/// else resolves to a response at the request level.
#[derive(Debug, Error)]
pub enum LibrarianError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Ingest failed: {0}")]
    Ingest(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("No book titled '{0}'")]
    NotFound(String),

    #[error("Tool loop exceeded: the model kept requesting tools after {rounds} rounds")]
    ToolLoopExceeded { rounds: usize },

    #[error("Generation service error: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, LibrarianError>;
