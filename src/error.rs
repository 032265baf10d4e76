//! Error taxonomy for the routing and page-I/O core.

use thiserror::Error;

pub type DoraResult<T> = Result<T, DoraError>;

#[derive(Debug, Error)]
pub enum DoraError {
    #[error("invalid path '{0}': must match ^[A-Za-z0-9]+://")]
    InvalidPath(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("registry unavailable: no endpoint in {hosts:?} could be reached")]
    RegistryUnavailable { hosts: Vec<String> },

    #[error("registry prefix '{prefix}' returned no workers")]
    RegistryEmpty { prefix: String },

    #[error("failed to decode worker entity: {0}")]
    WorkerInfoParse(String),

    #[error("routing error: expected {expected} worker(s), got {actual}")]
    Routing { expected: usize, actual: usize },

    #[error("page read failed for path_id={path_id} page={page_index}: {source}")]
    PageRead {
        path_id: String,
        page_index: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("page write failed for path_id={path_id} page={page_index}: {reason}")]
    PageWrite {
        path_id: String,
        page_index: u64,
        reason: String,
    },

    #[error("file status request failed for '{path}': {source}")]
    FileStatus {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("stat response for '{path}' is missing required field '{field}'")]
    StatParse { path: String, field: String },

    #[error("load protocol error for '{path}': {reason}")]
    LoadProtocol { path: String, reason: String },

    #[error("load request failed for '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
