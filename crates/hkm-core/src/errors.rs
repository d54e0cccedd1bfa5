/// Core error type for the API client workspace.
///
/// Ordinary request failures never surface here: they are folded into an
/// [`ApiResponse`](crate::response::ApiResponse). This type covers setup
/// problems (config) and the side channels (file source, I/O).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
