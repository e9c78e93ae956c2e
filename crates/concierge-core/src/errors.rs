/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can turn every failure into the right user-facing reply without knowing
/// which backend produced it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("rate limited by upstream service")]
    RateLimited,

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
