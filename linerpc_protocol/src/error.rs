/// Errors produced while decoding, dispatching, or transporting calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The byte stream does not contain a well-formed envelope.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("message too large ({size} bytes buffered, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("network error: {0}")]
    Network(String),

    /// Dispatch failed to resolve the dotted method name.
    #[error("{0}")]
    MethodNotFound(String),

    #[error("rpc: invalid params: {0}")]
    InvalidParams(String),

    /// Business error raised by a service function.
    #[error("{0}")]
    Service(String),

    /// Error message carried back in a reply.
    #[error("{0}")]
    Server(String),
}

impl Error {
    /// Whether the error leaves the connection unusable.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Decode(_) | Error::MessageTooLarge { .. } | Error::Network(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
