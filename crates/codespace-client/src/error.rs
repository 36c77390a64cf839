use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("credential rejected by the remote API")]
    Auth,

    #[error("transient remote failure: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config write conflict: version token no longer matches")]
    Conflict,

    #[error("remote rejected the request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode remote response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
