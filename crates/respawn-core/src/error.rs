use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("tenant '{0}' has an empty credential")]
    EmptyCredential(String),

    #[error("cannot derive a notification target from tenant id '{0}'")]
    InvalidNotificationTarget(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
