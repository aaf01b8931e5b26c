use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("remote rejected {operation}: {}", errors.join("; "))]
    RemoteRejected { operation: String, errors: Vec<String> },

    #[error("remote returned no data for {operation}")]
    RemoteEmpty { operation: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation has no name: {0}")]
    InvalidOperation(String),

    #[error("store {0} is not registered with a domain")]
    Unbound(String),

    #[error("invalid store config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("version control error: {0}")]
    Vcs(#[from] tandem_vcs::VcsError),

    #[error("model error: {0}")]
    Model(#[from] tandem_model::ModelError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
