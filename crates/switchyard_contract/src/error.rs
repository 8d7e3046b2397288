use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContractError>;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("contract store error: {0}")]
    Store(String),

    #[error("no contract defined for agent '{0}'")]
    UnknownAgent(String),
}
