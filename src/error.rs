//! Error types for Ledgerchain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error(
        "Insufficient funds: transaction {tx} needs {required} from {address} which holds {balance}"
    )]
    InsufficientFunds {
        tx: String,
        address: String,
        balance: String,
        required: String,
    },
    #[error("Entropy failure: {0}")]
    EntropyFailure(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl ChainError {
    /// Hash of the single transaction a block-level failure is attributed to.
    pub fn offending_transaction(&self) -> Option<&str> {
        match self {
            ChainError::InsufficientFunds { tx, .. } => Some(tx),
            ChainError::DuplicateTransaction(tx) => Some(tx),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ChainError::DuplicateTransaction("abc".to_string());
        assert_eq!(err.to_string(), "Duplicate transaction: abc");
        assert_eq!(err.offending_transaction(), Some("abc"));
        assert_eq!(ChainError::Config("x".to_string()).offending_transaction(), None);

        let err = ChainError::InsufficientFunds {
            tx: "t1".to_string(),
            address: "a1".to_string(),
            balance: "10".to_string(),
            required: "50".to_string(),
        };
        assert!(err.to_string().starts_with("Insufficient funds"));
        assert_eq!(err.offending_transaction(), Some("t1"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChainError = io.into();
        assert!(matches!(err, ChainError::Io(_)));
    }
}
