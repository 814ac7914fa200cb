use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Network unreachable: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns true if the failure came from the network rather than the host.
    pub fn is_network_error(&self) -> bool {
        matches!(self, BridgeError::HttpStatus { .. } | BridgeError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
