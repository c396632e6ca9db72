//! Server error type.

use thiserror::Error;

/// Errors raised while starting or running the HTTP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying socket error.
        source: std::io::Error,
    },
    /// Any other socket error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:80".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:80"));
        assert!(msg.contains("denied"));
    }
}
