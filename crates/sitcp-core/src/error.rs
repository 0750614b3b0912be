//! Error types
//!
//! [`RbcpError`] splits failures by recoverability:
//!
//! | Kind | Retried inside a transaction | Reaches the wire |
//! |------|------------------------------|------------------|
//! | `Validation` | never | never |
//! | `Protocol` | yes | yes |
//! | `Timeout` | yes | yes |
//! | `Transaction` | terminal | yes |
//! | `Verification` | terminal | yes |
//! | `Io` | terminal | maybe |
//!
//! Frame marker mismatches on the data feed are not errors; the decoder counts
//! them and moves on.

use std::{io, time::Duration};

use sitcp_proto::{ProtocolError, ValidationError, hexfmt::to_hex};
use thiserror::Error;

/// Result alias for register operations.
pub type Result<T> = std::result::Result<T, RbcpError>;

/// Register transaction failures.
#[derive(Debug, Error)]
pub enum RbcpError {
    /// Malformed local input; nothing was sent
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed or rejected reply
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No reply within the per-attempt window
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Every attempt failed; wraps the last failure
    #[error("RBCP failed after {attempts} tries: {last}")]
    Transaction {
        /// Attempts made
        attempts: u32,
        /// Failure observed on the final attempt
        #[source]
        last: Box<RbcpError>,
    },

    /// Readback differs from what was written
    #[error("verify failed at {address:#010X}: wrote={} readback={}", to_hex(.written), to_hex(.readback))]
    Verification {
        /// Register address
        address: u32,
        /// Bytes written
        written: Vec<u8>,
        /// Bytes read back
        readback: Vec<u8>,
    },

    /// Socket failure other than a timeout
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RbcpError {
    /// True for failures a fresh attempt of the same request may cure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Timeout(_))
    }

    /// Innermost cause, looking through `Transaction`.
    pub fn root(&self) -> &Self {
        match self {
            Self::Transaction { last, .. } => last.root(),
            other => other,
        }
    }
}

/// Data feed run failures.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Reading from the stream failed
    #[error("stream read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing a record to the sink failed
    #[error("sink write failed: {0}")]
    Sink(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(RbcpError::Timeout(Duration::from_millis(300)).is_retryable());
        assert!(RbcpError::Protocol(ProtocolError::BadVersion(0)).is_retryable());
        assert!(!RbcpError::Validation(ValidationError::EmptyPayload).is_retryable());
        assert!(!RbcpError::Io(io::Error::other("unreachable")).is_retryable());
    }

    #[test]
    fn transaction_root_cause() {
        let err = RbcpError::Transaction {
            attempts: 3,
            last: Box::new(RbcpError::Timeout(Duration::from_millis(300))),
        };
        assert!(matches!(err.root(), RbcpError::Timeout(_)));
        assert!(err.to_string().starts_with("RBCP failed after 3 tries"));
    }

    #[test]
    fn verification_message_shows_hex() {
        let err = RbcpError::Verification {
            address: 0xFFFF_FC18,
            written: vec![0xC0, 0xA8],
            readback: vec![0x00, 0x00],
        };
        assert_eq!(err.to_string(), "verify failed at 0xFFFFFC18: wrote=C0A8 readback=0000");
    }
}
