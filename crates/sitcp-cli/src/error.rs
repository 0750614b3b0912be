//! CLI error type.

use std::{io, path::PathBuf};

use sitcp_core::{AcquisitionError, RbcpError};
use thiserror::Error;

/// Anything that ends a subcommand with exit code 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// Register transaction failed
    #[error(transparent)]
    Rbcp(#[from] RbcpError),

    /// Acquisition run failed
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Could not connect to the data feed
    #[error("connect to {addr}: {source}")]
    Connect {
        /// Feed endpoint
        addr: std::net::SocketAddr,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Could not open or create a file
    #[error("{}: {source}", path.display())]
    File {
        /// Offending path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Socket or signal setup failed
    #[error("setup: {0}")]
    Setup(String),
}

/// CLI result.
pub type Result<T> = std::result::Result<T, CliError>;
