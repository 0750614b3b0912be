//! SiTCP protocol core logic
//!
//! Protocol logic for the two channels of a SiTCP data-acquisition board,
//! decoupled from concrete sockets so the same code runs against real
//! hardware and against the simulated board in `sitcp-harness`.
//!
//! # Architecture
//!
//! The frame decoder is a pure state machine: bytes go in, classified frames
//! come out, and it never touches I/O. The acquisition loop and the RBCP
//! client are thin drivers that own a transport (see [`transport`]) and feed
//! the protocol logic. Retry behavior is a standalone [`retry::RetryPolicy`]
//! so it can be tested without any transport at all.
//!
//! Everything is synchronous and blocking. One client instance owns its socket
//! and packet-id counter for its whole lifetime; there is no shared state
//! between the decoder and the client.
//!
//! # Components
//!
//! - [`decoder`]: Frame stream decoder (framing, marker checks, counters)
//! - [`acquisition`]: Blocking run loop over a byte stream
//! - [`client`]: RBCP register client (read, write, verify, set IP)
//! - [`retry`]: Bounded retry policy with optional backoff
//! - [`analysis`]: Timing analysis of persisted records
//! - [`transport`]: Stream and datagram transport abstraction
//! - [`config`]: Immutable configuration values
//! - [`error`]: Error taxonomy

pub mod acquisition;
pub mod analysis;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod retry;
pub mod transport;

pub use acquisition::{Acquisition, AcquisitionReport, Termination};
pub use analysis::{Histogram, TimingAnalysis};
pub use client::RbcpClient;
pub use config::{AcquisitionConfig, AnalysisConfig, BoardRegisters, DecoderConfig, RbcpConfig};
pub use decoder::{ClassifiedFrame, FrameDecoder, ResyncPolicy, RunSummary};
pub use error::{AcquisitionError, RbcpError, Result};
pub use retry::{Backoff, RetryPolicy};
pub use transport::{DatagramTransport, StreamTransport};
