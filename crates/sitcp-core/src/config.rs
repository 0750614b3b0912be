//! Configuration values
//!
//! Protocol parameters are plain immutable values handed to each component at
//! construction. Defaults match the stock SiTCP firmware.

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    time::Duration,
};

use crate::{decoder::ResyncPolicy, retry::RetryPolicy};

/// Default RBCP UDP port.
pub const DEFAULT_RBCP_PORT: u16 = 4660;

/// Default TCP port of the data feed.
pub const DEFAULT_FEED_PORT: u16 = 24;

/// Default board address.
pub const DEFAULT_BOARD_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 10, 16);

/// Board-defined EEPROM register addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardRegisters {
    /// Interlock byte; must be cleared before the IP register is rewritten
    pub interlock: u32,
    /// 4-byte IPv4 address (FC18-FC1B)
    pub ip_address: u32,
    /// 2-byte RBCP port (FC22-FC23)
    pub rbcp_port: u32,
}

impl Default for BoardRegisters {
    fn default() -> Self {
        Self { interlock: 0xFFFF_FCFF, ip_address: 0xFFFF_FC18, rbcp_port: 0xFFFF_FC22 }
    }
}

/// RBCP client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbcpConfig {
    /// Board endpoint
    pub endpoint: SocketAddr,
    /// Per-attempt reply timeout (must be non-zero)
    pub timeout: Duration,
    /// Attempt bound and backoff
    pub retry: RetryPolicy,
    /// EEPROM register map
    pub registers: BoardRegisters,
    /// Receive buffer size for one reply datagram
    pub recv_buffer_size: usize,
}

impl RbcpConfig {
    /// Default settings for the given board endpoint.
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_millis(300),
            retry: RetryPolicy::default(),
            registers: BoardRegisters::default(),
            recv_buffer_size: 4096,
        }
    }
}

impl Default for RbcpConfig {
    fn default() -> Self {
        Self::new(SocketAddr::V4(SocketAddrV4::new(DEFAULT_BOARD_IP, DEFAULT_RBCP_PORT)))
    }
}

/// Frame decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Stop once this many good frames were collected
    pub target_good_frames: u64,
    /// Behavior after a header mismatch
    pub resync: ResyncPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { target_good_frames: 1000, resync: ResyncPolicy::FixedOffset }
    }
}

/// Acquisition run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Decoder settings
    pub decoder: DecoderConfig,
    /// Maximum bytes per stream read
    pub read_chunk_size: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self { decoder: DecoderConfig::default(), read_chunk_size: 4096 }
    }
}

/// Record timing analysis configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    /// Nanoseconds per timestamp count
    pub lsb_ns: f64,
    /// Number of Δt histogram bins
    pub bins: usize,
    /// Lower histogram edge in ns (inclusive)
    pub low_ns: f64,
    /// Upper histogram edge in ns (exclusive)
    pub high_ns: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { lsb_ns: 2.0, bins: 1000, low_ns: 0.0, high_ns: 1000.0 }
    }
}
