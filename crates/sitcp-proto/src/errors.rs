//! Error types for wire encoding and decoding.
//!
//! Local input problems ([`ValidationError`]) are kept apart from problems with
//! what the peer sent ([`ProtocolError`]). A validation failure never reaches
//! the wire; a protocol failure is something a retry may cure.

use thiserror::Error;

/// Result alias for reply decoding.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Malformed local input, detected before anything is transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Command code does not fit in 4 bits or is not a known command
    #[error("command {0:#X} is not a 4-bit RBCP command")]
    Command(u8),

    /// Flag field does not fit in 4 bits
    #[error("flags {0:#X} do not fit in 4 bits")]
    Flags(u8),

    /// Length outside 1..=255
    #[error("length {0} outside 1..=255")]
    Length(usize),

    /// Write issued without data
    #[error("write payload is empty")]
    EmptyPayload,

    /// Write payload longer than one transfer allows
    #[error("write payload of {0} bytes exceeds 255; split the write")]
    PayloadTooLong(usize),

    /// Declared length disagrees with the payload carried
    #[error("length field {length} does not match payload of {payload} bytes")]
    PayloadMismatch {
        /// Value of the length field
        length: usize,
        /// Actual payload size
        payload: usize,
    },

    /// Hex byte string could not be parsed
    #[error("invalid hex bytes: {0}")]
    HexBytes(String),
}

/// Malformed or semantically invalid reply from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Datagram shorter than the 8-byte header
    #[error("short packet: {len} bytes")]
    ShortPacket {
        /// Bytes received
        len: usize,
    },

    /// First byte is not the fixed version/type tag
    #[error("bad version/type: {0:#04X}")]
    BadVersion(u8),

    /// Reply answers a different request
    #[error("packet id mismatch: sent {expected}, got {actual}")]
    IdMismatch {
        /// Id of the outstanding request
        expected: u8,
        /// Id echoed by the peer
        actual: u8,
    },

    /// Device reported a failed register access
    #[error("bus error (flags={flags:#X}), len={length}, addr={address:#010X}")]
    BusError {
        /// Raw flag nibble
        flags: u8,
        /// Declared length
        length: u8,
        /// Register address
        address: u32,
    },

    /// Fewer data bytes than the declared or requested length
    #[error("reply data too short: need {needed}, got {actual}")]
    ShortData {
        /// Bytes required
        needed: usize,
        /// Bytes present
        actual: usize,
    },
}
