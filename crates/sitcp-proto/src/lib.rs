//! Wire formats for a SiTCP data-acquisition board.
//!
//! The board exposes two unrelated binary protocols:
//!
//! - A **data feed** over TCP: a stream of fixed 12-byte frames, each wrapped
//!   in a 2-byte header marker and a 2-byte footer marker. Good frames are
//!   persisted as 8-byte records (channel id + 56-bit timestamp).
//! - **RBCP** (register-bus control protocol) over UDP: an 8-byte big-endian
//!   header followed by up to 255 data bytes, used to read and write board
//!   registers and EEPROM.
//!
//! Everything here is pure encoding and validation. No sockets, no retries,
//! no logging; those live in `sitcp-core`.
//!
//! # Security
//!
//! All fixed layouts are parsed through compile-time verified `zerocopy`
//! structs. Reply lengths are declared by the peer, not framed, so callers
//! must go through [`Packet::declared_data`] instead of trusting `length`.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod feed;
pub mod flags;
pub mod header;
pub mod hexfmt;
pub mod opcodes;
pub mod packet;

pub use errors::{ProtocolError, Result, ValidationError};
pub use feed::{DataFrame, FRAME_SIZE, RECORD_SIZE, Record};
pub use flags::RbcpFlags;
pub use header::RbcpHeader;
pub use opcodes::Command;
pub use packet::{Packet, build_request, parse_reply};
