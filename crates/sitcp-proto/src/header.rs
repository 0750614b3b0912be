//! Fixed 8-byte RBCP header.
//!
//! ```text
//! byte 0      ver/type (always 0xFF)
//! byte 1      command << 4 | flags
//! byte 2      packet id
//! byte 3      length (1..=255)
//! bytes 4..8  address, big-endian u32
//! ```
//!
//! Requests and replies share this layout; the peer echoes the request header
//! with the flag nibble carrying status.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U32},
};

use crate::flags::RbcpFlags;

/// Zero-copy view of the RBCP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RbcpHeader {
    ver_type: u8,
    command_flags: u8,
    packet_id: u8,
    length: u8,
    address: U32<BigEndian>,
}

impl RbcpHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 8;

    /// Version (0xF) and type (0xF) packed into one byte.
    pub const VER_TYPE: u8 = 0xFF;

    /// Build a header from already validated fields.
    ///
    /// `command` and `flags` are masked to 4 bits.
    pub fn new(command: u8, flags: u8, packet_id: u8, length: u8, address: u32) -> Self {
        Self {
            ver_type: Self::VER_TYPE,
            command_flags: ((command & 0x0F) << 4) | (flags & 0x0F),
            packet_id,
            length,
            address: U32::new(address),
        }
    }

    /// Version/type tag as received.
    pub fn ver_type(&self) -> u8 {
        self.ver_type
    }

    /// Raw command nibble.
    pub fn command(&self) -> u8 {
        self.command_flags >> 4
    }

    /// Flag nibble.
    pub fn flags(&self) -> RbcpFlags {
        RbcpFlags::from_nibble(self.command_flags)
    }

    /// Packet id.
    pub fn packet_id(&self) -> u8 {
        self.packet_id
    }

    /// Declared data length.
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Register address.
    pub fn address(&self) -> u32 {
        self.address.get()
    }

    /// Wire bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}
