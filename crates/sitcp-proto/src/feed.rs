//! Data feed frames and sink records.
//!
//! ```text
//! ┌────────┬────────────┬──────────────────────┬────────┐
//! │ AA 55  │ channel id │ timestamp (7 bytes)  │ 55 AA  │
//! │ header │   1 byte   │ big-endian, 56 bits  │ footer │
//! └────────┴────────────┴──────────────────────┴────────┘
//! ```
//!
//! A frame is good iff both markers match. Good frames are persisted as the
//! 8-byte middle section ([`Record`]), back to back with no delimiter.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of one feed frame.
pub const FRAME_SIZE: usize = 12;

/// Size of one persisted record.
pub const RECORD_SIZE: usize = 8;

/// Expected header marker.
pub const HEADER_MARKER: [u8; 2] = [0xAA, 0x55];

/// Expected footer marker.
pub const FOOTER_MARKER: [u8; 2] = [0x55, 0xAA];

/// Width of the timestamp counter.
pub const TIMESTAMP_BITS: u32 = 56;

/// Mask selecting the timestamp bits.
pub const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;

/// One 12-byte window of the feed, markers not yet checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DataFrame {
    header: [u8; 2],
    channel_id: u8,
    timestamp: [u8; 7],
    footer: [u8; 2],
}

impl DataFrame {
    /// Well-formed frame for the given channel and timestamp.
    ///
    /// Timestamp bits above 56 are dropped.
    pub fn new(channel_id: u8, timestamp: u64) -> Self {
        let mut ts = [0u8; 7];
        ts.copy_from_slice(&(timestamp & TIMESTAMP_MASK).to_be_bytes()[1..]);
        Self { header: HEADER_MARKER, channel_id, timestamp: ts, footer: FOOTER_MARKER }
    }

    /// Reinterpret a 12-byte window.
    pub fn from_window(window: &[u8; FRAME_SIZE]) -> Self {
        let mut frame = Self::new(0, 0);
        frame.as_mut_bytes().copy_from_slice(window);
        frame
    }

    /// Header marker as received.
    pub fn header(&self) -> [u8; 2] {
        self.header
    }

    /// Footer marker as received.
    pub fn footer(&self) -> [u8; 2] {
        self.footer
    }

    /// True if the header marker is `AA 55`.
    pub fn header_ok(&self) -> bool {
        self.header == HEADER_MARKER
    }

    /// True if the footer marker is `55 AA`.
    pub fn footer_ok(&self) -> bool {
        self.footer == FOOTER_MARKER
    }

    /// True if both markers match.
    pub fn is_good(&self) -> bool {
        self.header_ok() && self.footer_ok()
    }

    /// Payload as a sink record, regardless of marker validity.
    pub fn record(&self) -> Record {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0] = self.channel_id;
        bytes[1..].copy_from_slice(&self.timestamp);
        Record(bytes)
    }

    /// Overwrite the header marker. Test helper for corrupted streams.
    pub fn with_header(mut self, header: [u8; 2]) -> Self {
        self.header = header;
        self
    }

    /// Overwrite the footer marker. Test helper for corrupted streams.
    pub fn with_footer(mut self, footer: [u8; 2]) -> Self {
        self.footer = footer;
        self
    }

    /// Wire bytes.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

/// Persisted payload of a good frame: `channel_id || timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record([u8; RECORD_SIZE]);

impl Record {
    /// Wrap raw record bytes.
    pub fn from_bytes(bytes: [u8; RECORD_SIZE]) -> Self {
        Self(bytes)
    }

    /// Channel id.
    pub fn channel_id(&self) -> u8 {
        self.0[0]
    }

    /// 56-bit timestamp in counter ticks.
    pub fn timestamp(&self) -> u64 {
        let mut wide = [0u8; 8];
        wide[1..].copy_from_slice(&self.0[1..]);
        u64::from_be_bytes(wide)
    }

    /// Raw bytes as written to the sink.
    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.0
    }
}

/// Ticks from `prev` to `next`, correcting a single counter rollover.
pub fn timestamp_delta(prev: u64, next: u64) -> u64 {
    next.wrapping_sub(prev) & TIMESTAMP_MASK
}
