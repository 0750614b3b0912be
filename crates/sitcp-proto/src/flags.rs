//! RBCP status flags.

use bitflags::bitflags;

bitflags! {
    /// Flag nibble in the lower half of header byte 1.
    ///
    /// Requests from this client always carry zero. Replies use bit 0 to
    /// report a failed register access; the other bits are passed through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RbcpFlags: u8 {
        /// Device-side bus error
        const BUS_ERROR = 0b0001;
    }
}

impl RbcpFlags {
    /// Largest value that fits the 4-bit field.
    pub const MAX: u8 = 0x0F;

    /// Flags from the low nibble of a header byte, keeping unknown bits.
    pub fn from_nibble(byte: u8) -> Self {
        Self::from_bits_retain(byte & Self::MAX)
    }

    /// True if the device rejected the access.
    pub fn is_bus_error(self) -> bool {
        self.contains(Self::BUS_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibble_masks_upper_bits() {
        let flags = RbcpFlags::from_nibble(0xC9);
        assert_eq!(flags.bits(), 0x9);
        assert!(flags.is_bus_error());
    }

    #[test]
    fn clear_flags() {
        assert!(!RbcpFlags::from_nibble(0x80).is_bus_error());
    }
}
