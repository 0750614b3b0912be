//! RBCP command codes.

use crate::errors::ValidationError;

/// Command nibble carried in the upper half of header byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Register write (0x8)
    Write = 0x8,
    /// Register read (0xC)
    Read = 0xC,
}

impl Command {
    /// Raw 4-bit code.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Decode a raw nibble, `None` for anything that is not a command.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x8 => Some(Self::Write),
            0xC => Some(Self::Read),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(ValidationError::Command(value))
    }
}
