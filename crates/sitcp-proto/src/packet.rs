//! RBCP request construction and reply parsing.
//!
//! A request is the 8-byte header, followed by `length` payload bytes for
//! writes. A reply echoes the header and carries up to `length` data bytes.
//! The reply length is declared by the peer, not framed: everything after the
//! header is treated as data and [`Packet::declared_data`] re-checks it before
//! slicing.

use zerocopy::FromBytes;

use crate::{
    errors::{ProtocolError, Result, ValidationError},
    flags::RbcpFlags,
    header::RbcpHeader,
    opcodes::Command,
};

/// Largest data length one transfer may carry.
pub const MAX_LENGTH: usize = 255;

/// Build a request datagram.
///
/// `payload` must be present for writes, with `length` equal to its size, and
/// absent for reads, where `length` is the number of bytes to read.
///
/// # Errors
///
/// Returns [`ValidationError`] naming the offending field. Nothing is sent.
pub fn build_request(
    command: Command,
    flags: u8,
    packet_id: u8,
    length: usize,
    address: u32,
    payload: Option<&[u8]>,
) -> std::result::Result<Vec<u8>, ValidationError> {
    if flags > RbcpFlags::MAX {
        return Err(ValidationError::Flags(flags));
    }
    if !(1..=MAX_LENGTH).contains(&length) {
        return Err(ValidationError::Length(length));
    }

    let payload = match (command, payload) {
        (Command::Write, Some(data)) if data.len() == length => data,
        (Command::Write, Some(data)) => {
            return Err(ValidationError::PayloadMismatch { length, payload: data.len() });
        },
        (Command::Write, None) => return Err(ValidationError::EmptyPayload),
        (Command::Read, Some(data)) => {
            return Err(ValidationError::PayloadMismatch { length, payload: data.len() });
        },
        (Command::Read, None) => &[][..],
    };

    let header = RbcpHeader::new(command.to_u8(), flags, packet_id, length as u8, address);

    let mut out = Vec::with_capacity(RbcpHeader::SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Parse a reply datagram.
///
/// # Errors
///
/// - [`ProtocolError::ShortPacket`] if fewer than 8 bytes arrived
/// - [`ProtocolError::BadVersion`] if the first byte is not `0xFF`
pub fn parse_reply(datagram: &[u8]) -> Result<Packet> {
    Packet::parse(datagram)
}

/// Decoded RBCP datagram.
///
/// Used for replies on the client side and for requests inside the simulated
/// board, since both directions share the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw command nibble (the peer may echo anything)
    pub command: u8,
    /// Flag nibble
    pub flags: RbcpFlags,
    /// Packet id
    pub packet_id: u8,
    /// Declared data length
    pub length: u8,
    /// Register address
    pub address: u32,
    /// Every byte after the header
    pub data: Vec<u8>,
}

impl Packet {
    /// Decode a datagram.
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let Ok((header, data)) = RbcpHeader::read_from_prefix(datagram) else {
            return Err(ProtocolError::ShortPacket { len: datagram.len() });
        };

        if header.ver_type() != RbcpHeader::VER_TYPE {
            return Err(ProtocolError::BadVersion(header.ver_type()));
        }

        Ok(Self {
            command: header.command(),
            flags: header.flags(),
            packet_id: header.packet_id(),
            length: header.length(),
            address: header.address(),
            data: data.to_vec(),
        })
    }

    /// Decoded command, if the nibble is a known one.
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.command)
    }

    /// True if the peer reported a bus error.
    pub fn is_bus_error(&self) -> bool {
        self.flags.is_bus_error()
    }

    /// Data bytes up to the declared length.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::ShortData`] if the datagram carried fewer bytes than
    /// its own length field claims.
    pub fn declared_data(&self) -> Result<&[u8]> {
        let needed = usize::from(self.length);
        self.data
            .get(..needed)
            .ok_or(ProtocolError::ShortData { needed, actual: self.data.len() })
    }

    /// Encode back to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let header =
            RbcpHeader::new(self.command, self.flags.bits(), self.packet_id, self.length, self.address);

        let mut out = Vec::with_capacity(RbcpHeader::SIZE + self.data.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn read_request_has_no_payload() {
        let bytes = build_request(Command::Read, 0, 1, 4, 0xFFFF_FC18, None).unwrap();
        assert_eq!(bytes, hex!("FFC00104FFFFFC18"));
    }

    #[test]
    fn write_request_appends_payload() {
        let bytes =
            build_request(Command::Write, 0, 2, 4, 0xFFFF_FC18, Some(&hex!("C0A80A14"))).unwrap();
        assert_eq!(bytes, hex!("FF800204FFFFFC18C0A80A14"));
    }

    #[test]
    fn rejects_wide_flags() {
        let result = build_request(Command::Read, 0x10, 1, 1, 0, None);
        assert_eq!(result, Err(ValidationError::Flags(0x10)));
    }

    #[test]
    fn rejects_length_out_of_range() {
        assert_eq!(build_request(Command::Read, 0, 1, 0, 0, None), Err(ValidationError::Length(0)));
        assert_eq!(
            build_request(Command::Read, 0, 1, 256, 0, None),
            Err(ValidationError::Length(256))
        );
    }

    #[test]
    fn rejects_mismatched_write_payload() {
        let result = build_request(Command::Write, 0, 1, 2, 0, Some(&[1, 2, 3]));
        assert_eq!(result, Err(ValidationError::PayloadMismatch { length: 2, payload: 3 }));
    }

    #[test]
    fn rejects_write_without_payload() {
        let result = build_request(Command::Write, 0, 1, 1, 0, None);
        assert_eq!(result, Err(ValidationError::EmptyPayload));
    }

    #[test]
    fn short_packet() {
        assert_eq!(parse_reply(&[0xFF; 7]), Err(ProtocolError::ShortPacket { len: 7 }));
        assert_eq!(parse_reply(&[]), Err(ProtocolError::ShortPacket { len: 0 }));
    }

    #[test]
    fn bad_version() {
        let bytes = hex!("FEC00104FFFFFC18");
        assert_eq!(parse_reply(&bytes), Err(ProtocolError::BadVersion(0xFE)));
    }

    #[test]
    fn reply_with_data() {
        let bytes = hex!("FFC80304FFFFFC18C0A80A1400");
        let reply = parse_reply(&bytes).unwrap();

        assert_eq!(reply.command(), Some(Command::Read));
        assert_eq!(reply.flags.bits(), 0x8);
        assert!(!reply.is_bus_error());
        assert_eq!(reply.packet_id, 3);
        assert_eq!(reply.address, 0xFFFF_FC18);
        assert_eq!(reply.data.len(), 5);
        assert_eq!(reply.declared_data().unwrap(), &hex!("C0A80A14"));
    }

    #[test]
    fn declared_data_checks_length() {
        let bytes = hex!("FFC00304FFFFFC18C0A8");
        let reply = parse_reply(&bytes).unwrap();
        assert_eq!(reply.declared_data(), Err(ProtocolError::ShortData { needed: 4, actual: 2 }));
    }

    proptest! {
        #[test]
        fn request_fields_survive_reply_parsing(
            flags in 0u8..=0x0F,
            packet_id in any::<u8>(),
            address in any::<u32>(),
            payload in proptest::collection::vec(any::<u8>(), 1..=MAX_LENGTH),
            is_write in any::<bool>(),
        ) {
            let (command, data) =
                if is_write { (Command::Write, Some(payload.as_slice())) } else { (Command::Read, None) };
            let length = payload.len();

            let bytes = build_request(command, flags, packet_id, length, address, data).unwrap();
            let packet = parse_reply(&bytes).unwrap();

            prop_assert_eq!(packet.command(), Some(command));
            prop_assert_eq!(packet.flags.bits(), flags);
            prop_assert_eq!(packet.packet_id, packet_id);
            prop_assert_eq!(usize::from(packet.length), length);
            prop_assert_eq!(packet.address, address);
            prop_assert_eq!(packet.encode(), bytes);
        }
    }
}
