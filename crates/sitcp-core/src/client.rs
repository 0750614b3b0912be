//! RBCP register client.
//!
//! Request/reply register access over an unreliable datagram transport. Every
//! logical request gets a fresh 8-bit packet id; the transaction cycle then
//! resends the *same* bytes (same id) until a matching reply arrives or the
//! retry policy gives up.
//!
//! # Transaction cycle
//!
//! ```text
//! ┌──────┐ send ┌──────────┐ reply ┌───────────┐ ok ┌──────┐
//! │ Idle │─────>│ Awaiting │──────>│ Validate  │───>│ Done │
//! └──────┘      └──────────┘       └───────────┘    └──────┘
//!    ^               │ timeout          │ bad version, short,
//!    │               ↓                  ↓ id mismatch, bus error
//!    └───────── attempt failed (retry while attempts remain)
//! ```
//!
//! Duplicate delivery is safe: reads have no side effects and writes set an
//! absolute value.

use std::net::Ipv4Addr;

use sitcp_proto::{
    Command, Packet, ProtocolError, ValidationError, build_request, hexfmt::to_hex,
    packet::MAX_LENGTH, parse_reply,
};

use crate::{
    config::RbcpConfig,
    error::{RbcpError, Result},
    retry::{AttemptError, RetryError},
    transport::DatagramTransport,
};

/// RBCP client session.
///
/// Owns the datagram transport and the packet-id counter for its whole
/// lifetime. Not meant to be shared between callers.
#[derive(Debug)]
pub struct RbcpClient<T> {
    transport: T,
    config: RbcpConfig,
    packet_id: u8,
    recv_buf: Vec<u8>,
}

impl<T: DatagramTransport> RbcpClient<T> {
    /// Create a client over `transport`.
    pub fn new(transport: T, config: RbcpConfig) -> Self {
        let recv_buf = vec![0u8; config.recv_buffer_size.max(sitcp_proto::RbcpHeader::SIZE)];
        Self { transport, config, packet_id: 0, recv_buf }
    }

    /// Client configuration.
    pub fn config(&self) -> &RbcpConfig {
        &self.config
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the client and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Most recently issued packet id (0 before the first request).
    pub fn last_packet_id(&self) -> u8 {
        self.packet_id
    }

    /// Advance the counter and return the new id. Wraps 255 -> 0.
    pub fn next_packet_id(&mut self) -> u8 {
        self.packet_id = self.packet_id.wrapping_add(1);
        self.packet_id
    }

    /// Send `request` and wait for a valid reply carrying `expected_id`.
    ///
    /// Timeouts and invalid replies are retried with the same bytes. Socket
    /// failures end the cycle immediately.
    ///
    /// # Errors
    ///
    /// - [`RbcpError::Transaction`] wrapping the last failure once attempts
    ///   run out
    /// - [`RbcpError::Io`] if the socket itself failed
    pub fn transact(&mut self, request: &[u8], expected_id: u8) -> Result<Packet> {
        let policy = self.config.retry;

        match policy.run(|attempt| self.attempt(request, expected_id, attempt), std::thread::sleep)
        {
            Ok(reply) => Ok(reply),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(packet_id = expected_id, attempts, error = %last, "transaction failed");
                Err(RbcpError::Transaction { attempts, last: Box::new(last) })
            },
            Err(RetryError::Fatal(err)) => Err(err),
        }
    }

    /// Read `length` bytes (1..=255) starting at `address`.
    pub fn read(&mut self, address: u32, length: usize) -> Result<Vec<u8>> {
        let packet_id = self.next_packet_id();
        let request = build_request(Command::Read, 0, packet_id, length, address, None)?;
        let mut reply = self.transact(&request, packet_id)?;

        let available = usize::from(reply.length).min(reply.data.len());
        if available < length {
            return Err(ProtocolError::ShortData { needed: length, actual: available }.into());
        }

        reply.data.truncate(length);
        Ok(reply.data)
    }

    /// Write `data` (1..=255 bytes) at `address`; returns the echoed data.
    ///
    /// The packet id advances even when `data` is rejected locally, as it
    /// does for [`Self::read`].
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<Vec<u8>> {
        let packet_id = self.next_packet_id();
        if data.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        if data.len() > MAX_LENGTH {
            return Err(ValidationError::PayloadTooLong(data.len()).into());
        }

        let request = build_request(Command::Write, 0, packet_id, data.len(), address, Some(data))?;
        let mut reply = self.transact(&request, packet_id)?;

        reply.data.truncate(usize::from(reply.length));
        Ok(reply.data)
    }

    /// Read back `expected.len()` bytes and compare.
    ///
    /// # Errors
    ///
    /// [`RbcpError::Verification`] on mismatch. Not retried.
    pub fn verify(&mut self, address: u32, expected: &[u8]) -> Result<()> {
        let readback = self.read(address, expected.len())?;
        if readback != expected {
            return Err(RbcpError::Verification {
                address,
                written: expected.to_vec(),
                readback,
            });
        }
        Ok(())
    }

    /// Write, then read back and verify. Returns the write acknowledgement.
    pub fn write_verified(&mut self, address: u32, data: &[u8]) -> Result<Vec<u8>> {
        let ack = self.write(address, data)?;
        self.verify(address, data)?;
        Ok(ack)
    }

    /// Read a big-endian `u16`.
    pub fn read_u16_be(&mut self, address: u32) -> Result<u16> {
        let bytes = self.read(address, 2)?;
        let actual = bytes.len();
        let bytes: [u8; 2] = bytes
            .try_into()
            .map_err(|_| ProtocolError::ShortData { needed: 2, actual })?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, address: u32, value: u8) -> Result<()> {
        self.write(address, &[value])?;
        Ok(())
    }

    /// IPv4 address currently stored in EEPROM.
    pub fn read_device_ip(&mut self) -> Result<Ipv4Addr> {
        let bytes = self.read(self.config.registers.ip_address, 4)?;
        let actual = bytes.len();
        let octets: [u8; 4] = bytes
            .try_into()
            .map_err(|_| ProtocolError::ShortData { needed: 4, actual })?;
        Ok(Ipv4Addr::from(octets))
    }

    /// RBCP port currently stored in EEPROM.
    pub fn read_rbcp_port(&mut self) -> Result<u16> {
        self.read_u16_be(self.config.registers.rbcp_port)
    }

    /// Store a new board IP address in EEPROM.
    ///
    /// Three independent transactions, each with its own retries:
    ///
    /// 1. write `0x00` to the interlock register
    /// 2. write the 4 address octets to the IP register
    /// 3. read the IP register back and compare
    ///
    /// The sequence is not atomic and nothing is rolled back. If step 2 or 3
    /// fails the board may be left with the interlock cleared and the old (or
    /// a partial) address. The new address takes effect after a power cycle.
    pub fn set_device_ip(&mut self, ip: Ipv4Addr) -> Result<()> {
        let registers = self.config.registers;
        let octets = ip.octets();

        tracing::info!(register = %format!("{:#010X}", registers.interlock), "clearing interlock");
        self.write_u8(registers.interlock, 0x00)?;

        tracing::info!(
            register = %format!("{:#010X}", registers.ip_address),
            %ip,
            "writing address"
        );
        self.write(registers.ip_address, &octets)?;

        self.verify(registers.ip_address, &octets)?;
        tracing::info!(%ip, value = %to_hex(&octets), "EEPROM IP set");
        Ok(())
    }

    fn attempt(
        &mut self,
        request: &[u8],
        expected_id: u8,
        attempt: u32,
    ) -> std::result::Result<Packet, AttemptError<RbcpError>> {
        tracing::debug!(attempt, packet_id = expected_id, "sending request");

        self.transport
            .send_to(request, self.config.endpoint)
            .map_err(|e| AttemptError::Fatal(RbcpError::Io(e)))?;

        let received = self
            .transport
            .receive_with_timeout(&mut self.recv_buf, self.config.timeout)
            .map_err(|e| AttemptError::Fatal(RbcpError::Io(e)))?;

        let Some(len) = received else {
            tracing::warn!(attempt, packet_id = expected_id, "no reply");
            return Err(AttemptError::Retryable(RbcpError::Timeout(self.config.timeout)));
        };

        let datagram = self.recv_buf.get(..len).unwrap_or(&self.recv_buf[..]);
        parse_reply(datagram).and_then(|reply| validate(reply, expected_id)).map_err(|e| {
            tracing::warn!(attempt, packet_id = expected_id, error = %e, "invalid reply");
            AttemptError::Retryable(RbcpError::Protocol(e))
        })
    }
}

/// Checks a parsed reply against the outstanding request.
fn validate(reply: Packet, expected_id: u8) -> std::result::Result<Packet, ProtocolError> {
    if reply.packet_id != expected_id {
        return Err(ProtocolError::IdMismatch { expected: expected_id, actual: reply.packet_id });
    }
    if reply.is_bus_error() {
        return Err(ProtocolError::BusError {
            flags: reply.flags.bits(),
            length: reply.length,
            address: reply.address,
        });
    }
    reply.declared_data()?;
    Ok(reply)
}
