//! Simulated RBCP board.
//!
//! Answers requests synchronously from a sparse byte-addressed register
//! memory. Replies are queued in [`DatagramTransport::send_to`] and handed out
//! by [`DatagramTransport::receive_with_timeout`]; an empty queue is a timeout.

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    io,
    net::SocketAddr,
    time::Duration,
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sitcp_core::DatagramTransport;
use sitcp_proto::{Command, Packet, RbcpFlags};

/// Failure injected into the reply to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No reply at all
    Drop,
    /// Reply carries a different packet id
    WrongId,
    /// Reply has the bus-error flag set; a write is not applied
    BusError,
    /// Random bytes with a bad version byte
    Garbage,
    /// Reply cut short so fewer data bytes arrive than declared
    Truncate,
}

/// In-memory RBCP peer.
#[derive(Debug)]
pub struct SimBoard {
    memory: HashMap<u32, u8>,
    faults: VecDeque<Fault>,
    bus_error_addresses: BTreeSet<u32>,
    read_only_addresses: BTreeSet<u32>,
    drop_rate: f64,
    rng: ChaCha8Rng,
    requests: Vec<Packet>,
    pending: VecDeque<Vec<u8>>,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl SimBoard {
    /// Healthy board with zeroed memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Healthy board whose random faults draw from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            memory: HashMap::new(),
            faults: VecDeque::new(),
            bus_error_addresses: BTreeSet::new(),
            read_only_addresses: BTreeSet::new(),
            drop_rate: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            requests: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Drop each unscripted reply with probability `rate` (clamped to 0..=1).
    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    /// Any access touching `address` answers with a bus error.
    pub fn with_bus_error_at(mut self, address: u32) -> Self {
        self.bus_error_addresses.insert(address);
        self
    }

    /// Writes to `address` are acknowledged normally but not stored.
    pub fn with_read_only_at(mut self, address: u32) -> Self {
        self.read_only_addresses.insert(address);
        self
    }

    /// Queue faults for the next requests, one per request, in order.
    pub fn with_faults(mut self, faults: impl IntoIterator<Item = Fault>) -> Self {
        self.faults.extend(faults);
        self
    }

    /// Queue one fault.
    pub fn push_fault(&mut self, fault: Fault) {
        self.faults.push_back(fault);
    }

    /// Store bytes directly, bypassing RBCP.
    pub fn poke(&mut self, address: u32, bytes: &[u8]) {
        for (offset, &byte) in (0u32..).zip(bytes) {
            self.memory.insert(address.wrapping_add(offset), byte);
        }
    }

    /// Read bytes directly, bypassing RBCP. Unwritten bytes are zero.
    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        (0u32..)
            .take(len)
            .map(|offset| self.memory.get(&address.wrapping_add(offset)).copied().unwrap_or(0))
            .collect()
    }

    /// Every well-formed request received, in order.
    pub fn requests(&self) -> &[Packet] {
        &self.requests
    }

    /// Requests received with the given command.
    pub fn count(&self, command: Command) -> usize {
        self.requests.iter().filter(|r| r.command() == Some(command)).count()
    }

    /// Build the reply to one request datagram.
    ///
    /// Malformed requests and unknown commands are ignored, as the firmware
    /// does.
    pub fn handle(&mut self, datagram: &[u8]) -> Option<Vec<u8>> {
        let request = match Packet::parse(datagram) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "board ignoring malformed request");
                return None;
            },
        };
        self.requests.push(request.clone());
        let command = request.command()?;

        let fault = self.faults.pop_front().or_else(|| {
            (self.drop_rate > 0.0 && self.rng.gen_bool(self.drop_rate)).then_some(Fault::Drop)
        });
        tracing::trace!(packet_id = request.packet_id, ?command, ?fault, "board request");

        let len = usize::from(request.length);
        let bus_error = fault == Some(Fault::BusError) || self.touches_bus_error(&request);

        let mut reply = Packet {
            command: request.command,
            flags: RbcpFlags::empty(),
            packet_id: request.packet_id,
            length: request.length,
            address: request.address,
            data: Vec::with_capacity(len),
        };

        if bus_error {
            reply.flags = RbcpFlags::BUS_ERROR;
            reply.data = vec![0; len];
        } else {
            match command {
                Command::Write => {
                    let payload = request.data.get(..len).unwrap_or(&request.data[..]);
                    self.store(request.address, payload);
                    reply.data = payload.to_vec();
                },
                Command::Read => reply.data = self.peek(request.address, len),
            }
        }

        match fault {
            Some(Fault::Drop) => None,
            Some(Fault::WrongId) => {
                reply.packet_id = reply.packet_id.wrapping_add(1);
                Some(reply.encode())
            },
            Some(Fault::Garbage) => {
                let mut garbage = vec![0u8; 8 + len];
                self.rng.fill(&mut garbage[..]);
                garbage[0] = 0x00;
                Some(garbage)
            },
            Some(Fault::Truncate) => {
                let mut bytes = reply.encode();
                bytes.truncate(8 + len / 2);
                Some(bytes)
            },
            Some(Fault::BusError) | None => Some(reply.encode()),
        }
    }

    fn store(&mut self, address: u32, bytes: &[u8]) {
        for (offset, &byte) in (0u32..).zip(bytes) {
            let target = address.wrapping_add(offset);
            if !self.read_only_addresses.contains(&target) {
                self.memory.insert(target, byte);
            }
        }
    }

    fn touches_bus_error(&self, request: &Packet) -> bool {
        let start = request.address;
        let end = start.saturating_add(u32::from(request.length));
        self.bus_error_addresses.range(start..end).next().is_some()
    }
}

impl DatagramTransport for SimBoard {
    fn send_to(&mut self, datagram: &[u8], _target: SocketAddr) -> io::Result<()> {
        if let Some(reply) = self.handle(datagram) {
            self.pending.push_back(reply);
        }
        Ok(())
    }

    fn receive_with_timeout(
        &mut self,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> io::Result<Option<usize>> {
        let Some(reply) = self.pending.pop_front() else {
            return Ok(None);
        };
        let len = reply.len().min(buf.len());
        buf[..len].copy_from_slice(&reply[..len]);
        Ok(Some(len))
    }
}
