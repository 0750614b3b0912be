//! Simulated data feed.

use std::io;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sitcp_core::StreamTransport;
use sitcp_proto::{DataFrame, Record};

/// Byte stream replayed in seeded random chunk sizes.
///
/// Each read returns between 1 and `max_chunk` bytes, so frames routinely
/// straddle read boundaries. Returns 0 once the data is exhausted.
#[derive(Debug, Clone)]
pub struct SimFeed {
    data: Vec<u8>,
    position: usize,
    max_chunk: usize,
    rng: ChaCha8Rng,
    reads: usize,
}

impl SimFeed {
    /// Chunk sizes up to 64 bytes.
    pub fn new(data: Vec<u8>, seed: u64) -> Self {
        Self::with_max_chunk(data, seed, 64)
    }

    /// Chunk sizes up to `max_chunk` bytes (at least 1).
    pub fn with_max_chunk(data: Vec<u8>, seed: u64, max_chunk: usize) -> Self {
        Self {
            data,
            position: 0,
            max_chunk: max_chunk.max(1),
            rng: ChaCha8Rng::seed_from_u64(seed),
            reads: 0,
        }
    }

    /// Bytes not yet delivered.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Non-empty reads served so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl StreamTransport for SimFeed {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let n = self.rng.gen_range(1..=self.max_chunk).min(remaining).min(buf.len());
        let end = self.position + n;
        buf[..n].copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        self.reads += 1;
        Ok(n)
    }
}

/// Composes a feed byte sequence frame by frame.
///
/// Channel ids cycle through 0..=255 and timestamps advance by
/// `timestamp_step` per frame, so every frame is distinct.
#[derive(Debug, Clone)]
pub struct FeedBuilder {
    bytes: Vec<u8>,
    records: Vec<Record>,
    frames: u64,
    timestamp: u64,
    timestamp_step: u64,
}

impl Default for FeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedBuilder {
    /// Empty feed; timestamps advance by 5 counts.
    pub fn new() -> Self {
        Self { bytes: Vec::new(), records: Vec::new(), frames: 0, timestamp: 0, timestamp_step: 5 }
    }

    /// Change the timestamp increment for subsequent frames.
    pub fn timestamp_step(mut self, step: u64) -> Self {
        self.timestamp_step = step;
        self
    }

    /// Append `count` good frames.
    pub fn good(mut self, count: usize) -> Self {
        for _ in 0..count {
            let frame = self.next_frame();
            self.push(frame);
        }
        self
    }

    /// Append `count` frames with a corrupted header marker.
    pub fn bad_header(mut self, count: usize) -> Self {
        for _ in 0..count {
            let frame = self.next_frame().with_header([0x00, 0x00]);
            self.push(frame);
        }
        self
    }

    /// Append `count` frames with a corrupted footer marker.
    pub fn bad_footer(mut self, count: usize) -> Self {
        for _ in 0..count {
            let frame = self.next_frame().with_footer([0xFF, 0xFF]);
            self.push(frame);
        }
        self
    }

    /// Append arbitrary bytes (misalignment, partial frames).
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Records a decoder should persist, in order.
    pub fn expected_records(&self) -> &[Record] {
        &self.records
    }

    /// Wire bytes built so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into wire bytes.
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    /// Consume into a [`SimFeed`].
    pub fn into_feed(self, seed: u64) -> SimFeed {
        SimFeed::new(self.bytes, seed)
    }

    fn next_frame(&mut self) -> DataFrame {
        let channel = self.frames as u8;
        let frame = DataFrame::new(channel, self.timestamp);
        self.frames += 1;
        self.timestamp = self.timestamp.wrapping_add(self.timestamp_step);
        frame
    }

    fn push(&mut self, frame: DataFrame) {
        if frame.is_good() {
            self.records.push(frame.record());
        }
        self.bytes.extend_from_slice(&frame.to_bytes());
    }
}
