//! Frame stream decoder.
//!
//! Turns an unbounded byte stream into 12-byte frames and classifies each one
//! by its header and footer markers. The decoder is a pure state machine: the
//! caller pushes whatever the transport delivered and pulls classified frames
//! until none are left.
//!
//! # Framing
//!
//! By default the stream is assumed frame-aligned from connection start and
//! every 12-byte window is a candidate frame, whatever its markers say
//! ([`ResyncPolicy::FixedOffset`]). A marker mismatch is counted and the
//! window dropped; the decoder does not go looking for the next header.
//!
//! [`ResyncPolicy::ScanForHeader`] is the alternative for links where
//! misalignment is possible. A window with a bad header is still counted once,
//! then the decoder discards bytes until the next `AA 55` before cutting the
//! next window.
//!
//! # Termination
//!
//! Once `target_good_frames` good frames were produced the decoder is
//! complete and yields nothing more. Whatever is left in the residual buffer
//! at [`FrameDecoder::finish`] is reported as a trailing partial frame and
//! dropped.

use bytes::{Buf, BytesMut};
use sitcp_proto::{
    DataFrame, FRAME_SIZE, Record,
    feed::HEADER_MARKER,
    hexfmt::to_hex,
};

use crate::config::DecoderConfig;

/// Behavior after a header mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncPolicy {
    /// Every 12-byte window is a frame
    #[default]
    FixedOffset,
    /// Skip to the next header marker after a bad header
    ScanForHeader,
}

/// One frame after marker checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedFrame {
    /// Zero-based position among all frames of the run
    pub index: u64,
    /// The raw window
    pub frame: DataFrame,
}

impl ClassifiedFrame {
    /// Header marker matched.
    pub fn header_ok(&self) -> bool {
        self.frame.header_ok()
    }

    /// Footer marker matched.
    pub fn footer_ok(&self) -> bool {
        self.frame.footer_ok()
    }

    /// Both markers matched.
    pub fn is_good(&self) -> bool {
        self.frame.is_good()
    }

    /// Sink record, only for good frames.
    pub fn record(&self) -> Option<Record> {
        self.is_good().then(|| self.frame.record())
    }
}

/// Running frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    /// Windows interpreted as frames
    pub total_frames: u64,
    /// Frames with both markers correct
    pub good_frames: u64,
    /// Frames with a bad header (may also have a bad footer)
    pub bad_header: u64,
    /// Frames with a bad footer (may also have a bad header)
    pub bad_footer: u64,
    /// Bytes discarded while scanning for a header
    pub skipped_bytes: u64,
}

/// Final report of a decoder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Windows interpreted as frames
    pub total_frames: u64,
    /// Frames with both markers correct
    pub good_frames: u64,
    /// Frames with a bad header
    pub bad_header: u64,
    /// Frames with a bad footer
    pub bad_footer: u64,
    /// Bytes discarded while scanning for a header
    pub skipped_bytes: u64,
    /// Incomplete trailing frame bytes discarded at the end of the run
    pub trailing_bytes: usize,
}

impl RunSummary {
    /// Frames that were not good.
    pub fn invalid_frames(&self) -> u64 {
        self.total_frames - self.good_frames
    }

    /// `invalid / total`, `None` when no frame was parsed.
    pub fn loss_rate(&self) -> Option<f64> {
        if self.total_frames == 0 {
            return None;
        }
        Some(self.invalid_frames() as f64 / self.total_frames as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Aligned,
    /// Looking for the next header marker
    Resyncing,
}

/// Frame stream decoder session.
///
/// Lives for one acquisition run. Residual bytes never carry over into a new
/// session.
#[derive(Debug)]
pub struct FrameDecoder {
    config: DecoderConfig,
    buffer: BytesMut,
    counters: Counters,
    state: State,
    completed: bool,
}

impl FrameDecoder {
    /// Start a new session.
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            buffer: BytesMut::with_capacity(4 * 1024),
            counters: Counters::default(),
            state: State::Aligned,
            completed: config.target_good_frames == 0,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Current counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// True once the good-frame target was reached.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Bytes buffered that do not yet form a frame.
    pub fn residual_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append received bytes. Ignored once the session is complete.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.completed {
            tracing::debug!(len = chunk.len(), "decoder complete, ignoring chunk");
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Cut and classify the next frame, if a full window is buffered.
    pub fn next_frame(&mut self) -> Option<ClassifiedFrame> {
        if self.completed {
            return None;
        }
        if self.state == State::Resyncing && !self.resync() {
            return None;
        }
        if self.buffer.len() < FRAME_SIZE {
            return None;
        }

        let mut window = [0u8; FRAME_SIZE];
        window.copy_from_slice(&self.buffer[..FRAME_SIZE]);
        let frame = DataFrame::from_window(&window);

        if !frame.header_ok() && self.config.resync == ResyncPolicy::ScanForHeader {
            // The marker may start anywhere past the first byte of this window
            self.buffer.advance(1);
            self.counters.skipped_bytes += 1;
            self.state = State::Resyncing;
        } else {
            self.buffer.advance(FRAME_SIZE);
        }

        Some(self.classify(frame))
    }

    /// Push a chunk and drain every complete frame.
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<ClassifiedFrame> {
        self.push(chunk);

        let mut frames = Vec::with_capacity(self.buffer.len() / FRAME_SIZE);
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// End the session and report.
    pub fn finish(self) -> RunSummary {
        let trailing_bytes = self.buffer.len();
        if trailing_bytes > 0 {
            tracing::warn!(
                trailing_bytes,
                "bytes remain that do not form a full frame; ignored"
            );
        }

        RunSummary {
            total_frames: self.counters.total_frames,
            good_frames: self.counters.good_frames,
            bad_header: self.counters.bad_header,
            bad_footer: self.counters.bad_footer,
            skipped_bytes: self.counters.skipped_bytes,
            trailing_bytes,
        }
    }

    fn classify(&mut self, frame: DataFrame) -> ClassifiedFrame {
        let index = self.counters.total_frames;
        self.counters.total_frames += 1;

        let header_ok = frame.header_ok();
        let footer_ok = frame.footer_ok();
        if !header_ok {
            self.counters.bad_header += 1;
        }
        if !footer_ok {
            self.counters.bad_footer += 1;
        }

        tracing::trace!(
            index,
            header = %to_hex(&frame.header()),
            header_ok,
            footer = %to_hex(&frame.footer()),
            footer_ok,
            "frame"
        );

        if header_ok && footer_ok {
            self.counters.good_frames += 1;
            if self.counters.good_frames >= self.config.target_good_frames {
                tracing::info!(good_frames = self.counters.good_frames, "target reached");
                self.completed = true;
            }
        }

        ClassifiedFrame { index, frame }
    }

    /// Discard bytes up to the next header marker. True once aligned.
    fn resync(&mut self) -> bool {
        let found = self.buffer.windows(HEADER_MARKER.len()).position(|w| w == HEADER_MARKER);

        let (skip, aligned) = match found {
            Some(pos) => (pos, true),
            None => {
                // Keep a trailing first marker byte; its partner may be in the next chunk
                let keep = usize::from(self.buffer.last() == Some(&HEADER_MARKER[0]));
                (self.buffer.len() - keep, false)
            },
        };

        self.buffer.advance(skip);
        self.counters.skipped_bytes += skip as u64;
        if aligned {
            tracing::debug!(skipped = skip, "resynchronized on header marker");
            self.state = State::Aligned;
        }
        aligned
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    fn config(target: u64) -> DecoderConfig {
        DecoderConfig { target_good_frames: target, resync: ResyncPolicy::FixedOffset }
    }

    fn good(channel: u8, ts: u64) -> [u8; FRAME_SIZE] {
        DataFrame::new(channel, ts).to_bytes()
    }

    #[test]
    fn frames_split_across_chunks() {
        let mut decoder = FrameDecoder::new(config(10));
        let mut stream = Vec::new();
        stream.extend_from_slice(&good(1, 100));
        stream.extend_from_slice(&good(2, 200));

        assert!(decoder.ingest(&stream[..5]).is_empty());
        let frames = decoder.ingest(&stream[5..17]);
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.residual_len(), 5);

        let frames = decoder.ingest(&stream[17..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, 1);
        assert_eq!(frames[0].record().unwrap().timestamp(), 200);

        let summary = decoder.finish();
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.good_frames, 2);
        assert_eq!(summary.trailing_bytes, 0);
    }

    #[test]
    fn bad_header_and_footer_both_counted() {
        let mut decoder = FrameDecoder::new(config(10));
        let broken = DataFrame::new(3, 3).with_header([0, 0]).with_footer([0, 0]).to_bytes();

        let frames = decoder.ingest(&broken);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].record().is_none());

        let summary = decoder.finish();
        assert_eq!(summary.total_frames, 1);
        assert_eq!(summary.good_frames, 0);
        assert_eq!(summary.bad_header, 1);
        assert_eq!(summary.bad_footer, 1);
        assert_eq!(summary.invalid_frames(), 1);
        assert_eq!(summary.loss_rate(), Some(1.0));
    }

    #[test]
    fn stops_at_target_and_reports_residual() {
        let mut decoder = FrameDecoder::new(config(2));
        let mut stream = Vec::new();
        for i in 0..4 {
            stream.extend_from_slice(&good(0, i));
        }

        let frames = decoder.ingest(&stream);
        assert_eq!(frames.len(), 2);
        assert!(decoder.is_complete());
        assert!(decoder.ingest(&good(0, 9)).is_empty());

        let summary = decoder.finish();
        assert_eq!(summary.good_frames, 2);
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.trailing_bytes, 2 * FRAME_SIZE);
    }

    #[test]
    fn bad_frames_do_not_count_toward_target() {
        let mut decoder = FrameDecoder::new(config(1));
        let mut stream = DataFrame::new(0, 0).with_footer([1, 1]).to_bytes().to_vec();
        stream.extend_from_slice(&good(5, 5));

        let frames = decoder.ingest(&stream);
        assert_eq!(frames.len(), 2);
        assert!(decoder.is_complete());
        assert_eq!(decoder.counters().bad_footer, 1);
    }

    #[test]
    fn empty_run_has_undefined_loss_rate() {
        let mut decoder = FrameDecoder::new(config(10));
        decoder.ingest(&[0xAA, 0x55, 0x01]);

        let summary = decoder.finish();
        assert_eq!(summary.total_frames, 0);
        assert_eq!(summary.loss_rate(), None);
        assert_eq!(summary.trailing_bytes, 3);
    }

    #[test]
    fn zero_target_is_complete_immediately() {
        let mut decoder = FrameDecoder::new(config(0));
        assert!(decoder.is_complete());
        assert!(decoder.ingest(&good(0, 0)).is_empty());
        assert_eq!(decoder.finish().trailing_bytes, 0);
    }

    #[test]
    fn fixed_offset_never_realigns() {
        let mut decoder = FrameDecoder::new(config(100));
        let mut stream = vec![0x00];
        for i in 0..3 {
            stream.extend_from_slice(&good(0, i));
        }

        decoder.ingest(&stream);
        let summary = decoder.finish();
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.good_frames, 0);
        assert_eq!(summary.trailing_bytes, 1);
    }

    #[test]
    fn scan_recovers_after_inserted_byte() {
        let mut decoder = FrameDecoder::new(DecoderConfig {
            target_good_frames: 100,
            resync: ResyncPolicy::ScanForHeader,
        });
        let mut stream = vec![0x00];
        for i in 0..3 {
            stream.extend_from_slice(&good(0, i));
        }

        let frames = decoder.ingest(&stream);
        let good_count = frames.iter().filter(|f| f.is_good()).count();
        assert_eq!(good_count, 3);

        let summary = decoder.finish();
        assert_eq!(summary.total_frames, 4);
        assert_eq!(summary.bad_header, 1);
        assert_eq!(summary.skipped_bytes, 1);
        assert_eq!(summary.trailing_bytes, 0);
    }

    #[test]
    fn scan_keeps_partial_marker_between_chunks() {
        let mut decoder = FrameDecoder::new(DecoderConfig {
            target_good_frames: 100,
            resync: ResyncPolicy::ScanForHeader,
        });
        let frame = good(9, 9);

        // 12 bytes of garbage ending in the first marker byte
        let mut garbage = vec![0x11; FRAME_SIZE - 1];
        garbage.push(0xAA);
        assert_eq!(decoder.ingest(&garbage).len(), 1);

        let frames = decoder.ingest(&frame[1..]);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_good());
        assert_eq!(frames[0].record().unwrap().channel_id(), 9);
        assert_eq!(decoder.counters().skipped_bytes, (FRAME_SIZE - 1) as u64);
    }

    #[test]
    fn good_frame_wire_layout() {
        let mut decoder = FrameDecoder::new(config(10));
        let frames = decoder.ingest(&hex!("AA55 42 01020304050607 55AA"));

        let record = frames[0].record().unwrap();
        assert_eq!(record.as_bytes(), &hex!("42 01020304050607"));
        assert_eq!(record.timestamp(), 0x0102_0304_0506_07);
    }

    proptest! {
        #[test]
        fn fixed_offset_accounts_for_every_byte(
            bytes in proptest::collection::vec(any::<u8>(), 0..400),
        ) {
            let mut decoder = FrameDecoder::new(config(u64::MAX));
            decoder.ingest(&bytes);
            let summary = decoder.finish();

            prop_assert_eq!(
                summary.total_frames as usize * FRAME_SIZE + summary.trailing_bytes,
                bytes.len()
            );
            prop_assert!(summary.good_frames <= summary.total_frames);
            prop_assert_eq!(summary.skipped_bytes, 0);
        }

        #[test]
        fn scan_never_loses_a_good_frame_after_noise(
            noise in proptest::collection::vec(0u8..0xAA, 0..40),
            count in 1usize..10,
        ) {
            let mut decoder = FrameDecoder::new(DecoderConfig {
                target_good_frames: u64::MAX,
                resync: ResyncPolicy::ScanForHeader,
            });
            let mut stream = noise.clone();
            for i in 0..count {
                stream.extend_from_slice(&good(i as u8, i as u64));
            }

            decoder.ingest(&stream);
            let summary = decoder.finish();
            prop_assert_eq!(summary.good_frames, count as u64);
            prop_assert_eq!(summary.trailing_bytes, 0);
        }
    }
}
