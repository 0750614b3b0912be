//! Blocking acquisition run over the data feed.
//!
//! Reads the stream chunk by chunk, feeds the [`FrameDecoder`], and appends
//! every good frame's 8-byte record to the sink in arrival order.
//!
//! # Termination
//!
//! - **TargetReached**: the decoder collected its good-frame target
//! - **PeerClosed**: the stream returned zero bytes
//! - **Aborted**: the caller raised the cancel flag (checked between frames
//!   and between reads)
//!
//! Read timeouts and interrupted reads are not failures; they only give the
//! loop a chance to look at the cancel flag. The stream is owned by the run and
//! dropped (closed) on every exit path.

use std::{
    io::{self, Write},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    config::AcquisitionConfig,
    decoder::{FrameDecoder, RunSummary},
    error::AcquisitionError,
    transport::StreamTransport,
};

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Good-frame target reached
    TargetReached,
    /// Peer closed the connection
    PeerClosed,
    /// Caller aborted
    Aborted,
}

/// Outcome of one acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Why the run ended
    pub termination: Termination,
    /// Decoder counters
    pub summary: RunSummary,
    /// Raw bytes read from the stream
    pub bytes_received: u64,
}

/// Acquisition driver.
#[derive(Debug, Clone)]
pub struct Acquisition {
    config: AcquisitionConfig,
}

impl Acquisition {
    /// Create a driver.
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    /// Run until the target is reached, the peer closes, or `cancel` is set.
    ///
    /// # Errors
    ///
    /// Stream read failures (other than timeouts and interrupts) and sink
    /// write failures. The decoder's partial state is reported and dropped.
    pub fn run<S, W>(
        &self,
        mut stream: S,
        sink: &mut W,
        cancel: &AtomicBool,
    ) -> Result<AcquisitionReport, AcquisitionError>
    where
        S: StreamTransport,
        W: Write + ?Sized,
    {
        let mut decoder = FrameDecoder::new(self.config.decoder);
        let mut buf = vec![0u8; self.config.read_chunk_size.max(1)];
        let mut bytes_received = 0u64;

        tracing::info!(
            target_good_frames = self.config.decoder.target_good_frames,
            resync = ?self.config.decoder.resync,
            "acquisition started"
        );

        let termination = loop {
            if decoder.is_complete() {
                break Termination::TargetReached;
            }
            if cancel.load(Ordering::Relaxed) {
                break Termination::Aborted;
            }

            let n = match stream.receive(&mut buf) {
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                    ) =>
                {
                    continue;
                },
                Err(e) => {
                    decoder.finish();
                    return Err(AcquisitionError::Read(e));
                },
            };

            if n == 0 {
                tracing::info!("connection closed by peer");
                break Termination::PeerClosed;
            }
            bytes_received += n as u64;

            decoder.push(&buf[..n]);
            if let Err(e) = drain(&mut decoder, sink, cancel) {
                decoder.finish();
                return Err(AcquisitionError::Sink(e));
            }
        };

        if let Err(e) = sink.flush() {
            decoder.finish();
            return Err(AcquisitionError::Sink(e));
        }

        let summary = decoder.finish();
        tracing::info!(
            ?termination,
            total_frames = summary.total_frames,
            good_frames = summary.good_frames,
            bad_header = summary.bad_header,
            bad_footer = summary.bad_footer,
            "acquisition finished"
        );

        Ok(AcquisitionReport { termination, summary, bytes_received })
    }
}

/// Write every complete good frame; stop early if cancelled.
fn drain<W: Write + ?Sized>(
    decoder: &mut FrameDecoder,
    sink: &mut W,
    cancel: &AtomicBool,
) -> io::Result<()> {
    while let Some(frame) = decoder.next_frame() {
        if let Some(record) = frame.record() {
            sink.write_all(record.as_bytes())?;
        }
        if cancel.load(Ordering::Relaxed) {
            break;
        }
    }
    Ok(())
}
