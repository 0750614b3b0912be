//! Arbitrary byte streams through the frame decoder, in both framing modes.
//!
//! The first byte picks the mode and the chunk size; every input byte must be
//! accounted for as a frame, a skipped byte, or a trailing byte.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sitcp_core::{DecoderConfig, FrameDecoder, ResyncPolicy};
use sitcp_proto::FRAME_SIZE;

fuzz_target!(|data: &[u8]| {
    let Some((&control, stream)) = data.split_first() else {
        return;
    };

    let resync =
        if control & 1 == 0 { ResyncPolicy::FixedOffset } else { ResyncPolicy::ScanForHeader };
    let chunk = usize::from(control >> 1).max(1);

    let mut decoder = FrameDecoder::new(DecoderConfig { target_good_frames: u64::MAX, resync });
    for piece in stream.chunks(chunk) {
        decoder.ingest(piece);
    }
    let summary = decoder.finish();

    assert!(summary.good_frames <= summary.total_frames);
    assert_eq!(summary.invalid_frames(), summary.total_frames - summary.good_frames);

    if resync == ResyncPolicy::FixedOffset {
        let consumed = summary.total_frames as usize * FRAME_SIZE + summary.trailing_bytes;
        assert_eq!(consumed, stream.len());
    }
});
