//! Arbitrary datagrams through the RBCP reply parser.
//!
//! Parsing must never panic, and a parsed packet must encode back to the
//! exact input bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sitcp_proto::parse_reply;

fuzz_target!(|data: &[u8]| {
    let Ok(packet) = parse_reply(data) else {
        return;
    };

    let _ = packet.declared_data();
    let _ = packet.command();
    assert_eq!(packet.encode(), data);
});
