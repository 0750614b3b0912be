//! Deterministic simulation harness for SiTCP board testing.
//!
//! In-memory implementations of the transport traits: an RBCP board with
//! scripted and seeded fault injection, and a byte-stream feed that replays a
//! frame sequence in random chunk sizes. Every random choice comes from a
//! seeded ChaCha RNG, so a failing run replays exactly from its seed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod board;
pub mod feed;

pub use board::{Fault, SimBoard};
pub use feed::{FeedBuilder, SimFeed};
