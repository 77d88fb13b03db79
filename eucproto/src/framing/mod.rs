//! Byte-stream framers: turn a raw transport byte stream into complete,
//! checksum-valid vendor frames.
//!
//! Every framer here is a pure function of the bytes it has been fed (spec
//! §8, framer resync / chunk invariance): feeding a stream one byte at a time
//! must produce exactly the same sequence of emitted frames as feeding it in
//! arbitrarily-sized chunks. Malformed frames (bad checksum, lost alignment)
//! are silently dropped; a framer never panics and never needs to be
//! reconstructed after a bad frame.

pub mod gotway;
pub mod kingsong;
pub mod nordic_uart;

/// Turns raw transport bytes into complete frame payloads.
///
/// Implementations buffer internally; [`Framer::feed`] may be called with any
/// chunking of the underlying byte stream.
pub trait Framer: Send {
    /// Feeds `chunk` into the framer and returns every frame payload that
    /// chunk completed, in arrival order. Payloads exclude header bytes the
    /// framer itself consumed, but include type/sub-ID and checksum bytes so
    /// a decoder can still see and re-verify them if useful.
    fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>>;

    /// Clears all buffered, partially-assembled state. Used when a
    /// connection drops and a fresh one must not see stale bytes.
    fn reset(&mut self);
}
