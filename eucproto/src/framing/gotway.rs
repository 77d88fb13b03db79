//! Gotway and Veteran framers (spec §4.1).
//!
//! The two share a vendor family but not a frame geometry: Gotway is a fixed
//! 24-byte frame behind a two-byte `0x55 0xAA` header with no end-to-end
//! checksum, while Veteran is a three-byte `0xDC 0x5A 0x5C` header, a 20-byte
//! payload, a one-byte type, and a trailing CRC-16/CCITT-FALSE over
//! everything before it (3 + 20 + 1 + 2 = 26 bytes total), which this framer
//! verifies before emitting a frame.

use super::Framer;
use crate::util::crc16_ccitt;

pub const FRAME_LEN: usize = 24;
pub const VETERAN_FRAME_LEN: usize = 26;
pub const GOTWAY_HEADER: [u8; 2] = [0x55, 0xAA];
pub const VETERAN_HEADER: [u8; 3] = [0xDC, 0x5A, 0x5C];

/// Frames Gotway's unauthenticated 24-byte telemetry stream.
#[derive(Debug, Default)]
pub struct GotwayFramer {
    buf: Vec<u8>,
}

impl GotwayFramer {
    pub fn new() -> Self {
        Self::default()
    }

    fn resync(&mut self) {
        while self.buf.len() >= 2 && self.buf[0..2] != GOTWAY_HEADER {
            self.buf.remove(0);
        }
    }
}

impl Framer for GotwayFramer {
    fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            self.resync();
            if self.buf.len() < FRAME_LEN {
                break;
            }
            frames.push(self.buf.drain(..FRAME_LEN).collect());
        }
        frames
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

/// Frames Veteran's CRC-protected 26-byte telemetry stream.
///
/// A frame whose CRC does not verify is a false header match, not a real
/// frame boundary: only the leading byte is discarded so `resync` can
/// re-search from the next position, rather than blindly dropping a whole
/// frame's worth of bytes and losing a real header that started inside it.
#[derive(Debug, Default)]
pub struct VeteranFramer {
    buf: Vec<u8>,
}

impl VeteranFramer {
    pub fn new() -> Self {
        Self::default()
    }

    fn resync(&mut self) {
        while self.buf.len() >= 3 && self.buf[0..3] != VETERAN_HEADER {
            self.buf.remove(0);
        }
    }
}

impl Framer for VeteranFramer {
    fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            self.resync();
            if self.buf.len() < VETERAN_FRAME_LEN {
                break;
            }
            let crc_expected = crc16_ccitt(&self.buf[..VETERAN_FRAME_LEN - 2]);
            let crc_actual = u16::from_be_bytes([
                self.buf[VETERAN_FRAME_LEN - 2],
                self.buf[VETERAN_FRAME_LEN - 1],
            ]);
            if crc_expected == crc_actual {
                frames.push(self.buf.drain(..VETERAN_FRAME_LEN).collect());
            } else {
                self.buf.remove(0);
            }
        }
        frames
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gotway_sample() -> Vec<u8> {
        let mut f = vec![0x55u8, 0xAA];
        f.extend(std::iter::repeat(0u8).take(FRAME_LEN - 2));
        f
    }

    fn veteran_sample() -> Vec<u8> {
        let mut f = vec![0xDCu8, 0x5A, 0x5C];
        f.extend(std::iter::repeat(0u8).take(VETERAN_FRAME_LEN - 5));
        let crc = crc16_ccitt(&f);
        f.extend_from_slice(&crc.to_be_bytes());
        f
    }

    #[test]
    fn gotway_emits_frame_without_checksum_check() {
        let mut framer = GotwayFramer::new();
        let frame = gotway_sample();
        assert_eq!(framer.feed(&frame), vec![frame]);
    }

    #[test]
    fn veteran_verifies_crc() {
        let mut framer = VeteranFramer::new();
        let frame = veteran_sample();
        assert_eq!(framer.feed(&frame), vec![frame]);
    }

    #[test]
    fn veteran_drops_bad_crc_and_resyncs() {
        let mut framer = VeteranFramer::new();
        let mut bad = veteran_sample();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let mut combined = bad.clone();
        combined.extend(veteran_sample());
        let out = framer.feed(&combined);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], veteran_sample());
    }

    #[test]
    fn gotway_chunk_invariance() {
        let mut whole = gotway_sample();
        whole.extend(gotway_sample());

        let mut one_shot = GotwayFramer::new();
        let all_at_once = one_shot.feed(&whole);

        let mut byte_at_a_time = GotwayFramer::new();
        let mut incremental = Vec::new();
        for b in &whole {
            incremental.extend(byte_at_a_time.feed(&[*b]));
        }
        assert_eq!(all_at_once, incremental);
    }
}
