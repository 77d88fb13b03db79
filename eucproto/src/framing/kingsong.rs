//! Kingsong framer: fixed 20-byte frames, header `0xAA 0x55` (spec §4.1).
//!
//! Kingsong carries no end-to-end checksum over the frame; alignment is the
//! only thing this framer verifies. A misaligned byte stream is recovered by
//! discarding bytes one at a time until the header reappears at the front of
//! the buffer.

use super::Framer;

pub const FRAME_LEN: usize = 20;
pub const HEADER: [u8; 2] = [0xAA, 0x55];

#[derive(Debug, Default)]
pub struct KingsongFramer {
    buf: Vec<u8>,
}

impl KingsongFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops leading bytes until `buf` starts with [`HEADER`] or is too short
    /// to tell.
    fn resync(&mut self) {
        while self.buf.len() >= 2 && self.buf[0..2] != HEADER {
            self.buf.remove(0);
        }
    }
}

impl Framer for KingsongFramer {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Vec<u8> {
        let mut f = vec![0xAAu8, 0x55];
        f.extend(std::iter::repeat(0u8).take(FRAME_LEN - 2));
        f
    }

    #[test]
    fn emits_one_frame_for_exact_bytes() {
        let mut framer = KingsongFramer::new();
        let frame = sample_frame();
        let out = framer.feed(&frame);
        assert_eq!(out, vec![frame]);
    }

    #[test]
    fn discards_garbage_before_header() {
        let mut framer = KingsongFramer::new();
        let mut garbage = vec![0x00, 0x11, 0x22];
        garbage.extend(sample_frame());
        let out = framer.feed(&garbage);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], sample_frame());
    }

    #[test]
    fn chunk_invariance() {
        let mut whole = vec![0x00, 0xAA];
        whole.extend(sample_frame());
        whole.extend(sample_frame());

        let mut one_shot = KingsongFramer::new();
        let all_at_once = one_shot.feed(&whole);

        let mut byte_at_a_time = KingsongFramer::new();
        let mut incremental = Vec::new();
        for b in &whole {
            incremental.extend(byte_at_a_time.feed(&[*b]));
        }

        assert_eq!(all_at_once, incremental);
        assert_eq!(all_at_once.len(), 2);
    }

    #[test]
    fn partial_frame_is_retained_across_feeds() {
        let mut framer = KingsongFramer::new();
        let frame = sample_frame();
        let (head, tail) = frame.split_at(10);
        assert!(framer.feed(head).is_empty());
        let out = framer.feed(tail);
        assert_eq!(out, vec![frame]);
    }
}
