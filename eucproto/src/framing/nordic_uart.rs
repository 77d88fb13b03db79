//! The escaped Nordic-UART-style envelope shared by Ninebot, NinebotZ and
//! InMotion V2 (spec §4.1, §6.3, §9):
//!
//! ```text
//! AA AA | flags | len | cmd | data[len-1] | xor_checksum
//! ```
//!
//! `len` counts `cmd` plus `data`, so the unescaped content following the
//! header is exactly `len + 3` bytes (`flags`, `len`, `cmd`, `len - 1` data
//! bytes, checksum). On the wire, any content byte equal to `0xAA` or `0xA5`
//! is escaped by prefixing it with `0xA5`; the two header bytes themselves
//! are never escaped. [`NordicUartFramer`] undoes the escaping and the
//! framing in a single streaming pass so that `feed` can be called with any
//! chunking of the underlying byte stream.

use super::Framer;
use crate::util::xor_checksum;

/// Bytes in `flags`/`len`/content that must be escaped on the wire.
const ESCAPE_MARKER: u8 = 0xA5;
const HEADER_BYTE: u8 = 0xAA;

/// Caps how long `Collecting` will wait for a declared-length frame before
/// giving up and re-synchronizing. A legitimate frame's content is at most
/// `255 + 3` bytes; this is a generous multiple of that to tolerate a
/// plausible but oversized `len` byte without ever growing unbounded.
const MAX_CONTENT_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Scanning for two consecutive literal `0xAA` bytes.
    Unknown,
    FlagSearch,
    LenSearch,
    Collecting,
}

/// Streaming framer/unescaper for the Nordic-UART-style envelope.
#[derive(Debug)]
pub struct NordicUartFramer {
    state: State,
    /// Whether the previous wire byte was an unconsumed `0xA5` escape marker.
    escape_pending: bool,
    /// The last literal (post-unescape) byte seen while in `Unknown`, used to
    /// detect the `0xAA 0xAA` header pair.
    prev_unknown: Option<u8>,
    /// Accumulated content bytes: `flags, len, cmd, data.., checksum`. Does
    /// not include the two header bytes.
    content: Vec<u8>,
    len: u8,
}

impl Default for NordicUartFramer {
    fn default() -> Self {
        Self {
            state: State::Unknown,
            escape_pending: false,
            prev_unknown: None,
            content: Vec::new(),
            len: 0,
        }
    }
}

impl NordicUartFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one already-unescaped literal byte into the framing state
    /// machine, returning a completed content buffer when one finishes.
    fn push_literal(&mut self, byte: u8) -> Option<Vec<u8>> {
        match self.state {
            State::Unknown => {
                if self.prev_unknown == Some(HEADER_BYTE) && byte == HEADER_BYTE {
                    self.state = State::FlagSearch;
                    self.prev_unknown = None;
                    self.content.clear();
                } else {
                    self.prev_unknown = Some(byte);
                }
                None
            }
            State::FlagSearch => {
                self.content.push(byte);
                self.state = State::LenSearch;
                None
            }
            State::LenSearch => {
                self.len = byte;
                self.content.push(byte);
                self.state = State::Collecting;
                None
            }
            State::Collecting => {
                self.content.push(byte);
                let target = self.len as usize + 3;
                if self.content.len() > MAX_CONTENT_LEN {
                    self.state = State::Unknown;
                    self.content.clear();
                    self.prev_unknown = None;
                    return None;
                }
                if self.content.len() == target {
                    self.state = State::Unknown;
                    self.prev_unknown = None;
                    let finished = std::mem::take(&mut self.content);
                    return Some(finished);
                }
                None
            }
        }
    }
}

impl Framer for NordicUartFramer {
    fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for &wire_byte in chunk {
            let literal = if !self.escape_pending && wire_byte == ESCAPE_MARKER {
                self.escape_pending = true;
                continue;
            } else {
                self.escape_pending = false;
                wire_byte
            };

            if let Some(content) = self.push_literal(literal) {
                if content.len() >= 2 {
                    let check_end = content.len() - 1;
                    let expected = xor_checksum(&content[..check_end]);
                    if expected == content[check_end] {
                        frames.push(content);
                    }
                }
            }
        }
        frames
    }

    fn reset(&mut self) {
        self.state = State::Unknown;
        self.escape_pending = false;
        self.prev_unknown = None;
        self.content.clear();
        self.len = 0;
    }
}

/// Escapes `0xAA`/`0xA5` bytes in `content` by prefixing each with `0xA5`.
pub fn escape(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    for &b in content {
        if b == HEADER_BYTE || b == ESCAPE_MARKER {
            out.push(ESCAPE_MARKER);
        }
        out.push(b);
    }
    out
}

/// Reverses [`escape`]: every `0xA5` not itself escaped is a marker and is
/// dropped, with the following byte kept literally.
pub fn unescape(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut pending = false;
    for &b in escaped {
        if !pending && b == ESCAPE_MARKER {
            pending = true;
            continue;
        }
        pending = false;
        out.push(b);
    }
    out
}

/// Builds the unescaped content (`flags, len, cmd, data.., checksum`) for a
/// message, without the `0xAA 0xAA` header.
pub fn wrap(flags: u8, cmd: u8, data: &[u8]) -> Vec<u8> {
    let len = (1 + data.len()) as u8;
    let mut content = Vec::with_capacity(3 + data.len() + 1);
    content.push(flags);
    content.push(len);
    content.push(cmd);
    content.extend_from_slice(data);
    let checksum = xor_checksum(&content);
    content.push(checksum);
    content
}

/// Builds the complete wire representation of a message: header, escaped
/// content.
pub fn build_message(flags: u8, cmd: u8, data: &[u8]) -> Vec<u8> {
    let content = wrap(flags, cmd, data);
    let mut out = vec![HEADER_BYTE, HEADER_BYTE];
    out.extend(escape(&content));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_unescape_round_trip() {
        let content = wrap(0x10, 0x01, &[0xAA, 0xA5, 0x10, 0xAA, 0xAA]);
        let escaped = escape(&content);
        assert_eq!(unescape(&escaped), content);
    }

    #[test]
    fn framer_decodes_built_message() {
        let mut framer = NordicUartFramer::new();
        let wire = build_message(0x10, 0x64, &[0x01, 0x02, 0x03]);
        let out = framer.feed(&wire);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], wrap(0x10, 0x64, &[0x01, 0x02, 0x03]));
    }

    #[test]
    fn framer_handles_escaped_payload_bytes() {
        let mut framer = NordicUartFramer::new();
        let wire = build_message(0x00, 0x01, &[0xAA, 0xA5, 0x10, 0xAA, 0xAA]);
        let out = framer.feed(&wire);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], wrap(0x00, 0x01, &[0xAA, 0xA5, 0x10, 0xAA, 0xAA]));
    }

    #[test]
    fn framer_chunk_invariance_byte_at_a_time() {
        let wire = build_message(0x10, 0x64, &[0xAA, 0x00, 0xA5, 0x7F]);

        let mut one_shot = NordicUartFramer::new();
        let all_at_once = one_shot.feed(&wire);

        let mut byte_at_a_time = NordicUartFramer::new();
        let mut incremental = Vec::new();
        for b in &wire {
            incremental.extend(byte_at_a_time.feed(&[*b]));
        }
        assert_eq!(all_at_once, incremental);
        assert_eq!(all_at_once.len(), 1);
    }

    #[test]
    fn framer_drops_bad_checksum() {
        let mut framer = NordicUartFramer::new();
        let mut wire = build_message(0x10, 0x64, &[0x01]);
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        assert!(framer.feed(&wire).is_empty());
    }

    #[test]
    fn framer_resyncs_after_garbage() {
        let mut framer = NordicUartFramer::new();
        let mut stream = vec![0x00, 0xAA, 0x11];
        stream.extend(build_message(0x10, 0x64, &[0x01, 0x02]));
        let out = framer.feed(&stream);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], wrap(0x10, 0x64, &[0x01, 0x02]));
    }
}
