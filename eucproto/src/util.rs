//! Byte/bit utilities shared by every vendor framer and decoder.
//!
//! This includes endianness helpers built on [`byteorder`], the checksum
//! primitives the wire formats in `spec.md` §6.3 rely on, and the
//! [`Field`]-range idiom used to describe fixed binary layouts without
//! scattering raw offset arithmetic through decode bodies.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// A half-open byte range inside a frame payload.
pub type Field = core::ops::Range<usize>;

/// Swaps every adjacent byte pair of `buf` in place.
///
/// Kingsong stores most 16-bit fields big-endian, but after an additional
/// per-word byte swap across the whole payload window (spec §4.1). Calling
/// this once on the window before reading individual fields undoes that
/// transform so every field can then be read as plain big-endian.
///
/// If `buf` has an odd length the trailing byte is left untouched.
pub fn word_swap(buf: &mut [u8]) {
    let mut chunks = buf.chunks_exact_mut(2);
    for pair in &mut chunks {
        pair.swap(0, 1);
    }
}

/// Computes the running XOR of every byte in `bytes`, wrapping modulo 256.
///
/// Used by the Nordic-UART envelope (Ninebot / NinebotZ / InMotion V2) as
/// described in spec §4.1 and §6.3: the checksum covers every byte from
/// `flags` through the last data byte inclusive.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Computes the CRC-16/CCITT-FALSE checksum Veteran frames carry as their
/// trailing two bytes.
pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    const POLY: u16 = 0x1021;
    let mut crc: u16 = 0xffff;
    for &byte in bytes {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Reads a big-endian unsigned 16-bit integer at `field` within `buf`.
pub fn read_u16_be(buf: &[u8], field: Field) -> u16 {
    BigEndian::read_u16(&buf[field])
}

/// Reads a big-endian signed 16-bit integer at `field` within `buf`.
pub fn read_i16_be(buf: &[u8], field: Field) -> i16 {
    BigEndian::read_i16(&buf[field])
}

/// Reads a little-endian unsigned 16-bit integer at `field` within `buf`.
pub fn read_u16_le(buf: &[u8], field: Field) -> u16 {
    LittleEndian::read_u16(&buf[field])
}

/// Reads a little-endian signed 16-bit integer at `field` within `buf`.
pub fn read_i16_le(buf: &[u8], field: Field) -> i16 {
    LittleEndian::read_i16(&buf[field])
}

/// Reads a big-endian unsigned 32-bit integer at `field` within `buf`.
pub fn read_u32_be(buf: &[u8], field: Field) -> u32 {
    BigEndian::read_u32(&buf[field])
}

/// Reads a little-endian unsigned 32-bit integer at `field` within `buf`.
pub fn read_u32_le(buf: &[u8], field: Field) -> u32 {
    LittleEndian::read_u32(&buf[field])
}

/// Converts kilometers to miles using the constant from spec §6.5.
pub const KM_TO_MILES: f64 = 0.62137119223733;

/// The current epoch-millisecond timestamp, used to stamp fresh
/// [`crate::state::WheelState`] snapshots.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_swap_reverses_pairs() {
        let mut buf = [0x12, 0x34, 0x56, 0x78];
        word_swap(&mut buf);
        assert_eq!(buf, [0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn word_swap_leaves_trailing_byte() {
        let mut buf = [0x01, 0x02, 0x03];
        word_swap(&mut buf);
        assert_eq!(buf, [0x02, 0x01, 0x03]);
    }

    #[test]
    fn xor_checksum_is_associative_over_concatenation() {
        let a = [0x01, 0x02, 0x03];
        let b = [0x04, 0x05];
        let whole: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(
            xor_checksum(&whole),
            xor_checksum(&a) ^ xor_checksum(&b)
        );
    }

    #[test]
    fn crc16_known_vector() {
        // "123456789" -> 0x29B1 is the canonical CRC-16/CCITT-FALSE test vector.
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
    }
}
