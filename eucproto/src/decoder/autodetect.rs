//! The auto-detecting meta-decoder (spec §4.3).
//!
//! Used when a [`crate::type_detector::WheelTypeDetector`] only narrows the
//! wheel down to "Ambiguous (Gotway, KingSong, Ninebot)" — here restricted to
//! the two byte-compatible vendors a raw prefix can actually distinguish,
//! Gotway and Veteran.

use super::gotway::GotwayDecoder;
use super::veteran::VeteranDecoder;
use super::{DecodedData, Decoder};
use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::state::{WheelState, WheelType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Detected {
    Gotway,
    Veteran,
}

/// Delegates to [`GotwayDecoder`] or [`VeteranDecoder`] once the first bytes
/// of the stream reveal which header is present.
#[derive(Default)]
pub struct AutoDetectDecoder {
    gotway: Option<GotwayDecoder>,
    veteran: Option<VeteranDecoder>,
    detected: Option<Detected>,
    sniff_buf: Vec<u8>,
}

impl AutoDetectDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_onto(&mut self, prefix: &[u8]) -> Option<Detected> {
        if prefix.len() >= 3 && prefix[0..3] == [0xDC, 0x5A, 0x5C] {
            self.veteran = Some(VeteranDecoder::new());
            Some(Detected::Veteran)
        } else if prefix.len() >= 2 && prefix[0..2] == [0x55, 0xAA] {
            self.gotway = Some(GotwayDecoder::new());
            Some(Detected::Gotway)
        } else {
            None
        }
    }
}

impl Decoder for AutoDetectDecoder {
    fn decode(
        &mut self,
        chunk: &[u8],
        prior_state: &WheelState,
    ) -> Result<Option<DecodedData>, DecodeError> {
        let pending = if self.detected.is_none() {
            self.sniff_buf.extend_from_slice(chunk);
            if self.sniff_buf.len() < 3 {
                return Ok(None);
            }
            self.detected = self.lock_onto(&self.sniff_buf.clone());
            if self.detected.is_none() {
                // Neither header matched in the first three bytes; there is
                // nothing further to try, so remain virtual permanently
                // rather than re-inspecting a growing buffer.
                return Ok(None);
            }
            Some(std::mem::take(&mut self.sniff_buf))
        } else {
            None
        };
        let chunk = pending.as_deref().unwrap_or(chunk);

        let result = match self.detected {
            Some(Detected::Gotway) => self.gotway.as_mut().unwrap().decode(chunk, prior_state)?,
            Some(Detected::Veteran) => self.veteran.as_mut().unwrap().decode(chunk, prior_state)?,
            None => unreachable!(),
        };

        Ok(result.map(|mut data| {
            self.force_detected_type(&mut data.new_state);
            data
        }))
    }

    fn build_command(&self, command: WheelCommand) -> Vec<WheelCommand> {
        match self.detected {
            Some(Detected::Gotway) => self.gotway.as_ref().unwrap().build_command(command),
            Some(Detected::Veteran) => self.veteran.as_ref().unwrap().build_command(command),
            None => Vec::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.detected.is_some()
    }

    fn reset(&mut self) {
        self.gotway = None;
        self.veteran = None;
        self.detected = None;
        self.sniff_buf.clear();
    }
}

impl AutoDetectDecoder {
    fn force_detected_type(&self, state: &mut WheelState) {
        state.wheel_type = match self.detected {
            Some(Detected::Gotway) => WheelType::Gotway,
            Some(Detected::Veteran) => WheelType::Veteran,
            None => WheelType::GotwayVirtual,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::crc16_ccitt;

    #[test]
    fn locks_onto_veteran_header() {
        let mut decoder = AutoDetectDecoder::new();
        let state = WheelState::initial();

        let mut frame = vec![0xDCu8, 0x5A, 0x5C];
        frame.extend(std::iter::repeat(0u8).take(20));
        frame.push(0x00); // TYPE_LIVE
        let crc = crc16_ccitt(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());

        let out = decoder.decode(&frame, &state).unwrap().unwrap();
        assert_eq!(out.new_state.wheel_type, WheelType::Veteran);
        assert!(decoder.is_ready());
    }

    #[test]
    fn waits_for_more_bytes_before_locking() {
        let mut decoder = AutoDetectDecoder::new();
        let state = WheelState::initial();
        let out = decoder.decode(&[0x55], &state).unwrap();
        assert!(out.is_none());
        assert!(!decoder.is_ready());
    }
}
