//! Veteran decoder (spec §4.2.2).
//!
//! Shares Gotway's 20-byte payload layout but sits in a 26-byte frame behind
//! a three-byte `DC 5A 5C` header, a trailing one-byte type, and a
//! CRC-verified 2-byte trailer ([`crate::framing::gotway::VeteranFramer`]
//! rejects bad-CRC frames before they ever reach this decoder).

use super::gotway::{decode_live_common, decode_settings_common, TYPE_LIVE, TYPE_SETTINGS};
use super::{DecodedData, Decoder};
use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::framing::gotway::VeteranFramer;
use crate::framing::Framer;
use crate::state::{WheelState, WheelType};
use crate::util;

#[derive(Debug, Default)]
pub struct VeteranDecoder {
    framer: VeteranFramer,
    /// Firmware major version, learned from a settings frame. Beep has no
    /// opcode on firmware older than 3 (spec §4.2.2).
    firmware_version: u8,
}

impl VeteranDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_frame(&mut self, frame: &[u8], prior: &WheelState) -> Option<WheelState> {
        let frame_type = *frame.get(23)?;
        let payload = &frame[3..23];
        let mut state = prior.clone();
        match frame_type {
            TYPE_LIVE => decode_live_common(payload, &mut state, WheelType::Veteran),
            TYPE_SETTINGS => {
                decode_settings_common(payload, &mut state, WheelType::Veteran);
                self.firmware_version = payload[2];
            }
            _ => return None,
        }
        Some(state)
    }
}

impl Decoder for VeteranDecoder {
    fn decode(
        &mut self,
        chunk: &[u8],
        prior_state: &WheelState,
    ) -> Result<Option<DecodedData>, DecodeError> {
        let frames = self.framer.feed(chunk);
        let mut state = prior_state.clone();
        let mut last = None;
        for frame in frames {
            if let Some(next) = self.decode_frame(&frame, &state) {
                state = next;
                last = Some(state.clone());
            }
        }
        Ok(last.map(DecodedData::from_state))
    }

    fn build_command(&self, command: WheelCommand) -> Vec<WheelCommand> {
        match command {
            WheelCommand::Beep if self.firmware_version >= 3 => {
                vec![WheelCommand::SendBytes(vec![0xDC, 0x5A, 0x5C, 0x00, 0xBB])]
            }
            WheelCommand::Beep => Vec::new(),
            WheelCommand::ResetTrip => {
                vec![WheelCommand::SendBytes(vec![0xDC, 0x5A, 0x5C, 0x01, 0xBB])]
            }
            WheelCommand::SetLight(on) => vec![WheelCommand::SendBytes(vec![
                0xDC,
                0x5A,
                0x5C,
                if on { 0x02 } else { 0x03 },
                0xBB,
            ])],
            WheelCommand::SendBytes(payload) => vec![WheelCommand::SendBytes(payload)],
            WheelCommand::SendDelayed { payload, delay_ms } => {
                vec![WheelCommand::SendDelayed { payload, delay_ms }]
            }
            _ => Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.framer.reset();
        self.firmware_version = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::crc16_ccitt;

    fn sample_live_frame(speed: i16, voltage: u16) -> Vec<u8> {
        let mut f = vec![0xDCu8, 0x5A, 0x5C];
        let mut payload = [0u8; 20];
        payload[0..2].copy_from_slice(&speed.to_be_bytes());
        payload[2..4].copy_from_slice(&voltage.to_be_bytes());
        f.extend_from_slice(&payload);
        f.push(TYPE_LIVE);
        let crc = crc16_ccitt(&f);
        f.extend_from_slice(&crc.to_be_bytes());
        f
    }

    #[test]
    fn decodes_live_frame_with_valid_crc() {
        let mut decoder = VeteranDecoder::new();
        let state = WheelState::initial();
        let frame = sample_live_frame(100, 8400);
        let out = decoder.decode(&frame, &state).unwrap().unwrap();
        assert_eq!(out.new_state.wheel_type, WheelType::Veteran);
        assert_eq!(out.new_state.voltage, 8400);
    }

    #[test]
    fn beep_suppressed_below_firmware_3() {
        let decoder = VeteranDecoder::new();
        assert!(decoder.build_command(WheelCommand::Beep).is_empty());
    }
}
