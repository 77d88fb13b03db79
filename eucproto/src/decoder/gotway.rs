//! Gotway decoder (spec §4.2.2).
//!
//! Frame layout: `55 AA | payload[20] | type | trailer`. Gotway carries no
//! end-to-end checksum; [`crate::framing::gotway::GotwayFramer`] only
//! verifies header alignment.

use super::{DecodedData, Decoder};
use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::framing::gotway::GotwayFramer;
use crate::framing::Framer;
use crate::state::{WheelState, WheelType};
use crate::util::{self, Field};

pub(crate) const TYPE_LIVE: u8 = 0x00;
pub(crate) const TYPE_SETTINGS: u8 = 0x01;

pub(crate) const F_SPEED: Field = 0..2;
pub(crate) const F_VOLTAGE: Field = 2..4;
pub(crate) const F_DISTANCE: Field = 4..8;
pub(crate) const F_PHASE_CURRENT: Field = 8..10;
pub(crate) const F_TEMPERATURE: Field = 10..12;
pub(crate) const F_CURRENT: Field = 12..14;

/// MPU6050-style register-to-Celsius conversion: the only formula the open
/// question in spec §9 (note 1) could be confidently grounded on, since the
/// `/340` constant appears verbatim in the legacy hint.
pub(crate) fn register_temperature_centidegrees(raw: i16) -> i32 {
    let celsius = raw as f64 / 340.0 + 36.53;
    (celsius * 100.0).round() as i32
}

/// Decodes the 20-byte payload window shared by Gotway and Veteran live
/// frames (spec §4.2.2) into `state`, mutating it in place.
pub(crate) fn decode_live_common(payload: &[u8], state: &mut WheelState, wheel_type: WheelType) {
    state.wheel_type = wheel_type;
    let raw_speed = util::read_i16_be(payload, F_SPEED);
    state.speed = (raw_speed as f64 * 3.6).round() as i32;
    state.voltage = util::read_u16_be(payload, F_VOLTAGE) as i32;
    state.total_distance = util::read_u32_be(payload, F_DISTANCE) as i64;
    state.phase_current = util::read_i16_be(payload, F_PHASE_CURRENT) as i32;
    state.temperature = register_temperature_centidegrees(util::read_i16_be(payload, F_TEMPERATURE));
    state.current = util::read_i16_be(payload, F_CURRENT) as i32;
    state.power = ((state.voltage as i64 * state.current as i64) / 100) as i32;
    state.timestamp = util::now_millis();
}

pub(crate) fn decode_settings_common(payload: &[u8], state: &mut WheelState, wheel_type: WheelType) {
    state.wheel_type = wheel_type;
    state.pedals_mode = payload[0] as i32;
    state.speed_alarms = payload[1] as i32;
    state.timestamp = util::now_millis();
}

/// Gotway's ASCII pedal-mode opcodes (spec §4.2.2): 0 → `h`, 1 → `f`,
/// 2 → `s`, 3 → `m`.
pub(crate) fn pedal_mode_opcode(mode: i32) -> u8 {
    match mode {
        0 => b'h',
        1 => b'f',
        2 => b's',
        _ => b'm',
    }
}

#[derive(Debug, Default)]
pub struct GotwayDecoder {
    framer: GotwayFramer,
}

impl GotwayDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_frame(&self, frame: &[u8], prior: &WheelState) -> Option<WheelState> {
        let frame_type = *frame.get(22)?;
        let payload = &frame[2..22];
        let mut state = prior.clone();
        match frame_type {
            TYPE_LIVE => decode_live_common(payload, &mut state, WheelType::Gotway),
            TYPE_SETTINGS => decode_settings_common(payload, &mut state, WheelType::Gotway),
            _ => return None,
        }
        Some(state)
    }
}

impl Decoder for GotwayDecoder {
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
            WheelCommand::Calibrate => vec![
                WheelCommand::SendBytes(b"c".to_vec()),
                WheelCommand::SendDelayed {
                    payload: b"y".to_vec(),
                    delay_ms: 300,
                },
            ],
            WheelCommand::SetPedalsMode(mode) => {
                vec![WheelCommand::SendBytes(vec![pedal_mode_opcode(mode)])]
            }
            WheelCommand::PowerOff => vec![WheelCommand::SendBytes(b"p".to_vec())],
            WheelCommand::ResetTrip => vec![WheelCommand::SendBytes(b"r".to_vec())],
            WheelCommand::SendBytes(payload) => vec![WheelCommand::SendBytes(payload)],
            WheelCommand::SendDelayed { payload, delay_ms } => {
                vec![WheelCommand::SendDelayed { payload, delay_ms }]
            }
            _ => Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.framer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_live_frame(speed: i16, voltage: u16, temp_raw: i16) -> Vec<u8> {
        let mut f = vec![0x55u8, 0xAA];
        let mut payload = [0u8; 20];
        payload[0..2].copy_from_slice(&speed.to_be_bytes());
        payload[2..4].copy_from_slice(&voltage.to_be_bytes());
        payload[10..12].copy_from_slice(&temp_raw.to_be_bytes());
        f.extend_from_slice(&payload);
        f.push(TYPE_LIVE);
        f.push(0x00);
        f
    }

    #[test]
    fn decodes_live_frame() {
        let mut decoder = GotwayDecoder::new();
        let state = WheelState::initial();
        let frame = sample_live_frame(100, 8400, 0);
        let out = decoder.decode(&frame, &state).unwrap().unwrap();
        assert_eq!(out.new_state.wheel_type, WheelType::Gotway);
        assert_eq!(out.new_state.speed, 360);
        assert_eq!(out.new_state.voltage, 8400);
    }

    #[test]
    fn s6_calibrate_is_two_step() {
        let decoder = GotwayDecoder::new();
        let cmds = decoder.build_command(WheelCommand::Calibrate);
        assert_eq!(
            cmds,
            vec![
                WheelCommand::SendBytes(b"c".to_vec()),
                WheelCommand::SendDelayed {
                    payload: b"y".to_vec(),
                    delay_ms: 300
                },
            ]
        );
    }

    #[test]
    fn build_command_is_idempotent() {
        let decoder = GotwayDecoder::new();
        let a = decoder.build_command(WheelCommand::SetPedalsMode(2));
        let b = decoder.build_command(WheelCommand::SetPedalsMode(2));
        assert_eq!(a, b);
    }
}
