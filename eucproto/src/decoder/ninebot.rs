//! Ninebot decoder (spec §4.2.3).
//!
//! Uses the Nordic-UART-style envelope shared with NinebotZ and InMotion V2.
//! Ninebot's classic firmware requires a ~1000 ms keepalive poll to keep
//! telemetry notifications flowing.

use super::{DecodedData, Decoder};
use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::framing::nordic_uart::{build_message, NordicUartFramer};
use crate::framing::Framer;
use crate::state::{WheelState, WheelType};
use crate::util;

const CMD_LIVE: u8 = 0x64;
const CMD_SERIAL_PART: u8 = 0x50;

#[derive(Debug, Default)]
pub struct NinebotDecoder {
    framer: NordicUartFramer,
    serial_fragments: [Option<String>; 3],
}

impl NinebotDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_frame(&mut self, content: &[u8], prior: &WheelState) -> Option<WheelState> {
        // content = flags, len, cmd, data.., checksum
        if content.len() < 4 {
            return None;
        }
        let cmd = content[2];
        let data = &content[3..content.len() - 1];
        let mut state = prior.clone();
        state.wheel_type = WheelType::Ninebot;

        match cmd {
            CMD_LIVE if data.len() >= 10 => {
                state.voltage = util::read_u16_le(data, 0..2) as i32;
                state.speed = util::read_i16_le(data, 2..4) as i32;
                state.total_distance = util::read_u32_le(data, 4..8) as i64;
                state.current = util::read_i16_le(data, 8..10) as i32;
                state.timestamp = util::now_millis();
                Some(state)
            }
            CMD_SERIAL_PART if !data.is_empty() => {
                let slot = (data[0] as usize).min(2);
                self.serial_fragments[slot] = Some(String::from_utf8_lossy(&data[1..]).to_string());
                if self.serial_fragments.iter().all(Option::is_some) {
                    state.serial_number = self
                        .serial_fragments
                        .iter()
                        .map(|f| f.as_deref().unwrap_or(""))
                        .collect::<Vec<_>>()
                        .join("");
                    state.timestamp = util::now_millis();
                    Some(state)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl Decoder for NinebotDecoder {
    fn decode(
        &mut self,
        chunk: &[u8],
        prior_state: &WheelState,
    ) -> Result<Option<DecodedData>, DecodeError> {
        let frames = self.framer.feed(chunk);
        let mut state = prior_state.clone();
        let mut last = None;
        for content in frames {
            if let Some(next) = self.decode_frame(&content, &state) {
                state = next;
                last = Some(state.clone());
            }
        }
        Ok(last.map(DecodedData::from_state))
    }

    fn keepalive_command(&self) -> Option<WheelCommand> {
        Some(WheelCommand::SendBytes(build_message(0x00, CMD_LIVE, &[])))
    }

    fn keepalive_interval_ms(&self) -> Option<u64> {
        Some(1000)
    }

    fn build_command(&self, command: WheelCommand) -> Vec<WheelCommand> {
        match command {
            WheelCommand::PowerOff => {
                vec![WheelCommand::SendBytes(build_message(0x00, 0x40, &[0x00]))]
            }
            WheelCommand::SetLight(on) => vec![WheelCommand::SendBytes(build_message(
                0x00,
                0x1A,
                &[if on { 0x01 } else { 0x00 }],
            ))],
            WheelCommand::SendBytes(payload) => vec![WheelCommand::SendBytes(payload)],
            WheelCommand::SendDelayed { payload, delay_ms } => {
                vec![WheelCommand::SendDelayed { payload, delay_ms }]
            }
            _ => Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.framer.reset();
        self.serial_fragments = [None, None, None];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_live_frame() {
        let mut decoder = NinebotDecoder::new();
        let state = WheelState::initial();
        let mut data = vec![0u8; 10];
        data[0..2].copy_from_slice(&6000u16.to_le_bytes());
        let wire = build_message(0x00, CMD_LIVE, &data);
        let out = decoder.decode(&wire, &state).unwrap().unwrap();
        assert_eq!(out.new_state.wheel_type, WheelType::Ninebot);
        assert_eq!(out.new_state.voltage, 6000);
    }

    #[test]
    fn assembles_serial_across_three_fragments() {
        let mut decoder = NinebotDecoder::new();
        let mut state = WheelState::initial();
        for (i, part) in ["AAA", "BBB", "CCC"].iter().enumerate() {
            let mut data = vec![i as u8];
            data.extend_from_slice(part.as_bytes());
            let wire = build_message(0x00, CMD_SERIAL_PART, &data);
            if let Some(out) = decoder.decode(&wire, &state).unwrap() {
                state = out.new_state;
            }
        }
        assert_eq!(state.serial_number, "AAABBBCCC");
    }

    #[test]
    fn keepalive_required_at_one_second() {
        let decoder = NinebotDecoder::new();
        assert_eq!(decoder.keepalive_interval_ms(), Some(1000));
        assert!(decoder.keepalive_command().is_some());
    }
}
