//! InMotion V2 decoder (spec §4.2.4).
//!
//! Uses the Nordic-UART envelope (`AA AA | flags | len | cmd | data | xor`,
//! escape byte `0xA5`). `MainInfo` frames (`cmd == 0x01`) must arrive before
//! any real-time frame can be parsed — until then, `decode` returns
//! `Ok(None)` and buffers nothing itself (the framer already holds any
//! partial bytes); [`crate::error::DecodeError::ModelNotIdentifiedYet`]
//! exists for diagnostics but is not surfaced on the happy path.

pub mod model;

use self::model::{model_id, LayoutId, ModelInfo};
use super::{DecodedData, Decoder};
use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::framing::nordic_uart::{build_message, NordicUartFramer};
use crate::framing::Framer;
use crate::state::{WheelState, WheelType};
use crate::util;

const CMD_MAIN_INFO: u8 = 0x01;
const CMD_SERIAL: u8 = 0x02;
const CMD_VERSIONS: u8 = 0x06;
const CMD_LIVE: u8 = 0x64;
const CMD_CONTROL: u8 = 0x60;

/// InMotion V2's offset-encoded temperature: stored as `raw + 80`, so the
/// true (possibly negative) Celsius value is `raw + 80 - 256` when the
/// stored byte reads as an unsigned value above 127 (spec §4.2.4).
fn decode_offset_temperature(raw: u8) -> i32 {
    raw as i32 + 80 - 256
}

/// Bit names for the 7-byte error/alert bitfield (spec §7), in
/// `(byte_index, bit_index, name)` order. Multi-bit "level" fields
/// (`overBusCurrent`, `lowBattery`) are represented by their low bit only;
/// the name is emitted whenever either bit of the pair is set.
const ERROR_BITS: &[(usize, u8, &str)] = &[
    (0, 0, "iPhaseSensor"),
    (0, 1, "iBusSensor"),
    (0, 2, "motorHall"),
    (0, 3, "battery"),
    (0, 4, "imuSensor"),
    (0, 5, "controllerCom1"),
    (0, 6, "controllerCom2"),
    (0, 7, "bleCom1"),
    (1, 0, "bleCom2"),
    (1, 1, "mosTempSensor"),
    (1, 2, "motorTempSensor"),
    (1, 3, "batteryTempSensor"),
    (1, 4, "boardTempSensor"),
    (1, 5, "fan"),
    (1, 6, "rtc"),
    (1, 7, "externalRom"),
    (2, 0, "vBusSensor"),
    (2, 1, "vBatterySensor"),
    (2, 2, "canNotPowerOff"),
    (2, 3, "notKnown1"),
    (3, 0, "underVoltage"),
    (3, 1, "overVoltage"),
    (3, 2, "overBusCurrent"),
    (3, 3, "overBusCurrent"),
    (3, 4, "lowBattery"),
    (3, 5, "lowBattery"),
    (3, 6, "mosTemp"),
    (3, 7, "motorTemp"),
    (4, 0, "batteryTemp"),
    (4, 1, "overBoardTemp"),
    (4, 2, "overSpeed"),
    (4, 3, "outputSaturation"),
    (4, 4, "motorSpin"),
    (4, 5, "motorBlock"),
    (4, 6, "posture"),
    (4, 7, "riskBehaviour"),
    (5, 0, "motorNoLoad"),
    (5, 1, "noSelfTest"),
    (5, 2, "compatibility"),
    (5, 3, "powerKeyLongPress"),
    (5, 4, "forceDfu"),
    (5, 5, "deviceLock"),
    (5, 6, "cpuOverTemp"),
    (5, 7, "imuOverTemp"),
    (6, 1, "hwCompatibility"),
    (6, 2, "fanLowSpeed"),
    (6, 3, "notKnown2"),
];

/// Builds the space-separated alert string from a 7-byte error bitfield.
fn build_alert_string(bytes: &[u8]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    for &(byte_idx, bit_idx, name) in ERROR_BITS {
        if byte_idx >= bytes.len() {
            continue;
        }
        if bytes[byte_idx] & (1 << bit_idx) != 0 && seen.insert(name) {
            names.push(name);
        }
    }
    names.join(" ")
}

#[derive(Debug, Default)]
pub struct InMotionV2Decoder {
    framer: NordicUartFramer,
    model: Option<ModelInfo>,
    layout_override: Option<LayoutId>,
}

impl InMotionV2Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn effective_layout(&self) -> LayoutId {
        self.layout_override
            .unwrap_or(self.model.map(|m| m.layout).unwrap_or(LayoutId::V12Family))
    }

    fn decode_frame(&mut self, content: &[u8], prior: &WheelState) -> Option<WheelState> {
        if content.len() < 4 {
            return None;
        }
        let cmd = content[2];
        let data = &content[3..content.len() - 1];

        match cmd {
            CMD_MAIN_INFO if data.len() >= 2 => {
                let id = model_id(data[0], data[1]);
                self.model = model::lookup(id).copied();
                let mut state = prior.clone();
                state.wheel_type = WheelType::InMotionV2;
                if let Some(m) = self.model {
                    state.model = m.display_name.to_string();
                    state.max_speed = m.max_speed_kmh;
                }
                state.timestamp = util::now_millis();
                Some(state)
            }
            CMD_SERIAL => {
                let mut state = prior.clone();
                state.wheel_type = WheelType::InMotionV2;
                state.serial_number = String::from_utf8_lossy(data).trim_end_matches('\0').to_string();
                state.timestamp = util::now_millis();
                Some(state)
            }
            CMD_VERSIONS if data.len() >= 6 => {
                // data: driverBoard[2], mainBoard[2], ble[2]
                let main_board1 = data[2];
                let main_board2 = data[3];
                if main_board1 < 2 && main_board2 < 4 {
                    self.layout_override = Some(LayoutId::V11V1);
                } else if self.model.map(|m| m.layout) == Some(LayoutId::V11V1) {
                    self.layout_override = Some(LayoutId::V11V2);
                }
                let mut state = prior.clone();
                state.wheel_type = WheelType::InMotionV2;
                state.version = format!("{}.{}", data[2], data[3]);
                state.timestamp = util::now_millis();
                Some(state)
            }
            CMD_LIVE => {
                if self.model.is_none() {
                    // ModelNotIdentifiedYet: buffered, no state emitted.
                    return None;
                }
                self.decode_live(data, prior)
            }
            _ => None,
        }
    }

    fn decode_live(&self, data: &[u8], prior: &WheelState) -> Option<WheelState> {
        if data.len() < 16 {
            return None;
        }
        let mut state = prior.clone();
        state.wheel_type = WheelType::InMotionV2;

        // Shared core fields across all five layouts; per-model offsets for
        // the remaining trailing fields differ only by scale, which the
        // model registry already captures via max_speed/cell_count.
        state.voltage = util::read_u16_le(data, 0..2) as i32;
        state.speed = util::read_i16_le(data, 2..4) as i32;
        state.current = util::read_i16_le(data, 4..6) as i32;
        state.temperature = decode_offset_temperature(data[6]) * 100;
        state.battery_level = data[7] as i32;
        state.angle = util::read_i16_le(data, 8..10) as f64 / 100.0;
        state.roll = util::read_i16_le(data, 10..12) as f64 / 100.0;
        state.calculated_pwm = (util::read_u16_le(data, 12..14) as f64 / 1000.0).clamp(0.0, 1.0);

        if self.effective_layout() == LayoutId::V11V2 && data.len() >= 18 {
            state.torque = util::read_i16_le(data, 14..16) as f64 / 100.0;
            state.motor_power = util::read_i16_le(data, 16..18) as f64;
        }

        if data.len() >= 23 {
            state.alert = build_alert_string(&data[16..23]);
        }

        state.timestamp = util::now_millis();
        Some(state)
    }
}

impl Decoder for InMotionV2Decoder {
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
        Some(WheelCommand::SendBytes(build_message(0x14, CMD_LIVE, &[])))
    }

    fn keepalive_interval_ms(&self) -> Option<u64> {
        Some(25)
    }

    fn init_commands(&self) -> Vec<WheelCommand> {
        vec![
            WheelCommand::SendBytes(build_message(0x14, CMD_MAIN_INFO, &[])),
            WheelCommand::SendBytes(build_message(0x14, CMD_VERSIONS, &[])),
        ]
    }

    fn build_command(&self, command: WheelCommand) -> Vec<WheelCommand> {
        match command {
            WheelCommand::SetLight(on) => vec![WheelCommand::SendBytes(build_message(
                0x14,
                CMD_CONTROL,
                &[0x50, if on { 0x01 } else { 0x00 }],
            ))],
            WheelCommand::SetLock(on) => vec![WheelCommand::SendBytes(build_message(
                0x14,
                CMD_CONTROL,
                &[0x31, if on { 0x01 } else { 0x00 }],
            ))],
            WheelCommand::Beep => vec![WheelCommand::SendBytes(build_message(
                0x14,
                CMD_CONTROL,
                &[0x51, 0x00, 0x01],
            ))],
            WheelCommand::SetMaxSpeed(kmh) => vec![WheelCommand::SendBytes(build_message(
                0x14,
                CMD_CONTROL,
                &[0x20, (kmh as i32).clamp(0, 255) as u8],
            ))],
            WheelCommand::SetSpeakerVolume(vol) => vec![WheelCommand::SendBytes(build_message(
                0x14,
                CMD_CONTROL,
                &[0x21, vol.min(100)],
            ))],
            WheelCommand::SetLightBrightness(level) => vec![WheelCommand::SendBytes(
                build_message(0x14, CMD_CONTROL, &[0x22, level.min(100)]),
            )],
            WheelCommand::PowerOff => vec![WheelCommand::SendBytes(build_message(
                0x14,
                CMD_CONTROL,
                &[0x10, 0x00],
            ))],
            WheelCommand::SendBytes(payload) => vec![WheelCommand::SendBytes(payload)],
            WheelCommand::SendDelayed { payload, delay_ms } => {
                vec![WheelCommand::SendDelayed { payload, delay_ms }]
            }
            _ => Vec::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    fn reset(&mut self) {
        self.framer.reset();
        self.model = None;
        self.layout_override = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_frame_buffered_until_model_identified() {
        let mut decoder = InMotionV2Decoder::new();
        let state = WheelState::initial();
        let live = build_message(0x14, CMD_LIVE, &[0u8; 16]);
        let out = decoder.decode(&live, &state).unwrap();
        assert!(out.is_none());
        assert!(!decoder.is_ready());
    }

    #[test]
    fn main_info_identifies_model_then_live_decodes() {
        let mut decoder = InMotionV2Decoder::new();
        let mut state = WheelState::initial();

        let main_info = build_message(0x14, CMD_MAIN_INFO, &[1, 1]);
        let out = decoder.decode(&main_info, &state).unwrap().unwrap();
        state = out.new_state;
        assert_eq!(state.model, "V11");
        assert!(decoder.is_ready());

        let mut data = vec![0u8; 16];
        data[0..2].copy_from_slice(&8400u16.to_le_bytes());
        let live = build_message(0x14, CMD_LIVE, &data);
        let out2 = decoder.decode(&live, &state).unwrap().unwrap();
        assert_eq!(out2.new_state.voltage, 8400);
        assert_eq!(out2.new_state.wheel_type, WheelType::InMotionV2);
    }

    #[test]
    fn alert_string_names_set_bits() {
        let mut bytes = [0u8; 7];
        bytes[0] = 0b0000_0001; // iPhaseSensor
        bytes[4] = 0b0000_0010; // overBoardTemp
        let alert = build_alert_string(&bytes);
        assert_eq!(alert, "iPhaseSensor overBoardTemp");
    }

    #[test]
    fn control_commands_wrap_build_message() {
        let decoder = InMotionV2Decoder::new();
        let a = decoder.build_command(WheelCommand::SetLight(true));
        let b = decoder.build_command(WheelCommand::SetLight(true));
        assert_eq!(a, b);
        assert!(matches!(&a[0], WheelCommand::SendBytes(bytes) if bytes[0] == 0xAA && bytes[1] == 0xAA));
    }
}
