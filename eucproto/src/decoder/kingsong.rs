//! Kingsong decoder (spec §4.2.1).
//!
//! Frame layout: `AA 55 | payload[14] | type | 0x14-or-page | trailer[2]`.
//! Numeric sub-frames carry their 14-byte payload word-swapped; the
//! name/model sub-frame is plain ASCII and is never swapped.

use super::{DecodedData, Decoder};
use crate::bms::SmartBms;
use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::framing::kingsong::{FRAME_LEN, KingsongFramer};
use crate::framing::Framer;
use crate::state::{WheelState, WheelType};
use crate::util::{self, Field};

const TYPE_LIVE: u8 = 0xA9;
const TYPE_DISTANCE_FAN_TIME: u8 = 0xB9;
const TYPE_SERIAL: u8 = 0xB3;
const TYPE_ALARMS_MAX_SPEED: u8 = 0xB5;
const TYPE_NAME_MODEL: u8 = 0xBB;
const TYPE_BMS_PACK1: u8 = 0xF1;
const TYPE_BMS_PACK2: u8 = 0xF2;
const TYPE_BMS_EXTENDED: u8 = 0xD0;

const F_VOLTAGE: Field = 0..2;
const F_SPEED: Field = 2..4;
const F_TOTAL_DISTANCE: Field = 4..8;
const F_CURRENT: Field = 8..10;
const F_TEMPERATURE: Field = 10..12;

/// Kingsong's `AA 55 … CC DD 5A 5A` outbound command frame (spec §6.3): 20
/// bytes, the sub-command id occupying the last four bytes before the
/// trailer.
fn command_frame(cc: u8, dd: u8) -> Vec<u8> {
    let mut f = vec![0xAAu8, 0x55];
    f.extend(std::iter::repeat(0u8).take(FRAME_LEN - 6));
    f.push(cc);
    f.push(dd);
    f.push(0x5A);
    f.push(0x5A);
    f
}

#[derive(Debug, Default)]
pub struct KingsongDecoder {
    framer: KingsongFramer,
    bms1: SmartBms,
    bms2: SmartBms,
}

impl KingsongDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_frame(&mut self, frame: &[u8], prior: &WheelState) -> Option<WheelState> {
        if frame.len() != FRAME_LEN {
            return None;
        }
        let frame_type = frame[16];

        match frame_type {
            TYPE_NAME_MODEL => Some(self.decode_name_model(frame, prior)),
            TYPE_LIVE => Some(self.decode_live(frame, prior)),
            TYPE_DISTANCE_FAN_TIME => Some(self.decode_distance_fan_time(frame, prior)),
            TYPE_SERIAL => Some(self.decode_serial(frame, prior)),
            TYPE_ALARMS_MAX_SPEED => Some(self.decode_alarms(frame, prior)),
            TYPE_BMS_PACK1 => Some(self.decode_bms(frame, prior, false)),
            TYPE_BMS_PACK2 => Some(self.decode_bms(frame, prior, true)),
            TYPE_BMS_EXTENDED => Some(self.decode_bms_extended(frame, prior)),
            _ => None,
        }
    }

    fn swapped_payload(frame: &[u8]) -> [u8; 14] {
        let mut payload = [0u8; 14];
        payload.copy_from_slice(&frame[2..16]);
        util::word_swap(&mut payload);
        payload
    }

    fn decode_name_model(&self, frame: &[u8], prior: &WheelState) -> WheelState {
        let raw = &frame[2..16];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let name = String::from_utf8_lossy(&raw[..end]).to_string();

        let mut state = prior.clone();
        state.wheel_type = WheelType::Kingsong;
        if let Some(dash) = name.rfind('-') {
            let suffix = &name[dash + 1..];
            if suffix.len() == 4 && suffix.chars().all(|c| c.is_ascii_digit()) {
                state.version = format!("{}.{}", &suffix[0..2], &suffix[2..4]);
                state.model = name[..dash].to_string();
            } else {
                state.model = name.clone();
            }
        } else {
            state.model = name.clone();
        }
        state.name = name;
        state.timestamp = util::now_millis();
        state
    }

    fn decode_live(&self, frame: &[u8], prior: &WheelState) -> WheelState {
        let p = Self::swapped_payload(frame);
        let mut state = prior.clone();
        state.wheel_type = WheelType::Kingsong;
        state.voltage = util::read_u16_be(&p, F_VOLTAGE) as i32;
        state.speed = util::read_u16_be(&p, F_SPEED) as i32;
        state.total_distance = util::read_u32_be(&p, F_TOTAL_DISTANCE) as i64;
        state.current = util::read_i16_be(&p, F_CURRENT) as i32;
        state.temperature = util::read_i16_be(&p, F_TEMPERATURE) as i32;
        state.battery_level = voltage_to_percent(state.voltage);
        state.timestamp = util::now_millis();
        state
    }

    fn decode_distance_fan_time(&self, frame: &[u8], prior: &WheelState) -> WheelState {
        let p = Self::swapped_payload(frame);
        let mut state = prior.clone();
        state.wheel_type = WheelType::Kingsong;
        state.wheel_distance = util::read_u32_be(&p, 0..4) as i64;
        // uptime seconds at p[4..8] is not carried by WheelState directly.
        state.temperature2 = util::read_i16_be(&p, 8..10) as i32;
        state.timestamp = util::now_millis();
        state
    }

    fn decode_serial(&self, frame: &[u8], prior: &WheelState) -> WheelState {
        let raw = &frame[2..16];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let mut state = prior.clone();
        state.wheel_type = WheelType::Kingsong;
        state.serial_number = String::from_utf8_lossy(&raw[..end]).to_string();
        state.timestamp = util::now_millis();
        state
    }

    fn decode_alarms(&self, frame: &[u8], prior: &WheelState) -> WheelState {
        let p = Self::swapped_payload(frame);
        let mut state = prior.clone();
        state.wheel_type = WheelType::Kingsong;
        state.speed_alarms = p[0] as i32;
        state.timestamp = util::now_millis();
        state
    }

    fn decode_bms(&mut self, frame: &[u8], prior: &WheelState, second_pack: bool) -> WheelState {
        let page = frame[17];
        let p = Self::swapped_payload(frame);
        let bms = if second_pack { &mut self.bms2 } else { &mut self.bms1 };

        match page {
            0 => {
                let inner = bms.inner_mut();
                inner.voltage = util::read_u16_be(&p, 0..2) as i32;
                inner.current = util::read_i16_be(&p, 2..4) as i32;
                inner.remaining_cap = util::read_u16_be(&p, 4..6) as i32;
                inner.factory_cap = util::read_u16_be(&p, 6..8) as i32;
                inner.full_cycles = util::read_u16_be(&p, 8..10) as i32;
            }
            1 => {
                let inner = bms.inner_mut();
                inner.mos_temp = util::read_i16_be(&p, 0..2) as i32;
                for i in 0..4 {
                    inner.temps[i] = util::read_i16_be(&p, (2 + i * 2)..(4 + i * 2)) as i32;
                }
            }
            2..=4 => {
                let cells_per_page = 7;
                let base = (page as usize - 2) * cells_per_page;
                let mut voltages = [0.0f64; 7];
                for i in 0..cells_per_page {
                    let raw = util::read_u16_be(&p, (i * 2)..(i * 2 + 2));
                    voltages[i] = raw as f64 / 1000.0;
                }
                bms.set_cells(base, &voltages);
            }
            5 => {}
            6 => {
                let inner = bms.inner_mut();
                inner.balance_map = util::read_u32_be(&p, 0..4) as u64;
                inner.mos_temp = util::read_i16_be(&p, 4..6) as i32;
                bms.recompute_statistics();
            }
            _ => {}
        }

        let mut state = prior.clone();
        state.wheel_type = WheelType::Kingsong;
        if second_pack {
            state.bms2 = Some(self.bms2.to_snapshot());
        } else {
            state.bms1 = Some(self.bms1.to_snapshot());
        }
        state.timestamp = util::now_millis();
        state
    }

    /// Extended BMS (F-series, 0xD0). Per spec §9 open question 2, cell
    /// count is not hard-coded per model: it derives from the page-0
    /// header's cell-count field once the assembler has recomputed
    /// statistics, rather than from a model lookup table. Reuses the
    /// pack-1 assembler and the page layout of [`Self::decode_bms`]; firmware
    /// reuses the same sub-page numbering for the extended frame.
    fn decode_bms_extended(&mut self, frame: &[u8], prior: &WheelState) -> WheelState {
        let page = frame[17];
        if page == 0 {
            let p = Self::swapped_payload(frame);
            let cell_num = p[1] as usize;
            let inner = self.bms1.inner_mut();
            inner.voltage = util::read_u16_be(&p, 2..4) as i32;
            inner.current = util::read_i16_be(&p, 4..6) as i32;
            inner.rem_perc = p[6] as i32;
            inner.factory_cap = util::read_u16_be(&p, 7..9) as i32;
            inner.full_cycles = util::read_u16_be(&p, 9..11) as i32;
            inner.cell_count = cell_num.min(crate::bms::MAX_CELLS);
        } else {
            self.decode_bms(frame, prior, false);
        }

        let mut state = prior.clone();
        state.wheel_type = WheelType::Kingsong;
        state.bms1 = Some(self.bms1.to_snapshot());
        state.timestamp = util::now_millis();
        state
    }
}

/// Linear voltage-to-percent estimate for a nominal 67.2V (16S) Kingsong
/// pack, clamped to 0..100. Spec §4.2.1 does not define an exact table (no
/// legacy source was retrievable for this core); callers needing bit-exact
/// parity with a specific firmware generation should override this.
fn voltage_to_percent(voltage_centivolts: i32) -> i32 {
    const MIN_MV: f64 = 5000.0;
    const MAX_MV: f64 = 6720.0;
    let v = voltage_centivolts as f64;
    let pct = (v - MIN_MV) / (MAX_MV - MIN_MV) * 100.0;
    pct.round().clamp(0.0, 100.0) as i32
}

impl Decoder for KingsongDecoder {
    fn decode(
        &mut self,
        chunk: &[u8],
        prior_state: &WheelState,
    ) -> Result<Option<DecodedData>, DecodeError> {
        let frames = self.framer.feed(chunk);
        let mut last = None;
        let mut state = prior_state.clone();
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
            WheelCommand::Beep => vec![WheelCommand::SendBytes(command_frame(0x88, 0x14))],
            WheelCommand::SetLight(on) => {
                vec![WheelCommand::SendBytes(command_frame(0x84, if on { 1 } else { 0 }))]
            }
            WheelCommand::SetLightMode(mode) => {
                vec![WheelCommand::SendBytes(command_frame(0x87, mode as u8))]
            }
            WheelCommand::SetLedMode(mode) => {
                vec![WheelCommand::SendBytes(command_frame(0x7C, mode as u8))]
            }
            WheelCommand::PowerOff => vec![WheelCommand::SendBytes(command_frame(0x81, 0x00))],
            WheelCommand::SetKingsongAlarms {
                alarm1_speed,
                alarm2_speed,
                alarm3_speed,
                max_speed,
            } => {
                let mut f = vec![0xAAu8, 0x55];
                f.extend(std::iter::repeat(0u8).take(FRAME_LEN - 10));
                f.push(alarm1_speed as u8);
                f.push(alarm2_speed as u8);
                f.push(alarm3_speed as u8);
                f.push(max_speed as u8);
                f.push(0x73);
                f.push(0x14);
                f.push(0x5A);
                f.push(0x5A);
                vec![WheelCommand::SendBytes(f)]
            }
            WheelCommand::RequestAlarmSettings => {
                vec![WheelCommand::SendBytes(command_frame(0x98, 0x00))]
            }
            WheelCommand::SendBytes(payload) => vec![WheelCommand::SendBytes(payload)],
            WheelCommand::SendDelayed { payload, delay_ms } => {
                vec![WheelCommand::SendDelayed { payload, delay_ms }]
            }
            // Kingsong hardware has no opcode for the remaining semantic
            // commands (they belong to other vendors' models).
            _ => Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.framer.reset();
        self.bms1 = SmartBms::new();
        self.bms2 = SmartBms::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn s1_kingsong_s18_identification() {
        let mut decoder = KingsongDecoder::new();
        let mut state = WheelState::initial();

        let name_frame = hex("aa554b532d5331382d30323035000000bb1484fd");
        let live_frame = hex("aa556919030200009f36d700140500e0a9145a5a");
        let dist_frame = hex("aa550000090017011502140100004006b9145a5a");

        let out1 = decoder.decode(&name_frame, &state).unwrap().unwrap();
        state = out1.new_state;
        assert_eq!(state.wheel_type, WheelType::Kingsong);
        assert_eq!(state.model, "KS-S18");
        assert_eq!(state.name, "KS-S18-0205");
        assert_eq!(state.version, "2.05");

        let out2 = decoder.decode(&live_frame, &state).unwrap().unwrap();
        state = out2.new_state;
        assert_eq!(state.voltage, 6505);
        assert_eq!(state.speed, 515);
        assert_eq!(state.temperature, 1300);

        let out3 = decoder.decode(&dist_frame, &state).unwrap().unwrap();
        state = out3.new_state;
        assert_eq!(state.wheel_distance, 9);
    }

    #[test]
    fn unknown_frame_type_yields_no_state_change() {
        let mut decoder = KingsongDecoder::new();
        let state = WheelState::initial();
        let mut garbage = vec![0xAAu8, 0x55];
        garbage.extend(std::iter::repeat(0u8).take(14));
        garbage.push(0x00); // unknown type byte
        garbage.extend([0x00, 0x00, 0x00]);
        let out = decoder.decode(&garbage, &state).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn build_command_is_idempotent() {
        let decoder = KingsongDecoder::new();
        let a = decoder.build_command(WheelCommand::Beep);
        let b = decoder.build_command(WheelCommand::Beep);
        assert_eq!(a, b);
    }
}
