//! InMotion V1 decoder (spec §4.2.4, §9 open question 4).
//!
//! V1 carries its own CAN-style framing rather than the Nordic-UART
//! envelope its V2 successor uses. The legacy parity-test corpus for V1 is
//! only partially documented, so this reproduces the CAN-identifier-keyed
//! live-data frame plus the handful of commands named in spec §6.1/§6.3 and
//! surfaces anything else as an explicit `SendBytes` byte literal rather than
//! inventing an opcode catalog.
//!
//! Outbound writes must go through 20-byte BLE chunks with a 20 ms
//! inter-chunk delay (spec §5); that chunking is a transport concern
//! ([`crate::connection::Transport::write_chunked`]), so `build_command`
//! here only produces the complete, unchunked CAN message.

use super::{DecodedData, Decoder};
use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::framing::Framer;
use crate::state::{WheelState, WheelType};
use crate::util::{self, xor_checksum, Field};

pub const HEADER: [u8; 2] = [0x5A, 0xA5];
const CAN_ID_LIVE: u16 = 0x0B00;
const CAN_ID_DISTANCE: u16 = 0x0B01;

const F_CAN_ID: Field = 0..2;
const F_VOLTAGE: Field = 0..2;
const F_SPEED: Field = 2..4;
const F_CURRENT: Field = 4..6;
const F_TEMPERATURE: Field = 6..8;

/// Length-delimited CAN-frame framer: `5A A5 | len | id[2] | data[len-2] | xor`.
#[derive(Debug, Default)]
struct CanFramer {
    buf: Vec<u8>,
}

impl CanFramer {
    fn resync(&mut self) {
        while self.buf.len() >= 2 && self.buf[0..2] != HEADER {
            self.buf.remove(0);
        }
    }
}

impl Framer for CanFramer {
    fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            self.resync();
            if self.buf.len() < 3 {
                break;
            }
            let len = self.buf[2] as usize;
            let total = 3 + len + 1;
            if self.buf.len() < total {
                break;
            }
            let candidate: Vec<u8> = self.buf.drain(..total).collect();
            let body = &candidate[3..total - 1];
            if xor_checksum(body) == candidate[total - 1] {
                frames.push(candidate[3..total - 1].to_vec());
            }
        }
        frames
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

#[derive(Debug, Default)]
pub struct InMotionV1Decoder {
    framer: CanFramer,
}

impl InMotionV1Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_frame(&self, body: &[u8], prior: &WheelState) -> Option<WheelState> {
        if body.len() < 2 {
            return None;
        }
        let can_id = util::read_u16_be(body, F_CAN_ID);
        let data = &body[2..];
        let mut state = prior.clone();
        state.wheel_type = WheelType::InMotion;

        match can_id {
            CAN_ID_LIVE if data.len() >= 8 => {
                state.voltage = util::read_u16_be(data, F_VOLTAGE) as i32;
                state.speed = util::read_i16_be(data, F_SPEED) as i32;
                state.current = util::read_i16_be(data, F_CURRENT) as i32;
                state.temperature = util::read_i16_be(data, F_TEMPERATURE) as i32;
                state.timestamp = util::now_millis();
                Some(state)
            }
            CAN_ID_DISTANCE if data.len() >= 4 => {
                state.wheel_distance = util::read_u32_be(data, 0..4) as i64;
                state.timestamp = util::now_millis();
                Some(state)
            }
            _ => None,
        }
    }
}

/// Wraps a CAN payload in the `5A A5 | len | body | xor` framing used on
/// the wire, for use by [`InMotionV1Decoder::build_command`].
fn build_can_message(can_id: u16, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + data.len());
    body.extend_from_slice(&can_id.to_be_bytes());
    body.extend_from_slice(data);
    let checksum = xor_checksum(&body);
    let mut frame = vec![HEADER[0], HEADER[1], body.len() as u8];
    frame.extend(body);
    frame.push(checksum);
    frame
}

impl Decoder for InMotionV1Decoder {
    fn decode(
        &mut self,
        chunk: &[u8],
        prior_state: &WheelState,
    ) -> Result<Option<DecodedData>, DecodeError> {
        let frames = self.framer.feed(chunk);
        let mut state = prior_state.clone();
        let mut last = None;
        for body in frames {
            if let Some(next) = self.decode_frame(&body, &state) {
                state = next;
                last = Some(state.clone());
            }
        }
        Ok(last.map(DecodedData::from_state))
    }

    fn build_command(&self, command: WheelCommand) -> Vec<WheelCommand> {
        match command {
            WheelCommand::PowerOff => {
                vec![WheelCommand::SendBytes(build_can_message(0x0B10, &[0x00]))]
            }
            WheelCommand::Calibrate => {
                vec![WheelCommand::SendBytes(build_can_message(0x0B11, &[]))]
            }
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

    #[test]
    fn decodes_live_can_frame() {
        let mut decoder = InMotionV1Decoder::new();
        let state = WheelState::initial();
        let mut data = vec![0u8; 8];
        data[0..2].copy_from_slice(&8000u16.to_be_bytes());
        let mut body = CAN_ID_LIVE.to_be_bytes().to_vec();
        body.extend(data);
        let wire = build_can_message(CAN_ID_LIVE, &body[2..]);
        let out = decoder.decode(&wire, &state).unwrap().unwrap();
        assert_eq!(out.new_state.wheel_type, WheelType::InMotion);
        assert_eq!(out.new_state.voltage, 8000);
    }

    #[test]
    fn drops_frame_with_bad_checksum() {
        let mut decoder = InMotionV1Decoder::new();
        let state = WheelState::initial();
        let mut wire = build_can_message(CAN_ID_LIVE, &[0u8; 8]);
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        assert!(decoder.decode(&wire, &state).unwrap().is_none());
    }
}
