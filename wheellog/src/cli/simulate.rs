use std::io::{BufWriter, Write};

use anyhow::Result;
use clap::Args;
use eucproto::decoder::kingsong::KingsongDecoder;
use eucproto::decoder::Decoder;
use eucproto::state::WheelState;
use owo_colors::OwoColorize;
use serde_json::json;

use super::Cli;

/// Replay a small built-in Kingsong frame sequence and print each resulting
/// telemetry snapshot, useful for a quick end-to-end smoke check without a
/// real wheel connected.
#[derive(Args)]
pub struct SimulateCommand {}

const DEMO_LIVE_FRAME: [u8; 20] = [
    0xAA, 0x55, 0x16, 0x04, 0x32, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xA9, 0x14, 0x5A, 0x5A,
];

impl SimulateCommand {
    pub async fn execute(&self, root: &Cli) -> Result<()> {
        let mut stdout = BufWriter::new(anstream::stdout());
        let mut decoder = KingsongDecoder::new();
        let mut state = WheelState::initial();

        writeln!(stdout, "{}", "Replaying a Kingsong live-data frame...".bright_black())?;

        if let Ok(Some(decoded)) = decoder.decode(&DEMO_LIVE_FRAME, &state) {
            state = decoded.new_state;
        }

        if root.json {
            writeln!(stdout, "{}", json!(state))?;
        } else {
            writeln!(stdout, "speed: {:.2} km/h", state.speed_kmh())?;
            writeln!(stdout, "voltage: {:.2} V", state.voltage_v())?;
            writeln!(stdout, "current: {:.2} A", state.current_a())?;
        }

        stdout.flush()?;
        Ok(())
    }
}
