use std::io::{self, BufWriter, Read, Write};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use eucproto::decoder::{self, Decoder};
use eucproto::state::{WheelState, WheelType};
use owo_colors::OwoColorize;
use serde_json::json;

use super::Cli;

#[derive(Clone, Copy, ValueEnum)]
pub enum Vendor {
    Kingsong,
    Gotway,
    Veteran,
    Ninebot,
    NinebotZ,
    Inmotion,
    InmotionV2,
    Auto,
}

impl From<Vendor> for WheelType {
    fn from(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Kingsong => WheelType::Kingsong,
            Vendor::Gotway => WheelType::Gotway,
            Vendor::Veteran => WheelType::Veteran,
            Vendor::Ninebot => WheelType::Ninebot,
            Vendor::NinebotZ => WheelType::NinebotZ,
            Vendor::Inmotion => WheelType::InMotion,
            Vendor::InmotionV2 => WheelType::InMotionV2,
            Vendor::Auto => WheelType::GotwayVirtual,
        }
    }
}

/// Decode a hex-encoded byte stream from one vendor's wire format and print
/// the resulting telemetry snapshots.
#[derive(Args)]
pub struct DecodeCommand {
    /// Which vendor protocol to decode the bytes as.
    #[arg(short, long, value_enum)]
    vendor: Vendor,

    /// Hex-encoded bytes (whitespace-separated pairs are accepted). Reads
    /// from stdin when omitted.
    #[arg(short = 'x', long)]
    hex: Option<String>,
}

impl DecodeCommand {
    pub async fn execute(&self, root: &Cli) -> Result<()> {
        let raw = match &self.hex {
            Some(hex) => hex.clone(),
            None => {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf).context("reading hex from stdin")?;
                buf
            }
        };
        let bytes = parse_hex(&raw)?;

        let mut decoder = decoder::for_wheel_type(self.vendor.into())
            .ok_or_else(|| anyhow::anyhow!("no decoder for selected vendor"))?;

        let mut stdout = BufWriter::new(anstream::stdout());
        let mut state = WheelState::initial();
        let mut any = false;

        match decoder.decode(&bytes, &state) {
            Ok(Some(decoded)) => {
                any = true;
                state = decoded.new_state;
                print_state(&mut stdout, &state, root.json)?;
            }
            Ok(None) => {}
            Err(e) => bail!("decode error: {e}"),
        }

        if !any {
            writeln!(stdout, "{}", "No complete frame was decoded from the given bytes.".bright_black())?;
        }

        stdout.flush()?;
        Ok(())
    }
}

fn print_state(out: &mut impl Write, state: &WheelState, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", json!(state))?;
        return Ok(());
    }

    writeln!(
        out,
        "{} {} {}",
        format!("{:?}", state.wheel_type).green(),
        state.name.bright_black(),
        state.model.bright_black()
    )?;
    writeln!(out, "  speed:    {} km/h", format!("{:.2}", state.speed_kmh()).blue())?;
    writeln!(out, "  voltage:  {} V", format!("{:.2}", state.voltage_v()).blue())?;
    writeln!(out, "  current:  {} A", format!("{:.2}", state.current_a()).blue())?;
    writeln!(out, "  power:    {} W", format!("{:.2}", state.power_w()).blue())?;
    writeln!(out, "  battery:  {}%", state.battery_level.to_string().blue())?;
    writeln!(out, "  temp:     {} C", format!("{:.1}", state.temperature_c()).blue())?;
    if !state.alert.is_empty() {
        writeln!(out, "  alert:    {}", state.alert.red())?;
    }
    Ok(())
}

fn parse_hex(raw: &str) -> Result<Vec<u8>> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).context("input is not valid hex")
}
