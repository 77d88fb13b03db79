//! The common decoder contract (spec §4.2) and the seven vendor
//! implementations.
//!
//! A [`Decoder`] is the only component permitted to mutate a wheel's
//! accumulated protocol state (framer position, BMS assembler, detected
//! model); everything it produces for the outside world is an immutable
//! [`crate::state::WheelState`] wrapped in [`DecodedData`].

pub mod autodetect;
pub mod gotway;
pub mod inmotion_v1;
pub mod inmotion_v2;
pub mod kingsong;
pub mod ninebot;
pub mod ninebot_z;
pub mod veteran;

use crate::command::WheelCommand;
use crate::error::DecodeError;
use crate::state::{WheelState, WheelType};

/// Builds the decoder appropriate for an already-classified wheel type.
/// Returns `None` for [`WheelType::Unknown`], which has no associated
/// decoder. [`WheelType::GotwayVirtual`] maps to [`autodetect::AutoDetectDecoder`].
pub fn for_wheel_type(wheel_type: WheelType) -> Option<Box<dyn Decoder>> {
    match wheel_type {
        WheelType::Kingsong => Some(Box::new(kingsong::KingsongDecoder::new())),
        WheelType::Gotway => Some(Box::new(gotway::GotwayDecoder::new())),
        WheelType::Veteran => Some(Box::new(veteran::VeteranDecoder::new())),
        WheelType::Ninebot => Some(Box::new(ninebot::NinebotDecoder::new())),
        WheelType::NinebotZ => Some(Box::new(ninebot_z::NinebotZDecoder::new())),
        WheelType::InMotion => Some(Box::new(inmotion_v1::InMotionV1Decoder::new())),
        WheelType::InMotionV2 => Some(Box::new(inmotion_v2::InMotionV2Decoder::new())),
        WheelType::GotwayVirtual => Some(Box::new(autodetect::AutoDetectDecoder::new())),
        WheelType::Unknown => None,
    }
}

/// The result of a single `decode` call that produced a new snapshot.
#[derive(Clone, Debug, Default)]
pub struct DecodedData {
    pub new_state: WheelState,
    pub commands_to_send: Vec<WheelCommand>,
    pub has_new_data: bool,
    /// A human-readable note about what happened (e.g. "model identified"),
    /// surfaced to logging/UI layers; not a protocol error.
    pub news: Option<String>,
}

impl DecodedData {
    pub fn from_state(new_state: WheelState) -> Self {
        Self {
            new_state,
            commands_to_send: Vec::new(),
            has_new_data: true,
            news: None,
        }
    }
}

/// Common contract every vendor decoder implements (spec §4.2).
///
/// `decode` never panics on malformed input; a checksum failure or an
/// incomplete frame simply yields `Ok(None)` ("no newly completed frame
/// produced a state change").
pub trait Decoder: Send {
    /// Feeds raw transport bytes through this decoder's framer and, for
    /// every frame that completes, decodes it against `prior_state`.
    /// Returns the result of the last frame decoded in this call, if any.
    fn decode(
        &mut self,
        chunk: &[u8],
        prior_state: &WheelState,
    ) -> Result<Option<DecodedData>, DecodeError>;

    /// Commands sent once immediately after service discovery completes.
    fn init_commands(&self) -> Vec<WheelCommand> {
        Vec::new()
    }

    /// The periodic poll some vendor firmwares require to keep notifications
    /// flowing. `None` when no keepalive is required (Kingsong, Gotway).
    fn keepalive_command(&self) -> Option<WheelCommand> {
        None
    }

    /// Milliseconds between [`Decoder::keepalive_command`] writes.
    fn keepalive_interval_ms(&self) -> Option<u64> {
        None
    }

    /// Encodes a high-level [`WheelCommand`] into the raw byte sequence a
    /// transport actually writes. Idempotent: the same `command` against the
    /// same decoder state always yields a byte-equal sequence (spec §8
    /// property 6).
    fn build_command(&self, command: WheelCommand) -> Vec<WheelCommand>;

    /// `true` once enough frames have arrived to identify the wheel model
    /// (always `true` except for InMotion V2 before its `MainInfo` frame).
    fn is_ready(&self) -> bool {
        true
    }

    /// Returns the decoder to its initial state for a fresh connection.
    fn reset(&mut self);
}
