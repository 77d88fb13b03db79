//! [`WheelCommand`]: the tagged-variant output of a decoder's command
//! builder, mirroring the teacher's `HidppMessage`/`Message` enums rather
//! than a callable.

/// A single outbound action a [`crate::connection::WheelConnectionManager`]
/// can replay onto a [`crate::connection::Transport`].
///
/// A decoder's `build_command` returns an ordered `Vec<WheelCommand>`; the
/// connection manager walks it, honoring `SendDelayed`'s delay before the
/// next write (spec §3.3, §5).
#[derive(Clone, PartialEq, Debug)]
pub enum WheelCommand {
    /// Write `payload` to the transport immediately.
    SendBytes(Vec<u8>),

    /// Wait `delay_ms` milliseconds, then write `payload`.
    SendDelayed { payload: Vec<u8>, delay_ms: u32 },

    // -- High-level semantic commands consumed by `build_command` --
    Beep,
    SetLight(bool),
    SetLightMode(i32),
    SetLedMode(i32),
    SetPedalsMode(i32),
    SetMaxSpeed(f64),
    SetSpeakerVolume(u8),
    SetPedalTilt(f64),
    SetPedalSensitivity(u8),
    Calibrate,
    PowerOff,
    SetLock(bool),
    ResetTrip,
    SetKingsongAlarms {
        alarm1_speed: i32,
        alarm2_speed: i32,
        alarm3_speed: i32,
        max_speed: i32,
    },
    RequestAlarmSettings,
    RequestBmsData { pack: u8, index: u8 },
    SetMilesMode(bool),
    SetAlarmMode(i32),
    SetRollAngleMode(i32),
    SetRideMode(bool),
    SetDrl(bool),
    SetHandleButton(bool),
    SetMute(bool),
    SetTransportMode(bool),
    SetGoHomeMode(bool),
    SetFancierMode(bool),
    SetFan(bool),
    SetFanQuiet(bool),
    SetLightBrightness(u8),
}

impl WheelCommand {
    /// `true` for the two raw-byte variants a connection manager writes
    /// directly to the transport; semantic variants must first be run
    /// through a decoder's `build_command`.
    pub fn is_raw(&self) -> bool {
        matches!(self, WheelCommand::SendBytes(_) | WheelCommand::SendDelayed { .. })
    }
}
