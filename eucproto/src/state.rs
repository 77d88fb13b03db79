//! The decoder output type: an immutable telemetry snapshot.

use crate::bms::BmsSnapshot;

/// Identifies which vendor protocol produced a [`WheelState`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum WheelType {
    #[default]
    Unknown,
    Kingsong,
    Gotway,
    Veteran,
    Ninebot,
    NinebotZ,
    InMotion,
    InMotionV2,
    /// The placeholder type an [`crate::decoder::autodetect::AutoDetectDecoder`]
    /// reports before it has sniffed enough bytes to lock onto Gotway or
    /// Veteran.
    GotwayVirtual,
}

/// An immutable telemetry snapshot.
///
/// Every field uses a fixed-point integer representation with an implicit
/// scale factor (see the field table in `spec.md` §3.1); consumers convert to
/// display units themselves. A fresh [`WheelState`] is always produced by
/// cloning the prior snapshot and overwriting only the fields a given frame
/// supplies — no decoder mutates a snapshot in place.
///
/// Unknown integer settings are encoded as `-1`; unknown booleans default to
/// `false`.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WheelState {
    /// 1/100 km/h.
    pub speed: i32,
    /// 1/100 V.
    pub voltage: i32,
    /// 1/100 A, signed: positive draw, negative regen.
    pub current: i32,
    /// 1/100 A (Gotway/Veteran).
    pub phase_current: i32,
    /// 1/100 W, often recomputed as V·I.
    pub power: i32,
    /// 1/100 °C, board temperature.
    pub temperature: i32,
    /// 1/100 °C, motor temperature.
    pub temperature2: i32,
    /// Percent, 0-100.
    pub battery_level: i32,
    /// Meters, lifetime.
    pub total_distance: i64,
    /// Meters, current trip.
    pub wheel_distance: i64,
    /// 1/100 of ratio, 0..100.
    pub output: i32,
    /// 0.0..1.0 motor-load ratio.
    pub calculated_pwm: f64,
    /// Degrees.
    pub angle: f64,
    /// Degrees.
    pub roll: f64,
    /// Nm (InMotion V2).
    pub torque: f64,
    /// W (InMotion V2).
    pub motor_power: f64,
    /// °C.
    pub cpu_temp: i32,
    /// °C.
    pub imu_temp: i32,
    /// km/h, wheel-reported dynamic limit.
    pub speed_limit: f64,
    /// A, wheel-reported dynamic limit.
    pub current_limit: f64,
    /// Vendor-set alarm flag.
    pub wheel_alarm: bool,
    pub wheel_type: WheelType,
    pub name: String,
    pub model: String,
    pub mode_str: String,
    pub version: String,
    pub serial_number: String,
    pub bt_name: String,
    pub bms1: Option<BmsSnapshot>,
    pub bms2: Option<BmsSnapshot>,
    pub in_miles: bool,
    /// -1 = unknown.
    pub pedals_mode: i32,
    /// -1 = unknown.
    pub light_mode: i32,
    /// -1 = unknown.
    pub led_mode: i32,
    /// -1 = unknown.
    pub roll_angle: i32,
    /// -1 = unknown.
    pub speed_alarms: i32,
    /// -1 = unknown.
    pub tilt_back_speed: i32,
    /// -1 = unknown.
    pub cutout_angle: i32,
    /// km/h (InMotion V2).
    pub max_speed: f64,
    /// Degrees (InMotion V2).
    pub pedal_tilt: f64,
    /// -1 = unknown (InMotion V2).
    pub pedal_sensitivity: i32,
    pub ride_mode: bool,
    pub fancier_mode: bool,
    /// 0..100 (InMotion V2).
    pub speaker_volume: i32,
    pub mute: bool,
    pub handle_button: bool,
    pub drl: bool,
    /// 0..100 (InMotion V2).
    pub light_brightness: i32,
    pub transport_mode: bool,
    pub go_home_mode: bool,
    pub fan_quiet: bool,
    pub error: String,
    pub alert: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Default for WheelState {
    fn default() -> Self {
        Self {
            speed: 0,
            voltage: 0,
            current: 0,
            phase_current: 0,
            power: 0,
            temperature: 0,
            temperature2: 0,
            battery_level: 0,
            total_distance: 0,
            wheel_distance: 0,
            output: 0,
            calculated_pwm: 0.0,
            angle: 0.0,
            roll: 0.0,
            torque: 0.0,
            motor_power: 0.0,
            cpu_temp: 0,
            imu_temp: 0,
            speed_limit: 0.0,
            current_limit: 0.0,
            wheel_alarm: false,
            wheel_type: WheelType::Unknown,
            name: String::new(),
            model: String::new(),
            mode_str: String::new(),
            version: String::new(),
            serial_number: String::new(),
            bt_name: String::new(),
            bms1: None,
            bms2: None,
            in_miles: false,
            pedals_mode: -1,
            light_mode: -1,
            led_mode: -1,
            roll_angle: -1,
            speed_alarms: -1,
            tilt_back_speed: -1,
            cutout_angle: -1,
            max_speed: 0.0,
            pedal_tilt: 0.0,
            pedal_sensitivity: -1,
            ride_mode: false,
            fancier_mode: false,
            speaker_volume: -1,
            mute: false,
            handle_button: false,
            drl: false,
            light_brightness: -1,
            transport_mode: false,
            go_home_mode: false,
            fan_quiet: false,
            error: String::new(),
            alert: String::new(),
            timestamp: 0,
        }
    }
}

impl WheelState {
    /// The all-unknown snapshot a fresh decoder's first successful decode
    /// builds on top of.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Speed in km/h, converted from the 1/100 km/h fixed-point field.
    pub fn speed_kmh(&self) -> f64 {
        self.speed as f64 / 100.0
    }

    /// Speed in mph, using the spec's km-to-miles constant.
    pub fn speed_mph(&self) -> f64 {
        self.speed_kmh() * crate::util::KM_TO_MILES
    }

    /// Voltage in volts.
    pub fn voltage_v(&self) -> f64 {
        self.voltage as f64 / 100.0
    }

    /// Current in amps.
    pub fn current_a(&self) -> f64 {
        self.current as f64 / 100.0
    }

    /// Power in watts.
    pub fn power_w(&self) -> f64 {
        self.power as f64 / 100.0
    }

    /// Board temperature in °C.
    pub fn temperature_c(&self) -> f64 {
        self.temperature as f64 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_all_unknown() {
        let s = WheelState::initial();
        assert_eq!(s.wheel_type, WheelType::Unknown);
        assert_eq!(s.pedals_mode, -1);
        assert!(!s.ride_mode);
        assert_eq!(s.name, "");
    }

    #[test]
    fn unit_conversions() {
        let mut s = WheelState::initial();
        s.speed = 1550;
        assert!((s.speed_kmh() - 15.5).abs() < 1e-9);
        assert!((s.speed_mph() - 15.5 * crate::util::KM_TO_MILES).abs() < 1e-9);
    }
}
