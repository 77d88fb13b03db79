//! The alarm evaluation engine (spec §4.4): PWM/speed/current/temperature/
//! battery/wheel-reported alarms with per-type throttle windows, a PWM tone
//! curve, and pre-warnings.

use crate::error::AlarmConfigError;
use crate::state::WheelState;

/// Bitmask constants (spec §4.4).
pub const BIT_SPEED1: u32 = 0x01;
pub const BIT_CURRENT: u32 = 0x02;
pub const BIT_TEMPERATURE: u32 = 0x04;
pub const BIT_SPEED2: u32 = 0x08;
pub const BIT_SPEED3: u32 = 0x10;
pub const BIT_PWM: u32 = 0x20;
pub const BIT_BATTERY: u32 = 0x40;
pub const BIT_WHEEL: u32 = 0x80;

/// Which condition a [`TriggeredAlarm`] or pre-warning reports.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AlarmType {
    Speed1,
    Speed2,
    Speed3,
    Current,
    PhaseCurrent,
    Temperature,
    MotorTemperature,
    Pwm,
    Battery,
    Wheel,
}

impl AlarmType {
    fn bit(self) -> u32 {
        match self {
            AlarmType::Speed1 => BIT_SPEED1,
            AlarmType::Speed2 => BIT_SPEED2,
            AlarmType::Speed3 => BIT_SPEED3,
            AlarmType::Current | AlarmType::PhaseCurrent => BIT_CURRENT,
            AlarmType::Temperature | AlarmType::MotorTemperature => BIT_TEMPERATURE,
            AlarmType::Pwm => BIT_PWM,
            AlarmType::Battery => BIT_BATTERY,
            AlarmType::Wheel => BIT_WHEEL,
        }
    }

    /// Per-type cooldown window (spec §4.4: "Speed/PWM ≈ 500 ms, Current ≈
    /// 170 ms, others ≈ 500 ms").
    fn cooldown_ms(self) -> i64 {
        match self {
            AlarmType::Current | AlarmType::PhaseCurrent => 170,
            _ => 500,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TriggeredAlarm {
    pub alarm_type: AlarmType,
    pub value: f64,
    pub threshold: f64,
    pub tone_duration_ms: u32,
}

#[derive(Clone, Debug)]
pub struct PreWarning {
    pub alarm_type: AlarmType,
    pub value: f64,
}

#[derive(Clone, Debug, Default)]
pub struct AlarmEvaluation {
    pub triggered_alarms: Vec<TriggeredAlarm>,
    pub pre_warning: Option<PreWarning>,
    pub alarm_bitmask: u32,
}

/// The 18 configuration fields from spec §4.4's exhaustive table.
#[derive(Clone, Copy, Debug)]
pub struct AlarmConfig {
    pub pwm_based_alarms: bool,
    pub alarm_factor1: f64,
    pub alarm_factor2: f64,
    pub warning_pwm: f64,
    pub warning_speed: f64,
    pub warning_speed_period_s: f64,
    pub alarm1_speed: f64,
    pub alarm1_battery: f64,
    pub alarm2_speed: f64,
    pub alarm2_battery: f64,
    pub alarm3_speed: f64,
    pub alarm3_battery: f64,
    pub alarm_current: f64,
    pub alarm_phase_current: f64,
    pub alarm_temperature: f64,
    pub alarm_motor_temperature: f64,
    pub alarm_battery: f64,
    pub alarm_wheel: bool,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            pwm_based_alarms: false,
            alarm_factor1: 80.0,
            alarm_factor2: 95.0,
            warning_pwm: 70.0,
            warning_speed: 25.0,
            warning_speed_period_s: 10.0,
            alarm1_speed: 0.0,
            alarm1_battery: 100.0,
            alarm2_speed: 0.0,
            alarm2_battery: 100.0,
            alarm3_speed: 0.0,
            alarm3_battery: 100.0,
            alarm_current: 0.0,
            alarm_phase_current: 0.0,
            alarm_temperature: 0.0,
            alarm_motor_temperature: 0.0,
            alarm_battery: 0.0,
            alarm_wheel: false,
        }
    }
}

impl AlarmConfig {
    /// Per spec §7: `AlarmConfigInvalid` is recovered by treating the
    /// config as disabled, never by rejecting it outright.
    pub fn validate(&self) -> Result<(), AlarmConfigError> {
        if self.pwm_based_alarms && self.alarm_factor2 <= self.alarm_factor1 {
            return Err(AlarmConfigError::Invalid);
        }
        Ok(())
    }
}

/// The PWM tone-duration curve (spec §4.4 / §8 property 8):
/// `t = clamp((pwm*100 - factor1) / max(factor2 - factor1, 1), 0, 1)`,
/// `tone_duration_ms = round(20 + 180*t)`, always in `[20, 200]`.
pub fn pwm_tone_duration_ms(pwm_percent: f64, factor1: f64, factor2: f64) -> u32 {
    let t = ((pwm_percent - factor1) / (factor2 - factor1).max(1.0)).clamp(0.0, 1.0);
    (20.0 + 180.0 * t).round() as u32
}

#[derive(Clone, Debug, Default)]
pub struct AlarmChecker {
    config: AlarmConfig,
    last_trigger_ms: std::collections::HashMap<u8, i64>,
    last_pre_warning_ms: std::collections::HashMap<u8, i64>,
}

impl AlarmChecker {
    pub fn new(config: AlarmConfig) -> Self {
        let config = if config.validate().is_ok() {
            config
        } else {
            AlarmConfig {
                pwm_based_alarms: false,
                ..config
            }
        };
        Self {
            config,
            last_trigger_ms: std::collections::HashMap::new(),
            last_pre_warning_ms: std::collections::HashMap::new(),
        }
    }

    fn key(alarm_type: AlarmType) -> u8 {
        alarm_type.bit() as u8
    }

    fn throttled(&self, alarm_type: AlarmType, now_ms: i64) -> bool {
        match self.last_trigger_ms.get(&Self::key(alarm_type)) {
            Some(&last) => now_ms - last < alarm_type.cooldown_ms(),
            None => false,
        }
    }

    fn record_trigger(&mut self, alarm_type: AlarmType, now_ms: i64) {
        self.last_trigger_ms.insert(Self::key(alarm_type), now_ms);
    }

    /// Evaluates `state` against the configured thresholds at `now_ms`
    /// (monotonic milliseconds), applying per-type throttling.
    pub fn evaluate(&mut self, state: &WheelState, now_ms: i64) -> AlarmEvaluation {
        let mut eval = AlarmEvaluation::default();
        let speed_kmh = state.speed_kmh();
        let pwm_percent = state.calculated_pwm * 100.0;

        if self.config.pwm_based_alarms {
            if pwm_percent >= self.config.alarm_factor1 && !self.throttled(AlarmType::Pwm, now_ms) {
                let tone = pwm_tone_duration_ms(pwm_percent, self.config.alarm_factor1, self.config.alarm_factor2);
                eval.triggered_alarms.push(TriggeredAlarm {
                    alarm_type: AlarmType::Pwm,
                    value: pwm_percent,
                    threshold: self.config.alarm_factor1,
                    tone_duration_ms: tone,
                });
                self.record_trigger(AlarmType::Pwm, now_ms);
            }
        } else {
            // Old-style speed/battery tiers: highest-qualifying tier wins.
            let tiers = [
                (AlarmType::Speed3, self.config.alarm3_speed, self.config.alarm3_battery),
                (AlarmType::Speed2, self.config.alarm2_speed, self.config.alarm2_battery),
                (AlarmType::Speed1, self.config.alarm1_speed, self.config.alarm1_battery),
            ];
            for (alarm_type, tier_speed, tier_battery) in tiers {
                if tier_speed > 0.0
                    && speed_kmh >= tier_speed
                    && state.battery_level as f64 <= tier_battery
                {
                    if !self.throttled(alarm_type, now_ms) {
                        eval.triggered_alarms.push(TriggeredAlarm {
                            alarm_type,
                            value: speed_kmh,
                            threshold: tier_speed,
                            tone_duration_ms: 200,
                        });
                        self.record_trigger(alarm_type, now_ms);
                    }
                    break;
                }
            }
        }

        if self.config.alarm_current > 0.0 && state.current_a().abs() >= self.config.alarm_current {
            if !self.throttled(AlarmType::Current, now_ms) {
                eval.triggered_alarms.push(TriggeredAlarm {
                    alarm_type: AlarmType::Current,
                    value: state.current_a(),
                    threshold: self.config.alarm_current,
                    tone_duration_ms: 200,
                });
                self.record_trigger(AlarmType::Current, now_ms);
            }
        }

        if self.config.alarm_phase_current > 0.0
            && (state.phase_current as f64 / 100.0).abs() >= self.config.alarm_phase_current
            && !self.throttled(AlarmType::PhaseCurrent, now_ms)
        {
            eval.triggered_alarms.push(TriggeredAlarm {
                alarm_type: AlarmType::PhaseCurrent,
                value: state.phase_current as f64 / 100.0,
                threshold: self.config.alarm_phase_current,
                tone_duration_ms: 200,
            });
            self.record_trigger(AlarmType::PhaseCurrent, now_ms);
        }

        if self.config.alarm_temperature > 0.0
            && state.temperature_c() >= self.config.alarm_temperature
            && !self.throttled(AlarmType::Temperature, now_ms)
        {
            eval.triggered_alarms.push(TriggeredAlarm {
                alarm_type: AlarmType::Temperature,
                value: state.temperature_c(),
                threshold: self.config.alarm_temperature,
                tone_duration_ms: 200,
            });
            self.record_trigger(AlarmType::Temperature, now_ms);
        }

        if self.config.alarm_motor_temperature > 0.0
            && (state.temperature2 as f64 / 100.0) >= self.config.alarm_motor_temperature
            && !self.throttled(AlarmType::MotorTemperature, now_ms)
        {
            eval.triggered_alarms.push(TriggeredAlarm {
                alarm_type: AlarmType::MotorTemperature,
                value: state.temperature2 as f64 / 100.0,
                threshold: self.config.alarm_motor_temperature,
                tone_duration_ms: 200,
            });
            self.record_trigger(AlarmType::MotorTemperature, now_ms);
        }

        if self.config.alarm_battery > 0.0
            && (state.battery_level as f64) < self.config.alarm_battery
            && !self.throttled(AlarmType::Battery, now_ms)
        {
            eval.triggered_alarms.push(TriggeredAlarm {
                alarm_type: AlarmType::Battery,
                value: state.battery_level as f64,
                threshold: self.config.alarm_battery,
                tone_duration_ms: 200,
            });
            self.record_trigger(AlarmType::Battery, now_ms);
        }

        if self.config.alarm_wheel && state.wheel_alarm && !self.throttled(AlarmType::Wheel, now_ms) {
            eval.triggered_alarms.push(TriggeredAlarm {
                alarm_type: AlarmType::Wheel,
                value: 1.0,
                threshold: 1.0,
                tone_duration_ms: 200,
            });
            self.record_trigger(AlarmType::Wheel, now_ms);
        }

        eval.pre_warning = self.evaluate_pre_warning(pwm_percent, speed_kmh, now_ms, &eval.triggered_alarms);

        for alarm in &eval.triggered_alarms {
            eval.alarm_bitmask |= alarm.alarm_type.bit();
        }

        eval
    }

    fn evaluate_pre_warning(
        &mut self,
        pwm_percent: f64,
        speed_kmh: f64,
        now_ms: i64,
        triggered: &[TriggeredAlarm],
    ) -> Option<PreWarning> {
        let already_alarming = !triggered.is_empty();
        let period_ms = (self.config.warning_speed_period_s * 1000.0) as i64;

        let due = |last: &mut std::collections::HashMap<u8, i64>, key: u8| {
            let due = last.get(&key).map(|&t| now_ms - t >= period_ms).unwrap_or(true);
            if due {
                last.insert(key, now_ms);
            }
            due
        };

        if !already_alarming && self.config.warning_pwm > 0.0 && pwm_percent >= self.config.warning_pwm {
            if due(&mut self.last_pre_warning_ms, BIT_PWM as u8) {
                return Some(PreWarning {
                    alarm_type: AlarmType::Pwm,
                    value: pwm_percent,
                });
            }
        }
        if self.config.warning_speed > 0.0 && speed_kmh >= self.config.warning_speed {
            if due(&mut self.last_pre_warning_ms, BIT_SPEED1 as u8) {
                return Some(PreWarning {
                    alarm_type: AlarmType::Speed1,
                    value: speed_kmh,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_pwm_curve_endpoints() {
        assert_eq!(pwm_tone_duration_ms(80.0, 80.0, 95.0), 20);
        assert_eq!(pwm_tone_duration_ms(95.0, 80.0, 95.0), 200);
        assert!((pwm_tone_duration_ms(87.5, 80.0, 95.0) as i32 - 110).abs() <= 1);
    }

    #[test]
    fn pwm_curve_is_monotone() {
        let mut last = 0u32;
        let mut pwm = 80.0;
        while pwm <= 95.0 {
            let tone = pwm_tone_duration_ms(pwm, 80.0, 95.0);
            assert!(tone >= last);
            assert!((20..=200).contains(&tone));
            last = tone;
            pwm += 0.5;
        }
    }

    #[test]
    fn property7_throttle_suppresses_repeat_within_cooldown() {
        let config = AlarmConfig {
            alarm_current: 10.0,
            ..Default::default()
        };
        let mut checker = AlarmChecker::new(config);
        let mut state = WheelState::initial();
        state.current = 1500; // 15.0 A

        let first = checker.evaluate(&state, 0);
        assert_eq!(first.triggered_alarms.len(), 1);

        let second = checker.evaluate(&state, 50);
        assert!(second.triggered_alarms.is_empty());

        let third = checker.evaluate(&state, 200);
        assert_eq!(third.triggered_alarms.len(), 1);
    }

    #[test]
    fn old_style_tiers_pick_highest_qualifying() {
        let config = AlarmConfig {
            alarm1_speed: 10.0,
            alarm1_battery: 100.0,
            alarm2_speed: 20.0,
            alarm2_battery: 100.0,
            alarm3_speed: 30.0,
            alarm3_battery: 100.0,
            ..Default::default()
        };
        let mut checker = AlarmChecker::new(config);
        let mut state = WheelState::initial();
        state.speed = 3500; // 35.0 km/h
        state.battery_level = 50;

        let eval = checker.evaluate(&state, 0);
        assert_eq!(eval.triggered_alarms.len(), 1);
        assert_eq!(eval.triggered_alarms[0].alarm_type, AlarmType::Speed3);
        assert_eq!(eval.alarm_bitmask, BIT_SPEED3);
    }

    #[test]
    fn invalid_config_is_treated_as_disabled() {
        let config = AlarmConfig {
            pwm_based_alarms: true,
            alarm_factor1: 90.0,
            alarm_factor2: 80.0, // factor2 <= factor1: invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let checker = AlarmChecker::new(config);
        assert!(!checker.config.pwm_based_alarms);
    }
}
