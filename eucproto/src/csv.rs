//! CSV export row builder (spec §6.4). Persistence of the resulting rows to
//! a file is an external collaborator's responsibility; this only builds
//! the row itself from a telemetry snapshot.

use crate::state::WheelState;

/// An optional GPS fix to append to a [`CsvRow`].
#[derive(Clone, Copy, Debug)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub speed_kmh: f64,
    pub altitude_m: f64,
    pub heading_deg: f64,
    pub distance_m: f64,
}

/// Builds one CSV row for `state` at `date`/`time` (already formatted by the
/// caller, since locale/timezone policy is a UI concern), with fixed-point
/// two-decimal numeric columns per spec §6.4.
pub fn build_row(date: &str, time: &str, state: &WheelState, gps: Option<GpsFix>) -> String {
    let mut cols: Vec<String> = vec![date.to_string(), time.to_string()];

    if let Some(fix) = gps {
        cols.push(format!("{:.2}", fix.lat));
        cols.push(format!("{:.2}", fix.lon));
        cols.push(format!("{:.2}", fix.speed_kmh));
        cols.push(format!("{:.2}", fix.altitude_m));
        cols.push(format!("{:.2}", fix.heading_deg));
        cols.push(format!("{:.0}", fix.distance_m));
    }

    cols.push(format!("{:.2}", state.speed_kmh()));
    cols.push(format!("{:.2}", state.voltage_v()));
    cols.push(format!("{:.2}", state.phase_current as f64 / 100.0));
    cols.push(format!("{:.2}", state.current_a()));
    cols.push(format!("{:.2}", state.power_w()));
    cols.push(format!("{:.2}", state.torque));
    cols.push(format!("{:.2}", state.calculated_pwm * 100.0));
    cols.push(state.battery_level.to_string());
    cols.push(state.wheel_distance.to_string());
    cols.push(state.total_distance.to_string());
    cols.push(state.temperature_c().round().to_string());
    cols.push((state.temperature2 as f64 / 100.0).round().to_string());
    cols.push(format!("{:.2}", state.angle));
    cols.push(format!("{:.2}", state.roll));
    cols.push(state.mode_str.clone());
    cols.push(state.alert.clone());

    cols.join(",")
}

/// The column header row matching [`build_row`]'s column order.
pub fn header(with_gps: bool) -> String {
    let mut cols = vec!["date", "time"];
    if with_gps {
        cols.extend(["lat", "lon", "gps_speed", "gps_alt", "gps_heading", "gps_distance"]);
    }
    cols.extend([
        "speed",
        "voltage",
        "phase_current",
        "current",
        "power",
        "torque",
        "pwm",
        "battery_level",
        "distance",
        "totaldistance",
        "system_temp",
        "temp2",
        "tilt",
        "roll",
        "mode",
        "alert",
    ]);
    cols.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_without_gps_has_expected_column_count() {
        let state = WheelState::initial();
        let row = build_row("2026-01-01", "12:00:00", &state, None);
        assert_eq!(row.split(',').count(), header(false).split(',').count());
    }

    #[test]
    fn row_with_gps_includes_gps_columns() {
        let state = WheelState::initial();
        let gps = GpsFix {
            lat: 1.0,
            lon: 2.0,
            speed_kmh: 3.0,
            altitude_m: 4.0,
            heading_deg: 5.0,
            distance_m: 6.0,
        };
        let row = build_row("2026-01-01", "12:00:00", &state, Some(gps));
        assert_eq!(row.split(',').count(), header(true).split(',').count());
        assert!(row.contains(",6"));
    }

    #[test]
    fn pwm_column_is_percentage_not_ratio() {
        let mut state = WheelState::initial();
        state.calculated_pwm = 0.5;
        let row = build_row("d", "t", &state, None);
        let pwm_col = row.split(',').nth(8).unwrap();
        assert_eq!(pwm_col, "50.00");
    }
}
