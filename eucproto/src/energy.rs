//! The rolling energy calculator (spec §4.5): a 10-second window of
//! `(timestamp_ms, distance_m, power_w)` samples producing Wh and Wh/km.

use std::collections::VecDeque;

const WINDOW_MS: i64 = 10_000;
const CACHE_MS: i64 = 1_000;
const STALE_MS: i64 = 2_000;

#[derive(Clone, Copy, Debug)]
struct Sample {
    timestamp_ms: i64,
    distance_m: f64,
    power_w: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Cached {
    computed_at_ms: i64,
    power_hour: f64,
    wh_per_km: f64,
}

/// A per-connection rolling calculator. Not `Clone`/`Copy`: it owns mutable
/// sample history the way [`crate::bms::SmartBms`] owns assembler state.
#[derive(Debug, Default)]
pub struct EnergyCalculator {
    samples: VecDeque<Sample>,
    cache: Option<Cached>,
    last_push_ms: Option<i64>,
}

impl EnergyCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new sample and prunes anything older than `now - 10s`.
    pub fn push_sample(&mut self, power_w: f64, distance_m: f64, now_ms: i64) {
        self.samples.push_back(Sample {
            timestamp_ms: now_ms,
            distance_m,
            power_w,
        });
        self.prune(now_ms);
        self.last_push_ms = Some(now_ms);
    }

    fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms - WINDOW_MS;
        while let Some(front) = self.samples.front() {
            if front.timestamp_ms < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// `Wh` over the current window: `avg(power) * (t_last - t_first) /
    /// 3_600_000`. Zero if fewer than two samples or a non-positive span.
    pub fn power_hour(&mut self, now_ms: i64) -> f64 {
        self.recompute_if_needed(now_ms);
        self.cached_or_stale(now_ms).power_hour
    }

    /// `Wh/km`: `power_hour * 1000 / delta_distance_m`. Zero if distance
    /// didn't advance.
    pub fn wh_per_km(&mut self, now_ms: i64) -> f64 {
        self.recompute_if_needed(now_ms);
        self.cached_or_stale(now_ms).wh_per_km
    }

    fn cached_or_stale(&self, now_ms: i64) -> Cached {
        match self.cache {
            Some(c) => c,
            None => {
                let _ = now_ms;
                Cached::default()
            }
        }
    }

    fn recompute_if_needed(&mut self, now_ms: i64) {
        if let Some(cache) = self.cache {
            if now_ms - cache.computed_at_ms < CACHE_MS {
                return;
            }
        }
        // Data pushed more than 2s ago is considered stale for a *fresh*
        // read but the last cached value is still returned (spec §4.5).
        let stale = self
            .last_push_ms
            .map(|t| now_ms - t > STALE_MS)
            .unwrap_or(true);
        if stale && self.cache.is_some() {
            return;
        }

        self.prune(now_ms);
        let (power_hour, wh_per_km) = self.compute_now();
        self.cache = Some(Cached {
            computed_at_ms: now_ms,
            power_hour,
            wh_per_km,
        });
    }

    fn compute_now(&self) -> (f64, f64) {
        if self.samples.len() < 2 {
            return (0.0, 0.0);
        }
        let first = self.samples.front().unwrap();
        let last = self.samples.back().unwrap();
        let span_ms = last.timestamp_ms - first.timestamp_ms;
        if span_ms <= 0 {
            return (0.0, 0.0);
        }

        let avg_power = self.samples.iter().map(|s| s.power_w).sum::<f64>() / self.samples.len() as f64;
        let power_hour = avg_power * span_ms as f64 / 3_600_000.0;

        let delta_distance = last.distance_m - first.distance_m;
        let wh_per_km = if delta_distance > 0.0 {
            power_hour * 1000.0 / delta_distance
        } else {
            0.0
        };

        (power_hour, wh_per_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property9_constant_power_matches_closed_form() {
        let mut calc = EnergyCalculator::new();
        let power_w = 500.0;
        let mut t = 0i64;
        let mut d = 0.0;
        while t <= 5000 {
            calc.push_sample(power_w, d, t);
            t += 1000;
            d += 2.0;
        }
        let expected_wh = power_w * 5000.0 / 3_600_000.0;
        let got = calc.power_hour(5001);
        assert!((got - expected_wh).abs() < 1e-6, "{got} vs {expected_wh}");

        let expected_wh_per_km = expected_wh * 1000.0 / 10.0;
        let got_km = calc.wh_per_km(5002);
        assert!((got_km - expected_wh_per_km).abs() < 1e-6);
    }

    #[test]
    fn zero_delta_distance_yields_zero_wh_per_km() {
        let mut calc = EnergyCalculator::new();
        calc.push_sample(100.0, 5.0, 0);
        calc.push_sample(100.0, 5.0, 1000);
        assert_eq!(calc.wh_per_km(1001), 0.0);
    }

    #[test]
    fn fewer_than_two_samples_yields_zero() {
        let mut calc = EnergyCalculator::new();
        calc.push_sample(100.0, 0.0, 0);
        assert_eq!(calc.power_hour(1), 0.0);
    }

    #[test]
    fn samples_older_than_window_are_pruned() {
        let mut calc = EnergyCalculator::new();
        calc.push_sample(100.0, 0.0, 0);
        calc.push_sample(100.0, 1.0, 5000);
        calc.push_sample(100.0, 2.0, 20_000);
        assert_eq!(calc.samples.len(), 1);
    }
}
