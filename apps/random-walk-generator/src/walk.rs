use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Serialize, Serializer};

pub const VALUE_DECIMALS: i32 = 5;

/// Unbounded Gaussian random walk. The state is never rounded; only samples are.
#[derive(Debug)]
pub struct RandomWalk<R> {
    value: f64,
    step: Normal<f64>,
    rng: R,
}

impl<R: Rng> RandomWalk<R> {
    pub fn new(start_value: f64, step_stddev: f64, rng: R) -> Result<Self> {
        if !(step_stddev >= 0.0) {
            bail!("step standard deviation must be >= 0 (got {step_stddev})");
        }
        let step = Normal::new(0.0, step_stddev)
            .with_context(|| format!("invalid step standard deviation {step_stddev}"))?;
        Ok(Self {
            value: start_value,
            step,
            rng,
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Applies one increment and returns the new state.
    pub fn step(&mut self) -> f64 {
        self.value += self.step.sample(&mut self.rng);
        self.value
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sample {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, raw_value: f64) -> Self {
        Self {
            timestamp,
            value: round_value(raw_value),
        }
    }
}

/// Rounds to [`VALUE_DECIMALS`] places, exact ties going to the even digit.
pub fn round_value(value: f64) -> f64 {
    format!("{value:.prec$}", prec = VALUE_DECIMALS as usize)
        .parse()
        .unwrap_or(value)
}

/// ISO-8601 with an explicit `+00:00` offset, microsecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_stddev_never_moves() {
        let mut walk = RandomWalk::new(100.0, 0.0, StdRng::seed_from_u64(7)).unwrap();
        for _ in 0..1_000 {
            assert_eq!(walk.step(), 100.0);
        }
    }

    #[test]
    fn negative_stddev_is_rejected() {
        assert!(RandomWalk::new(0.0, -1.0, StdRng::seed_from_u64(1)).is_err());
        assert!(RandomWalk::new(0.0, -0.0001, StdRng::seed_from_u64(1)).is_err());
        assert!(RandomWalk::new(0.0, f64::NAN, StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn increments_are_zero_mean_with_configured_variance() {
        let stddev = 2.0;
        let mut walk = RandomWalk::new(50.0, stddev, StdRng::seed_from_u64(42)).unwrap();
        let n = 10_000;
        let mut previous = walk.value();
        let mut increments = Vec::with_capacity(n);
        for _ in 0..n {
            let next = walk.step();
            increments.push(next - previous);
            previous = next;
        }

        let mean = increments.iter().sum::<f64>() / n as f64;
        let variance = increments
            .iter()
            .map(|inc| (inc - mean) * (inc - mean))
            .sum::<f64>()
            / (n - 1) as f64;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((variance - stddev * stddev).abs() < 0.4, "variance {variance}");
        assert!((walk.value() - 50.0 - increments.iter().sum::<f64>()).abs() < 1e-6);
    }

    #[test]
    fn same_seed_reproduces_the_walk() {
        let mut a = RandomWalk::new(1.0, 0.5, StdRng::seed_from_u64(9)).unwrap();
        let mut b = RandomWalk::new(1.0, 0.5, StdRng::seed_from_u64(9)).unwrap();
        for _ in 0..100 {
            assert_eq!(a.step(), b.step());
        }
    }

    #[test]
    fn state_keeps_full_precision_while_samples_round() {
        let mut walk = RandomWalk::new(0.123456789, 0.0, StdRng::seed_from_u64(3)).unwrap();
        let raw = walk.step();
        assert_eq!(raw, 0.123456789);
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(Sample::new(ts, raw).value, 0.12346);
        assert_eq!(walk.value(), 0.123456789);
    }

    #[test]
    fn rounding_is_idempotent() {
        let mut walk = RandomWalk::new(100.0, 3.0, StdRng::seed_from_u64(11)).unwrap();
        for _ in 0..1_000 {
            let once = round_value(walk.step());
            assert_eq!(round_value(once), once);
            let scaled = once * 1e5;
            assert!((scaled - scaled.round()).abs() < 1e-6, "{once}");
        }
        assert_eq!(round_value(-2.000004), -2.0);
        assert_eq!(round_value(f64::MAX), f64::MAX);
    }

    #[test]
    fn exact_ties_round_to_even() {
        // 0.015625 and 0.046875 are exact in binary, so the sixth digit is a true tie.
        assert_eq!(round_value(0.015625), 0.01562);
        assert_eq!(round_value(-0.015625), -0.01562);
        assert_eq!(round_value(0.046875), 0.04688);
        assert_eq!(round_value(0.123456789), 0.12346);
    }

    #[test]
    fn sample_serializes_with_explicit_utc_offset() {
        let ts = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(1_500))
            .unwrap();
        let json = serde_json::to_value(Sample::new(ts, 100.000001)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "timestamp": "2024-05-01T12:00:00.001500+00:00",
                "value": 100.0,
            })
        );
        let parsed = DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert_eq!(parsed.with_timezone(&Utc), ts);
    }
}
