// 🌊 Coherence Oscillator - cosmetic "live" metric signal
//
// Pull-based: every sample is a pure function of wall-clock time.
// Nothing is stored between calls.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Nominal coherence baseline
pub const GOLDEN_RATIO: f64 = 1.618;

pub const COHERENCE_PERIOD_MS: f64 = 1_000.0;
pub const COHERENCE_AMPLITUDE: f64 = 0.001;

pub const PULSE_PERIOD_MS: f64 = 2_000.0;
pub const PULSE_AMPLITUDE: f64 = 0.05;

/// Coherence sample for the current instant
pub fn sample_coherence(base: f64) -> f64 {
    CoherenceOscillator::coherence(base).sample()
}

/// Pulse sample for the current instant
pub fn sample_pulse(base: f64) -> f64 {
    CoherenceOscillator::pulse(base).sample()
}

/// `base + sin(t / period) * amplitude`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceOscillator {
    pub base: f64,
    pub period_ms: f64,
    pub amplitude: f64,
}

impl CoherenceOscillator {
    pub fn new(base: f64, period_ms: f64, amplitude: f64) -> Self {
        CoherenceOscillator {
            base,
            period_ms,
            amplitude: amplitude.abs(),
        }
    }

    /// Small, fast oscillation used for coherence readouts
    pub fn coherence(base: f64) -> Self {
        Self::new(base, COHERENCE_PERIOD_MS, COHERENCE_AMPLITUDE)
    }

    /// Larger, slower oscillation used for pulse readouts
    pub fn pulse(base: f64) -> Self {
        Self::new(base, PULSE_PERIOD_MS, PULSE_AMPLITUDE)
    }

    pub fn sample(&self) -> f64 {
        self.sample_at(Utc::now().timestamp_millis())
    }

    pub fn sample_at(&self, millis: i64) -> f64 {
        self.base + (millis as f64 / self.period_ms).sin() * self.amplitude
    }

    /// Inclusive range every sample falls in
    pub fn bounds(&self) -> (f64, f64) {
        (self.base - self.amplitude, self.base + self.amplitude)
    }
}

impl Default for CoherenceOscillator {
    fn default() -> Self {
        Self::coherence(GOLDEN_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coherence_stays_within_bounds() {
        let osc = CoherenceOscillator::coherence(GOLDEN_RATIO);
        let (low, high) = osc.bounds();

        for t in (0..200_000).step_by(37) {
            let v = osc.sample_at(t);
            assert!(v >= low && v <= high, "sample {v} at {t} out of [{low}, {high}]");
        }
    }

    #[test]
    fn test_pulse_has_wider_range() {
        let coherence = CoherenceOscillator::coherence(1.0);
        let pulse = CoherenceOscillator::pulse(1.0);

        assert!(pulse.bounds().1 > coherence.bounds().1);
        assert!(pulse.bounds().0 < coherence.bounds().0);
    }

    #[test]
    fn test_live_samples_near_base() {
        let v = sample_coherence(GOLDEN_RATIO);
        assert!((v - GOLDEN_RATIO).abs() <= COHERENCE_AMPLITUDE + f64::EPSILON);

        let p = sample_pulse(100.0);
        assert!((p - 100.0).abs() <= PULSE_AMPLITUDE + 1e-12);
    }

    #[test]
    fn test_sample_is_continuous() {
        let osc = CoherenceOscillator::coherence(GOLDEN_RATIO);
        let a = osc.sample_at(1_000_000);
        let b = osc.sample_at(1_000_001);

        // one millisecond moves the value by at most amplitude / period
        assert!((a - b).abs() <= COHERENCE_AMPLITUDE / COHERENCE_PERIOD_MS + 1e-15);
    }

    #[test]
    fn test_zero_time_is_base() {
        let osc = CoherenceOscillator::pulse(3.0);
        assert_eq!(osc.sample_at(0), 3.0);
    }
}
