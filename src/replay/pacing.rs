//! Randomized pacing for synthetic probes and background datagrams

use crate::config::ReplayConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::time::Duration;

const MAX_JITTER_FRACTION: f64 = 0.9;

/// Draws probe spacing and payload sizes.
#[derive(Debug)]
pub struct ProbePacer {
    base: Duration,
    jitter_fraction: f64,
    burst_probability: f64,
    payload: RangeInclusive<u16>,
    rng: StdRng,
}

impl ProbePacer {
    pub fn new(base: Duration, config: &ReplayConfig, seed: u64) -> Self {
        let (lo, hi) = ordered(config.payload_min, config.payload_max);
        Self {
            base,
            jitter_fraction: finite_or(config.jitter_fraction, 0.0).abs().min(MAX_JITTER_FRACTION),
            burst_probability: finite_or(config.burst_probability, 0.0).clamp(0.0, 1.0),
            payload: lo..=hi,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Base spacing with uniform jitter, halved on a burst draw.
    pub fn next_interval(&mut self) -> Duration {
        let spread = self.jitter_fraction;
        let factor = 1.0 + self.rng.gen_range(-spread..=spread);
        let mut secs = self.base.as_secs_f64() * factor;
        if self.rng.gen_bool(self.burst_probability) {
            secs /= 2.0;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    pub fn next_payload(&mut self) -> u16 {
        self.rng.gen_range(self.payload.clone())
    }
}

/// Draws background datagram timing, sizes and contents.
#[derive(Debug)]
pub struct BackgroundPacer {
    send_probability: f64,
    payload: RangeInclusive<usize>,
    delay_ms: RangeInclusive<u64>,
    rng: StdRng,
}

impl BackgroundPacer {
    pub fn new(config: &ReplayConfig, seed: u64) -> Self {
        let (plo, phi) = ordered(config.background_payload_min, config.background_payload_max);
        let (dlo, dhi) = ordered(config.background_delay_min_ms, config.background_delay_max_ms);
        Self {
            send_probability: finite_or(config.background_send_probability, 0.0).clamp(0.0, 1.0),
            payload: plo..=phi,
            delay_ms: dlo..=dhi,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn should_send(&mut self) -> bool {
        self.rng.gen_bool(self.send_probability)
    }

    pub fn next_payload(&mut self) -> Vec<u8> {
        let len = self.rng.gen_range(self.payload.clone());
        let mut buf = vec![0u8; len];
        self.rng.fill(&mut buf[..]);
        buf
    }

    pub fn next_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.delay_ms.clone()))
    }
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_stay_within_jitter_and_burst_envelope() {
        let config = ReplayConfig::default();
        let mut pacer = ProbePacer::new(Duration::from_millis(200), &config, 7);
        let mut bursts = 0;
        for _ in 0..1000 {
            let secs = pacer.next_interval().as_secs_f64();
            assert!(secs >= 0.08 - 1e-9 && secs <= 0.24 + 1e-9, "interval {}", secs);
            if secs < 0.16 - 1e-9 {
                bursts += 1;
            }
        }
        // bursts land in [0.08, 0.12], so roughly a tenth of draws
        assert!((50..=150).contains(&bursts), "bursts {}", bursts);
    }

    #[test]
    fn payloads_respect_range() {
        let config = ReplayConfig::default();
        let mut pacer = ProbePacer::new(Duration::from_millis(200), &config, 1);
        for _ in 0..500 {
            assert!((32..=96).contains(&pacer.next_payload()));
        }

        let mut bg = BackgroundPacer::new(&config, 1);
        for _ in 0..100 {
            let len = bg.next_payload().len();
            assert!((100..=1000).contains(&len));
            let delay = bg.next_delay();
            assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn same_seed_same_draws() {
        let config = ReplayConfig::default();
        let mut a = ProbePacer::new(Duration::from_millis(200), &config, 99);
        let mut b = ProbePacer::new(Duration::from_millis(200), &config, 99);
        for _ in 0..20 {
            assert_eq!(a.next_interval(), b.next_interval());
            assert_eq!(a.next_payload(), b.next_payload());
        }
    }

    #[test]
    fn inverted_ranges_are_tolerated() {
        let config = ReplayConfig {
            payload_min: 90,
            payload_max: 40,
            burst_probability: 7.0,
            ..ReplayConfig::default()
        };
        let mut pacer = ProbePacer::new(Duration::from_millis(100), &config, 3);
        assert!((40..=90).contains(&pacer.next_payload()));
        assert!(pacer.next_interval() <= Duration::from_millis(61));
    }
}
