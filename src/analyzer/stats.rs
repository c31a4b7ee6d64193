//! Descriptive statistics over a sample

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Summarize `values`. An empty sample summarizes to all zeros.
///
/// Standard deviation is the sample form (n - 1); percentiles interpolate
/// linearly between closest ranks.
pub fn summarize(values: &[f64]) -> Summary {
    summarize_with_zeros(values, 0)
}

/// Summarize `values` plus `zeros` additional samples equal to zero.
///
/// Sparse series use this so quiet buckets count without being materialized.
pub fn summarize_with_zeros(values: &[f64], zeros: u64) -> Summary {
    let n = values.len() as f64 + zeros as f64;
    if n == 0.0 {
        return Summary::default();
    }

    let mean = values.iter().sum::<f64>() / n;
    let std_dev = if n > 1.0 {
        let spread = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            + zeros as f64 * mean * mean;
        (spread / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let ranked = Ranked::new(&sorted, zeros);

    Summary {
        mean,
        min: ranked.get(0),
        max: ranked.get(ranked.len() - 1),
        std_dev,
        p50: ranked.percentile(50.0),
        p95: ranked.percentile(95.0),
        p99: ranked.percentile(99.0),
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    Ranked::new(sorted, 0).percentile(pct)
}

/// An ascending slice with `zeros` implicit zero samples merged in.
struct Ranked<'a> {
    sorted: &'a [f64],
    zeros: u64,
    negatives: u64,
}

impl<'a> Ranked<'a> {
    fn new(sorted: &'a [f64], zeros: u64) -> Self {
        let negatives = sorted.partition_point(|v| *v < 0.0) as u64;
        Self {
            sorted,
            zeros,
            negatives,
        }
    }

    fn len(&self) -> u64 {
        self.sorted.len() as u64 + self.zeros
    }

    fn get(&self, rank: u64) -> f64 {
        if rank < self.negatives {
            self.sorted[rank as usize]
        } else if rank < self.negatives + self.zeros {
            0.0
        } else {
            self.sorted[(rank - self.zeros) as usize]
        }
    }

    fn percentile(&self, pct: f64) -> f64 {
        match self.len() {
            0 => 0.0,
            1 => self.get(0),
            len => {
                let rank = (pct / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
                let lo = rank.floor() as u64;
                let hi = (rank.ceil() as u64).min(len - 1);
                let weight = rank - lo as f64;
                let (a, b) = (self.get(lo), self.get(hi));
                a + (b - a) * weight
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sample_is_zero() {
        assert_eq!(summarize(&[]), Summary::default());
    }

    #[test]
    fn single_value() {
        let s = summarize(&[4.0]);
        assert_eq!(s.mean, 4.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.p99, 4.0);
    }

    #[test]
    fn known_sample() {
        let s = summarize(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert!((s.std_dev - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.p50, 3.0);
        assert!((s.p95 - 4.8).abs() < 1e-12);
        assert!((s.p99 - 4.96).abs() < 1e-12);
    }

    #[test]
    fn implicit_zeros_match_explicit_ones() {
        let explicit = summarize(&[0.0, 2.0, 0.0, 0.0, 4.0]);
        let implicit = summarize_with_zeros(&[2.0, 4.0], 3);
        assert!((explicit.mean - implicit.mean).abs() < 1e-12);
        assert!((explicit.std_dev - implicit.std_dev).abs() < 1e-12);
        assert_eq!(explicit.min, implicit.min);
        assert_eq!(explicit.max, implicit.max);
        assert!((explicit.p50 - implicit.p50).abs() < 1e-12);
        assert!((explicit.p95 - implicit.p95).abs() < 1e-12);
    }

    #[test]
    fn huge_zero_count_needs_no_allocation() {
        let s = summarize_with_zeros(&[8.0, 8.0], 1_000_000_000_000);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 8.0);
        assert_eq!(s.p99, 0.0);
        assert!(s.mean > 0.0 && s.mean < 1e-9);
    }
}
