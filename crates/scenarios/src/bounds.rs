//! Safety bounds applied to every impairment before it touches a link

use crate::impairment::ImpairmentKind;
use serde::{Deserialize, Serialize};

/// Per-parameter limits for an impairment.
///
/// Loss is a fraction in `0.0..=1.0`. The rate bound is a floor: a bandwidth
/// limit may never be tighter than `min_rate_mbps`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafetyBounds {
    pub max_loss_rate: f64,
    pub max_delay_ms: u32,
    pub max_jitter_ms: u32,
    pub min_rate_mbps: f64,
    pub max_signaling_rate: u32,
}

impl SafetyBounds {
    /// Limits no impairment may exceed, whatever bounds it carries.
    pub const HARD_LIMITS: SafetyBounds = SafetyBounds {
        max_loss_rate: 0.25,
        max_delay_ms: 500,
        max_jitter_ms: 200,
        min_rate_mbps: 0.5,
        max_signaling_rate: 20,
    };

    pub fn standard() -> Self {
        Self::HARD_LIMITS
    }

    /// Tighter limits for impairments that stack several effects.
    pub fn combined() -> Self {
        Self {
            max_loss_rate: 0.10,
            max_delay_ms: 300,
            max_jitter_ms: 100,
            min_rate_mbps: 3.0,
            ..Self::HARD_LIMITS
        }
    }

    pub fn for_kind(kind: ImpairmentKind) -> Self {
        match kind {
            ImpairmentKind::CombinedStress => Self::combined(),
            _ => Self::standard(),
        }
    }

    /// The stricter of these bounds and [`Self::HARD_LIMITS`], per parameter.
    pub fn enforced(&self) -> Self {
        let hard = Self::HARD_LIMITS;
        let max_loss_rate = if self.max_loss_rate.is_nan() {
            hard.max_loss_rate
        } else {
            self.max_loss_rate.clamp(0.0, hard.max_loss_rate)
        };
        let min_rate_mbps = if self.min_rate_mbps.is_nan() {
            hard.min_rate_mbps
        } else {
            self.min_rate_mbps.max(hard.min_rate_mbps)
        };
        Self {
            max_loss_rate,
            max_delay_ms: self.max_delay_ms.min(hard.max_delay_ms),
            max_jitter_ms: self.max_jitter_ms.min(hard.max_jitter_ms),
            min_rate_mbps,
            max_signaling_rate: self.max_signaling_rate.clamp(1, hard.max_signaling_rate),
        }
    }
}

impl Default for SafetyBounds {
    fn default() -> Self {
        Self::standard()
    }
}
