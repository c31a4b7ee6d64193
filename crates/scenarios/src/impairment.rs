//! Impairment kinds and their clamping and backoff rules

use crate::bounds::SafetyBounds;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpairmentKind {
    PacketDrop,
    Delay,
    Jitter,
    BandwidthLimit,
    SignalingStorm,
    CombinedStress,
}

impl fmt::Display for ImpairmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImpairmentKind::PacketDrop => "packet-drop",
            ImpairmentKind::Delay => "delay",
            ImpairmentKind::Jitter => "jitter",
            ImpairmentKind::BandwidthLimit => "bandwidth-limit",
            ImpairmentKind::SignalingStorm => "signaling-storm",
            ImpairmentKind::CombinedStress => "combined-stress",
        };
        f.write_str(name)
    }
}

/// A single impairment with its parameters.
///
/// Loss rates are fractions (`0.05` is 5%).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Impairment {
    PacketDrop {
        loss_rate: f64,
    },
    Delay {
        delay_ms: u32,
        jitter_ms: u32,
    },
    Jitter {
        jitter_ms: u32,
    },
    BandwidthLimit {
        rate_mbps: f64,
    },
    /// Burst of control-plane requests at `rate_per_sec`.
    SignalingStorm {
        rate_per_sec: u32,
    },
    CombinedStress {
        loss_rate: f64,
        delay_ms: u32,
        jitter_ms: u32,
        rate_mbps: f64,
    },
}

/// One parameter that was pulled back inside its bound.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClampAdjustment {
    pub parameter: &'static str,
    pub requested: f64,
    pub applied: f64,
}

impl fmt::Display for ClampAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requested {} clamped to {}",
            self.parameter, self.requested, self.applied
        )
    }
}

/// Result of [`Impairment::clamp`].
#[derive(Clone, Debug, PartialEq)]
pub struct Clamped {
    pub impairment: Impairment,
    pub adjustments: Vec<ClampAdjustment>,
}

impl Clamped {
    pub fn was_adjusted(&self) -> bool {
        !self.adjustments.is_empty()
    }
}

struct Clamper {
    adjustments: Vec<ClampAdjustment>,
}

impl Clamper {
    fn record(&mut self, parameter: &'static str, requested: f64, applied: f64) {
        if requested != applied {
            self.adjustments.push(ClampAdjustment {
                parameter,
                requested,
                applied,
            });
        }
    }

    fn loss(&mut self, requested: f64, max: f64) -> f64 {
        let applied = if requested.is_nan() {
            0.0
        } else {
            requested.clamp(0.0, max)
        };
        self.record("loss_rate", requested, applied);
        applied
    }

    fn ceiling(&mut self, parameter: &'static str, requested: u32, max: u32) -> u32 {
        let applied = requested.min(max);
        self.record(parameter, requested as f64, applied as f64);
        applied
    }

    fn rate(&mut self, requested: f64, floor: f64) -> f64 {
        let applied = if requested.is_nan() {
            floor
        } else {
            requested.max(floor)
        };
        self.record("rate_mbps", requested, applied);
        applied
    }
}

impl Impairment {
    pub fn kind(&self) -> ImpairmentKind {
        match self {
            Impairment::PacketDrop { .. } => ImpairmentKind::PacketDrop,
            Impairment::Delay { .. } => ImpairmentKind::Delay,
            Impairment::Jitter { .. } => ImpairmentKind::Jitter,
            Impairment::BandwidthLimit { .. } => ImpairmentKind::BandwidthLimit,
            Impairment::SignalingStorm { .. } => ImpairmentKind::SignalingStorm,
            Impairment::CombinedStress { .. } => ImpairmentKind::CombinedStress,
        }
    }

    /// Whether this impairment is expressed as a qdisc on the link.
    pub fn uses_traffic_control(&self) -> bool {
        !matches!(self, Impairment::SignalingStorm { .. })
    }

    /// Pull every parameter inside `bounds` (never looser than the hard limits).
    pub fn clamp(&self, bounds: &SafetyBounds) -> Clamped {
        let b = bounds.enforced();
        let mut c = Clamper {
            adjustments: Vec::new(),
        };
        let impairment = match *self {
            Impairment::PacketDrop { loss_rate } => Impairment::PacketDrop {
                loss_rate: c.loss(loss_rate, b.max_loss_rate),
            },
            Impairment::Delay {
                delay_ms,
                jitter_ms,
            } => Impairment::Delay {
                delay_ms: c.ceiling("delay_ms", delay_ms, b.max_delay_ms),
                jitter_ms: c.ceiling("jitter_ms", jitter_ms, b.max_jitter_ms),
            },
            Impairment::Jitter { jitter_ms } => Impairment::Jitter {
                jitter_ms: c.ceiling("jitter_ms", jitter_ms, b.max_jitter_ms),
            },
            Impairment::BandwidthLimit { rate_mbps } => Impairment::BandwidthLimit {
                rate_mbps: c.rate(rate_mbps, b.min_rate_mbps),
            },
            Impairment::SignalingStorm { rate_per_sec } => {
                let applied = rate_per_sec.clamp(1, b.max_signaling_rate);
                c.record("rate_per_sec", rate_per_sec as f64, applied as f64);
                Impairment::SignalingStorm {
                    rate_per_sec: applied,
                }
            }
            Impairment::CombinedStress {
                loss_rate,
                delay_ms,
                jitter_ms,
                rate_mbps,
            } => Impairment::CombinedStress {
                loss_rate: c.loss(loss_rate, b.max_loss_rate),
                delay_ms: c.ceiling("delay_ms", delay_ms, b.max_delay_ms),
                jitter_ms: c.ceiling("jitter_ms", jitter_ms, b.max_jitter_ms),
                rate_mbps: c.rate(rate_mbps, b.min_rate_mbps),
            },
        };
        Clamped {
            impairment,
            adjustments: c.adjustments,
        }
    }

    /// Less severe variant used after a failed connectivity checkpoint.
    pub fn reduced(&self) -> Impairment {
        match *self {
            Impairment::PacketDrop { loss_rate } => Impairment::PacketDrop {
                loss_rate: loss_rate / 2.0,
            },
            Impairment::Delay {
                delay_ms,
                jitter_ms,
            } => Impairment::Delay {
                delay_ms: delay_ms / 2,
                jitter_ms: jitter_ms / 2,
            },
            Impairment::Jitter { jitter_ms } => Impairment::Jitter {
                jitter_ms: jitter_ms / 2,
            },
            Impairment::BandwidthLimit { rate_mbps } => Impairment::BandwidthLimit {
                rate_mbps: rate_mbps * 2.0,
            },
            Impairment::SignalingStorm { rate_per_sec } => Impairment::SignalingStorm {
                rate_per_sec: (rate_per_sec / 2).max(1),
            },
            Impairment::CombinedStress {
                loss_rate,
                delay_ms,
                jitter_ms,
                rate_mbps,
            } => Impairment::CombinedStress {
                loss_rate: loss_rate / 2.0,
                delay_ms: delay_ms / 2,
                jitter_ms: jitter_ms / 2,
                rate_mbps: rate_mbps + 2.0,
            },
        }
    }
}

impl fmt::Display for Impairment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impairment::PacketDrop { loss_rate } => {
                write!(f, "packet-drop loss {:.1}%", loss_rate * 100.0)
            }
            Impairment::Delay {
                delay_ms,
                jitter_ms,
            } => write!(f, "delay {}ms ±{}ms", delay_ms, jitter_ms),
            Impairment::Jitter { jitter_ms } => write!(f, "jitter ±{}ms", jitter_ms),
            Impairment::BandwidthLimit { rate_mbps } => {
                write!(f, "bandwidth-limit {:.2} Mbps", rate_mbps)
            }
            Impairment::SignalingStorm { rate_per_sec } => {
                write!(f, "signaling-storm {}/s", rate_per_sec)
            }
            Impairment::CombinedStress {
                loss_rate,
                delay_ms,
                jitter_ms,
                rate_mbps,
            } => write!(
                f,
                "combined-stress loss {:.1}% delay {}ms ±{}ms rate {:.2} Mbps",
                loss_rate * 100.0,
                delay_ms,
                jitter_ms,
                rate_mbps
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_rate_is_min_of_request_and_bound() {
        let bounds = SafetyBounds::standard();
        for requested in [0.0, 0.05, 0.25, 0.3, 0.99, 1.0] {
            let clamped = Impairment::PacketDrop {
                loss_rate: requested,
            }
            .clamp(&bounds);
            let expected = f64::min(requested, 0.25);
            assert_eq!(
                clamped.impairment,
                Impairment::PacketDrop {
                    loss_rate: expected
                }
            );
            assert_eq!(clamped.was_adjusted(), requested > 0.25);
        }
    }

    #[test]
    fn bandwidth_floor_and_delay_ceiling() {
        let bounds = SafetyBounds::standard();
        let bw = Impairment::BandwidthLimit { rate_mbps: 0.1 }.clamp(&bounds);
        assert_eq!(bw.impairment, Impairment::BandwidthLimit { rate_mbps: 0.5 });
        assert_eq!(bw.adjustments[0].parameter, "rate_mbps");

        let delay = Impairment::Delay {
            delay_ms: 800,
            jitter_ms: 300,
        }
        .clamp(&bounds);
        assert_eq!(
            delay.impairment,
            Impairment::Delay {
                delay_ms: 500,
                jitter_ms: 200
            }
        );
        assert_eq!(delay.adjustments.len(), 2);
    }

    #[test]
    fn combined_uses_combined_bounds() {
        let requested = Impairment::CombinedStress {
            loss_rate: 0.2,
            delay_ms: 400,
            jitter_ms: 150,
            rate_mbps: 1.0,
        };
        let clamped = requested.clamp(&SafetyBounds::combined());
        assert_eq!(
            clamped.impairment,
            Impairment::CombinedStress {
                loss_rate: 0.10,
                delay_ms: 300,
                jitter_ms: 100,
                rate_mbps: 3.0,
            }
        );
        assert_eq!(clamped.adjustments.len(), 4);
    }

    #[test]
    fn nan_loss_clamps_to_zero() {
        let clamped = Impairment::PacketDrop {
            loss_rate: f64::NAN,
        }
        .clamp(&SafetyBounds::standard());
        assert_eq!(clamped.impairment, Impairment::PacketDrop { loss_rate: 0.0 });
    }

    #[test]
    fn storm_rate_is_capped() {
        let clamped = Impairment::SignalingStorm { rate_per_sec: 1000 }.clamp(&SafetyBounds::standard());
        assert_eq!(
            clamped.impairment,
            Impairment::SignalingStorm { rate_per_sec: 20 }
        );
    }

    #[test]
    fn zero_storm_rate_is_raised_and_reported() {
        let clamped = Impairment::SignalingStorm { rate_per_sec: 0 }.clamp(&SafetyBounds::standard());
        assert_eq!(
            clamped.impairment,
            Impairment::SignalingStorm { rate_per_sec: 1 }
        );
        assert_eq!(clamped.adjustments.len(), 1);
        assert_eq!(clamped.adjustments[0].parameter, "rate_per_sec");
        assert_eq!(clamped.adjustments[0].requested, 0.0);
        assert_eq!(clamped.adjustments[0].applied, 1.0);
    }

    #[test]
    fn reduced_is_less_severe() {
        assert_eq!(
            Impairment::PacketDrop { loss_rate: 0.2 }.reduced(),
            Impairment::PacketDrop { loss_rate: 0.1 }
        );
        assert_eq!(
            Impairment::Delay {
                delay_ms: 150,
                jitter_ms: 50
            }
            .reduced(),
            Impairment::Delay {
                delay_ms: 75,
                jitter_ms: 25
            }
        );
        assert_eq!(
            Impairment::BandwidthLimit { rate_mbps: 2.0 }.reduced(),
            Impairment::BandwidthLimit { rate_mbps: 4.0 }
        );
        assert_eq!(
            Impairment::SignalingStorm { rate_per_sec: 1 }.reduced(),
            Impairment::SignalingStorm { rate_per_sec: 1 }
        );
        assert_eq!(
            Impairment::CombinedStress {
                loss_rate: 0.1,
                delay_ms: 100,
                jitter_ms: 30,
                rate_mbps: 3.0
            }
            .reduced(),
            Impairment::CombinedStress {
                loss_rate: 0.05,
                delay_ms: 50,
                jitter_ms: 15,
                rate_mbps: 5.0
            }
        );
    }
}
