//! Translation from impairments to qdisc rules

use link_control::NetemRule;
use scenarios::Impairment;

/// The qdisc rule for `impairment`, or `None` for impairments that do not
/// shape the link.
///
/// A jitter-only impairment is centred on a mean delay equal to its jitter so
/// that netem never has to schedule a negative delay.
pub fn netem_rule(impairment: &Impairment) -> Option<NetemRule> {
    match *impairment {
        Impairment::PacketDrop { loss_rate } => Some(NetemRule {
            loss_percent: loss_rate * 100.0,
            ..Default::default()
        }),
        Impairment::Delay {
            delay_ms,
            jitter_ms,
        } => Some(NetemRule {
            delay_ms,
            jitter_ms,
            ..Default::default()
        }),
        Impairment::Jitter { jitter_ms } => Some(NetemRule {
            delay_ms: jitter_ms,
            jitter_ms,
            ..Default::default()
        }),
        Impairment::BandwidthLimit { rate_mbps } => Some(NetemRule {
            rate_kbit: Some(mbps_to_kbit(rate_mbps)),
            ..Default::default()
        }),
        Impairment::SignalingStorm { .. } => None,
        Impairment::CombinedStress {
            loss_rate,
            delay_ms,
            jitter_ms,
            rate_mbps,
        } => Some(NetemRule {
            delay_ms,
            jitter_ms,
            loss_percent: loss_rate * 100.0,
            rate_kbit: Some(mbps_to_kbit(rate_mbps)),
        }),
    }
}

fn mbps_to_kbit(mbps: f64) -> u64 {
    (mbps * 1000.0).round().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_in_kbit() {
        let rule = netem_rule(&Impairment::BandwidthLimit { rate_mbps: 0.5 }).unwrap();
        assert_eq!(rule.rate_kbit, Some(500));
        assert!(!rule.has_netem());
    }

    #[test]
    fn combined_sets_every_field() {
        let rule = netem_rule(&Impairment::CombinedStress {
            loss_rate: 0.1,
            delay_ms: 100,
            jitter_ms: 30,
            rate_mbps: 3.0,
        })
        .unwrap();
        assert_eq!(rule.delay_ms, 100);
        assert_eq!(rule.jitter_ms, 30);
        assert!((rule.loss_percent - 10.0).abs() < 1e-9);
        assert_eq!(rule.rate_kbit, Some(3000));
    }

    #[test]
    fn storm_has_no_rule() {
        assert!(netem_rule(&Impairment::SignalingStorm { rate_per_sec: 5 }).is_none());
    }
}
