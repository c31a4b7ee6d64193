//! In-memory link and prober for exercising controllers without root

use crate::types::{DatagramRequest, LinkError, NetemRule, PingReply, PingRequest, Result};
use crate::{LinkController, Prober};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;

/// A recorded operation against a [`FakeLink`].
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOp {
    Apply { interface: String, rule: NetemRule },
    Clear { interface: String, removed: bool },
}

#[derive(Debug)]
struct FakeState {
    interfaces: HashSet<String>,
    active: HashMap<String, NetemRule>,
    history: Vec<LinkOp>,
    probe_script: VecDeque<bool>,
    default_probe: bool,
    fail_apply: bool,
    fail_clear: bool,
    pings: u64,
    ping_times: Vec<Instant>,
    datagrams: u64,
}

/// Shared fake that implements both [`LinkController`] and [`Prober`].
///
/// Probes answer from a script first and fall back to a default once the
/// script is exhausted. Clones share state.
#[derive(Debug, Clone)]
pub struct FakeLink {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeLink {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                interfaces: HashSet::new(),
                active: HashMap::new(),
                history: Vec::new(),
                probe_script: VecDeque::new(),
                default_probe: true,
                fail_apply: false,
                fail_clear: false,
                pings: 0,
                ping_times: Vec::new(),
                datagrams: 0,
            })),
        }
    }

    pub fn with_interface(self, interface: &str) -> Self {
        self.state.lock().interfaces.insert(interface.to_string());
        self
    }

    /// Queue probe answers consumed in order by `ping`.
    pub fn script_probes(&self, answers: impl IntoIterator<Item = bool>) {
        self.state.lock().probe_script.extend(answers);
    }

    pub fn set_default_probe(&self, reachable: bool) {
        self.state.lock().default_probe = reachable;
    }

    pub fn fail_applies(&self, fail: bool) {
        self.state.lock().fail_apply = fail;
    }

    pub fn fail_clears(&self, fail: bool) {
        self.state.lock().fail_clear = fail;
    }

    pub fn active_rule(&self, interface: &str) -> Option<NetemRule> {
        self.state.lock().active.get(interface).cloned()
    }

    pub fn history(&self) -> Vec<LinkOp> {
        self.state.lock().history.clone()
    }

    pub fn applied_rules(&self) -> Vec<NetemRule> {
        self.state
            .lock()
            .history
            .iter()
            .filter_map(|op| match op {
                LinkOp::Apply { rule, .. } => Some(rule.clone()),
                LinkOp::Clear { .. } => None,
            })
            .collect()
    }

    pub fn ping_count(&self) -> u64 {
        self.state.lock().pings
    }

    /// When each ping was issued, in order.
    pub fn ping_times(&self) -> Vec<Instant> {
        self.state.lock().ping_times.clone()
    }

    pub fn datagram_count(&self) -> u64 {
        self.state.lock().datagrams
    }
}

#[async_trait]
impl LinkController for FakeLink {
    async fn interface_exists(&self, interface: &str) -> bool {
        self.state.lock().interfaces.contains(interface)
    }

    async fn apply(&self, interface: &str, rule: &NetemRule) -> Result<()> {
        let mut state = self.state.lock();
        if !state.interfaces.contains(interface) {
            return Err(LinkError::InterfaceNotFound(interface.to_string()));
        }
        state.history.push(LinkOp::Apply {
            interface: interface.to_string(),
            rule: rule.clone(),
        });
        if state.fail_apply {
            return Err(LinkError::CommandFailed {
                command: format!("tc qdisc add dev {} root netem", interface),
                status: "exit status: 2".into(),
                stderr: "RTNETLINK answers: Invalid argument".into(),
            });
        }
        // tc refuses to stack a second root qdisc
        if state.active.contains_key(interface) {
            return Err(LinkError::CommandFailed {
                command: format!("tc qdisc add dev {} root netem", interface),
                status: "exit status: 2".into(),
                stderr: "RTNETLINK answers: File exists".into(),
            });
        }
        state.active.insert(interface.to_string(), rule.clone());
        Ok(())
    }

    async fn clear(&self, interface: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_clear {
            return Err(LinkError::PermissionDenied);
        }
        let removed = state.active.remove(interface).is_some();
        state.history.push(LinkOp::Clear {
            interface: interface.to_string(),
            removed,
        });
        Ok(())
    }

    async fn active_rules(&self, interface: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .active
            .get(interface)
            .map(|rule| vec![rule.to_string()])
            .unwrap_or_default())
    }
}

#[async_trait]
impl Prober for FakeLink {
    async fn ping(&self, request: &PingRequest) -> Result<PingReply> {
        let mut state = self.state.lock();
        state.pings += 1;
        state.ping_times.push(Instant::now());
        let reachable = match state.probe_script.pop_front() {
            Some(answer) => answer,
            None => state.default_probe,
        };
        let seq = state.pings;
        let size = request.payload_size.unwrap_or(56);
        Ok(if reachable {
            PingReply {
                success: true,
                rtt_ms: Some(20.0),
                line: format!(
                    "{} bytes from {}: icmp_seq={} ttl=64 time=20.0 ms",
                    size as u32 + 8,
                    request.target,
                    seq
                ),
            }
        } else {
            PingReply {
                success: false,
                rtt_ms: None,
                line: format!("no reply from {}", request.target),
            }
        })
    }

    async fn send_datagram(&self, _request: &DatagramRequest) -> Result<()> {
        self.state.lock().datagrams += 1;
        Ok(())
    }
}
