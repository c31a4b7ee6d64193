//! Link control for a live network interface.
//!
//! Two seams are exposed:
//!
//! - [`LinkController`] installs and removes a root qdisc built from a
//!   [`NetemRule`]. [`TcLinkController`] drives the `tc` binary.
//! - [`Prober`] sends ICMP echo probes and UDP datagrams through the
//!   interface. [`SystemProber`] drives the `ping` binary.
//!
//! With the `test-utils` feature, [`fake::FakeLink`] implements both traits
//! in memory so controllers can be exercised without root.

pub mod probe;
pub mod qdisc;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod fake;

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

pub use probe::{parse_rtt_ms, SystemProber, RTT_MARKER};
pub use qdisc::TcLinkController;
pub use types::{DatagramRequest, LinkError, NetemRule, PingReply, PingRequest, Result};

#[async_trait]
pub trait LinkController: Send + Sync {
    async fn interface_exists(&self, interface: &str) -> bool;

    /// Install `rule` as the root qdisc. Fails if a custom root already exists.
    async fn apply(&self, interface: &str, rule: &NetemRule) -> Result<()>;

    /// Remove the custom root qdisc. Succeeds when there is nothing to remove.
    async fn clear(&self, interface: &str) -> Result<()>;

    /// Human-readable description of custom qdiscs currently installed.
    async fn active_rules(&self, interface: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn ping(&self, request: &PingRequest) -> Result<PingReply>;

    async fn send_datagram(&self, request: &DatagramRequest) -> Result<()>;

    /// Single echo probe; any error counts as unreachable.
    async fn probe(&self, interface: &str, target: IpAddr, timeout: Duration) -> bool {
        let request = PingRequest::new(interface, target).with_timeout(timeout);
        matches!(self.ping(&request).await, Ok(reply) if reply.success)
    }
}
