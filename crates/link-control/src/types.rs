//! Rule and error types shared by every link backend

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Command error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Permission denied (requires root privileges)")]
    PermissionDenied,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Root qdisc configuration for one interface.
///
/// Delay, jitter and loss go into a netem qdisc. A rate turns the root into a
/// token bucket filter with netem attached as its child.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetemRule {
    pub delay_ms: u32,
    pub jitter_ms: u32,
    pub loss_percent: f64,
    pub rate_kbit: Option<u64>,
}

impl NetemRule {
    pub fn has_netem(&self) -> bool {
        self.delay_ms > 0 || self.jitter_ms > 0 || self.loss_percent > 0.0
    }

    pub fn is_empty(&self) -> bool {
        !self.has_netem() && self.rate_kbit.is_none()
    }
}

impl fmt::Display for NetemRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.delay_ms > 0 || self.jitter_ms > 0 {
            parts.push(format!("delay {}ms ±{}ms", self.delay_ms, self.jitter_ms));
        }
        if self.loss_percent > 0.0 {
            parts.push(format!("loss {:.2}%", self.loss_percent));
        }
        if let Some(rate) = self.rate_kbit {
            parts.push(format!("rate {}kbit", rate));
        }
        if parts.is_empty() {
            return write!(f, "no-op");
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// One ICMP echo request.
#[derive(Debug, Clone)]
pub struct PingRequest {
    pub interface: String,
    pub target: IpAddr,
    pub payload_size: Option<u16>,
    pub timeout: Duration,
    /// Ask for a wall-clock prefix on the reply line.
    pub timestamps: bool,
}

impl PingRequest {
    pub fn new(interface: impl Into<String>, target: IpAddr) -> Self {
        Self {
            interface: interface.into(),
            target,
            payload_size: None,
            timeout: Duration::from_secs(1),
            timestamps: false,
        }
    }

    pub fn with_payload_size(mut self, size: u16) -> Self {
        self.payload_size = Some(size);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingReply {
    pub success: bool,
    pub rtt_ms: Option<f64>,
    /// The reply line as printed by the prober, or a synthesized timeout line.
    pub line: String,
}

/// A fire-and-forget UDP datagram.
#[derive(Debug, Clone)]
pub struct DatagramRequest {
    pub target: SocketAddr,
    pub payload: Vec<u8>,
}
