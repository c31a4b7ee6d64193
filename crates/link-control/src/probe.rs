//! Connectivity probing and datagram emission over the system network stack

use crate::types::{DatagramRequest, LinkError, PingReply, PingRequest, Result};
use crate::Prober;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::process::Command;
use tracing::{debug, trace};

/// Token that precedes the round-trip time on a ping reply line.
pub const RTT_MARKER: &str = "time=";

/// Extract the round-trip time in milliseconds from a ping reply line.
///
/// Accepts both `time=32.1 ms` and `time=32.1ms`.
pub fn parse_rtt_ms(line: &str) -> Option<f64> {
    let start = line.find(RTT_MARKER)? + RTT_MARKER.len();
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Probes via the `ping` binary and sends datagrams on an ephemeral UDP socket.
#[derive(Debug, Clone, Default)]
pub struct SystemProber;

impl SystemProber {
    pub fn new() -> Self {
        Self
    }

    fn ping_args(request: &PingRequest) -> Vec<String> {
        let wait_secs = request.timeout.as_secs().max(1);
        let mut args = vec![
            "-n".to_string(),
            "-c".into(),
            "1".into(),
            "-W".into(),
            wait_secs.to_string(),
            "-I".into(),
            request.interface.clone(),
        ];
        if let Some(size) = request.payload_size {
            args.push("-s".into());
            args.push(size.to_string());
        }
        if request.timestamps {
            args.push("-D".into());
        }
        args.push(request.target.to_string());
        args
    }
}

#[async_trait]
impl Prober for SystemProber {
    async fn ping(&self, request: &PingRequest) -> Result<PingReply> {
        let args = Self::ping_args(request);
        trace!(args = %args.join(" "), "running ping");
        let deadline = request.timeout + Duration::from_secs(1);
        let output = tokio::time::timeout(
            deadline,
            Command::new("ping").args(&args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| LinkError::Timeout(deadline))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply_line = stdout.lines().find(|l| l.contains(RTT_MARKER));
        match reply_line {
            Some(line) if output.status.success() => Ok(PingReply {
                success: true,
                rtt_ms: parse_rtt_ms(line),
                line: line.trim().to_string(),
            }),
            _ => {
                debug!(target = %request.target, status = %output.status, "no echo reply");
                Ok(PingReply {
                    success: false,
                    rtt_ms: None,
                    line: format!("no reply from {}", request.target),
                })
            }
        }
    }

    async fn send_datagram(&self, request: &DatagramRequest) -> Result<()> {
        let bind = if request.target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.send_to(&request.payload, request.target).await?;
        Ok(())
    }
}
