//! Qdisc management for traffic control

use crate::types::{LinkError, NetemRule, Result};
use crate::LinkController;
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, warn};

const SYS_CLASS_NET: &str = "/sys/class/net";
const TBF_BURST: &str = "32kbit";
const TBF_LATENCY: &str = "400ms";

/// Applies [`NetemRule`]s to a live interface by shelling out to `tc`.
#[derive(Debug, Clone, Default)]
pub struct TcLinkController {
    sudo: bool,
}

impl TcLinkController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every `tc` invocation with `sudo`.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    fn command(&self) -> Command {
        if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("tc");
            cmd
        } else {
            Command::new("tc")
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        debug!(args = %args.join(" "), sudo = self.sudo, "running tc");
        let output = self.command().args(args).output().await?;
        Ok(output)
    }

    /// Check whether the current process can manipulate qdiscs.
    pub async fn has_net_admin(&self) -> bool {
        match self.command().args(["qdisc", "show"]).output().await {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }
}

/// Build the `tc` argument lists that install `rule` as the root qdisc.
pub fn build_tc_commands(interface: &str, rule: &NetemRule) -> Vec<Vec<String>> {
    let mut commands = Vec::new();

    let mut netem_parent: Vec<String> = vec!["root".into()];
    if let Some(rate_kbit) = rule.rate_kbit {
        commands.push(
            [
                "qdisc",
                "add",
                "dev",
                interface,
                "root",
                "handle",
                "1:",
                "tbf",
                "rate",
                &format!("{}kbit", rate_kbit.max(1)),
                "burst",
                TBF_BURST,
                "latency",
                TBF_LATENCY,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );
        netem_parent = vec!["parent".into(), "1:1".into()];
    }

    if rule.has_netem() {
        let mut args: Vec<String> = vec!["qdisc".into(), "add".into(), "dev".into(), interface.into()];
        args.extend(netem_parent);
        args.extend(["handle".into(), "10:".into(), "netem".into()]);

        if rule.delay_ms > 0 || rule.jitter_ms > 0 {
            args.push("delay".into());
            args.push(format!("{}ms", rule.delay_ms));
            if rule.jitter_ms > 0 {
                args.push(format!("{}ms", rule.jitter_ms));
            }
        }
        if rule.loss_percent > 0.0 {
            args.push("loss".into());
            args.push(format!("{}%", trim_float(rule.loss_percent)));
        }
        commands.push(args);
    }

    commands
}

fn trim_float(value: f64) -> String {
    let s = format!("{:.4}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Map a failed `tc` invocation onto a [`LinkError`].
fn classify_failure(interface: &str, args: &[String], output: &Output) -> LinkError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.contains("Cannot find device") {
        LinkError::InterfaceNotFound(interface.to_string())
    } else if stderr.contains("Operation not permitted") {
        LinkError::PermissionDenied
    } else {
        LinkError::CommandFailed {
            command: format!("tc {}", args.join(" ")),
            status: output.status.to_string(),
            stderr,
        }
    }
}

/// `tc qdisc del` on an interface with no custom root qdisc.
fn nothing_to_delete(stderr: &str) -> bool {
    stderr.contains("handle of zero")
        || stderr.contains("No such file or directory")
        || stderr.contains("Invalid handle")
}

#[async_trait]
impl LinkController for TcLinkController {
    async fn interface_exists(&self, interface: &str) -> bool {
        tokio::fs::try_exists(Path::new(SYS_CLASS_NET).join(interface))
            .await
            .unwrap_or(false)
    }

    async fn apply(&self, interface: &str, rule: &NetemRule) -> Result<()> {
        info!(interface, %rule, "applying qdisc");
        for args in build_tc_commands(interface, rule) {
            let output = self.run(&args).await?;
            if !output.status.success() {
                let err = classify_failure(interface, &args, &output);
                warn!(interface, error = %err, "tc add failed");
                return Err(err);
            }
        }
        Ok(())
    }

    async fn clear(&self, interface: &str) -> Result<()> {
        let args: Vec<String> = ["qdisc", "del", "dev", interface, "root"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self.run(&args).await?;
        if output.status.success() {
            info!(interface, "removed root qdisc");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if nothing_to_delete(&stderr) {
            debug!(interface, "no custom qdisc to remove");
            return Ok(());
        }
        Err(classify_failure(interface, &args, &output))
    }

    async fn active_rules(&self, interface: &str) -> Result<Vec<String>> {
        let args: Vec<String> = ["qdisc", "show", "dev", interface]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(classify_failure(interface, &args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| line.contains(" netem ") || line.contains(" tbf "))
            .map(|line| line.trim().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netem_only_goes_on_root() {
        let rule = NetemRule {
            delay_ms: 150,
            jitter_ms: 50,
            loss_percent: 0.0,
            rate_kbit: None,
        };
        let cmds = build_tc_commands("uesimtun0", &rule);
        assert_eq!(cmds.len(), 1);
        assert_eq!(
            cmds[0].join(" "),
            "qdisc add dev uesimtun0 root handle 10: netem delay 150ms 50ms"
        );
    }

    #[test]
    fn rate_puts_netem_under_tbf() {
        let rule = NetemRule {
            delay_ms: 100,
            jitter_ms: 0,
            loss_percent: 10.0,
            rate_kbit: Some(3000),
        };
        let cmds = build_tc_commands("eth9", &rule);
        assert_eq!(cmds.len(), 2);
        assert_eq!(
            cmds[0].join(" "),
            "qdisc add dev eth9 root handle 1: tbf rate 3000kbit burst 32kbit latency 400ms"
        );
        assert_eq!(
            cmds[1].join(" "),
            "qdisc add dev eth9 parent 1:1 handle 10: netem delay 100ms loss 10%"
        );
    }

    #[test]
    fn loss_percent_formatting() {
        let rule = NetemRule {
            loss_percent: 12.5,
            ..Default::default()
        };
        let cmds = build_tc_commands("eth0", &rule);
        assert!(cmds[0].join(" ").ends_with("netem loss 12.5%"));
    }

    #[test]
    fn empty_rule_builds_nothing() {
        assert!(build_tc_commands("eth0", &NetemRule::default()).is_empty());
    }

    #[test]
    fn recognizes_clean_interface_errors() {
        assert!(nothing_to_delete(
            "Error: Cannot delete qdisc with handle of zero."
        ));
        assert!(!nothing_to_delete("Error: Operation not permitted"));
    }

    #[tokio::test]
    async fn missing_interface_does_not_exist() {
        let tc = TcLinkController::new();
        assert!(!tc.interface_exists("if_not_exist_zzz").await);
    }
}
