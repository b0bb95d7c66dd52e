//! Health ladder for a single VPN service.
//!
//! Each rung is one probe; a rung is only tried when every rung below it
//! succeeded, so the result is the highest rung of the unbroken success chain.

use log::{debug, warn};

use crate::command::CommandRunner;
use crate::config::{CommandsConfig, ServiceConfig};
use crate::state::LadderState;

/// Result of walking the ladder once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderOutcome {
    pub state: LadderState,
    /// Set once the ladder reached `IpAllocated`.
    pub ip: Option<String>,
}

impl LadderOutcome {
    fn at(state: LadderState) -> Self {
        Self { state, ip: None }
    }
}

pub struct ServiceHealthLadder<'a> {
    runner: &'a dyn CommandRunner,
    commands: &'a CommandsConfig,
}

impl<'a> ServiceHealthLadder<'a> {
    pub fn new(runner: &'a dyn CommandRunner, commands: &'a CommandsConfig) -> Self {
        Self { runner, commands }
    }

    pub fn evaluate(&self, service: &ServiceConfig) -> LadderOutcome {
        let status = self
            .runner
            .run(&self.commands.service_status.render(&[("unit", service.unit_name.as_str())]));
        if !status.success {
            return LadderOutcome::at(LadderState::ServiceStopped);
        }

        let interface = self.runner.run(
            &self
                .commands
                .interface_status
                .render(&[("adapter", service.adapter_name.as_str())]),
        );
        if !interface.success {
            return LadderOutcome::at(LadderState::ServiceRunning);
        }

        let Some(ip) = parse_inet_address(&interface.stdout, &self.commands.inet_marker) else {
            debug!(
                "Adapter {} of \"{}\" is up without an IPv4 address",
                service.adapter_name, service.name
            );
            return LadderOutcome::at(LadderState::AdapterUp);
        };

        let Some(domain) = service.ping_domain.as_deref() else {
            return LadderOutcome {
                state: LadderState::IpAllocated,
                ip: Some(ip),
            };
        };

        let reached = |state| LadderOutcome {
            state,
            ip: Some(ip.clone()),
        };

        let resolved = self
            .runner
            .run(&self.commands.resolve.render(&[("domain", domain)]));
        if !resolved.success {
            return reached(LadderState::IpAllocated);
        }

        let ping = self
            .runner
            .run(&self.commands.ping.render(&[("domain", domain)]));
        if !ping.success {
            return reached(LadderState::DomainKnown);
        }

        reached(LadderState::DomainResponsive)
    }
}

/// Extract the IPv4 address from interface status output.
///
/// The second line, trimmed, must start with `marker`; the address runs from
/// the marker to the next double space (or the end of the line). Output with
/// fewer than two lines yields `None` instead of failing the cycle.
pub fn parse_inet_address(stdout: &str, marker: &str) -> Option<String> {
    let Some(line) = stdout.lines().nth(1) else {
        warn!("Interface status output has fewer than two lines; assuming no IP");
        return None;
    };

    let rest = line.trim().strip_prefix(marker)?;
    let address = match rest.find("  ") {
        Some(end) => &rest[..end],
        None => rest,
    }
    .trim();

    if address.is_empty() {
        None
    } else {
        Some(address.to_string())
    }
}
