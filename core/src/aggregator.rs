//! Runs every configured check once per cycle and derives the overall status.

use std::sync::Arc;

use chrono::{DateTime, Local};
use log::info;

use crate::command::CommandRunner;
use crate::config::{Config, MachineConfig, ServiceConfig};
use crate::ladder::ServiceHealthLadder;
use crate::state::{ConnectionStatus, LadderState};
use crate::wol::WolReachabilityCheck;

/// Per-service runtime state, updated only from ladder results.
#[derive(Debug, Clone)]
pub struct ServiceRuntime {
    pub config: ServiceConfig,
    pub state: LadderState,
    pub last_known_ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WolRuntime {
    pub config: MachineConfig,
    pub reachable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    /// The service's unit name.
    pub id: String,
    pub state: LadderState,
    pub ip: Option<String>,
    pub has_ping_domain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineReport {
    /// The machine's name.
    pub id: String,
    pub reachable: bool,
}

/// Immutable result of one cycle. Services and machines keep config order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub services: Vec<ServiceReport>,
    pub machines: Vec<MachineReport>,
    pub active_service: Option<String>,
    pub status: ConnectionStatus,
    pub checked_at: DateTime<Local>,
}

impl Snapshot {
    /// Build a snapshot from per-entity results, deriving the active service
    /// and the connection status.
    pub fn from_reports(services: Vec<ServiceReport>, machines: Vec<MachineReport>) -> Self {
        let active = select_active(&services);
        let status = ConnectionStatus::derive(active.map(|s| (s.state, s.has_ping_domain)));
        let active_service = active.map(|s| s.id.clone());

        Self {
            services,
            machines,
            active_service,
            status,
            checked_at: Local::now(),
        }
    }

    pub fn service(&self, id: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn machine(&self, id: &str) -> Option<&MachineReport> {
        self.machines.iter().find(|m| m.id == id)
    }

    pub fn active(&self) -> Option<&ServiceReport> {
        self.active_service.as_deref().and_then(|id| self.service(id))
    }
}

/// First service, in config order, that is above `ServiceStopped`.
pub fn select_active(services: &[ServiceReport]) -> Option<&ServiceReport> {
    services
        .iter()
        .find(|s| s.state > LadderState::ServiceStopped)
}

pub struct ServiceAggregator {
    config: Arc<Config>,
    services: Vec<ServiceRuntime>,
    machines: Vec<WolRuntime>,
}

impl ServiceAggregator {
    pub fn new(config: Arc<Config>) -> Self {
        let services = config
            .services
            .iter()
            .map(|service| {
                info!("VPN service \"{}\" initialized", service.name);
                ServiceRuntime {
                    config: service.clone(),
                    state: LadderState::ServiceStopped,
                    last_known_ip: None,
                }
            })
            .collect();

        let machines = config
            .machines
            .iter()
            .map(|machine| {
                info!("Device \"{}\" initialized", machine.name);
                WolRuntime {
                    config: machine.clone(),
                    reachable: false,
                }
            })
            .collect();

        Self {
            config,
            services,
            machines,
        }
    }

    pub fn services(&self) -> &[ServiceRuntime] {
        &self.services
    }

    pub fn machines(&self) -> &[WolRuntime] {
        &self.machines
    }

    /// Evaluate every service and machine, sequentially and in config order.
    pub fn tick(&mut self, runner: &dyn CommandRunner) -> Snapshot {
        let commands = &self.config.commands;
        let ladder = ServiceHealthLadder::new(runner, commands);
        let wol = WolReachabilityCheck::new(runner, commands);

        let services = self
            .services
            .iter_mut()
            .map(|runtime| {
                let outcome = ladder.evaluate(&runtime.config);
                runtime.state = outcome.state;
                if outcome.ip.is_some() {
                    runtime.last_known_ip = outcome.ip.clone();
                }
                ServiceReport {
                    id: runtime.config.unit_name.clone(),
                    state: outcome.state,
                    ip: outcome.ip,
                    has_ping_domain: runtime.config.ping_domain.is_some(),
                }
            })
            .collect();

        let machines = self
            .machines
            .iter_mut()
            .map(|runtime| {
                runtime.reachable = wol.evaluate(&runtime.config);
                MachineReport {
                    id: runtime.config.name.clone(),
                    reachable: runtime.reachable,
                }
            })
            .collect();

        Snapshot::from_reports(services, machines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::ScriptedRunner;

    const IFCONFIG_UP: &str = "tun0\n  inet addr:10.8.0.6  Mask:255.255.255.0\n";

    fn report(id: &str, state: LadderState, has_ping_domain: bool) -> ServiceReport {
        ServiceReport {
            id: id.to_string(),
            state,
            ip: None,
            has_ping_domain,
        }
    }

    fn two_services() -> Arc<Config> {
        let config = Config::parse(
            r#"
[[services]]
name = "Private"
unit_name = "openvpn@private"
adapter_name = "tap0"
ping_domain = "gw.private.lan"

[[services]]
name = "Public"
unit_name = "openvpn@public"
adapter_name = "tun0"

[[machines]]
name = "nas"
domain = "nas.private.lan"
mac = "00:AA:00:AA:00:AA"
broadcast_address = "192.168.1.255"
"#,
        )
        .unwrap();
        Arc::new(config)
    }

    #[test]
    fn first_running_service_wins() {
        let services = vec![
            report("a", LadderState::ServiceStopped, false),
            report("b", LadderState::AdapterUp, true),
            report("c", LadderState::DomainResponsive, true),
        ];
        let snapshot = Snapshot::from_reports(services, Vec::new());

        assert_eq!(snapshot.active_service.as_deref(), Some("b"));
        assert_eq!(snapshot.status, ConnectionStatus::Connecting);
    }

    #[test]
    fn no_services_is_disconnected() {
        let snapshot = Snapshot::from_reports(Vec::new(), Vec::new());
        assert_eq!(snapshot.active_service, None);
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    }

    #[test]
    fn all_stopped_is_disconnected() {
        let services = vec![
            report("a", LadderState::ServiceStopped, true),
            report("b", LadderState::ServiceStopped, false),
        ];
        let snapshot = Snapshot::from_reports(services, Vec::new());
        assert_eq!(snapshot.active(), None);
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    }

    #[test]
    fn tick_evaluates_every_service_and_machine() {
        let runner = ScriptedRunner::new()
            .ok("systemctl status --no-pager openvpn@public", "")
            .ok("ifconfig tun0", IFCONFIG_UP)
            .ok("host -W 1 nas.private.lan", "");
        let mut aggregator = ServiceAggregator::new(two_services());

        let snapshot = aggregator.tick(&runner);

        assert_eq!(snapshot.services.len(), 2);
        assert_eq!(snapshot.services[0].state, LadderState::ServiceStopped);
        assert_eq!(snapshot.services[1].state, LadderState::IpAllocated);
        assert_eq!(snapshot.services[1].ip.as_deref(), Some("10.8.0.6"));
        assert_eq!(snapshot.active_service.as_deref(), Some("openvpn@public"));
        assert_eq!(snapshot.status, ConnectionStatus::Connected);
        assert_eq!(snapshot.machines, vec![MachineReport {
            id: "nas".to_string(),
            reachable: false,
        }]);
        // Stopped services never reach their domain; machines are probed regardless.
        assert!(!runner.called("host -W 1 gw.private.lan"));
        assert!(runner.called("ping -c 1 -W 1 nas.private.lan"));

        assert_eq!(aggregator.services()[1].last_known_ip.as_deref(), Some("10.8.0.6"));
        assert!(!aggregator.machines()[0].reachable);
    }

    #[test]
    fn last_known_ip_survives_a_drop() {
        let mut runner = ScriptedRunner::new()
            .ok("systemctl status --no-pager openvpn@public", "")
            .ok("ifconfig tun0", IFCONFIG_UP);
        let mut aggregator = ServiceAggregator::new(two_services());
        aggregator.tick(&runner);

        runner.set("ifconfig tun0", crate::command::CommandOutput::failed(1));
        let snapshot = aggregator.tick(&runner);

        assert_eq!(snapshot.services[1].state, LadderState::ServiceRunning);
        assert_eq!(snapshot.services[1].ip, None);
        assert_eq!(aggregator.services()[1].last_known_ip.as_deref(), Some("10.8.0.6"));
        assert_eq!(snapshot.status, ConnectionStatus::Connecting);
    }
}
