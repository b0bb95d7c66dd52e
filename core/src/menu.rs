//! Renderer-independent menu state.
//!
//! Entries live in a stable ordered list with an id index, so shells can keep
//! their own widget per entry and only touch the ones `apply` reports.

use std::collections::HashMap;

use crate::aggregator::Snapshot;
use crate::config::{Config, ServiceConfig};
use crate::notifier::ChangeEvent;
use crate::state::{ConnectionStatus, LadderState};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryId {
    Status,
    Connect(String),
    Disconnect(String),
    Reconnect(String),
    Wake(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub enabled: bool,
}

impl MenuEntry {
    fn new(label: String, enabled: bool) -> Self {
        Self { label, enabled }
    }
}

pub struct MenuModel {
    services: Vec<ServiceConfig>,
    entries: Vec<(EntryId, MenuEntry)>,
    index: HashMap<EntryId, usize>,
}

impl MenuModel {
    pub fn new(config: &Config) -> Self {
        let mut entries = vec![(
            EntryId::Status,
            MenuEntry::new(ConnectionStatus::Disconnected.to_string(), true),
        )];

        for service in &config.services {
            let unit = &service.unit_name;
            entries.push((
                EntryId::Connect(unit.clone()),
                MenuEntry::new(format!("Connect {}", service.name), true),
            ));
            entries.push((
                EntryId::Disconnect(unit.clone()),
                MenuEntry::new(format!("Disconnect {}", service.name), false),
            ));
            entries.push((
                EntryId::Reconnect(unit.clone()),
                MenuEntry::new(format!("Reconnect {}", service.name), false),
            ));
        }

        for machine in &config.machines {
            entries.push((
                EntryId::Wake(machine.name.clone()),
                MenuEntry::new(wake_label(&machine.name, false), true),
            ));
        }

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), i))
            .collect();

        Self {
            services: config.services.clone(),
            entries,
            index,
        }
    }

    pub fn entries(&self) -> &[(EntryId, MenuEntry)] {
        &self.entries
    }

    pub fn get(&self, id: &EntryId) -> Option<&MenuEntry> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    /// Update the entries affected by `change`; returns the ids that changed.
    pub fn apply(&mut self, change: &ChangeEvent, snapshot: &Snapshot) -> Vec<EntryId> {
        let mut touched = Vec::new();

        match change {
            ChangeEvent::Service { id, state } => {
                let running = *state > LadderState::ServiceStopped;
                self.set(EntryId::Connect(id.clone()), None, Some(!running), &mut touched);
                self.set(EntryId::Disconnect(id.clone()), None, Some(running), &mut touched);
                self.set(EntryId::Reconnect(id.clone()), None, Some(running), &mut touched);
            }
            ChangeEvent::Machine { id, reachable } => {
                self.set(
                    EntryId::Wake(id.clone()),
                    Some(wake_label(id, *reachable)),
                    Some(!reachable),
                    &mut touched,
                );
            }
            ChangeEvent::Status(_) => {}
        }

        let title = self.status_title(snapshot);
        self.set(EntryId::Status, Some(title), None, &mut touched);

        touched
    }

    fn set(
        &mut self,
        id: EntryId,
        label: Option<String>,
        enabled: Option<bool>,
        touched: &mut Vec<EntryId>,
    ) {
        let Some(&i) = self.index.get(&id) else {
            return;
        };
        let entry = &mut self.entries[i].1;
        let before = entry.clone();

        if let Some(label) = label {
            entry.label = label;
        }
        if let Some(enabled) = enabled {
            entry.enabled = enabled;
        }

        if *entry != before && !touched.contains(&id) {
            touched.push(id);
        }
    }

    /// Overall status followed by how far the described service got.
    pub fn status_title(&self, snapshot: &Snapshot) -> String {
        let mut title = match snapshot.status {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Disconnected => "Disconnected",
        }
        .to_string();

        let described = snapshot
            .active_service
            .as_deref()
            .and_then(|id| self.services.iter().find(|s| s.unit_name == id))
            .or_else(|| self.services.first());

        match described {
            Some(service) => {
                let report = snapshot.service(&service.unit_name);
                let state = report.map_or(LadderState::ServiceStopped, |r| r.state);
                let ip = report.and_then(|r| r.ip.as_deref());
                title.push('\n');
                title.push_str(&describe_ladder(service, state, ip));
            }
            None => title.push_str("\nNo VPN services configured"),
        }

        title.push_str(&format!(
            "\nLast change at {}",
            snapshot.checked_at.format("%H:%M:%S")
        ));
        title
    }
}

fn wake_label(name: &str, reachable: bool) -> String {
    if reachable {
        format!("{name} is online and responsive")
    } else {
        format!("Wake {name}")
    }
}

/// Human description of the rungs reached, one line per probed component.
pub fn describe_ladder(service: &ServiceConfig, state: LadderState, ip: Option<&str>) -> String {
    let mut lines = Vec::new();

    if state == LadderState::ServiceStopped {
        lines.push(format!("Service {} stopped", service.unit_name));
        return lines.join("\n");
    }
    lines.push(format!("Service {} running", service.unit_name));

    let adapter = &service.adapter_name;
    match state {
        LadderState::ServiceRunning => lines.push(format!("Adapter {adapter} down")),
        LadderState::AdapterUp => lines.push(format!("Adapter {adapter} up but no IP is assigned")),
        _ => lines.push(format!(
            "Adapter {adapter} up with IP {} assigned",
            ip.unwrap_or("?")
        )),
    }

    if let Some(domain) = &service.ping_domain {
        match state {
            LadderState::IpAllocated => lines.push(format!("Domain {domain} unknown")),
            LadderState::DomainKnown => {
                lines.push(format!("Domain {domain} known but not responsive"))
            }
            LadderState::DomainResponsive => {
                lines.push(format!("Domain {domain} known and responsive"))
            }
            _ => {}
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{MachineReport, ServiceReport};

    fn config() -> Config {
        Config::parse(
            r#"
[[services]]
name = "Office"
unit_name = "openvpn@office"
adapter_name = "tap0"
ping_domain = "gw.office.lan"

[[machines]]
name = "nas"
domain = "nas.office.lan"
mac = "00:AA:00:AA:00:AA"
broadcast_address = "192.168.1.255"
"#,
        )
        .unwrap()
    }

    fn snapshot(state: LadderState, ip: Option<&str>, nas: bool) -> Snapshot {
        Snapshot::from_reports(
            vec![ServiceReport {
                id: "openvpn@office".to_string(),
                state,
                ip: ip.map(str::to_string),
                has_ping_domain: true,
            }],
            vec![MachineReport {
                id: "nas".to_string(),
                reachable: nas,
            }],
        )
    }

    #[test]
    fn entries_keep_config_order() {
        let model = MenuModel::new(&config());
        let ids: Vec<_> = model.entries().iter().map(|(id, _)| id.clone()).collect();

        assert_eq!(ids, vec![
            EntryId::Status,
            EntryId::Connect("openvpn@office".to_string()),
            EntryId::Disconnect("openvpn@office".to_string()),
            EntryId::Reconnect("openvpn@office".to_string()),
            EntryId::Wake("nas".to_string()),
        ]);
        assert!(model.get(&EntryId::Connect("openvpn@office".to_string())).unwrap().enabled);
        assert!(!model.get(&EntryId::Disconnect("openvpn@office".to_string())).unwrap().enabled);
    }

    #[test]
    fn running_service_swaps_connect_for_disconnect() {
        let mut model = MenuModel::new(&config());
        let snap = snapshot(LadderState::AdapterUp, None, false);
        let change = ChangeEvent::Service {
            id: "openvpn@office".to_string(),
            state: LadderState::AdapterUp,
        };

        let touched = model.apply(&change, &snap);

        assert!(touched.contains(&EntryId::Connect("openvpn@office".to_string())));
        assert!(touched.contains(&EntryId::Disconnect("openvpn@office".to_string())));
        assert!(touched.contains(&EntryId::Status));
        assert!(!model.get(&EntryId::Connect("openvpn@office".to_string())).unwrap().enabled);
        assert!(model.get(&EntryId::Reconnect("openvpn@office".to_string())).unwrap().enabled);
    }

    #[test]
    fn reachable_machine_is_relabelled() {
        let mut model = MenuModel::new(&config());
        let snap = snapshot(LadderState::ServiceStopped, None, true);
        let change = ChangeEvent::Machine {
            id: "nas".to_string(),
            reachable: true,
        };

        model.apply(&change, &snap);

        let wake = model.get(&EntryId::Wake("nas".to_string())).unwrap();
        assert_eq!(wake.label, "nas is online and responsive");
        assert!(!wake.enabled);
    }

    #[test]
    fn title_describes_ladder() {
        let model = MenuModel::new(&config());
        let title = model.status_title(&snapshot(LadderState::DomainKnown, Some("10.8.0.6"), false));

        let lines: Vec<_> = title.lines().collect();
        assert_eq!(lines[0], "Connecting...");
        assert_eq!(lines[1], "Service openvpn@office running");
        assert_eq!(lines[2], "Adapter tap0 up with IP 10.8.0.6 assigned");
        assert_eq!(lines[3], "Domain gw.office.lan known but not responsive");
        assert!(lines[4].starts_with("Last change at "));
    }

    #[test]
    fn title_for_stopped_service() {
        let model = MenuModel::new(&config());
        let title = model.status_title(&snapshot(LadderState::ServiceStopped, None, false));
        assert!(title.starts_with("Disconnected\nService openvpn@office stopped\n"));
    }

    #[test]
    fn domainless_description_ends_at_adapter() {
        let service = ServiceConfig {
            name: "Public".to_string(),
            unit_name: "openvpn@public".to_string(),
            adapter_name: "tun0".to_string(),
            ping_domain: None,
        };
        assert_eq!(
            describe_ladder(&service, LadderState::IpAllocated, Some("10.9.0.2")),
            "Service openvpn@public running\nAdapter tun0 up with IP 10.9.0.2 assigned"
        );
    }
}
