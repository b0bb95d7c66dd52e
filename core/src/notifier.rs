//! Change detection between consecutive cycle snapshots.

use log::info;

use crate::aggregator::Snapshot;
use crate::state::{ConnectionStatus, LadderState};

/// One entity whose value differs from the previous cycle, with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Service { id: String, state: LadderState },
    Machine { id: String, reachable: bool },
    Status(ConnectionStatus),
}

/// Events for every entity whose value differs between the two snapshots.
///
/// Services and machines are matched by id, so an entity missing from
/// `previous` counts as changed.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for service in &current.services {
        if previous.service(&service.id).map(|s| s.state) != Some(service.state) {
            events.push(ChangeEvent::Service {
                id: service.id.clone(),
                state: service.state,
            });
        }
    }

    for machine in &current.machines {
        if previous.machine(&machine.id).map(|m| m.reachable) != Some(machine.reachable) {
            events.push(ChangeEvent::Machine {
                id: machine.id.clone(),
                reachable: machine.reachable,
            });
        }
    }

    if previous.status != current.status {
        events.push(ChangeEvent::Status(current.status));
    }

    events
}

/// Events describing every entity of `snapshot`, for the first render.
pub fn initial_events(snapshot: &Snapshot) -> Vec<ChangeEvent> {
    snapshot
        .services
        .iter()
        .map(|s| ChangeEvent::Service {
            id: s.id.clone(),
            state: s.state,
        })
        .chain(snapshot.machines.iter().map(|m| ChangeEvent::Machine {
            id: m.id.clone(),
            reachable: m.reachable,
        }))
        .chain(std::iter::once(ChangeEvent::Status(snapshot.status)))
        .collect()
}

/// Remembers the last snapshot and reports what changed since.
#[derive(Default)]
pub struct ChangeNotifier {
    previous: Option<Snapshot>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    pub fn observe(&mut self, current: &Snapshot) -> Vec<ChangeEvent> {
        let events = match &self.previous {
            Some(previous) => diff(previous, current),
            None => initial_events(current),
        };

        for event in &events {
            match event {
                ChangeEvent::Service { id, state } => {
                    info!("VPN service \"{id}\" state changed to {state}")
                }
                ChangeEvent::Machine { id, reachable } => {
                    let state = if *reachable { "RESPONSIVE" } else { "UNRESPONSIVE" };
                    info!("Device \"{id}\" state changed to {state}")
                }
                ChangeEvent::Status(status) => info!("Connection status changed to {status}"),
            }
        }

        self.previous = Some(current.clone());
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{MachineReport, ServiceReport};

    fn snapshot(services: &[(&str, LadderState)], machines: &[(&str, bool)]) -> Snapshot {
        Snapshot::from_reports(
            services
                .iter()
                .map(|(id, state)| ServiceReport {
                    id: id.to_string(),
                    state: *state,
                    ip: None,
                    has_ping_domain: true,
                })
                .collect(),
            machines
                .iter()
                .map(|(id, reachable)| MachineReport {
                    id: id.to_string(),
                    reachable: *reachable,
                })
                .collect(),
        )
    }

    #[test]
    fn identical_snapshots_emit_nothing() {
        let a = snapshot(&[("vpn", LadderState::DomainKnown)], &[("nas", false)]);
        let b = snapshot(&[("vpn", LadderState::DomainKnown)], &[("nas", false)]);
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn one_event_per_changed_entity() {
        let a = snapshot(
            &[("one", LadderState::ServiceStopped), ("two", LadderState::AdapterUp)],
            &[("nas", false), ("desk", true)],
        );
        let b = snapshot(
            &[("one", LadderState::ServiceStopped), ("two", LadderState::DomainKnown)],
            &[("nas", true), ("desk", true)],
        );

        // "two" stays the active service and stays connecting.
        assert_eq!(diff(&a, &b), vec![
            ChangeEvent::Service {
                id: "two".to_string(),
                state: LadderState::DomainKnown,
            },
            ChangeEvent::Machine {
                id: "nas".to_string(),
                reachable: true,
            },
        ]);
    }

    #[test]
    fn status_change_is_its_own_event() {
        let a = snapshot(&[("vpn", LadderState::ServiceStopped)], &[]);
        let b = snapshot(&[("vpn", LadderState::DomainResponsive)], &[]);

        let events = diff(&a, &b);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ChangeEvent::Status(ConnectionStatus::Connected));
    }

    #[test]
    fn first_observation_reports_everything() {
        let mut notifier = ChangeNotifier::new();
        let first = snapshot(&[("vpn", LadderState::ServiceStopped)], &[("nas", false)]);

        assert_eq!(notifier.observe(&first), vec![
            ChangeEvent::Service {
                id: "vpn".to_string(),
                state: LadderState::ServiceStopped,
            },
            ChangeEvent::Machine {
                id: "nas".to_string(),
                reachable: false,
            },
            ChangeEvent::Status(ConnectionStatus::Disconnected),
        ]);
        assert!(notifier.observe(&first.clone()).is_empty());
    }

    #[test]
    fn unreachable_machine_stays_quiet() {
        let mut notifier = ChangeNotifier::new();
        notifier.observe(&snapshot(&[], &[("nas", false)]));

        let events = notifier.observe(&snapshot(&[], &[("nas", false)]));
        assert!(events.is_empty());
        assert!(notifier.previous().is_some());
    }
}
