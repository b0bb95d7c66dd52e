//! Status values shared by the health checks, the aggregator and the shells.

use std::fmt;
use std::time::Duration;

/// Rungs of a service's health ladder, lowest first.
///
/// The derived ordering is the ladder order, so `state >= LadderState::AdapterUp`
/// reads as "at least the adapter is up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LadderState {
    ServiceStopped,
    ServiceRunning,
    AdapterUp,
    IpAllocated,
    DomainKnown,
    DomainResponsive,
}

impl LadderState {
    pub const ALL: [LadderState; 6] = [
        LadderState::ServiceStopped,
        LadderState::ServiceRunning,
        LadderState::AdapterUp,
        LadderState::IpAllocated,
        LadderState::DomainKnown,
        LadderState::DomainResponsive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LadderState::ServiceStopped => "SERVICE_STOPPED",
            LadderState::ServiceRunning => "SERVICE_RUNNING",
            LadderState::AdapterUp => "ADAPTER_UP",
            LadderState::IpAllocated => "IP_ALLOCATED",
            LadderState::DomainKnown => "DOMAIN_KNOWN",
            LadderState::DomainResponsive => "DOMAIN_RESPONSIVE",
        }
    }
}

impl fmt::Display for LadderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall connectivity, derived from the active service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    /// Derive the status of the active service, if any.
    ///
    /// A service without a ping domain is connected as soon as it has an IP;
    /// one with a ping domain needs the domain to answer.
    pub fn derive(active: Option<(LadderState, bool)>) -> Self {
        let Some((state, has_ping_domain)) = active else {
            return ConnectionStatus::Disconnected;
        };

        let connected = state == LadderState::DomainResponsive
            || (!has_ping_domain && state == LadderState::IpAllocated);

        if connected {
            ConnectionStatus::Connected
        } else if state >= LadderState::ServiceRunning {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often the check cycle repeats. One value per `ConnectionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollInterval {
    Connecting,
    Connected,
    Disconnected,
}

impl PollInterval {
    pub fn for_status(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Connected => PollInterval::Connected,
            ConnectionStatus::Connecting => PollInterval::Connecting,
            ConnectionStatus::Disconnected => PollInterval::Disconnected,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            PollInterval::Connecting => Duration::from_secs(1),
            PollInterval::Connected => Duration::from_secs(30),
            PollInterval::Disconnected => Duration::from_secs(120),
        }
    }
}
