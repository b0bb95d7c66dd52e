//! The check cycle: probe everything, diff against the last cycle, notify the
//! presenter, then let the scheduler pick the next interval.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::aggregator::{ServiceAggregator, Snapshot};
use crate::command::CommandRunner;
use crate::config::Config;
use crate::error::CoreError;
use crate::notifier::ChangeNotifier;
use crate::platform::StatePresenter;
use crate::poll::{PollScheduler, Timer};
use crate::wol::wake_command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

pub struct Monitor<R: CommandRunner, T: Timer> {
    config: Arc<Config>,
    runner: R,
    aggregator: ServiceAggregator,
    notifier: ChangeNotifier,
    scheduler: PollScheduler<T>,
}

impl<R: CommandRunner, T: Timer> Monitor<R, T> {
    pub fn new(config: Arc<Config>, runner: R, timer: T) -> Self {
        Self {
            aggregator: ServiceAggregator::new(config.clone()),
            config,
            runner,
            notifier: ChangeNotifier::new(),
            scheduler: PollScheduler::new(timer),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn scheduler(&self) -> &PollScheduler<T> {
        &self.scheduler
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.notifier.previous()
    }

    /// Run one full cycle and return its snapshot.
    pub fn run_cycle(&mut self, presenter: &mut dyn StatePresenter) -> Snapshot {
        debug!("Status refresh at {}", chrono::Local::now().time());

        let snapshot = self.aggregator.tick(&self.runner);
        for change in self.notifier.observe(&snapshot) {
            presenter.on_state_changed(&change, &snapshot);
        }
        self.scheduler.after_cycle(snapshot.status);

        snapshot
    }

    /// Run a cycle if the armed interval has elapsed.
    pub fn poll(&mut self, now: Instant, presenter: &mut dyn StatePresenter) -> Option<Snapshot> {
        if self.scheduler.is_due(now) {
            Some(self.run_cycle(presenter))
        } else {
            None
        }
    }

    /// Start, stop or restart a service with elevated privileges, then re-check.
    ///
    /// A failed command is only logged; the following cycle shows the real state.
    pub fn control(
        &mut self,
        unit_name: &str,
        action: ServiceAction,
        presenter: &mut dyn StatePresenter,
    ) -> Result<Snapshot, CoreError> {
        let service = self
            .config
            .service(unit_name)
            .ok_or_else(|| CoreError::UnknownService(unit_name.to_string()))?;

        let commands = &self.config.commands;
        let template = match action {
            ServiceAction::Start => &commands.service_start,
            ServiceAction::Stop => &commands.service_stop,
            ServiceAction::Restart => &commands.service_restart,
        };
        let command = template
            .render(&[("unit", service.unit_name.as_str())])
            .elevated();

        let outcome = self.runner.run(&command);
        if !outcome.success {
            warn!(
                "{:?} of \"{}\" failed (exit {:?}): {}",
                action,
                service.name,
                outcome.exit_code,
                outcome.stderr.trim()
            );
        }

        Ok(self.run_cycle(presenter))
    }

    /// Send a Wake-on-LAN packet to a machine, then re-check.
    pub fn wake(
        &mut self,
        machine_name: &str,
        presenter: &mut dyn StatePresenter,
    ) -> Result<Snapshot, CoreError> {
        let machine = self
            .config
            .machine(machine_name)
            .ok_or_else(|| CoreError::UnknownMachine(machine_name.to_string()))?;

        info!("Waking \"{}\" ({})", machine.name, machine.mac);
        let outcome = self.runner.run(&wake_command(&self.config.commands, machine));
        if !outcome.success {
            warn!(
                "Waking \"{}\" failed (exit {:?}): {}",
                machine.name,
                outcome.exit_code,
                outcome.stderr.trim()
            );
        }

        Ok(self.run_cycle(presenter))
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::ScriptedRunner;
    use crate::notifier::ChangeEvent;
    use crate::poll::fake::{RecordingTimer, TimerCall};
    use crate::state::{ConnectionStatus, LadderState, PollInterval};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Vec<ChangeEvent>);

    impl StatePresenter for Recorder {
        fn on_state_changed(&mut self, change: &ChangeEvent, _snapshot: &Snapshot) {
            self.0.push(change.clone());
        }
    }

    fn config() -> Arc<Config> {
        Arc::new(
            Config::parse(
                r#"
[commands]
elevate = ["sudo", "-n"]

[[services]]
name = "Office"
unit_name = "openvpn@office"
adapter_name = "tun0"

[[machines]]
name = "nas"
domain = "nas.lan"
mac = "00:AA:00:AA:00:AA"
broadcast_address = "192.168.1.255"
"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn first_cycle_renders_everything_and_arms() {
        let mut monitor = Monitor::new(config(), ScriptedRunner::new(), RecordingTimer::default());
        let mut presenter = Recorder::default();

        let snapshot = monitor.run_cycle(&mut presenter);

        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert_eq!(presenter.0.len(), 3);
        assert_eq!(monitor.scheduler().armed(), Some(PollInterval::Disconnected));
    }

    #[test]
    fn quiet_cycle_neither_notifies_nor_rearms() {
        let mut monitor = Monitor::new(config(), ScriptedRunner::new(), RecordingTimer::default());
        let mut presenter = Recorder::default();
        monitor.run_cycle(&mut presenter);
        presenter.0.clear();

        monitor.run_cycle(&mut presenter);

        assert!(presenter.0.is_empty());
        assert_eq!(monitor.scheduler().timer().calls, vec![TimerCall::Arm(Duration::from_secs(120))]);
    }

    #[test]
    fn poll_only_runs_when_due() {
        let mut monitor = Monitor::new(config(), ScriptedRunner::new(), RecordingTimer::default());
        let mut presenter = Recorder::default();
        monitor.run_cycle(&mut presenter);

        assert!(monitor.poll(Instant::now(), &mut presenter).is_none());
    }

    #[test]
    fn control_runs_elevated_command_then_checks() {
        let mut monitor = Monitor::new(config(), ScriptedRunner::new(), RecordingTimer::default());
        let mut presenter = Recorder::default();

        let snapshot = monitor
            .control("openvpn@office", ServiceAction::Restart, &mut presenter)
            .unwrap();

        let calls = monitor.runner().calls.borrow();
        assert_eq!(calls[0].to_string(), "systemctl restart openvpn@office");
        assert!(calls[0].elevated);
        assert_eq!(calls[1].to_string(), "systemctl status --no-pager openvpn@office");
        assert_eq!(snapshot.services[0].state, LadderState::ServiceStopped);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut monitor = Monitor::new(config(), ScriptedRunner::new(), RecordingTimer::default());
        let mut presenter = Recorder::default();

        assert!(matches!(
            monitor.control("openvpn@nope", ServiceAction::Start, &mut presenter),
            Err(CoreError::UnknownService(_))
        ));
        assert!(matches!(
            monitor.wake("printer", &mut presenter),
            Err(CoreError::UnknownMachine(_))
        ));
        assert!(monitor.runner().calls.borrow().is_empty());
    }

    #[test]
    fn wake_sends_packet_unelevated() {
        let mut monitor = Monitor::new(config(), ScriptedRunner::new(), RecordingTimer::default());
        let mut presenter = Recorder::default();

        monitor.wake("nas", &mut presenter).unwrap();

        let calls = monitor.runner().calls.borrow();
        assert_eq!(calls[0].to_string(), "wakeonlan -i 192.168.1.255 00:AA:00:AA:00:AA");
        assert!(!calls[0].elevated);
    }
}
