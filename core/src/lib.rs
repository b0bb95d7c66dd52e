pub mod aggregator;
pub mod command;
pub mod config;
pub mod error;
pub mod ladder;
pub mod menu;
pub mod monitor;
pub mod notifier;
pub mod poll;
pub mod state;
pub mod wol;

/// Interfaces that platform shells can implement to adapt the core library
/// without pulling in platform-specific dependencies.
pub mod platform {
    use crate::aggregator::Snapshot;
    use crate::notifier::ChangeEvent;

    /// Trait for tray/menu UI surfaces that render the monitored state.
    ///
    /// Called once per changed entity after each cycle, never during probing.
    pub trait StatePresenter {
        fn on_state_changed(&mut self, change: &ChangeEvent, snapshot: &Snapshot);
    }

    /// Trait for platform-correct config paths.
    pub trait AppPaths {
        fn config_path(&self) -> std::path::PathBuf;
    }
}
