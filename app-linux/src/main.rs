//! Linux tray shell for vpn_indicator.
//! Shows VPN connectivity as a status icon with service and Wake-on-LAN actions.

mod logger;
mod menu;
mod paths;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use gtk::glib;
use log::{error, info, warn};
use muda::{MenuEvent, MenuId};
use tray_icon::{Icon, TrayIconBuilder};
use vpn_indicator_core::command::SystemRunner;
use vpn_indicator_core::config::Config;
use vpn_indicator_core::error::ConfigError;
use vpn_indicator_core::menu::MenuModel;
use vpn_indicator_core::monitor::Monitor;
use vpn_indicator_core::platform::AppPaths;
use vpn_indicator_core::poll::IntervalTimer;

use crate::menu::{MenuAction, StatusIcons, TrayPresenter, build_menu};
use crate::paths::LinuxPaths;

fn main() {
    let paths = LinuxPaths;
    let (config, report) = load_config(&paths);

    logger::init_logger(&config.logging);
    info!("starting vpn_indicator (linux tray)");
    report.log();

    gtk::init().expect("failed to init GTK"); // required for tray-icon on Linux

    let config = Arc::new(config);
    let model = MenuModel::new(&config);
    let (menu, handles) = build_menu(&model);
    let icons = build_icons();

    let tray_icon = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_icon(icons.disconnected.clone())
        .with_tooltip("VPN disconnected")
        .build()
        .expect("failed to create tray icon");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("received signal, exiting");
            running.store(false, Ordering::SeqCst);
        })
        .expect("Error setting Ctrl-C handler");
    }

    let runner = SystemRunner::new(config.get_path(), config.commands.elevate.clone());
    let monitor = Monitor::new(config, runner, IntervalTimer::new());

    let mut looper = EventLoop {
        monitor,
        presenter: TrayPresenter::new(model, handles.items, tray_icon, icons),
        actions: handles.actions,
        paths,
        running,
    };

    looper.run();
}

/// What happened while loading the config, logged once the logger is up.
#[derive(Debug)]
enum LoadReport {
    Loaded { services: usize, machines: usize },
    Created(PathBuf),
    Failed(ConfigError),
}

impl LoadReport {
    fn log(&self) {
        match self {
            LoadReport::Loaded { services, machines } => info!(
                "Loaded configuration with {services} services and {machines} machines"
            ),
            LoadReport::Created(path) => {
                info!("Config file not found, wrote default config to {:?}", path)
            }
            LoadReport::Failed(e) => {
                error!("Failed to load configuration: {}", e);
                warn!("Using default configuration");
            }
        }
    }
}

fn load_config(paths: &dyn AppPaths) -> (Config, LoadReport) {
    let config_path = paths.config_path();
    let existed = config_path.exists();

    match Config::load_with(paths) {
        Ok(config) if !existed => (config, LoadReport::Created(config_path)),
        Ok(config) => {
            let report = LoadReport::Loaded {
                services: config.services.len(),
                machines: config.machines.len(),
            };
            (config, report)
        }
        Err(e) => (Config::default(), LoadReport::Failed(e)),
    }
}

struct EventLoop {
    monitor: Monitor<SystemRunner, IntervalTimer>,
    presenter: TrayPresenter,
    actions: HashMap<MenuId, MenuAction>,
    paths: LinuxPaths,
    running: Arc<AtomicBool>,
}

impl EventLoop {
    fn run(&mut self) {
        info!("tray icon ready; running first status check");
        self.monitor.run_cycle(&mut self.presenter);

        while self.running.load(Ordering::SeqCst) {
            // Process menu events (non-blocking)
            while let Ok(event) = MenuEvent::receiver().try_recv() {
                self.handle_menu_event(event.id);
            }

            self.monitor.poll(Instant::now(), &mut self.presenter);

            glib::idle_add_local_once(|| {}); // allow GTK to process pending work
            while gtk::events_pending() {
                gtk::main_iteration_do(false);
            }

            thread::sleep(Duration::from_millis(50));
        }

        info!("exiting event loop");
        self.monitor.stop();
    }

    fn handle_menu_event(&mut self, id: MenuId) {
        let Some(action) = self.actions.get(&id).cloned() else {
            return;
        };

        let result = match action {
            MenuAction::Refresh => {
                self.monitor.run_cycle(&mut self.presenter);
                Ok(())
            }
            MenuAction::Control(unit, service_action) => self
                .monitor
                .control(&unit, service_action, &mut self.presenter)
                .map(|_| ()),
            MenuAction::Wake(name) => self.monitor.wake(&name, &mut self.presenter).map(|_| ()),
            MenuAction::OpenConfig => {
                open_config(&self.paths);
                Ok(())
            }
            MenuAction::Quit => {
                self.running.store(false, Ordering::SeqCst);
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("menu action failed: {e}");
        }
    }
}

fn open_config(paths: &LinuxPaths) {
    let config_path = paths.config_path();
    let parent = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or(config_path);

    info!("opening config folder at {:?}", parent);
    let result = Command::new("xdg-open").arg(&parent).spawn();
    if let Err(e) = result {
        warn!("xdg-open failed: {e}");
    }
}

fn build_icons() -> StatusIcons {
    // Simple 16x16 solid dots; avoid extra assets on Linux
    StatusIcons {
        connected: solid_icon([0x4c, 0xaf, 0x50, 0xff]),    // green
        connecting: solid_icon([0xff, 0x98, 0x00, 0xff]),   // orange
        disconnected: solid_icon([0xe5, 0x39, 0x35, 0xff]), // red
    }
}

fn solid_icon(color: [u8; 4]) -> Icon {
    let (width, height) = (16, 16);
    let mut data = Vec::with_capacity(width * height * 4);
    for _ in 0..(width * height) {
        data.extend_from_slice(&color);
    }
    Icon::from_rgba(data, width as u32, height as u32).expect("failed to build icon")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempPaths(PathBuf);

    impl AppPaths for TempPaths {
        fn config_path(&self) -> PathBuf {
            self.0.clone()
        }
    }

    #[test]
    fn first_run_reports_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = TempPaths(dir.path().join("vpn_indicator").join("config.toml"));

        let (config, report) = load_config(&paths);
        assert_eq!(config, Config::default());
        assert!(matches!(report, LoadReport::Created(ref p) if *p == paths.config_path()));

        let (_, report) = load_config(&paths);
        assert!(matches!(report, LoadReport::Loaded { services: 1, machines: 0 }));
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = TempPaths(dir.path().join("config.toml"));
        std::fs::write(paths.config_path(), "[[services]]\nname = 1\n").unwrap();

        let (config, report) = load_config(&paths);
        assert_eq!(config, Config::default());
        assert!(matches!(report, LoadReport::Failed(ConfigError::Parse(_))));
    }
}
