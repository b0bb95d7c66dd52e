//! Configuration loading and management.
//! Uses injected `AppPaths` so platform shells control where files live.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;

use crate::command::CommandTemplate;
use crate::error::ConfigError;
use crate::platform::AppPaths;

/// Commented file written on first run; parses to `Config::default()`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("default_config.toml");

/// One VPN service to watch. Identity is the unit name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub unit_name: String,
    pub adapter_name: String,
    /// Services with a ping domain are only connected once the domain answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_domain: Option<String>,
}

/// One Wake-on-LAN target. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub name: String,
    pub domain: String,
    pub mac: String,
    pub broadcast_address: String,
}

/// Command lines for every probe and action.
///
/// Placeholders: `{unit}`, `{adapter}`, `{domain}`, `{mac}`, `{broadcast}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub service_status: CommandTemplate,
    pub interface_status: CommandTemplate,
    pub resolve: CommandTemplate,
    pub ping: CommandTemplate,
    pub service_start: CommandTemplate,
    pub service_stop: CommandTemplate,
    pub service_restart: CommandTemplate,
    pub wake: CommandTemplate,
    /// Prefix for commands that need elevated privileges.
    pub elevate: CommandTemplate,
    /// Token that starts the second line of `interface_status` output when an
    /// IPv4 address is assigned.
    pub inet_marker: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            service_status: CommandTemplate::from(["systemctl", "status", "--no-pager", "{unit}"]),
            interface_status: CommandTemplate::from(["ifconfig", "{adapter}"]),
            resolve: CommandTemplate::from(["host", "-W", "1", "{domain}"]),
            ping: CommandTemplate::from(["ping", "-c", "1", "-W", "1", "{domain}"]),
            service_start: CommandTemplate::from(["systemctl", "start", "{unit}"]),
            service_stop: CommandTemplate::from(["systemctl", "stop", "{unit}"]),
            service_restart: CommandTemplate::from(["systemctl", "restart", "{unit}"]),
            wake: CommandTemplate::from(["wakeonlan", "-i", "{broadcast}", "{mac}"]),
            elevate: CommandTemplate::from(["pkexec"]),
            inet_marker: "inet addr:".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log to this file instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    /// Declaration order decides which service is active when several run.
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub machines: Vec<MachineConfig>,
}

impl Config {
    /// Load configuration from the provided paths. Writes the commented default
    /// file if missing.
    pub fn load_with(paths: &dyn AppPaths) -> Result<Self, ConfigError> {
        let config_path = paths.config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;
            return Self::parse(DEFAULT_CONFIG_TEMPLATE);
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    /// Save configuration to the provided paths.
    pub fn save_with(&self, paths: &dyn AppPaths) -> Result<(), ConfigError> {
        let config_path = paths.config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut units = HashSet::new();
        for service in &self.services {
            require_non_empty("service unit_name", &service.unit_name)?;
            require_non_empty("service adapter_name", &service.adapter_name)?;
            if !units.insert(service.unit_name.as_str()) {
                return Err(invalid(
                    "service unit_name",
                    format!("'{}' is configured more than once", service.unit_name),
                ));
            }
            if let Some(domain) = &service.ping_domain {
                require_non_empty("service ping_domain", domain)?;
            }
        }

        let mut names = HashSet::new();
        for machine in &self.machines {
            require_non_empty("machine name", &machine.name)?;
            require_non_empty("machine domain", &machine.domain)?;
            require_non_empty("machine mac", &machine.mac)?;
            require_non_empty("machine broadcast_address", &machine.broadcast_address)?;
            if !names.insert(machine.name.as_str()) {
                return Err(invalid(
                    "machine name",
                    format!("'{}' is configured more than once", machine.name),
                ));
            }
        }

        let commands = &self.commands;
        for (field, template) in [
            ("commands.service_status", &commands.service_status),
            ("commands.interface_status", &commands.interface_status),
            ("commands.resolve", &commands.resolve),
            ("commands.ping", &commands.ping),
            ("commands.service_start", &commands.service_start),
            ("commands.service_stop", &commands.service_stop),
            ("commands.service_restart", &commands.service_restart),
            ("commands.wake", &commands.wake),
        ] {
            if template.is_empty() {
                return Err(invalid(field, "command must not be empty".to_string()));
            }
        }
        require_non_empty("commands.inet_marker", &commands.inet_marker)?;

        Ok(())
    }

    pub fn service(&self, unit_name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.unit_name == unit_name)
    }

    pub fn machine(&self, name: &str) -> Option<&MachineConfig> {
        self.machines.iter().find(|m| m.name == name)
    }

    /// Return configured PATH or fall back to current process PATH.
    pub fn get_path(&self) -> String {
        if let Some(path) = &self.path {
            return path.clone();
        }
        std::env::var("PATH").unwrap_or_default()
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty".to_string()));
    }
    Ok(())
}

fn invalid(field: &str, reason: String) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        reason,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            logging: LoggingConfig::default(),
            commands: CommandsConfig::default(),
            services: vec![ServiceConfig {
                name: "OpenVPN client".to_string(),
                unit_name: "openvpn@client".to_string(),
                adapter_name: "tun0".to_string(),
                ping_domain: None,
            }],
            machines: Vec::new(),
        }
    }
}
