//! Reachability of Wake-on-LAN machines.

use crate::command::{CommandLine, CommandRunner};
use crate::config::{CommandsConfig, MachineConfig};

pub struct WolReachabilityCheck<'a> {
    runner: &'a dyn CommandRunner,
    commands: &'a CommandsConfig,
}

impl<'a> WolReachabilityCheck<'a> {
    pub fn new(runner: &'a dyn CommandRunner, commands: &'a CommandsConfig) -> Self {
        Self { runner, commands }
    }

    /// A machine is reachable when its domain resolves and answers a ping.
    pub fn evaluate(&self, machine: &MachineConfig) -> bool {
        let vars = [("domain", machine.domain.as_str())];
        self.runner.run(&self.commands.resolve.render(&vars)).success
            && self.runner.run(&self.commands.ping.render(&vars)).success
    }
}

/// Build the command that sends the magic packet to `machine`.
pub fn wake_command(commands: &CommandsConfig, machine: &MachineConfig) -> CommandLine {
    commands.wake.render(&[
        ("broadcast", machine.broadcast_address.as_str()),
        ("mac", machine.mac.as_str()),
    ])
}
