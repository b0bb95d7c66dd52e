//! Running external probe and action commands.
//! Every status check is an external command whose exit status decides the outcome.

use std::fmt;
use std::process::{Command, Stdio};

use log::debug;
use serde::{Deserialize, Serialize};

/// An argv list with `{name}` placeholders, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    pub fn new(argv: Vec<String>) -> Self {
        Self(argv)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn argv(&self) -> &[String] {
        &self.0
    }

    /// Substitute `{name}` placeholders in every argument.
    pub fn render(&self, vars: &[(&str, &str)]) -> CommandLine {
        let mut argv = self.0.iter().map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
        });

        CommandLine {
            program: argv.next().unwrap_or_default(),
            args: argv.collect(),
            elevated: false,
        }
    }
}

impl<const N: usize> From<[&str; N]> for CommandTemplate {
    fn from(argv: [&str; N]) -> Self {
        Self(argv.iter().map(|s| s.to_string()).collect())
    }
}

/// A concrete command ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    /// Run through the configured privilege-elevation helper.
    pub elevated: bool,
}

impl CommandLine {
    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process could not be started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: String::new(),
            success: false,
        }
    }
}

/// Executes commands on behalf of the health checks and menu actions.
///
/// Implementations never fail: anything that prevents the command from
/// completing successfully is reported as `success == false`.
pub trait CommandRunner {
    fn run(&self, command: &CommandLine) -> CommandOutput;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandLine) -> CommandOutput {
        (**self).run(command)
    }
}

/// Runs commands as child processes and waits for them to exit.
pub struct SystemRunner {
    env_path: String,
    elevate: CommandTemplate,
}

impl SystemRunner {
    pub fn new(env_path: String, elevate: CommandTemplate) -> Self {
        Self { env_path, elevate }
    }

    fn argv_for(&self, command: &CommandLine) -> (String, Vec<String>) {
        if !command.elevated || self.elevate.is_empty() {
            return (command.program.clone(), command.args.clone());
        }

        let helper = self.elevate.argv();
        let mut args: Vec<String> = helper[1..].to_vec();
        args.push(command.program.clone());
        args.extend(command.args.iter().cloned());
        (helper[0].clone(), args)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> CommandOutput {
        let (program, args) = self.argv_for(command);

        let result = Command::new(&program)
            .args(&args)
            .env("PATH", &self.env_path)
            .stdin(Stdio::null())
            .output();

        match result {
            Ok(output) => {
                let outcome = CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    success: output.status.success(),
                };
                if outcome.success {
                    debug!("Executed \"{}\" successfully:\n{}", command, outcome.stdout);
                } else {
                    debug!(
                        "Error executing \"{}\" (exit {:?})\n{}",
                        command, outcome.exit_code, outcome.stderr
                    );
                }
                outcome
            }
            Err(e) => {
                debug!("Failed to start \"{}\": {}", command, e);
                CommandOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    success: false,
                }
            }
        }
    }
}
