// Execution of image tool commands

use std::process::Command;

use log::debug;
use serde::Serialize;

use crate::commands::ToolCommand;
use crate::error::ScaleError;

/// Result of one finished command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub command: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    /// Outcome of a command that exited with status 0 and printed nothing
    pub fn succeeded(command: &ToolCommand) -> Self {
        Self {
            command: command.to_string(),
            exit_code: Some(0),
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

pub trait CommandRunner {
    /// Run `command` to completion
    ///
    /// A command that starts but exits unsuccessfully is an `Ok` outcome with
    /// `success == false`; only failing to start it at all is an error.
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutcome, ScaleError>;
}

/// Spawns the image tool directly (no shell) and waits for it
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutcome, ScaleError> {
        let output = Command::new(command.program())
            .args(command.args())
            .output()
            .map_err(|source| ScaleError::Spawn {
                program: command.program().to_string(),
                source,
            })?;

        debug!("`{}` exited with {}", command.program(), output.status);

        Ok(CommandOutcome {
            command: command.to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Records commands instead of running them
#[derive(Debug, Default)]
pub struct DryRunRunner {
    pub commands: Vec<String>,
}

impl CommandRunner for DryRunRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutcome, ScaleError> {
        let outcome = CommandOutcome::succeeded(command);
        self.commands.push(outcome.command.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{FileConversionJob, ImageTool};
    use crate::scaler::MarkerScaler;
    use tagscale_common::ScalerConfig;
    use tempfile::TempDir;

    fn command_for(program: &str, dir: &TempDir) -> ToolCommand {
        let source = dir.path().join("a.png");
        std::fs::write(&source, b"").unwrap();
        MarkerScaler::new(ScalerConfig::default())
            .with_tool(ImageTool::new(program))
            .build_scale_commands(&FileConversionJob::new(source, 2), false)
            .unwrap()
            .commands
            .remove(0)
    }

    #[test]
    fn test_dry_run_records_commands() {
        let dir = TempDir::new().unwrap();
        let command = command_for("convert", &dir);
        let mut runner = DryRunRunner::default();

        let outcome = runner.run(&command).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(runner.commands, vec![command.to_string()]);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let command = command_for("tagscale-no-such-image-tool", &dir);

        let err = ProcessRunner.run(&command).unwrap_err();
        assert!(matches!(err, ScaleError::Spawn { program, .. } if program == "tagscale-no-such-image-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_is_captured() {
        let dir = TempDir::new().unwrap();
        // `false` ignores its arguments and exits 1
        let command = command_for("false", &dir);

        let outcome = ProcessRunner.run(&command).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(1));
    }
}
