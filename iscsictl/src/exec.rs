use std::io;
use std::process::Command;

use anyhow::Result;

use crate::IscsiError;

/// Outcome of a command that was started successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// exit status, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Execution {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an argument vector and waits for it to finish.
///
/// A process that exits non-zero is still `Ok`; only a failure to start
/// the process is an error.
pub trait Executor {
    fn execute(&self, argv: &[String]) -> Result<Execution>;
}

impl<F> Executor for F
where
    F: Fn(&[String]) -> Result<Execution>,
{
    fn execute(&self, argv: &[String]) -> Result<Execution> {
        self(argv)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&self, argv: &[String]) -> Result<Execution> {
        let command = argv.join(" ");
        let (program, args) = argv.split_first().ok_or_else(|| IscsiError::Spawn {
            command: command.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| IscsiError::Spawn { command, source })?;

        Ok(Execution {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
