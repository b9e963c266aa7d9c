// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git binary invocation.
//!
//! All repository work in dotsetup goes through the git binary itself. This
//! module owns the one place where processes are spawned, behind the
//! [`GitCall`] trait, so that the policy layered on top can be exercised
//! without a real git installation.

use std::{
    ffi::{OsStr, OsString},
    process::Command,
};
use tracing::debug;

/// Spawn git with a full argument list.
pub trait GitCall {
    /// Run git attached to the current terminal.
    ///
    /// Output goes straight to the user. Blocks until git exits.
    fn call_interactive(&self, args: &[OsString]) -> Result<()>;

    /// Run git with output captured.
    ///
    /// Returns standard output with trailing newline removed.
    fn call_non_interactive(&self, args: &[OsString]) -> Result<String>;
}

/// Invoke git as a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syscall {
    program: OsString,
}

impl Syscall {
    /// Construct new caller for target git binary.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Git binary being invoked.
    pub fn program(&self) -> &OsStr {
        self.program.as_os_str()
    }
}

impl Default for Syscall {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCall for Syscall {
    fn call_interactive(&self, args: &[OsString]) -> Result<()> {
        debug!("run {:?} {:?}", self.program, args);
        let status = Command::new(&self.program)
            .args(args)
            .spawn()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                program: self.program.clone(),
            })?
            .wait()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                program: self.program.clone(),
            })?;

        if !status.success() {
            return Err(SyscallError::Failed {
                command: render_command(&self.program, args),
                message: format!("exited with {status}"),
            });
        }

        Ok(())
    }

    fn call_non_interactive(&self, args: &[OsString]) -> Result<String> {
        debug!("run {:?} {:?}", self.program, args);
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                program: self.program.clone(),
            })?;
        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

        if !output.status.success() {
            let mut message = String::new();
            if !stdout.trim().is_empty() {
                message.push_str(format!("stdout: {}\n", stdout.trim_end()).as_str());
            }
            if !stderr.trim().is_empty() {
                message.push_str(format!("stderr: {}\n", stderr.trim_end()).as_str());
            }
            if message.is_empty() {
                message = format!("exited with {}", output.status);
            }

            return Err(SyscallError::Failed {
                command: render_command(&self.program, args),
                message: chomp(message),
            });
        }

        if !stderr.trim().is_empty() {
            debug!("{}", stderr.trim_end());
        }

        Ok(chomp(stdout))
    }
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

fn render_command(program: &OsStr, args: &[OsString]) -> String {
    let mut command = program.to_string_lossy().into_owned();
    for arg in args {
        command.push(' ');
        command.push_str(arg.to_string_lossy().as_ref());
    }

    command
}

/// Git invocation error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Git binary could not be started or waited on.
    #[error("failed to run {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: OsString,
    },

    /// Git ran but exited unsuccessfully.
    #[error("command `{command}` failed:\n{message}")]
    Failed { command: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
