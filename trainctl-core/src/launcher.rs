//! Training launcher — subprocess orchestration.
//!
//! Spawns the training entry point with the assembled argument vector and
//! the device-visibility variable, waits for it, and relays its exit
//! status. Nothing about the run is validated or interpreted here.

use crate::config::{EntryPoint, RunConfig};
use crate::error::LaunchError;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A fully assembled child invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Device-visibility variable name and value set on the child.
    pub device_env: (String, String),
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(entry: &EntryPoint, run: &RunConfig) -> Self {
        let mut args = Vec::new();
        if !entry.script.as_os_str().is_empty() {
            args.push(entry.script.clone().into_os_string());
        }
        args.extend(run.to_args());

        Self {
            program: entry.program(),
            args,
            device_env: (entry.device_env_var.clone(), entry.visible_devices.clone()),
            working_dir: entry.working_dir.clone(),
        }
    }

    /// Build the process command. Stdio is inherited so the framework's own
    /// progress output reaches the terminal untouched.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.env(&self.device_env.0, &self.device_env.1);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    /// Shell-style rendering, e.g. `CUDA_VISIBLE_DEVICES=0 python3 train.py --imgsz 1024 ...`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={} {}",
            self.device_env.0,
            shell_quote(&self.device_env.1),
            shell_quote(&self.program.to_string_lossy())
        )?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,=:@+".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Map a child's exit status to the launcher's exit code.
///
/// A child terminated by a signal reports `128 + signal`, as a shell would.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Launches training runs against one entry point.
#[derive(Debug, Clone)]
pub struct Launcher {
    entry: EntryPoint,
}

impl Launcher {
    pub fn new(entry: EntryPoint) -> Self {
        Self { entry }
    }

    pub fn entry(&self) -> &EntryPoint {
        &self.entry
    }

    pub fn invocation(&self, run: &RunConfig) -> Invocation {
        Invocation::new(&self.entry, run)
    }

    /// Launch a run and block until the child exits.
    ///
    /// Returns the child's exit code unchanged. The only error is failing
    /// to spawn the child at all.
    pub async fn launch(&self, run: &RunConfig) -> Result<i32, LaunchError> {
        let invocation = self.invocation(run);
        info!(
            program = %invocation.program.display(),
            run = %run.name,
            env = %format!("{}={}", invocation.device_env.0, invocation.device_env.1),
            "Launching training run"
        );
        debug!(command = %invocation, "Assembled command line");

        let status = invocation
            .command()
            .status()
            .await
            .map_err(|source| LaunchError::Spawn {
                program: invocation.program.display().to_string(),
                source,
            })?;

        let code = exit_code(status);
        if code == 0 {
            info!(run = %run.name, "Training run exited successfully");
        } else {
            warn!(run = %run.name, code, "Training run exited with failure");
        }
        Ok(code)
    }
}
