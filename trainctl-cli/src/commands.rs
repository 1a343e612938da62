//! CLI subcommand handlers.
//!
//! Each handler returns the process exit code: the child's code for
//! launches, 0 for informational commands.

use crate::Commands;
use std::path::Path;
use tracing::error;
use trainctl_core::config::{self, ConfigOverrides, LauncherConfig};
use trainctl_core::{Invocation, LaunchError, Launcher};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<i32> {
    let load = |overrides: ConfigOverrides| {
        config::load_config(Some(workspace), config_file, Some(&overrides))
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
    };

    match command {
        Commands::Train { overrides } => {
            let config = load(overrides.into_overrides())?;
            handle_train(&config).await
        }
        Commands::Sweep {
            keep_going,
            overrides,
        } => {
            let mut config = load(overrides.into_overrides())?;
            config.sweep.keep_going |= keep_going;
            handle_sweep(&config).await
        }
        Commands::Show { sweep, overrides } => {
            let config = load(overrides.into_overrides())?;
            handle_show(&config, sweep)
        }
        Commands::Init => handle_init(workspace),
    }
}

async fn handle_train(config: &LauncherConfig) -> anyhow::Result<i32> {
    let launcher = Launcher::new(config.entry.clone());
    match launcher.launch(&config.run).await {
        Ok(code) => Ok(code),
        Err(e) => Ok(report_launch_error(e)),
    }
}

async fn handle_sweep(config: &LauncherConfig) -> anyhow::Result<i32> {
    let launcher = Launcher::new(config.entry.clone());
    match config.sweep.run(&launcher, &config.run).await {
        Ok(report) => {
            for result in &report.results {
                println!(
                    "  trial {:>3}  {:<32}  exit {}",
                    result.index, result.name, result.exit_code
                );
            }
            if let Some(failure) = &report.spawn_failure {
                println!(
                    "  trial {:>3}  {:<32}  not started: {}",
                    failure.index, failure.name, failure.message
                );
            }
            if report.skipped > 0 {
                println!("  {} trial(s) skipped after failure", report.skipped);
            }
            Ok(report.exit_code())
        }
        Err(e) => Ok(report_launch_error(e)),
    }
}

/// Log a launcher-owned failure and pick the exit code for it.
fn report_launch_error(e: LaunchError) -> i32 {
    let code = e.exit_code();
    error!(code, "{e}");
    code
}

fn handle_show(config: &LauncherConfig, sweep: bool) -> anyhow::Result<i32> {
    println!("{}", toml::to_string_pretty(config)?);

    if sweep {
        let trials = match config.sweep.trials(&config.run) {
            Ok(trials) => trials,
            Err(e) => return Ok(report_launch_error(e)),
        };
        for trial in trials {
            println!(
                "# trial {} {}",
                trial.index,
                serde_json::to_string(&trial.params)?
            );
            println!("{}", Invocation::new(&config.entry, &trial.run));
        }
    } else {
        println!("{}", Invocation::new(&config.entry, &config.run));
    }
    Ok(0)
}

fn handle_init(workspace: &Path) -> anyhow::Result<i32> {
    let config_path = config::workspace_config_path(workspace);
    if config_path.exists() {
        println!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
        return Ok(0);
    }
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let toml_str = toml::to_string_pretty(&LauncherConfig::default())?;
    std::fs::write(&config_path, &toml_str)?;
    println!(
        "Created default configuration at: {}",
        config_path.display()
    );
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(handle_init(dir.path()).unwrap(), 0);

        let path = config::workspace_config_path(dir.path());
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: LauncherConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, LauncherConfig::default());

        // Second run leaves the file alone.
        std::fs::write(&path, "[run]\nepochs = 1\n").unwrap();
        assert_eq!(handle_init(dir.path()).unwrap(), 0);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[run]\nepochs = 1\n"
        );
    }

    #[test]
    fn test_show_rejects_bad_sweep_without_launching() {
        let mut config = LauncherConfig::default();
        config
            .sweep
            .grid
            .insert("bogus".into(), vec![serde_json::json!(1)]);
        assert_eq!(handle_show(&config, true).unwrap(), 2);
        assert_eq!(handle_show(&config, false).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_spawn_failure_exits_127() {
        let mut config = LauncherConfig::default();
        config.entry.program = "/nonexistent/trainctl-test-python".into();
        config
            .sweep
            .grid
            .insert("epochs".into(), vec![serde_json::json!(1), serde_json::json!(2)]);
        assert_eq!(handle_sweep(&config).await.unwrap(), 127);
    }

    #[tokio::test]
    async fn test_train_spawn_failure_exits_127() {
        let mut config = LauncherConfig::default();
        config.entry.program = "/nonexistent/trainctl-test-python".into();
        assert_eq!(handle_train(&config).await.unwrap(), 127);
    }
}
