//! Grid sweeps over run-configuration fields.
//!
//! A sweep expands a base [`RunConfig`] into one trial per combination of
//! the grid values and launches the trials one after another.

use crate::config::RunConfig;
use crate::error::LaunchError;
use crate::launcher::Launcher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Sweep configuration, the `[sweep]` table.
///
/// ```toml
/// [sweep]
/// keep_going = false
///
/// [sweep.grid]
/// batch_size = [8, 16]
/// epochs = [100, 300]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Run field name to candidate values.
    #[serde(default)]
    pub grid: BTreeMap<String, Vec<serde_json::Value>>,
    /// Continue with the remaining trials after a failed one.
    #[serde(default)]
    pub keep_going: bool,
}

/// A single sweep trial.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTrial {
    pub index: usize,
    pub params: BTreeMap<String, serde_json::Value>,
    pub run: RunConfig,
}

/// Outcome of one launched trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialResult {
    pub index: usize,
    pub name: String,
    pub exit_code: i32,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub results: Vec<TrialResult>,
    /// Trials generated but not launched because an earlier one failed.
    pub skipped: usize,
    /// Set when a trial could not be spawned; the sweep stops there.
    pub spawn_failure: Option<SpawnFailure>,
}

/// A trial whose process never started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnFailure {
    pub index: usize,
    pub name: String,
    pub message: String,
    pub exit_code: i32,
}

impl SweepReport {
    /// First non-zero trial exit code, then the spawn failure's code, or 0.
    pub fn exit_code(&self) -> i32 {
        self.results
            .iter()
            .map(|r| r.exit_code)
            .find(|&c| c != 0)
            .or_else(|| self.spawn_failure.as_ref().map(|f| f.exit_code))
            .unwrap_or(0)
    }
}

impl SweepConfig {
    /// Expand the grid against `base`.
    ///
    /// Keys combine in sorted order, values in the order given. Each trial's
    /// `name` is suffixed with its index. An empty grid yields `base` as the
    /// only trial, unchanged.
    pub fn trials(&self, base: &RunConfig) -> Result<Vec<SweepTrial>, LaunchError> {
        if self.grid.is_empty() {
            return Ok(vec![SweepTrial {
                index: 0,
                params: BTreeMap::new(),
                run: base.clone(),
            }]);
        }

        let base_value = serde_json::to_value(base)?;
        let base_fields = base_value
            .as_object()
            .ok_or_else(|| LaunchError::sweep("run config is not a table"))?;

        for (key, values) in &self.grid {
            if key == "name" {
                return Err(LaunchError::sweep(
                    "'name' cannot be swept; trial names are derived from it",
                ));
            }
            if !base_fields.contains_key(key) {
                return Err(LaunchError::sweep(format!("unknown run field '{key}'")));
            }
            if values.is_empty() {
                return Err(LaunchError::sweep(format!("no values given for '{key}'")));
            }
        }

        let mut combos = vec![BTreeMap::new()];
        for (key, values) in &self.grid {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut c = combo.clone();
                    c.insert(key.clone(), value.clone());
                    next.push(c);
                }
            }
            combos = next;
        }

        combos
            .into_iter()
            .enumerate()
            .map(|(index, params)| -> Result<SweepTrial, LaunchError> {
                let mut fields = base_fields.clone();
                for (key, value) in &params {
                    fields.insert(key.clone(), value.clone());
                }
                let mut run: RunConfig = serde_json::from_value(serde_json::Value::Object(fields))
                    .map_err(|e| LaunchError::sweep(format!("trial {index}: {e}")))?;
                run.name = format!("{}-{}", base.name, index);
                Ok(SweepTrial { index, params, run })
            })
            .collect()
    }

    /// Expand the grid and launch every trial in order.
    ///
    /// Stops at the first non-zero exit unless `keep_going`. A spawn failure
    /// stops the sweep regardless and is recorded in the report alongside
    /// the trials that already ran.
    pub async fn run(
        &self,
        launcher: &Launcher,
        base: &RunConfig,
    ) -> Result<SweepReport, LaunchError> {
        let trials = self.trials(base)?;
        let total = trials.len();
        info!(trials = total, "Starting sweep");

        let mut report = SweepReport::default();
        for trial in trials {
            info!(
                trial = trial.index,
                total,
                params = %serde_json::to_string(&trial.params)?,
                "Launching sweep trial"
            );
            let exit_code = match launcher.launch(&trial.run).await {
                Ok(code) => code,
                Err(e) => {
                    report.skipped = total - report.results.len() - 1;
                    error!(
                        trial = trial.index,
                        completed = report.results.len(),
                        skipped = report.skipped,
                        "Sweep aborted: {e}"
                    );
                    report.spawn_failure = Some(SpawnFailure {
                        index: trial.index,
                        name: trial.run.name.clone(),
                        message: e.to_string(),
                        exit_code: e.exit_code(),
                    });
                    break;
                }
            };
            info!(trial = trial.index, exit_code, "Sweep trial finished");
            report.results.push(TrialResult {
                index: trial.index,
                name: trial.run.name.clone(),
                exit_code,
            });

            if exit_code != 0 && !self.keep_going {
                report.skipped = total - report.results.len();
                warn!(
                    trial = trial.index,
                    exit_code,
                    skipped = report.skipped,
                    "Sweep stopped after failed trial"
                );
                break;
            }
        }

        info!(
            launched = report.results.len(),
            failed = report.results.iter().filter(|r| r.exit_code != 0).count(),
            "Sweep finished"
        );
        Ok(report)
    }
}
