//! Configuration system for trainctl.
//!
//! Uses `figment` for layered configuration: defaults -> config files ->
//! environment -> CLI overrides. Configuration is loaded from
//! `~/.config/trainctl/config.toml`, `.trainctl/config.toml` in the
//! workspace directory, and an optional explicit file.
//!
//! The built-in defaults are the literal values of the stock fine-tuning
//! run, so a bare `trainctl` launches exactly that run.

use crate::error::LaunchError;
use crate::sweep::SweepConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Top-level launcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// How the training entry point is started.
    #[serde(default)]
    pub entry: EntryPoint,
    /// Options handed to the training entry point.
    #[serde(default)]
    pub run: RunConfig,
    /// Grid sweep over `run` fields.
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// The external training entry point and the environment it is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Interpreter or executable to spawn.
    #[serde(default = "default_program", deserialize_with = "lenient_path")]
    pub program: PathBuf,
    /// Virtual environment whose interpreter replaces `program` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venv: Option<PathBuf>,
    /// Script passed as the first argument. Omitted when empty.
    #[serde(default = "default_script", deserialize_with = "lenient_path")]
    pub script: PathBuf,
    /// Working directory for the child. Inherited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Environment variable that restricts accelerator visibility.
    #[serde(default = "default_device_env_var", deserialize_with = "lenient_string")]
    pub device_env_var: String,
    /// Value assigned to `device_env_var` in the child's environment.
    #[serde(
        default = "default_visible_devices",
        deserialize_with = "lenient_string"
    )]
    pub visible_devices: String,
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self {
            program: default_program(),
            venv: None,
            script: default_script(),
            working_dir: None,
            device_env_var: default_device_env_var(),
            visible_devices: default_visible_devices(),
        }
    }
}

impl EntryPoint {
    /// The effective program, accounting for `venv`.
    pub fn program(&self) -> PathBuf {
        if let Some(venv) = &self.venv {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.program.clone()
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("python3")
}

fn default_script() -> PathBuf {
    PathBuf::from("train.py")
}

fn default_device_env_var() -> String {
    "CUDA_VISIBLE_DEVICES".to_string()
}

fn default_visible_devices() -> String {
    "0".to_string()
}

/// Option table passed to the training entry point.
///
/// Paths are forwarded as given; whether they exist is the training
/// framework's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Input resolution for training.
    #[serde(default = "default_img_size")]
    pub img_size: u32,
    /// Samples per optimization step.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Passes over the dataset.
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    /// Dataset and class definition file.
    #[serde(default = "default_data", deserialize_with = "lenient_path")]
    pub data: PathBuf,
    /// Pretrained checkpoint to fine-tune from.
    #[serde(default = "default_weights", deserialize_with = "lenient_path")]
    pub weights: PathBuf,
    /// Root for run artifacts.
    #[serde(default = "default_project", deserialize_with = "lenient_path")]
    pub project: PathBuf,
    /// Subdirectory of `project` for this run.
    #[serde(default = "default_name", deserialize_with = "lenient_string")]
    pub name: String,
    /// Allow reusing an existing output directory.
    #[serde(default = "default_true")]
    pub exist_ok: bool,
    /// Accelerator index the framework binds to.
    #[serde(default = "default_device", deserialize_with = "lenient_string")]
    pub device: String,
    /// Training hyperparameter overrides.
    #[serde(default = "default_hyp", deserialize_with = "lenient_path")]
    pub hyp: PathBuf,
    /// Model architecture definition.
    #[serde(default = "default_cfg", deserialize_with = "lenient_path")]
    pub cfg: PathBuf,
    /// Appended verbatim after the option table.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            img_size: default_img_size(),
            batch_size: default_batch_size(),
            epochs: default_epochs(),
            data: default_data(),
            weights: default_weights(),
            project: default_project(),
            name: default_name(),
            exist_ok: true,
            device: default_device(),
            hyp: default_hyp(),
            cfg: default_cfg(),
            extra_args: Vec::new(),
        }
    }
}

fn default_img_size() -> u32 {
    1024
}

fn default_batch_size() -> u32 {
    8
}

fn default_epochs() -> u32 {
    300
}

fn default_data() -> PathBuf {
    PathBuf::from("data/DOTA_ROTATED.yaml")
}

fn default_weights() -> PathBuf {
    PathBuf::from("weights/yolov5s.pt")
}

fn default_project() -> PathBuf {
    PathBuf::from("runs/train")
}

fn default_name() -> String {
    "yolov5s_DOTA".to_string()
}

fn default_true() -> bool {
    true
}

fn default_device() -> String {
    "0".to_string()
}

fn default_hyp() -> PathBuf {
    PathBuf::from("data/hyps/obb/hyp.finetune_dota.yaml")
}

fn default_cfg() -> PathBuf {
    PathBuf::from("models/yolov5s.yaml")
}

/// Env vars and TOML hand over typed scalars: a device `0`, a run named
/// `2024`, a weights file called `true`. All of them are taken as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Bool(bool),
        Int(i64),
        UInt(u64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Bool(b) => b.to_string(),
        Raw::Int(n) => n.to_string(),
        Raw::UInt(n) => n.to_string(),
        Raw::Float(x) => x.to_string(),
    })
}

fn lenient_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(PathBuf::from)
}

/// Values set on the command line. Only fields that are `Some` override
/// the lower layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    pub entry: EntryOverrides,
    pub run: RunOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EntryOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_devices: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epochs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Vec<String>>,
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "trainctl", "trainctl")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".trainctl").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (CLI flags)
/// 2. Environment variables (prefixed with `TRAINCTL_`)
/// 3. Explicit config file (`--config`)
/// 4. Workspace-local config (`.trainctl/config.toml`)
/// 5. User config (`~/.config/trainctl/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<LauncherConfig, LaunchError> {
    let mut figment = Figment::from(Serialized::defaults(LauncherConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // An explicit file that is missing is an error, not a silent no-op.
    if let Some(file) = config_file {
        if !file.exists() {
            return Err(LaunchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", file.display()),
            )));
        }
        figment = figment.merge(Toml::file(file));
    }

    // TRAINCTL_RUN__EPOCHS, TRAINCTL_ENTRY__VISIBLE_DEVICES, etc.
    figment = figment.merge(Env::prefixed("TRAINCTL_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    Ok(figment.extract()?)
}
