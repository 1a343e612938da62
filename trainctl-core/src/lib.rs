//! # trainctl-core — training run launcher
//!
//! Builds the command line for an external object-detection training entry
//! point (a YOLO-style `train.py`), restricts accelerator visibility for the
//! child, launches it, and relays its exit status unchanged.
//!
//! The training framework itself is an opaque collaborator: paths are not
//! checked, failures are not interpreted, nothing is retried.

pub mod args;
pub mod config;
pub mod error;
pub mod launcher;
pub mod sweep;

pub use config::{ConfigOverrides, EntryPoint, LauncherConfig, RunConfig, load_config};
pub use error::LaunchError;
pub use launcher::{Invocation, Launcher};
pub use sweep::{SpawnFailure, SweepConfig, SweepReport, SweepTrial};
