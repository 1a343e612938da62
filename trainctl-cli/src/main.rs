//! trainctl CLI — launch training runs for a YOLO-style `train.py`.
//!
//! With no subcommand, launches the configured run exactly as configured.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use trainctl_core::config::{ConfigOverrides, EntryOverrides, RunOverrides};

/// trainctl: launch object-detection training runs
#[derive(Parser, Debug)]
#[command(name = "trainctl", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (merged over workspace and user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Launch a single training run
    Train {
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Launch every trial of the configured grid sweep, one after another
    Sweep {
        /// Continue after a failed trial
        #[arg(long)]
        keep_going: bool,

        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Print the resolved configuration and command line without launching
    Show {
        /// Show the sweep trials instead of the single run
        #[arg(long)]
        sweep: bool,

        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Write the default configuration to `.trainctl/config.toml`
    Init,
}

/// Per-invocation overrides of the configured run.
#[derive(clap::Args, Debug, Default, Clone)]
struct OverrideArgs {
    /// Input resolution for training
    #[arg(long)]
    img_size: Option<u32>,

    /// Samples per optimization step
    #[arg(long)]
    batch_size: Option<u32>,

    /// Passes over the dataset
    #[arg(long)]
    epochs: Option<u32>,

    /// Dataset definition file
    #[arg(long)]
    data: Option<PathBuf>,

    /// Pretrained weights to fine-tune from
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Run name (output subdirectory)
    #[arg(long)]
    name: Option<String>,

    /// Device selector passed to the training framework
    #[arg(long)]
    device: Option<String>,

    /// Value of the device-visibility variable for the child (e.g. "0,1")
    #[arg(long)]
    visible_devices: Option<String>,

    /// Interpreter or executable to launch
    #[arg(long)]
    program: Option<PathBuf>,

    /// Training script passed to the program
    #[arg(long)]
    script: Option<PathBuf>,

    /// Extra arguments appended verbatim (after `--`)
    #[arg(last = true)]
    extra_args: Vec<String>,
}

impl OverrideArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            entry: EntryOverrides {
                program: self.program,
                script: self.script,
                visible_devices: self.visible_devices,
            },
            run: RunOverrides {
                img_size: self.img_size,
                batch_size: self.batch_size,
                epochs: self.epochs,
                data: self.data,
                weights: self.weights,
                name: self.name,
                device: self.device,
                extra_args: (!self.extra_args.is_empty()).then_some(self.extra_args),
            },
        }
    }
}

/// Clamp a child exit code into the range a process can report.
fn clamp_exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "trainctl", "trainctl")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "trainctl.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let command = cli.command.unwrap_or(Commands::Train {
        overrides: OverrideArgs::default(),
    });
    let code = commands::handle_command(command, &workspace, cli.config.as_deref()).await?;
    Ok(ExitCode::from(clamp_exit_code(code)))
}
