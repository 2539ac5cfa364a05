//! Command line interface of the `inject` binary.

use crate::{BUILD_INFO, Injector, Options};
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use color_eyre::eyre::{Result, WrapErr};
use std::io;
use tracing_subscriber::EnvFilter;

/// Command line arguments for `inject`.
///
/// Exactly one key source is required. Without an output format the
/// trailing command is run with the secret's keys in its environment.
#[derive(Parser, Debug)]
#[command(name = "inject", version, disable_version_flag = true)]
#[command(about = "Inject environment variables from Google Cloud Secret Manager", long_about = None)]
pub struct Cli {
    /// Path to a JSON service account key
    #[arg(short = 'k', long)]
    pub key_file: Option<String>,

    /// Base64 encoded JSON service account key
    #[arg(short = 'K', long, env = "INJECTOR_KEY_VALUE", hide_env_values = true)]
    pub key_value: Option<String>,

    /// Print KEY="VALUE" lines
    #[arg(short = 'a', long)]
    pub format_ash: bool,

    /// Print export KEY="VALUE" lines
    #[arg(short = 'b', long)]
    pub format_bash: bool,

    /// Print the secret as indented JSON
    #[arg(short = 'j', long)]
    pub format_json: bool,

    /// Print the secret exactly as stored
    #[arg(short = 'r', long)]
    pub format_raw: bool,

    /// Pass the current environment through to the command
    #[arg(short = 'E', long)]
    pub preserve_env: bool,

    /// Write text output to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output_file: Option<String>,

    /// GCP project id
    #[arg(short = 'p', long, env = "INJECTOR_PROJECT")]
    pub project: Option<String>,

    /// Name of the secret holding the environment document
    #[arg(short = 'S', long, env = "INJECTOR_SECRET_NAME")]
    pub secret_name: Option<String>,

    /// Secret version [default: latest]
    #[arg(short = 'V', long, env = "INJECTOR_SECRET_VERSION")]
    pub secret_version: Option<String>,

    /// Print build information and the resolved options to stderr
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Print version
    #[arg(long, action = ArgAction::Version)]
    version: Option<bool>,

    /// Command and arguments to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        Options {
            key_file: cli.key_file,
            key_value: cli.key_value,
            format_ash: cli.format_ash,
            format_bash: cli.format_bash,
            format_json: cli.format_json,
            format_raw: cli.format_raw,
            preserve_env: cli.preserve_env,
            output_file: cli.output_file,
            project: cli.project,
            secret_name: cli.secret_name,
            secret_version: cli.secret_version,
            debug: cli.debug,
            command: cli.command,
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over `--debug`.
fn init_tracing(debug: bool) {
    let fallback = if debug { "injector=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the `inject` binary.
///
/// Exits with the child's exit code in process injection mode.
pub fn main() -> Result<()> {
    color_eyre::install()?;

    let long_version: &'static str = BUILD_INFO.long_version().leak();
    let matches = Cli::command().long_version(long_version).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    init_tracing(cli.debug);

    let injector = Injector::load(Options::from(cli)).wrap_err("Invalid options")?;
    let code = injector.run().wrap_err("Failed to inject secret")?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
