//! arkctl
//!
//! A command-line tool for installing, uninstalling and inspecting biz
//! modules in a running ark container.

mod commands;
mod config;
mod output;

use anyhow::Result;
use ark_client::suggestions::{self, SuggestionSink, TracingSink};
use ark_client::{ArkClient, ArkError};
use clap::{Parser, Subcommand};
use commands::biz::{self, InstallArgs, InstallTypeArg};
use commands::health;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Settings;
use crate::output::{print_error, print_transcript, print_warning, ConsoleSink, OutputFormat};

/// Exit code for a run interrupted with Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// arkctl
#[derive(Parser)]
#[command(name = "arkctl")]
#[command(author, version, about = "Manage biz modules in ark containers", long_about = None)]
pub struct Cli {
    /// Host of the ark container (can also be set via ARKCTL_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Ark API port, 1238 if not configured (can also be set via ARKCTL_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs and suggestions as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a biz module
    Install {
        /// Biz module name
        #[arg(long)]
        name: String,

        /// Biz module version
        #[arg(long = "version")]
        biz_version: String,

        /// Artifact location, a file path or an http(s) URL
        #[arg(long)]
        url: Option<String>,

        /// How the container fetches the artifact (inferred from --url if omitted)
        #[arg(long, value_enum)]
        install_type: Option<InstallTypeArg>,

        /// Directory the container unpacks the module into
        #[arg(long)]
        home_dir: Option<String>,
    },

    /// Uninstall a biz module
    Uninstall {
        /// Biz module name
        #[arg(long)]
        name: String,

        /// Biz module version
        #[arg(long = "version")]
        biz_version: String,
    },

    /// Show all installed biz modules
    Status,

    /// Show health of the base runtime
    Health {
        /// Query a container in a pod (format: namespace/pod or just pod)
        #[arg(long)]
        pod: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let log_json = cli.log_json;
    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err, log_json),
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<()> {
    let settings = Settings::load()?.with_overrides(cli.host, cli.port);
    debug!(?settings, "Resolved configuration");

    let client = ArkClient::with_config(settings.client_config())?;
    let format = cli.format;

    match cli.command {
        Commands::Install {
            name,
            biz_version,
            url,
            install_type,
            home_dir,
        } => {
            let args = InstallArgs {
                name,
                version: biz_version,
                url,
                install_type,
                home_dir,
            };
            biz::install(&client, settings.direct_target(), args, format, cancel).await?;
        }
        Commands::Uninstall { name, biz_version } => {
            biz::uninstall(&client, settings.direct_target(), name, biz_version, format, cancel)
                .await?;
        }
        Commands::Status => {
            biz::status(&client, settings.direct_target(), format, cancel).await?;
        }
        Commands::Health { pod } => {
            let target = match pod {
                Some(pod) => settings.pod_target(&pod)?,
                None => settings.direct_target(),
            };
            health::show_health(&client, target, format, cancel).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(log_json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!log_json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Print the failure and any operator hints for it
fn report_failure(err: &anyhow::Error, log_json: bool) -> ExitCode {
    let ark_error = err.downcast_ref::<ArkError>();
    if ark_error.map(ArkError::is_cancelled).unwrap_or(false) {
        print_warning("Cancelled");
        return ExitCode::from(EXIT_INTERRUPTED);
    }

    let subprocess_output = ark_error.map(ArkError::subprocess_output).unwrap_or_default();
    print_transcript(&subprocess_output);

    let message = format!("{:#}", err);
    print_error(&message);

    let mut console = ConsoleSink;
    let mut tracing_sink = TracingSink;
    let sink: &mut dyn SuggestionSink = if log_json {
        &mut tracing_sink
    } else {
        &mut console
    };
    suggestions::diagnose(Some(&message), &subprocess_output, sink);

    ExitCode::FAILURE
}
