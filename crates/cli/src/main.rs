mod commands;
mod config;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::commands::{CliError, Context};
use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Sustainability manager verification registry.
#[derive(Parser)]
#[command(
    name = "sustain",
    version,
    about = "Sustainability manager verification registry"
)]
struct Cli {
    /// Config file (default: sustain.toml in the working directory, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry state file (overrides config and SUSTAIN_STATE)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Debug-level logging on stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the registry with its owner identity
    Init {
        /// Owner principal
        #[arg(long)]
        owner: String,
    },

    /// Verify a manager (owner only)
    Verify {
        /// Manager principal
        manager: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Organization
        #[arg(long)]
        organization: String,
        /// Certification level
        #[arg(long)]
        level: u32,
        /// Calling principal (default: `caller` from config)
        #[arg(long)]
        caller: Option<String>,
    },

    /// Check whether a manager is currently verified
    Status {
        /// Manager principal
        manager: String,
    },

    /// Show a manager's verification record
    Details {
        /// Manager principal
        manager: String,
    },

    /// Revoke a manager's verification (owner only)
    Revoke {
        /// Manager principal
        manager: String,
        /// Calling principal (default: `caller` from config)
        #[arg(long)]
        caller: Option<String>,
    },

    /// List verification records
    List {
        /// Only active verifications
        #[arg(long, conflicts_with = "revoked")]
        active: bool,
        /// Only revoked verifications
        #[arg(long)]
        revoked: bool,
        /// Maximum number of records (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Show the audit log, optionally for one manager
    History {
        /// Manager principal
        manager: Option<String>,
        /// Maximum number of events (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Hand the owner role to another principal (owner only)
    TransferOwner {
        /// New owner principal
        new_owner: String,
        /// Calling principal (default: `caller` from config)
        #[arg(long)]
        caller: Option<String>,
    },

    /// Verify the audit log hash chain
    Audit,

    /// Start the HTTP JSON API server
    Serve {
        /// Port to listen on (overrides config and SUSTAIN_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let output = cli.output;
    let quiet = cli.quiet;
    if let Err(e) = run(cli) {
        report_error(&e, output, quiet);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config.state = state;
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("failed to create tokio runtime: {}", e)))?;

    if let Commands::Serve { port, bind } = &cli.command {
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(bind) = bind {
            config.server.bind = bind.clone();
        }
    }

    let ctx = Context::open(&config, cli.output, cli.quiet)?;
    rt.block_on(async move {
        match cli.command {
            Commands::Init { owner } => commands::init::cmd_init(&ctx, &owner).await,
            Commands::Verify {
                manager,
                name,
                organization,
                level,
                caller,
            } => {
                let caller = ctx.caller(caller)?;
                commands::verify::cmd_verify(&ctx, &caller, &manager, &name, &organization, level)
                    .await
            }
            Commands::Status { manager } => commands::query::cmd_status(&ctx, &manager).await,
            Commands::Details { manager } => commands::query::cmd_details(&ctx, &manager).await,
            Commands::Revoke { manager, caller } => {
                let caller = ctx.caller(caller)?;
                commands::verify::cmd_revoke(&ctx, &caller, &manager).await
            }
            Commands::List {
                active,
                revoked,
                limit,
            } => commands::query::cmd_list(&ctx, active, revoked, limit).await,
            Commands::History { manager, limit } => {
                commands::audit::cmd_history(&ctx, manager.as_deref(), limit).await
            }
            Commands::TransferOwner { new_owner, caller } => {
                let caller = ctx.caller(caller)?;
                commands::verify::cmd_transfer_owner(&ctx, &caller, &new_owner).await
            }
            Commands::Audit => commands::audit::cmd_audit(&ctx).await,
            Commands::Serve { .. } => serve::start_server(&config.server, ctx.registry)
                .await
                .map_err(|e| CliError::Runtime(format!("server error: {}", e))),
        }
    })
}

/// Log to stderr so stdout stays machine-readable.
///
/// `SUSTAIN_LOG` takes precedence over `RUST_LOG`; without either the level
/// is `info`, `debug` with `--verbose`, `error` with `--quiet`.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env("SUSTAIN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Report an error on stderr in the requested output format.
pub(crate) fn report_error(err: &CliError, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error[{}]: {}", err.code(), err),
        OutputFormat::Json => eprintln!("{}", err.to_json_value()),
    }
}
