//! Subcommand implementations.
//!
//! Each command returns `Result<(), CliError>`; `main` turns errors into
//! `error[<code>]: ...` (text) or `{code, message, detail}` (json) on stderr
//! and exit code 1.

pub(crate) mod audit;
pub(crate) mod init;
pub(crate) mod query;
pub(crate) mod verify;

use serde::Serialize;
use sustain_registry::{FileStorage, ManagerRegistry, RegistryError};

use crate::config::{Config, ConfigError};
use crate::OutputFormat;

/// Code reported for usage and configuration errors.
const USAGE_ERROR_CODE: u32 = 104;

/// Code reported when the process itself fails (runtime, server bind).
const RUNTIME_ERROR_CODE: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Runtime(String),
}

impl CliError {
    pub(crate) fn code(&self) -> u32 {
        match self {
            CliError::Registry(e) => e.code(),
            CliError::Config(_) | CliError::Usage(_) => USAGE_ERROR_CODE,
            CliError::Runtime(_) => RUNTIME_ERROR_CODE,
        }
    }

    pub(crate) fn to_json_value(&self) -> serde_json::Value {
        match self {
            CliError::Registry(e) => e.to_json_value(),
            CliError::Config(_) | CliError::Usage(_) => serde_json::json!({
                "code": self.code(),
                "message": "Invalid input",
                "detail": self.to_string(),
            }),
            CliError::Runtime(_) => serde_json::json!({
                "code": self.code(),
                "message": "Runtime error",
                "detail": self.to_string(),
            }),
        }
    }
}

/// Everything a command needs: the opened registry plus output settings.
pub(crate) struct Context {
    pub(crate) registry: ManagerRegistry<FileStorage>,
    pub(crate) output: OutputFormat,
    pub(crate) quiet: bool,
    default_caller: Option<String>,
}

impl Context {
    pub(crate) fn open(
        config: &Config,
        output: OutputFormat,
        quiet: bool,
    ) -> Result<Self, CliError> {
        Ok(Self {
            registry: open_registry(config)?,
            output,
            quiet,
            default_caller: config.caller.clone(),
        })
    }

    /// The `--caller` flag, falling back to `caller` from config.
    pub(crate) fn caller(&self, flag: Option<String>) -> Result<String, CliError> {
        flag.or_else(|| self.default_caller.clone()).ok_or_else(|| {
            CliError::Usage(
                "no caller given: pass --caller or set `caller` in sustain.toml".to_string(),
            )
        })
    }

    /// Print a result: pretty JSON in json mode, otherwise `text` unless quiet.
    pub(crate) fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) {
        match self.output {
            OutputFormat::Json => match serde_json::to_string_pretty(value) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("error serializing output: {}", e),
            },
            OutputFormat::Text => {
                if !self.quiet {
                    println!("{}", text());
                }
            }
        }
    }

    /// Like [`Context::emit`], but the text is printed even with `--quiet`.
    /// Used by queries whose text output is the answer itself.
    pub(crate) fn answer<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) {
        match self.output {
            OutputFormat::Json => self.emit(value, text),
            OutputFormat::Text => println!("{}", text()),
        }
    }
}

/// Open the file-backed registry described by `config`.
pub(crate) fn open_registry(config: &Config) -> Result<ManagerRegistry<FileStorage>, CliError> {
    let storage = FileStorage::open(&config.state).map_err(RegistryError::from)?;
    Ok(ManagerRegistry::new(storage)
        .with_clock(config.clock.build())
        .with_policy(config.policy.clone()))
}
