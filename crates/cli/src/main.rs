// fleetreport CLI - ride-dispatch report processing
//
// process -> preview/edit -> export, with the state carried between
// invocations in a session file.

mod exit_codes;
mod export;
mod preview;
mod process;
mod session;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fleetreport_engine::{Grid, GridError};
use fleetreport_rules::{RulesConfig, RulesError};

use exit_codes::{
    EXIT_ERROR, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_UPLOAD_REJECTED, EXIT_USAGE, session_exit_code,
};
use session::{ProcessLock, SessionFile, SessionStore};

#[derive(Parser)]
#[command(name = "fleetreport")]
#[command(about = "Ride-dispatch report processor: clean, reconcile and export partner reports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Session file (default: <cache dir>/fleetreport/session.json)
    #[arg(long, global = true, env = "FLEETREPORT_SESSION", value_name = "PATH")]
    session: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read dispatch exports, run the pipeline and start a session
    #[command(after_help = "\
Examples:
  fleetreport process --spb orders.xlsx
  fleetreport process --spb spb.xlsx --spb-partner spb_parks.xlsx --msk msk.csv --msk-partner msk_parks.xlsx
  fleetreport process --spb orders.csv --config rules.toml")]
    Process(process::ProcessArgs),

    /// Show the processed rows (sorted/filtered view)
    #[command(after_help = "\
Examples:
  fleetreport preview
  fleetreport preview --sort 'Стоимость' --sort 'Стоимость'
  fleetreport preview --filter 'Стоимость:greaterThan:1000'
  fleetreport preview --filter 'Исполнитель:equals:Яндекс|Вили' --json
  fleetreport preview --unique 'Парк партнёр'")]
    Preview(preview::PreviewArgs),

    /// Overwrite one cell in the session dataset
    #[command(after_help = "\
Examples:
  fleetreport edit --row 3 --column 'Стоимость' --value 2500
  fleetreport edit --row 0 --column 'Комментарий' --value ''")]
    Edit {
        /// Data row index (the `#` column of `preview`)
        #[arg(long)]
        row: usize,

        /// Column header
        #[arg(long)]
        column: String,

        /// New value (numbers are parsed in financial columns)
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },

    /// Write the grouped report archive
    #[command(after_help = "\
Examples:
  fleetreport export --out reports/
  fleetreport export --general --keep")]
    Export(export::ExportArgs),

    /// Validate a rules file and print the effective configuration
    Config {
        /// Rules file (default: <config dir>/fleetreport/rules.toml when present)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
            "\nsession: v1",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
            "\nsession: v1",
        )
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match session_file(cli.session) {
        Err(e) => Err(e),
        Ok(session) => match cli.command {
            Commands::Process(args) => process::cmd_process(args, &session),
            Commands::Preview(args) => preview::cmd_preview(args, &session),
            Commands::Edit { row, column, value } => cmd_edit(&session, row, &column, &value),
            Commands::Export(args) => export::cmd_export(args, &session),
            Commands::Config { config } => cmd_config(config.as_deref()),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn upload(err: fleetreport_rules::UploadError) -> Self {
        Self { code: EXIT_UPLOAD_REJECTED, message: err.to_string(), hint: None }
    }

    /// Create error from session error with proper exit code.
    pub fn session(err: session::SessionError) -> Self {
        let code = session_exit_code(&err);
        let hint = match &err {
            session::SessionError::NotFound(_) => Some("run `fleetreport process` first".to_string()),
            session::SessionError::Busy(lock) => Some(format!(
                "wait for the other run to finish, or remove {} if it crashed",
                lock.display()
            )),
            session::SessionError::Version { .. } => {
                Some("re-run `fleetreport process` to rebuild the session".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn rules(err: RulesError) -> Self {
        match err {
            RulesError::Io(msg) => Self::io(msg),
            other => Self::args(other.to_string()),
        }
    }

    pub fn grid(err: GridError, headers: &[String]) -> Self {
        match err {
            GridError::UnknownColumn(_) => {
                Self::args(err.to_string()).with_hint(format!("columns: {}", headers.join(", ")))
            }
            GridError::Dataset(_) => Self::args(err.to_string()),
            GridError::Store(_) => Self::io(err.to_string()),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn session_file(explicit: Option<PathBuf>) -> Result<SessionFile, CliError> {
    explicit
        .or_else(session::default_session_path)
        .map(SessionFile::new)
        .ok_or_else(|| {
            CliError::args("cannot determine a cache directory for the session file")
                .with_hint("pass --session <PATH> or set FLEETREPORT_SESSION")
        })
}

fn default_rules_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fleetreport").join("rules.toml"))
}

/// Rules from an explicit file, else the per-user file when present, else defaults
pub fn load_rules(explicit: Option<&Path>) -> Result<RulesConfig, CliError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_rules_path().filter(|p| p.exists()),
    };
    match path {
        Some(path) => {
            log::debug!("rules from {}", path.display());
            RulesConfig::load(&path)
                .map_err(|e| CliError::rules(e).with_hint(format!("check {}", path.display())))
        }
        None => Ok(RulesConfig::default()),
    }
}

// ============================================================================
// edit
// ============================================================================

fn cmd_edit(session: &SessionFile, row: usize, column: &str, value: &str) -> Result<(), CliError> {
    let _lock = ProcessLock::acquire(session.path()).map_err(CliError::session)?;
    let state = session.load().map_err(CliError::session)?;

    let dataset = state.dataset.clone();
    let store = SessionStore::new(session.clone(), state);
    let mut grid = Grid::new(dataset).with_store(Box::new(store));

    let previous = grid
        .edit_cell(row, column, value)
        .map_err(|e| CliError::grid(e, grid.headers()))?;

    let current = grid.dataset().row(row).map(|r| r.text(column)).unwrap_or_default();
    println!("row {}, {}: '{}' -> '{}'", row, column, previous.display(), current);
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_rules(path)?;
    let text = config.to_toml().map_err(|e| CliError::general(e.to_string()))?;
    print!("{}", text);
    Ok(())
}
