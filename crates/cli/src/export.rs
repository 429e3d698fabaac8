//! `fleetreport export`: write the grouped report archive.
//!
//! One workbook per partner fleet, bundled in a zip named after the order
//! period. The session is cleared afterwards unless `--keep` is given.

use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use fleetreport_rules::export::{plan_general, plan_grouped};

use crate::session::{ProcessLock, SessionFile, Stage};
use crate::CliError;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory (created if missing)
    #[arg(long, short = 'o', default_value = ".", value_name = "DIR")]
    pub out: PathBuf,

    /// Also include the general workbook (all rows, own columns) in the archive
    #[arg(long)]
    pub general: bool,

    /// Write only the general workbook, as a standalone .xlsx
    #[arg(long, conflicts_with = "general")]
    pub general_only: bool,

    /// Keep the session after exporting
    #[arg(long)]
    pub keep: bool,
}

pub fn cmd_export(args: ExportArgs, session: &SessionFile) -> Result<(), CliError> {
    let _lock = ProcessLock::acquire(session.path()).map_err(CliError::session)?;
    let mut state = session.load().map_err(CliError::session)?;

    if state.dataset.is_empty() {
        log::warn!("session has no rows; the export will be empty");
    }

    std::fs::create_dir_all(&args.out)
        .map_err(|e| CliError::io(format!("{}: {}", args.out.display(), e)))?;

    if args.general_only {
        let sheet = plan_general(&state.dataset);
        let path = args.out.join(&sheet.file_name);
        let result = fleetreport_io::xlsx::export(&sheet, &path).map_err(CliError::io)?;
        println!("wrote {} ({} rows)", path.display(), result.rows_exported);
    } else {
        let plan = plan_grouped(&state.dataset, &state.config);
        let general = args.general.then(|| plan_general(&state.dataset));
        let result = fleetreport_io::archive::write_archive(&plan, general.as_ref(), &args.out)
            .map_err(CliError::io)?;

        println!("{}", plan.title);
        println!("wrote {} ({} rows)", result.path.display(), result.rows_exported);
        for member in &result.members {
            println!("  {}", member);
        }
    }

    if args.keep {
        state.stage = Stage::Exported;
        state.updated_at = Utc::now();
        session.save(&state).map_err(CliError::session)?;
    } else {
        session.clear().map_err(CliError::session)?;
        log::info!("session cleared");
    }
    Ok(())
}
