// process: upload gate + pipeline, result stored as a new session

use std::path::{Path, PathBuf};

use clap::Args;
use fleetreport_engine::{ColumnConfig, Dataset};
use fleetreport_rules::columns::slv_column_config;
use fleetreport_rules::upload::{check_main_file, check_partner_file};
use fleetreport_rules::{run, City, PartnerMapping};

use crate::session::{Mode, ProcessLock, SessionFile, SessionState, SourceFile, SourceRole};
use crate::{load_rules, CliError};

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Main dispatch export for Saint Petersburg (or the only file in single mode)
    #[arg(long, value_name = "FILE")]
    pub spb: PathBuf,

    /// Partner-fleet file for the SPB orders
    #[arg(long, value_name = "FILE")]
    pub spb_partner: Option<PathBuf>,

    /// Main dispatch export for Moscow (enables two-city mode)
    #[arg(long, value_name = "FILE")]
    pub msk: Option<PathBuf>,

    /// Partner-fleet file for the MSK orders
    #[arg(long, value_name = "FILE", requires = "msk")]
    pub msk_partner: Option<PathBuf>,

    /// Rules file (default: <config dir>/fleetreport/rules.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn import_file(path: &Path) -> Result<Dataset, CliError> {
    if !path.exists() {
        return Err(CliError::io(format!("{}: file not found", path.display())));
    }
    fleetreport_io::import(path).map_err(|e| {
        CliError::parse(format!("{}: {}", path.display(), e)).with_hint(format!(
            "supported formats: {}",
            fleetreport_io::SUPPORTED_EXTENSIONS.join(", ")
        ))
    })
}

fn load_main(path: &Path, city: City, role: SourceRole, sources: &mut Vec<SourceFile>) -> Result<Dataset, CliError> {
    let dataset = import_file(path)?;
    check_main_file(&display_name(path), &dataset, city).map_err(|e| {
        CliError::upload(e).with_hint(format!("expected a dispatch export with {} addresses", city))
    })?;
    sources.push(SourceFile { role, path: path.to_path_buf(), rows: dataset.len() });
    Ok(dataset)
}

fn load_partner(
    path: &Path,
    city: City,
    role: SourceRole,
    sources: &mut Vec<SourceFile>,
) -> Result<PartnerMapping, CliError> {
    let dataset = import_file(path)?;
    check_partner_file(&display_name(path), &dataset, Some(city)).map_err(CliError::upload)?;
    sources.push(SourceFile { role, path: path.to_path_buf(), rows: dataset.len() });

    let mapping = PartnerMapping::from_dataset(&dataset);
    log::info!("{}: {} order -> partner entries", display_name(path), mapping.len());
    Ok(mapping)
}

pub fn cmd_process(args: ProcessArgs, session: &SessionFile) -> Result<(), CliError> {
    let config = load_rules(args.config.as_deref())?;

    let mode = if args.msk.is_some() { Mode::TwoCity } else { Mode::Single };
    if mode == Mode::TwoCity && !config.features.two_city {
        return Err(CliError::args("--msk given but two-city mode is disabled")
            .with_hint("set features.two_city = true in the rules file"));
    }

    let _lock = ProcessLock::acquire(session.path()).map_err(CliError::session)?;

    log::info!("stage 1/4: reading input files");
    let mut sources = Vec::new();
    let spb = load_main(&args.spb, City::Spb, SourceRole::SpbMain, &mut sources)?;
    let msk = match &args.msk {
        Some(path) => Some(load_main(path, City::Msk, SourceRole::MskMain, &mut sources)?),
        None => None,
    };

    let mut partners = Vec::new();
    if let Some(path) = &args.spb_partner {
        partners.push(load_partner(path, City::Spb, SourceRole::SpbPartner, &mut sources)?);
    }
    if let Some(path) = &args.msk_partner {
        partners.push(load_partner(path, City::Msk, SourceRole::MskPartner, &mut sources)?);
    }
    if !partners.is_empty() && !config.features.partner_attribution {
        log::warn!("partner files given but partner attribution is disabled; ignoring them");
    }

    log::info!("stage 2/4: column mapping");
    let mut combined = spb;
    if let Some(msk) = &msk {
        combined.extend_from(msk);
    }
    let columns: Vec<ColumnConfig> = match config.column_config() {
        Some(columns) => columns,
        None if mode == Mode::TwoCity => slv_column_config(combined.headers()),
        None => ColumnConfig::identity(combined.headers()),
    };

    log::info!("stage 3/4: transforming {} rows", combined.len());
    let output = run(&config, &combined, &columns, &partners).map_err(CliError::rules)?;

    log::info!("stage 4/4: saving session");
    let report = output.report.clone();
    let state = SessionState::new(mode, sources, config, output.report, output.dataset);
    session.save(&state).map_err(CliError::session)?;

    println!("processed {} rows", report.rows);
    println!("  sapsan:            {}", report.sapsan);
    println!("  value errors:      {}", report.value_errors);
    println!("  address errors:    {}", report.address_errors);
    println!("  fee adjustments:   {}", report.fee_adjustments);
    println!("  executors filled:  {}", report.executors_inferred);
    println!("  partners assigned: {}", report.partners_attributed);
    println!("session: {}", session.path().display());
    Ok(())
}
