// preview: grid view of the session dataset

use std::io::{self, Write};

use clap::Args;
use fleetreport_engine::{FilterCondition, FilterKind, Grid, Row, RowFlags};
use fleetreport_rules::export::{date_range, report_period_title};
use serde_json::{json, Map, Value};

use crate::session::SessionFile;
use crate::CliError;

/// Cells wider than this are cut in the table view
const MAX_CELL_WIDTH: usize = 40;

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Sort by column; repeat the same column to toggle descending. Repeatable.
    #[arg(long, value_name = "COLUMN")]
    pub sort: Vec<String>,

    /// Filter 'COLUMN:KIND:VALUE' (contains, equals, startsWith, endsWith,
    /// greaterThan, lessThan; equals accepts 'a|b|c'). Repeatable, AND-combined.
    #[arg(long, value_name = "SPEC")]
    pub filter: Vec<String>,

    /// List distinct values of a column with counts instead of rows
    #[arg(long, value_name = "COLUMN", conflicts_with = "json")]
    pub unique: Option<String>,

    /// Show at most N rows
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse `COLUMN:KIND:VALUE`; the value may itself contain `:`
pub fn parse_filter(spec: &str) -> Result<(String, FilterCondition), CliError> {
    let mut parts = spec.splitn(3, ':');
    let (Some(column), Some(kind), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CliError::args(format!("invalid filter '{}'", spec))
            .with_hint("use COLUMN:KIND:VALUE, e.g. 'Стоимость:greaterThan:1000'"));
    };
    let kind = FilterKind::parse(kind).ok_or_else(|| {
        CliError::args(format!("unknown filter kind '{}'", kind))
            .with_hint("kinds: contains, equals, startsWith, endsWith, greaterThan, lessThan")
    })?;
    Ok((column.trim().to_string(), FilterCondition::new(kind, value)))
}

fn flag_marks(flags: &RowFlags) -> String {
    let mut marks = String::new();
    if flags.sapsan {
        marks.push('S');
    }
    if flags.value_error {
        marks.push('V');
    }
    if flags.address_error {
        marks.push('A');
    }
    if marks.is_empty() {
        marks.push('-');
    }
    marks
}

fn cell_text(row: &Row, header: &str) -> String {
    let text: String = row
        .text(header)
        .chars()
        .map(|c| if c == '\n' || c == '\t' { ' ' } else { c })
        .collect();
    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{cut}…")
    } else {
        text
    }
}

fn build_grid(args: &PreviewArgs, session: &SessionFile) -> Result<Grid, CliError> {
    let state = session.load().map_err(CliError::session)?;
    let mut grid = Grid::new(state.dataset);

    for column in &args.sort {
        grid.apply_sort(column).map_err(|e| CliError::grid(e, grid.headers()))?;
    }
    for spec in &args.filter {
        let (column, condition) = parse_filter(spec)?;
        grid.apply_filter(&column, condition).map_err(|e| CliError::grid(e, grid.headers()))?;
    }
    Ok(grid)
}

pub fn cmd_preview(args: PreviewArgs, session: &SessionFile) -> Result<(), CliError> {
    let grid = build_grid(&args, session)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(column) = &args.unique {
        let entries = grid.unique_values(column).map_err(|e| CliError::grid(e, grid.headers()))?;
        for entry in entries {
            writeln!(out, "{:>6}  {}", entry.count, entry.display).map_err(|e| CliError::io(e.to_string()))?;
        }
        return Ok(());
    }

    let limit = args.limit.unwrap_or(usize::MAX);
    let dataset = grid.dataset();
    let headers = grid.headers();
    let rows: Vec<usize> = grid.visible_rows().iter().copied().take(limit).collect();
    let title = report_period_title(date_range(dataset).as_ref());

    if args.json {
        let json_rows: Vec<Value> = rows
            .iter()
            .filter_map(|&idx| dataset.row(idx).map(|row| (idx, row)))
            .map(|(idx, row)| {
                let mut cells = Map::new();
                for header in headers {
                    cells.insert(header.clone(), Value::String(row.text(header)));
                }
                json!({
                    "row": idx,
                    "flags": {
                        "sapsan": row.flags.sapsan,
                        "value_error": row.flags.value_error,
                        "address_error": row.flags.address_error,
                    },
                    "cells": cells,
                })
            })
            .collect();
        let doc = json!({
            "title": title,
            "sort": grid.sort(),
            "total": dataset.len(),
            "visible": grid.visible_rows().len(),
            "rows": json_rows,
        });
        let text = serde_json::to_string_pretty(&doc).map_err(|e| CliError::general(e.to_string()))?;
        writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()))?;
        return Ok(());
    }

    let write_err = |e: io::Error| CliError::io(e.to_string());
    writeln!(out, "{}", title).map_err(write_err)?;
    let mut line = vec!["#".to_string(), "flags".to_string()];
    line.extend(headers.iter().cloned());
    writeln!(out, "{}", line.join(" | ")).map_err(write_err)?;

    for &idx in &rows {
        let Some(row) = dataset.row(idx) else { continue };
        let mut line = vec![idx.to_string(), flag_marks(&row.flags)];
        line.extend(headers.iter().map(|h| cell_text(row, h)));
        writeln!(out, "{}", line.join(" | ")).map_err(write_err)?;
    }
    writeln!(out, "{} of {} rows", rows.len(), dataset.len()).map_err(write_err)?;
    Ok(())
}
