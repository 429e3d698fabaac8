// Zip bundle of report workbooks

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use fleetreport_rules::export::{ExportPlan, ExportSheet};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::xlsx;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArchiveResult {
    pub path: PathBuf,
    pub members: Vec<String>,
    pub rows_exported: usize,
}

/// Member names must be unique inside the zip; repeats get ` (2)`, ` (3)`...
fn unique_member_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot..]),
        None => (name, ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Render every sheet of the plan (plus an optional general workbook) into
/// one zip archive held in memory.
pub fn build_archive(plan: &ExportPlan, general: Option<&ExportSheet>) -> Result<(Vec<u8>, Vec<String>, usize), String> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used = HashSet::new();
    let mut members = Vec::new();
    let mut rows_exported = 0;

    for sheet in plan.sheets.iter().chain(general) {
        let (buffer, result) = xlsx::export_to_buffer(sheet)?;
        let name = unique_member_name(&sheet.file_name, &mut used);

        zip.start_file(name.as_str(), options)
            .map_err(|e| format!("Failed to add '{}' to archive: {}", name, e))?;
        zip.write_all(&buffer)
            .map_err(|e| format!("Failed to write '{}' to archive: {}", name, e))?;

        log::debug!("archive member '{}': {} rows", name, result.rows_exported);
        rows_exported += result.rows_exported;
        members.push(name);
    }

    let cursor = zip.finish().map_err(|e| format!("Failed to finish archive: {}", e))?;
    Ok((cursor.into_inner(), members, rows_exported))
}

/// Write the plan's archive into `dir` under `plan.archive_name`.
/// Nothing is left at the final path when any member fails to render.
pub fn write_archive(plan: &ExportPlan, general: Option<&ExportSheet>, dir: &Path) -> Result<ArchiveResult, String> {
    let (bytes, members, rows_exported) = build_archive(plan, general)?;
    let path = dir.join(&plan.archive_name);
    crate::write_atomically(&path, &bytes)?;

    log::info!("wrote {} ({} workbooks, {} rows)", path.display(), members.len(), rows_exported);
    Ok(ArchiveResult { path, members, rows_exported })
}
