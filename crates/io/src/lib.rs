// Spreadsheet codec: file decode into datasets, report workbooks and archives out

pub mod archive;
pub mod csv;
pub mod table;
pub mod xlsx;

use std::path::Path;

use fleetreport_engine::Dataset;

/// Extensions accepted by `import`
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsb", "ods", "csv"];

/// Import a dispatch export, picking the decoder from the file extension
pub fn import(path: &Path) -> Result<Dataset, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => csv::import(path),
        "xlsx" | "xls" | "xlsb" | "ods" => xlsx::import(path),
        _ => Err(format!(
            "Unsupported file type '{}' (expected one of: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )),
    }
}

/// Write `bytes` to a sibling temporary file, then rename over `path`
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Invalid output path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(format!("Failed to write {}: {}", tmp.display(), e));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        format!("Failed to move {} into place: {}", path.display(), e)
    })
}
