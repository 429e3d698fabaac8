// Excel import (calamine) and styled report export (rust_xlsxwriter)

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Datelike, NaiveDateTime, Timelike};
use fleetreport_engine::{CellValue, Dataset};
use fleetreport_rules::export::{
    ColumnFormat, ExportSheet, RowFill, SummaryRow, SummaryValue, HEADER_FILL,
};
use rust_xlsxwriter::{
    Color, ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook as XlsxWorkbook, Worksheet,
};

use crate::table::{build_dataset, serial_to_datetime};

// ============================================================================
// Import
// ============================================================================

/// Import the first sheet of an Excel file (xlsx, xls, xlsb, ods).
/// The first row holds the headers; fully empty rows are skipped.
pub fn import(path: &Path) -> Result<Dataset, String> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "Excel file contains no sheets".to_string())?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|cell| cell_value(cell).display()).collect(),
        None => return Err(format!("Sheet '{}' is empty", sheet_name)),
    };

    let records: Vec<Vec<CellValue>> = rows.map(|row| row.iter().map(cell_value).collect()).collect();
    let dataset = build_dataset(headers, records)?;

    log::info!(
        "Excel import '{}': {} rows, {} columns",
        sheet_name,
        dataset.len(),
        dataset.headers().len()
    );
    Ok(dataset)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // 1900 date system assumed; calamine does not expose the 1904 flag
        Data::DateTime(dt) => match serial_to_datetime(dt.as_f64()) {
            Some(value) => CellValue::Date(value),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.clone()),
        Data::Error(e) => CellValue::text(format!("#{:?}", e)),
    }
}

// ============================================================================
// Export
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExportResult {
    pub rows_exported: usize,
    pub summary_rows: usize,
}

/// Convert column index to Excel column letter (0 = A, 25 = Z, 26 = AA, etc.)
fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_name("Arial")
        .set_font_size(12)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
        .set_background_color(Color::RGB(HEADER_FILL))
}

fn summary_format(bold: bool) -> Format {
    let format = Format::new().set_num_format("#,##0.00");
    if bold {
        format.set_bold()
    } else {
        format
    }
}

/// Data cell formats keyed by column format and row fill
#[derive(Default)]
struct FormatCache {
    formats: HashMap<(ColumnFormat, RowFill), Format>,
}

impl FormatCache {
    fn get(&mut self, column: ColumnFormat, fill: RowFill) -> &Format {
        self.formats.entry((column, fill)).or_insert_with(|| {
            let format = Format::new().set_background_color(Color::RGB(fill.rgb()));
            match column.num_format() {
                Some(pattern) => format.set_num_format(pattern),
                None => format,
            }
        })
    }
}

fn excel_datetime(dt: &NaiveDateTime) -> Result<ExcelDateTime, String> {
    let year = u16::try_from(dt.year()).map_err(|_| format!("date out of range: {dt}"))?;
    ExcelDateTime::from_ymd(year, dt.month() as u8, dt.day() as u8)
        .and_then(|d| d.and_hms(dt.hour() as u16, dt.minute() as u8, dt.second()))
        .map_err(|e| format!("date out of range: {dt}: {e}"))
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    format: &Format,
) -> Result<(), String> {
    let written = match value {
        CellValue::Empty => worksheet.write_blank(row, col, format),
        CellValue::Number(n) => worksheet.write_number_with_format(row, col, *n, format),
        CellValue::Bool(b) => worksheet.write_boolean_with_format(row, col, *b, format),
        CellValue::Date(dt) => match excel_datetime(dt) {
            Ok(excel) => worksheet.write_datetime_with_format(row, col, &excel, format),
            // Excel has no dates before 1900 (time-only cells land on 1899-12-30)
            Err(e) => {
                log::debug!("cell ({row}, {col}): {e}; written as text");
                worksheet.write_string_with_format(row, col, value.display(), format)
            }
        },
        CellValue::Text(_) | CellValue::RichText(_) => {
            worksheet.write_string_with_format(row, col, value.display(), format)
        }
    };
    written
        .map(|_| ())
        .map_err(|e| format!("Failed to write cell ({}, {}): {}", row, col, e))
}

/// Summary block below the data: one blank spacer row, then label in the
/// first column and value (number or formula) in the payout column.
fn write_summary(
    worksheet: &mut Worksheet,
    summary: &[SummaryRow],
    payout_col: usize,
    data_rows: usize,
) -> Result<usize, String> {
    let letter = col_to_letter(payout_col);
    // Sheet row 0 is the header; data occupies 1..=data_rows
    let first_summary = data_rows as u32 + 2;

    let label_format = Format::new().set_bold();
    let mut total_row: Option<u32> = None;
    let mut manual_rows: Vec<u32> = Vec::new();

    for (i, entry) in summary.iter().enumerate() {
        let row = first_summary + i as u32;
        let col = payout_col as u16;

        worksheet
            .write_string_with_format(row, 0, entry.label, &label_format)
            .map_err(|e| format!("Failed to write summary label: {}", e))?;

        let written = match entry.value {
            SummaryValue::PayoutTotal => {
                total_row = Some(row);
                if data_rows == 0 {
                    worksheet.write_number_with_format(row, col, 0.0, &summary_format(true))
                } else {
                    let formula = format!("=SUM({letter}2:{letter}{})", data_rows + 1);
                    worksheet.write_formula_with_format(row, col, formula.as_str(), &summary_format(true))
                }
            }
            SummaryValue::Manual(amount) => {
                manual_rows.push(row);
                worksheet.write_number_with_format(row, col, amount, &summary_format(false))
            }
            SummaryValue::NetTotal => {
                let mut formula = match total_row {
                    Some(total) => format!("={letter}{}", total + 1),
                    None => "=0".to_string(),
                };
                for manual in &manual_rows {
                    formula.push_str(&format!("-{letter}{}", manual + 1));
                }
                worksheet.write_formula_with_format(row, col, formula.as_str(), &summary_format(true))
            }
        };
        written.map_err(|e| format!("Failed to write summary value: {}", e))?;
    }

    Ok(summary.len())
}

fn fill_worksheet(worksheet: &mut Worksheet, sheet: &ExportSheet) -> Result<ExportResult, String> {
    let mut result = ExportResult::default();

    worksheet
        .set_name(&sheet.sheet_name)
        .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.sheet_name, e))?;

    let header = header_format();
    for (col, column) in sheet.columns.iter().enumerate() {
        let col16 = col as u16;
        worksheet
            .write_string_with_format(0, col16, &column.header, &header)
            .map_err(|e| format!("Failed to write header '{}': {}", column.header, e))?;
        worksheet
            .set_column_width(col16, column.width)
            .map_err(|e| format!("Failed to set column width: {}", e))?;
    }
    worksheet
        .set_freeze_panes(1, 0)
        .map_err(|e| format!("Failed to freeze header row: {}", e))?;

    let mut formats = FormatCache::default();
    for (i, row) in sheet.rows.iter().enumerate() {
        let row32 = i as u32 + 1;
        for (col, (value, column)) in row.cells.iter().zip(&sheet.columns).enumerate() {
            let format = formats.get(column.format, row.fill);
            write_cell(worksheet, row32, col as u16, value, format)?;
        }
        result.rows_exported += 1;
    }

    if !sheet.summary.is_empty() {
        match sheet.payout_column {
            Some(payout_col) => {
                result.summary_rows = write_summary(worksheet, &sheet.summary, payout_col, sheet.rows.len())?;
            }
            None => log::warn!("sheet '{}': summary rows without a payout column, skipped", sheet.file_name),
        }
    }

    Ok(result)
}

fn build_workbook(sheet: &ExportSheet) -> Result<(XlsxWorkbook, ExportResult), String> {
    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook.add_worksheet();
    let result = fill_worksheet(worksheet, sheet)?;
    Ok((workbook, result))
}

/// Render one report sheet into an in-memory xlsx file
pub fn export_to_buffer(sheet: &ExportSheet) -> Result<(Vec<u8>, ExportResult), String> {
    let (mut workbook, result) = build_workbook(sheet)?;
    let buffer = workbook
        .save_to_buffer()
        .map_err(|e| format!("Failed to render XLSX '{}': {}", sheet.file_name, e))?;
    Ok((buffer, result))
}

/// Write one report sheet to `path`.
/// The file is written under a temporary name and renamed on success.
pub fn export(sheet: &ExportSheet, path: &Path) -> Result<ExportResult, String> {
    let (buffer, result) = export_to_buffer(sheet)?;
    crate::write_atomically(path, &buffer)?;
    Ok(result)
}
