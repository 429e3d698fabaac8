// Shared decode helpers: header cleanup, time-column shifting, dataset assembly

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use fleetreport_engine::cell::parse_datetime;
use fleetreport_engine::dataset::normalize_header;
use fleetreport_engine::{CellValue, Dataset, Row};
use regex::Regex;

/// Source exports are stamped in UTC+3; the report works in UTC
pub const TIME_SHIFT_HOURS: i64 = 3;

/// Serials below this are treated as plain numbers, not dates
const MIN_DATE_SERIAL: f64 = 10_000.0;

static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d{4}-\d{2}-\d{2}").unwrap());

pub fn is_time_column(header: &str) -> bool {
    normalize_header(header).contains("время")
}

/// Excel 1900-system serial to a timestamp, rounded to the millisecond
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() {
        return None;
    }
    epoch.checked_add_signed(Duration::milliseconds(millis as i64))
}

fn shifted(dt: NaiveDateTime) -> CellValue {
    CellValue::Date(dt - Duration::hours(TIME_SHIFT_HOURS))
}

/// Normalize a value read from a time column. Dates, large serials and
/// ISO-like strings become `Date` in UTC; anything else is kept.
pub fn decode_time(value: CellValue) -> CellValue {
    match value {
        CellValue::Date(dt) => shifted(dt),
        CellValue::Number(n) if n > MIN_DATE_SERIAL => match serial_to_datetime(n) {
            Some(dt) => shifted(dt),
            None => CellValue::Number(n),
        },
        CellValue::Text(s) if ISO_DATE_RE.is_match(&s) => match parse_datetime(&s) {
            Some(dt) => shifted(dt),
            None => CellValue::Text(s),
        },
        other => other,
    }
}

/// Blank headers get a positional name, repeated ones a numeric suffix
pub fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, h)| {
            let base = match h.trim() {
                "" => format!("Столбец {}", i + 1),
                trimmed => trimmed.to_string(),
            };
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{base} ({n})");
                n += 1;
            }
            name
        })
        .collect()
}

/// Build a dataset from a header row and positional records.
/// Fully blank records are skipped; short records are padded with `Empty`.
pub fn build_dataset(raw_headers: Vec<String>, records: Vec<Vec<CellValue>>) -> Result<Dataset, String> {
    let headers = unique_headers(raw_headers);
    let time_columns: Vec<bool> = headers.iter().map(|h| is_time_column(h)).collect();

    let mut dataset = Dataset::new(headers.clone()).map_err(|e| e.to_string())?;
    let mut skipped = 0usize;

    for record in records {
        if record.iter().all(CellValue::is_blank) {
            skipped += 1;
            continue;
        }
        let cells = record.into_iter().zip(headers.iter()).enumerate().map(|(i, (value, header))| {
            let value = if time_columns[i] { decode_time(value) } else { value };
            (header.clone(), value)
        });
        dataset.push_row(Row::from_cells(cells));
    }

    if skipped > 0 {
        log::debug!("skipped {skipped} empty rows");
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_serial_conversion() {
        // 45366.5 = 2024-03-15 12:00
        assert_eq!(serial_to_datetime(45366.5), Some(dt(2024, 3, 15, 12, 0)));
    }

    #[test]
    fn test_decode_time_shifts_three_hours() {
        assert_eq!(decode_time(CellValue::Date(dt(2024, 3, 15, 12, 0))), CellValue::Date(dt(2024, 3, 15, 9, 0)));
        assert_eq!(decode_time(CellValue::Number(45366.5)), CellValue::Date(dt(2024, 3, 15, 9, 0)));
        assert_eq!(
            decode_time(CellValue::text("2024-03-15 01:30:00")),
            CellValue::Date(dt(2024, 3, 14, 22, 30))
        );
    }

    #[test]
    fn test_decode_time_keeps_other_values() {
        assert_eq!(decode_time(CellValue::Number(42.0)), CellValue::Number(42.0));
        assert_eq!(decode_time(CellValue::text("15.03.2024 10:00")), CellValue::text("15.03.2024 10:00"));
        assert_eq!(decode_time(CellValue::Empty), CellValue::Empty);
    }

    #[test]
    fn test_unique_headers() {
        let headers = unique_headers(vec!["Адрес".into(), " ".into(), "Адрес".into(), "Адрес".into()]);
        assert_eq!(headers, vec!["Адрес", "Столбец 2", "Адрес (2)", "Адрес (3)"]);
    }

    #[test]
    fn test_build_dataset_skips_blank_and_pads() {
        let ds = build_dataset(
            vec!["Номер заказа".into(), "Время заказа".into(), "Адрес".into()],
            vec![
                vec![CellValue::Number(1.0), CellValue::text("2024-03-15T12:00:00")],
                vec![CellValue::Empty, CellValue::text("")],
                vec![CellValue::Number(2.0), CellValue::Empty, CellValue::text("Москва")],
            ],
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows()[0].get("Время заказа"), &CellValue::Date(dt(2024, 3, 15, 9, 0)));
        assert_eq!(ds.rows()[0].get("Адрес"), &CellValue::Empty);
        assert_eq!(ds.rows()[1].text("Адрес"), "Москва");
    }
}
