// CSV import

use std::io::Read;
use std::path::Path;

use fleetreport_engine::{CellValue, Dataset};

use crate::table::build_dataset;

pub fn import(path: &Path) -> Result<Dataset, String> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (semicolon, comma, tab, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins; ties keep the earlier
/// candidate, so dispatch exports (`;`) are preferred.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b';', b',', b'\t', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    if sample_lines.is_empty() {
        return b';';
    }

    let mut best = b';';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the header line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

fn has_cyrillic(s: &str) -> bool {
    s.chars().any(|c| matches!(c, '\u{0400}'..='\u{04FF}'))
}

/// Decode raw bytes: UTF-8 when it is valid and carries Cyrillic, else
/// Windows-1251 (common for Excel-exported CSVs), else lossy UTF-8.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    if let Ok(s) = std::str::from_utf8(bytes) {
        if has_cyrillic(s) {
            return s.to_string();
        }
    }

    let (decoded, _, _) = encoding_rs::WINDOWS_1251.decode(bytes);
    if has_cyrillic(&decoded) {
        log::debug!("CSV decoded as windows-1251");
        return decoded.into_owned();
    }

    String::from_utf8_lossy(bytes).into_owned()
}

pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
    Ok(decode_bytes(&bytes))
}

pub fn import_from_string(content: &str) -> Result<Dataset, String> {
    if content.trim().is_empty() {
        return Err("CSV file is empty".to_string());
    }

    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record.map_err(|e| e.to_string())?.iter().map(str::to_string).collect(),
        None => return Err("CSV file is empty".to_string()),
    };

    let mut rows = Vec::new();
    for result in records {
        let record = result.map_err(|e| e.to_string())?;
        rows.push(record.iter().take(headers.len()).map(field_value).collect::<Vec<_>>());
    }

    let dataset = build_dataset(headers, rows)?;
    if dataset.is_empty() {
        return Err("CSV file has a header row but no data rows".to_string());
    }
    log::info!("CSV import: {} rows, {} columns", dataset.len(), dataset.headers().len());
    Ok(dataset)
}

fn field_value(field: &str) -> CellValue {
    match field.trim() {
        "" => CellValue::Empty,
        trimmed => CellValue::text(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_prefers_semicolon() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n"), b'\t');
        // Decimal commas inside a semicolon file
        assert_eq!(sniff_delimiter("Адрес;Стоимость\nМосква;2600,50\n"), b';');
    }

    #[test]
    fn test_decode_utf8_cyrillic() {
        assert_eq!(decode_bytes("Адрес;Москва".as_bytes()), "Адрес;Москва");
    }

    #[test]
    fn test_decode_windows_1251() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Адрес;Санкт-Петербург");
        assert_eq!(decode_bytes(&bytes), "Адрес;Санкт-Петербург");
    }

    #[test]
    fn test_decode_strips_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice("Адрес".as_bytes());
        assert_eq!(decode_bytes(&bytes), "Адрес");
    }

    #[test]
    fn test_empty_file_is_error() {
        assert_eq!(import_from_string("").unwrap_err(), "CSV file is empty");
        assert_eq!(import_from_string("  \n\n").unwrap_err(), "CSV file is empty");
    }

    #[test]
    fn test_header_only_is_error() {
        let err = import_from_string("Номер заказа;Адрес\n").unwrap_err();
        assert!(err.contains("no data rows"), "{err}");
    }

    #[test]
    fn test_import_rows_and_time_shift() {
        let content = "Номер заказа;Время заказа;Стоимость;Адрес\n\
                       101;2024-03-15 12:00;2600;A) Санкт-Петербург, Невский 1\n\
                       ;;;\n\
                       102;вчера;3000;Москва\n";
        let ds = import_from_string(content).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.headers()[1], "Время заказа");

        let first = &ds.rows()[0];
        assert_eq!(first.text("Время заказа"), "15.03.2024 09:00");
        assert_eq!(first.get("Стоимость"), &CellValue::text("2600"));

        // Unparseable time text is kept
        assert_eq!(ds.rows()[1].get("Время заказа"), &CellValue::text("вчера"));
    }

    #[test]
    fn test_import_from_1251_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Номер заказа;Адрес\n7;Москва, Тверская 1\n");
        fs::write(&path, &bytes).unwrap();

        let ds = import(&path).unwrap();
        assert_eq!(ds.rows()[0].text("Адрес"), "Москва, Тверская 1");
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempdir().unwrap();
        let err = import(&dir.path().join("missing.csv")).unwrap_err();
        assert!(err.contains("missing.csv"));
    }
}
