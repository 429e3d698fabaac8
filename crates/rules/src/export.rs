//! Export plan: per-partner report sheets, cell values, fills and formats.
//!
//! The plan is pure data. `fleetreport-io` turns each `ExportSheet` into a
//! styled workbook and bundles them into the archive.

use chrono::NaiveDateTime;
use fleetreport_engine::dataset::{find_header, normalize_header};
use fleetreport_engine::{CellValue, Dataset, Row};

use crate::city::{detect_city, City};
use crate::columns::ColumnRoles;
use crate::config::RulesConfig;

pub const NO_PARK: &str = "без парка";
pub const SHEET_NAME: &str = "Отчёт";
pub const NO_PERIOD_TITLE: &str = "Нет информации о периоде";

pub const COL_ORDER: &str = "Номер заказа";
pub const COL_TIME: &str = "Время заказа";
pub const COL_COST: &str = "Стоимость";
pub const COL_COMMISSION: &str = "Комиссия";
pub const COL_EXTRA: &str = "Доплата";
pub const COL_PAYOUT: &str = "К выплате";

/// Report layout, in order
pub const REPORT_COLUMNS: &[&str] = &[
    COL_ORDER,
    COL_TIME,
    COL_COST,
    COL_COMMISSION,
    COL_EXTRA,
    COL_PAYOUT,
    "Адрес",
    "Исполнитель",
    "Автомобиль",
    "Комментарий",
];

/// Column widths in Excel character units, matched by header containment
const COLUMN_WIDTHS: &[(&str, f64)] = &[
    ("номер заказа", 130.0 / 12.0),
    ("время заказа", 230.0 / 12.0),
    ("стоимость", 160.0 / 12.0),
    ("комиссия", 160.0 / 12.0),
    ("доплата", 160.0 / 12.0),
    ("к выплате", 160.0 / 12.0),
    ("адрес", 680.0 / 12.0),
    ("исполнитель", 270.0 / 12.0),
    ("автомобиль", 270.0 / 12.0),
    ("комментарий", 680.0 / 12.0),
];

const DEFAULT_WIDTH: f64 = 20.0;

const MONEY_COLUMNS: &[&str] = &["стоимость", "сумма клиента", "комиссия", "доплата", "к выплате"];

pub const SUMMARY_PAYOUT_TOTAL: &str = "Итого к выплате";
pub const SUMMARY_SAPSAN_CASH: &str = "Наличные (Сапсан)";
pub const SUMMARY_PENALTIES: &str = "Штрафы";
pub const SUMMARY_NET_TOTAL: &str = "Итого к перечислению";

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFormat {
    /// `#,##0.00`
    Money,
    /// `DD.MM.YYYY HH:mm`
    DateTime,
    /// `0`
    Integer,
    Text,
}

impl ColumnFormat {
    pub fn for_header(header: &str) -> Self {
        let name = normalize_header(header);
        if MONEY_COLUMNS.iter().any(|m| name.contains(m)) {
            ColumnFormat::Money
        } else if name.contains("время") {
            ColumnFormat::DateTime
        } else if name.contains("номер заказа") {
            ColumnFormat::Integer
        } else {
            ColumnFormat::Text
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnFormat::Money | ColumnFormat::Integer)
    }

    /// Excel number format string
    pub fn num_format(&self) -> Option<&'static str> {
        match self {
            ColumnFormat::Money => Some("#,##0.00"),
            ColumnFormat::DateTime => Some("DD.MM.YYYY HH:mm"),
            ColumnFormat::Integer => Some("0"),
            ColumnFormat::Text => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportColumn {
    pub header: String,
    pub width: f64,
    pub format: ColumnFormat,
}

impl ExportColumn {
    pub fn for_header(header: &str) -> Self {
        let name = normalize_header(header);
        let width = COLUMN_WIDTHS
            .iter()
            .find(|(key, _)| name.contains(key))
            .map(|(_, w)| *w)
            .unwrap_or(DEFAULT_WIDTH);
        Self { header: header.to_string(), width, format: ColumnFormat::for_header(header) }
    }
}

/// Row background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowFill {
    ValueError,
    Sapsan,
    /// Zebra stripe for the nth data row (0-based)
    Stripe(bool),
}

impl RowFill {
    pub fn for_row(row: &Row, index: usize) -> Self {
        if row.flags.value_error {
            RowFill::ValueError
        } else if row.flags.sapsan {
            RowFill::Sapsan
        } else {
            // First data row sits on an even sheet row
            RowFill::Stripe(index % 2 == 0)
        }
    }

    pub fn rgb(&self) -> u32 {
        match self {
            RowFill::ValueError => 0xFFC7CE,
            RowFill::Sapsan => 0xC6EFCE,
            RowFill::Stripe(true) => 0xF2F2F2,
            RowFill::Stripe(false) => 0xFFFFFF,
        }
    }
}

pub const HEADER_FILL: u32 = 0xE6FFE6;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub cells: Vec<CellValue>,
    pub fill: RowFill,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SummaryValue {
    /// SUM over the payout column
    PayoutTotal,
    /// Manual adjustment, editable in the workbook
    Manual(f64),
    /// Payout total minus the manual adjustments
    NetTotal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub label: &'static str,
    pub value: SummaryValue,
}

pub fn standard_summary() -> Vec<SummaryRow> {
    vec![
        SummaryRow { label: SUMMARY_PAYOUT_TOTAL, value: SummaryValue::PayoutTotal },
        SummaryRow { label: SUMMARY_SAPSAN_CASH, value: SummaryValue::Manual(0.0) },
        SummaryRow { label: SUMMARY_PENALTIES, value: SummaryValue::Manual(0.0) },
        SummaryRow { label: SUMMARY_NET_TOTAL, value: SummaryValue::NetTotal },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSheet {
    /// Member file name inside the archive, with extension
    pub file_name: String,
    pub sheet_name: String,
    pub columns: Vec<ExportColumn>,
    pub rows: Vec<ExportRow>,
    pub summary: Vec<SummaryRow>,
    /// Column the summary formulas sum over
    pub payout_column: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub archive_name: String,
    pub title: String,
    pub sheets: Vec<ExportSheet>,
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// (commission, payout) for one row
pub fn commission_and_payout(cost: f64, extra: f64, rate: f64) -> (f64, f64) {
    let commission = cost * rate;
    (commission, cost - commission + extra)
}

// ---------------------------------------------------------------------------
// Date range + naming
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
}

/// Range of parseable timestamps in the order-time column
pub fn date_range(dataset: &Dataset) -> Option<DateRange> {
    let column = dataset.column_containing("время заказа")?;
    dataset
        .rows()
        .iter()
        .filter_map(|row| row.get(column).as_date())
        .fold(None, |acc: Option<DateRange>, dt| match acc {
            None => Some(DateRange { min: dt, max: dt }),
            Some(r) => Some(DateRange { min: r.min.min(dt), max: r.max.max(dt) }),
        })
}

fn day(dt: &NaiveDateTime) -> String {
    dt.format("%d.%m.%Y").to_string()
}

pub fn report_period_title(range: Option<&DateRange>) -> String {
    match range {
        Some(r) => format!("Отчёт за период {} - {}", day(&r.min), day(&r.max)),
        None => NO_PERIOD_TITLE.to_string(),
    }
}

/// Replace characters Excel and archive tools reject in names
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '\\' | '/' | '*' | '?' | ':' | '[' | ']') { '_' } else { c })
        .collect()
}

pub fn archive_name(range: Option<&DateRange>) -> String {
    match range {
        Some(r) => format!("отчёты_по_паркам_за_период_{}_{}.zip", day(&r.min), day(&r.max)),
        None => "отчёты.zip".to_string(),
    }
}

pub fn park_file_name(park: &str, range: Option<&DateRange>) -> String {
    let stem = match range {
        Some(r) => format!("отчёт_за_период_{}_{}_по_{park}", day(&r.min), day(&r.max)),
        None => format!("отчёт_по_{park}"),
    };
    format!("{}.xlsx", sanitize_file_name(&stem))
}

pub fn general_file_name(range: Option<&DateRange>) -> String {
    let stem = match range {
        Some(r) => format!("общий_отчёт_за_период_{}_{}", day(&r.min), day(&r.max)),
        None => "общий_отчёт".to_string(),
    };
    format!("{}.xlsx", sanitize_file_name(&stem))
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Final cell value for a column: blanks become `0` or `-`, typed values
/// are restored so the workbook gets real numbers and dates.
pub fn export_cell(value: &CellValue, format: ColumnFormat) -> CellValue {
    if value.is_blank() {
        return if format.is_numeric() { CellValue::Number(0.0) } else { CellValue::text("-") };
    }
    match format {
        ColumnFormat::Money | ColumnFormat::Integer => match value.as_number() {
            Some(n) => CellValue::Number(n),
            None => value.clone(),
        },
        ColumnFormat::DateTime => match value.as_date() {
            Some(dt) => CellValue::Date(dt),
            None => value.clone(),
        },
        ColumnFormat::Text => CellValue::text(value.display()),
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

fn park_of(row: &Row, column: Option<&str>) -> String {
    let value = column.map(|c| row.text(c)).unwrap_or_default();
    let value = value.trim();
    if value.is_empty() || value == "-" {
        NO_PARK.to_string()
    } else {
        value.to_string()
    }
}

/// Rows grouped by partner fleet, groups in order of first appearance
pub fn group_by_park(dataset: &Dataset) -> Vec<(String, Vec<&Row>)> {
    let roles = ColumnRoles::resolve(dataset.headers());
    let column = roles.partner_fleet.as_deref();
    let mut groups: Vec<(String, Vec<&Row>)> = Vec::new();
    for row in dataset.rows() {
        let park = park_of(row, column);
        match groups.iter_mut().find(|(name, _)| *name == park) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((park, vec![row])),
        }
    }
    groups
}

/// `Комиссия 23%` when every row of the group is in one city, else `Комиссия`
pub fn commission_header(cities: &[Option<City>], config: &RulesConfig) -> String {
    match cities.first() {
        Some(Some(first)) if cities.iter().all(|c| *c == Some(*first)) => {
            let percent = (config.commission.rate(Some(*first)) * 100.0).round();
            format!("{COL_COMMISSION} {percent}%")
        }
        _ => COL_COMMISSION.to_string(),
    }
}

struct SourceColumns<'a> {
    /// Per report column: the dataset header it reads from
    sources: Vec<Option<&'a str>>,
    address: Option<&'a str>,
    cost: Option<&'a str>,
    extra: Option<&'a str>,
}

impl<'a> SourceColumns<'a> {
    fn resolve(headers: &'a [String]) -> Self {
        let containing = |needle: &str| {
            let needle = normalize_header(needle);
            find_header(headers, |h| h.contains(&needle))
        };
        let sources = REPORT_COLUMNS
            .iter()
            .map(|c| if *c == COL_COMMISSION || *c == COL_PAYOUT { None } else { containing(*c) })
            .collect();
        Self { sources, address: containing("адрес"), cost: containing("стоимость"), extra: containing("доплата") }
    }
}

fn report_sheet(
    park: &str,
    rows: &[&Row],
    src: &SourceColumns<'_>,
    config: &RulesConfig,
    range: Option<&DateRange>,
) -> ExportSheet {
    let cities: Vec<Option<City>> =
        rows.iter().map(|r| src.address.and_then(|a| detect_city(&r.text(a)))).collect();

    let columns: Vec<ExportColumn> = REPORT_COLUMNS
        .iter()
        .map(|c| {
            let mut column = ExportColumn::for_header(c);
            if *c == COL_COMMISSION {
                column.header = commission_header(&cities, config);
            }
            column
        })
        .collect();

    let export_rows = rows
        .iter()
        .zip(&cities)
        .enumerate()
        .map(|(i, (row, city))| {
            let cost = src.cost.map(|c| row.get(c).number_or_zero()).unwrap_or(0.0);
            let extra = src.extra.map(|c| row.get(c).number_or_zero()).unwrap_or(0.0);
            let (commission, payout) = commission_and_payout(cost, extra, config.commission.rate(*city));

            let cells = REPORT_COLUMNS
                .iter()
                .zip(&src.sources)
                .zip(&columns)
                .map(|((name, source), column)| match *name {
                    COL_COMMISSION => CellValue::Number(commission),
                    COL_PAYOUT => CellValue::Number(payout),
                    _ => {
                        let value = source.map(|s| row.get(s).clone()).unwrap_or_default();
                        export_cell(&value, column.format)
                    }
                })
                .collect();
            ExportRow { cells, fill: RowFill::for_row(row, i) }
        })
        .collect();

    ExportSheet {
        file_name: park_file_name(park, range),
        sheet_name: SHEET_NAME.to_string(),
        columns,
        rows: export_rows,
        summary: standard_summary(),
        payout_column: REPORT_COLUMNS.iter().position(|c| *c == COL_PAYOUT),
    }
}

/// One report sheet per partner fleet
pub fn plan_grouped(dataset: &Dataset, config: &RulesConfig) -> ExportPlan {
    let range = date_range(dataset);
    let src = SourceColumns::resolve(dataset.headers());

    let sheets: Vec<ExportSheet> = group_by_park(dataset)
        .iter()
        .map(|(park, rows)| report_sheet(park, rows, &src, config, range.as_ref()))
        .collect();

    log::info!(
        "export plan: {} groups, {} rows, period {}",
        sheets.len(),
        dataset.len(),
        report_period_title(range.as_ref())
    );

    ExportPlan { archive_name: archive_name(range.as_ref()), title: report_period_title(range.as_ref()), sheets }
}

/// Whole dataset, own headers, no grouping and no summary
pub fn plan_general(dataset: &Dataset) -> ExportSheet {
    let range = date_range(dataset);
    let columns: Vec<ExportColumn> = dataset.headers().iter().map(|h| ExportColumn::for_header(h)).collect();
    let rows = dataset
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| ExportRow {
            cells: columns.iter().map(|c| export_cell(row.get(&c.header), c.format)).collect(),
            fill: RowFill::for_row(row, i),
        })
        .collect();

    ExportSheet {
        file_name: general_file_name(range.as_ref()),
        sheet_name: SHEET_NAME.to_string(),
        columns,
        rows,
        summary: Vec::new(),
        payout_column: None,
    }
}
