//! Row transformation pipeline.
//!
//! Steps run in a fixed order over the whole dataset:
//! projection → chronological sort → per-row mutation → partner
//! attribution → value formatting. Row anomalies become `RowFlags`;
//! the only errors are structural ones caught before any row is touched.

use fleetreport_engine::dataset::SortDirection;
use fleetreport_engine::{CellValue, ColumnConfig, Dataset, Row, SortSpec};
use serde::{Deserialize, Serialize};

use crate::city::{detect_city, minimum_fare};
use crate::columns::{validate_columns, ColumnRoles};
use crate::config::RulesConfig;
use crate::error::RulesError;
use crate::executor::infer_executor;
use crate::fees::{find_toll_and_parking_fees, has_unconfirmed_fee_mention, total};
use crate::partner::PartnerMapping;
use crate::phone::strip_phone_numbers;

pub const SAPSAN_CUSTOMER: &str = "Сапсан";
const SAPSAN_CASH_MARKER: &str = "сапсан наличные";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub rows: usize,
    pub sapsan: usize,
    pub value_errors: usize,
    pub address_errors: usize,
    pub fee_adjustments: usize,
    pub executors_inferred: usize,
    pub partners_attributed: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub dataset: Dataset,
    pub report: PipelineReport,
}

pub fn run(
    config: &RulesConfig,
    input: &Dataset,
    columns: &[ColumnConfig],
    partners: &[PartnerMapping],
) -> Result<PipelineOutput, RulesError> {
    validate_columns(columns)?;

    let mut dataset = project(input, columns)?;
    let roles = ColumnRoles::resolve(dataset.headers());
    let mut report = PipelineReport { rows: dataset.len(), ..Default::default() };

    sort_by_order_time(&mut dataset, &roles);

    for row in dataset.rows_mut() {
        mutate_row(config, &roles, row, &mut report);
    }

    if config.features.partner_attribution && !partners.is_empty() {
        report.partners_attributed = attribute_partners(&mut dataset, &roles, partners);
    }

    format_values(&mut dataset);

    for row in dataset.rows() {
        report.sapsan += row.flags.sapsan as usize;
        report.value_errors += row.flags.value_error as usize;
        report.address_errors += row.flags.address_error as usize;
    }

    log::info!(
        "pipeline: {} rows, {} sapsan, {} value errors, {} address errors, {} fee adjustments, {} executors, {} partners",
        report.rows,
        report.sapsan,
        report.value_errors,
        report.address_errors,
        report.fee_adjustments,
        report.executors_inferred,
        report.partners_attributed,
    );

    Ok(PipelineOutput { dataset, report })
}

// ---------------------------------------------------------------------------
// Step 1: projection
// ---------------------------------------------------------------------------

/// Visible entries in list order; a repeated display name keeps the first entry
pub fn project(input: &Dataset, columns: &[ColumnConfig]) -> Result<Dataset, RulesError> {
    let mut kept: Vec<&ColumnConfig> = Vec::new();
    for column in columns.iter().filter(|c| c.visible) {
        if kept.iter().any(|k| k.display_name == column.display_name) {
            log::warn!(
                "column '{}' maps to duplicate name '{}', dropped",
                column.source_id,
                column.display_name
            );
            continue;
        }
        kept.push(column);
    }

    let headers = kept.iter().map(|c| c.display_name.clone()).collect();
    let mut output = Dataset::new(headers).map_err(|e| RulesError::ColumnConfig(e.to_string()))?;

    for source in input.rows() {
        let mut row = Row::from_cells(kept.iter().map(|c| (c.display_name.clone(), source.get(&c.source_id).clone())));
        row.flags = source.flags;
        output.push_row(row);
    }
    Ok(output)
}

// ---------------------------------------------------------------------------
// Step 2: chronological sort
// ---------------------------------------------------------------------------

fn sort_by_order_time(dataset: &mut Dataset, roles: &ColumnRoles) {
    let Some(time_col) = roles.order_time.clone() else {
        log::debug!("no order-time column, keeping input order");
        return;
    };
    // Unparseable timestamps sort as the epoch
    dataset.sort_rows_by(|a, b| {
        let ta = a.get(&time_col).as_date().unwrap_or_default();
        let tb = b.get(&time_col).as_date().unwrap_or_default();
        ta.cmp(&tb)
    });
    dataset.initial_sort = Some(SortSpec { column: time_col, direction: SortDirection::Ascending });
}

// ---------------------------------------------------------------------------
// Step 3: per-row mutation
// ---------------------------------------------------------------------------

fn mutate_row(config: &RulesConfig, roles: &ColumnRoles, row: &mut Row, report: &mut PipelineReport) {
    if let Some(client) = &roles.client {
        row.set(client.clone(), CellValue::Empty);
    }

    let comment = match &roles.comment {
        Some(col) => {
            let original = row.text(col);
            if original.is_empty() {
                original
            } else {
                let stripped = strip_phone_numbers(&original);
                row.set(col.clone(), text_or_empty(&stripped));
                stripped
            }
        }
        None => String::new(),
    };

    if config.features.sapsan && (row.flags.sapsan || is_sapsan_comment(&comment)) {
        row.flags.sapsan = true;
        if let Some(customer) = &roles.customer {
            row.set(customer.clone(), CellValue::text(SAPSAN_CUSTOMER));
        }
        return;
    }

    if let (Some(executor), Some(_)) = (&roles.executor, &roles.comment) {
        if row.get(executor).is_blank() {
            if let Some(name) = infer_executor(&comment) {
                row.set(executor.clone(), CellValue::text(name));
                report.executors_inferred += 1;
            }
        }
    }

    reconcile_fees(config, roles, row, &comment, report);
}

/// Cash ride settled under the Sapsan account
pub fn detect_sapsan_cash(comment: &str) -> bool {
    comment.to_lowercase().contains(SAPSAN_CASH_MARKER)
}

fn is_sapsan_comment(comment: &str) -> bool {
    let found = detect_sapsan_cash(comment);
    if found {
        log::debug!("sapsan cash row: {comment:?}");
    }
    found
}

fn reconcile_fees(config: &RulesConfig, roles: &ColumnRoles, row: &mut Row, comment: &str, report: &mut PipelineReport) {
    let (Some(_), Some(address_col), Some(cost_col), Some(extra_col)) =
        (&roles.comment, &roles.address, &roles.cost, &roles.extra_payment)
    else {
        return;
    };
    if row.flags.sapsan || row.flags.value_error || row.flags.fee_adjusted {
        return;
    }

    let fees = find_toll_and_parking_fees(comment);
    if fees.is_empty() {
        if has_unconfirmed_fee_mention(comment) {
            log::debug!("unconfirmed fee mention: {comment:?}");
            row.flags.value_error = true;
        }
        return;
    }

    let address = row.text(address_col);
    let Some(city) = detect_city(&address) else {
        row.flags.value_error = true;
        row.flags.address_error = true;
        return;
    };

    let cost = row.get(cost_col).number_or_zero();
    let minimum = minimum_fare(city, &address, &config.fares);
    if cost <= minimum as f64 {
        log::debug!("cost {cost} at or below minimum {minimum} for {city}");
        row.flags.value_error = true;
        return;
    }

    let fee_total = total(&fees) as f64;
    let extra = row.get(extra_col).number_or_zero();
    row.set(cost_col.clone(), CellValue::Number(cost - fee_total));
    row.set(extra_col.clone(), CellValue::Number(extra + fee_total));
    row.flags.fee_adjusted = true;
    report.fee_adjustments += 1;
}

fn text_or_empty(s: &str) -> CellValue {
    if s.is_empty() {
        CellValue::Empty
    } else {
        CellValue::text(s)
    }
}

// ---------------------------------------------------------------------------
// Step 4: partner attribution
// ---------------------------------------------------------------------------

fn attribute_partners(dataset: &mut Dataset, roles: &ColumnRoles, partners: &[PartnerMapping]) -> usize {
    let Some(partner_col) = roles.partner_fleet.clone() else {
        log::warn!("partner files given but the report has no partner-fleet column; skipped");
        return 0;
    };
    let Some(order_col) = roles.order_number.clone() else {
        log::warn!("partner files given but the report has no order-number column; skipped");
        return 0;
    };

    let mapping = PartnerMapping::combine(partners);
    let mut attributed = 0;
    for row in dataset.rows_mut() {
        let value = match mapping.get(&row.text(&order_col)) {
            Some(partner) => {
                attributed += 1;
                CellValue::text(partner)
            }
            None => CellValue::Empty,
        };
        row.set(partner_col.clone(), value);
    }
    attributed
}

// ---------------------------------------------------------------------------
// Step 5: value formatting
// ---------------------------------------------------------------------------

fn format_values(dataset: &mut Dataset) {
    let headers = dataset.headers().to_vec();
    for row in dataset.rows_mut() {
        for header in &headers {
            if let CellValue::Date(_) = row.get(header) {
                let text = row.get(header).display();
                row.set(header.clone(), CellValue::Text(text));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ride(comment: &str, address: &str, cost: f64) -> Row {
        Row::from_cells([
            ("Комментарий", CellValue::text(comment)),
            ("Адрес", CellValue::text(address)),
            ("Стоимость", CellValue::Number(cost)),
            ("Доплата", CellValue::Empty),
        ])
    }

    fn run_rows(rows: Vec<Row>) -> PipelineOutput {
        let hs = headers(&["Комментарий", "Адрес", "Стоимость", "Доплата"]);
        let ds = Dataset::with_rows(hs.clone(), rows).unwrap();
        run(&RulesConfig::default(), &ds, &ColumnConfig::identity(&hs), &[]).unwrap()
    }

    #[test]
    fn projection_drops_hidden_and_duplicate_names() {
        let ds = Dataset::with_rows(
            headers(&["A", "B", "C"]),
            vec![Row::from_cells([("A", CellValue::text("a")), ("B", CellValue::text("b")), ("C", CellValue::text("c"))])],
        )
        .unwrap();
        let mut columns = vec![ColumnConfig::new("C", "X"), ColumnConfig::new("A", "Y"), ColumnConfig::new("B", "X")];
        columns.push(ColumnConfig { source_id: "A".into(), display_name: "Z".into(), visible: false });

        let out = project(&ds, &columns).unwrap();
        assert_eq!(out.headers(), &["X".to_string(), "Y".to_string()]);
        assert_eq!(out.rows()[0].text("X"), "c");
        assert_eq!(out.rows()[0].text("Y"), "a");
    }

    #[test]
    fn toll_fee_moved_to_extra_payment() {
        let out = run_rows(vec![ride("платные дороги 300 вкл", "A) Санкт-Петербург, Невский 1", 2600.0)]);
        let row = &out.dataset.rows()[0];
        assert_eq!(row.get("Стоимость"), &CellValue::Number(2300.0));
        assert_eq!(row.get("Доплата"), &CellValue::Number(300.0));
        assert!(!row.flags.value_error);
        assert!(row.flags.fee_adjusted);
        assert_eq!(out.report.fee_adjustments, 1);
    }

    #[test]
    fn cost_at_minimum_flags_value_error() {
        let out = run_rows(vec![ride("платные дороги 300 вкл", "A) Санкт-Петербург, Невский 1", 2200.0)]);
        let row = &out.dataset.rows()[0];
        assert!(row.flags.value_error);
        assert_eq!(row.get("Стоимость"), &CellValue::Number(2200.0));
        assert_eq!(row.get("Доплата"), &CellValue::Empty);
    }

    #[test]
    fn unresolved_city_flags_address_error() {
        let out = run_rows(vec![ride("зсд 300 вкл", "A) Тверь", 5000.0)]);
        let row = &out.dataset.rows()[0];
        assert!(row.flags.value_error);
        assert!(row.flags.address_error);
        assert_eq!(out.report.address_errors, 1);
    }

    #[test]
    fn parking_vkl_without_amount_is_value_error() {
        let out = run_rows(vec![ride("парковка вкл", "A) Санкт-Петербург", 3000.0)]);
        assert!(out.dataset.rows()[0].flags.value_error);
        assert_eq!(out.dataset.rows()[0].get("Стоимость"), &CellValue::Number(3000.0));
    }

    #[test]
    fn sapsan_short_circuits_fees_and_executor() {
        let hs = headers(&["Комментарий", "Адрес", "Стоимость", "Доплата", "Заказчик", "Исполнитель"]);
        let ds = Dataset::with_rows(
            hs.clone(),
            vec![Row::from_cells([
                ("Комментарий", CellValue::text("Сапсан наличные, зсд 300 вкл я")),
                ("Адрес", CellValue::text("Тверь")),
                ("Стоимость", CellValue::Number(1000.0)),
                ("Заказчик", CellValue::text("ООО Ромашка")),
            ])],
        )
        .unwrap();
        let out = run(&RulesConfig::default(), &ds, &ColumnConfig::identity(&hs), &[]).unwrap();
        let row = &out.dataset.rows()[0];
        assert!(row.flags.sapsan);
        assert!(!row.flags.value_error);
        assert_eq!(row.text("Заказчик"), SAPSAN_CUSTOMER);
        assert!(row.get("Исполнитель").is_blank());
        assert_eq!(row.get("Стоимость"), &CellValue::Number(1000.0));
    }

    #[test]
    fn sapsan_feature_off_treats_row_normally() {
        let hs = headers(&["Комментарий", "Адрес", "Стоимость", "Доплата"]);
        let ds = Dataset::with_rows(hs.clone(), vec![ride("сапсан наличные зсд 300 вкл", "Тверь", 3000.0)]).unwrap();
        let mut config = RulesConfig::default();
        config.features.sapsan = false;
        let out = run(&config, &ds, &ColumnConfig::identity(&hs), &[]).unwrap();
        assert!(!out.dataset.rows()[0].flags.sapsan);
        assert!(out.dataset.rows()[0].flags.address_error);
    }

    #[test]
    fn sapsan_marker_case_insensitive() {
        assert!(detect_sapsan_cash("Оплата: САПСАН НАЛИЧНЫЕ"));
        assert!(!detect_sapsan_cash("сапсан, безнал"));
    }

    #[test]
    fn client_blanked_and_phone_stripped() {
        let hs = headers(&["Клиент", "Комментарий"]);
        let ds = Dataset::with_rows(
            hs.clone(),
            vec![Row::from_cells([
                ("Клиент", CellValue::text("Иванов И.")),
                ("Комментарий", CellValue::text("звонить +79111234567  у входа")),
            ])],
        )
        .unwrap();
        let out = run(&RulesConfig::default(), &ds, &ColumnConfig::identity(&hs), &[]).unwrap();
        let row = &out.dataset.rows()[0];
        assert_eq!(row.get("Клиент"), &CellValue::Empty);
        assert_eq!(row.text("Комментарий"), "звонить у входа");
    }

    #[test]
    fn executor_filled_only_when_blank() {
        let hs = headers(&["Комментарий", "Исполнитель"]);
        let ds = Dataset::with_rows(
            hs.clone(),
            vec![
                Row::from_cells([("Комментарий", CellValue::text("встреча у табло я"))]),
                Row::from_cells([
                    ("Комментарий", CellValue::text("встреча у табло я")),
                    ("Исполнитель", CellValue::text("Петров")),
                ]),
            ],
        )
        .unwrap();
        let out = run(&RulesConfig::default(), &ds, &ColumnConfig::identity(&hs), &[]).unwrap();
        assert_eq!(out.dataset.rows()[0].text("Исполнитель"), "Яндекс");
        assert_eq!(out.dataset.rows()[1].text("Исполнитель"), "Петров");
        assert_eq!(out.report.executors_inferred, 1);
    }

    #[test]
    fn sorted_by_order_time_with_initial_sort() {
        let hs = headers(&["Время заказа", "Номер заказа"]);
        let ds = Dataset::with_rows(
            hs.clone(),
            vec![
                Row::from_cells([("Время заказа", CellValue::text("02.03.2024 10:00")), ("Номер заказа", CellValue::Number(1.0))]),
                Row::from_cells([("Время заказа", CellValue::text("мусор")), ("Номер заказа", CellValue::Number(2.0))]),
                Row::from_cells([("Время заказа", CellValue::text("01.03.2024 10:00")), ("Номер заказа", CellValue::Number(3.0))]),
            ],
        )
        .unwrap();
        let out = run(&RulesConfig::default(), &ds, &ColumnConfig::identity(&hs), &[]).unwrap();
        let order: Vec<String> = out.dataset.rows().iter().map(|r| r.text("Номер заказа")).collect();
        assert_eq!(order, vec!["2", "3", "1"]);
        assert_eq!(
            out.dataset.initial_sort,
            Some(SortSpec { column: "Время заказа".into(), direction: SortDirection::Ascending })
        );
    }

    #[test]
    fn dates_become_display_text() {
        let hs = headers(&["Время заказа"]);
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 5, 0).unwrap();
        let ds = Dataset::with_rows(hs.clone(), vec![Row::from_cells([("Время заказа", CellValue::Date(dt))])]).unwrap();
        let out = run(&RulesConfig::default(), &ds, &ColumnConfig::identity(&hs), &[]).unwrap();
        assert_eq!(out.dataset.rows()[0].get("Время заказа"), &CellValue::text("01.03.2024 09:05"));
    }

    #[test]
    fn partner_attribution_last_source_wins() {
        let hs = headers(&["Номер заказа", "Парк партнёр"]);
        let ds = Dataset::with_rows(
            hs.clone(),
            vec![
                Row::from_cells([("Номер заказа", CellValue::Number(123.0))]),
                Row::from_cells([("Номер заказа", CellValue::Number(5.0)), ("Парк партнёр", CellValue::text("old"))]),
            ],
        )
        .unwrap();
        let mut spb = PartnerMapping::new();
        spb.insert("123", "ParkA");
        let mut msk = PartnerMapping::new();
        msk.insert("123", "ParkB");

        let out = run(&RulesConfig::default(), &ds, &ColumnConfig::identity(&hs), &[spb, msk]).unwrap();
        assert_eq!(out.dataset.rows()[0].text("Парк партнёр"), "ParkB");
        assert_eq!(out.dataset.rows()[1].get("Парк партнёр"), &CellValue::Empty);
        assert_eq!(out.report.partners_attributed, 1);
    }

    #[test]
    fn rejects_all_hidden_columns() {
        let hs = headers(&["A"]);
        let ds = Dataset::new(hs).unwrap();
        let columns = vec![ColumnConfig { source_id: "A".into(), display_name: "A".into(), visible: false }];
        assert!(matches!(run(&RulesConfig::default(), &ds, &columns, &[]), Err(RulesError::ColumnConfig(_))));
    }
}
