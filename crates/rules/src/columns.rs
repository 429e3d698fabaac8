//! Column presets and role lookup over report headers.

use fleetreport_engine::dataset::{find_header, normalize_header};
use fleetreport_engine::ColumnConfig;

use crate::error::RulesError;

/// Output layout of the two-city (SLV) report, in order
pub const SLV_HEADERS: &[&str] = &[
    "Номер заказа",
    "Время заказа",
    "Текущий статус",
    "Стоимость",
    "Сумма клиента",
    "Организация",
    "Адрес",
    "Исполнитель",
    "Автомобиль",
    "Комментарий",
    "Клиент",
    "Парк партнёр",
    "Доплата",
];

/// SLV renames: source header → output name
const SLV_RENAMES: &[(&str, &str)] = &[("Организация", "Заказчик")];

/// Map the SLV layout onto the headers actually present in a file.
///
/// Each preset header binds to the first input header containing it
/// (normalized); missing ones keep the preset name and read as empty.
pub fn slv_column_config(input_headers: &[String]) -> Vec<ColumnConfig> {
    SLV_HEADERS
        .iter()
        .map(|preset| {
            let key = normalize_header(preset);
            let source = find_header(input_headers, |h| h.contains(&key)).unwrap_or(*preset);
            let name = SLV_RENAMES
                .iter()
                .find(|(from, _)| from == preset)
                .map(|(_, to)| *to)
                .unwrap_or(*preset);
            ColumnConfig::new(source, name)
        })
        .collect()
}

/// Reject configs that cannot produce a dataset
pub fn validate_columns(columns: &[ColumnConfig]) -> Result<(), RulesError> {
    if !columns.iter().any(|c| c.visible) {
        return Err(RulesError::ColumnConfig("no visible columns".into()));
    }
    if let Some(blank) = columns.iter().find(|c| c.visible && c.display_name.trim().is_empty()) {
        return Err(RulesError::ColumnConfig(format!(
            "column '{}' has an empty display name",
            blank.source_id
        )));
    }
    Ok(())
}

/// Columns the pipeline reads or writes, resolved on the projected headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub order_number: Option<String>,
    pub order_time: Option<String>,
    pub cost: Option<String>,
    pub extra_payment: Option<String>,
    pub address: Option<String>,
    pub executor: Option<String>,
    pub comment: Option<String>,
    pub customer: Option<String>,
    /// Exact name match, unlike the others
    pub client: Option<String>,
    pub partner_fleet: Option<String>,
}

impl ColumnRoles {
    pub fn resolve(headers: &[String]) -> Self {
        let containing = |needle: &str| {
            let needle = normalize_header(needle);
            find_header(headers, |h| h.contains(&needle)).map(str::to_string)
        };
        Self {
            order_number: containing("номер заказа"),
            order_time: containing("время заказа"),
            cost: containing("стоимость"),
            extra_payment: containing("доплата"),
            address: containing("адрес"),
            executor: containing("исполнитель"),
            comment: containing("комментарий"),
            // unmapped single-city exports still call it "Организация"
            customer: containing("заказчик").or_else(|| containing("организац")),
            client: find_header(headers, |h| h == "клиент").map(str::to_string),
            partner_fleet: containing("парк партнер"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn slv_binds_to_present_headers() {
        let input = headers(&["Номер заказа", "Время заказа (МСК)", "Организация", "Парк партнер"]);
        let config = slv_column_config(&input);
        assert_eq!(config.len(), SLV_HEADERS.len());
        assert_eq!(config[1].source_id, "Время заказа (МСК)");
        assert_eq!(config[1].display_name, "Время заказа");

        let org = config.iter().find(|c| c.source_id == "Организация").unwrap();
        assert_eq!(org.display_name, "Заказчик");

        let park = config.iter().find(|c| c.display_name == "Парк партнёр").unwrap();
        assert_eq!(park.source_id, "Парк партнер");

        let missing = config.iter().find(|c| c.display_name == "Доплата").unwrap();
        assert_eq!(missing.source_id, "Доплата");
    }

    #[test]
    fn roles_resolve_by_containment() {
        let roles = ColumnRoles::resolve(&headers(&[
            "Номер заказа",
            "Время заказа",
            "Стоимость",
            "Доплата",
            "Адрес",
            "Комментарий",
            "Клиент",
            "Клиентский номер",
            "Парк партнёр",
        ]));
        assert_eq!(roles.cost.as_deref(), Some("Стоимость"));
        assert_eq!(roles.client.as_deref(), Some("Клиент"));
        assert_eq!(roles.partner_fleet.as_deref(), Some("Парк партнёр"));
        assert_eq!(roles.executor, None);
    }

    #[test]
    fn customer_falls_back_to_organization() {
        let roles = ColumnRoles::resolve(&headers(&["Организация", "Комментарий"]));
        assert_eq!(roles.customer.as_deref(), Some("Организация"));

        let roles = ColumnRoles::resolve(&headers(&["Организация", "Заказчик"]));
        assert_eq!(roles.customer.as_deref(), Some("Заказчик"));
    }

    #[test]
    fn client_requires_exact_name() {
        let roles = ColumnRoles::resolve(&headers(&["Клиентский номер"]));
        assert_eq!(roles.client, None);
    }

    #[test]
    fn validate_rejects_all_hidden() {
        let mut columns = vec![ColumnConfig::new("A", "A")];
        columns[0].visible = false;
        assert!(validate_columns(&columns).is_err());
        assert!(validate_columns(&[ColumnConfig::new("A", " ")]).is_err());
        assert!(validate_columns(&[ColumnConfig::new("A", "B")]).is_ok());
    }
}
