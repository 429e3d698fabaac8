//! Upload gate: structural checks before a file is accepted.

use fleetreport_engine::Dataset;

use crate::city::City;
use crate::error::UploadError;

/// True when some row of the address column names `city`
pub fn mentions_city(dataset: &Dataset, city: City) -> Option<bool> {
    let address = dataset.column_containing("адрес")?;
    let name = city.address_name();
    Some(dataset.rows().iter().any(|row| row.text(address).to_lowercase().contains(name)))
}

/// Main dispatch file: must carry addresses in the expected city
pub fn check_main_file(file: &str, dataset: &Dataset, city: City) -> Result<(), UploadError> {
    match mentions_city(dataset, city) {
        None => Err(UploadError::NoAddressColumn { file: file.to_string() }),
        Some(false) => Err(UploadError::CityNotFound {
            file: file.to_string(),
            city: city.address_name().to_string(),
        }),
        Some(true) => {
            log::info!("accepted {file} ({} rows, {city})", dataset.len());
            Ok(())
        }
    }
}

/// Partner file: needs order and partner columns; when it also has an
/// address column, those addresses must name the city.
pub fn check_partner_file(file: &str, dataset: &Dataset, city: Option<City>) -> Result<(), UploadError> {
    if dataset.column_containing("партнер").is_none() {
        return Err(UploadError::NoPartnerColumn { file: file.to_string() });
    }
    if dataset.column_containing("номер заказа").is_none() {
        return Err(UploadError::NoOrderColumn { file: file.to_string() });
    }
    if let Some(city) = city {
        if mentions_city(dataset, city) == Some(false) {
            return Err(UploadError::CityNotFound {
                file: file.to_string(),
                city: city.address_name().to_string(),
            });
        }
    }
    log::info!("accepted partner file {file} ({} rows)", dataset.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetreport_engine::{CellValue, Row};

    fn dataset(headers: &[&str], rows: &[&[(&str, &str)]]) -> Dataset {
        let headers = headers.iter().map(|s| s.to_string()).collect();
        let rows = rows
            .iter()
            .map(|cells| Row::from_cells(cells.iter().map(|(k, v)| (*k, CellValue::text(*v)))))
            .collect();
        Dataset::with_rows(headers, rows).unwrap()
    }

    #[test]
    fn main_file_needs_city_address() {
        let spb = dataset(&["Адрес"], &[&[("Адрес", "A) Санкт-Петербург, Невский 1")]]);
        assert!(check_main_file("spb.xlsx", &spb, City::Spb).is_ok());
        assert_eq!(
            check_main_file("spb.xlsx", &spb, City::Msk),
            Err(UploadError::CityNotFound { file: "spb.xlsx".into(), city: "москва".into() })
        );
    }

    #[test]
    fn main_file_without_address_column() {
        let ds = dataset(&["Номер заказа"], &[]);
        assert_eq!(
            check_main_file("x.csv", &ds, City::Spb),
            Err(UploadError::NoAddressColumn { file: "x.csv".into() })
        );
    }

    #[test]
    fn partner_file_checks() {
        let ok = dataset(&["Номер заказа", "Партнер"], &[&[("Номер заказа", "1"), ("Партнер", "ParkA")]]);
        assert!(check_partner_file("p.xlsx", &ok, Some(City::Spb)).is_ok());

        let no_partner = dataset(&["Номер заказа"], &[]);
        assert_eq!(
            check_partner_file("p.xlsx", &no_partner, None),
            Err(UploadError::NoPartnerColumn { file: "p.xlsx".into() })
        );

        let wrong_city = dataset(
            &["Номер заказа", "Партнёр", "Адрес"],
            &[&[("Номер заказа", "1"), ("Партнёр", "ParkA"), ("Адрес", "Москва")]],
        );
        assert!(check_partner_file("p.xlsx", &wrong_city, Some(City::Spb)).is_err());
        assert!(check_partner_file("p.xlsx", &wrong_city, Some(City::Msk)).is_ok());
    }
}
