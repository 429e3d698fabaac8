//! City detection and minimum-fare tiers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::FareConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum City {
    Spb,
    Msk,
}

impl City {
    /// City name as it appears in dispatch addresses (lowercase)
    pub fn address_name(&self) -> &'static str {
        match self {
            City::Spb => "санкт-петербург",
            City::Msk => "москва",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            City::Spb => write!(f, "spb"),
            City::Msk => write!(f, "msk"),
        }
    }
}

/// Ordered city chain; Moscow is checked first
pub struct CityRule {
    pub city: City,
    pub markers: &'static [&'static str],
}

pub static CITY_RULES: &[CityRule] = &[
    CityRule { city: City::Msk, markers: &["москва"] },
    CityRule { city: City::Spb, markers: &["санкт-петербург", "спб"] },
];

pub fn detect_city(address: &str) -> Option<City> {
    let address = address.to_lowercase();
    CITY_RULES
        .iter()
        .find(|rule| rule.markers.iter().any(|m| address.contains(m)))
        .map(|rule| rule.city)
}

static ROUTE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"A\)|B\)").unwrap());

/// Pickup and drop-off points of an `A) ...; B) ...` route address
pub fn route_points(address: &str) -> (String, String) {
    let mut parts = ROUTE_SPLIT_RE.split(address).skip(1);
    let mut point = || {
        parts
            .next()
            .map(|p| {
                let p = p.trim();
                p.strip_suffix(';').unwrap_or(p).to_string()
            })
            .unwrap_or_default()
    };
    let a = point();
    let b = point();
    (a, b)
}

pub fn moscow_minimum_fare(address: &str, fares: &FareConfig) -> i64 {
    let (a, b) = route_points(address);
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    let either = |needle: &str| a.contains(needle) || b.contains(needle);

    if a.contains("аэропорт") && b.contains("аэропорт") {
        fares.msk_airport_to_airport
    } else if either("домодедово") {
        fares.msk_domodedovo
    } else if either("жуковский") {
        fares.msk_zhukovsky
    } else {
        fares.msk_base
    }
}

pub fn minimum_fare(city: City, address: &str, fares: &FareConfig) -> i64 {
    match city {
        City::Spb => fares.spb_base,
        City::Msk => moscow_minimum_fare(address, fares),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cities() {
        assert_eq!(detect_city("A) Санкт-Петербург, Невский пр., 1"), Some(City::Spb));
        assert_eq!(detect_city("СПб, Пулково"), Some(City::Spb));
        assert_eq!(detect_city("A) Москва, Тверская; B) Шереметьево"), Some(City::Msk));
        assert_eq!(detect_city("Тверь, вокзал"), None);
    }

    #[test]
    fn moscow_checked_first() {
        assert_eq!(detect_city("A) Москва; B) Санкт-Петербург"), Some(City::Msk));
    }

    #[test]
    fn splits_route_points() {
        let (a, b) = route_points("A) Москва, Тверская 1; B) Аэропорт Внуково;");
        assert_eq!(a, "Москва, Тверская 1");
        assert_eq!(b, "Аэропорт Внуково");
        assert_eq!(route_points("без маршрута"), (String::new(), String::new()));
    }

    #[test]
    fn moscow_tiers() {
        let fares = FareConfig::default();
        let fare = |addr: &str| moscow_minimum_fare(addr, &fares);
        assert_eq!(fare("A) Аэропорт Шереметьево; B) Аэропорт Внуково"), 6000);
        assert_eq!(fare("A) Москва, Арбат; B) Аэропорт Домодедово"), 4100);
        assert_eq!(fare("A) Жуковский, Ленина 5; B) Москва, Арбат"), 4500);
        assert_eq!(fare("A) Москва, Арбат; B) Москва, Тверская"), 3200);
    }

    #[test]
    fn airport_pair_beats_domodedovo() {
        let fares = FareConfig::default();
        assert_eq!(moscow_minimum_fare("A) Аэропорт Домодедово; B) Аэропорт Внуково", &fares), 6000);
    }

    #[test]
    fn spb_flat_fare() {
        let fares = FareConfig::default();
        assert_eq!(minimum_fare(City::Spb, "A) Аэропорт Пулково; B) Аэропорт", &fares), 2250);
    }
}
