use std::collections::HashSet;
use std::path::Path;

use fleetreport_engine::ColumnConfig;
use serde::{Deserialize, Serialize};

use crate::city::City;
use crate::error::RulesError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default)]
    pub fares: FareConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    /// Explicit column mapper. Empty = derive from the input headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnEntry>,
}

// ---------------------------------------------------------------------------
// Fares
// ---------------------------------------------------------------------------

/// Minimum fares in rubles. A fee is only moved out of the cost when the
/// cost is strictly above the applicable minimum.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FareConfig {
    pub spb_base: i64,
    pub msk_base: i64,
    pub msk_domodedovo: i64,
    pub msk_zhukovsky: i64,
    pub msk_airport_to_airport: i64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            spb_base: 2250,
            msk_base: 3200,
            msk_domodedovo: 4100,
            msk_zhukovsky: 4500,
            msk_airport_to_airport: 6000,
        }
    }
}

// ---------------------------------------------------------------------------
// Commission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommissionConfig {
    pub spb: f64,
    pub msk: f64,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self { spb: 0.23, msk: 0.27 }
    }
}

impl CommissionConfig {
    /// Commission rate for a resolved city; unknown city pays none
    pub fn rate(&self, city: Option<City>) -> f64 {
        match city {
            Some(City::Spb) => self.spb,
            Some(City::Msk) => self.msk,
            None => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    /// SLV mode: two cities, preset column layout
    pub two_city: bool,
    /// Sapsan cash detection and exemption
    pub sapsan: bool,
    pub partner_attribution: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self { two_city: true, sapsan: true, partner_attribution: true }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnEntry {
    pub source: String,
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl From<&ColumnEntry> for ColumnConfig {
    fn from(entry: &ColumnEntry) -> Self {
        ColumnConfig {
            source_id: entry.source.clone(),
            display_name: entry.name.clone(),
            visible: entry.visible,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RulesConfig {
    pub fn from_toml(input: &str) -> Result<Self, RulesError> {
        let config: RulesConfig =
            toml::from_str(input).map_err(|e| RulesError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| RulesError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn to_toml(&self) -> Result<String, RulesError> {
        toml::to_string_pretty(self).map_err(|e| RulesError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        let fares = [
            ("spb_base", self.fares.spb_base),
            ("msk_base", self.fares.msk_base),
            ("msk_domodedovo", self.fares.msk_domodedovo),
            ("msk_zhukovsky", self.fares.msk_zhukovsky),
            ("msk_airport_to_airport", self.fares.msk_airport_to_airport),
        ];
        for (name, value) in fares {
            if value <= 0 {
                return Err(RulesError::ConfigValidation(format!(
                    "fares.{name} must be positive, got {value}"
                )));
            }
        }

        for (name, rate) in [("spb", self.commission.spb), ("msk", self.commission.msk)] {
            if !(0.0..1.0).contains(&rate) {
                return Err(RulesError::ConfigValidation(format!(
                    "commission.{name} must be in [0, 1), got {rate}"
                )));
            }
        }

        let mut seen = HashSet::new();
        for entry in self.columns.iter().filter(|c| c.visible) {
            if !seen.insert(entry.name.as_str()) {
                return Err(RulesError::ConfigValidation(format!(
                    "duplicate visible column name '{}'",
                    entry.name
                )));
            }
        }

        Ok(())
    }

    /// Explicit column config, if the file declared one
    pub fn column_config(&self) -> Option<Vec<ColumnConfig>> {
        if self.columns.is_empty() {
            None
        } else {
            Some(self.columns.iter().map(ColumnConfig::from).collect())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[fares]
spb_base = 2300
msk_base = 3200
msk_domodedovo = 4100
msk_zhukovsky = 4500
msk_airport_to_airport = 6000

[commission]
spb = 0.2
msk = 0.25

[features]
two_city = false
sapsan = true
partner_attribution = false

[[columns]]
source = "Организация"
name = "Заказчик"

[[columns]]
source = "Клиент"
name = "Клиент"
visible = false
"#;

    #[test]
    fn parse_full() {
        let config = RulesConfig::from_toml(FULL).unwrap();
        assert_eq!(config.fares.spb_base, 2300);
        assert_eq!(config.commission.rate(Some(City::Msk)), 0.25);
        assert!(!config.features.two_city);
        assert!(!config.features.partner_attribution);
        let columns = config.column_config().unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].display_name, "Заказчик");
        assert!(columns[0].visible);
        assert!(!columns[1].visible);
    }

    #[test]
    fn empty_input_gives_defaults() {
        let config = RulesConfig::from_toml("").unwrap();
        assert_eq!(config, RulesConfig::default());
        assert_eq!(config.fares.msk_zhukovsky, 4500);
        assert_eq!(config.commission.rate(Some(City::Spb)), 0.23);
        assert_eq!(config.commission.rate(None), 0.0);
        assert!(config.column_config().is_none());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = RulesConfig::from_toml("[fares]\nspb_base = 2500\n").unwrap();
        assert_eq!(config.fares.spb_base, 2500);
        assert_eq!(config.fares.msk_base, 3200);
    }

    #[test]
    fn rejects_non_positive_fare() {
        let err = RulesConfig::from_toml("[fares]\nmsk_base = 0\n").unwrap_err();
        assert!(matches!(err, RulesError::ConfigValidation(_)));
        assert!(err.to_string().contains("msk_base"));
    }

    #[test]
    fn rejects_rate_out_of_range() {
        let err = RulesConfig::from_toml("[commission]\nspb = 1.0\n").unwrap_err();
        assert!(matches!(err, RulesError::ConfigValidation(_)));
    }

    #[test]
    fn rejects_duplicate_visible_names() {
        let input = r#"
[[columns]]
source = "A"
name = "X"

[[columns]]
source = "B"
name = "X"
"#;
        let err = RulesConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn hidden_duplicate_is_allowed() {
        let input = r#"
[[columns]]
source = "A"
name = "X"

[[columns]]
source = "B"
name = "X"
visible = false
"#;
        assert!(RulesConfig::from_toml(input).is_ok());
    }

    #[test]
    fn rejects_unknown_key() {
        let err = RulesConfig::from_toml("[fares]\nspb = 1\n").unwrap_err();
        assert!(matches!(err, RulesError::ConfigParse(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let config = RulesConfig::from_toml(FULL).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(RulesConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "[commission]\nmsk = 0.3\n").unwrap();
        let config = RulesConfig::load(&path).unwrap();
        assert_eq!(config.commission.msk, 0.3);

        let missing = RulesConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, RulesError::Io(_)));
    }
}
