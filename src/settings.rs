use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::models::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub rates: Rates,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            rates: Rates::default(),
        }
    }
}

impl Settings {
    pub fn raw_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("processed")
    }

    pub fn canonical_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("data")
    }
}

/// Business constants read from provider statements. Kept in settings so a
/// contract change is a config edit, not a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rates {
    pub tax_rate: f64,
    pub beyond_menu: BeyondMenuRates,
    pub brygid: BrygidRates,
    pub eatstreet: EatStreetRates,
    pub office_express: OfficeExpressRates,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            tax_rate: 0.0775,
            beyond_menu: BeyondMenuRates::default(),
            brygid: BrygidRates::default(),
            eatstreet: EatStreetRates::default(),
            office_express: OfficeExpressRates::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeyondMenuRates {
    pub order_fee: f64,
    pub merchant_processing_rate: f64,
    pub stores: BTreeMap<Store, StoreFees>,
}

impl Default for BeyondMenuRates {
    fn default() -> Self {
        let mut stores = BTreeMap::new();
        stores.insert(
            Store::Ameci,
            StoreFees {
                fax_fee: 0.12,
                phone_fee: 0.08,
                commission_rate: 0.03,
            },
        );
        stores.insert(Store::Aroma, StoreFees::default());
        Self {
            order_fee: 0.99,
            merchant_processing_rate: 0.043,
            stores,
        }
    }
}

impl BeyondMenuRates {
    pub fn store_fees(&self, store: Store) -> StoreFees {
        self.stores.get(&store).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFees {
    pub fax_fee: f64,
    pub phone_fee: f64,
    pub commission_rate: f64,
}

impl Default for StoreFees {
    fn default() -> Self {
        Self {
            fax_fee: 0.0,
            phone_fee: 0.0,
            commission_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrygidRates {
    pub commission_rate: f64,
    pub commission_min: f64,
    pub commission_max: f64,
}

impl Default for BrygidRates {
    fn default() -> Self {
        Self {
            commission_rate: 0.025,
            commission_min: 0.50,
            commission_max: 2.00,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EatStreetRates {
    pub estimated_delivery_fee: f64,
}

impl Default for EatStreetRates {
    fn default() -> Self {
        Self {
            estimated_delivery_fee: 2.99,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficeExpressRates {
    pub commission_rate: f64,
}

impl Default for OfficeExpressRates {
    fn default() -> Self {
        Self {
            commission_rate: 0.30,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tally")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("tally")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TallyError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings {
            data_dir: "/tmp/test".to_string(),
            rates: Rates::default(),
        };
        settings.rates.tax_rate = 0.1;
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.rates.tax_rate, 0.1);
        assert_eq!(loaded.rates.beyond_menu.store_fees(Store::Ameci).fax_fee, 0.12);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "rates": {"brygid": {"commission_max": 3.0}}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.rates.tax_rate, 0.0775);
        assert_eq!(s.rates.brygid.commission_max, 3.0);
        assert_eq!(s.rates.brygid.commission_min, 0.5);
        assert_eq!(s.rates.eatstreet.estimated_delivery_fee, 2.99);
    }

    #[test]
    fn test_unconfigured_store_gets_default_fees() {
        let mut rates = BeyondMenuRates::default();
        rates.stores.clear();
        let fees = rates.store_fees(Store::Aroma);
        assert_eq!(fees.commission_rate, 0.05);
        assert_eq!(fees.fax_fee, 0.0);
    }

    #[test]
    fn test_stage_directories() {
        let s = Settings {
            data_dir: "/srv/tally".to_string(),
            rates: Rates::default(),
        };
        assert_eq!(s.raw_dir(), PathBuf::from("/srv/tally/raw"));
        assert_eq!(s.processed_dir(), PathBuf::from("/srv/tally/processed"));
        assert_eq!(s.canonical_dir(), PathBuf::from("/srv/tally/data"));
    }
}
