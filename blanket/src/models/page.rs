//! Data islands rendered into the declaration page.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RateId, RoleBinding, TariffRate, TariffTable};

#[derive(Debug, thiserror::Error)]
pub enum PageDataError {
    #[error("Failed to read page data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed page data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rate {rate} refers to unknown parent {parent}")]
    UnknownParent { rate: RateId, parent: RateId },

    #[error("Rate {rate} is filed under id {key}")]
    MismatchedKey { key: RateId, rate: RateId },
}

/// Numeric constants (`konstanter`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Constants {
    #[serde(rename = "tillægsafgift_faktor", default)]
    pub surcharge_factor: Decimal,
    #[serde(rename = "ekspeditionsgebyr", default)]
    pub handling_fee: Decimal,
}

/// Payer metadata (`indberetter_data`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayerData {
    #[serde(default)]
    pub cvr: Option<Value>,
}

impl PayerData {
    pub fn cvr_text(&self) -> Option<String> {
        match self.cvr.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Everything the page hands to the form engine at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    #[serde(rename = "varesatser", default)]
    pub rates: BTreeMap<RateId, TariffRate>,
    #[serde(rename = "afgiftstabeller", default)]
    pub tables: Vec<TariffTable>,
    #[serde(rename = "konstanter", default)]
    pub constants: Constants,
    #[serde(rename = "aktører", default)]
    pub roles: Vec<RoleBinding>,
    /// Unit kind (`ant`, `kg`, ...) to a description template containing `%f`.
    #[serde(rename = "satsTekster", default)]
    pub rate_templates: BTreeMap<String, String>,
    #[serde(rename = "indberetter_data", default)]
    pub payer: Option<PayerData>,
}

impl PageData {
    pub fn from_json(json: &str) -> Result<Self, PageDataError> {
        let data: PageData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PageDataError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check that rates are keyed by their own id and that every parent exists.
    pub fn validate(&self) -> Result<(), PageDataError> {
        for (key, rate) in &self.rates {
            if *key != rate.id {
                return Err(PageDataError::MismatchedKey {
                    key: *key,
                    rate: rate.id,
                });
            }
            if let Some(parent) = rate.parent {
                if !self.rates.contains_key(&parent) {
                    return Err(PageDataError::UnknownParent {
                        rate: rate.id,
                        parent,
                    });
                }
            }
        }
        Ok(())
    }
}
