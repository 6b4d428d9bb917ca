//! Tariff rate and tariff table models.
//!
//! Field names on the wire follow the server's JSON (`afgiftssats`, `enhed`,
//! ...); the Rust side uses descriptive names.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type RateId = i64;
pub type TableId = i64;

/// How a rate turns line quantities into a duty amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    #[serde(rename = "ant")]
    PerItem,
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "l")]
    Litre,
    #[serde(rename = "pct")]
    Percentage,
    #[serde(rename = "sam")]
    Composite,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::PerItem => "ant",
            UnitKind::Kilogram => "kg",
            UnitKind::Litre => "l",
            UnitKind::Percentage => "pct",
            UnitKind::Composite => "sam",
        }
    }

    /// Whether the weight/volume input (`mængde`) applies.
    pub fn uses_weight_or_volume(&self) -> bool {
        matches!(
            self,
            UnitKind::Kilogram | UnitKind::Litre | UnitKind::Percentage
        )
    }

    /// Whether the count input (`antal`) applies.
    pub fn uses_count(&self) -> bool {
        matches!(self, UnitKind::PerItem | UnitKind::Percentage)
    }
}

/// A single goods category rate (`Vareafgiftssats`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffRate {
    pub id: RateId,
    #[serde(rename = "afgiftstabel", default)]
    pub table: Option<TableId>,
    #[serde(rename = "vareart_da", default)]
    pub description: String,
    #[serde(rename = "vareart_kl", default)]
    pub description_kl: String,
    #[serde(rename = "afgiftsgruppenummer")]
    pub category_code: u32,
    #[serde(rename = "enhed")]
    pub unit: UnitKind,
    #[serde(rename = "afgiftssats")]
    pub rate: Decimal,
    #[serde(rename = "segment_nedre", default)]
    pub segment_lower: Option<Decimal>,
    #[serde(rename = "segment_øvre", default)]
    pub segment_upper: Option<Decimal>,
    #[serde(rename = "overordnet", default)]
    pub parent: Option<RateId>,
    #[serde(rename = "har_privat_tillægsafgift_alkohol", default)]
    pub alcohol_surcharge: bool,
    #[serde(rename = "kræver_indførselstilladelse", default)]
    pub requires_import_permit: bool,
    /// Carried for display; the duty computation does not apply it.
    #[serde(rename = "minimumsbeløb", default)]
    pub minimum_amount: Option<Decimal>,
    #[serde(rename = "synlig_privat", default)]
    pub visible_private: bool,
}

impl TariffRate {
    /// Upper segment bound, ignoring an unset or zero value.
    pub fn upper_bound(&self) -> Option<Decimal> {
        self.segment_upper.filter(|v| !v.is_zero())
    }

    /// Lower segment bound, ignoring an unset or zero value.
    pub fn lower_bound(&self) -> Option<Decimal> {
        self.segment_lower.filter(|v| !v.is_zero())
    }
}

/// A dated collection of rates (`Afgiftstabel`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffTable {
    pub id: TableId,
    #[serde(rename = "gyldig_fra", default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(rename = "gyldig_til", default)]
    pub valid_to: Option<NaiveDate>,
    #[serde(rename = "kladde", default)]
    pub draft: bool,
}

impl TariffTable {
    /// Half-open validity check: `valid_from <= date < valid_to`.
    ///
    /// A table without `valid_from` (an unpublished draft) never matches.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match self.valid_from {
            Some(from) => from <= date && self.valid_to.map_or(true, |to| date < to),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn deserializes_server_json() {
        let rate: TariffRate = serde_json::from_value(serde_json::json!({
            "id": 7,
            "afgiftstabel": 1,
            "vareart_da": "SUKKER og sirup",
            "vareart_kl": "SUKKER og sirup",
            "afgiftsgruppenummer": 1,
            "enhed": "kg",
            "afgiftssats": "6.00",
            "segment_nedre": null,
            "segment_øvre": null,
            "overordnet": null,
            "har_privat_tillægsafgift_alkohol": false,
            "kræver_indførselstilladelse": false,
            "minimumsbeløb": null,
            "synlig_privat": false
        }))
        .unwrap();

        assert_eq!(rate.unit, UnitKind::Kilogram);
        assert_eq!(rate.rate, Decimal::new(600, 2));
        assert_eq!(rate.table, Some(1));
        assert!(rate.upper_bound().is_none());
    }

    #[test]
    fn zero_segment_bounds_are_ignored() {
        let rate: TariffRate = serde_json::from_value(serde_json::json!({
            "id": 1,
            "afgiftsgruppenummer": 70,
            "enhed": "pct",
            "afgiftssats": 50,
            "segment_nedre": "0.00",
            "segment_øvre": "0"
        }))
        .unwrap();

        assert!(rate.lower_bound().is_none());
        assert!(rate.upper_bound().is_none());
    }

    #[test]
    fn table_window_is_half_open() {
        let table = TariffTable {
            id: 1,
            valid_from: Some(date("2024-01-01")),
            valid_to: Some(date("2024-07-01")),
            draft: false,
        };

        assert!(!table.covers(date("2023-12-31")));
        assert!(table.covers(date("2024-01-01")));
        assert!(table.covers(date("2024-06-30")));
        assert!(!table.covers(date("2024-07-01")));
    }

    #[test]
    fn open_ended_and_draft_tables() {
        let open = TariffTable {
            id: 2,
            valid_from: Some(date("2024-07-01")),
            valid_to: None,
            draft: false,
        };
        let draft = TariffTable {
            id: 3,
            valid_from: None,
            valid_to: None,
            draft: true,
        };

        assert!(open.covers(date("2099-01-01")));
        assert!(!draft.covers(date("2024-07-01")));
    }
}
