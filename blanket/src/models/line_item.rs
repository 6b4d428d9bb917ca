//! Line item (varelinje) model.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RateId;

/// Value of the rate selector when nothing is selected.
pub const UNKNOWN_RATE: RateId = -1;

/// Numeric inputs of one line. `None` means the field was empty or not a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineInputs {
    #[serde(rename = "mængde", default)]
    pub weight_or_volume: Option<Decimal>,
    #[serde(rename = "antal", default)]
    pub count: Option<Decimal>,
    #[serde(rename = "fakturabeløb", default)]
    pub invoice_amount: Option<Decimal>,
}

impl LineInputs {
    /// Build inputs from raw form values.
    pub fn from_form(weight_or_volume: &str, count: &str, invoice_amount: &str) -> Self {
        Self {
            weight_or_volume: parse_number(weight_or_volume),
            count: parse_number(count),
            invoice_amount: parse_number(invoice_amount),
        }
    }
}

/// One line as submitted: the selected rate plus its inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "vareafgiftssats", default)]
    pub rate_id: Option<RateId>,
    #[serde(flatten)]
    pub inputs: LineInputs,
}

impl LineItem {
    /// The selected rate, treating the `-1` sentinel as no selection.
    pub fn selected_rate(&self) -> Option<RateId> {
        self.rate_id.filter(|id| *id != UNKNOWN_RATE)
    }
}

/// Parse a form number the way the browser hands it over: plain decimal
/// notation with `.` as the separator. Empty or malformed input yields `None`.
pub fn parse_number(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

/// Parse a rate selector value; anything that is not an integer is `None`.
pub fn parse_rate_id(raw: &str) -> Option<RateId> {
    raw.trim().parse::<RateId>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_values() {
        let inputs = LineInputs::from_form("12.5", "", "abc");
        assert_eq!(inputs.weight_or_volume, Some(Decimal::new(125, 1)));
        assert_eq!(inputs.count, None);
        assert_eq!(inputs.invoice_amount, None);
    }

    #[test]
    fn sentinel_is_not_a_selection() {
        let line = LineItem {
            rate_id: Some(UNKNOWN_RATE),
            inputs: LineInputs::default(),
        };
        assert_eq!(line.selected_rate(), None);
        assert_eq!(parse_rate_id(" 12 "), Some(12));
        assert_eq!(parse_rate_id(""), None);
    }
}
