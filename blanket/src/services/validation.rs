//! Server-side checks on a submitted declaration.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{LineItem, UnitKind};
use crate::services::formset::{AMOUNT_FIELD, COUNT_FIELD, RATE_FIELD, WEIGHT_FIELD};
use crate::services::tariff::TariffCatalog;

pub const REQUIRED_MESSAGE: &str = "Dette felt er påkrævet.";
pub const UNKNOWN_RATE_MESSAGE: &str = "Ukendt varekode";
pub const IMPORT_PERMIT_FIELD: &str = "indførselstilladelse";
pub const IMPORT_PERMIT_MESSAGE: &str = "Indførselstilladelse er påkrævet med de angivne varearter";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Line index, absent for declaration-level fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn line(index: usize, field: &str, message: &str) -> Self {
        Self {
            line: Some(index),
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

fn is_blank(value: Option<Decimal>) -> bool {
    value.map_or(true, |v| v.is_zero())
}

/// Inputs a line's unit needs that are missing or zero.
pub fn validate_line(catalog: &TariffCatalog, index: usize, line: &LineItem) -> Vec<FieldError> {
    let Some(rate) = line.selected_rate().and_then(|id| catalog.rate(id)) else {
        return vec![FieldError::line(index, RATE_FIELD, UNKNOWN_RATE_MESSAGE)];
    };

    let inputs = &line.inputs;
    let mut errors = Vec::new();
    match rate.unit {
        UnitKind::Kilogram | UnitKind::Litre if is_blank(inputs.weight_or_volume) => {
            errors.push(FieldError::line(index, WEIGHT_FIELD, REQUIRED_MESSAGE));
        }
        UnitKind::PerItem if is_blank(inputs.count) => {
            errors.push(FieldError::line(index, COUNT_FIELD, REQUIRED_MESSAGE));
        }
        UnitKind::Percentage | UnitKind::Composite if is_blank(inputs.invoice_amount) => {
            errors.push(FieldError::line(index, AMOUNT_FIELD, REQUIRED_MESSAGE));
        }
        _ => {}
    }
    errors
}

/// Without an import permit no line may use a rate that requires one.
pub fn validate_import_permit<'a>(
    catalog: &TariffCatalog,
    permit: Option<&str>,
    lines: impl IntoIterator<Item = &'a LineItem>,
) -> Option<FieldError> {
    if permit.is_some_and(|p| !p.trim().is_empty()) {
        return None;
    }
    lines
        .into_iter()
        .filter_map(|line| line.selected_rate().and_then(|id| catalog.rate(id)))
        .any(|rate| rate.requires_import_permit)
        .then(|| FieldError {
            line: None,
            field: IMPORT_PERMIT_FIELD.to_string(),
            message: IMPORT_PERMIT_MESSAGE.to_string(),
        })
}
