use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{LineItem, RateId, TableId};
use crate::services::tariff::{FormattedTotals, InputVisibility, LineDerived};
use crate::services::validation::FieldError;

#[derive(Debug, Deserialize, Validate)]
pub struct BeregningRequest {
    /// Declaration date; when set, lines are moved onto the table covering it.
    #[serde(default)]
    pub indleveringsdato: Option<NaiveDate>,

    #[serde(rename = "indførselstilladelse", default)]
    pub import_permit: Option<String>,

    #[validate(length(min = 1, message = "At least one line is required"))]
    pub varelinjer: Vec<LineItem>,
}

#[derive(Debug, Serialize)]
pub struct LineResult {
    /// The rate actually used, after any move to the date's table.
    #[serde(rename = "vareafgiftssats")]
    pub rate_id: Option<RateId>,
    #[serde(rename = "varekode")]
    pub category_code: String,
    #[serde(rename = "afgiftssats")]
    pub rate_text: String,
    #[serde(rename = "afgiftsbeløb")]
    pub duty: String,
    #[serde(rename = "visning", skip_serializing_if = "Option::is_none")]
    pub visibility: Option<InputVisibility>,
}

impl LineResult {
    pub fn new(rate_id: Option<RateId>, derived: &LineDerived) -> Self {
        Self {
            rate_id,
            category_code: derived.category_code.clone().unwrap_or_default(),
            rate_text: derived.rate_text.clone().unwrap_or_default(),
            duty: derived.formatted_duty(),
            visibility: derived.visibility,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BeregningResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afgiftstabel: Option<TableId>,
    pub varelinjer: Vec<LineResult>,
    pub fejl: Vec<FieldError>,
    pub summer: FormattedTotals,
}
