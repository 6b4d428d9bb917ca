use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{TariffRate, TariffTable};
use crate::services::effects::SelectOption;

#[derive(Debug, Deserialize)]
pub struct VaresatserQuery {
    pub dato: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct VaresatserResponse {
    pub afgiftstabel: TariffTable,
    /// Selector options: the unknown entry, then one per category code.
    pub valgmuligheder: Vec<SelectOption>,
    pub varesatser: Vec<TariffRate>,
}
