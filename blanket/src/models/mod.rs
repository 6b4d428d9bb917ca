//! Domain models for the declaration form.

mod counterparty;
mod line_item;
mod page;
mod tariff;

pub use counterparty::{Candidate, LookupResponse, RoleBinding};
pub use line_item::{parse_number, parse_rate_id, LineInputs, LineItem, UNKNOWN_RATE};
pub use page::{Constants, PageData, PageDataError, PayerData};
pub use tariff::{RateId, TableId, TariffRate, TariffTable, UnitKind};
