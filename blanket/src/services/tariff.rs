//! Tariff computation: duty per line, form totals and tariff table selection.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{
    Constants, LineInputs, LineItem, PageData, RateId, TableId, TariffRate, TariffTable,
    UNKNOWN_RATE,
};
use crate::services::effects::SelectOption;
use crate::services::money::{format_money, format_optional_money};

/// Label of the "nothing selected" option in rate selectors.
pub const UNKNOWN_RATE_LABEL: &str = "---------";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TariffError {
    #[error("Unknown tariff rate {0}")]
    UnknownRate(RateId),

    #[error("No tariff table covers {0}")]
    NoTableForDate(NaiveDate),

    #[error("Rate {rate} needs {field}")]
    MissingInput { rate: RateId, field: &'static str },

    #[error("Composite rate {0} contains itself")]
    CompositeCycle(RateId),

    #[error("Duty for rate {0} overflows")]
    Overflow(RateId),
}

/// Immutable snapshot of all rates and tables on the page.
#[derive(Debug, Clone, Default)]
pub struct TariffCatalog {
    rates: BTreeMap<RateId, TariffRate>,
    tables: Vec<TariffTable>,
}

impl TariffCatalog {
    pub fn new(rates: impl IntoIterator<Item = TariffRate>, tables: Vec<TariffTable>) -> Self {
        Self {
            rates: rates.into_iter().map(|rate| (rate.id, rate)).collect(),
            tables,
        }
    }

    pub fn from_page(page: &PageData) -> Self {
        Self {
            rates: page.rates.clone(),
            tables: page.tables.clone(),
        }
    }

    pub fn rate(&self, id: RateId) -> Option<&TariffRate> {
        self.rates.get(&id)
    }

    pub fn rates(&self) -> impl Iterator<Item = &TariffRate> {
        self.rates.values()
    }

    pub fn tables(&self) -> &[TariffTable] {
        &self.tables
    }

    /// Rates whose parent is `parent`.
    pub fn children(&self, parent: RateId) -> impl Iterator<Item = &TariffRate> {
        self.rates
            .values()
            .filter(move |rate| rate.parent == Some(parent))
    }

    /// Duty for one rate and one line's inputs.
    ///
    /// Composite rates sum their children over the same, unclamped inputs.
    pub fn compute_duty(&self, rate: &TariffRate, inputs: &LineInputs) -> Result<Decimal, TariffError> {
        let mut path = Vec::new();
        self.compute_duty_inner(rate, inputs, &mut path)
    }

    fn compute_duty_inner(
        &self,
        rate: &TariffRate,
        inputs: &LineInputs,
        path: &mut Vec<RateId>,
    ) -> Result<Decimal, TariffError> {
        use crate::models::UnitKind::*;

        let require = |value: Option<Decimal>, field: &'static str| {
            value.ok_or(TariffError::MissingInput {
                rate: rate.id,
                field,
            })
        };
        let overflow = || TariffError::Overflow(rate.id);

        match rate.unit {
            PerItem => require(inputs.count, "antal")?
                .checked_mul(rate.rate)
                .ok_or_else(overflow),
            Kilogram | Litre => require(inputs.weight_or_volume, "mængde")?
                .checked_mul(rate.rate)
                .ok_or_else(overflow),
            Percentage => {
                let base = percentage_base(rate, require(inputs.invoice_amount, "fakturabeløb")?);
                base.checked_mul(rate.rate)
                    .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                    .ok_or_else(overflow)
            }
            Composite => {
                if path.contains(&rate.id) {
                    return Err(TariffError::CompositeCycle(rate.id));
                }
                path.push(rate.id);
                let mut sum = Decimal::ZERO;
                for child in self.children(rate.id) {
                    let duty = self.compute_duty_inner(child, inputs, path)?;
                    sum = sum.checked_add(duty).ok_or_else(overflow)?;
                }
                path.pop();
                Ok(sum)
            }
        }
    }

    /// Whether the weight/volume and count inputs apply to a rate. Composite
    /// rates take the union over their children.
    pub fn input_visibility(&self, rate: &TariffRate) -> InputVisibility {
        let mut path = Vec::new();
        self.input_visibility_inner(rate, &mut path)
    }

    fn input_visibility_inner(&self, rate: &TariffRate, path: &mut Vec<RateId>) -> InputVisibility {
        if rate.unit != crate::models::UnitKind::Composite {
            return InputVisibility {
                weight_or_volume: rate.unit.uses_weight_or_volume(),
                count: rate.unit.uses_count(),
            };
        }
        if path.contains(&rate.id) {
            return InputVisibility::default();
        }
        path.push(rate.id);
        let children: Vec<&TariffRate> = self.children(rate.id).collect();
        let visibility = children
            .into_iter()
            .fold(InputVisibility::default(), |acc, child| {
                acc.union(self.input_visibility_inner(child, path))
            });
        path.pop();
        visibility
    }

    /// First table, in page order, whose window contains `date`.
    pub fn select_table(&self, date: NaiveDate) -> Result<&TariffTable, TariffError> {
        self.tables
            .iter()
            .find(|table| table.covers(date))
            .ok_or(TariffError::NoTableForDate(date))
    }

    /// Rates of one table, one per category code, ordered by code. When a
    /// code repeats the highest rate id wins.
    pub fn rates_by_code(&self, table: TableId) -> BTreeMap<u32, &TariffRate> {
        self.rates
            .values()
            .filter(|rate| rate.table == Some(table))
            .map(|rate| (rate.category_code, rate))
            .collect()
    }

    /// Selector options for a table: the unknown entry, then one per code.
    pub fn rate_options(&self, table: TableId) -> Vec<SelectOption> {
        std::iter::once(SelectOption::new(UNKNOWN_RATE.to_string(), UNKNOWN_RATE_LABEL))
            .chain(
                self.rates_by_code(table)
                    .into_values()
                    .map(|rate| SelectOption::new(rate.id.to_string(), rate.description.clone())),
            )
            .collect()
    }

    /// The rate in `table` with the same category code as `current`.
    pub fn equivalent_rate(&self, current: RateId, table: TableId) -> Option<&TariffRate> {
        let code = self.rate(current)?.category_code;
        self.rates_by_code(table).get(&code).copied()
    }

    /// The rate a line keeps when moved onto `table`: itself if it already
    /// belongs there, else the equivalent by code, else the unknown sentinel.
    pub fn rate_for_table(&self, current: RateId, table: TableId) -> RateId {
        match self.rate(current) {
            Some(rate) if rate.table == Some(table) => current,
            Some(_) => self
                .equivalent_rate(current, table)
                .map_or(UNKNOWN_RATE, |rate| rate.id),
            None => UNKNOWN_RATE,
        }
    }

    /// Look a category code up, restricted to `table` when one is active.
    pub fn find_by_code(&self, code: u32, table: Option<TableId>) -> Option<&TariffRate> {
        self.rates.values().find(|rate| {
            rate.category_code == code && table.map_or(true, |t| rate.table == Some(t))
        })
    }
}

/// Invoice amount after applying the rate's segment bounds.
///
/// `max(0, min(amount, upper) - lower)`, each bound applying only when set.
pub fn percentage_base(rate: &TariffRate, invoice_amount: Decimal) -> Decimal {
    let mut base = invoice_amount;
    if let Some(upper) = rate.upper_bound() {
        base = base.min(upper);
    }
    if let Some(lower) = rate.lower_bound() {
        base = (base - lower).max(Decimal::ZERO);
    }
    base
}

/// Zero-padded category code, e.g. `7` → `"007"` for width 3.
pub fn format_category_code(code: u32, width: usize) -> String {
    format!("{:0width$}", code, width = width)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InputVisibility {
    #[serde(rename = "mængde")]
    pub weight_or_volume: bool,
    #[serde(rename = "antal")]
    pub count: bool,
}

impl InputVisibility {
    fn union(self, other: Self) -> Self {
        Self {
            weight_or_volume: self.weight_or_volume || other.weight_or_volume,
            count: self.count || other.count,
        }
    }
}

/// Values derived for one line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineDerived {
    #[serde(rename = "varekode")]
    pub category_code: Option<String>,
    #[serde(rename = "afgiftssats")]
    pub rate_text: Option<String>,
    #[serde(rename = "afgiftsbeløb")]
    pub duty: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<InputVisibility>,
    #[serde(skip)]
    pub alcohol_surcharge: bool,
    #[serde(skip)]
    pub requires_import_permit: bool,
}

impl LineDerived {
    pub fn formatted_duty(&self) -> String {
        format_optional_money(self.duty)
    }
}

/// The four form-wide sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub duty: Decimal,
    pub surcharge: Decimal,
    pub handling_fee: Decimal,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedTotals {
    #[serde(rename = "sum-afgiftsbeløb")]
    pub duty: String,
    #[serde(rename = "sum-tillægsafgift")]
    pub surcharge: String,
    #[serde(rename = "ekspeditionsgebyr")]
    pub handling_fee: String,
    #[serde(rename = "sum-total")]
    pub grand_total: String,
}

impl Totals {
    pub fn formatted(&self) -> FormattedTotals {
        FormattedTotals {
            duty: format_money(self.duty),
            surcharge: format_money(self.surcharge),
            handling_fee: format_money(self.handling_fee),
            grand_total: format_money(self.grand_total),
        }
    }
}

/// Rate catalogue plus the page constants and display settings needed to
/// derive everything shown next to a line.
#[derive(Debug, Clone)]
pub struct TariffEngine {
    catalog: TariffCatalog,
    constants: Constants,
    rate_templates: BTreeMap<String, String>,
    code_width: usize,
}

impl TariffEngine {
    pub fn new(
        catalog: TariffCatalog,
        constants: Constants,
        rate_templates: BTreeMap<String, String>,
        code_width: usize,
    ) -> Self {
        Self {
            catalog,
            constants,
            rate_templates,
            code_width,
        }
    }

    pub fn from_page(page: &PageData, code_width: usize) -> Self {
        Self::new(
            TariffCatalog::from_page(page),
            page.constants,
            page.rate_templates.clone(),
            code_width,
        )
    }

    pub fn catalog(&self) -> &TariffCatalog {
        &self.catalog
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn code_width(&self) -> usize {
        self.code_width
    }

    pub fn format_code(&self, code: u32) -> String {
        format_category_code(code, self.code_width)
    }

    /// Description text: the unit's template with `%f` replaced by the rate.
    pub fn rate_text(&self, rate: &TariffRate) -> String {
        let amount = format_money(rate.rate);
        match self.rate_templates.get(rate.unit.as_str()) {
            Some(template) => template.replace("%f", &amount),
            None => amount,
        }
    }

    /// Derived display values for a line. An unknown rate yields blank fields.
    pub fn derive_line(&self, line: &LineItem) -> LineDerived {
        let Some(rate) = line.selected_rate().and_then(|id| self.catalog.rate(id)) else {
            return LineDerived::default();
        };

        let duty = match self.catalog.compute_duty(rate, &line.inputs) {
            Ok(duty) => Some(duty),
            Err(e) => {
                tracing::debug!(rate_id = rate.id, error = %e, "Duty not computable");
                None
            }
        };

        LineDerived {
            category_code: Some(self.format_code(rate.category_code)),
            rate_text: Some(self.rate_text(rate)),
            duty,
            visibility: Some(self.catalog.input_visibility(rate)),
            alcohol_surcharge: rate.alcohol_surcharge,
            requires_import_permit: rate.requires_import_permit,
        }
    }

    /// Form totals over derived lines. Lines without a resolved rate or a
    /// computable duty contribute nothing.
    pub fn totals<'a>(&self, lines: impl IntoIterator<Item = &'a LineDerived>) -> Totals {
        let mut duty = Decimal::ZERO;
        let mut surcharge_base = Decimal::ZERO;
        for line in lines {
            let Some(amount) = line.duty else { continue };
            duty = duty.saturating_add(amount);
            if line.alcohol_surcharge {
                surcharge_base = surcharge_base.saturating_add(amount);
            }
        }

        let surcharge = self.constants.surcharge_factor.saturating_mul(surcharge_base);
        let handling_fee = self.constants.handling_fee;
        Totals {
            duty,
            surcharge,
            handling_fee,
            grand_total: duty.saturating_add(surcharge).saturating_add(handling_fee),
        }
    }
}
