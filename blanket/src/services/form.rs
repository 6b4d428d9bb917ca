//! The declaration form as a state machine.
//!
//! [`DeclarationForm::apply`] takes one user or network event, updates the
//! form's state and returns the effects the host must apply to its document
//! together with any counterparty lookups to perform.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::{parse_rate_id, LookupResponse, PageData, PayerData, TableId, UNKNOWN_RATE};
use crate::services::effects::Effect;
use crate::services::formset::{
    FormField, FormRow, Formset, FormsetError, FormsetEvent, RowKey, COUNT_FIELD, RATE_FIELD, WEIGHT_FIELD,
};
use crate::services::lookup_client::{lookup_or_warn, CounterpartyLookup};
use crate::services::required::{is_draft, FieldSelector, RequiredPolicy, RequiredRule};
use crate::services::resolver::{CounterpartyResolver, LookupRequest};
use crate::services::tariff::{LineDerived, TariffCatalog, TariffEngine, TariffError};
use crate::services::validation::{IMPORT_PERMIT_FIELD, UNKNOWN_RATE_MESSAGE};

pub const DATE_FIELD: &str = "indleveringsdato";
pub const DRAFT_FIELD: &str = "kladde";

pub const CODE_VALUE: &str = "varekode";
pub const RATE_TEXT_VALUE: &str = "afgiftssats";
pub const DUTY_VALUE: &str = "afgiftsbeløb";

pub const SUM_DUTY: &str = "sum-afgiftsbeløb";
pub const SUM_SURCHARGE: &str = "sum-tillægsafgift";
pub const HANDLING_FEE: &str = "ekspeditionsgebyr";
pub const SUM_TOTAL: &str = "sum-total";

pub const PAYER_OPTION: &str = "#id_betales_af option[value=indberetter]";

static LEADING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]+)").expect("Invalid category code pattern"));

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error(transparent)]
    Formset(#[from] FormsetError),

    #[error(transparent)]
    Tariff(#[from] TariffError),
}

/// A file input with a size limit and the inputs that mirror its state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileField {
    pub name: String,
    pub max_size: Option<u64>,
    pub overflow_message: String,
    /// Inputs whose `data-fileinput` names this field.
    pub associated: Vec<String>,
}

/// `data-required-field` / `data-required-values` as found on a target field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAttributes {
    pub target: String,
    pub field: String,
    pub values: String,
}

/// Static structure of the rendered form.
#[derive(Debug, Clone)]
pub struct FormLayout {
    pub prefix: String,
    /// Fields of the prototype row, named with the index placeholder.
    pub prototype: Vec<FormField>,
    /// Initial rows, already indexed.
    pub rows: Vec<Vec<FormField>>,
    /// Current values of every field outside the formset.
    pub values: BTreeMap<String, String>,
    pub required_rules: Vec<RuleAttributes>,
    /// Fields carrying a plain `required` attribute.
    pub always_required: Vec<String>,
    /// Label text by field name.
    pub labels: BTreeMap<String, String>,
    pub file_fields: Vec<FileField>,
    /// Current text of the payer option of `betales_af`.
    pub payer_option_label: Option<String>,
}

impl Default for FormLayout {
    fn default() -> Self {
        Self {
            prefix: "form".to_string(),
            prototype: Vec::new(),
            rows: Vec::new(),
            values: BTreeMap::new(),
            required_rules: Vec::new(),
            always_required: Vec::new(),
            labels: BTreeMap::new(),
            file_fields: Vec::new(),
            payer_option_label: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    /// A field outside the formset changed.
    FieldChanged { name: String, value: String },
    /// A row field changed; `field` is the unindexed suffix such as `antal`.
    RowFieldChanged { row: RowKey, field: String, value: String },
    /// Text typed into a row's category code input.
    CategoryCodeInput { row: RowKey, text: String },
    AddRow,
    RemoveRow { row: RowKey },
    CandidateSelected { role: String, candidate: String },
    LookupCompleted { role: String, seq: u64, response: LookupResponse },
    FileSelected { name: String, size: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transition {
    pub effects: Vec<Effect>,
    pub requests: Vec<LookupRequest>,
}

impl From<Vec<Effect>> for Transition {
    fn from(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            requests: Vec::new(),
        }
    }
}

pub struct DeclarationForm {
    engine: Arc<TariffEngine>,
    formset: Formset,
    values: BTreeMap<String, String>,
    derived: BTreeMap<RowKey, LineDerived>,
    active_table: Option<TableId>,
    resolver: CounterpartyResolver,
    required: RequiredPolicy,
    file_fields: Vec<FileField>,
    payer: Option<PayerData>,
    payer_option_label: Option<String>,
}

impl DeclarationForm {
    pub fn new(engine: Arc<TariffEngine>, page: &PageData, layout: FormLayout) -> Self {
        let mut rules: Vec<RequiredRule> = layout
            .required_rules
            .iter()
            .filter_map(|attrs| {
                let rule = RequiredRule::from_attributes(&attrs.target, &attrs.field, &attrs.values);
                if rule.is_none() {
                    tracing::warn!(target_field = %attrs.target, expr = %attrs.field, "Unsupported required-field selector");
                }
                rule
            })
            .collect();
        if !rules.iter().any(|rule| rule.target == IMPORT_PERMIT_FIELD) {
            rules.extend(import_permit_rule(engine.catalog()));
        }

        Self {
            formset: Formset::new(layout.prefix, layout.prototype, layout.rows),
            values: layout.values,
            derived: BTreeMap::new(),
            active_table: None,
            resolver: CounterpartyResolver::new(&page.roles),
            required: RequiredPolicy::new(rules, layout.always_required, layout.labels),
            file_fields: layout.file_fields,
            payer: page.payer.clone(),
            payer_option_label: layout.payer_option_label,
            engine,
        }
    }

    pub fn formset(&self) -> &Formset {
        &self.formset
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn active_table(&self) -> Option<TableId> {
        self.active_table
    }

    pub fn derived(&self, row: RowKey) -> Option<&LineDerived> {
        self.derived.get(&row)
    }

    pub fn is_draft(&self) -> bool {
        is_draft(self.value(DRAFT_FIELD))
    }

    /// Everything the page needs right after load.
    pub fn initial_effects(&mut self) -> Vec<Effect> {
        let keys: Vec<RowKey> = self.formset.rows().iter().map(FormRow::key).collect();
        let mut effects = Vec::new();
        for key in keys {
            effects.extend(self.recompute_row(key));
        }
        effects.extend(self.totals_effects());
        effects.extend(self.controls_effects());
        effects.push(self.total_forms_effect());
        effects.extend(self.required_effects());
        let draft = self.is_draft();
        effects.extend(self.required.evaluate_draft(draft));
        effects.extend(self.payer_effects());
        effects
    }

    pub fn apply(&mut self, event: FormEvent) -> Result<Transition, FormError> {
        match event {
            FormEvent::FieldChanged { name, value } => self.field_changed(name, value),
            FormEvent::RowFieldChanged { row, field, value } => {
                self.row_field_changed(row, &field, value).map(Transition::from)
            }
            FormEvent::CategoryCodeInput { row, text } => {
                self.category_code_input(row, &text).map(Transition::from)
            }
            FormEvent::AddRow => Ok(self.add_row().into()),
            FormEvent::RemoveRow { row } => self.remove_row(row).map(Transition::from),
            FormEvent::CandidateSelected { role, candidate } => {
                let effects = self.resolver.on_select(&role, &candidate, &self.values);
                self.absorb(&effects);
                Ok(effects.into())
            }
            FormEvent::LookupCompleted { role, seq, response } => {
                let effects = self.resolver.on_response(&role, seq, response, &self.values);
                self.absorb(&effects);
                Ok(effects.into())
            }
            FormEvent::FileSelected { name, size } => Ok(self.file_selected(&name, size).into()),
        }
    }

    /// Run the lookups a transition asked for and fold the responses back in.
    /// Failed lookups leave the form as it was.
    pub async fn complete_lookups(
        &mut self,
        lookup: &dyn CounterpartyLookup,
        requests: Vec<LookupRequest>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        for request in requests {
            let Some(response) = lookup_or_warn(lookup, &request).await else {
                continue;
            };
            let role_effects =
                self.resolver
                    .on_response(&request.role, request.seq, response, &self.values);
            self.absorb(&role_effects);
            effects.extend(role_effects);
        }
        effects
    }

    fn field_changed(&mut self, name: String, value: String) -> Result<Transition, FormError> {
        let mut effects = Vec::new();

        if name == DATE_FIELD {
            match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
                Ok(date) => effects.extend(self.switch_table(date)?),
                Err(e) => tracing::debug!(value = %value, error = %e, "Ignoring unparsable declaration date"),
            }
        }

        self.values.insert(name.clone(), value);

        if name == DRAFT_FIELD {
            effects.extend(self.required_effects());
            let draft = self.is_draft();
            effects.extend(self.required.evaluate_draft(draft));
        } else if self.required.watches(&name) {
            effects.extend(self.required_effects());
        }

        let (resolver_effects, request) = self.resolver.on_field_change(&name, &self.values);
        effects.extend(resolver_effects);

        Ok(Transition {
            effects,
            requests: request.into_iter().collect(),
        })
    }

    fn row_field_changed(&mut self, key: RowKey, field: &str, value: String) -> Result<Vec<Effect>, FormError> {
        let row = self.formset.row_mut(key).ok_or(FormsetError::UnknownRow(key))?;
        let Some(name) = row.set_value(field, value) else {
            tracing::debug!(row = key, field, "Row has no such field");
            return Ok(Vec::new());
        };

        let mut effects = self.recompute_row(key);
        effects.extend(self.totals_effects());
        if self.required.watches(&name) {
            effects.extend(self.required_effects());
        }
        Ok(effects)
    }

    fn category_code_input(&mut self, key: RowKey, text: &str) -> Result<Vec<Effect>, FormError> {
        let index = self.formset.index_of(key).ok_or(FormsetError::UnknownRow(key))?;
        let Some(code) = leading_code(text) else {
            return Ok(Vec::new());
        };
        let code_text = self.engine.format_code(code);
        let found = self
            .engine
            .catalog()
            .find_by_code(code, self.active_table)
            .map(|rate| rate.id);

        let mut effects = Vec::new();
        if let Some(row) = self.formset.row_mut(key) {
            let selected = found.unwrap_or(UNKNOWN_RATE).to_string();
            if let Some(name) = row.set_value(RATE_FIELD, selected.clone()) {
                effects.push(Effect::value(name, selected));
            }
        }
        effects.extend(self.recompute_row(key));

        let target = self.derived_target(index, CODE_VALUE);
        effects.push(Effect::value(target.clone(), code_text.clone()));
        match found {
            Some(_) => {
                effects.push(Effect::validity(target.clone(), None));
                effects.push(Effect::title(target, code_text));
            }
            None => {
                effects.push(Effect::validity(target.clone(), Some(UNKNOWN_RATE_MESSAGE.to_string())));
                effects.push(Effect::title(target, UNKNOWN_RATE_MESSAGE));
            }
        }

        effects.extend(self.totals_effects());
        effects.extend(self.required_effects());
        Ok(effects)
    }

    fn add_row(&mut self) -> Vec<Effect> {
        let (key, _) = self.formset.add_row();
        let Some(index) = self.formset.index_of(key) else {
            return Vec::new();
        };

        let mut effects = vec![Effect::RowAdded { index }, self.total_forms_effect()];
        if let Some(table) = self.active_table {
            let name = self
                .formset
                .row(key)
                .and_then(|row| row.name_of(RATE_FIELD))
                .map(str::to_string);
            if let Some(name) = name {
                effects.push(Effect::SetOptions {
                    target: name,
                    options: self.engine.catalog().rate_options(table),
                });
            }
        }
        effects.extend(self.recompute_row(key));
        effects.extend(self.totals_effects());
        effects.extend(self.controls_effects());
        effects.extend(self.required_effects());
        effects
    }

    fn remove_row(&mut self, key: RowKey) -> Result<Vec<Effect>, FormError> {
        let events = self.formset.remove_row(key)?;
        self.derived.remove(&key);

        let mut effects: Vec<Effect> = events
            .into_iter()
            .filter_map(|event| match event {
                FormsetEvent::Removed { index, .. } => {
                    Some(Effect::RowRemoved { index })
                }
                _ => None,
            })
            .collect();
        effects.push(self.total_forms_effect());
        effects.extend(self.totals_effects());
        effects.extend(self.controls_effects());
        effects.extend(self.required_effects());
        Ok(effects)
    }

    /// Select the table covering `date` and move every row onto it. Fails
    /// without touching any state when no table covers the date.
    fn switch_table(&mut self, date: NaiveDate) -> Result<Vec<Effect>, FormError> {
        let engine = Arc::clone(&self.engine);
        let catalog = engine.catalog();
        let table = catalog.select_table(date)?.id;
        self.active_table = Some(table);
        tracing::info!(table, %date, "Tariff table selected");

        let options = catalog.rate_options(table);
        let mut effects = Vec::new();
        if let Some(field) = self
            .formset
            .prototype()
            .iter()
            .find(|f| f.name.ends_with(RATE_FIELD))
        {
            effects.push(Effect::SetOptions {
                target: field.name.clone(),
                options: options.clone(),
            });
        }

        let keys: Vec<RowKey> = self.formset.rows().iter().map(FormRow::key).collect();
        for key in keys {
            let Some(row) = self.formset.row_mut(key) else {
                continue;
            };
            let next = match parse_rate_id(row.value(RATE_FIELD)) {
                Some(current) => catalog.rate_for_table(current, table),
                _ => UNKNOWN_RATE,
            };
            if let Some(name) = row.set_value(RATE_FIELD, next.to_string()) {
                effects.push(Effect::SetOptions {
                    target: name.clone(),
                    options: options.clone(),
                });
                effects.push(Effect::value(name, next.to_string()));
            }
            effects.extend(self.recompute_row(key));
        }
        effects.extend(self.totals_effects());
        effects.extend(self.required_effects());
        Ok(effects)
    }

    fn file_selected(&self, name: &str, size: u64) -> Vec<Effect> {
        let Some(field) = self.file_fields.iter().find(|f| f.name == name) else {
            return Vec::new();
        };
        let message = field
            .max_size
            .filter(|max| size > *max)
            .map(|_| field.overflow_message.clone());

        let mut effects = vec![Effect::validity(field.name.clone(), message.clone())];
        for associated in &field.associated {
            effects.push(Effect::validity(associated.clone(), message.clone()));
            effects.push(Effect::title(associated.clone(), message.clone().unwrap_or_default()));
        }
        effects
    }

    /// Re-derive one row and emit its display values.
    fn recompute_row(&mut self, key: RowKey) -> Vec<Effect> {
        let (Some(index), Some(row)) = (self.formset.index_of(key), self.formset.row(key)) else {
            return Vec::new();
        };
        let derived = self.engine.derive_line(&row.line_item());

        let code_target = self.derived_target(index, CODE_VALUE);
        let mut effects = vec![Effect::value(
            code_target.clone(),
            derived.category_code.clone().unwrap_or_default(),
        )];
        if let Some(code) = &derived.category_code {
            effects.push(Effect::title(code_target, code.clone()));
        }
        effects.push(Effect::value(
            self.derived_target(index, RATE_TEXT_VALUE),
            derived.rate_text.clone().unwrap_or_default(),
        ));
        effects.push(Effect::value(
            self.derived_target(index, DUTY_VALUE),
            derived.formatted_duty(),
        ));
        if let Some(visibility) = derived.visibility {
            if let Some(name) = row.name_of(WEIGHT_FIELD) {
                effects.push(Effect::visible(name, visibility.weight_or_volume));
            }
            if let Some(name) = row.name_of(COUNT_FIELD) {
                effects.push(Effect::visible(name, visibility.count));
            }
        }

        self.derived.insert(key, derived);
        effects
    }

    fn totals_effects(&self) -> Vec<Effect> {
        let lines = self
            .formset
            .rows()
            .iter()
            .filter_map(|row| self.derived.get(&row.key()));
        let totals = self.engine.totals(lines).formatted();
        vec![
            Effect::value(SUM_DUTY, totals.duty),
            Effect::value(SUM_SURCHARGE, totals.surcharge),
            Effect::value(HANDLING_FEE, totals.handling_fee),
            Effect::value(SUM_TOTAL, totals.grand_total),
        ]
    }

    fn controls_effects(&self) -> Vec<Effect> {
        let prefix = self.formset.prefix();
        self.formset
            .controls()
            .into_iter()
            .enumerate()
            .flat_map(|(index, controls)| {
                [
                    Effect::visible(format!("{}-{}-add-row", prefix, index), controls.add_visible),
                    Effect::visible(format!("{}-{}-remove-row", prefix, index), controls.remove_visible),
                ]
            })
            .collect()
    }

    fn total_forms_effect(&self) -> Effect {
        Effect::value(self.formset.total_forms_field(), self.formset.len().to_string())
    }

    fn required_effects(&mut self) -> Vec<Effect> {
        let draft = self.is_draft();
        let values = &self.values;
        let rows = self.formset.rows();
        self.required
            .evaluate_rules(draft, |selector| source_values(values, rows, selector))
    }

    fn payer_effects(&self) -> Vec<Effect> {
        let cvr = self.payer.as_ref().and_then(PayerData::cvr_text);
        match (cvr, &self.payer_option_label) {
            (Some(cvr), Some(label)) => vec![Effect::SetLabel {
                target: PAYER_OPTION.to_string(),
                text: format!("{} (CVR: {})", label, cvr),
            }],
            _ => Vec::new(),
        }
    }

    /// Keep role fields filled by the resolver in the value map.
    fn absorb(&mut self, effects: &[Effect]) {
        for effect in effects {
            if let Effect::SetValue { target, value } = effect {
                if self.resolver.role_of_field(target).is_some() {
                    self.values.insert(target.clone(), value.clone());
                }
            }
        }
    }

    fn derived_target(&self, index: usize, name: &str) -> String {
        format!("{}-{}-{}", self.formset.prefix(), index, name)
    }
}

/// The digits a category code input starts with; `"12abc"` reads as 12.
fn leading_code(text: &str) -> Option<u32> {
    LEADING_DIGITS
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Values of every attached field a selector matches, row fields included.
fn source_values(values: &BTreeMap<String, String>, rows: &[FormRow], selector: &FieldSelector) -> Vec<String> {
    values
        .iter()
        .filter(|(name, _)| selector.matches(name))
        .map(|(_, value)| value.clone())
        .chain(
            rows.iter()
                .flat_map(FormRow::fields)
                .filter(|field| selector.matches(&field.name))
                .map(|field| field.value.clone()),
        )
        .collect()
}

/// The import permit becomes required once any row uses a rate that needs one.
fn import_permit_rule(catalog: &TariffCatalog) -> Option<RequiredRule> {
    let ids: Vec<String> = catalog
        .rates()
        .filter(|rate| rate.requires_import_permit)
        .map(|rate| rate.id.to_string())
        .collect();
    if ids.is_empty() {
        return None;
    }
    Some(RequiredRule {
        target: IMPORT_PERMIT_FIELD.to_string(),
        source: FieldSelector::NameSuffix(RATE_FIELD.to_string()),
        trigger_values: ids.into_iter().collect(),
    })
}
