//! Repeated line-item rows with Django formset naming (`form-0-antal`).
//!
//! Rows are cloned from a prototype whose names carry `__prefix__` in place of
//! the index. After a removal the first `-N-` segment of every remaining name
//! and id is rewritten so indices stay contiguous from 0.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use crate::models::{parse_rate_id, LineInputs, LineItem};

pub const INDEX_PLACEHOLDER: &str = "__prefix__";

pub const RATE_FIELD: &str = "vareafgiftssats";
pub const WEIGHT_FIELD: &str = "mængde";
pub const COUNT_FIELD: &str = "antal";
pub const AMOUNT_FIELD: &str = "fakturabeløb";

/// Stable identity of a row; unlike its index it survives renumbering.
pub type RowKey = u64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormsetError {
    #[error("No row with key {0}")]
    UnknownRow(RowKey),

    #[error("The last remaining row cannot be removed")]
    LastRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub value: String,
}

impl FormField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!("id_{}", name),
            name,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRow {
    key: RowKey,
    fields: Vec<FormField>,
}

impl FormRow {
    pub fn key(&self) -> RowKey {
        self.key
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// The field whose name ends with `suffix`.
    pub fn field(&self, suffix: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name.ends_with(suffix))
    }

    pub fn value(&self, suffix: &str) -> &str {
        self.field(suffix).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Set the value of the field ending with `suffix`, returning its name.
    pub fn set_value(&mut self, suffix: &str, value: impl Into<String>) -> Option<String> {
        let field = self.fields.iter_mut().find(|f| f.name.ends_with(suffix))?;
        field.value = value.into();
        Some(field.name.clone())
    }

    /// Full name of the field ending with `suffix`.
    pub fn name_of(&self, suffix: &str) -> Option<&str> {
        self.field(suffix).map(|f| f.name.as_str())
    }

    pub fn line_item(&self) -> LineItem {
        LineItem {
            rate_id: parse_rate_id(self.value(RATE_FIELD)),
            inputs: LineInputs::from_form(
                self.value(WEIGHT_FIELD),
                self.value(COUNT_FIELD),
                self.value(AMOUNT_FIELD),
            ),
        }
    }

    fn renumber(&mut self, index: usize) {
        for field in &mut self.fields {
            field.name = replace_index(&field.name, index);
            field.id = replace_index(&field.id, index);
        }
    }
}

/// Visibility of a row's add/remove buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowControls {
    pub add_visible: bool,
    pub remove_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormsetEvent {
    Added { key: RowKey, index: usize },
    BeforeRemove { key: RowKey, index: usize },
    Removed { key: RowKey, index: usize },
}

#[derive(Debug, Clone)]
pub struct Formset {
    prefix: String,
    prototype: Vec<FormField>,
    rows: Vec<FormRow>,
    next_key: RowKey,
}

impl Formset {
    /// A formset with one row per entry of `initial`, each already indexed.
    pub fn new(
        prefix: impl Into<String>,
        prototype: Vec<FormField>,
        initial: Vec<Vec<FormField>>,
    ) -> Self {
        let mut formset = Self {
            prefix: prefix.into(),
            prototype,
            rows: Vec::new(),
            next_key: 0,
        };
        for fields in initial {
            let key = formset.allocate_key();
            formset.rows.push(FormRow { key, fields });
        }
        formset
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn rows(&self) -> &[FormRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, key: RowKey) -> Option<&FormRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn row_mut(&mut self, key: RowKey) -> Option<&mut FormRow> {
        self.rows.iter_mut().find(|r| r.key == key)
    }

    pub fn index_of(&self, key: RowKey) -> Option<usize> {
        self.rows.iter().position(|r| r.key == key)
    }

    pub fn prototype(&self) -> &[FormField] {
        &self.prototype
    }

    /// Name of the management form field holding the row count.
    pub fn total_forms_field(&self) -> String {
        format!("{}-TOTAL_FORMS", self.prefix)
    }

    /// Clone the prototype at the next index and append it.
    pub fn add_row(&mut self) -> (RowKey, FormsetEvent) {
        let index = self.rows.len();
        let index_text = index.to_string();
        let fields = self
            .prototype
            .iter()
            .map(|f| FormField {
                name: f.name.replace(INDEX_PLACEHOLDER, &index_text),
                id: f.id.replace(INDEX_PLACEHOLDER, &index_text),
                value: f.value.clone(),
            })
            .collect();

        let key = self.allocate_key();
        self.rows.push(FormRow { key, fields });
        tracing::debug!(row = key, index, "Row added");
        (key, FormsetEvent::Added { key, index })
    }

    /// Detach a row and renumber the rest to `0..len-1`.
    pub fn remove_row(&mut self, key: RowKey) -> Result<Vec<FormsetEvent>, FormsetError> {
        let index = self.index_of(key).ok_or(FormsetError::UnknownRow(key))?;
        if self.rows.len() == 1 {
            return Err(FormsetError::LastRow);
        }

        let before = FormsetEvent::BeforeRemove { key, index };
        self.rows.remove(index);
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.renumber(i);
        }
        tracing::debug!(row = key, index, remaining = self.rows.len(), "Row removed");

        Ok(vec![before, FormsetEvent::Removed { key, index }])
    }

    /// Add button only on the last row; remove buttons hidden for a lone row.
    pub fn controls(&self) -> Vec<RowControls> {
        let count = self.rows.len();
        (0..count)
            .map(|i| RowControls {
                add_visible: i + 1 == count,
                remove_visible: count > 1,
            })
            .collect()
    }

    fn allocate_key(&mut self) -> RowKey {
        let key = self.next_key;
        self.next_key += 1;
        key
    }
}

static INDEX_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-[0-9]+-").expect("Invalid index segment pattern"));

/// Replace the first `-N-` segment of `name` with `-index-`.
pub fn replace_index(name: &str, index: usize) -> String {
    INDEX_SEGMENT
        .replacen(name, 1, NoExpand(&format!("-{}-", index)))
        .into_owned()
}
