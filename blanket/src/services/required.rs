//! Conditionally required fields.
//!
//! A field marked `data-required-field="[name$=vareafgiftssats]"` and
//! `data-required-values="12,13"` is required while the form is not a draft
//! and any attached source field holds one of the listed values.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::effects::Effect;

static SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\[\s*name\s*(?P<op>\$?=)\s*["']?(?P<value>[^"'\]]*?)["']?\s*\]$"#)
        .expect("Invalid field selector pattern")
});

/// The subset of attribute selectors the page uses to name source fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelector {
    Name(String),
    NameSuffix(String),
}

impl FieldSelector {
    /// Parse `[name=x]` or `[name$=x]`, with optional quotes around `x`.
    pub fn parse(expr: &str) -> Option<Self> {
        let captures = SELECTOR.captures(expr.trim())?;
        let value = captures.name("value")?.as_str().to_string();
        match captures.name("op")?.as_str() {
            "=" => Some(FieldSelector::Name(value)),
            _ => Some(FieldSelector::NameSuffix(value)),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            FieldSelector::Name(expected) => name == expected,
            FieldSelector::NameSuffix(suffix) => name.ends_with(suffix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredRule {
    pub target: String,
    pub source: FieldSelector,
    pub trigger_values: BTreeSet<String>,
}

impl RequiredRule {
    /// Build a rule from the target's `data-required-*` attributes.
    pub fn from_attributes(target: impl Into<String>, field_expr: &str, values: &str) -> Option<Self> {
        Some(Self {
            target: target.into(),
            source: FieldSelector::parse(field_expr)?,
            trigger_values: values.split(',').map(str::to_string).collect(),
        })
    }

    pub fn is_required<'a>(&self, draft: bool, source_values: impl IntoIterator<Item = &'a str>) -> bool {
        !draft
            && source_values
                .into_iter()
                .any(|value| self.trigger_values.contains(value))
    }
}

/// `kladde` holds "true" (any case) for drafts.
pub fn is_draft(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Replace any run of trailing asterisks with one asterisk or none.
pub fn mark_label(text: &str, required: bool) -> String {
    let mut marked = text.trim_end_matches('*').to_string();
    if required {
        marked.push('*');
    }
    marked
}

pub fn label_selector(field: &str) -> String {
    format!("label[for={}]", field)
}

/// Conditional rules, unconditionally required fields and the current label
/// text of every field the policy touches.
#[derive(Debug, Clone, Default)]
pub struct RequiredPolicy {
    rules: Vec<RequiredRule>,
    always_required: Vec<String>,
    labels: BTreeMap<String, String>,
}

impl RequiredPolicy {
    pub fn new(
        rules: Vec<RequiredRule>,
        always_required: Vec<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            rules,
            always_required,
            labels,
        }
    }

    pub fn rules(&self) -> &[RequiredRule] {
        &self.rules
    }

    /// Whether a change to `field` can flip any rule.
    pub fn watches(&self, field: &str) -> bool {
        self.rules.iter().any(|rule| rule.source.matches(field))
    }

    /// Re-evaluate every conditional rule. `source_values` returns the values
    /// of the fields a selector matches among those still attached.
    pub fn evaluate_rules<F>(&mut self, draft: bool, source_values: F) -> Vec<Effect>
    where
        F: Fn(&FieldSelector) -> Vec<String>,
    {
        let decisions: Vec<(String, bool)> = self
            .rules
            .iter()
            .map(|rule| {
                let values = source_values(&rule.source);
                let required = rule.is_required(draft, values.iter().map(String::as_str));
                (rule.target.clone(), required)
            })
            .collect();

        decisions
            .into_iter()
            .flat_map(|(target, required)| self.set_required(&target, required))
            .collect()
    }

    /// Unconditionally required fields follow the draft flag.
    pub fn evaluate_draft(&mut self, draft: bool) -> Vec<Effect> {
        let targets = self.always_required.clone();
        targets
            .iter()
            .flat_map(|target| self.set_required(target, !draft))
            .collect()
    }

    fn set_required(&mut self, target: &str, required: bool) -> Vec<Effect> {
        let mut effects = vec![Effect::SetRequired {
            target: target.to_string(),
            required,
        }];
        if let Some(text) = self.labels.get_mut(target) {
            *text = mark_label(text, required);
            effects.push(Effect::SetLabel {
                target: label_selector(target),
                text: text.clone(),
            });
        }
        effects
    }
}
