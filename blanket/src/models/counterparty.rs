//! Counterparty (aktør) lookup models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One registry record returned by a lookup endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Value,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

impl Candidate {
    /// The id as the string used for option values and the hidden id field.
    pub fn key(&self) -> String {
        value_to_string(&self.id)
    }

    /// Attribute as a form value: null or missing become the empty string.
    pub fn attribute(&self, name: &str) -> String {
        if name == "id" {
            return self.key();
        }
        self.attributes
            .get(name)
            .map(value_to_string)
            .unwrap_or_default()
    }

    /// Option label: name, address and "postcode city", empty parts dropped.
    pub fn display_label(&self) -> String {
        let place = [self.attribute("postnummer"), self.attribute("by")]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        [self.attribute("navn"), self.attribute("adresse"), place]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Response body of a lookup endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub count: u64,
    #[serde(default)]
    pub items: Vec<Candidate>,
}

/// Per-role wiring supplied by the page (`aktører` data island).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleBinding {
    /// Role name such as `afsender`; unnamed roles are known by position.
    #[serde(default)]
    pub name: String,
    /// Attribute name to form field key.
    pub fields: BTreeMap<String, String>,
    /// Attribute names whose changes trigger a lookup.
    #[serde(rename = "searchfields")]
    pub search_fields: Vec<String>,
    /// Lookup endpoint URL.
    pub api: String,
    /// Selector of the container holding the ambiguity selector.
    pub multi_container: String,
    /// Attribute name to the selector of its "multiple matches" label.
    #[serde(default)]
    pub multi_label: BTreeMap<String, String>,
}

impl RoleBinding {
    pub fn role_name(&self, position: usize) -> String {
        if self.name.is_empty() {
            position.to_string()
        } else {
            self.name.clone()
        }
    }

    /// The attribute name bound to a form field key.
    pub fn attribute_for_field(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, key)| key.as_str() == field)
            .map(|(name, _)| name.as_str())
    }

    pub fn selector(&self) -> String {
        format!("{} select", self.multi_container)
    }

    pub fn multiple_warning(&self) -> String {
        format!("{} .multiple", self.multi_container)
    }

    pub fn hidden_id(&self) -> String {
        format!("{} [type=hidden]", self.multi_container)
    }

    pub fn changed_indicator(&self) -> String {
        format!("{} .changed", self.multi_container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(value: Value) -> Candidate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn label_joins_non_empty_parts() {
        let c = candidate(json!({
            "id": 4, "navn": "Nuuk Import", "adresse": "Aqqusinersuaq 1",
            "postnummer": 3900, "by": "Nuuk"
        }));
        assert_eq!(c.display_label(), "Nuuk Import, Aqqusinersuaq 1, 3900 Nuuk");
    }

    #[test]
    fn label_skips_missing_parts() {
        let c = candidate(json!({"id": 4, "navn": "Nuuk Import", "adresse": null, "by": "Nuuk"}));
        assert_eq!(c.display_label(), "Nuuk Import, Nuuk");

        let bare = candidate(json!({"id": 5, "navn": "Solo"}));
        assert_eq!(bare.display_label(), "Solo");
    }

    #[test]
    fn attributes_render_as_form_values() {
        let c = candidate(json!({"id": "12", "postnummer": 3900, "telefon": null}));
        assert_eq!(c.key(), "12");
        assert_eq!(c.attribute("postnummer"), "3900");
        assert_eq!(c.attribute("telefon"), "");
        assert_eq!(c.attribute("cvr"), "");
    }
}
