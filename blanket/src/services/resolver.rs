//! Counterparty resolution: typed search fields are matched against a remote
//! registry and zero, one or several candidates are reconciled into the form.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Candidate, LookupResponse, RoleBinding};
use crate::services::effects::{Effect, SelectOption};

/// A lookup the host should perform and feed back through
/// [`CounterpartyResolver::on_response`] with the same `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupRequest {
    pub role: String,
    pub seq: u64,
    pub url: String,
    pub filter: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
struct RoleState {
    candidates: Vec<Candidate>,
    /// Any role field, search field or not. A single match never overwrites it.
    last_edited: Option<String>,
    /// The search field behind the latest request.
    searched_by: Option<String>,
    latest_seq: u64,
    multiple: bool,
    selected: Option<String>,
}

impl RoleState {
    fn reference(&self) -> Option<&Candidate> {
        if !self.multiple {
            return self.candidates.first();
        }
        let selected = self.selected.as_deref()?;
        self.candidates.iter().find(|c| c.key() == selected)
    }
}

/// Per-role lookup state, owned by one form instance.
#[derive(Debug, Clone, Default)]
pub struct CounterpartyResolver {
    bindings: BTreeMap<String, RoleBinding>,
    states: BTreeMap<String, RoleState>,
    next_seq: u64,
}

impl CounterpartyResolver {
    pub fn new(roles: &[RoleBinding]) -> Self {
        let bindings: BTreeMap<String, RoleBinding> = roles
            .iter()
            .enumerate()
            .map(|(position, binding)| (binding.role_name(position), binding.clone()))
            .collect();
        let states = bindings
            .keys()
            .map(|role| (role.clone(), RoleState::default()))
            .collect();
        Self {
            bindings,
            states,
            next_seq: 0,
        }
    }

    pub fn bindings(&self) -> &BTreeMap<String, RoleBinding> {
        &self.bindings
    }

    /// The role and attribute name a form field belongs to.
    pub fn role_of_field(&self, field: &str) -> Option<(&str, &str)> {
        self.bindings.iter().find_map(|(role, binding)| {
            binding
                .attribute_for_field(field)
                .map(|attribute| (role.as_str(), attribute))
        })
    }

    pub fn candidates(&self, role: &str) -> &[Candidate] {
        self.states
            .get(role)
            .map(|s| s.candidates.as_slice())
            .unwrap_or(&[])
    }

    /// A role field was edited. `values` already holds the new value.
    pub fn on_field_change(
        &mut self,
        field: &str,
        values: &BTreeMap<String, String>,
    ) -> (Vec<Effect>, Option<LookupRequest>) {
        let Some((role, attribute)) = self.role_of_field(field) else {
            return (Vec::new(), None);
        };
        let (role, attribute) = (role.to_string(), attribute.to_string());
        let effects = self.change_indicator(&role, values);
        self.states.entry(role.clone()).or_default().last_edited = Some(attribute.clone());

        let Some(binding) = self.bindings.get(&role) else {
            return (effects, None);
        };
        if !binding.search_fields.contains(&attribute)
            || values.get(field).map_or(true, |v| v.is_empty())
        {
            return (effects, None);
        }

        let mut filter = vec![("kladde".to_string(), "false".to_string())];
        for name in &binding.search_fields {
            let value = binding
                .fields
                .get(name)
                .and_then(|key| values.get(key))
                .filter(|v| !v.is_empty());
            if let Some(value) = value {
                filter.push((name.clone(), value.clone()));
            }
        }
        let url = binding.api.clone();

        self.next_seq += 1;
        let seq = self.next_seq;
        let state = self.states.entry(role.clone()).or_default();
        state.searched_by = Some(attribute);
        state.latest_seq = seq;

        tracing::debug!(role = %role, seq, "Issuing counterparty lookup");
        (
            effects,
            Some(LookupRequest {
                role,
                seq,
                url,
                filter,
            }),
        )
    }

    /// Reconcile a lookup response. Responses older than the latest request
    /// for the role are dropped.
    pub fn on_response(
        &mut self,
        role: &str,
        seq: u64,
        response: LookupResponse,
        values: &BTreeMap<String, String>,
    ) -> Vec<Effect> {
        let (Some(binding), Some(state)) = (self.bindings.get(role), self.states.get_mut(role)) else {
            tracing::warn!(role, "Lookup response for unknown role");
            return Vec::new();
        };
        if seq < state.latest_seq {
            tracing::debug!(role, seq, latest = state.latest_seq, "Discarding stale lookup response");
            return Vec::new();
        }

        // `count` is the registry's total and may exceed the returned page.
        let count = response.count;
        let mut candidates: Vec<Candidate> = Vec::with_capacity(response.items.len());
        for item in response.items {
            if !candidates.iter().any(|c| c.key() == item.key()) {
                candidates.push(item);
            }
        }
        state.candidates = candidates;
        state.selected = None;
        state.multiple = count > 1 && !state.candidates.is_empty();

        let mut effects = Vec::new();
        match (count, state.candidates.first()) {
            (0, _) | (_, None) => {
                effects.push(Effect::visible(binding.multiple_warning(), false));
                effects.push(Effect::value(binding.hidden_id(), ""));
                effects.push(Effect::visible(binding.hidden_id(), false));
            }
            (1, Some(single)) => {
                let mut updated = values.clone();
                for (attribute, key) in &binding.fields {
                    if state.last_edited.as_deref() == Some(attribute.as_str()) {
                        continue;
                    }
                    let value = single.attribute(attribute);
                    updated.insert(key.clone(), value.clone());
                    effects.push(Effect::value(key.clone(), value));
                }
                effects.push(Effect::value(binding.hidden_id(), single.key()));
                effects.push(Effect::visible(binding.hidden_id(), true));
                effects.push(Effect::visible(binding.multiple_warning(), false));
                effects.push(indicator(binding, state, &updated));
            }
            _ => {
                let mut options = vec![SelectOption::new("", "")];
                options.extend(
                    state
                        .candidates
                        .iter()
                        .map(|c| SelectOption::new(c.key(), c.display_label())),
                );
                effects.push(Effect::SetOptions {
                    target: binding.selector(),
                    options,
                });
                for (attribute, label) in &binding.multi_label {
                    let shown = state.searched_by.as_deref() == Some(attribute.as_str());
                    effects.push(Effect::visible(label.clone(), shown));
                }
                effects.push(Effect::visible(binding.multiple_warning(), true));
                effects.push(Effect::visible(binding.hidden_id(), false));
            }
        }
        effects
    }

    /// A candidate was picked from the selector; the empty key clears the fields.
    pub fn on_select(
        &mut self,
        role: &str,
        candidate: &str,
        values: &BTreeMap<String, String>,
    ) -> Vec<Effect> {
        let (Some(binding), Some(state)) = (self.bindings.get(role), self.states.get_mut(role)) else {
            return Vec::new();
        };
        let chosen = state
            .candidates
            .iter()
            .find(|c| !candidate.is_empty() && c.key() == candidate)
            .cloned();
        state.selected = chosen.as_ref().map(Candidate::key);

        let mut updated = values.clone();
        let mut effects = Vec::new();
        for (attribute, key) in &binding.fields {
            let value = chosen
                .as_ref()
                .map(|c| c.attribute(attribute))
                .unwrap_or_default();
            updated.insert(key.clone(), value.clone());
            effects.push(Effect::value(key.clone(), value));
        }
        effects.push(Effect::value(
            binding.hidden_id(),
            state.selected.clone().unwrap_or_default(),
        ));
        effects.push(indicator(binding, state, &updated));
        effects
    }

    /// Show `.changed` when the role's fields differ from the reference candidate.
    pub fn change_indicator(&self, role: &str, values: &BTreeMap<String, String>) -> Vec<Effect> {
        match (self.bindings.get(role), self.states.get(role)) {
            (Some(binding), Some(state)) => vec![indicator(binding, state, values)],
            _ => Vec::new(),
        }
    }
}

fn indicator(binding: &RoleBinding, state: &RoleState, values: &BTreeMap<String, String>) -> Effect {
    let changed = state.reference().is_some_and(|reference| {
        binding.fields.iter().any(|(attribute, key)| {
            values.get(key).map(String::as_str).unwrap_or("") != reference.attribute(attribute)
        })
    });
    Effect::visible(binding.changed_indicator(), changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binding() -> RoleBinding {
        serde_json::from_value(json!({
            "name": "afsender",
            "fields": {
                "navn": "afsender_navn",
                "adresse": "afsender_adresse",
                "postnummer": "afsender_postnummer",
                "by": "afsender_by",
                "cvr": "afsender_cvr"
            },
            "searchfields": ["navn", "cvr"],
            "api": "/api/afsender",
            "multi_container": "#afsender_multiple",
            "multi_label": {"navn": "#afsender_multiple .navn", "cvr": "#afsender_multiple .cvr"}
        }))
        .unwrap()
    }

    fn resolver() -> CounterpartyResolver {
        CounterpartyResolver::new(&[binding()])
    }

    fn response(items: serde_json::Value) -> LookupResponse {
        let items: Vec<Candidate> = serde_json::from_value(items).unwrap();
        LookupResponse {
            count: items.len() as u64,
            items,
        }
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn search_field_change_issues_request_with_filter() {
        let mut resolver = resolver();
        let current = values(&[("afsender_navn", "Nuuk"), ("afsender_cvr", "")]);
        let (_, request) = resolver.on_field_change("afsender_navn", &current);
        let request = request.unwrap();
        assert_eq!(request.role, "afsender");
        assert_eq!(request.url, "/api/afsender");
        assert_eq!(
            request.filter,
            vec![
                ("kladde".to_string(), "false".to_string()),
                ("navn".to_string(), "Nuuk".to_string())
            ]
        );
    }

    #[test]
    fn empty_or_non_search_field_issues_nothing() {
        let mut resolver = resolver();
        let (_, request) = resolver.on_field_change("afsender_navn", &values(&[("afsender_navn", "")]));
        assert!(request.is_none());
        let (_, request) = resolver.on_field_change("afsender_by", &values(&[("afsender_by", "Nuuk")]));
        assert!(request.is_none());
        let (effects, request) = resolver.on_field_change("andet_felt", &values(&[]));
        assert!(request.is_none());
        assert!(effects.is_empty());
    }

    #[test]
    fn single_result_fills_all_but_edited_field() {
        let mut resolver = resolver();
        let current = values(&[("afsender_navn", "Nuuk")]);
        let (_, request) = resolver.on_field_change("afsender_navn", &current);
        let seq = request.unwrap().seq;

        let effects = resolver.on_response(
            "afsender",
            seq,
            response(json!([{"id": 7, "navn": "Nuuk Import A/S", "adresse": null, "postnummer": 3900, "by": "Nuuk"}])),
            &current,
        );

        assert!(!effects.iter().any(|e| e.target() == Some("afsender_navn")));
        assert!(effects.contains(&Effect::value("afsender_adresse", "")));
        assert!(effects.contains(&Effect::value("afsender_postnummer", "3900")));
        assert!(effects.contains(&Effect::value("afsender_cvr", "")));
        assert!(effects.contains(&Effect::value("#afsender_multiple [type=hidden]", "7")));
        assert!(effects.contains(&Effect::visible("#afsender_multiple [type=hidden]", true)));
        assert!(effects.contains(&Effect::visible("#afsender_multiple .multiple", false)));
        // "Nuuk" differs from the candidate's "Nuuk Import A/S"
        assert!(effects.contains(&Effect::visible("#afsender_multiple .changed", true)));
    }

    #[test]
    fn zero_results_clear_hidden_id() {
        let mut resolver = resolver();
        let current = values(&[("afsender_cvr", "12345678")]);
        let (_, request) = resolver.on_field_change("afsender_cvr", &current);
        let effects = resolver.on_response("afsender", request.unwrap().seq, response(json!([])), &current);
        assert_eq!(
            effects,
            vec![
                Effect::visible("#afsender_multiple .multiple", false),
                Effect::value("#afsender_multiple [type=hidden]", ""),
                Effect::visible("#afsender_multiple [type=hidden]", false),
            ]
        );
    }

    #[test]
    fn many_results_offer_distinct_options() {
        let mut resolver = resolver();
        let current = values(&[("afsender_cvr", "1")]);
        let (_, request) = resolver.on_field_change("afsender_cvr", &current);
        let effects = resolver.on_response(
            "afsender",
            request.unwrap().seq,
            response(json!([
                {"id": 1, "navn": "A", "by": "Nuuk", "postnummer": 3900},
                {"id": 2, "navn": "B"},
                {"id": 1, "navn": "A", "by": "Nuuk", "postnummer": 3900}
            ])),
            &current,
        );

        assert_eq!(
            effects[0],
            Effect::SetOptions {
                target: "#afsender_multiple select".into(),
                options: vec![
                    SelectOption::new("", ""),
                    SelectOption::new("1", "A, 3900 Nuuk"),
                    SelectOption::new("2", "B"),
                ]
            }
        );
        assert!(effects.contains(&Effect::visible("#afsender_multiple .cvr", true)));
        assert!(effects.contains(&Effect::visible("#afsender_multiple .navn", false)));
        assert!(effects.contains(&Effect::visible("#afsender_multiple .multiple", true)));
        assert_eq!(resolver.candidates("afsender").len(), 2);
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut resolver = resolver();
        let (_, first) = resolver.on_field_change("afsender_navn", &values(&[("afsender_navn", "N")]));
        let (_, second) = resolver.on_field_change("afsender_navn", &values(&[("afsender_navn", "Nu")]));
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(second.seq > first.seq);

        let effects = resolver.on_response(
            "afsender",
            first.seq,
            response(json!([{"id": 1, "navn": "Old"}])),
            &values(&[]),
        );
        assert!(effects.is_empty());
        assert!(resolver.candidates("afsender").is_empty());
    }

    #[test]
    fn selecting_candidate_fills_every_field() {
        let mut resolver = resolver();
        let current = values(&[("afsender_cvr", "1")]);
        let (_, request) = resolver.on_field_change("afsender_cvr", &current);
        resolver.on_response(
            "afsender",
            request.unwrap().seq,
            response(json!([{"id": 1, "navn": "A", "cvr": 1}, {"id": 2, "navn": "B", "cvr": 1}])),
            &current,
        );

        let effects = resolver.on_select("afsender", "2", &current);
        assert!(effects.contains(&Effect::value("afsender_navn", "B")));
        assert!(effects.contains(&Effect::value("afsender_cvr", "1")));
        assert!(effects.contains(&Effect::visible("#afsender_multiple .changed", false)));

        let effects = resolver.on_select("afsender", "", &current);
        assert!(effects.contains(&Effect::value("afsender_navn", "")));
        assert!(effects.contains(&Effect::visible("#afsender_multiple .changed", false)));
    }

    #[test]
    fn single_result_keeps_non_search_field_edited_in_flight() {
        let mut resolver = resolver();
        let mut current = values(&[("afsender_navn", "Nuuk")]);
        let (_, request) = resolver.on_field_change("afsender_navn", &current);
        let seq = request.unwrap().seq;

        current.insert("afsender_adresse".into(), "Min vej 3".into());
        let (_, request) = resolver.on_field_change("afsender_adresse", &current);
        assert!(request.is_none());

        let effects = resolver.on_response(
            "afsender",
            seq,
            response(json!([{"id": 7, "navn": "Nuuk Import A/S", "adresse": "Vej 1", "by": "Nuuk"}])),
            &current,
        );

        assert!(!effects.iter().any(|e| e.target() == Some("afsender_adresse")));
        assert!(effects.contains(&Effect::value("afsender_navn", "Nuuk Import A/S")));
        assert!(effects.contains(&Effect::value("afsender_by", "Nuuk")));
    }

    #[test]
    fn change_indicator_follows_every_role_field_edit() {
        let mut resolver = resolver();
        let mut current = values(&[("afsender_navn", "Nuuk Import A/S")]);
        let (_, request) = resolver.on_field_change("afsender_navn", &current);
        let filled = json!({"id": 7, "navn": "Nuuk Import A/S", "adresse": "Vej 1", "postnummer": 3900, "by": "Nuuk", "cvr": 12345678});
        let effects = resolver.on_response("afsender", request.unwrap().seq, response(json!([filled])), &current);
        for effect in effects {
            if let Effect::SetValue { target, value } = effect {
                current.insert(target, value);
            }
        }

        current.insert("afsender_adresse".into(), "Anden vej 2".into());
        let (effects, _) = resolver.on_field_change("afsender_adresse", &current);
        assert_eq!(effects, vec![Effect::visible("#afsender_multiple .changed", true)]);

        current.insert("afsender_adresse".into(), "Vej 1".into());
        let (effects, _) = resolver.on_field_change("afsender_adresse", &current);
        assert_eq!(effects, vec![Effect::visible("#afsender_multiple .changed", false)]);
    }

    #[test]
    fn paginated_count_offers_choice_even_for_one_item() {
        let mut resolver = resolver();
        let current = values(&[("afsender_navn", "A")]);
        let (_, request) = resolver.on_field_change("afsender_navn", &current);
        let items: Vec<Candidate> = serde_json::from_value(json!([{"id": 1, "navn": "A"}])).unwrap();

        let effects = resolver.on_response(
            "afsender",
            request.unwrap().seq,
            LookupResponse { count: 40, items },
            &current,
        );

        assert!(!effects.iter().any(|e| e.target() == Some("afsender_adresse")));
        assert!(effects.contains(&Effect::visible("#afsender_multiple .multiple", true)));
        assert!(effects.contains(&Effect::visible("#afsender_multiple .navn", true)));
    }
}
