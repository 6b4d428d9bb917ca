//! DOM mutations produced by the form reducers.
//!
//! Reducers never touch a document; they return `Effect`s addressed by field
//! name or CSS selector, and the host applies them in order.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    SetValue { target: String, value: String },
    SetVisible { target: String, visible: bool },
    SetOptions { target: String, options: Vec<SelectOption> },
    SetRequired { target: String, required: bool },
    SetLabel { target: String, text: String },
    /// Custom validity message; `None` clears it and the invalid marker.
    SetValidity { target: String, message: Option<String> },
    SetTitle { target: String, title: String },
    RowAdded { index: usize },
    RowRemoved { index: usize },
}

impl Effect {
    pub fn value(target: impl Into<String>, value: impl Into<String>) -> Self {
        Effect::SetValue {
            target: target.into(),
            value: value.into(),
        }
    }

    pub fn visible(target: impl Into<String>, visible: bool) -> Self {
        Effect::SetVisible {
            target: target.into(),
            visible,
        }
    }

    pub fn title(target: impl Into<String>, title: impl Into<String>) -> Self {
        Effect::SetTitle {
            target: target.into(),
            title: title.into(),
        }
    }

    pub fn validity(target: impl Into<String>, message: Option<String>) -> Self {
        Effect::SetValidity {
            target: target.into(),
            message,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Effect::SetValue { target, .. }
            | Effect::SetVisible { target, .. }
            | Effect::SetOptions { target, .. }
            | Effect::SetRequired { target, .. }
            | Effect::SetLabel { target, .. }
            | Effect::SetValidity { target, .. }
            | Effect::SetTitle { target, .. } => Some(target),
            Effect::RowAdded { .. } | Effect::RowRemoved { .. } => None,
        }
    }
}
