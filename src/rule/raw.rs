//! Raw tabular rule records, as exported by the collection layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::matcher::split_cell;

/// A scalar table cell: spreadsheets and JSON exports mix types freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// The cell as trimmed text.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Bool(b) => b.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.trim().to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

/// A token cell: either a list or one comma/newline-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tokens {
    List(Vec<String>),
    Text(String),
}

impl Tokens {
    /// Individual trimmed, non-empty tokens.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Tokens::List(items) => items
                .iter()
                .flat_map(|item| split_cell(item))
                .map(str::to_string)
                .collect(),
            Tokens::Text(text) => split_cell(text).map(str::to_string).collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Tokens {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Tokens::List(iter.into_iter().map(Into::into).collect())
    }
}

/// One raw rule row before normalization.
///
/// Field names follow the canonical schema; the column headers of the
/// spreadsheet export (`Rule Name`, `Enable`, `Extracted Source`, ...) are
/// accepted as aliases. Extracted (object-resolved) columns win over the
/// plain ones when both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
    #[serde(default, alias = "Rule Name", alias = "name")]
    pub id: Option<Cell>,
    #[serde(default, alias = "Seq", alias = "seq")]
    pub order: Option<Cell>,
    #[serde(default, alias = "Enable", alias = "enable")]
    pub enabled: Option<Cell>,
    #[serde(default, alias = "Action")]
    pub action: Option<Cell>,
    #[serde(default, alias = "Source")]
    pub source: Option<Tokens>,
    #[serde(default, rename = "Extracted Source", skip_serializing_if = "Option::is_none")]
    pub extracted_source: Option<Tokens>,
    #[serde(default, alias = "Destination")]
    pub destination: Option<Tokens>,
    #[serde(default, rename = "Extracted Destination", skip_serializing_if = "Option::is_none")]
    pub extracted_destination: Option<Tokens>,
    #[serde(default, alias = "Service")]
    pub service: Option<Tokens>,
    #[serde(default, rename = "Extracted Service", skip_serializing_if = "Option::is_none")]
    pub extracted_service: Option<Tokens>,
    #[serde(default, alias = "Application", skip_serializing_if = "Option::is_none")]
    pub application: Option<Tokens>,
    #[serde(default, alias = "User", skip_serializing_if = "Option::is_none")]
    pub user: Option<Tokens>,
}

impl RawRule {
    /// Start a row with an id and an explicit order.
    pub fn new(id: &str, order: i64) -> Self {
        Self {
            id: Some(id.into()),
            order: Some(order.into()),
            ..Self::default()
        }
    }

    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled.into());
        self
    }

    pub fn source<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tokens: I) -> Self {
        self.source = Some(tokens.into_iter().collect());
        self
    }

    pub fn destination<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tokens: I) -> Self {
        self.destination = Some(tokens.into_iter().collect());
        self
    }

    pub fn service<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tokens: I) -> Self {
        self.service = Some(tokens.into_iter().collect());
        self
    }

    pub fn application<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tokens: I) -> Self {
        self.application = Some(tokens.into_iter().collect());
        self
    }

    pub fn user<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tokens: I) -> Self {
        self.user = Some(tokens.into_iter().collect());
        self
    }

    pub(crate) fn source_tokens(&self) -> Option<&Tokens> {
        self.extracted_source.as_ref().or(self.source.as_ref())
    }

    pub(crate) fn destination_tokens(&self) -> Option<&Tokens> {
        self.extracted_destination
            .as_ref()
            .or(self.destination.as_ref())
    }

    pub(crate) fn service_tokens(&self) -> Option<&Tokens> {
        self.extracted_service.as_ref().or(self.service.as_ref())
    }
}
