//! Recipient data model and the merge set builder.
//!
//! [`merge_records`] turns a template, a variable mapping, and a recipient
//! dataset into one [`MergedMessage`] per record — rendered, validated, and
//! ready for dispatch — before any network activity starts. Records that
//! fail address validation stay in the set so they show up in the final
//! status output instead of silently disappearing.

use std::collections::HashMap;

use lettre::Address;
use serde::{Deserialize, Serialize};

use crate::template::{resolve, Rendered};

/// Ordered `placeholder -> source field` pairs.
///
/// Placeholder names are unique within a mapping; inserting a duplicate
/// name keeps the first entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableMapping {
    pairs: Vec<(String, String)>,
}

impl VariableMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `{{placeholder}}` to a record field. Returns `self` for chaining.
    pub fn map(mut self, placeholder: impl Into<String>, source_field: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        if !self.pairs.iter().any(|(p, _)| *p == placeholder) {
            self.pairs.push((placeholder, source_field.into()));
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(p, f)| (p.as_str(), f.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// One recipient row: a stable identifier plus raw field values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientRecord {
    /// Row index or other stable key, unique within the dataset.
    pub id: usize,
    /// Field name to raw string value.
    pub fields: HashMap<String, String>,
}

impl RecipientRecord {
    pub fn new(id: usize, fields: HashMap<String, String>) -> Self {
        Self { id, fields }
    }
}

/// How the rendered body should be transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyFormat {
    Text,
    Html,
}

/// Subject and body templates. Immutable once sending begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub subject: String,
    pub body: String,
    pub body_format: BodyFormat,
}

impl Template {
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        body_format: BodyFormat,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            body_format,
        }
    }
}

/// Per-record validation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    /// The target address does not parse. Takes precedence over
    /// `MissingField`.
    InvalidAddress,
    /// Rendered with one or more unbound placeholders; the message is
    /// still sendable.
    MissingField(Vec<String>),
}

/// A fully rendered, recipient-specific message. Never mutated after
/// creation — retries re-send the same message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedMessage {
    pub recipient_id: usize,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub body_format: BodyFormat,
    pub verdict: Verdict,
}

impl MergedMessage {
    pub fn is_sendable(&self) -> bool {
        !matches!(self.verdict, Verdict::InvalidAddress)
    }
}

/// Build the merge set: one [`MergedMessage`] per record, in input order.
///
/// For each record, every mapped placeholder is bound to the record's field
/// value (a field absent from the record simply leaves that placeholder
/// unbound), the address field itself is bound as a fallback placeholder,
/// and subject and body are rendered. The target address is taken from
/// `address_field`, trimmed, and validated syntactically.
///
/// This function is infallible at the set level: defects surface as
/// per-record verdicts, never as a dropped record.
pub fn merge_records(
    template: &Template,
    mapping: &VariableMapping,
    records: &[RecipientRecord],
    address_field: &str,
) -> Vec<MergedMessage> {
    records
        .iter()
        .map(|record| merge_one(template, mapping, record, address_field))
        .collect()
}

fn merge_one(
    template: &Template,
    mapping: &VariableMapping,
    record: &RecipientRecord,
    address_field: &str,
) -> MergedMessage {
    let mut bindings: HashMap<String, String> = HashMap::new();
    for (placeholder, field) in mapping.iter() {
        if let Some(value) = record.fields.get(field) {
            bindings.insert(placeholder.to_string(), value.clone());
        }
    }
    // The address column is always usable as a placeholder, mapped or not.
    if let Some(value) = record.fields.get(address_field) {
        bindings
            .entry(address_field.to_string())
            .or_insert_with(|| value.clone());
    }

    let Rendered {
        text: subject,
        missing: mut missing_fields,
    } = resolve(&template.subject, &bindings);
    let Rendered {
        text: body,
        missing: body_missing,
    } = resolve(&template.body, &bindings);
    for name in body_missing {
        if !missing_fields.contains(&name) {
            missing_fields.push(name);
        }
    }

    let to = record
        .fields
        .get(address_field)
        .map(|v| v.trim().to_string())
        .unwrap_or_default();

    let verdict = if to.parse::<Address>().is_err() {
        Verdict::InvalidAddress
    } else if !missing_fields.is_empty() {
        Verdict::MissingField(missing_fields)
    } else {
        Verdict::Valid
    };

    MergedMessage {
        recipient_id: record.id,
        to,
        subject,
        body,
        body_format: template.body_format,
        verdict,
    }
}
