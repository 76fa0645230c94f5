//! Key-based redaction of sensitive values.
//!
//! Masking walks a JSON tree and replaces the value of every object key found
//! in a [`FieldsToMask`] set with [`MASK_MARKER`], at any nesting depth. Keys
//! are matched case-insensitively; structure and sibling keys are preserved.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::constants::{DEFAULT_FIELDS_TO_MASK, MASK_MARKER};

/// Case-insensitive set of field names whose values are redacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsToMask {
    fields: BTreeSet<String>,
}

impl FieldsToMask {
    /// Creates an empty set, masking nothing.
    pub fn empty() -> Self {
        Self {
            fields: BTreeSet::new(),
        }
    }

    /// Creates the default set extended with `additional` field names.
    pub fn with_additional<I, S>(additional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = Self::default();
        fields.extend(additional);
        fields
    }

    /// Adds a field name to the set.
    pub fn insert(&mut self, field: impl AsRef<str>) {
        let field = field.as_ref().trim();
        if !field.is_empty() {
            self.fields.insert(field.to_lowercase());
        }
    }

    /// Returns whether `field` is masked, ignoring case.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(&field.to_lowercase())
    }

    /// Returns the number of distinct (lowercased) field names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the set masks nothing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the lowercased field names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl Default for FieldsToMask {
    fn default() -> Self {
        let mut fields = Self::empty();
        fields.extend(DEFAULT_FIELDS_TO_MASK);
        fields
    }
}

impl<S: AsRef<str>> Extend<S> for FieldsToMask {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for field in iter {
            self.insert(field);
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for FieldsToMask {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut fields = Self::empty();
        fields.extend(iter);
        fields
    }
}

/// Returns a copy of `value` with every masked key redacted.
#[must_use]
pub fn mask_sensitive_values(value: &Value, fields: &FieldsToMask) -> Value {
    let mut masked = value.clone();
    mask_in_place(&mut masked, fields);
    masked
}

/// Redacts every masked key of `value` in place.
pub fn mask_in_place(value: &mut Value, fields: &FieldsToMask) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if fields.contains(key) {
                    *entry = Value::String(MASK_MARKER.to_owned());
                } else {
                    mask_in_place(entry, fields);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                mask_in_place(item, fields);
            }
        }
        _ => {}
    }
}

/// Redacts the values of masked header names.
pub fn mask_headers(headers: &mut BTreeMap<String, String>, fields: &FieldsToMask) {
    for (name, value) in headers.iter_mut() {
        if fields.contains(name) {
            MASK_MARKER.clone_into(value);
        }
    }
}
