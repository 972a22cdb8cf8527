use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A non-descriptor candidate for the attribute's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPayload {
    /// A file staged earlier in the temporary area under a generated identifier.
    Staged {
        reference_id: String,
        original_name: String,
    },
    /// A self-describing `data:` URI.
    DataUri(String),
    /// An already-resolved storage-relative path, kept as-is.
    StoredPath(String),
}

impl DataPayload {
    /// Classifies a raw string. Empty strings carry no candidate.
    pub fn from_text(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else if is_data_uri(&value) {
            Some(DataPayload::DataUri(value))
        } else {
            Some(DataPayload::StoredPath(value))
        }
    }

    pub fn staged(reference_id: impl Into<String>, original_name: impl Into<String>) -> Self {
        DataPayload::Staged {
            reference_id: reference_id.into(),
            original_name: original_name.into(),
        }
    }

    /// The payload as it would be stored verbatim. Staged references have none.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataPayload::DataUri(value) | DataPayload::StoredPath(value) => Some(value),
            DataPayload::Staged { .. } => None,
        }
    }
}

pub fn is_data_uri(value: &str) -> bool {
    value
        .get(..5)
        .map(|prefix| prefix.eq_ignore_ascii_case("data:"))
        .unwrap_or(false)
}

/// The attribute value known at save time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropertyValue {
    #[default]
    Empty,
    Payloads(Vec<DataPayload>),
    Localized(BTreeMap<String, Vec<DataPayload>>),
}

impl PropertyValue {
    pub fn single(payload: DataPayload) -> Self {
        PropertyValue::Payloads(vec![payload])
    }

    pub fn text(value: impl Into<String>) -> Self {
        match DataPayload::from_text(value) {
            Some(payload) => PropertyValue::single(payload),
            None => PropertyValue::Empty,
        }
    }

    /// Payloads for a non-localized save. A localized value yields nothing here.
    pub fn into_payloads(self) -> Vec<DataPayload> {
        match self {
            PropertyValue::Empty | PropertyValue::Localized(_) => Vec::new(),
            PropertyValue::Payloads(payloads) => payloads,
        }
    }

    pub fn into_localized(self) -> BTreeMap<String, Vec<DataPayload>> {
        match self {
            PropertyValue::Localized(values) => values,
            PropertyValue::Empty | PropertyValue::Payloads(_) => BTreeMap::new(),
        }
    }
}

/// Value handed to the storage mapping layer after a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Single(Option<String>),
    Multiple(Vec<String>),
    Localized(BTreeMap<String, StoredValue>),
}

impl StoredValue {
    /// Reduces collected paths by cardinality; a single-valued field keeps the first.
    pub fn from_paths(paths: Vec<String>, multiple: bool) -> Self {
        if multiple {
            StoredValue::Multiple(paths)
        } else {
            StoredValue::Single(paths.into_iter().next())
        }
    }

    pub fn paths(&self) -> Vec<&str> {
        match self {
            StoredValue::Single(path) => path.iter().map(String::as_str).collect(),
            StoredValue::Multiple(paths) => paths.iter().map(String::as_str).collect(),
            StoredValue::Localized(values) => values.values().flat_map(|v| v.paths()).collect(),
        }
    }
}
