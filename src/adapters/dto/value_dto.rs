use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    application::error::IngestError,
    domain::models::{
        attribute::AttributeConfig,
        payload::{DataPayload, PropertyValue, StoredValue},
    },
};

/// A file staged earlier, referenced by its generated identifier.
#[derive(Debug, Deserialize)]
pub struct StagedReferenceDTO {
    pub id: String,
    pub name: String,
}

impl From<StagedReferenceDTO> for DataPayload {
    fn from(dto: StagedReferenceDTO) -> Self {
        DataPayload::staged(dto.id, dto.name)
    }
}

/// Reads the attribute's current JSON value.
///
/// Accepts a string, a `{ "id", "name" }` staged reference, or a list of
/// those. A localized attribute takes an object keyed by locale instead.
pub fn property_value_from_json(
    value: &Value,
    attribute: &AttributeConfig,
) -> Result<PropertyValue, IngestError> {
    if attribute.l10n {
        if let Value::Object(map) = value {
            if !map.contains_key("id") {
                let mut localized = BTreeMap::new();
                for (locale, entry) in map {
                    localized.insert(locale.clone(), payloads_from_json(entry)?);
                }
                return Ok(PropertyValue::Localized(localized));
            }
        }
    }

    let payloads = payloads_from_json(value)?;
    if payloads.is_empty() {
        Ok(PropertyValue::Empty)
    } else {
        Ok(PropertyValue::Payloads(payloads))
    }
}

fn payloads_from_json(value: &Value) -> Result<Vec<DataPayload>, IngestError> {
    match value {
        Value::Array(items) => {
            let mut payloads = Vec::new();
            for item in items {
                if let Some(payload) = payload_from_json(item)? {
                    payloads.push(payload);
                }
            }
            Ok(payloads)
        }
        single => Ok(payload_from_json(single)?.into_iter().collect()),
    }
}

fn payload_from_json(value: &Value) -> Result<Option<DataPayload>, IngestError> {
    match value {
        Value::String(text) => Ok(DataPayload::from_text(text.as_str())),
        Value::Object(_) => {
            let dto: StagedReferenceDTO = serde_json::from_value(value.clone()).map_err(|e| {
                IngestError::MalformedInput(format!(
                    "a staged reference must contain the keys \"id\" and \"name\": {}",
                    e
                ))
            })?;
            Ok(Some(dto.into()))
        }
        _ => Ok(None),
    }
}

pub fn stored_value_to_json(value: &StoredValue) -> Result<Value, IngestError> {
    serde_json::to_value(value)
        .map_err(|e| IngestError::MalformedInput(format!("unserializable stored value: {}", e)))
}
