use std::{collections::BTreeMap, path::PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    application::error::IngestError,
    domain::models::upload::{GroupedUpload, UploadDescriptor, UploadErrorCode, UploadNode},
};

const LEAF_KEYS: [&str; 5] = ["tmp_name", "name", "type", "size", "error"];

#[derive(Debug, Deserialize)]
struct UploadLeafDTO {
    tmp_name: PathBuf,
    name: Option<String>,
    #[serde(rename = "type")]
    mime_type: Option<String>,
    size: Option<u64>,
    error: UploadErrorCode,
}

impl From<UploadLeafDTO> for UploadDescriptor {
    fn from(dto: UploadLeafDTO) -> Self {
        Self {
            temporary_path: dto.tmp_name,
            original_name: dto.name,
            declared_type: dto.mime_type,
            declared_size: dto.size,
            error_code: dto.error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroupedUploadDTO {
    tmp_name: Vec<PathBuf>,
    name: Vec<Option<String>>,
    #[serde(rename = "type")]
    mime_type: Vec<Option<String>>,
    size: Vec<Option<u64>>,
    error: Vec<UploadErrorCode>,
}

impl TryFrom<GroupedUploadDTO> for GroupedUpload {
    type Error = IngestError;

    fn try_from(dto: GroupedUploadDTO) -> Result<Self, Self::Error> {
        let len = dto.error.len();
        let lengths = [
            dto.tmp_name.len(),
            dto.name.len(),
            dto.mime_type.len(),
            dto.size.len(),
        ];
        if lengths.iter().any(|l| *l != len) {
            return Err(IngestError::MalformedInput(format!(
                "grouped upload attributes have mismatched lengths: {:?} vs {} error codes",
                lengths, len
            )));
        }

        Ok(Self {
            tmp_name: dto.tmp_name,
            name: dto.name,
            mime_type: dto.mime_type,
            size: dto.size,
            error: dto.error,
        })
    }
}

/// Converts a transport tree into an [`UploadNode`].
///
/// An object carrying an `error` key is a descriptor and must carry all five
/// descriptor keys. Any other object is a group of fields, and an array is a
/// group keyed by index. Scalar field values are ignored.
pub fn upload_tree_from_json(value: &Value) -> Result<UploadNode, IngestError> {
    match value {
        Value::Null => Ok(UploadNode::empty()),
        Value::Object(map) => node_from_object(map),
        other => Err(IngestError::MalformedInput(format!(
            "upload tree must be an object, got {}",
            kind(other)
        ))),
    }
}

fn node_from_object(map: &Map<String, Value>) -> Result<UploadNode, IngestError> {
    if !map.contains_key("error") {
        let mut fields = BTreeMap::new();
        for (field, child) in map {
            match child {
                Value::Object(child) => {
                    fields.insert(field.clone(), node_from_object(child)?);
                }
                Value::Array(items) => {
                    fields.insert(field.clone(), node_from_array(items)?);
                }
                _ => {}
            }
        }
        return Ok(UploadNode::Tree(fields));
    }

    require_leaf_keys(map)?;

    match &map["error"] {
        Value::Array(codes) if codes.iter().all(is_scalar) => {
            let dto: GroupedUploadDTO = from_json(map)?;
            Ok(UploadNode::Grouped(dto.try_into()?))
        }
        Value::Array(_) | Value::Object(_) => transpose(map),
        _ => {
            let dto: UploadLeafDTO = from_json(map)?;
            Ok(UploadNode::Leaf(dto.into()))
        }
    }
}

/// A list made only of single-file descriptors becomes one grouped node so
/// submission order survives; any other list is keyed by index.
fn node_from_array(items: &[Value]) -> Result<UploadNode, IngestError> {
    let all_leaves = !items.is_empty()
        && items.iter().all(|item| {
            matches!(item, Value::Object(map) if map.get("error").is_some_and(is_scalar))
        });

    if all_leaves {
        let mut descriptors = Vec::with_capacity(items.len());
        for item in items {
            if let Value::Object(map) = item {
                require_leaf_keys(map)?;
                let dto: UploadLeafDTO = from_json(map)?;
                descriptors.push(dto.into());
            }
        }
        return Ok(UploadNode::Grouped(GroupedUpload::from_descriptors(
            descriptors,
        )));
    }

    let mut fields = BTreeMap::new();
    for (idx, item) in items.iter().enumerate() {
        match item {
            Value::Object(map) => {
                fields.insert(idx.to_string(), node_from_object(map)?);
            }
            Value::Array(inner) => {
                fields.insert(idx.to_string(), node_from_array(inner)?);
            }
            _ => {}
        }
    }
    Ok(UploadNode::Tree(fields))
}

fn require_leaf_keys(map: &Map<String, Value>) -> Result<(), IngestError> {
    match LEAF_KEYS.iter().find(|key| !map.contains_key(**key)) {
        Some(missing) => Err(IngestError::MalformedInput(format!(
            "upload descriptor is missing the '{}' key",
            missing
        ))),
        None => Ok(()),
    }
}

/// Splits a descriptor whose columns are nested structures into one
/// sub-descriptor per key, preserving the nesting as fields.
fn transpose(map: &Map<String, Value>) -> Result<UploadNode, IngestError> {
    let keys: Vec<String> = match &map["error"] {
        Value::Object(codes) => codes.keys().cloned().collect(),
        Value::Array(codes) => (0..codes.len()).map(|idx| idx.to_string()).collect(),
        _ => Vec::new(),
    };

    let mut fields = BTreeMap::new();
    for key in keys {
        let mut child = Map::new();
        for column in LEAF_KEYS {
            let cell = lookup(&map[column], &key).ok_or_else(|| {
                IngestError::MalformedInput(format!(
                    "upload descriptor column '{}' has no entry '{}'",
                    column, key
                ))
            })?;
            child.insert(column.to_string(), cell.clone());
        }
        fields.insert(key, node_from_object(&child)?);
    }

    Ok(UploadNode::Tree(fields))
}

fn lookup<'a>(column: &'a Value, key: &str) -> Option<&'a Value> {
    match column {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

fn from_json<T: for<'de> Deserialize<'de>>(map: &Map<String, Value>) -> Result<T, IngestError> {
    serde_json::from_value(Value::Object(map.clone()))
        .map_err(|e| IngestError::MalformedInput(format!("invalid upload descriptor: {}", e)))
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
