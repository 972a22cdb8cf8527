use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Status code attached to every native file submission by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UploadErrorCode {
    Ok,
    IniSize,
    FormSize,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    Extension,
}

impl UploadErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            UploadErrorCode::Ok => "There is no error, the file uploaded with success",
            UploadErrorCode::IniSize => {
                "The uploaded file exceeds the upload_max_filesize directive"
            }
            UploadErrorCode::FormSize => {
                "The uploaded file exceeds the MAX_FILE_SIZE directive that was specified in the HTML form"
            }
            UploadErrorCode::Partial => "The uploaded file was only partially uploaded",
            UploadErrorCode::NoFile => "No file was uploaded",
            UploadErrorCode::NoTmpDir => "Missing a temporary folder",
            UploadErrorCode::CantWrite => "Failed to write file to disk",
            UploadErrorCode::Extension => "An extension stopped the file upload",
        }
    }
}

impl TryFrom<u8> for UploadErrorCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UploadErrorCode::Ok),
            1 => Ok(UploadErrorCode::IniSize),
            2 => Ok(UploadErrorCode::FormSize),
            3 => Ok(UploadErrorCode::Partial),
            4 => Ok(UploadErrorCode::NoFile),
            6 => Ok(UploadErrorCode::NoTmpDir),
            7 => Ok(UploadErrorCode::CantWrite),
            8 => Ok(UploadErrorCode::Extension),
            other => Err(format!("unknown upload error code {}", other)),
        }
    }
}

impl From<UploadErrorCode> for u8 {
    fn from(code: UploadErrorCode) -> Self {
        match code {
            UploadErrorCode::Ok => 0,
            UploadErrorCode::IniSize => 1,
            UploadErrorCode::FormSize => 2,
            UploadErrorCode::Partial => 3,
            UploadErrorCode::NoFile => 4,
            UploadErrorCode::NoTmpDir => 6,
            UploadErrorCode::CantWrite => 7,
            UploadErrorCode::Extension => 8,
        }
    }
}

/// One native file submission, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    #[serde(rename = "tmpName")]
    pub temporary_path: PathBuf,
    #[serde(rename = "name")]
    pub original_name: Option<String>,
    #[serde(rename = "type")]
    pub declared_type: Option<String>,
    #[serde(rename = "size")]
    pub declared_size: Option<u64>,
    #[serde(rename = "error")]
    pub error_code: UploadErrorCode,
}

impl UploadDescriptor {
    pub fn is_ok(&self) -> bool {
        self.error_code == UploadErrorCode::Ok
    }

    pub fn has_file(&self) -> bool {
        self.error_code != UploadErrorCode::NoFile
    }
}

/// Parallel per-file attribute arrays for a field that accepted several files.
///
/// Every column has the same length; the boundary conversion rejects
/// mismatched lengths before a value of this type exists.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedUpload {
    pub tmp_name: Vec<PathBuf>,
    pub name: Vec<Option<String>>,
    pub mime_type: Vec<Option<String>>,
    pub size: Vec<Option<u64>>,
    pub error: Vec<UploadErrorCode>,
}

impl GroupedUpload {
    /// Splits descriptors back into parallel columns, keeping their order.
    pub fn from_descriptors(descriptors: Vec<UploadDescriptor>) -> Self {
        let mut grouped = GroupedUpload {
            tmp_name: Vec::with_capacity(descriptors.len()),
            name: Vec::with_capacity(descriptors.len()),
            mime_type: Vec::with_capacity(descriptors.len()),
            size: Vec::with_capacity(descriptors.len()),
            error: Vec::with_capacity(descriptors.len()),
        };
        for descriptor in descriptors {
            grouped.tmp_name.push(descriptor.temporary_path);
            grouped.name.push(descriptor.original_name);
            grouped.mime_type.push(descriptor.declared_type);
            grouped.size.push(descriptor.declared_size);
            grouped.error.push(descriptor.error_code);
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.error.is_empty()
    }

    /// Re-associates the attributes found at `index` into one descriptor.
    pub fn descriptor(&self, index: usize) -> Option<UploadDescriptor> {
        Some(UploadDescriptor {
            temporary_path: self.tmp_name.get(index)?.clone(),
            original_name: self.name.get(index)?.clone(),
            declared_type: self.mime_type.get(index)?.clone(),
            declared_size: *self.size.get(index)?,
            error_code: *self.error.get(index)?,
        })
    }
}

/// Raw transport tree, discriminated at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadNode {
    Leaf(UploadDescriptor),
    Grouped(GroupedUpload),
    Tree(BTreeMap<String, UploadNode>),
}

impl UploadNode {
    pub fn empty() -> Self {
        UploadNode::Tree(BTreeMap::new())
    }
}

/// Normalized uploads: every terminal field holds a list of descriptors.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadedFiles {
    Files(Vec<UploadDescriptor>),
    Fields(BTreeMap<String, UploadedFiles>),
}

impl Default for UploadedFiles {
    fn default() -> Self {
        UploadedFiles::Fields(BTreeMap::new())
    }
}

impl UploadedFiles {
    pub fn is_empty(&self) -> bool {
        match self {
            UploadedFiles::Files(files) => files.is_empty(),
            UploadedFiles::Fields(fields) => fields.is_empty(),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<UploadedFiles> {
        match self {
            UploadedFiles::Fields(fields) => fields.remove(field),
            UploadedFiles::Files(_) => None,
        }
    }

    /// Every descriptor at or below this level; field groups are visited in key order.
    pub fn into_files(self) -> Vec<UploadDescriptor> {
        match self {
            UploadedFiles::Files(files) => files,
            UploadedFiles::Fields(fields) => fields
                .into_values()
                .flat_map(UploadedFiles::into_files)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip_through_wire_values() {
        for raw in [0u8, 1, 2, 3, 4, 6, 7, 8] {
            let code = UploadErrorCode::try_from(raw).unwrap();
            assert_eq!(u8::from(code), raw);
        }
        assert!(UploadErrorCode::try_from(5).is_err());
    }

    #[test]
    fn grouped_descriptor_keeps_index_alignment() {
        let grouped = GroupedUpload {
            tmp_name: vec!["/tmp/a".into(), "/tmp/b".into()],
            name: vec![Some("a.png".into()), Some("b.png".into())],
            mime_type: vec![None, None],
            size: vec![Some(1), Some(2)],
            error: vec![UploadErrorCode::Ok, UploadErrorCode::NoFile],
        };

        let second = grouped.descriptor(1).unwrap();
        assert_eq!(second.temporary_path, PathBuf::from("/tmp/b"));
        assert_eq!(second.original_name.as_deref(), Some("b.png"));
        assert_eq!(second.declared_size, Some(2));
        assert!(!second.has_file());
        assert!(grouped.descriptor(2).is_none());
    }

    fn file(tmp: &str) -> UploadDescriptor {
        UploadDescriptor {
            temporary_path: PathBuf::from(tmp),
            original_name: Some(tmp.to_string()),
            declared_type: None,
            declared_size: Some(1),
            error_code: UploadErrorCode::Ok,
        }
    }

    #[test]
    fn into_files_collects_nested_field_groups() {
        let files = UploadedFiles::Fields(BTreeMap::from([
            ("banner".to_string(), UploadedFiles::Files(vec![file("b")])),
            (
                "logo".to_string(),
                UploadedFiles::Fields(BTreeMap::from([(
                    "dark".to_string(),
                    UploadedFiles::Files(vec![file("l1"), file("l2")]),
                )])),
            ),
        ]));

        let names: Vec<_> = files
            .into_files()
            .into_iter()
            .map(|d| d.temporary_path)
            .collect();
        assert_eq!(names, vec![PathBuf::from("b"), "l1".into(), "l2".into()]);
    }

    #[test]
    fn grouped_columns_round_trip_descriptors_in_order() {
        let grouped = GroupedUpload::from_descriptors(vec![file("a"), file("b")]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.descriptor(1), Some(file("b")));
    }
}
