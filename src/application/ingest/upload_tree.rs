use std::collections::BTreeMap;

use crate::domain::models::upload::{UploadDescriptor, UploadNode, UploadedFiles};

/// Predicate deciding whether a normalized descriptor is kept; receives the
/// descriptor and the name of the field it was submitted under.
pub type UploadFilter = dyn Fn(&UploadDescriptor, &str) -> bool;

/// Restricts normalization to some top-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// A single field; the result is that field's uploads, unwrapped.
    One(String),
    Many(Vec<String>),
}

/// Drops descriptors that signal that no file was submitted.
pub fn has_file(descriptor: &UploadDescriptor, _field: &str) -> bool {
    descriptor.has_file()
}

/// Flattens a transport tree into per-field descriptor lists.
///
/// Branches that end up empty after filtering are pruned. Field nesting is
/// otherwise preserved.
pub fn parse_uploaded_files(
    root: &UploadNode,
    filter: Option<&UploadFilter>,
    search: Option<&SearchKey>,
) -> UploadedFiles {
    let fields = match root {
        UploadNode::Tree(fields) => fields,
        terminal => {
            return UploadedFiles::Files(parse_terminal(terminal, "", filter));
        }
    };

    match search {
        None => UploadedFiles::Fields(parse_fields(fields, filter)),
        Some(SearchKey::Many(keys)) => {
            let selected: BTreeMap<String, UploadNode> = fields
                .iter()
                .filter(|(field, _)| keys.contains(field))
                .map(|(field, node)| (field.clone(), node.clone()))
                .collect();
            UploadedFiles::Fields(parse_fields(&selected, filter))
        }
        Some(SearchKey::One(key)) => {
            let Some(node) = fields.get(key) else {
                return UploadedFiles::default();
            };
            let mut selected = BTreeMap::new();
            selected.insert(key.clone(), node.clone());
            parse_fields(&selected, filter)
                .remove(key)
                .unwrap_or_default()
        }
    }
}

fn parse_fields(
    fields: &BTreeMap<String, UploadNode>,
    filter: Option<&UploadFilter>,
) -> BTreeMap<String, UploadedFiles> {
    let mut parsed = BTreeMap::new();

    for (field, node) in fields {
        match node {
            UploadNode::Tree(children) => {
                let sub = parse_fields(children, filter);
                if !sub.is_empty() {
                    parsed.insert(field.clone(), UploadedFiles::Fields(sub));
                }
            }
            terminal => {
                let files = parse_terminal(terminal, field, filter);
                if !files.is_empty() {
                    parsed.insert(field.clone(), UploadedFiles::Files(files));
                }
            }
        }
    }

    parsed
}

fn parse_terminal(
    node: &UploadNode,
    field: &str,
    filter: Option<&UploadFilter>,
) -> Vec<UploadDescriptor> {
    let accept = |descriptor: &UploadDescriptor| filter.map_or(true, |f| f(descriptor, field));

    match node {
        UploadNode::Leaf(descriptor) => {
            if accept(descriptor) {
                vec![descriptor.clone()]
            } else {
                Vec::new()
            }
        }
        UploadNode::Grouped(grouped) => (0..grouped.len())
            .filter_map(|idx| grouped.descriptor(idx))
            .filter(|descriptor| accept(descriptor))
            .collect(),
        UploadNode::Tree(_) => Vec::new(),
    }
}
