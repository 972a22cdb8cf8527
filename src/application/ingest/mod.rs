pub mod file_property;
pub mod filename;
pub mod path_normalizer;
pub mod path_resolver;
pub mod source_resolver;
pub mod upload_tree;
pub mod validation_gate;

pub use file_property::FileProperty;
