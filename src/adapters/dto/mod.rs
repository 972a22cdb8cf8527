pub mod upload_tree_dto;
pub mod value_dto;
