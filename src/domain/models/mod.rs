pub mod attribute;
pub mod file;
pub mod payload;
pub mod upload;
