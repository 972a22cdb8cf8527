mod storage_service;
mod validation_sink;

pub use storage_service::StorageService;
pub use validation_sink::{
    ValidationErrors, ValidationFailure, ValidationSink, ACCEPTED_MIMETYPES, MAX_FILESIZE,
};
