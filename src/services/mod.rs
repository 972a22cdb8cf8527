mod error;
mod local_storage;

pub use error::StorageError;
pub use local_storage::LocalStorageService;

use std::sync::Arc;

use crate::application::services::StorageService;

pub fn create_storage_service() -> Arc<dyn StorageService> {
    Arc::new(LocalStorageService::new())
}
