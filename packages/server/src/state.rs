use std::sync::Arc;

use common::storage::BlobStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::gallery::{GalleryService, UploadPolicy};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub blob_store: Arc<dyn BlobStore>,
}

impl AppState {
    /// The image lifecycle engine bound to this request's collaborators.
    pub fn gallery(&self) -> GalleryService<'_, DatabaseConnection> {
        GalleryService::new(
            &self.db,
            &*self.blob_store,
            UploadPolicy::from_config(&self.config.storage),
        )
    }
}
