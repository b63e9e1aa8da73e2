//! Shared test helpers for handler tests.

use std::sync::Arc;

use crate::blob::BlobStore;
use crate::config::{Config, NodeConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::AppState;

/// Create a test AppState backed by a local object store in a temp dir.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let files_dir = temp_dir.path().join("blobs");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
            object_prefix: "test/".to_string(),
            ..Default::default()
        },
        max_upload_size: 1024,
    };

    let object_store = LocalStore::new(&files_dir).expect("Failed to create test object store");

    Arc::new(AppState {
        blobs: BlobStore::new(Arc::new(object_store), config.storage.object_prefix.clone()),
        config,
    })
}
