use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AppError;

/// Blob storage for delivery evidence.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    async fn upload(&self, key: &str, content_type: &str, bytes: &[u8]) -> Result<String, AppError>;
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct MemoryObjectStorage {
    base_url: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, key: &str, content_type: &str, bytes: &[u8]) -> Result<String, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Upload("empty upload".to_string()));
        }

        self.objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );

        Ok(format!("{}/{}", self.base_url, key))
    }
}
