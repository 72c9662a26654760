//! services/api/src/adapters/blob_cache.rs
//!
//! A bounded in-memory `BlobStore`. Document bytes fetched by the blob and
//! proxy strategies are parked here and served back from `/api/blobs/{id}`.
//! The oldest entry is evicted once the cache is full.

use async_trait::async_trait;
use bytes::Bytes;
use shelf_core::document::service_url;
use shelf_core::ports::{BlobStore, PortError, PortResult};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// A cached document body and its MIME type.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub mime_type: String,
}

#[derive(Default)]
struct Entries {
    blobs: HashMap<Uuid, StoredBlob>,
    order: VecDeque<Uuid>,
}

pub struct BlobCache {
    entries: RwLock<Entries>,
    capacity: usize,
    public_base: Url,
}

impl BlobCache {
    pub fn new(capacity: usize, public_base: Url) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity: capacity.max(1),
            public_base,
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<StoredBlob> {
        self.entries.read().await.blobs.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.blobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobStore for BlobCache {
    async fn put(&self, bytes: Bytes, mime_type: &str) -> PortResult<String> {
        let id = Uuid::new_v4();
        let url = service_url(&self.public_base, &format!("/api/blobs/{id}"))
            .map_err(|e| PortError::Unexpected(format!("blob URL: {e}")))?;

        let mut entries = self.entries.write().await;
        while entries.order.len() >= self.capacity {
            if let Some(evicted) = entries.order.pop_front() {
                entries.blobs.remove(&evicted);
                debug!(%evicted, "Evicted cached blob.");
            }
        }
        entries.blobs.insert(
            id,
            StoredBlob {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        entries.order.push_back(id);
        Ok(url.into())
    }
}
