use async_trait::async_trait;
use domain::{ItemId, ModerationError, QueuedItem};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Key-value store of pending items. Keys are `ItemId`s, which are
/// hex-validated by construction, so no further path vetting is needed
/// here. No locking: review links are one-shot and human-driven, and
/// submissions always allocate distinct random ids.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Stores a fresh submission. Fails if the id already exists.
    async fn insert(&self, item: &QueuedItem) -> Result<(), ModerationError>;

    /// Rewrites an existing item (mention re-verification).
    async fn put(&self, item: &QueuedItem) -> Result<(), ModerationError>;

    async fn get(&self, id: &ItemId) -> Result<QueuedItem, ModerationError>;

    async fn delete(&self, id: &ItemId) -> Result<(), ModerationError>;
}

/// One JSON file per item under the configured queue directory.
pub struct FileQueue {
    dir: PathBuf,
}

impl FileQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &ItemId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    fn encode(item: &QueuedItem) -> Result<Vec<u8>, ModerationError> {
        serde_json::to_vec(item)
            .map_err(|e| ModerationError::Internal(format!("failed to encode queued item: {}", e)))
    }
}

#[async_trait]
impl QueueStore for FileQueue {
    async fn insert(&self, item: &QueuedItem) -> Result<(), ModerationError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ModerationError::Internal(format!("queue directory: {}", e)))?;

        let bytes = Self::encode(item)?;
        let path = self.path_for(&item.id);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                // Structurally impossible with 32 random bytes; refuse to
                // clobber if it ever happens.
                ErrorKind::AlreadyExists => {
                    ModerationError::Internal(format!("queued item id collision: {}", item.id))
                }
                _ => ModerationError::Internal(format!("failed to write queued item: {}", e)),
            })?;
        file.write_all(&bytes)
            .await
            .map_err(|e| ModerationError::Internal(format!("failed to write queued item: {}", e)))?;

        debug!(id = %item.id, "queued item stored");
        Ok(())
    }

    async fn put(&self, item: &QueuedItem) -> Result<(), ModerationError> {
        let bytes = Self::encode(item)?;
        fs::write(self.path_for(&item.id), bytes)
            .await
            .map_err(|e| ModerationError::Internal(format!("failed to write queued item: {}", e)))
    }

    async fn get(&self, id: &ItemId) -> Result<QueuedItem, ModerationError> {
        let raw = fs::read(self.path_for(id)).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModerationError::NotFound(format!("queued item {}", id)),
            _ => ModerationError::Internal(format!("failed to read queued item: {}", e)),
        })?;
        serde_json::from_slice(&raw)
            .map_err(|e| ModerationError::Internal(format!("corrupt queued item {}: {}", id, e)))
    }

    async fn delete(&self, id: &ItemId) -> Result<(), ModerationError> {
        fs::remove_file(self.path_for(id)).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModerationError::NotFound(format!("queued item {}", id)),
            _ => ModerationError::Internal(format!("failed to delete queued item: {}", e)),
        })
    }
}

/// In-memory queue for tests.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<HashMap<String, QueuedItem>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueueStore for MemoryQueue {
    async fn insert(&self, item: &QueuedItem) -> Result<(), ModerationError> {
        let mut items = self.items.lock().unwrap();
        if items.contains_key(item.id.as_str()) {
            return Err(ModerationError::Internal(format!(
                "queued item id collision: {}",
                item.id
            )));
        }
        items.insert(item.id.as_str().to_string(), item.clone());
        Ok(())
    }

    async fn put(&self, item: &QueuedItem) -> Result<(), ModerationError> {
        self.items
            .lock()
            .unwrap()
            .insert(item.id.as_str().to_string(), item.clone());
        Ok(())
    }

    async fn get(&self, id: &ItemId) -> Result<QueuedItem, ModerationError> {
        self.items
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ModerationError::NotFound(format!("queued item {}", id)))
    }

    async fn delete(&self, id: &ItemId) -> Result<(), ModerationError> {
        self.items
            .lock()
            .unwrap()
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| ModerationError::NotFound(format!("queued item {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn scratch_dir() -> PathBuf {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        std::env::temp_dir().join(format!("queue-test-{}", hex::encode(bytes)))
    }

    fn sample_item() -> QueuedItem {
        QueuedItem::comment(
            "/posts/foo",
            "/posts/foo/",
            "Foo",
            "Alice",
            None,
            None,
            "<p>Hello</p>",
        )
    }

    #[tokio::test]
    async fn file_queue_round_trip() {
        let dir = scratch_dir();
        let queue = FileQueue::new(&dir);
        let item = sample_item();

        queue.insert(&item).await.unwrap();
        let loaded = queue.get(&item.id).await.unwrap();
        assert_eq!(loaded.name.as_deref(), Some("Alice"));

        queue.delete(&item.id).await.unwrap();
        assert!(matches!(
            queue.get(&item.id).await,
            Err(ModerationError::NotFound(_))
        ));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn file_queue_delete_is_one_shot() {
        let dir = scratch_dir();
        let queue = FileQueue::new(&dir);
        let item = sample_item();

        queue.insert(&item).await.unwrap();
        queue.delete(&item.id).await.unwrap();
        assert!(matches!(
            queue.delete(&item.id).await,
            Err(ModerationError::NotFound(_))
        ));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn file_queue_refuses_duplicate_insert() {
        let dir = scratch_dir();
        let queue = FileQueue::new(&dir);
        let item = sample_item();

        queue.insert(&item).await.unwrap();
        assert!(matches!(
            queue.insert(&item).await,
            Err(ModerationError::Internal(_))
        ));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn file_queue_put_overwrites() {
        let dir = scratch_dir();
        let queue = FileQueue::new(&dir);
        let mut item = sample_item();

        queue.insert(&item).await.unwrap();
        item.message = Some("<p>Edited</p>".to_string());
        queue.put(&item).await.unwrap();

        let loaded = queue.get(&item.id).await.unwrap();
        assert_eq!(loaded.message.as_deref(), Some("<p>Edited</p>"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn memory_queue_behaves_like_file_queue() {
        let queue = MemoryQueue::new();
        let item = sample_item();

        queue.insert(&item).await.unwrap();
        assert!(queue.insert(&item).await.is_err());
        assert_eq!(queue.len(), 1);

        queue.delete(&item.id).await.unwrap();
        assert!(matches!(
            queue.delete(&item.id).await,
            Err(ModerationError::NotFound(_))
        ));
        assert!(queue.is_empty());
    }
}
