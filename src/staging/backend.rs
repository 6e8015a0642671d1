use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::misc::seconds_from_now;
use crate::staging::errors::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staged {
    Stored,
    // no usable connection, the write was skipped
    Unavailable,
}

/// Key-value store that enforces per-record expiry itself.
///
/// Implementations must make a record unreadable once its TTL has elapsed;
/// nothing above this layer deletes records.
#[async_trait]
pub trait StagingBackend: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<Staged, StorageError>;

    /// `Ok(None)` covers missing, expired, and not-yet-connected alike.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
}

struct MemoryRecord {
    value: String,
    expires: DateTime<Utc>,
}

impl MemoryRecord {
    #[inline]
    fn is_expired(&self, now: &DateTime<Utc>) -> bool {
        self.expires <= *now
    }
}

/// In-process backend for development and tests.
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, MemoryRecord>>,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        Default::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired records; reads already ignore them.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        match self.records.lock() {
            Ok(mut records) => {
                let before = records.len();
                records.retain(|_, record| !record.is_expired(&now));
                let removed = before - records.len();
                if removed > 0 {
                    debug!("Removed {} expired staged records", removed);
                }
                removed
            },
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl StagingBackend for MemoryBackend {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<Staged, StorageError> {
        if ttl_seconds == 0 {
            return Err(StorageError::InvalidTtl);
        }
        let expires = i64::try_from(ttl_seconds).ok()
            .and_then(seconds_from_now)
            .ok_or(StorageError::InvalidTtl)?;
        let mut records = self.records.lock()
            .or(Err(StorageError::Command))?;
        records.insert(key.to_owned(), MemoryRecord { value: value.to_owned(), expires });
        Ok(Staged::Stored)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Utc::now();
        let mut records = self.records.lock()
            .or(Err(StorageError::Command))?;
        let expired = match records.get(key) {
            Some(record) if !record.is_expired(&now) => return Ok(Some(record.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            records.remove(key);
        }
        Ok(None)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[tokio::test]
    async fn set_and_get() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.set_with_ttl("a", "1", 60).await, Ok(Staged::Stored));
        assert_eq!(backend.get("a").await, Ok(Some("1".to_owned())));
        assert_eq!(backend.get("b").await, Ok(None));
        assert_eq!(backend.set_with_ttl("a", "2", 60).await, Ok(Staged::Stored));
        assert_eq!(backend.get("a").await, Ok(Some("2".to_owned())));
        assert_eq!(backend.set_with_ttl("c", "1", 0).await, Err(StorageError::InvalidTtl));
    }

    #[tokio::test]
    async fn out_of_range_ttl() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.set_with_ttl("a", "1", 10_000_000_000_000_000).await, Err(StorageError::InvalidTtl));
        assert_eq!(backend.set_with_ttl("b", "1", u64::MAX).await, Err(StorageError::InvalidTtl));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn expiry() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl("short", "1", 1).await.unwrap();
        backend.set_with_ttl("long", "1", 60).await.unwrap();
        assert_eq!(backend.get("short").await, Ok(Some("1".to_owned())));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(backend.get("short").await, Ok(None));
        assert_eq!(backend.get("long").await, Ok(Some("1".to_owned())));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn cleanup() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl("short", "1", 1).await.unwrap();
        backend.set_with_ttl("long", "1", 60).await.unwrap();
        assert_eq!(backend.cleanup(), 0);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(backend.cleanup(), 1);
        assert_eq!(backend.len(), 1);
    }
}
