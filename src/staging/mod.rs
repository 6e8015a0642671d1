use std::fmt::{Debug, Formatter, Result as FormatResult};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod errors;
mod key;
mod record;
mod backend;
mod redis;

pub use errors::StorageError;
pub use key::{Namespace, Origin, StagingKey};
pub use record::{IdentifierBundle, IdentifierStatus, CampaignBundle};
pub use backend::{StagingBackend, Staged, MemoryBackend};
pub use self::redis::RedisBackend;

use crate::config::{Config, MAX_TTL_SECONDS};
use crate::error::ConfigurationError;

/// Namespaced, TTL-scoped staging area shared by all requests.
///
/// Staging is best effort: when the backend has no connection `put` yields
/// `Ok(None)` and `get` yields `Ok(None)`. Backend errors are returned to the
/// caller, which decides whether they matter.
pub struct EphemeralStore {
    backend: Box<dyn StagingBackend>,
}

impl EphemeralStore {
    pub fn new<B>(backend: B) -> EphemeralStore where B: StagingBackend + 'static {
        EphemeralStore { backend: Box::new(backend) }
    }

    /// Redis-backed store; nothing connects until the first command.
    pub fn from_config(config: &Config) -> Result<EphemeralStore, ConfigurationError> {
        let url = config.store.url(config.environment)?;
        let backend = RedisBackend::new(&url, config.store_timeout)?;
        info!("Staging store configured at {:?}", backend);
        Ok(EphemeralStore::new(backend))
    }

    /// Stores `value` as JSON under a fresh `<namespace>:<origin>:<uuid>` key.
    /// The TTL is always the caller's choice, between one second and `MAX_TTL_SECONDS`.
    pub async fn put<V>(&self, namespace: Namespace, origin: &Origin, value: &V, ttl_seconds: u64) -> Result<Option<StagingKey>, StorageError> where V: Serialize {
        if ttl_seconds == 0 || ttl_seconds > MAX_TTL_SECONDS {
            return Err(StorageError::InvalidTtl);
        }
        let value = serde_json::to_string(value)
            .or(Err(StorageError::Serialise))?;
        let key = StagingKey::new(namespace, origin);
        match self.backend.set_with_ttl(&key.key_string(), &value, ttl_seconds).await? {
            Staged::Stored => {
                debug!("Staged {} for {}s", key, ttl_seconds);
                Ok(Some(key))
            },
            Staged::Unavailable => {
                warn!("Staging store not connected, skipping {} record", namespace.prefix());
                Ok(None)
            },
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.get_as(key).await
    }

    async fn get_as<V>(&self, key: &str) -> Result<Option<V>, StorageError> where V: DeserializeOwned {
        match self.backend.get(key).await? {
            Some(value) => serde_json::from_str(&value)
                .map(Some)
                .map_err(|e| {
                    error!("Corrupt staged record: {}", e);
                    StorageError::Corrupt
                }),
            None => Ok(None),
        }
    }

    pub async fn stage_identifier(&self, origin: &Origin, bundle: &IdentifierBundle, ttl_seconds: u64) -> Result<Option<StagingKey>, StorageError> {
        self.put(Namespace::Identifier, origin, bundle, ttl_seconds).await
    }

    pub async fn stage_campaign(&self, origin: &Origin, bundle: &CampaignBundle, ttl_seconds: u64) -> Result<Option<StagingKey>, StorageError> {
        self.put(Namespace::Campaign, origin, bundle, ttl_seconds).await
    }

    pub async fn identifier_bundle(&self, key: &StagingKey) -> Result<Option<IdentifierBundle>, StorageError> {
        if key.namespace() != Namespace::Identifier {
            return Ok(None);
        }
        self.get_as(&key.key_string()).await
    }

    pub async fn campaign_bundle(&self, key: &StagingKey) -> Result<Option<CampaignBundle>, StorageError> {
        if key.namespace() != Namespace::Campaign {
            return Ok(None);
        }
        self.get_as(&key.key_string()).await
    }
}

impl Debug for EphemeralStore {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        f.write_str("EphemeralStore")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    fn origin() -> Origin {
        "10.1.2.3".parse::<std::net::IpAddr>().unwrap().into()
    }

    #[tokio::test]
    async fn put_and_get() {
        let store = EphemeralStore::new(MemoryBackend::new());
        let key = store.put(Namespace::Campaign, &origin(), &json!({"variant": "b"}), 60).await;
        assert!(key.is_ok(), "{:?}", key);
        let key = key.unwrap().expect("stored");
        assert!(key.key_string().starts_with("campaign:10.1.2.3:"));
        assert_eq!(store.get(&key.key_string()).await, Ok(Some(json!({"variant": "b"}))));
        assert_eq!(store.get("campaign:10.1.2.3:11111111-2222-3333-4444-555555555555").await, Ok(None));
        assert_eq!(store.put(Namespace::Campaign, &origin(), &json!({}), 0).await, Err(StorageError::InvalidTtl));
    }

    #[tokio::test]
    async fn ttl_bounds() {
        let store = EphemeralStore::new(MemoryBackend::new());
        let key = store.put(Namespace::Campaign, &origin(), &json!(1), MAX_TTL_SECONDS).await;
        assert!(matches!(key, Ok(Some(_))), "{:?}", key);
        assert_eq!(store.put(Namespace::Campaign, &origin(), &json!(1), MAX_TTL_SECONDS + 1).await, Err(StorageError::InvalidTtl));
        assert_eq!(store.put(Namespace::Campaign, &origin(), &json!(1), u64::MAX).await, Err(StorageError::InvalidTtl));
    }

    #[tokio::test]
    async fn keys_never_collide() {
        let store = EphemeralStore::new(MemoryBackend::new());
        let first = store.put(Namespace::Identifier, &origin(), &json!(1), 60).await.unwrap().unwrap();
        let second = store.put(Namespace::Identifier, &origin(), &json!(2), 60).await.unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(store.get(&first.key_string()).await, Ok(Some(json!(1))));
        assert_eq!(store.get(&second.key_string()).await, Ok(Some(json!(2))));
    }

    #[tokio::test]
    async fn ttl_expiry() {
        let store = EphemeralStore::new(MemoryBackend::new());
        let key = store.put(Namespace::Identifier, &origin(), &json!({"status": "rejected"}), 1).await.unwrap().unwrap();
        assert!(store.get(&key.key_string()).await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get(&key.key_string()).await, Ok(None));
    }

    #[tokio::test]
    async fn typed_bundles() {
        let store = EphemeralStore::new(MemoryBackend::new());
        let bundle = IdentifierBundle::recovered("923086094856", Some("sealed"));
        let key = store.stage_identifier(&origin(), &bundle, 60).await.unwrap().unwrap();
        assert_eq!(key.namespace(), Namespace::Identifier);
        assert_eq!(store.identifier_bundle(&key).await, Ok(Some(bundle)));
        // wrong namespace never reads across
        assert_eq!(store.campaign_bundle(&key).await, Ok(None));

        let campaign = CampaignBundle {
            variant: "b".to_owned(),
            partner_id: "partner_1".to_owned(),
            campaign_name: "spring-sale".to_owned(),
        };
        let key = store.stage_campaign(&Origin::unknown(), &campaign, 60).await.unwrap().unwrap();
        assert_eq!(store.campaign_bundle(&key).await, Ok(Some(campaign)));
    }

    struct BrokenBackend;

    #[async_trait]
    impl StagingBackend for BrokenBackend {
        async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<Staged, StorageError> {
            Err(StorageError::Command)
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(Some("{not json".to_owned()))
        }
    }

    #[tokio::test]
    async fn failures_propagate() {
        let store = EphemeralStore::new(BrokenBackend);
        assert_eq!(store.put(Namespace::Identifier, &origin(), &json!(1), 60).await, Err(StorageError::Command));
        assert_eq!(store.get("msisdn:unknown:x").await, Err(StorageError::Corrupt));
    }

    #[tokio::test]
    async fn disconnected_store_is_a_no_op() {
        let backend = RedisBackend::new("redis://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let store = EphemeralStore::new(backend);
        assert_eq!(store.put(Namespace::Identifier, &origin(), &json!(1), 60).await, Ok(None));
        assert_eq!(store.get("msisdn:unknown:x").await, Ok(None));
    }
}
