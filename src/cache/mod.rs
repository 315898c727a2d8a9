use anyhow::Result;
use base64::Engine;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::model::TasteProfile;

/// How long an analyzed profile stays reusable.
pub const PROFILE_TTL_SECS: u64 = 3600;

/// Best-effort Redis store. Every operation quietly does nothing when Redis is
/// unreachable, so the app works without it.
pub struct Cache {
    client: redis::Client,
}

impl Cache {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Cache { client })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let val: Option<String> = conn.get(key).await.unwrap_or(None);
                Ok(val)
            }
            Err(_) => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            if let Some(ttl) = ttl_secs {
                let _: std::result::Result<(), _> = conn.set_ex(key, value, ttl).await;
            } else {
                let _: std::result::Result<(), _> = conn.set(key, value).await;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            let _: std::result::Result<(), _> = conn.del(key).await;
        }
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: std::result::Result<String, _> =
                    redis::cmd("PING").query_async(&mut conn).await;
                result.is_ok()
            }
            Err(_) => false,
        }
    }

    /// A value that no longer deserializes is treated as missing.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring unreadable cache entry {key}: {e}");
                Ok(None)
            }
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl_secs).await
    }

    /// `scope` names the analysis settings the profile was built with.
    pub async fn load_profile(&self, user_id: &str, scope: &str) -> Result<Option<TasteProfile>> {
        self.get_json(&profile_key(user_id, scope)).await
    }

    pub async fn save_profile(
        &self,
        user_id: &str,
        scope: &str,
        profile: &TasteProfile,
    ) -> Result<()> {
        self.set_json(&profile_key(user_id, scope), profile, Some(PROFILE_TTL_SECS))
            .await
    }
}

/// Redis key for a user's profile built with `scope` settings. The user id is
/// hashed so it never shows up in the keyspace.
pub fn profile_key(user_id: &str, scope: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(scope.as_bytes());
    let digest = hasher.finalize();
    format!(
        "tasteseed:profile:{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_key_is_stable_and_opaque() {
        let a = profile_key("alice", "liked");
        assert_eq!(a, profile_key("alice", "liked"));
        assert_ne!(a, profile_key("bob", "liked"));
        assert!(a.starts_with("tasteseed:profile:"));
        assert!(!a.contains("alice"));
    }

    #[test]
    fn test_profile_key_depends_on_scope() {
        assert_ne!(
            profile_key("alice", "liked"),
            profile_key("alice", "liked+playlists:10x50")
        );
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_a_miss() {
        let cache = Cache::new("redis://127.0.0.1:1").unwrap();
        assert!(!cache.ping().await);
        assert!(cache.load_profile("alice", "liked").await.unwrap().is_none());
        assert!(cache
            .save_profile("alice", "liked", &TasteProfile::empty())
            .await
            .is_ok());
    }
}
