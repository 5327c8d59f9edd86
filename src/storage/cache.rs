use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::schema::Database;

/// Scoped key/value store for values that outlive a single run.
///
/// Entries are addressed by `(scope, key)`. Writes replace any earlier value.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>>;
    async fn set(&self, scope: &str, key: &str, value: &str) -> Result<()>;
    /// Removes an entry. Returns whether one existed.
    async fn remove(&self, scope: &str, key: &str) -> Result<bool>;
}

#[async_trait]
impl TokenCache for Database {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM token_cache WHERE scope = ? AND key = ?")
                .bind(scope)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO token_cache (scope, key, value, updated_at)
            VALUES (?, ?, ?, datetime('now'))
            ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(scope)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, scope: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM token_cache WHERE scope = ? AND key = ?")
            .bind(scope)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Process-local cache, used with `--no-cache` and in tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TokenCache for MemoryCache {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(&(scope.to_string(), key.to_string())).cloned())
    }

    async fn set(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        self.lock()
            .insert((scope.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn remove(&self, scope: &str, key: &str) -> Result<bool> {
        Ok(self
            .lock()
            .remove(&(scope.to_string(), key.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn exercise(cache: &dyn TokenCache) {
        assert_eq!(cache.get("Bridge", "token").await.unwrap(), None);

        cache.set("Bridge", "token", "first").await.unwrap();
        assert_eq!(
            cache.get("Bridge", "token").await.unwrap(),
            Some("first".to_string())
        );

        // Upsert
        cache.set("Bridge", "token", "second").await.unwrap();
        assert_eq!(
            cache.get("Bridge", "token").await.unwrap(),
            Some("second".to_string())
        );

        // Scopes are independent
        assert_eq!(cache.get("Other", "token").await.unwrap(), None);

        assert!(cache.remove("Bridge", "token").await.unwrap());
        assert!(!cache.remove("Bridge", "token").await.unwrap());
        assert_eq!(cache.get("Bridge", "token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_database_cache() {
        let db = test_db().await;
        exercise(&db).await;
    }

    #[tokio::test]
    async fn test_memory_cache() {
        let cache = MemoryCache::new();
        exercise(&cache).await;
    }

    #[tokio::test]
    async fn test_database_cache_persists_across_reopen() {
        let dir = std::env::temp_dir().join(format!("tweetfeed-cache-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.db");
        let path_str = path.to_str().unwrap();

        let db = Database::open(path_str).await.unwrap();
        db.set("Bridge", "token", "persisted").await.unwrap();
        db.close().await;

        let db = Database::open(path_str).await.unwrap();
        assert_eq!(
            db.get("Bridge", "token").await.unwrap(),
            Some("persisted".to_string())
        );
        db.close().await;

        std::fs::remove_dir_all(&dir).ok();
    }
}
