/// View counting for the gateway
///
/// Counters live in Redis only: playback increments are far too frequent for
/// the catalog, and losing them on a cache restart is an accepted tradeoff.
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::Result;

/// Per-video view counter backed by Redis
#[derive(Clone)]
pub struct ViewCounter {
    conn: ConnectionManager,
}

impl ViewCounter {
    /// Connect to Redis and hand back a counter.
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Record one view. Callers treat this as fire-and-forget: log the error,
    /// never fail the playback response over it.
    pub async fn record_view(&self, reference: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(Self::view_key(reference), 1).await?;
        Ok(count)
    }

    /// Current count for one video; absent keys read as 0.
    pub async fn get(&self, reference: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn.get(Self::view_key(reference)).await?;
        Ok(count.unwrap_or(0))
    }

    /// Counts for many videos in one round trip; absent keys read as 0.
    pub async fn get_many(&self, references: &[String]) -> Result<Vec<i64>> {
        if references.is_empty() {
            return Ok(vec![]);
        }
        // redis-rs collapses a single-key MGET into a plain GET reply.
        if references.len() == 1 {
            return Ok(vec![self.get(&references[0]).await?]);
        }

        let keys: Vec<String> = references.iter().map(|r| Self::view_key(r)).collect();
        let mut conn = self.conn.clone();
        let counts: Vec<Option<i64>> = conn.get(&keys).await?;
        Ok(counts.into_iter().map(|c| c.unwrap_or(0)).collect())
    }

    /// Drop the counter alongside record deletion.
    pub async fn delete(&self, reference: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::view_key(reference)).await?;
        Ok(())
    }

    fn view_key(reference: &str) -> String {
        format!("views:{reference}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_key() {
        assert_eq!(ViewCounter::view_key("vid_abc"), "views:vid_abc");
    }

    // Integration tests require Redis; run with:
    // REDIS_URL=... cargo test -- --ignored

    async fn test_counter() -> ViewCounter {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost".to_string());
        ViewCounter::connect(&url).await.expect("connect to redis")
    }

    #[ignore]
    #[tokio::test]
    async fn test_increments_add_up() {
        let counter = test_counter().await;
        let reference = crate::models::new_reference();

        let before = counter.get(&reference).await.unwrap();
        assert_eq!(before, 0);

        for _ in 0..3 {
            counter.record_view(&reference).await.unwrap();
        }
        assert_eq!(counter.get(&reference).await.unwrap(), 3);

        counter.delete(&reference).await.unwrap();
        assert_eq!(counter.get(&reference).await.unwrap(), 0);
    }

    #[ignore]
    #[tokio::test]
    async fn test_get_many_substitutes_zero() {
        let counter = test_counter().await;
        let seen = crate::models::new_reference();
        let never_seen = crate::models::new_reference();

        counter.record_view(&seen).await.unwrap();

        let counts = counter
            .get_many(&[seen.clone(), never_seen])
            .await
            .unwrap();
        assert_eq!(counts, vec![1, 0]);

        counter.delete(&seen).await.unwrap();
    }
}
