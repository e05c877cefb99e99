use crate::{
    db::{Cache, CacheKey},
    error::AppResult,
};

/// Store for model replies that passed validation
///
/// Stages look a prompt up before calling the model and store the reply only
/// once it has parsed and validated, so a malformed reply is never replayed.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReplyCache: Send + Sync {
    async fn lookup(&self, prompt: &str) -> AppResult<Option<String>>;

    /// Queues `reply` for storage without waiting for the write
    fn store(&self, prompt: &str, reply: &str);
}

/// Redis-backed reply cache, keyed by model and prompt digest
///
/// Identical prompts are common: the same preference form or query gets
/// submitted repeatedly, and ranking prompts repeat whenever the candidate
/// list does.
#[derive(Clone)]
pub struct RedisReplyCache {
    cache: Cache,
    model: String,
    ttl: u64,
}

impl RedisReplyCache {
    pub fn new(cache: Cache, model: String, ttl: u64) -> Self {
        Self { cache, model, ttl }
    }
}

#[async_trait::async_trait]
impl ReplyCache for RedisReplyCache {
    async fn lookup(&self, prompt: &str) -> AppResult<Option<String>> {
        self.cache
            .get_from_cache(&CacheKey::completion(&self.model, prompt))
            .await
    }

    fn store(&self, prompt: &str, reply: &str) {
        let key = CacheKey::completion(&self.model, prompt);
        self.cache.set_in_background(&key, &reply, self.ttl);
    }
}

/// Looks `prompt` up, treating a failed read as a miss
pub async fn recall(
    cache: Option<&dyn ReplyCache>,
    stage: &'static str,
    prompt: &str,
) -> Option<String> {
    let cache = cache?;
    match cache.lookup(prompt).await {
        Ok(Some(reply)) => {
            tracing::debug!(stage, "Reply cache hit");
            Some(reply)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(stage, error = %e, "Reply cache read failed, calling the model");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_redis_client;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_recall_without_cache_is_a_miss() {
        assert_eq!(recall(None, "synthesis", "anything").await, None);
    }

    #[tokio::test]
    async fn test_recall_read_failure_is_a_miss() {
        let mut cache = MockReplyCache::new();
        cache
            .expect_lookup()
            .returning(|_| Err(AppError::Internal("connection refused".to_string())));

        assert_eq!(recall(Some(&cache as &dyn ReplyCache), "ranking", "prompt").await, None);
    }

    #[tokio::test]
    async fn test_recall_hit() {
        let mut cache = MockReplyCache::new();
        cache
            .expect_lookup()
            .withf(|prompt: &str| prompt == "prompt")
            .returning(|_| Ok(Some("[]".to_string())));

        assert_eq!(
            recall(Some(&cache as &dyn ReplyCache), "ranking", "prompt").await,
            Some("[]".to_string())
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_stored_reply_is_returned_by_lookup() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let (cache, handle) = Cache::new(create_redis_client(&redis_url).unwrap());
        let replies = RedisReplyCache::new(cache, "test-model".to_string(), 60);

        let prompt = format!("cache test {}", uuid::Uuid::new_v4());
        assert_eq!(replies.lookup(&prompt).await.unwrap(), None);

        replies.store(&prompt, "[]");
        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        assert_eq!(replies.lookup(&prompt).await.unwrap(), Some("[]".to_string()));
    }
}
