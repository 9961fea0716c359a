use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::warn;

/// Source of a user's unread chat count.
#[async_trait]
pub trait UnreadCounter: Send + Sync {
    async fn unread_count(&self, user_id: i64) -> Result<i64, sqlx::Error>;
}

pub struct MySqlUnreadCounter {
    pool: MySqlPool,
}

impl MySqlUnreadCounter {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnreadCounter for MySqlUnreadCounter {
    async fn unread_count(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM chat_messages WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }
}

/// Best-effort count: failures are logged and read as zero.
pub async fn unread_or_zero(counter: &dyn UnreadCounter, user_id: i64) -> i64 {
    match counter.unread_count(user_id).await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, user_id, "Failed to fetch unread message count");
            0
        }
    }
}
