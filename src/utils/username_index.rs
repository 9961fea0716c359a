use std::{sync::RwLock, time::Duration};

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;

use crate::store::users::{StoreError, UserStore};

/// Expected capacity and false-positive rate.
/// A detail shop has tens of accounts; these leave plenty of headroom.
const FILTER_CAPACITY: usize = 10_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Fast duplicate-username screening in front of the users table.
///
/// The cuckoo filter answers "definitely new" without a query, the cache
/// answers "definitely taken" for names seen recently, and everything else
/// falls through to the store. The unique key on `users.userName` stays the
/// final word.
pub struct UsernameIndex {
    filter: RwLock<CuckooFilter<String>>,
    taken: Cache<String, ()>,
}

impl Default for UsernameIndex {
    fn default() -> Self {
        Self::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)
    }
}

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

impl UsernameIndex {
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(capacity, false_positive_rate)),
            taken: Cache::builder()
                .max_capacity(capacity as u64)
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }

    /// False positives possible; a poisoned lock answers "maybe".
    pub fn might_exist(&self, username: &str) -> bool {
        let username = normalize(username);
        self.filter
            .read()
            .map(|filter| filter.contains(&username))
            .unwrap_or(true)
    }

    pub async fn mark_taken(&self, username: &str) {
        let username = normalize(username);
        if let Ok(mut filter) = self.filter.write() {
            filter.add(&username);
        }
        self.taken.insert(username, ()).await;
    }

    /// true => username AVAILABLE
    pub async fn is_available(&self, username: &str, store: &dyn UserStore) -> Result<bool, StoreError> {
        if !self.might_exist(username) {
            return Ok(true);
        }

        let normalized = normalize(username);
        if self.taken.contains_key(&normalized) {
            return Ok(false);
        }

        let exists = store.username_exists(username).await?;
        if exists {
            self.taken.insert(normalized, ()).await;
        }
        Ok(!exists)
    }

    /// Loads every existing username into the filter, in batches.
    pub async fn warmup(&self, pool: &MySqlPool, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>("SELECT userName FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (username,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
            batch.push(normalize(&username));
            total += 1;

            if batch.len() == batch_size {
                self.insert_batch(&batch)?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.insert_batch(&batch)?;
        }

        log::info!("Username filter warmup complete: {} users", total);
        Ok(())
    }

    fn insert_batch(&self, usernames: &[String]) -> Result<()> {
        let mut filter = self
            .filter
            .write()
            .map_err(|_| anyhow!("username filter lock poisoned"))?;

        for username in usernames {
            filter.add(username);
        }
        Ok(())
    }
}
