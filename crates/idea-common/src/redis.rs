/// Redis-backed JSON document storage.
///
/// Unlike a cache, every failure here is surfaced to the caller: the store is
/// the system of record. The connection is opened explicitly with
/// [`RedisDocuments::connect`] and released with [`RedisDocuments::close`];
/// operations after `close` fail with [`CommonError::Closed`].
///
/// Documents live under plain string keys. An optional sorted-set index keeps
/// document ids ordered by a caller-chosen score (typically creation time).
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::CommonError;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
static LAST_INDEX_SCORE: AtomicI64 = AtomicI64::new(0);

/// Index scores carry this many sub-millisecond slots.
const SCORE_SLOTS_PER_MILLI: i64 = 1000;

pub struct RedisDocuments {
    conn: RwLock<Option<MultiplexedConnection>>,
}

impl RedisDocuments {
    /// Open a client for `url` and establish the shared multiplexed connection.
    pub async fn connect(url: &str) -> Result<Self, CommonError> {
        let client = redis::Client::open(url)?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(reply = %pong, "redis connected");
        Ok(Self {
            conn: RwLock::new(Some(conn)),
        })
    }

    /// Drop the connection. Safe to call more than once.
    pub async fn close(&self) {
        if self.conn.write().await.take().is_some() {
            info!("redis connection closed");
        }
    }

    async fn conn(&self) -> Result<MultiplexedConnection, CommonError> {
        self.conn.read().await.clone().ok_or(CommonError::Closed)
    }

    /// Get a raw document. `Ok(None)` when the key doesn't exist.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))?;
        Ok(value)
    }

    /// Get several raw documents in one round trip, preserving order.
    pub async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CommonError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn().await?;
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, count = keys.len(), "redis MGET failed"))?;
        Ok(values)
    }

    /// Write a document and its index entry in one MULTI/EXEC.
    pub async fn put_indexed(
        &self,
        key: &str,
        value: &str,
        index_key: &str,
        member: &str,
        score: i64,
    ) -> Result<(), CommonError> {
        let mut conn = self.conn().await?;
        let _: () = redis::pipe()
            .atomic()
            .set(key, value)
            .ignore()
            .zadd(index_key, member, score)
            .ignore()
            .query_async(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis MULTI SET/ZADD failed"))?;
        Ok(())
    }

    /// Delete a document and its index entry in one MULTI/EXEC.
    /// Returns `false` when the document did not exist.
    pub async fn remove_indexed(
        &self,
        key: &str,
        index_key: &str,
        member: &str,
    ) -> Result<bool, CommonError> {
        let mut conn = self.conn().await?;
        let (removed, _unindexed): (i64, i64) = redis::pipe()
            .atomic()
            .del(key)
            .zrem(index_key, member)
            .query_async(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis MULTI DEL/ZREM failed"))?;
        Ok(removed > 0)
    }

    /// All index members, highest score first.
    pub async fn index_desc(&self, index_key: &str) -> Result<Vec<String>, CommonError> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn
            .zrevrange(index_key, 0, -1)
            .await
            .inspect_err(|e| warn!(error = %e, index_key, "redis ZREVRANGE failed"))?;
        Ok(members)
    }
}

/// Generate a new opaque document id: 32 lowercase hex characters.
pub fn new_document_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(pid.to_le_bytes());
    h.update(counter.to_le_bytes());
    let digest = h.finalize();
    hex_lower(&digest[..16])
}

/// Sorted-set score for a document created at `millis` since the epoch.
///
/// Scores are `millis * 1000` bumped past the last score handed out, so
/// documents created in the same millisecond by this process still sort in
/// creation order. Values stay below 2^53 and survive Redis' f64 scores.
pub fn next_index_score(millis: i64) -> i64 {
    let floor = millis.saturating_mul(SCORE_SLOTS_PER_MILLI);
    let previous = LAST_INDEX_SCORE
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
            Some(floor.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    floor.max(previous + 1)
}

/// Whether `id` has the shape produced by [`new_document_id`].
pub fn is_document_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
