/// Persistence for idea records.
///
/// Key schema (namespaced to avoid collisions):
/// - `idea:v1:record:{id}` — JSON-serialized IdeaRecord
/// - `idea:v1:index` — sorted set of ids scored by creation time (millis
///   times 1000, plus a per-process tie-breaker)
///
/// Records are written once, together with their evaluation, and never
/// updated.
use async_trait::async_trait;
use chrono::Utc;
use idea_common::error::CommonError;
use idea_common::redis::{RedisDocuments, is_document_id, new_document_id, next_index_score};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::model::{IdeaEvaluation, IdeaRecord, IdeaSummary};

const KEY_PREFIX: &str = "idea:v1:";

#[async_trait]
pub trait IdeaStore: Send + Sync {
    /// Persist a new record. Only called with a validated evaluation.
    async fn create(
        &self,
        prompt_text: &str,
        evaluation: &IdeaEvaluation,
    ) -> Result<IdeaRecord, StoreError>;

    /// Newest first, optionally filtered by a case-insensitive substring of
    /// the prompt text.
    async fn list(&self, search: Option<&str>) -> Result<Vec<IdeaSummary>, StoreError>;

    async fn get(&self, id: &str) -> Result<IdeaRecord, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub struct RedisIdeaStore {
    docs: RedisDocuments,
}

impl RedisIdeaStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let docs = RedisDocuments::connect(url).await?;
        Ok(Self { docs })
    }

    pub async fn close(&self) {
        self.docs.close().await;
    }
}

#[async_trait]
impl IdeaStore for RedisIdeaStore {
    async fn create(
        &self,
        prompt_text: &str,
        evaluation: &IdeaEvaluation,
    ) -> Result<IdeaRecord, StoreError> {
        let record = IdeaRecord {
            id: new_document_id(),
            prompt_text: prompt_text.to_string(),
            evaluation: Some(evaluation.clone()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).map_err(CommonError::from)?;
        self.docs
            .put_indexed(
                &record_key(&record.id),
                &json,
                &index_key(),
                &record.id,
                next_index_score(record.created_at.timestamp_millis()),
            )
            .await?;
        info!(id = %record.id, "idea stored");
        Ok(record)
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<IdeaSummary>, StoreError> {
        let ids = self.docs.index_desc(&index_key()).await?;
        let keys: Vec<String> = ids.iter().map(|id| record_key(id)).collect();
        let docs = self.docs.get_many(&keys).await?;

        let summaries = ids
            .iter()
            .zip(docs)
            .filter_map(|(id, doc)| {
                // Missing documents were deleted between ZREVRANGE and MGET.
                let json = doc?;
                serde_json::from_str::<IdeaRecord>(&json)
                    .inspect_err(|e| warn!(error = %e, id = %id, "skipping unreadable idea record"))
                    .ok()
            })
            .filter(|record| matches_search(&record.prompt_text, search))
            .map(|record| IdeaSummary::from(&record))
            .collect();
        Ok(summaries)
    }

    async fn get(&self, id: &str) -> Result<IdeaRecord, StoreError> {
        let id = checked_id(id)?;
        let json = self
            .docs
            .get(&record_key(id))
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let record = serde_json::from_str(&json).map_err(CommonError::from)?;
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = checked_id(id)?;
        if !self.docs.remove_indexed(&record_key(id), &index_key(), id).await? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!(id, "idea deleted");
        Ok(())
    }
}

/// Reject ids that [`new_document_id`] could never have produced, before any
/// lookup.
pub fn checked_id(id: &str) -> Result<&str, StoreError> {
    if is_document_id(id) {
        Ok(id)
    } else {
        Err(StoreError::NotFound(id.to_string()))
    }
}

fn record_key(id: &str) -> String {
    format!("{KEY_PREFIX}record:{id}")
}

fn index_key() -> String {
    format!("{KEY_PREFIX}index")
}

/// Case-insensitive substring match; a blank query matches everything.
pub fn matches_search(prompt_text: &str, search: Option<&str>) -> bool {
    match search.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => prompt_text.to_lowercase().contains(&q.to_lowercase()),
        None => true,
    }
}
