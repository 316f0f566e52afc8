use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    HealthReportExtraction, TaskOutcome, TaskPayload, TaskRecord, TaskStatus, TaskType,
    UserProfile, ViolationRecord,
};

mod postgres;
pub use postgres::PgTaskStore;

#[cfg(test)]
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt task row {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

/// Durable storage port for the task queue and the side-effect writes the
/// processors perform. Backed by Postgres in production; the only hard
/// requirement on the backend is conditional-update semantics for `claim_next`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a new pending task and returns it. No partial task is ever
    /// visible.
    async fn submit(
        &self,
        owner_user_id: &str,
        payload: TaskPayload,
    ) -> Result<TaskRecord, StoreError>;

    /// Claims the oldest pending task matching the filter by atomically moving
    /// it to `processing`. Returns `None` when nothing is pending or when a
    /// concurrent worker won the race (not an error, just poll again).
    async fn claim_next(&self, task_types: &[TaskType]) -> Result<Option<TaskRecord>, StoreError>;

    /// Terminal write for a claimed task. Guarded so that tasks already in a
    /// terminal state are never modified; a repeated call is a no-op.
    async fn finalize(&self, task_id: Uuid, outcome: TaskOutcome) -> Result<(), StoreError>;

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskRecord>, StoreError>;

    async fn list_by_owner(
        &self,
        owner_user_id: &str,
        status: Option<TaskStatus>,
        limit: i64,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    // Side-effect persistence used by the processors.

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn insert_health_document(
        &self,
        user_id: &str,
        image_url: &str,
        extraction: &HealthReportExtraction,
    ) -> Result<Uuid, StoreError>;

    /// Merges the latest report extraction into the owner's mutable health
    /// profile summary.
    async fn merge_report_extract(
        &self,
        user_id: &str,
        extraction: &HealthReportExtraction,
    ) -> Result<(), StoreError>;

    async fn insert_feed_comment(
        &self,
        user_id: &str,
        feed_id: &str,
        content: &str,
    ) -> Result<Uuid, StoreError>;

    async fn insert_library_comment(
        &self,
        user_id: &str,
        food_id: &str,
        content: &str,
        rating: Option<i16>,
    ) -> Result<Uuid, StoreError>;

    async fn record_violation(&self, record: ViolationRecord) -> Result<(), StoreError>;
}
