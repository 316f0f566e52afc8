//! In-memory `TaskStore` used by the worker and processor tests. Preserves the
//! claim semantics of the Postgres implementation: a task leaves `pending`
//! exactly once, and finalize never touches a terminal row.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    HealthReportExtraction, TaskOutcome, TaskPayload, TaskRecord, TaskStatus, TaskType,
    UserProfile, ViolationRecord,
};
use crate::store::{StoreError, TaskStore};

#[derive(Debug, Clone)]
pub struct StoredComment {
    pub id: Uuid,
    pub user_id: String,
    pub target_id: String,
    pub content: String,
    pub rating: Option<i16>,
}

#[derive(Debug, Clone)]
pub struct StoredHealthDocument {
    pub id: Uuid,
    pub user_id: String,
    pub image_url: String,
    pub extraction: HealthReportExtraction,
}

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<TaskRecord>>,
    pub users: Mutex<HashMap<String, UserProfile>>,
    pub violations: Mutex<Vec<ViolationRecord>>,
    pub feed_comments: Mutex<Vec<StoredComment>>,
    pub library_comments: Mutex<Vec<StoredComment>>,
    pub health_documents: Mutex<Vec<StoredHealthDocument>>,
}

impl MemoryTaskStore {
    pub fn new() -> MemoryTaskStore {
        MemoryTaskStore::default()
    }

    pub fn put_user(&self, profile: UserProfile) {
        self.users.lock().unwrap().insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn submit(
        &self,
        owner_user_id: &str,
        payload: TaskPayload,
    ) -> Result<TaskRecord, StoreError> {
        let now = Utc::now();
        let task = TaskRecord {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.to_string(),
            payload,
            status: TaskStatus::Pending,
            result: None,
            error_message: None,
            violation_reason: None,
            violation_category: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }

    async fn claim_next(&self, task_types: &[TaskType]) -> Result<Option<TaskRecord>, StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        // Insertion order is creation order, so the first pending match is the
        // oldest one.
        let claimed = tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Pending)
            .find(|t| task_types.contains(&t.task_type()));

        Ok(claimed.map(|task| {
            task.status = TaskStatus::Processing;
            task.updated_at = Utc::now();
            task.clone()
        }))
    }

    async fn finalize(&self, task_id: Uuid, outcome: TaskOutcome) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
            return Ok(());
        };
        if task.status != TaskStatus::Processing {
            return Ok(());
        }
        match outcome {
            TaskOutcome::Done(result) => {
                task.status = TaskStatus::Done;
                task.result = Some(result);
            }
            TaskOutcome::Failed(message) => {
                task.status = TaskStatus::Failed;
                task.error_message = Some(message);
            }
            TaskOutcome::Violated { category, reason } => {
                task.status = TaskStatus::Violated;
                task.violation_category = Some(category);
                task.violation_reason = Some(reason);
            }
        }
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == task_id)
            .cloned())
    }

    async fn list_by_owner(
        &self,
        owner_user_id: &str,
        status: Option<TaskStatus>,
        limit: i64,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .iter()
            .rev()
            .filter(|t| t.owner_user_id == owner_user_id)
            .filter(|t| status.is_none_or(|s| t.status == s))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn insert_health_document(
        &self,
        user_id: &str,
        image_url: &str,
        extraction: &HealthReportExtraction,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.health_documents.lock().unwrap().push(StoredHealthDocument {
            id,
            user_id: user_id.to_string(),
            image_url: image_url.to_string(),
            extraction: extraction.clone(),
        });
        Ok(id)
    }

    async fn merge_report_extract(
        &self,
        user_id: &str,
        extraction: &HealthReportExtraction,
    ) -> Result<(), StoreError> {
        if let Some(profile) = self.users.lock().unwrap().get_mut(user_id) {
            profile.health_condition.report_extract =
                Some(serde_json::to_value(extraction).unwrap_or_default());
        }
        Ok(())
    }

    async fn insert_feed_comment(
        &self,
        user_id: &str,
        feed_id: &str,
        content: &str,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.feed_comments.lock().unwrap().push(StoredComment {
            id,
            user_id: user_id.to_string(),
            target_id: feed_id.to_string(),
            content: content.to_string(),
            rating: None,
        });
        Ok(id)
    }

    async fn insert_library_comment(
        &self,
        user_id: &str,
        food_id: &str,
        content: &str,
        rating: Option<i16>,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.library_comments.lock().unwrap().push(StoredComment {
            id,
            user_id: user_id.to_string(),
            target_id: food_id.to_string(),
            content: content.to_string(),
            rating,
        });
        Ok(id)
    }

    async fn record_violation(&self, record: ViolationRecord) -> Result<(), StoreError> {
        self.violations.lock().unwrap().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodImagePayload, FoodAnalysisResult, TaskResult};
    use std::sync::Arc;

    fn food_image_payload(url: &str) -> TaskPayload {
        TaskPayload::FoodImage(FoodImagePayload {
            image_urls: vec![url.to_string()],
            hints: Default::default(),
        })
    }

    fn empty_result() -> TaskResult {
        TaskResult::FoodAnalysis(FoodAnalysisResult {
            description: "一碗白米饭".to_string(),
            insight: "注意适量".to_string(),
            items: vec![],
            pfc_ratio_comment: None,
            absorption_notes: None,
            context_advice: None,
        })
    }

    #[tokio::test]
    async fn claims_are_fifo_by_creation_time() {
        let store = MemoryTaskStore::new();
        let first = store
            .submit("u1", food_image_payload("https://img.example/1.jpg"))
            .await
            .unwrap();
        let _second = store
            .submit("u1", food_image_payload("https://img.example/2.jpg"))
            .await
            .unwrap();

        let claimed = store
            .claim_next(&[TaskType::FoodImage])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn claim_filter_skips_other_task_types() {
        let store = MemoryTaskStore::new();
        store
            .submit("u1", food_image_payload("https://img.example/1.jpg"))
            .await
            .unwrap();

        let claimed = store.claim_next(&[TaskType::FoodText]).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn concurrent_claims_yield_exactly_one_winner() {
        // Two workers race for a single pending task.
        let store = Arc::new(MemoryTaskStore::new());
        let task = store
            .submit("u1", food_image_payload("https://img.example/1.jpg"))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            {
                let store = store.clone();
                async move { store.claim_next(&[TaskType::FoodImage]).await.unwrap() }
            },
            {
                let store = store.clone();
                async move { store.claim_next(&[TaskType::FoodImage]).await.unwrap() }
            }
        );

        let winners = [&a, &b].iter().filter(|c| c.is_some()).count();
        assert_eq!(winners, 1);
        let winner = a.or(b).unwrap();
        assert_eq!(winner.id, task.id);
    }

    #[tokio::test]
    async fn terminal_states_are_immutable() {
        let store = MemoryTaskStore::new();
        let task = store
            .submit("u1", food_image_payload("https://img.example/1.jpg"))
            .await
            .unwrap();
        store.claim_next(&[TaskType::FoodImage]).await.unwrap();

        store
            .finalize(task.id, TaskOutcome::Done(empty_result()))
            .await
            .unwrap();
        store
            .finalize(task.id, TaskOutcome::Failed("late failure".to_string()))
            .await
            .unwrap();

        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Done);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn finalize_is_idempotent() {
        let store = MemoryTaskStore::new();
        let task = store
            .submit("u1", food_image_payload("https://img.example/1.jpg"))
            .await
            .unwrap();
        store.claim_next(&[TaskType::FoodImage]).await.unwrap();

        store
            .finalize(task.id, TaskOutcome::Done(empty_result()))
            .await
            .unwrap();
        let first = store.get(task.id).await.unwrap().unwrap();
        store
            .finalize(task.id, TaskOutcome::Done(empty_result()))
            .await
            .unwrap();
        let second = store.get(task.id).await.unwrap().unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn unclaimed_tasks_cannot_be_finalized() {
        let store = MemoryTaskStore::new();
        let task = store
            .submit("u1", food_image_payload("https://img.example/1.jpg"))
            .await
            .unwrap();

        store
            .finalize(task.id, TaskOutcome::Failed("spurious".to_string()))
            .await
            .unwrap();
        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn list_by_owner_filters_status() {
        let store = MemoryTaskStore::new();
        let task = store
            .submit("u1", food_image_payload("https://img.example/1.jpg"))
            .await
            .unwrap();
        store
            .submit("u2", food_image_payload("https://img.example/2.jpg"))
            .await
            .unwrap();

        let all = store.list_by_owner("u1", None, 50).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, task.id);

        let done = store
            .list_by_owner("u1", Some(TaskStatus::Done), 50)
            .await
            .unwrap();
        assert!(done.is_empty());
    }
}
