use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{
    HealthCondition, HealthReportExtraction, TaskOutcome, TaskPayload, TaskRecord, TaskResult,
    TaskStatus, TaskType, UserProfile, ViolationRecord,
};
use crate::store::{StoreError, TaskStore};

const TASK_COLUMNS: &str = "id, owner_user_id, payload, status, result, error_message, \
                            violation_reason, violation_category, created_at, updated_at";

pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> PgTaskStore {
        PgTaskStore { pool }
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    owner_user_id: String,
    payload: serde_json::Value,
    status: String,
    result: Option<serde_json::Value>,
    error_message: Option<String>,
    violation_reason: Option<String>,
    violation_category: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    /// JSONB columns are decoded into the typed payload/result enums here, at
    /// the store boundary.
    fn into_record(self) -> Result<TaskRecord, StoreError> {
        let id = self.id;
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };

        let payload: TaskPayload =
            serde_json::from_value(self.payload).map_err(|e| corrupt(e.to_string()))?;
        let status: TaskStatus = self.status.parse().map_err(corrupt)?;
        let result: Option<TaskResult> = match self.result {
            Some(value) => {
                Some(serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?)
            }
            None => None,
        };

        Ok(TaskRecord {
            id,
            owner_user_id: self.owner_user_id,
            payload,
            status,
            result,
            error_message: self.error_message,
            violation_reason: self.violation_reason,
            violation_category: self.violation_category,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    nickname: String,
    gender: Option<String>,
    height: Option<f64>,
    weight: Option<f64>,
    birthday: Option<chrono::NaiveDate>,
    activity_level: Option<String>,
    health_condition: serde_json::Value,
    bmr: Option<f64>,
    tdee: Option<f64>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> UserProfile {
        // A user row with unexpected health_condition contents should not take
        // analysis down with it; fall back to an empty profile section.
        let health_condition: HealthCondition =
            serde_json::from_value(row.health_condition).unwrap_or_default();
        UserProfile {
            id: row.id,
            nickname: row.nickname,
            gender: row.gender,
            height: row.height,
            weight: row.weight,
            birthday: row.birthday,
            activity_level: row.activity_level,
            health_condition,
            bmr: row.bmr,
            tdee: row.tdee,
        }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn submit(
        &self,
        owner_user_id: &str,
        payload: TaskPayload,
    ) -> Result<TaskRecord, StoreError> {
        let task_type = payload.task_type();
        let payload_json = serde_json::to_value(&payload).map_err(|e| StoreError::Corrupt {
            id: Uuid::nil(),
            reason: e.to_string(),
        })?;

        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO tasks (id, task_type, owner_user_id, payload, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', now(), now())
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(task_type.as_str())
        .bind(owner_user_id)
        .bind(payload_json)
        .fetch_one(&self.pool)
        .await?;

        row.into_record()
    }

    async fn claim_next(&self, task_types: &[TaskType]) -> Result<Option<TaskRecord>, StoreError> {
        let filter: Vec<String> = task_types.iter().map(|t| t.as_str().to_string()).collect();

        // Select-then-conditional-update. The UPDATE re-checks `pending`, so a
        // candidate stolen by a concurrent worker simply yields None.
        let candidate = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM tasks
            WHERE status = 'pending' AND task_type = ANY($1)
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(&filter)
        .fetch_optional(&self.pool)
        .await?;

        let Some(task_id) = candidate else {
            return Ok(None);
        };

        let claimed = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks
            SET status = 'processing', updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        claimed.map(TaskRow::into_record).transpose()
    }

    async fn finalize(&self, task_id: Uuid, outcome: TaskOutcome) -> Result<(), StoreError> {
        let (status, result, error_message, violation_reason, violation_category) = match outcome {
            TaskOutcome::Done(result) => {
                let value = serde_json::to_value(&result).map_err(|e| StoreError::Corrupt {
                    id: task_id,
                    reason: e.to_string(),
                })?;
                (TaskStatus::Done, Some(value), None, None, None)
            }
            TaskOutcome::Failed(message) => (TaskStatus::Failed, None, Some(message), None, None),
            TaskOutcome::Violated { category, reason } => {
                (TaskStatus::Violated, None, None, Some(reason), Some(category))
            }
        };

        // The status guard makes terminal states immutable and a duplicate
        // finalize a harmless no-op.
        let updated = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, result = $3, error_message = $4,
                violation_reason = $5, violation_category = $6, updated_at = now()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(task_id)
        .bind(status.as_str())
        .bind(result)
        .bind(error_message)
        .bind(violation_reason)
        .bind(violation_category)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::debug!("finalize on task {} skipped (not processing)", task_id);
        }
        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TaskRow::into_record).transpose()
    }

    async fn list_by_owner(
        &self,
        owner_user_id: &str,
        status: Option<TaskStatus>,
        limit: i64,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE owner_user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(owner_user_id)
        .bind(status.map(|s| s.as_str().to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRow::into_record).collect()
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, nickname, gender, height, weight, birthday, activity_level,
                   health_condition, bmr, tdee
            FROM app_users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserProfile::from))
    }

    async fn insert_health_document(
        &self,
        user_id: &str,
        image_url: &str,
        extraction: &HealthReportExtraction,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO user_health_documents (id, user_id, document_type, image_url, extracted_content)
            VALUES ($1, $2, 'report', $3, $4)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(image_url)
        .bind(serde_json::to_value(extraction).unwrap_or_default())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn merge_report_extract(
        &self,
        user_id: &str,
        extraction: &HealthReportExtraction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE app_users
            SET health_condition = jsonb_set(health_condition, '{report_extract}', $2, true),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(serde_json::to_value(extraction).unwrap_or_default())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_feed_comment(
        &self,
        user_id: &str,
        feed_id: &str,
        content: &str,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO feed_comments (id, user_id, feed_id, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(user_id)
        .bind(feed_id)
        .bind(content)
        .execute(&self.pool)
        .await?;
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
        sqlx::query(
            r#"
            INSERT INTO food_library_comments (id, user_id, food_id, content, rating)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(food_id)
        .bind(content)
        .bind(rating)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn record_violation(&self, record: ViolationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO violation_records (id, task_id, user_id, violation_type, category, reason, content_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.task_id)
        .bind(record.user_id)
        .bind(record.violation_type.as_str())
        .bind(record.category)
        .bind(record.reason)
        .bind(record.content_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
