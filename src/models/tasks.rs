use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::nutrition::{FoodAnalysisResult, HealthReportExtraction};

/// Processor selector for a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    FoodImage,
    FoodText,
    HealthReport,
    CommentFeed,
    CommentPublicLibrary,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FoodImage => "food_image",
            TaskType::FoodText => "food_text",
            TaskType::HealthReport => "health_report",
            TaskType::CommentFeed => "comment_feed",
            TaskType::CommentPublicLibrary => "comment_public_library",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "food_image" => Ok(TaskType::FoodImage),
            "food_text" => Ok(TaskType::FoodText),
            "health_report" => Ok(TaskType::HealthReport),
            "comment_feed" => Ok(TaskType::CommentFeed),
            "comment_public_library" => Ok(TaskType::CommentPublicLibrary),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle: pending -> processing -> {done | failed | violated}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Violated,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Violated => "violated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Violated
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            "violated" => Ok(TaskStatus::Violated),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// Optional context the client may attach to an analysis request. Everything
/// here only influences prompt construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodImagePayload {
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub hints: AnalysisHints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodTextPayload {
    pub text_input: String,
    #[serde(default)]
    pub hints: AnalysisHints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReportPayload {
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPayload {
    pub target_id: String,
    pub content: String,
    /// 1-5, only used for public library comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i16>,
}

/// Task input, one variant per task type. Decoded from the JSONB payload column
/// at the store boundary so every processor sees a statically known shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum TaskPayload {
    FoodImage(FoodImagePayload),
    FoodText(FoodTextPayload),
    HealthReport(HealthReportPayload),
    CommentFeed(CommentPayload),
    CommentPublicLibrary(CommentPayload),
}

impl TaskPayload {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskPayload::FoodImage(_) => TaskType::FoodImage,
            TaskPayload::FoodText(_) => TaskType::FoodText,
            TaskPayload::HealthReport(_) => TaskType::HealthReport,
            TaskPayload::CommentFeed(_) => TaskType::CommentFeed,
            TaskPayload::CommentPublicLibrary(_) => TaskType::CommentPublicLibrary,
        }
    }
}

/// Structured output persisted when a task finishes as `done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    FoodAnalysis(FoodAnalysisResult),
    HealthReport {
        extracted_content: HealthReportExtraction,
    },
    Comment {
        comment_id: Uuid,
    },
}

/// Terminal write for a claimed task. Exactly one of result / error_message /
/// violation fields ends up set on the row.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Done(TaskResult),
    Failed(String),
    Violated { category: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: Uuid,
    pub owner_user_id: String,
    pub payload: TaskPayload,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub error_message: Option<String>,
    pub violation_reason: Option<String>,
    pub violation_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }
}

/// Which subsystem the offending content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    FoodAnalysis,
    Comment,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::FoodAnalysis => "food_analysis",
            ViolationKind::Comment => "comment",
        }
    }
}

/// Audit-trail entity written when moderation rejects a task. Never consulted
/// by task control flow.
#[derive(Debug, Clone)]
pub struct ViolationRecord {
    pub task_id: Uuid,
    pub user_id: String,
    pub violation_type: ViolationKind,
    pub category: String,
    pub reason: String,
    pub content_ref: Option<String>,
}

// ---- HTTP request/response models ----

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnalysisTaskRequest {
    #[validate(length(min = 1))]
    pub owner_user_id: String,
    pub task_type: TaskType,
    pub image_urls: Option<Vec<String>>,
    pub text_input: Option<String>,
    #[serde(default)]
    pub hints: AnalysisHints,
}

impl CreateAnalysisTaskRequest {
    /// Builds the typed payload, enforcing that exactly the inputs appropriate
    /// to the task type are present.
    pub fn into_payload(self) -> Result<TaskPayload, String> {
        match self.task_type {
            TaskType::FoodImage => {
                let image_urls = self.image_urls.unwrap_or_default();
                if image_urls.is_empty() {
                    return Err("food_image task requires at least one image URL".to_string());
                }
                if self
                    .text_input
                    .as_deref()
                    .is_some_and(|t| !t.trim().is_empty())
                {
                    return Err("food_image task must not carry text_input".to_string());
                }
                Ok(TaskPayload::FoodImage(FoodImagePayload {
                    image_urls,
                    hints: self.hints,
                }))
            }
            TaskType::FoodText => {
                let text_input = self.text_input.unwrap_or_default();
                if text_input.trim().is_empty() {
                    return Err("food_text task requires text_input".to_string());
                }
                if self.image_urls.as_ref().is_some_and(|u| !u.is_empty()) {
                    return Err("food_text task must not carry image URLs".to_string());
                }
                Ok(TaskPayload::FoodText(FoodTextPayload {
                    text_input,
                    hints: self.hints,
                }))
            }
            TaskType::HealthReport => {
                let mut image_urls = self.image_urls.unwrap_or_default();
                if image_urls.len() != 1 {
                    return Err("health_report task requires exactly one image URL".to_string());
                }
                Ok(TaskPayload::HealthReport(HealthReportPayload {
                    image_url: image_urls.remove(0),
                }))
            }
            TaskType::CommentFeed | TaskType::CommentPublicLibrary => {
                Err("comment tasks are submitted via the comment endpoint".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentTarget {
    Feed,
    PublicFoodLibrary,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentTaskRequest {
    #[validate(length(min = 1))]
    pub owner_user_id: String,
    pub comment_type: CommentTarget,
    #[validate(length(min = 1))]
    pub target_id: String,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i16>,
}

impl CreateCommentTaskRequest {
    pub fn into_payload(self) -> TaskPayload {
        let payload = CommentPayload {
            target_id: self.target_id,
            content: self.content,
            rating: self.rating,
        };
        match self.comment_type {
            CommentTarget::Feed => TaskPayload::CommentFeed(payload),
            CommentTarget::PublicFoodLibrary => TaskPayload::CommentPublicLibrary(payload),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitTaskResponse {
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRecord> for TaskStatusResponse {
    fn from(task: TaskRecord) -> Self {
        TaskStatusResponse {
            task_id: task.id,
            task_type: task.task_type(),
            status: task.status,
            result: task.result,
            error_message: task.error_message,
            violation_reason: task.violation_reason,
            violation_category: task.violation_category,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis_request(task_type: TaskType) -> CreateAnalysisTaskRequest {
        CreateAnalysisTaskRequest {
            owner_user_id: "user-1".to_string(),
            task_type,
            image_urls: None,
            text_input: None,
            hints: AnalysisHints::default(),
        }
    }

    #[test]
    fn food_image_requires_images() {
        let req = analysis_request(TaskType::FoodImage);
        assert!(req.into_payload().is_err());

        let mut req = analysis_request(TaskType::FoodImage);
        req.image_urls = Some(vec!["https://img.example/1.jpg".to_string()]);
        let payload = req.into_payload().unwrap();
        assert_eq!(payload.task_type(), TaskType::FoodImage);
    }

    #[test]
    fn food_text_rejects_images() {
        let mut req = analysis_request(TaskType::FoodText);
        req.text_input = Some("一碗白米饭".to_string());
        req.image_urls = Some(vec!["https://img.example/1.jpg".to_string()]);
        assert!(req.into_payload().is_err());
    }

    #[test]
    fn health_report_takes_exactly_one_image() {
        let mut req = analysis_request(TaskType::HealthReport);
        req.image_urls = Some(vec![
            "https://img.example/1.jpg".to_string(),
            "https://img.example/2.jpg".to_string(),
        ]);
        assert!(req.into_payload().is_err());
    }

    #[test]
    fn payload_round_trips_with_task_type_tag() {
        let payload = TaskPayload::FoodText(FoodTextPayload {
            text_input: "鸡胸肉沙拉".to_string(),
            hints: AnalysisHints::default(),
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["task_type"], "food_text");
        let back: TaskPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.task_type(), TaskType::FoodText);
    }
}
