use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::{
    CreateAnalysisTaskRequest, CreateCommentTaskRequest, SubmitTaskResponse, TaskStatus,
    TaskStatusResponse,
};
use crate::store::TaskStore;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analysis", post(submit_analysis_task))
        .route("/comment", post(submit_comment_task))
        .route("/", get(list_tasks))
        .route("/:task_id", get(get_task))
}

/// Submit an analysis task (food image, food text or health report). Returns
/// immediately with the pending task; the caller polls for the result.
async fn submit_analysis_task(
    State(state): State<AppState>,
    Json(request): Json<CreateAnalysisTaskRequest>,
) -> Result<Json<SubmitTaskResponse>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let owner = request.owner_user_id.clone();
    let payload = request.into_payload().map_err(AppError::BadRequest)?;

    let task = state.store.submit(&owner, payload).await?;
    tracing::info!("submitted {} task {}", task.task_type(), task.id);

    Ok(Json(SubmitTaskResponse {
        task_id: task.id,
        task_type: task.task_type(),
        status: task.status,
        created_at: task.created_at,
    }))
}

/// Submit a comment for moderation. The comment becomes visible only after a
/// worker approves and inserts it.
async fn submit_comment_task(
    State(state): State<AppState>,
    Json(request): Json<CreateCommentTaskRequest>,
) -> Result<Json<SubmitTaskResponse>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let owner = request.owner_user_id.clone();
    let task = state.store.submit(&owner, request.into_payload()).await?;
    tracing::info!("submitted {} task {}", task.task_type(), task.id);

    Ok(Json(SubmitTaskResponse {
        task_id: task.id,
        task_type: task.task_type(),
        status: task.status,
        created_at: task.created_at,
    }))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskStatusResponse>, AppError> {
    let task = state
        .store
        .get(task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;

    Ok(Json(TaskStatusResponse::from(task)))
}

#[derive(Debug, Deserialize)]
struct ListTasksQuery {
    user_id: String,
    status: Option<String>,
    limit: Option<i64>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskStatusResponse>>, AppError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            raw.parse::<TaskStatus>()
                .map_err(|_| AppError::BadRequest(format!("Unknown status '{}'", raw)))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let tasks = state
        .store
        .list_by_owner(&query.user_id, status, limit)
        .await?;

    Ok(Json(tasks.into_iter().map(TaskStatusResponse::from).collect()))
}
