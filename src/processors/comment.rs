//! Comment moderation-and-post processor. The task is the write-ahead step
//! for the comment: the row is inserted only after moderation passes, so a
//! failed or violated task can never leave a visible comment behind.

use crate::models::{CommentPayload, TaskOutcome, TaskRecord, TaskResult, ViolationKind, ViolationRecord};
use crate::moderation::{ModerationContent, ModerationVerdict};
use crate::processors::{ProcessError, ProcessorContext};
use crate::store::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Feed,
    PublicLibrary,
}

pub async fn process(
    ctx: &ProcessorContext,
    task: &TaskRecord,
    payload: &CommentPayload,
    kind: CommentKind,
) -> Result<TaskOutcome, ProcessError> {
    if payload.content.trim().is_empty() {
        return Err(ProcessError::Invalid("评论内容为空".to_string()));
    }

    if let ModerationVerdict::Violation { category, reason } = ctx
        .moderation
        .check(ModerationContent::Comment(&payload.content))
        .await
    {
        tracing::info!("task {} comment violated policy: {}", task.id, reason);
        ctx.store
            .record_violation(ViolationRecord {
                task_id: task.id,
                user_id: task.owner_user_id.clone(),
                violation_type: ViolationKind::Comment,
                category: category.clone(),
                reason: reason.clone(),
                content_ref: Some(payload.content.clone()),
            })
            .await?;
        return Ok(TaskOutcome::Violated { category, reason });
    }

    let comment_id = match kind {
        CommentKind::Feed => {
            ctx.store
                .insert_feed_comment(&task.owner_user_id, &payload.target_id, &payload.content)
                .await?
        }
        CommentKind::PublicLibrary => {
            ctx.store
                .insert_library_comment(
                    &task.owner_user_id,
                    &payload.target_id,
                    &payload.content,
                    payload.rating,
                )
                .await?
        }
    };

    Ok(TaskOutcome::Done(TaskResult::Comment { comment_id }))
}
