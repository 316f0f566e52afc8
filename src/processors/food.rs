//! Food analysis processors: image and free-text input, same result shape.

use serde::Deserialize;

use crate::gateway::InferenceRequest;
use crate::models::{
    FoodAnalysisResult, FoodImagePayload, FoodItem, FoodTextPayload, TaskOutcome, TaskRecord,
    TaskResult, ViolationKind, ViolationRecord,
};
use crate::moderation::{ModerationContent, ModerationVerdict};
use crate::processors::{prompts, ProcessError, ProcessorContext};
use crate::store::TaskStore;

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    items: Vec<FoodItem>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    insight: Option<String>,
    #[serde(default)]
    pfc_ratio_comment: Option<String>,
    #[serde(default)]
    absorption_notes: Option<String>,
    #[serde(default)]
    context_advice: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Normalizes the model's JSON into the typed result, tolerating missing
/// fields.
fn normalize_analysis(raw: serde_json::Value) -> Result<FoodAnalysisResult, ProcessError> {
    let parsed: RawAnalysis = serde_json::from_value(raw)
        .map_err(|e| ProcessError::Invalid(format!("AI 数据解析失败: {}", e)))?;

    let items = parsed
        .items
        .into_iter()
        .map(|mut item| {
            if item.original_weight_grams == 0.0 {
                item.original_weight_grams = item.estimated_weight_grams;
            }
            item
        })
        .collect();

    Ok(FoodAnalysisResult {
        description: parsed
            .description
            .unwrap_or_else(|| "无法获取描述".to_string()),
        insight: parsed.insight.unwrap_or_else(|| "保持健康饮食！".to_string()),
        items,
        pfc_ratio_comment: non_empty(parsed.pfc_ratio_comment),
        absorption_notes: non_empty(parsed.absorption_notes),
        context_advice: non_empty(parsed.context_advice),
    })
}

async fn record_violation(
    ctx: &ProcessorContext,
    task: &TaskRecord,
    category: &str,
    reason: &str,
    content_ref: Option<String>,
) -> Result<(), ProcessError> {
    ctx.store
        .record_violation(ViolationRecord {
            task_id: task.id,
            user_id: task.owner_user_id.clone(),
            violation_type: ViolationKind::FoodAnalysis,
            category: category.to_string(),
            reason: reason.to_string(),
            content_ref,
        })
        .await?;
    Ok(())
}

pub async fn process_image(
    ctx: &ProcessorContext,
    task: &TaskRecord,
    payload: &FoodImagePayload,
) -> Result<TaskOutcome, ProcessError> {
    if payload.image_urls.is_empty() {
        return Err(ProcessError::Invalid("任务缺少图片".to_string()));
    }

    if let ModerationVerdict::Violation { category, reason } = ctx
        .moderation
        .check(ModerationContent::Images(&payload.image_urls))
        .await
    {
        tracing::info!("task {} image content violated policy: {}", task.id, reason);
        record_violation(
            ctx,
            task,
            &category,
            &reason,
            payload.image_urls.first().cloned(),
        )
        .await?;
        return Ok(TaskOutcome::Violated { category, reason });
    }

    let profile_block = ctx.profile_block(&task.owner_user_id).await;
    let model = payload
        .hints
        .model_name
        .clone()
        .unwrap_or_else(|| ctx.settings.vision_model.clone());

    let raw = ctx
        .gateway
        .invoke(InferenceRequest {
            model,
            prompt: prompts::food_image_prompt(&payload.hints, &profile_block),
            image_urls: payload.image_urls.clone(),
            temperature: 0.7,
            timeout: ctx.settings.analysis_timeout,
        })
        .await?;

    let result = normalize_analysis(raw)?;
    Ok(TaskOutcome::Done(TaskResult::FoodAnalysis(result)))
}

pub async fn process_text(
    ctx: &ProcessorContext,
    task: &TaskRecord,
    payload: &FoodTextPayload,
) -> Result<TaskOutcome, ProcessError> {
    if payload.text_input.trim().is_empty() {
        return Err(ProcessError::Invalid("任务缺少 text_input".to_string()));
    }

    if let ModerationVerdict::Violation { category, reason } = ctx
        .moderation
        .check(ModerationContent::Text(&payload.text_input))
        .await
    {
        tracing::info!("task {} text content violated policy: {}", task.id, reason);
        record_violation(ctx, task, &category, &reason, Some(payload.text_input.clone())).await?;
        return Ok(TaskOutcome::Violated { category, reason });
    }

    let profile_block = ctx.profile_block(&task.owner_user_id).await;
    let model = payload
        .hints
        .model_name
        .clone()
        .unwrap_or_else(|| ctx.settings.text_model.clone());

    let raw = ctx
        .gateway
        .invoke(InferenceRequest {
            model,
            prompt: prompts::food_text_prompt(&payload.text_input, &payload.hints, &profile_block),
            image_urls: vec![],
            temperature: 0.7,
            timeout: ctx.settings.analysis_timeout,
        })
        .await?;

    let result = normalize_analysis(raw)?;
    Ok(TaskOutcome::Done(TaskResult::FoodAnalysis(result)))
}
