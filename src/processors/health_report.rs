//! Health-report OCR processor. Persists the extraction as an immutable
//! document and merges it into the owner's mutable profile summary.
//!
//! This processor deliberately runs without the moderation gate: the report is
//! a user-private document and never reaches a public surface.

use crate::gateway::InferenceRequest;
use crate::models::{HealthReportExtraction, HealthReportPayload, TaskOutcome, TaskRecord, TaskResult};
use crate::processors::{prompts, ProcessError, ProcessorContext};
use crate::store::TaskStore;

pub async fn process(
    ctx: &ProcessorContext,
    task: &TaskRecord,
    payload: &HealthReportPayload,
) -> Result<TaskOutcome, ProcessError> {
    if payload.image_url.trim().is_empty() {
        return Err(ProcessError::Invalid("任务缺少 image_url".to_string()));
    }

    let raw = ctx
        .gateway
        .invoke(InferenceRequest {
            model: ctx.settings.vision_model.clone(),
            prompt: prompts::health_report_prompt(),
            image_urls: vec![payload.image_url.clone()],
            temperature: 0.3,
            timeout: ctx.settings.analysis_timeout,
        })
        .await?;

    let extracted: HealthReportExtraction = serde_json::from_value(raw)
        .map_err(|e| ProcessError::Invalid(format!("OCR 解析失败: {}", e)))?;

    ctx.store
        .insert_health_document(&task.owner_user_id, &payload.image_url, &extracted)
        .await?;
    ctx.store
        .merge_report_extract(&task.owner_user_id, &extracted)
        .await?;
    // The cached profile block now stales against the merged extraction.
    ctx.profiles.invalidate(&task.owner_user_id);

    Ok(TaskOutcome::Done(TaskResult::HealthReport {
        extracted_content: extracted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HealthCondition, TaskPayload, TaskStatus, TaskType, UserProfile};
    use crate::processors::testing::context;
    use crate::store::memory::MemoryTaskStore;
    use crate::store::TaskStore;
    use serde_json::json;
    use std::sync::Arc;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            nickname: String::new(),
            gender: None,
            height: None,
            weight: None,
            birthday: None,
            activity_level: None,
            health_condition: HealthCondition::default(),
            bmr: None,
            tdee: None,
        }
    }

    #[tokio::test]
    async fn extraction_is_persisted_and_merged_into_profile() {
        let store = Arc::new(MemoryTaskStore::new());
        store.put_user(profile("u1"));
        let task = store
            .submit(
                "u1",
                TaskPayload::HealthReport(HealthReportPayload {
                    image_url: "https://img.example/report.jpg".to_string(),
                }),
            )
            .await
            .unwrap();
        let claimed = store
            .claim_next(&[TaskType::HealthReport])
            .await
            .unwrap()
            .unwrap();

        let (ctx, gateway) = context(
            store.clone(),
            vec![Ok(json!({
                "indicators": [{ "name": "空腹血糖", "value": "5.2", "unit": "mmol/L" }],
                "conclusions": ["血糖正常"],
                "suggestions": ["保持当前饮食结构"],
                "medical_notes": ""
            }))],
        );
        ctx.process(claimed).await;

        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Done);
        match stored.result.unwrap() {
            TaskResult::HealthReport { extracted_content } => {
                assert_eq!(extracted_content.indicators.len(), 1);
                assert_eq!(extracted_content.indicators[0].name, "空腹血糖");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let documents = store.health_documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].user_id, "u1");
        drop(documents);

        let users = store.users.lock().unwrap();
        assert!(users["u1"].health_condition.report_extract.is_some());
        drop(users);

        // No moderation call for health reports: one gateway call total.
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_fails_the_task_without_side_effects() {
        let store = Arc::new(MemoryTaskStore::new());
        store.put_user(profile("u1"));
        let task = store
            .submit(
                "u1",
                TaskPayload::HealthReport(HealthReportPayload {
                    image_url: "https://img.example/report.jpg".to_string(),
                }),
            )
            .await
            .unwrap();
        let claimed = store
            .claim_next(&[TaskType::HealthReport])
            .await
            .unwrap()
            .unwrap();

        let (ctx, _gateway) = context(
            store.clone(),
            vec![Err(crate::gateway::GatewayError::EmptyResponse)],
        );
        ctx.process(claimed).await;

        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert!(store.health_documents.lock().unwrap().is_empty());
        assert!(store.users.lock().unwrap()["u1"]
            .health_condition
            .report_extract
            .is_none());
    }
}
