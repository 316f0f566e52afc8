//! Task processors: one per task type, sharing the moderate-then-analyze
//! pipeline. A processor owns a claimed task end to end, including the
//! terminal write; nothing here ever leaves a task stuck in `processing`.

mod comment;
mod food;
mod health_report;
pub mod profile;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::gateway::{GatewayError, InferenceGateway};
use crate::models::{TaskOutcome, TaskPayload, TaskRecord};
use crate::moderation::ModerationGate;
use crate::store::{StoreError, TaskStore};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Invalid(String),
}

/// Model selection and call bounds for the analysis calls (moderation has its
/// own tighter timeout inside the gate).
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub vision_model: String,
    pub text_model: String,
    pub analysis_timeout: Duration,
}

/// Shared dependencies handed to every worker.
pub struct ProcessorContext {
    pub store: Arc<dyn TaskStore>,
    pub gateway: Arc<dyn InferenceGateway>,
    pub moderation: ModerationGate,
    pub profiles: TtlCache<String>,
    pub settings: InferenceSettings,
}

impl ProcessorContext {
    /// Runs the processor for the claimed task and finalizes it. All failures
    /// become a `failed` terminal state; this function never propagates an
    /// error into the worker loop.
    pub async fn process(&self, task: TaskRecord) {
        let task_id = task.id;
        let outcome = match self.run(&task).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("task {} failed: {}", task_id, err);
                TaskOutcome::Failed(err.to_string())
            }
        };
        if let Err(err) = self.store.finalize(task_id, outcome).await {
            tracing::error!("failed to finalize task {}: {}", task_id, err);
        }
    }

    async fn run(&self, task: &TaskRecord) -> Result<TaskOutcome, ProcessError> {
        match &task.payload {
            TaskPayload::FoodImage(payload) => food::process_image(self, task, payload).await,
            TaskPayload::FoodText(payload) => food::process_text(self, task, payload).await,
            TaskPayload::HealthReport(payload) => health_report::process(self, task, payload).await,
            TaskPayload::CommentFeed(payload) => {
                comment::process(self, task, payload, comment::CommentKind::Feed).await
            }
            TaskPayload::CommentPublicLibrary(payload) => {
                comment::process(self, task, payload, comment::CommentKind::PublicLibrary).await
            }
        }
    }

    /// Resolves the owner's health-profile summary, caching the formatted
    /// block. Profile context is best-effort: lookup failures degrade to an
    /// empty block instead of failing the task.
    pub(crate) async fn profile_block(&self, user_id: &str) -> String {
        if let Some(cached) = self.profiles.get(user_id) {
            return cached;
        }
        let block = match self.store.get_user(user_id).await {
            Ok(Some(user)) => profile::health_profile_summary(&user),
            Ok(None) => String::new(),
            Err(err) => {
                tracing::warn!("profile lookup for {} failed: {}", user_id, err);
                String::new()
            }
        };
        self.profiles.insert(user_id, block.clone());
        block
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use crate::store::memory::MemoryTaskStore;
    use serde_json::Value;

    /// Context wired to an in-memory store and a scripted gateway.
    pub fn context(
        store: Arc<MemoryTaskStore>,
        responses: Vec<Result<Value, GatewayError>>,
    ) -> (ProcessorContext, Arc<ScriptedGateway>) {
        let gateway = Arc::new(ScriptedGateway::new(responses));
        let ctx = ProcessorContext {
            store,
            gateway: gateway.clone(),
            moderation: ModerationGate::new(
                gateway.clone(),
                "qwen-vl-max",
                "qwen-plus",
                Duration::from_secs(30),
            ),
            profiles: TtlCache::new(Duration::from_secs(300)),
            settings: InferenceSettings {
                vision_model: "qwen-vl-max".to_string(),
                text_model: "qwen-plus".to_string(),
                analysis_timeout: Duration::from_secs(60),
            },
        };
        (ctx, gateway)
    }
}
