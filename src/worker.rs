//! Worker pool: N polling loops per task group, spawned once at boot and
//! running for the lifetime of the service. A worker's only shared state is
//! the task store; claims are serialized by the store's conditional update.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::WorkerCounts;
use crate::models::TaskType;
use crate::processors::ProcessorContext;
use crate::store::TaskStore;

/// Task-type grouping for worker loops. Comment workers drain both comment
/// queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerGroup {
    FoodImage,
    FoodText,
    HealthReport,
    Comment,
}

impl WorkerGroup {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerGroup::FoodImage => "food-image",
            WorkerGroup::FoodText => "food-text",
            WorkerGroup::HealthReport => "health-report",
            WorkerGroup::Comment => "comment",
        }
    }

    pub fn task_types(&self) -> &'static [TaskType] {
        match self {
            WorkerGroup::FoodImage => &[TaskType::FoodImage],
            WorkerGroup::FoodText => &[TaskType::FoodText],
            WorkerGroup::HealthReport => &[TaskType::HealthReport],
            WorkerGroup::Comment => &[TaskType::CommentFeed, TaskType::CommentPublicLibrary],
        }
    }
}

/// Spawns the configured number of workers per group.
pub fn spawn_workers(
    ctx: Arc<ProcessorContext>,
    counts: WorkerCounts,
    poll_interval: Duration,
) -> Vec<JoinHandle<()>> {
    let plan = [
        (WorkerGroup::FoodImage, counts.food_image),
        (WorkerGroup::FoodText, counts.food_text),
        (WorkerGroup::HealthReport, counts.health_report),
        (WorkerGroup::Comment, counts.comment),
    ];

    let mut handles = Vec::new();
    for (group, count) in plan {
        for worker_id in 0..count {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                run_worker(ctx, group, worker_id, poll_interval).await;
            }));
        }
    }
    handles
}

/// Single worker loop. Claims and processes tasks until the process exits;
/// a task failure fails that task only, and a store error during polling is
/// logged and retried after a sleep. The loop itself never terminates.
pub async fn run_worker(
    ctx: Arc<ProcessorContext>,
    group: WorkerGroup,
    worker_id: usize,
    poll_interval: Duration,
) {
    tracing::info!("[{}-worker-{}] started", group.name(), worker_id);
    loop {
        match ctx.store.claim_next(group.task_types()).await {
            Ok(Some(task)) => {
                tracing::info!(
                    "[{}-worker-{}] processing task {}",
                    group.name(),
                    worker_id,
                    task.id
                );
                ctx.process(task).await;
                // Drain the backlog before sleeping again.
            }
            Ok(None) => {
                tokio::time::sleep(poll_interval).await;
            }
            Err(err) => {
                tracing::error!("[{}-worker-{}] poll error: {}", group.name(), worker_id, err);
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
