use super::{keys, record_task_time};
use crate::gateway::ModelGateway;
use crate::models::ProjectInput;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use tracing::{info, instrument};

pub struct QuickScanTask {
    gateway: ModelGateway,
}

impl QuickScanTask {
    pub const ID: &'static str = "quick_scan";

    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Task for QuickScanTask {
    fn id(&self) -> &str {
        Self::ID
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting quick scan task");

        let input: ProjectInput = context
            .get(keys::PROJECT_INPUT)
            .await
            .ok_or_else(|| GraphError::ContextError("Project input not found".to_string()))?;

        let scan = self
            .gateway
            .run_quick_scan(&input)
            .await
            .map_err(|e| GraphError::Other(anyhow::anyhow!("Quick scan failed: {}", e)))?;

        info!("Quick scan produced {} characters", scan.len());
        context.set(keys::QUICK_SCAN, scan).await;
        record_task_time(&context, Self::ID, start_time).await;

        Ok(TaskResult::new(
            Some("Quick scan completed".to_string()),
            NextAction::Continue,
        ))
    }
}
