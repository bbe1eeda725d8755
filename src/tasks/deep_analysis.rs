use super::{keys, record_task_time};
use crate::gateway::ModelGateway;
use crate::models::{MarketResearchResult, ProjectInput};
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use tracing::{info, instrument};

pub struct DeepAnalysisTask {
    gateway: ModelGateway,
}

impl DeepAnalysisTask {
    pub const ID: &'static str = "deep_analysis";

    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Task for DeepAnalysisTask {
    fn id(&self) -> &str {
        Self::ID
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting deep analysis task");

        let input: ProjectInput = context
            .get(keys::PROJECT_INPUT)
            .await
            .ok_or_else(|| GraphError::ContextError("Project input not found".to_string()))?;

        // The report is grounded on the research stage; it cannot run without it.
        let market: MarketResearchResult = context
            .get(keys::MARKET_RESEARCH)
            .await
            .ok_or_else(|| GraphError::ContextError("Market research not found".to_string()))?;

        let report = self
            .gateway
            .run_deep_analysis(&input, &market.summary)
            .await
            .map_err(|e| GraphError::Other(anyhow::anyhow!("Deep analysis failed: {}", e)))?;

        info!("Generated report with {} characters", report.len());
        context.set(keys::DEEP_ANALYSIS, report).await;
        record_task_time(&context, Self::ID, start_time).await;

        Ok(TaskResult::new(
            Some("Feasibility report generated".to_string()),
            NextAction::End,
        ))
    }
}
