use super::{keys, record_task_time};
use crate::gateway::ModelGateway;
use crate::models::ProjectInput;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use tracing::{info, instrument};

pub struct MarketResearchTask {
    gateway: ModelGateway,
}

impl MarketResearchTask {
    pub const ID: &'static str = "market_research";

    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Task for MarketResearchTask {
    fn id(&self) -> &str {
        Self::ID
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting market research task");

        let input: ProjectInput = context
            .get(keys::PROJECT_INPUT)
            .await
            .ok_or_else(|| GraphError::ContextError("Project input not found".to_string()))?;

        let market = self
            .gateway
            .run_market_research(&input)
            .await
            .map_err(|e| GraphError::Other(anyhow::anyhow!("Market research failed: {}", e)))?;

        info!(
            "Market research summary has {} characters and {} sources",
            market.summary.len(),
            market.sources.len()
        );
        context.set(keys::MARKET_RESEARCH, market).await;
        record_task_time(&context, Self::ID, start_time).await;

        Ok(TaskResult::new(
            Some("Market research completed".to_string()),
            NextAction::Continue,
        ))
    }
}
