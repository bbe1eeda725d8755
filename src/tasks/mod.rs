mod deep_analysis;
mod market_research;
mod quick_scan;

pub use deep_analysis::DeepAnalysisTask;
pub use market_research::MarketResearchTask;
pub use quick_scan::QuickScanTask;

use graph_flow::Context;
use std::collections::HashMap;
use std::time::Instant;

/// Keys shared by the analysis tasks and the orchestrator.
pub mod keys {
    pub const PROJECT_INPUT: &str = "project_input";
    pub const QUICK_SCAN: &str = "quick_scan";
    pub const MARKET_RESEARCH: &str = "market_research";
    pub const DEEP_ANALYSIS: &str = "deep_analysis";
    pub const TASK_TIMES: &str = "task_times";
}

async fn record_task_time(context: &Context, task_id: &str, start_time: Instant) {
    let elapsed = start_time.elapsed().as_millis() as u64;
    let mut task_times: HashMap<String, u64> =
        context.get(keys::TASK_TIMES).await.unwrap_or_default();
    task_times.insert(task_id.to_string(), elapsed);
    context.set(keys::TASK_TIMES, task_times).await;
}
