//! Stage/result state of a feasibility study and its pure transition function.

use crate::error::TransitionError;
use crate::models::{MarketResearchResult, ProjectInput};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStage {
    #[default]
    Idle,
    QuickScan,
    MarketResearch,
    DeepThinking,
    Complete,
    Error,
}

impl AnalysisStage {
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            AnalysisStage::QuickScan | AnalysisStage::MarketResearch | AnalysisStage::DeepThinking
        )
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnalysisStage::Idle => "IDLE",
            AnalysisStage::QuickScan => "QUICK_SCAN",
            AnalysisStage::MarketResearch => "MARKET_RESEARCH",
            AnalysisStage::DeepThinking => "DEEP_THINKING",
            AnalysisStage::Complete => "COMPLETE",
            AnalysisStage::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    pub stage: AnalysisStage,
    pub input: Option<ProjectInput>,
    pub quick_scan_result: Option<String>,
    pub market_data: Option<MarketResearchResult>,
    pub deep_analysis_report: Option<String>,
    pub error: Option<String>,
    /// Stage that was running when the run failed.
    pub failed_stage: Option<AnalysisStage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    Started(ProjectInput),
    QuickScanCompleted(String),
    MarketResearchCompleted(MarketResearchResult),
    DeepAnalysisCompleted(String),
    Failed(String),
}

impl AnalysisEvent {
    fn name(&self) -> &'static str {
        match self {
            AnalysisEvent::Started(_) => "Started",
            AnalysisEvent::QuickScanCompleted(_) => "QuickScanCompleted",
            AnalysisEvent::MarketResearchCompleted(_) => "MarketResearchCompleted",
            AnalysisEvent::DeepAnalysisCompleted(_) => "DeepAnalysisCompleted",
            AnalysisEvent::Failed(_) => "Failed",
        }
    }
}

/// Computes the next state.
///
/// `Started` always opens a fresh run. Every other event must match the running stage, moves
/// exactly one stage forward, and clears the slots of the stages that follow. `ERROR` and
/// `COMPLETE` accept nothing but a new start.
pub fn transition(state: &AnalysisState, event: AnalysisEvent) -> Result<AnalysisState, TransitionError> {
    let stage = state.stage;
    let rejected = |event: &AnalysisEvent| TransitionError {
        stage: stage.to_string(),
        event: event.name().to_string(),
    };

    let next = match (stage, event) {
        (_, AnalysisEvent::Started(input)) => AnalysisState {
            stage: AnalysisStage::QuickScan,
            input: Some(input),
            ..AnalysisState::default()
        },
        (AnalysisStage::QuickScan, AnalysisEvent::QuickScanCompleted(scan)) => AnalysisState {
            stage: AnalysisStage::MarketResearch,
            quick_scan_result: Some(scan),
            market_data: None,
            deep_analysis_report: None,
            ..state.clone()
        },
        (AnalysisStage::MarketResearch, AnalysisEvent::MarketResearchCompleted(market)) => {
            AnalysisState {
                stage: AnalysisStage::DeepThinking,
                market_data: Some(market),
                deep_analysis_report: None,
                ..state.clone()
            }
        }
        (AnalysisStage::DeepThinking, AnalysisEvent::DeepAnalysisCompleted(report)) => {
            AnalysisState {
                stage: AnalysisStage::Complete,
                deep_analysis_report: Some(report),
                ..state.clone()
            }
        }
        (running, AnalysisEvent::Failed(message)) if running.is_in_progress() => AnalysisState {
            stage: AnalysisStage::Error,
            error: Some(message),
            failed_stage: Some(running),
            ..state.clone()
        },
        (_, event) => return Err(rejected(&event)),
    };
    Ok(next)
}
