//! Presentation layer: view models derived purely from state.
//!
//! Every stage value maps to a distinct affordance and every list may be empty.

use crate::analysis::{AnalysisStage, AnalysisState};
use crate::chat::ChatThread;
use crate::estimator::EstimatorSnapshot;
use crate::models::{
    BudgetVerdict, CashFlowMonth, ChatRole, CostItem, EstimationResult, FeasibilityResult,
    RiskItem, WebSource,
};
use serde::Serialize;

pub const MAX_VISIBLE_SOURCES: usize = 4;
pub const ANALYSIS_ERROR_MESSAGE: &str =
    "An error occurred during the analysis. Please check your API key configuration.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    Hidden,
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSection {
    pub status: SectionStatus,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSection {
    pub status: SectionStatus,
    pub summary: Option<String>,
    pub sources: Vec<WebSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    pub status: SectionStatus,
    pub title: String,
    pub thinking: bool,
    pub completed: bool,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    pub generation: u64,
    pub stage: AnalysisStage,
    /// Placeholder headline when nothing has been submitted yet.
    pub idle_message: Option<String>,
    pub quick_scan: TextSection,
    pub market: MarketSection,
    pub report: ReportSection,
    pub error: Option<String>,
    pub error_detail: Option<String>,
}

fn status_of(shown: bool, ready: bool) -> SectionStatus {
    match (shown, ready) {
        (_, true) => SectionStatus::Ready,
        (true, false) => SectionStatus::Loading,
        (false, false) => SectionStatus::Hidden,
    }
}

pub fn analysis_view(generation: u64, state: &AnalysisState) -> AnalysisView {
    let stage = state.stage;

    if stage == AnalysisStage::Idle {
        return AnalysisView {
            generation,
            stage,
            idle_message: Some("Ready to Analyze".to_string()),
            quick_scan: TextSection {
                status: SectionStatus::Hidden,
                title: "Initial AI Impression".to_string(),
                body: None,
            },
            market: MarketSection {
                status: SectionStatus::Hidden,
                summary: None,
                sources: Vec::new(),
            },
            report: ReportSection {
                status: SectionStatus::Hidden,
                title: "Comprehensive Feasibility Report".to_string(),
                thinking: false,
                completed: false,
                body: None,
            },
            error: None,
            error_detail: None,
        };
    }

    let thinking = stage == AnalysisStage::DeepThinking;
    let sources = state
        .market_data
        .as_ref()
        .map(|market| {
            market
                .sources
                .iter()
                .take(MAX_VISIBLE_SOURCES)
                .filter_map(|source| source.web.clone())
                .collect()
        })
        .unwrap_or_default();

    AnalysisView {
        generation,
        stage,
        idle_message: None,
        quick_scan: TextSection {
            status: status_of(stage == AnalysisStage::QuickScan, state.quick_scan_result.is_some()),
            title: "Initial AI Impression".to_string(),
            body: state.quick_scan_result.clone(),
        },
        market: MarketSection {
            status: status_of(stage == AnalysisStage::MarketResearch, state.market_data.is_some()),
            summary: state.market_data.as_ref().map(|m| m.summary.clone()),
            sources,
        },
        report: ReportSection {
            status: status_of(
                thinking || stage == AnalysisStage::Complete,
                state.deep_analysis_report.is_some(),
            ),
            title: if thinking {
                "Thinking Deeply...".to_string()
            } else {
                "Comprehensive Feasibility Report".to_string()
            },
            thinking,
            completed: stage == AnalysisStage::Complete,
            body: state.deep_analysis_report.clone(),
        },
        error: (stage == AnalysisStage::Error).then(|| ANALYSIS_ERROR_MESSAGE.to_string()),
        error_detail: if stage == AnalysisStage::Error {
            state.error.clone()
        } else {
            None
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Info,
    Negative,
}

pub fn verdict_tone(verdict: BudgetVerdict) -> Tone {
    match verdict {
        BudgetVerdict::Realistic => Tone::Positive,
        BudgetVerdict::Excessive => Tone::Info,
        BudgetVerdict::Insufficient => Tone::Negative,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityBadge {
    pub checking: bool,
    pub tone: Tone,
    #[serde(flatten)]
    pub result: FeasibilityResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

pub fn confidence_tier(score: f64) -> ConfidenceTier {
    if score > 75.0 {
        ConfidenceTier::High
    } else if score > 50.0 {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    /// Percent of the breakdown sum.
    pub share: f64,
}

/// Sums the breakdown per category, in order of first appearance.
pub fn category_totals(breakdown: &[CostItem]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for item in breakdown {
        match totals.iter_mut().find(|t| t.category == item.category) {
            Some(existing) => existing.total += item.cost,
            None => totals.push(CategoryTotal {
                category: item.category.clone(),
                total: item.cost,
                share: 0.0,
            }),
        }
    }

    let sum: f64 = totals.iter().map(|t| t.total).sum();
    if sum > 0.0 {
        for total in &mut totals {
            total.share = total.total * 100.0 / sum;
        }
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub currency: String,
    pub total_estimated_cost: f64,
    pub location: String,
    pub budget_limit: f64,
    /// Budget minus estimate; negative means a deficit.
    pub budget_difference: f64,
    pub within_budget: bool,
    pub budget_label: String,
    pub confidence_score: f64,
    pub confidence_tier: ConfidenceTier,
    pub confidence_reason: String,
    pub breakdown: Vec<CostItem>,
    pub category_totals: Vec<CategoryTotal>,
    pub cashflow: Vec<CashFlowMonth>,
    pub risks: Vec<RiskItem>,
    pub efficiency_tips: Vec<String>,
    pub summary: String,
    pub adjustments: Vec<String>,
}

pub fn dashboard(result: &EstimationResult, location: &str, budget_limit: f64) -> Dashboard {
    let budget_limit = if budget_limit.is_finite() { budget_limit } else { 0.0 };
    let budget_difference = budget_limit - result.total_estimated_cost;
    let within_budget = budget_difference >= 0.0;
    let currency = if result.currency_symbol.trim().is_empty() {
        "$".to_string()
    } else {
        result.currency_symbol.clone()
    };

    Dashboard {
        currency,
        total_estimated_cost: result.total_estimated_cost,
        location: location.to_string(),
        budget_limit,
        budget_difference,
        within_budget,
        budget_label: if within_budget {
            "Budget Surplus".to_string()
        } else {
            "Budget Deficit".to_string()
        },
        confidence_score: result.confidence_score,
        confidence_tier: confidence_tier(result.confidence_score),
        confidence_reason: result.confidence_reason.clone(),
        breakdown: result.breakdown.clone(),
        category_totals: category_totals(&result.breakdown),
        cashflow: result.cashflow.clone(),
        risks: result.risks.clone(),
        efficiency_tips: result.efficiency_tips.clone(),
        summary: result.summary.clone(),
        adjustments: result.adjustments.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EstimatePanel {
    Empty,
    Loading,
    Ready { dashboard: Box<Dashboard> },
    Failed { notice: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatorView {
    pub inputs: crate::models::ProjectInputs,
    /// `None` until the first check completes: no verdict yet.
    pub feasibility: Option<FeasibilityBadge>,
    pub feasibility_checking: bool,
    pub estimate: EstimatePanel,
}

pub fn estimator_view(snapshot: &EstimatorSnapshot) -> EstimatorView {
    let feasibility = snapshot.feasibility.as_ref().map(|result| FeasibilityBadge {
        checking: snapshot.feasibility_checking,
        tone: verdict_tone(result.budget_verdict),
        result: result.clone(),
    });

    let estimate = if snapshot.estimating {
        EstimatePanel::Loading
    } else if let Some(result) = &snapshot.estimate {
        let inputs = snapshot.estimate_inputs.as_ref().unwrap_or(&snapshot.inputs);
        EstimatePanel::Ready {
            dashboard: Box::new(dashboard(result, &inputs.location, inputs.budget_limit)),
        }
    } else if let Some(notice) = &snapshot.estimate_error {
        EstimatePanel::Failed {
            notice: notice.clone(),
        }
    } else {
        EstimatePanel::Empty
    };

    EstimatorView {
        inputs: snapshot.inputs.clone(),
        feasibility,
        feasibility_checking: snapshot.feasibility_checking,
        estimate,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBubble {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    pub time: String,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub messages: Vec<ChatBubble>,
    pub pending: bool,
}

pub fn chat_view(thread: &ChatThread) -> ChatView {
    ChatView {
        messages: thread
            .messages
            .iter()
            .map(|message| ChatBubble {
                id: message.id.clone(),
                role: message.role,
                text: message.text.clone(),
                time: message.timestamp.format("%H:%M").to_string(),
                align: match message.role {
                    ChatRole::User => Align::Right,
                    ChatRole::Model => Align::Left,
                },
            })
            .collect(),
        pending: thread.pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, GroundingSource, MarketResearchResult, ProjectInputs};

    fn at(stage: AnalysisStage) -> AnalysisState {
        AnalysisState {
            stage,
            ..Default::default()
        }
    }

    #[test]
    fn idle_shows_only_placeholder() {
        let view = analysis_view(0, &AnalysisState::default());
        assert_eq!(view.idle_message.as_deref(), Some("Ready to Analyze"));
        assert_eq!(view.quick_scan.status, SectionStatus::Hidden);
        assert_eq!(view.market.status, SectionStatus::Hidden);
        assert_eq!(view.report.status, SectionStatus::Hidden);
        assert!(view.error.is_none());
    }

    #[test]
    fn each_stage_has_a_distinct_affordance() {
        let scan = analysis_view(1, &at(AnalysisStage::QuickScan));
        assert_eq!(scan.quick_scan.status, SectionStatus::Loading);
        assert_eq!(scan.market.status, SectionStatus::Hidden);

        let mut market_state = at(AnalysisStage::MarketResearch);
        market_state.quick_scan_result = Some("Looks promising".into());
        let market = analysis_view(1, &market_state);
        assert_eq!(market.quick_scan.status, SectionStatus::Ready);
        assert_eq!(market.market.status, SectionStatus::Loading);
        assert_eq!(market.report.status, SectionStatus::Hidden);

        let deep = analysis_view(1, &at(AnalysisStage::DeepThinking));
        assert_eq!(deep.report.status, SectionStatus::Loading);
        assert!(deep.report.thinking);
        assert_eq!(deep.report.title, "Thinking Deeply...");

        let mut complete_state = at(AnalysisStage::Complete);
        complete_state.deep_analysis_report = Some("# Report".into());
        let complete = analysis_view(1, &complete_state);
        assert_eq!(complete.report.status, SectionStatus::Ready);
        assert!(complete.report.completed);
        assert!(!complete.report.thinking);

        let mut failed_state = at(AnalysisStage::Error);
        failed_state.error = Some("network failure".into());
        let failed = analysis_view(1, &failed_state);
        assert_eq!(failed.error.as_deref(), Some(ANALYSIS_ERROR_MESSAGE));
        assert_eq!(failed.error_detail.as_deref(), Some("network failure"));
    }

    #[test]
    fn at_most_four_web_sources_are_shown() {
        let mut state = at(AnalysisStage::DeepThinking);
        let mut sources: Vec<GroundingSource> = (0..6)
            .map(|i| GroundingSource {
                web: Some(WebSource {
                    uri: format!("https://s{i}.test"),
                    title: format!("S{i}"),
                }),
            })
            .collect();
        sources[1].web = None;
        state.market_data = Some(MarketResearchResult {
            summary: "M".into(),
            sources,
        });

        let view = analysis_view(1, &state);
        let titles: Vec<&str> = view.market.sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["S0", "S2", "S3"]);
    }

    #[test]
    fn dashboard_reports_surplus_and_deficit() {
        let result = EstimationResult {
            total_estimated_cost: 120.0,
            confidence_score: 80.0,
            ..Default::default()
        };
        let over = dashboard(&result, "Pune", 100.0);
        assert_eq!(over.budget_difference, -20.0);
        assert!(!over.within_budget);
        assert_eq!(over.budget_label, "Budget Deficit");
        assert_eq!(over.currency, "$");
        assert_eq!(over.confidence_tier, ConfidenceTier::High);

        let under = dashboard(&result, "Pune", 150.0);
        assert!(under.within_budget);
        assert_eq!(under.budget_label, "Budget Surplus");
    }

    #[test]
    fn category_totals_merge_repeated_categories() {
        let item = |category: &str, cost: f64| CostItem {
            category: category.to_string(),
            cost,
            description: String::new(),
        };
        let totals = category_totals(&[
            item("Materials", 300.0),
            item("Labor & Wages", 200.0),
            item("Materials", 300.0),
            item("Permits", 200.0),
        ]);

        let names: Vec<&str> = totals.iter().map(|t| t.category.as_str()).collect();
        assert_eq!(names, vec!["Materials", "Labor & Wages", "Permits"]);
        assert_eq!(totals[0].total, 600.0);
        assert_eq!(totals[0].share, 60.0);
        assert_eq!(totals[2].share, 20.0);

        assert!(category_totals(&[]).is_empty());
        assert_eq!(category_totals(&[item("Site", 0.0)])[0].share, 0.0);
    }

    #[test]
    fn confidence_tiers_match_thresholds() {
        assert_eq!(confidence_tier(76.0), ConfidenceTier::High);
        assert_eq!(confidence_tier(75.0), ConfidenceTier::Medium);
        assert_eq!(confidence_tier(50.0), ConfidenceTier::Low);
    }

    #[test]
    fn estimator_view_tracks_panel_state() {
        let mut snapshot = EstimatorSnapshot::default();
        assert_eq!(estimator_view(&snapshot).estimate, EstimatePanel::Empty);
        assert!(estimator_view(&snapshot).feasibility.is_none());

        snapshot.estimating = true;
        assert_eq!(estimator_view(&snapshot).estimate, EstimatePanel::Loading);

        snapshot.estimating = false;
        snapshot.estimate_error = Some("Estimation failed. Please try again.".into());
        assert!(matches!(
            estimator_view(&snapshot).estimate,
            EstimatePanel::Failed { .. }
        ));

        snapshot.estimate_error = None;
        snapshot.estimate = Some(EstimationResult::default());
        snapshot.estimate_inputs = Some(ProjectInputs {
            location: "Lagos".into(),
            budget_limit: 10.0,
            ..Default::default()
        });
        match estimator_view(&snapshot).estimate {
            EstimatePanel::Ready { dashboard } => {
                assert_eq!(dashboard.location, "Lagos");
                assert_eq!(dashboard.budget_limit, 10.0);
            }
            other => panic!("expected dashboard, got {other:?}"),
        }

        snapshot.feasibility = Some(FeasibilityResult::unavailable("down"));
        let badge = estimator_view(&snapshot).feasibility.unwrap();
        assert_eq!(badge.tone, Tone::Negative);
    }

    #[test]
    fn chat_bubbles_align_by_role() {
        let thread = ChatThread {
            messages: vec![ChatMessage::model("Hi"), ChatMessage::user("Hello")],
            pending: true,
        };
        let view = chat_view(&thread);
        assert_eq!(view.messages[0].align, Align::Left);
        assert_eq!(view.messages[1].align, Align::Right);
        assert_eq!(view.messages[1].time.len(), 5);
        assert!(view.pending);
    }
}
