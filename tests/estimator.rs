mod common;

use common::ScriptedBackend;
use feasibility_studio::error::GatewayError;
use feasibility_studio::estimator::{EstimatorWorkspace, ESTIMATE_FAILED_NOTICE};
use feasibility_studio::models::{BudgetVerdict, ProjectInputs, ProjectType, QualityLevel};
use feasibility_studio::tools::Purpose;
use std::sync::Arc;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(1500);

fn inputs(location: &str) -> ProjectInputs {
    ProjectInputs {
        project_type: ProjectType::Residential,
        quality: QualityLevel::Standard,
        location: location.to_string(),
        size_sq_ft: 1200.0,
        budget_limit: 4_000_000.0,
        timeline_months: 6,
        manpower: 8,
    }
}

fn verdict_json(score: u32, verdict: &str) -> String {
    format!(
        r#"{{"isValid": true, "score": {score}, "budgetVerdict": "{verdict}", "issues": [], "suggestions": ["Phase the finishes"]}}"#
    )
}

fn cashflow_json(months: u32) -> String {
    let entries: Vec<String> = (1..=months)
        .map(|m| format!(r#"{{"month": {m}, "amount": 1000, "phase": "Build"}}"#))
        .collect();
    format!(
        r#"{{"currencySymbol": "₹", "totalEstimatedCost": 3900000, "breakdown": [{{"category": "Labor & Wages", "cost": 800000, "description": "8 workers"}}], "cashflow": [{}], "risks": [], "confidenceScore": 70, "confidenceReason": "Local rates", "efficiencyTips": [], "summary": "Feasible"}}"#,
        entries.join(",")
    )
}

#[tokio::test]
async fn feasibility_check_never_fails() {
    let failures = vec![
        GatewayError::network("timeout"),
        GatewayError::Network {
            message: "HTTP 500".into(),
            status: Some(500),
        },
        GatewayError::ResponseShape("completion content is empty".into()),
        GatewayError::UpstreamUnavailable("API key not configured".into()),
    ];

    for failure in failures {
        let (_, gateway) = ScriptedBackend::new()
            .fail(Purpose::Feasibility, failure.clone())
            .into_gateway();
        let result = gateway.check_feasibility(&inputs("Pune, India")).await;

        assert!(!result.is_valid, "{failure:?}");
        assert_eq!(result.score, 0.0);
        assert_eq!(result.budget_verdict, BudgetVerdict::Insufficient);
        assert!(!result.issues.is_empty());
    }
}

#[tokio::test]
async fn unparsable_feasibility_answer_is_recovered() {
    let (_, gateway) = ScriptedBackend::new()
        .reply(Purpose::Feasibility, "I think it is probably fine?")
        .into_gateway();
    let result = gateway.check_feasibility(&inputs("Pune, India")).await;

    assert!(!result.is_valid);
    assert_eq!(result.score, 0.0);
    assert_eq!(result.budget_verdict, BudgetVerdict::Insufficient);
    assert!(result.issues[0].contains("Service unavailable or parse error"));
}

#[tokio::test]
async fn fenced_feasibility_answer_is_parsed() {
    let fenced = format!("```json\n{}\n```", verdict_json(88, "Realistic"));
    let (backend, gateway) = ScriptedBackend::new()
        .reply(Purpose::Feasibility, &fenced)
        .into_gateway();
    let result = gateway.check_feasibility(&inputs("Pune, India")).await;

    assert!(result.is_valid);
    assert_eq!(result.score, 88.0);
    assert_eq!(result.budget_verdict, BudgetVerdict::Realistic);
    assert_eq!(result.suggestions, vec!["Phase the finishes".to_string()]);
    assert!(backend.requests(Purpose::Feasibility)[0].json_mode);
}

#[tokio::test]
async fn estimate_failure_propagates_and_leaves_a_notice() {
    let (_, gateway) = ScriptedBackend::new()
        .fail(Purpose::Estimate, GatewayError::network("connection refused"))
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    let err = workspace.run_estimate(inputs("Pune, India")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network { .. }));

    let snapshot = workspace.snapshot();
    assert!(!snapshot.estimating);
    assert!(snapshot.estimate.is_none());
    assert_eq!(snapshot.estimate_error.as_deref(), Some(ESTIMATE_FAILED_NOTICE));
}

#[tokio::test]
async fn unparsable_estimate_is_a_hard_failure() {
    let (_, gateway) = ScriptedBackend::new()
        .reply(Purpose::Estimate, "Sorry, I cannot estimate that.")
        .into_gateway();
    let err = gateway.estimate(&inputs("Pune, India")).await.unwrap_err();
    assert!(matches!(err, GatewayError::ResponseShape(_)));
}

#[tokio::test]
async fn cashflow_length_is_pinned_to_the_timeline() {
    let (_, gateway) = ScriptedBackend::new()
        .reply(Purpose::Estimate, &cashflow_json(12))
        .into_gateway();
    let result = gateway.estimate(&inputs("Pune, India")).await.unwrap();

    assert_eq!(result.cashflow.len(), 6);
    assert_eq!(result.cashflow.last().unwrap().month, 6);
    assert_eq!(result.adjustments.len(), 1);

    let (_, gateway) = ScriptedBackend::new()
        .reply(Purpose::Estimate, &cashflow_json(6))
        .into_gateway();
    let result = gateway.estimate(&inputs("Pune, India")).await.unwrap();
    assert_eq!(result.cashflow.len(), 6);
    assert!(result.adjustments.is_empty());
    assert_eq!(result.breakdown[0].category, "Labor & Wages");
}

#[tokio::test]
async fn new_estimate_replaces_the_previous_one() {
    let (_, gateway) = ScriptedBackend::new()
        .reply(Purpose::Estimate, &cashflow_json(6))
        .fail(Purpose::Estimate, GatewayError::network("down"))
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    workspace.run_estimate(inputs("Pune, India")).await.unwrap();
    assert!(workspace.snapshot().estimate.is_some());

    assert!(workspace.run_estimate(inputs("Pune, India")).await.is_err());
    let snapshot = workspace.snapshot();
    assert!(snapshot.estimate.is_none());
    assert!(snapshot.estimate_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn only_the_last_edit_in_the_quiet_period_fires() {
    let (backend, gateway) = ScriptedBackend::new()
        .reply(Purpose::Feasibility, &verdict_json(82, "Realistic"))
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    workspace.update_inputs(inputs("Pun"));
    tokio::time::sleep(Duration::from_millis(500)).await;
    workspace.update_inputs(inputs("Pune"));
    tokio::time::sleep(Duration::from_millis(500)).await;
    workspace.update_inputs(inputs("Pune, India"));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(backend.calls(Purpose::Feasibility), 0);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    tokio::task::yield_now().await;

    let requests = backend.requests(Purpose::Feasibility);
    assert_eq!(requests.len(), 1);
    assert!(requests[0].last_content().contains("Pune, India"));

    let snapshot = workspace.snapshot();
    assert!(!snapshot.feasibility_checking);
    assert_eq!(snapshot.feasibility.unwrap().score, 82.0);
    assert_eq!(snapshot.feasibility_inputs.unwrap().location, "Pune, India");
}

#[tokio::test(start_paused = true)]
async fn incomplete_inputs_are_not_checked() {
    let (backend, gateway) = ScriptedBackend::new()
        .reply(Purpose::Feasibility, &verdict_json(82, "Realistic"))
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    workspace.update_inputs(inputs("NY"));
    let mut no_budget = inputs("Austin, TX");
    no_budget.budget_limit = 0.0;
    tokio::time::sleep(Duration::from_secs(2)).await;
    workspace.update_inputs(no_budget);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(backend.calls(Purpose::Feasibility), 0);
    assert!(workspace.snapshot().feasibility.is_none());
}

#[tokio::test(start_paused = true)]
async fn stale_feasibility_response_is_discarded() {
    let slow = verdict_json(15, "Insufficient");
    let fast = verdict_json(91, "Excessive");
    let (backend, gateway) = ScriptedBackend::new()
        .reply_after(Purpose::Feasibility, Duration::from_secs(5), &slow)
        .reply_after(Purpose::Feasibility, Duration::from_secs(1), &fast)
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    let first = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.run_feasibility_check(inputs("Pune")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.run_feasibility_check(inputs("Pune, India")).await })
    };

    let late = first.await.unwrap();
    let latest = second.await.unwrap();
    assert_eq!(late.score, 15.0);
    assert_eq!(latest.score, 91.0);
    assert_eq!(backend.calls(Purpose::Feasibility), 2);

    let snapshot = workspace.snapshot();
    let shown = snapshot.feasibility.unwrap();
    assert_eq!(shown.score, 91.0);
    assert_eq!(shown.budget_verdict, BudgetVerdict::Excessive);
    assert_eq!(snapshot.feasibility_inputs.unwrap().location, "Pune, India");
    assert!(!snapshot.feasibility_checking);
}

#[tokio::test]
async fn feasibility_and_estimate_can_overlap() {
    let (_, gateway) = ScriptedBackend::new()
        .reply(Purpose::Feasibility, &verdict_json(75, "Realistic"))
        .reply(Purpose::Estimate, &cashflow_json(6))
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    let (verdict, estimate) = futures::join!(
        workspace.run_feasibility_check(inputs("Pune, India")),
        workspace.run_estimate(inputs("Pune, India"))
    );

    assert_eq!(verdict.score, 75.0);
    assert_eq!(estimate.unwrap().total_estimated_cost, 3_900_000.0);
    let snapshot = workspace.snapshot();
    assert!(snapshot.feasibility.is_some());
    assert!(snapshot.estimate.is_some());
}

#[tokio::test(start_paused = true)]
async fn abandoned_estimate_still_settles() {
    let (backend, gateway) = ScriptedBackend::new()
        .reply_after(Purpose::Estimate, Duration::from_secs(60), &cashflow_json(6))
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    let waited = tokio::time::timeout(
        Duration::from_secs(1),
        workspace.run_estimate(inputs("Pune, India")),
    )
    .await;
    assert!(waited.is_err());
    assert!(workspace.snapshot().estimating);

    tokio::time::sleep(Duration::from_secs(120)).await;

    let snapshot = workspace.snapshot();
    assert!(!snapshot.estimating);
    assert_eq!(snapshot.estimate.unwrap().cashflow.len(), 6);
    assert!(!workspace.is_busy());
    assert_eq!(backend.calls(Purpose::Estimate), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_feasibility_check_still_settles() {
    let (_, gateway) = ScriptedBackend::new()
        .reply_after(Purpose::Feasibility, Duration::from_secs(60), &verdict_json(70, "Realistic"))
        .into_gateway();
    let workspace = Arc::new(EstimatorWorkspace::new(gateway, DEBOUNCE));

    let waited = tokio::time::timeout(
        Duration::from_secs(1),
        workspace.run_feasibility_check(inputs("Pune, India")),
    )
    .await;
    assert!(waited.is_err());

    tokio::time::sleep(Duration::from_secs(120)).await;

    let snapshot = workspace.snapshot();
    assert!(!snapshot.feasibility_checking);
    assert_eq!(snapshot.feasibility.unwrap().score, 70.0);
}
