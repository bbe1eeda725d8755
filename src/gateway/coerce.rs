//! Coercion of model-produced JSON into result shapes.
//!
//! Every missing or mistyped field falls back to a safe default so views never see holes.

use crate::models::{
    BudgetVerdict, CashFlowMonth, CostItem, EstimationResult, FeasibilityResult, RiskImpact,
    RiskItem, MAX_TIMELINE_MONTHS,
};
use serde_json::{Map, Value};

pub const UNALLOCATED_PHASE: &str = "Unallocated";

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed: Option<f64> = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn percentage(value: Option<&Value>) -> f64 {
    number(value).unwrap_or(0.0).clamp(0.0, 100.0)
}

pub fn feasibility_from_value(value: &Value) -> FeasibilityResult {
    FeasibilityResult {
        is_valid: truthy(value.get("isValid")),
        score: percentage(value.get("score")),
        budget_verdict: value
            .get("budgetVerdict")
            .and_then(Value::as_str)
            .and_then(BudgetVerdict::parse_lenient)
            .unwrap_or_default(),
        issues: string_list(value.get("issues")),
        suggestions: string_list(value.get("suggestions")),
    }
}

/// Builds an estimate and pins the cashflow to `timeline_months` entries.
pub fn estimation_from_value(value: &Value, timeline_months: u32) -> EstimationResult {
    let breakdown = objects(value.get("breakdown"))
        .map(|item| CostItem {
            category: text(item.get("category")),
            cost: number(item.get("cost")).unwrap_or(0.0),
            description: text(item.get("description")),
        })
        .collect();

    let cashflow: Vec<CashFlowMonth> = objects(value.get("cashflow"))
        .map(|entry| CashFlowMonth {
            month: number(entry.get("month"))
                .filter(|m| *m >= 0.0)
                .map(|m| m as u32)
                .unwrap_or(0),
            amount: number(entry.get("amount")).unwrap_or(0.0),
            phase: text(entry.get("phase")),
        })
        .collect();

    let risks = objects(value.get("risks"))
        .map(|item| RiskItem {
            risk: text(item.get("risk")),
            impact: item
                .get("impact")
                .and_then(Value::as_str)
                .and_then(RiskImpact::parse_lenient)
                .unwrap_or_default(),
            mitigation: text(item.get("mitigation")),
        })
        .collect();

    let (cashflow, note) = normalize_cashflow(cashflow, timeline_months);

    EstimationResult {
        currency_symbol: text(value.get("currencySymbol")),
        total_estimated_cost: number(value.get("totalEstimatedCost")).unwrap_or(0.0),
        breakdown,
        cashflow,
        risks,
        confidence_score: percentage(value.get("confidenceScore")),
        confidence_reason: text(value.get("confidenceReason")),
        efficiency_tips: string_list(value.get("efficiencyTips")),
        summary: text(value.get("summary")),
        adjustments: note.into_iter().collect(),
    }
}

/// Forces a cashflow to exactly `months` entries numbered 1..=months, with `months` capped at
/// [`MAX_TIMELINE_MONTHS`].
///
/// Entries are ordered by their reported month, extra entries are dropped and missing months
/// are padded with zero amounts. Returns a note whenever the model's answer had to change.
pub fn normalize_cashflow(
    mut cashflow: Vec<CashFlowMonth>,
    months: u32,
) -> (Vec<CashFlowMonth>, Option<String>) {
    let expected = months.min(MAX_TIMELINE_MONTHS) as usize;
    let received = cashflow.len();
    let numbered_in_order = cashflow
        .iter()
        .enumerate()
        .all(|(i, entry)| entry.month as usize == i + 1);

    if received == expected && numbered_in_order {
        return (cashflow, None);
    }

    cashflow.sort_by_key(|entry| entry.month);
    cashflow.truncate(expected);
    while cashflow.len() < expected {
        cashflow.push(CashFlowMonth {
            month: 0,
            amount: 0.0,
            phase: UNALLOCATED_PHASE.to_string(),
        });
    }
    for (i, entry) in cashflow.iter_mut().enumerate() {
        entry.month = i as u32 + 1;
    }

    let note = if received == expected {
        format!("Cashflow months renumbered to run from 1 to {expected}.")
    } else {
        format!(
            "Cashflow had {received} entries for a {months}-month timeline; adjusted to {expected}."
        )
    };
    (cashflow, Some(note))
}
