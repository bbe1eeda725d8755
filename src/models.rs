use crate::error::InputError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business idea submitted to the three-stage feasibility study.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    pub name: String,
    pub description: String,
    pub industry: String,
    pub budget: String,
    pub timeline: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    #[default]
    Residential,
    Commercial,
    Industrial,
    Renovation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLevel {
    Economy,
    #[default]
    Standard,
    Premium,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProjectType::Residential => "Residential",
            ProjectType::Commercial => "Commercial",
            ProjectType::Industrial => "Industrial",
            ProjectType::Renovation => "Renovation",
        };
        f.write_str(label)
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityLevel::Economy => "Economy",
            QualityLevel::Standard => "Standard",
            QualityLevel::Premium => "Premium",
        };
        f.write_str(label)
    }
}

/// Construction project parameters edited live in the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInputs {
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub quality: QualityLevel,
    pub location: String,
    pub size_sq_ft: f64,
    pub budget_limit: f64,
    pub timeline_months: u32,
    pub manpower: u32,
}

impl Default for ProjectInputs {
    fn default() -> Self {
        Self {
            project_type: ProjectType::Residential,
            quality: QualityLevel::Standard,
            location: String::new(),
            size_sq_ft: 1000.0,
            budget_limit: 5_000_000.0,
            timeline_months: 6,
            manpower: 5,
        }
    }
}

pub const MAX_TIMELINE_MONTHS: u32 = 120;
pub const MAX_MANPOWER: u32 = 10_000;

impl ProjectInputs {
    /// Bounds every edit must respect, even while the form is half filled.
    pub fn check_bounds(&self) -> Result<(), InputError> {
        for (field, value) in [("sizeSqFt", self.size_sq_ft), ("budgetLimit", self.budget_limit)] {
            if !value.is_finite() {
                return Err(InputError::NotFinite { field });
            }
            if value < 0.0 {
                return Err(InputError::Negative { field });
            }
        }
        if self.timeline_months > MAX_TIMELINE_MONTHS {
            return Err(InputError::OutOfRange {
                field: "timelineMonths",
                min: 0,
                max: MAX_TIMELINE_MONTHS,
            });
        }
        if self.manpower > MAX_MANPOWER {
            return Err(InputError::OutOfRange {
                field: "manpower",
                min: 0,
                max: MAX_MANPOWER,
            });
        }
        Ok(())
    }

    /// Inputs complete enough to send to the model.
    pub fn validate(&self) -> Result<(), InputError> {
        self.check_bounds()?;
        if self.size_sq_ft <= 0.0 {
            return Err(InputError::NotPositive { field: "sizeSqFt" });
        }
        if self.budget_limit <= 0.0 {
            return Err(InputError::NotPositive { field: "budgetLimit" });
        }
        if self.timeline_months == 0 {
            return Err(InputError::OutOfRange {
                field: "timelineMonths",
                min: 1,
                max: MAX_TIMELINE_MONTHS,
            });
        }
        if self.manpower == 0 {
            return Err(InputError::OutOfRange {
                field: "manpower",
                min: 1,
                max: MAX_MANPOWER,
            });
        }
        Ok(())
    }

    /// Minimum inputs worth spending an automatic feasibility check on.
    pub fn is_checkable(&self) -> bool {
        self.location.trim().chars().count() > 2 && self.validate().is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: String,
    pub title: String,
}

/// Citation attached by a research-capable backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketResearchResult {
    pub summary: String,
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetVerdict {
    Realistic,
    #[default]
    Insufficient,
    Excessive,
}

impl BudgetVerdict {
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "realistic" => Some(BudgetVerdict::Realistic),
            "insufficient" => Some(BudgetVerdict::Insufficient),
            "excessive" => Some(BudgetVerdict::Excessive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityResult {
    pub is_valid: bool,
    pub score: f64,
    pub budget_verdict: BudgetVerdict,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl FeasibilityResult {
    /// Low-confidence stand-in used when the check could not be completed.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            score: 0.0,
            budget_verdict: BudgetVerdict::Insufficient,
            issues: vec![reason.into()],
            suggestions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    pub category: String,
    pub cost: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowMonth {
    pub month: u32,
    pub amount: f64,
    pub phase: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskImpact {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskImpact {
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskImpact::Low),
            "medium" => Some(RiskImpact::Medium),
            "high" => Some(RiskImpact::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
    pub risk: String,
    pub impact: RiskImpact,
    pub mitigation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationResult {
    pub currency_symbol: String,
    pub total_estimated_cost: f64,
    pub breakdown: Vec<CostItem>,
    pub cashflow: Vec<CashFlowMonth>,
    pub risks: Vec<RiskItem>,
    pub confidence_score: f64,
    pub confidence_reason: String,
    pub efficiency_tips: Vec<String>,
    pub summary: String,
    /// Corrections applied locally to the model's answer.
    #[serde(default)]
    pub adjustments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatRole::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(ChatRole::Model, text)
    }
}
