//! Prompt text for every gateway call.
//!
//! Verdict thresholds and labour checks are not computed locally: they are written into the
//! prompt as instructions and the model's arithmetic is trusted. [`BudgetPolicy`] keeps those
//! numbers in one place.

use crate::models::{ProjectInput, ProjectInputs};

/// Thresholds the model is told to apply when judging a construction budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetPolicy {
    /// Budget per sq ft below `market_rate * insufficient_ratio` is insufficient.
    pub insufficient_ratio: f64,
    /// Budget per sq ft above `market_rate * excessive_ratio` is excessive.
    pub excessive_ratio: f64,
    /// Score ceiling when the budget is insufficient or the timeline is impossible.
    pub failing_score_ceiling: u32,
    pub healthy_score_floor: u32,
    pub excessive_score_floor: u32,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            insufficient_ratio: 0.8,
            excessive_ratio: 3.0,
            failing_score_ceiling: 60,
            healthy_score_floor: 80,
            excessive_score_floor: 90,
        }
    }
}

pub const FEASIBILITY_SCHEMA: &str = r#"{
  "isValid": boolean,
  "score": number,
  "budgetVerdict": "Realistic" | "Insufficient" | "Excessive",
  "issues": ["string"],
  "suggestions": ["string"]
}"#;

pub const ESTIMATE_SCHEMA: &str = r#"{
  "currencySymbol": "string",
  "totalEstimatedCost": number,
  "breakdown": [ { "category": "string", "cost": number, "description": "string" } ],
  "cashflow": [ { "month": number, "amount": number, "phase": "string" } ],
  "risks": [ { "risk": "string", "impact": "Low"|"Medium"|"High", "mitigation": "string" } ],
  "confidenceScore": number,
  "confidenceReason": "string",
  "efficiencyTips": ["string"],
  "summary": "string"
}"#;

pub fn feasibility_prompt(inputs: &ProjectInputs, policy: &BudgetPolicy) -> String {
    format!(
        r#"Act as a construction project manager and cost estimator for {location}.

Project Inputs:
- Type: {kind}
- Size: {size} sq ft
- Budget: {budget}
- Quality: {quality}
- Timeline: {months} months
- Manpower: {manpower} workers

TASK:
1. Financial Feasibility:
   - Calculate Budget Per Sq Ft = {budget} / {size}.
   - Estimate the AVERAGE Market Rate per sq ft for {quality} {kind} construction in {location} (total project cost including materials, labor, finishes).
   - Compare:
       - If Budget Per Sq Ft < Market Rate * {low} => 'Insufficient'
       - If Budget Per Sq Ft > Market Rate * {high} => 'Excessive'
       - Otherwise => 'Realistic'

2. Physical/Labor Feasibility (CRITICAL):
   - Determine the standard labor working hours and days per month in {location} (e.g. ~25-26 days/month, 8-9 hours/day).
   - Estimate the Total Man-Days Required to complete a {size} sq ft {kind} project of {quality} quality.
   - Calculate Available Man-Days = {manpower} workers * {months} months * [Working Days Per Month].
   - CHECK: Is Available Man-Days >= Required Man-Days?
   - If Available < Required, the project is Physically Impossible under normal conditions.

3. Scoring & Verdict:
   - If Financial is 'Insufficient' OR Physical is 'Impossible', Score must be < {ceiling}.
   - If both are good, Score > {floor}.
   - If 'Excessive' budget, Score should be high ({excessive}+).

OUTPUT: Return ONLY a valid JSON object with this structure:
{schema}

IMPORTANT: If the manpower/timeline is insufficient, you MUST add a specific issue like "Timeline/Manpower mismatch: Need approx X months with Y workers for this size.""#,
        location = inputs.location,
        kind = inputs.project_type,
        size = inputs.size_sq_ft,
        budget = inputs.budget_limit,
        quality = inputs.quality,
        months = inputs.timeline_months,
        manpower = inputs.manpower,
        low = policy.insufficient_ratio,
        high = policy.excessive_ratio,
        ceiling = policy.failing_score_ceiling,
        floor = policy.healthy_score_floor,
        excessive = policy.excessive_score_floor,
        schema = FEASIBILITY_SCHEMA,
    )
}

pub fn estimate_prompt(inputs: &ProjectInputs) -> String {
    format!(
        r#"Act as an expert chartered surveyor. Estimate construction costs for:

- Type: {kind}
- Quality: {quality}
- Location: {location}
- Size: {size} sq ft
- Budget Limit: {budget}
- Project Timeline: {months} months
- Manpower/Workers: {manpower} people

REQUIREMENTS:
1. Total Cost: Ensure 'totalEstimatedCost' is a realistic market value. Do not blindly match the budget.

2. Cost Breakdown (Crucial):
   - You MUST include a dedicated line item in 'breakdown' for "Labor & Wages".
   - Calculate this specifically for {manpower} workers over {months} months based on local daily/monthly wage rates in {location}.
   - Include other standard categories (Materials, Permits, etc).

3. Cashflow (Crucial):
   - The 'cashflow' array MUST have EXACTLY {months} entries.
   - It must range from Month 1 to Month {months}.
   - Do not generate 12 months if the timeline is {months}.

OUTPUT: Return ONLY a valid JSON object with this structure:
{schema}"#,
        kind = inputs.project_type,
        quality = inputs.quality,
        location = inputs.location,
        size = inputs.size_sq_ft,
        budget = inputs.budget_limit,
        months = inputs.timeline_months,
        manpower = inputs.manpower,
        schema = ESTIMATE_SCHEMA,
    )
}

fn project_brief(input: &ProjectInput) -> String {
    format!(
        "Project Name: {}\nIndustry: {}\nBudget: {}\nTimeline: {}\nDescription: {}",
        input.name, input.industry, input.budget, input.timeline, input.description
    )
}

pub fn quick_scan_prompt(input: &ProjectInput) -> String {
    format!(
        r#"You are a seasoned startup advisor. Give a quick first impression of this business idea.

{brief}

Requirements:
- 2-3 sentences, plain text, no markdown
- Say whether the idea looks promising, risky, or unclear and why
- Mention the single biggest concern"#,
        brief = project_brief(input)
    )
}

pub fn market_research_prompt(input: &ProjectInput) -> String {
    format!(
        r#"You are a market research analyst. Research the current market for this project.

{brief}

Requirements:
- Estimate market size and growth trend for the {industry} sector
- Name the main competitors or substitutes
- Note recent trends, regulations, or demand shifts that matter
- Keep it to one or two concise paragraphs
- Prefer recent, verifiable information and cite sources where available"#,
        brief = project_brief(input),
        industry = input.industry
    )
}

pub fn deep_analysis_prompt(input: &ProjectInput, market_summary: &str) -> String {
    format!(
        r#"You are a senior business consultant. Write a comprehensive feasibility report for this project.

{brief}

Market Research Context:
{market_summary}

Requirements:
- Use markdown with headers
- Include: Executive Summary, Market Fit, Financial Viability (given the stated budget), Timeline Realism, Key Risks with mitigations, and a final Verdict (Go / Go with changes / No-Go)
- Ground market claims in the research context above
- Be specific and actionable"#,
        brief = project_brief(input),
        market_summary = market_summary
    )
}
