//! Model Gateway: one structured request in, one chat-completion call out, one typed result back.

pub mod coerce;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, HardFailure, SoftFailure};
use crate::models::{
    ChatMessage, ChatRole, EstimationResult, FeasibilityResult, MarketResearchResult,
    ProjectInput, ProjectInputs,
};
use crate::prompts::{self, BudgetPolicy};
use crate::tools::json::parse_json_object;
use crate::tools::llm::{Completion, CompletionRequest, LlmBackend, Purpose, WireMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Call-site policies. Background checks recover; user-triggered actions propagate.
pub const FEASIBILITY_POLICY: SoftFailure = SoftFailure;
pub const PRIMARY_ACTION_POLICY: HardFailure = HardFailure;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Clone)]
pub struct ModelGateway {
    backend: Arc<dyn LlmBackend>,
    policy: BudgetPolicy,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            policy: BudgetPolicy::default(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Issues one logical call, retrying only network failures within the retry budget.
    async fn call(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let purpose = request.purpose;
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            match self.backend.complete(request.clone()).await {
                Ok(completion) => {
                    info!(
                        %purpose,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        chars = completion.text.len(),
                        "Gateway call succeeded"
                    );
                    return Ok(completion);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(%purpose, attempt, ?delay, "Gateway call failed, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        %purpose,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Gateway call failed: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Budget and labour sanity check. Never fails: any gateway or parse failure yields
    /// [`FeasibilityResult::unavailable`].
    #[instrument(skip(self, inputs), fields(location = %inputs.location))]
    pub async fn check_feasibility(&self, inputs: &ProjectInputs) -> FeasibilityResult {
        let prompt = prompts::feasibility_prompt(inputs, &self.policy);
        let request = CompletionRequest::prompt(Purpose::Feasibility, prompt).json_object();

        let outcome = self
            .call(request)
            .await
            .and_then(|completion| parse_json_object(&completion.text))
            .map(|value| coerce::feasibility_from_value(&value));

        FEASIBILITY_POLICY.settle(outcome, |e| {
            warn!("Feasibility check failed, reporting unavailable: {}", e);
            FeasibilityResult::unavailable(format!("Service unavailable or parse error: {e}"))
        })
    }

    /// Full cost estimate. Failures propagate; there is no safe default estimate.
    #[instrument(skip(self, inputs), fields(location = %inputs.location, months = inputs.timeline_months))]
    pub async fn estimate(&self, inputs: &ProjectInputs) -> Result<EstimationResult, GatewayError> {
        let prompt = prompts::estimate_prompt(inputs);
        let request = CompletionRequest::prompt(Purpose::Estimate, prompt).json_object();

        let outcome = self
            .call(request)
            .await
            .and_then(|completion| parse_json_object(&completion.text))
            .map(|value| coerce::estimation_from_value(&value, inputs.timeline_months));

        let result = PRIMARY_ACTION_POLICY.settle(outcome)?;
        if !result.adjustments.is_empty() {
            warn!(adjustments = ?result.adjustments, "Estimate needed local corrections");
        }
        Ok(result)
    }

    #[instrument(skip(self, input), fields(project = %input.name))]
    pub async fn run_quick_scan(&self, input: &ProjectInput) -> Result<String, GatewayError> {
        let request = CompletionRequest::prompt(Purpose::QuickScan, prompts::quick_scan_prompt(input));
        let completion = PRIMARY_ACTION_POLICY.settle(self.call(request).await)?;
        Ok(completion.text.trim().to_string())
    }

    #[instrument(skip(self, input), fields(project = %input.name))]
    pub async fn run_market_research(
        &self,
        input: &ProjectInput,
    ) -> Result<MarketResearchResult, GatewayError> {
        let request = CompletionRequest::prompt(
            Purpose::MarketResearch,
            prompts::market_research_prompt(input),
        )
        .with_web_search();
        let completion = PRIMARY_ACTION_POLICY.settle(self.call(request).await)?;

        info!("Market research returned {} sources", completion.citations.len());
        Ok(MarketResearchResult {
            summary: completion.text.trim().to_string(),
            sources: completion.citations,
        })
    }

    #[instrument(skip(self, input, market_summary), fields(project = %input.name))]
    pub async fn run_deep_analysis(
        &self,
        input: &ProjectInput,
        market_summary: &str,
    ) -> Result<String, GatewayError> {
        let request = CompletionRequest::prompt(
            Purpose::DeepAnalysis,
            prompts::deep_analysis_prompt(input, market_summary),
        );
        let completion = PRIMARY_ACTION_POLICY.settle(self.call(request).await)?;
        Ok(completion.text.trim().to_string())
    }

    /// Sends `message` after the prior conversation. `history` must not contain `message`.
    #[instrument(skip(self, history, message), fields(turns = history.len()))]
    pub async fn send_chat_message(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, GatewayError> {
        let request = CompletionRequest::conversation(Purpose::Chat, chat_messages(history, message));
        let completion = PRIMARY_ACTION_POLICY.settle(self.call(request).await)?;
        Ok(completion.text.trim().to_string())
    }
}

/// Maps the chat log onto gateway roles and appends the new user turn last.
pub fn chat_messages(history: &[ChatMessage], message: &str) -> Vec<WireMessage> {
    history
        .iter()
        .map(|entry| match entry.role {
            ChatRole::Model => WireMessage::assistant(entry.text.clone()),
            ChatRole::User => WireMessage::user(entry.text.clone()),
        })
        .chain(std::iter::once(WireMessage::user(message)))
        .collect()
}
