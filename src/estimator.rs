//! Estimator orchestration: a debounced background feasibility check and an explicit estimate.
//!
//! The two flows are independent and may overlap. Each response carries the generation of
//! the request that produced it and is applied only while that generation is still current.

use crate::error::GatewayError;
use crate::gateway::ModelGateway;
use crate::models::{EstimationResult, FeasibilityResult, ProjectInputs};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

pub const ESTIMATE_FAILED_NOTICE: &str = "Estimation failed. Please try again.";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatorSnapshot {
    /// Latest inputs as edited by the user.
    pub inputs: ProjectInputs,
    pub feasibility_checking: bool,
    pub feasibility: Option<FeasibilityResult>,
    /// Inputs the displayed feasibility verdict was computed for.
    pub feasibility_inputs: Option<ProjectInputs>,
    pub estimating: bool,
    pub estimate: Option<EstimationResult>,
    pub estimate_inputs: Option<ProjectInputs>,
    pub estimate_error: Option<String>,
}

pub struct EstimatorWorkspace {
    gateway: ModelGateway,
    debounce: Duration,
    state: watch::Sender<EstimatorSnapshot>,
    edit_generation: AtomicU64,
    feasibility_generation: AtomicU64,
    estimate_generation: AtomicU64,
}

impl EstimatorWorkspace {
    pub fn new(gateway: ModelGateway, debounce: Duration) -> Self {
        let (state, _) = watch::channel(EstimatorSnapshot::default());
        Self {
            gateway,
            debounce,
            state,
            edit_generation: AtomicU64::new(0),
            feasibility_generation: AtomicU64::new(0),
            estimate_generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> EstimatorSnapshot {
        self.state.borrow().clone()
    }

    /// Records an input edit and (re)arms the debounce timer.
    ///
    /// Only the last edit within the quiet period fires a check, and only when the inputs are
    /// complete enough to judge.
    pub fn update_inputs(self: &Arc<Self>, inputs: ProjectInputs) -> u64 {
        let edit = self.edit_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|snapshot| snapshot.inputs = inputs.clone());

        let workspace = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(workspace.debounce).await;
            if workspace.edit_generation.load(Ordering::SeqCst) != edit {
                debug!(edit, "Debounced feasibility check superseded by a later edit");
                return;
            }
            if !inputs.is_checkable() {
                debug!(edit, "Skipping feasibility check for incomplete inputs");
                return;
            }
            workspace.feasibility_job(inputs).await;
        });
        edit
    }

    /// Whether a check or an estimate is still waiting on the gateway.
    pub fn is_busy(&self) -> bool {
        let snapshot = self.state.borrow();
        snapshot.feasibility_checking || snapshot.estimating
    }

    /// `runFeasibilityCheck`: soft-fails into an "unavailable" verdict and never errors.
    ///
    /// The check runs on its own task, so dropping the returned future does not leave the
    /// workspace marked as checking.
    #[instrument(skip(self, inputs), fields(location = %inputs.location))]
    pub async fn run_feasibility_check(self: &Arc<Self>, inputs: ProjectInputs) -> FeasibilityResult {
        let job = tokio::spawn(Arc::clone(self).feasibility_job(inputs));
        match job.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => FeasibilityResult::unavailable(format!("Feasibility check interrupted: {e}")),
        }
    }

    async fn feasibility_job(self: Arc<Self>, inputs: ProjectInputs) -> FeasibilityResult {
        let generation = self.feasibility_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|snapshot| snapshot.feasibility_checking = true);

        let result = self.gateway.check_feasibility(&inputs).await;

        let applied = self.state.send_if_modified(|snapshot| {
            if self.feasibility_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            snapshot.feasibility_checking = false;
            snapshot.feasibility = Some(result.clone());
            snapshot.feasibility_inputs = Some(inputs.clone());
            true
        });
        if applied {
            info!(score = result.score, verdict = ?result.budget_verdict, "Feasibility verdict updated");
        } else {
            debug!(generation, "Discarding stale feasibility response");
        }
        result
    }

    /// `runEstimate`: replaces any prior estimate. Failures are recorded as a notice and
    /// returned to the caller.
    ///
    /// Like the feasibility check, the estimate finishes and is recorded even if the caller
    /// stops waiting.
    #[instrument(skip(self, inputs), fields(location = %inputs.location))]
    pub async fn run_estimate(
        self: &Arc<Self>,
        inputs: ProjectInputs,
    ) -> Result<EstimationResult, GatewayError> {
        let job = tokio::spawn(Arc::clone(self).estimate_job(inputs));
        match job.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(GatewayError::UpstreamUnavailable(format!(
                "estimate interrupted: {e}"
            ))),
        }
    }

    async fn estimate_job(
        self: Arc<Self>,
        inputs: ProjectInputs,
    ) -> Result<EstimationResult, GatewayError> {
        let generation = self.estimate_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|snapshot| {
            snapshot.estimating = true;
            snapshot.estimate = None;
            snapshot.estimate_error = None;
            snapshot.estimate_inputs = Some(inputs.clone());
        });

        let outcome = self.gateway.estimate(&inputs).await;

        self.state.send_if_modified(|snapshot| {
            if self.estimate_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            snapshot.estimating = false;
            match &outcome {
                Ok(result) => snapshot.estimate = Some(result.clone()),
                Err(_) => snapshot.estimate_error = Some(ESTIMATE_FAILED_NOTICE.to_string()),
            }
            true
        });

        if let Err(e) = &outcome {
            warn!("Estimate failed: {}", e);
        }
        outcome
    }
}
