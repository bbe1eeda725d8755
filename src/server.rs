use crate::chat::{ChatError, ChatSession};
use crate::error::InputError;
use crate::estimator::{EstimatorWorkspace, ESTIMATE_FAILED_NOTICE};
use crate::gateway::ModelGateway;
use crate::models::{FeasibilityResult, ProjectInput, ProjectInputs};
use crate::orchestrator::{start_analysis, AnalysisBoard, AnalysisPipeline};
use crate::views::{self, AnalysisView, ChatView, Dashboard, EstimatorView};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, instrument};

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// Everything one user session owns: the analysis board, the estimator and the chat log.
pub struct Workspace {
    pub analysis: Arc<AnalysisBoard>,
    pub estimator: Arc<EstimatorWorkspace>,
    pub chat: Arc<ChatSession>,
    /// Milliseconds since [`AppState`] was created, as of the last request.
    last_seen_ms: AtomicU64,
}

impl Workspace {
    fn new(gateway: &ModelGateway, debounce: Duration, now_ms: u64) -> Self {
        Self {
            analysis: Arc::new(AnalysisBoard::new()),
            estimator: Arc::new(EstimatorWorkspace::new(gateway.clone(), debounce)),
            chat: Arc::new(ChatSession::new(gateway.clone())),
            last_seen_ms: AtomicU64::new(now_ms),
        }
    }

    fn touch(&self, now_ms: u64) {
        self.last_seen_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    /// Work still waiting on the gateway keeps a workspace alive.
    fn is_busy(&self) -> bool {
        self.analysis.snapshot().state.stage.is_in_progress()
            || self.estimator.is_busy()
            || self.chat.is_pending()
    }
}

#[derive(Clone)]
pub struct AppState {
    gateway: ModelGateway,
    pipeline: Arc<AnalysisPipeline>,
    workspaces: Arc<DashMap<String, Arc<Workspace>>>,
    debounce: Duration,
    idle_ttl: Duration,
    epoch: Instant,
}

impl AppState {
    pub fn new(gateway: ModelGateway, debounce: Duration) -> Self {
        Self {
            pipeline: Arc::new(AnalysisPipeline::new(gateway.clone())),
            gateway,
            workspaces: Arc::new(DashMap::new()),
            debounce,
            idle_ttl: DEFAULT_IDLE_TTL,
            epoch: Instant::now(),
        }
    }

    /// Workspaces untouched for longer than `ttl` are dropped by [`AppState::evict_idle`].
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn workspace(&self, id: &str) -> Option<Arc<Workspace>> {
        let workspace = self.workspaces.get(id).map(|entry| Arc::clone(entry.value()))?;
        workspace.touch(self.now_ms());
        Some(workspace)
    }

    fn workspace_or_create(&self, id: &str) -> Arc<Workspace> {
        let now_ms = self.now_ms();
        let entry = self.workspaces.entry(id.to_string()).or_insert_with(|| {
            info!("Opening workspace {}", id);
            Arc::new(Workspace::new(&self.gateway, self.debounce, now_ms))
        });
        let workspace = Arc::clone(entry.value());
        drop(entry);
        workspace.touch(now_ms);
        workspace
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }

    /// Drops idle workspaces and returns how many went.
    pub fn evict_idle(&self) -> usize {
        let now_ms = self.now_ms();
        let ttl_ms = self.idle_ttl.as_millis() as u64;
        let before = self.workspaces.len();
        self.workspaces.retain(|id, workspace| {
            let idle_ms = now_ms.saturating_sub(workspace.last_seen_ms.load(Ordering::Relaxed));
            let keep = idle_ms < ttl_ms || workspace.is_busy();
            if !keep {
                debug!(idle_ms, "Evicting idle workspace {}", id);
            }
            keep
        });
        before.saturating_sub(self.workspaces.len())
    }

    /// Runs [`AppState::evict_idle`] every `every` in the background.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = state.evict_idle();
                if evicted > 0 {
                    info!(evicted, remaining = state.workspace_count(), "Evicted idle workspaces");
                }
            }
        })
    }
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(workspace: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("workspace {workspace} not found"),
        }
    }
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workspaces/:id", delete(close_workspace))
        .route("/workspaces/:id/analysis", post(start).get(analysis))
        .route("/workspaces/:id/estimator", get(estimator))
        .route("/workspaces/:id/estimator/inputs", put(update_inputs))
        .route("/workspaces/:id/estimate", post(estimate))
        .route("/workspaces/:id/feasibility", post(feasibility))
        .route("/workspaces/:id/chat", get(chat_thread).post(chat_send))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn close_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .workspaces
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(&id))?;
    info!("Closed workspace {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisStarted {
    generation: u64,
}

#[instrument(skip(state, input))]
async fn start(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ProjectInput>,
) -> (StatusCode, Json<AnalysisStarted>) {
    let workspace = state.workspace_or_create(&id);
    let generation = start_analysis(
        Arc::clone(&state.pipeline),
        Arc::clone(&workspace.analysis),
        input,
    );
    info!(generation, "Analysis started");
    (StatusCode::ACCEPTED, Json(AnalysisStarted { generation }))
}

async fn analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisView>, ApiError> {
    let workspace = state.workspace(&id).ok_or_else(|| ApiError::not_found(&id))?;
    let snapshot = workspace.analysis.snapshot();
    Ok(Json(views::analysis_view(snapshot.generation, &snapshot.state)))
}

async fn estimator(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EstimatorView>, ApiError> {
    let workspace = state.workspace(&id).ok_or_else(|| ApiError::not_found(&id))?;
    Ok(Json(views::estimator_view(&workspace.estimator.snapshot())))
}

async fn update_inputs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(inputs): Json<ProjectInputs>,
) -> Result<(StatusCode, Json<EstimatorView>), ApiError> {
    inputs.check_bounds()?;
    let workspace = state.workspace_or_create(&id);
    workspace.estimator.update_inputs(inputs);
    Ok((
        StatusCode::ACCEPTED,
        Json(views::estimator_view(&workspace.estimator.snapshot())),
    ))
}

#[instrument(skip(state, inputs))]
async fn estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(inputs): Json<ProjectInputs>,
) -> Result<Json<Dashboard>, ApiError> {
    inputs.validate()?;
    let workspace = state.workspace_or_create(&id);
    let location = inputs.location.clone();
    let budget_limit = inputs.budget_limit;

    match workspace.estimator.run_estimate(inputs).await {
        Ok(result) => Ok(Json(views::dashboard(&result, &location, budget_limit))),
        Err(e) => Err(ApiError {
            status: StatusCode::BAD_GATEWAY,
            message: format!("{ESTIMATE_FAILED_NOTICE} ({e})"),
        }),
    }
}

async fn feasibility(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(inputs): Json<ProjectInputs>,
) -> Result<Json<FeasibilityResult>, ApiError> {
    inputs.validate()?;
    let workspace = state.workspace_or_create(&id);
    Ok(Json(workspace.estimator.run_feasibility_check(inputs).await))
}

async fn chat_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatView>, ApiError> {
    let workspace = state.workspace(&id).ok_or_else(|| ApiError::not_found(&id))?;
    Ok(Json(views::chat_view(&workspace.chat.thread())))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatReply {
    #[serde(flatten)]
    thread: ChatView,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[instrument(skip(state, request))]
async fn chat_send(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatReply>), ApiError> {
    let workspace = state.workspace_or_create(&id);
    let (status, error) = match workspace.chat.send(&request.text).await {
        Ok(_) => (StatusCode::OK, None),
        Err(ChatError::EmptyMessage) => {
            return Err(ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: ChatError::EmptyMessage.to_string(),
            })
        }
        Err(e @ (ChatError::Gateway(_) | ChatError::Interrupted(_))) => {
            (StatusCode::BAD_GATEWAY, Some(e.to_string()))
        }
    };
    let thread = views::chat_view(&workspace.chat.thread());
    Ok((status, Json(ChatReply { thread, error })))
}
