use crate::analysis::{transition, AnalysisEvent, AnalysisStage, AnalysisState};
use crate::gateway::ModelGateway;
use crate::models::{MarketResearchResult, ProjectInput};
use crate::tasks::{keys, DeepAnalysisTask, MarketResearchTask, QuickScanTask};
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// The quick scan → market research → deep analysis study, run on a graph-flow graph.
pub struct AnalysisPipeline {
    runner: FlowRunner,
    storage: Arc<dyn SessionStorage>,
}

impl AnalysisPipeline {
    pub fn new(gateway: ModelGateway) -> Self {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());

        let graph = GraphBuilder::new("feasibility_study")
            .add_task(Arc::new(QuickScanTask::new(gateway.clone())))
            .add_task(Arc::new(MarketResearchTask::new(gateway.clone())))
            .add_task(Arc::new(DeepAnalysisTask::new(gateway)))
            .add_edge(QuickScanTask::ID, MarketResearchTask::ID)
            .add_edge(MarketResearchTask::ID, DeepAnalysisTask::ID)
            .build();

        let runner = FlowRunner::new(Arc::new(graph), storage.clone());
        Self { runner, storage }
    }

    /// Runs one study to a terminal stage, handing every new state to `publish` as soon as it
    /// exists. Stages run strictly one after another; the first failure ends the run in `ERROR`.
    #[instrument(skip_all, fields(project = %input.name))]
    pub async fn run<F>(&self, input: ProjectInput, mut publish: F) -> AnalysisState
    where
        F: FnMut(&AnalysisState) + Send,
    {
        let start_time = std::time::Instant::now();
        let session_id = Uuid::new_v4().to_string();
        let mut state = AnalysisState::default();

        info!("Starting feasibility study in session {}", session_id);
        advance(&mut state, AnalysisEvent::Started(input.clone()), &mut publish);

        let session = Session::new_from_task(session_id.clone(), QuickScanTask::ID);
        session.context.set(keys::PROJECT_INPUT, input).await;
        if let Err(e) = self.storage.save(session).await {
            error!("Could not store analysis session: {}", e);
            advance(&mut state, AnalysisEvent::Failed(e.to_string()), &mut publish);
            return state;
        }

        while state.stage.is_in_progress() {
            let result = match self.runner.run(&session_id).await {
                Ok(result) => result,
                Err(e) => {
                    error!(stage = %state.stage, "Analysis stage failed: {}", e);
                    advance(&mut state, AnalysisEvent::Failed(e.to_string()), &mut publish);
                    break;
                }
            };

            match result.status {
                ExecutionStatus::Error(e) => {
                    error!(stage = %state.stage, "Analysis stage failed: {}", e);
                    advance(&mut state, AnalysisEvent::Failed(e.to_string()), &mut publish);
                }
                ExecutionStatus::Paused { .. } | ExecutionStatus::Completed => {
                    let event = match self.stage_output(&session_id, state.stage).await {
                        Ok(event) => event,
                        Err(message) => AnalysisEvent::Failed(message),
                    };
                    advance(&mut state, event, &mut publish);
                }
                _ => {
                    warn!("Analysis graph stopped unexpectedly at {}", state.stage);
                    advance(
                        &mut state,
                        AnalysisEvent::Failed("analysis stopped unexpectedly".to_string()),
                        &mut publish,
                    );
                }
            }
        }

        self.log_task_times(&session_id).await;
        if let Err(e) = self.storage.delete(&session_id).await {
            debug!("Could not drop analysis session {}: {}", session_id, e);
        }

        info!(
            stage = %state.stage,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Feasibility study finished"
        );
        state
    }

    /// Reads what the task for `stage` left in the session context.
    async fn stage_output(
        &self,
        session_id: &str,
        stage: AnalysisStage,
    ) -> Result<AnalysisEvent, String> {
        let session = self
            .storage
            .get(session_id)
            .await
            .map_err(|e| format!("could not load analysis session: {e}"))?
            .ok_or_else(|| "analysis session disappeared".to_string())?;
        let context = &session.context;

        let event = match stage {
            AnalysisStage::QuickScan => context
                .get::<String>(keys::QUICK_SCAN)
                .await
                .map(AnalysisEvent::QuickScanCompleted),
            AnalysisStage::MarketResearch => context
                .get::<MarketResearchResult>(keys::MARKET_RESEARCH)
                .await
                .map(AnalysisEvent::MarketResearchCompleted),
            AnalysisStage::DeepThinking => context
                .get::<String>(keys::DEEP_ANALYSIS)
                .await
                .map(AnalysisEvent::DeepAnalysisCompleted),
            other => return Err(format!("no task runs in stage {other}")),
        };
        event.ok_or_else(|| format!("stage {stage} produced no result"))
    }

    async fn log_task_times(&self, session_id: &str) {
        if let Ok(Some(session)) = self.storage.get(session_id).await {
            let task_times: HashMap<String, u64> =
                session.context.get(keys::TASK_TIMES).await.unwrap_or_default();
            debug!(?task_times, "Analysis task timings");
        }
    }
}

fn advance<F>(state: &mut AnalysisState, event: AnalysisEvent, publish: &mut F)
where
    F: FnMut(&AnalysisState),
{
    match transition(state, event) {
        Ok(next) => {
            debug!(from = %state.stage, to = %next.stage, "Analysis stage transition");
            *state = next;
            publish(state);
        }
        Err(e) => warn!("Ignoring analysis event: {}", e),
    }
}

/// Latest analysis state shown to one user, tagged with the run that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    pub generation: u64,
    pub state: AnalysisState,
}

/// The user's view of the analysis. Starting a run bumps the generation; publications from
/// older runs are dropped so a superseded run can never overwrite the current one.
pub struct AnalysisBoard {
    slot: watch::Sender<BoardSnapshot>,
}

impl Default for AnalysisBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisBoard {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(BoardSnapshot::default());
        Self { slot }
    }

    /// Opens a new run and returns its generation.
    pub fn begin(&self) -> u64 {
        let mut generation = 0;
        self.slot.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.state = AnalysisState::default();
            generation = snapshot.generation;
        });
        generation
    }

    /// Applies `state` if `generation` is still current. Returns whether it was applied.
    pub fn publish(&self, generation: u64, state: &AnalysisState) -> bool {
        self.slot.send_if_modified(|snapshot| {
            if snapshot.generation != generation {
                return false;
            }
            snapshot.state = state.clone();
            true
        })
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.slot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.slot.subscribe()
    }
}

/// `startAnalysis`: opens a new generation on `board` and drives the study in the background.
pub fn start_analysis(
    pipeline: Arc<AnalysisPipeline>,
    board: Arc<AnalysisBoard>,
    input: ProjectInput,
) -> u64 {
    let generation = board.begin();
    tokio::spawn(async move {
        pipeline
            .run(input, |state| {
                if !board.publish(generation, state) {
                    debug!(generation, stage = %state.stage, "Dropping update from superseded run");
                }
            })
            .await;
    });
    generation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(stage: AnalysisStage) -> AnalysisState {
        AnalysisState {
            stage,
            ..Default::default()
        }
    }

    #[test]
    fn board_applies_only_current_generation() {
        let board = AnalysisBoard::new();
        let first = board.begin();
        assert!(board.publish(first, &state_at(AnalysisStage::QuickScan)));

        let second = board.begin();
        assert_eq!(second, first + 1);
        assert_eq!(board.snapshot().state.stage, AnalysisStage::Idle);

        assert!(!board.publish(first, &state_at(AnalysisStage::Complete)));
        assert!(board.publish(second, &state_at(AnalysisStage::MarketResearch)));

        let snapshot = board.snapshot();
        assert_eq!(snapshot.generation, second);
        assert_eq!(snapshot.state.stage, AnalysisStage::MarketResearch);
    }

    #[test]
    fn subscribers_see_updates() {
        let board = AnalysisBoard::new();
        let mut receiver = board.subscribe();
        let generation = board.begin();
        board.publish(generation, &state_at(AnalysisStage::QuickScan));

        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().state.stage, AnalysisStage::QuickScan);
    }
}
