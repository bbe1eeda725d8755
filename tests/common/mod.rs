#![allow(dead_code)]

use async_trait::async_trait;
use feasibility_studio::error::GatewayError;
use feasibility_studio::tools::{Completion, CompletionRequest, LlmBackend, Purpose};
use feasibility_studio::ModelGateway;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct Scripted {
    delay: Duration,
    outcome: Result<Completion, GatewayError>,
}

/// In-process backend answering from per-purpose scripts. The last scripted answer for a
/// purpose repeats once the script runs out.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<Purpose, VecDeque<Scripted>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, purpose: Purpose, delay: Duration, outcome: Result<Completion, GatewayError>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(purpose)
            .or_default()
            .push_back(Scripted { delay, outcome });
        self
    }

    pub fn reply(self, purpose: Purpose, text: &str) -> Self {
        self.push(purpose, Duration::ZERO, Ok(Completion::text(text)))
    }

    pub fn reply_after(self, purpose: Purpose, delay: Duration, text: &str) -> Self {
        self.push(purpose, delay, Ok(Completion::text(text)))
    }

    pub fn reply_completion(self, purpose: Purpose, completion: Completion) -> Self {
        self.push(purpose, Duration::ZERO, Ok(completion))
    }

    pub fn fail(self, purpose: Purpose, error: GatewayError) -> Self {
        self.push(purpose, Duration::ZERO, Err(error))
    }

    pub fn calls(&self, purpose: Purpose) -> usize {
        self.requests(purpose).len()
    }

    pub fn requests(&self, purpose: Purpose) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.purpose == purpose)
            .cloned()
            .collect()
    }

    pub fn into_gateway(self) -> (Arc<ScriptedBackend>, ModelGateway) {
        let backend = Arc::new(self);
        let gateway = ModelGateway::new(backend.clone());
        (backend, gateway)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let purpose = request.purpose;
        self.requests.lock().unwrap().push(request);

        let scripted = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&purpose) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match scripted {
            Some(Scripted { delay, outcome }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => Err(GatewayError::UpstreamUnavailable(format!(
                "no scripted response for {purpose}"
            ))),
        }
    }
}

pub fn market_completion(summary: &str, sources: &[(&str, &str)]) -> Completion {
    use feasibility_studio::models::{GroundingSource, WebSource};
    Completion {
        text: summary.to_string(),
        citations: sources
            .iter()
            .map(|(uri, title)| GroundingSource {
                web: Some(WebSource {
                    uri: uri.to_string(),
                    title: title.to_string(),
                }),
            })
            .collect(),
    }
}
