//! Project feasibility studio: drives LLM-backed construction estimates, business feasibility
//! studies, and an assistant chat over an OpenAI-compatible chat-completion gateway.

pub mod analysis;
pub mod chat;
pub mod config;
pub mod error;
pub mod estimator;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod server;
pub mod tasks;
pub mod tools;
pub mod views;

pub use analysis::{transition, AnalysisEvent, AnalysisStage, AnalysisState};
pub use error::{GatewayError, HardFailure, InputError, SoftFailure};
pub use gateway::{ModelGateway, RetryPolicy};
pub use orchestrator::{start_analysis, AnalysisBoard, AnalysisPipeline};
