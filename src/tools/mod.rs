pub mod json;
pub mod llm;

pub use json::{parse_json_object, strip_code_fence};
pub use llm::{Completion, CompletionRequest, LlmBackend, OpenRouterClient, Purpose, WireMessage, WireRole};
