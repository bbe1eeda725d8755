use crate::error::GatewayError;
use crate::gateway::ModelGateway;
use crate::models::ChatMessage;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{info, instrument, warn};

pub const GREETING: &str = "Hello! I am your construction AI assistant. Ask me anything about materials, regulations, or cost optimization.";
pub const ERROR_NOTICE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("chat turn interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatThread {
    pub messages: Vec<ChatMessage>,
    pub pending: bool,
}

/// Append-only conversation with the assistant. Turns are taken one at a time.
pub struct ChatSession {
    gateway: ModelGateway,
    thread: watch::Sender<ChatThread>,
    turn: Mutex<()>,
}

impl ChatSession {
    pub fn new(gateway: ModelGateway) -> Self {
        let (thread, _) = watch::channel(ChatThread {
            messages: vec![ChatMessage::model(GREETING)],
            pending: false,
        });
        Self {
            gateway,
            thread,
            turn: Mutex::new(()),
        }
    }

    pub fn thread(&self) -> ChatThread {
        self.thread.borrow().clone()
    }

    /// Whether a reply is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.thread.borrow().pending
    }

    /// Appends the user's message, asks the gateway, and appends the reply.
    ///
    /// On failure the user's message stays in the log, followed by [`ERROR_NOTICE`], and the
    /// error is returned. The turn runs on its own task: once accepted, it completes and lands
    /// in the log even if the caller stops waiting.
    #[instrument(skip(self, text))]
    pub async fn send(self: &Arc<Self>, text: &str) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let turn = tokio::spawn(Arc::clone(self).take_turn(text.to_string()));
        match turn.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ChatError::Interrupted(e.to_string())),
        }
    }

    async fn take_turn(self: Arc<Self>, text: String) -> Result<ChatMessage, ChatError> {
        let _turn = self.turn.lock().await;
        let history = self.thread.borrow().messages.clone();
        let user_message = ChatMessage::user(text);
        self.thread.send_modify(|thread| {
            thread.messages.push(user_message.clone());
            thread.pending = true;
        });

        match self.gateway.send_chat_message(&history, &user_message.text).await {
            Ok(reply) => {
                let reply = ChatMessage::model(reply);
                info!("Assistant replied with {} characters", reply.text.len());
                self.thread.send_modify(|thread| {
                    thread.messages.push(reply.clone());
                    thread.pending = false;
                });
                Ok(reply)
            }
            Err(e) => {
                warn!("Chat message failed: {}", e);
                self.thread.send_modify(|thread| {
                    thread.messages.push(ChatMessage::model(ERROR_NOTICE));
                    thread.pending = false;
                });
                Err(e.into())
            }
        }
    }
}
