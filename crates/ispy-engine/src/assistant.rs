//! Scripted chat assistant.
//!
//! `Idle ⇄ AwaitingReply`. A reply is scheduled with a random thinking
//! latency and carries a token; clearing, stopping or a re-entrant send
//! drops the token so the late timer appends nothing.

use crate::events::EventBus;
use crate::responses::{ResponseTable, WELCOME_MESSAGE};
use crate::sim::{make_rng, sample_range, STREAM_ASSISTANT};
use ispy_shared::config::{IspyConfig, TimingConfig};
use ispy_shared::ChatMessage;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Result of `send_message`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing changed
    Ignored,
    /// A reply was pending; it has been cancelled and the text discarded
    Cancelled,
    /// User message appended, reply scheduled
    Queued,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssistantEvent {
    MessageAppended(ChatMessage),
    ThinkingStarted,
    ReplyCancelled,
    Cleared,
}

struct AssistantState {
    transcript: Vec<ChatMessage>,
    /// Token of the reply currently awaited
    pending: Option<u64>,
    next_token: u64,
    rng: StdRng,
}

/// Owned handle over the conversation. Clones share the same transcript.
#[derive(Clone)]
pub struct ChatAssistant {
    state: Arc<RwLock<AssistantState>>,
    responses: Arc<ResponseTable>,
    timing: TimingConfig,
    events: EventBus<AssistantEvent>,
}

impl ChatAssistant {
    pub fn new(config: &IspyConfig) -> Self {
        Self::with_responses(config, ResponseTable::standard())
    }

    pub fn with_responses(config: &IspyConfig, responses: ResponseTable) -> Self {
        let state = AssistantState {
            transcript: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            pending: None,
            next_token: 0,
            rng: make_rng(config.seed, STREAM_ASSISTANT),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            responses: Arc::new(responses),
            timing: config.timing.clone(),
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.state.read().await.transcript.clone()
    }

    pub async fn is_processing(&self) -> bool {
        self.state.read().await.pending.is_some()
    }

    /// Send user text. See `SendOutcome` for the three possible results.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let (token, delay) = {
            let mut state = self.state.write().await;
            if state.pending.take().is_some() {
                debug!("Reply pending, send treated as cancel");
                self.events.emit(AssistantEvent::ReplyCancelled);
                return SendOutcome::Cancelled;
            }

            let message = ChatMessage::user(text);
            state.transcript.push(message.clone());
            self.events.emit(AssistantEvent::MessageAppended(message));

            state.next_token += 1;
            let token = state.next_token;
            state.pending = Some(token);
            let units = sample_range(&mut state.rng, self.timing.reply_latency_units);
            (token, self.timing.duration(units))
        };
        self.events.emit(AssistantEvent::ThinkingStarted);

        let this = self.clone();
        let input = text.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.deliver_reply(token, &input).await;
        });

        SendOutcome::Queued
    }

    /// Cancel a pending reply without appending one.
    /// Returns whether a reply was pending.
    pub async fn stop_processing(&self) -> bool {
        let cancelled = self.state.write().await.pending.take().is_some();
        if cancelled {
            info!("Assistant reply cancelled");
            self.events.emit(AssistantEvent::ReplyCancelled);
        }
        cancelled
    }

    /// Reset the transcript to the welcome message
    pub async fn clear_chat(&self) {
        let mut state = self.state.write().await;
        state.pending = None;
        state.transcript.clear();
        state.transcript.push(ChatMessage::assistant(WELCOME_MESSAGE));
        self.events.emit(AssistantEvent::Cleared);
    }

    /// Resolve once no reply is pending
    pub async fn wait_until_idle(&self) {
        let mut rx = self.events.subscribe();
        loop {
            if !self.is_processing().await {
                return;
            }
            match rx.recv().await {
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    async fn deliver_reply(&self, token: u64, input: &str) {
        let mut state = self.state.write().await;
        if state.pending != Some(token) {
            debug!("Dropping stale reply");
            return;
        }
        state.pending = None;

        let reply = ChatMessage::assistant(self.responses.reply_for(input));
        info!("Assistant replied ({} chars)", reply.content.len());
        state.transcript.push(reply.clone());
        self.events.emit(AssistantEvent::MessageAppended(reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_starts_with_welcome() {
        let assistant = ChatAssistant::new(&IspyConfig::default());
        let transcript = assistant.transcript().await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].content, WELCOME_MESSAGE);
        assert!(!assistant.is_processing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_ignored() {
        let assistant = ChatAssistant::new(&IspyConfig::default());
        assert_eq!(assistant.send_message("   \n\t").await, SendOutcome::Ignored);
        assert_eq!(assistant.transcript().await.len(), 1);
        assert!(!assistant.is_processing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_when_idle_is_noop() {
        let assistant = ChatAssistant::new(&IspyConfig::default());
        assert!(!assistant.stop_processing().await);
        assert_eq!(assistant.transcript().await.len(), 1);
    }
}
