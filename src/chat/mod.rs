pub mod cooldown;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ChatSettings;
use crate::model::{Gateway, GatewayError};
use cooldown::{Cooldown, CooldownTicker};

/// Assistant reply recorded when an exchange fails.
pub const FALLBACK_REPLY: &str =
    "I apologize, but I'm having trouble responding right now. Please try again.";

/// Predefined questions offered by the chat widget.
pub const QUICK_QUESTIONS: [&str; 4] = [
    "Detect crop disease",
    "Fertilizer schedule",
    "Groundwater levels",
    "Market prices",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
}

impl ChatMessage {
    fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Assistant,
        }
    }
}

/// Local rejection of a submit or draft update. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a message.")]
    Empty,

    #[error("Message exceeds the {limit} character limit.")]
    OverLimit { limit: usize },

    #[error("Please wait {remaining_secs} seconds before sending another message.")]
    Cooldown { remaining_secs: u64 },

    #[error("Please wait for the current response.")]
    Pending,
}

impl ValidationError {
    /// Translation key for the localized form of this message.
    pub fn key(&self) -> &'static str {
        match self {
            ValidationError::Empty => "chatbot.errorEmpty",
            ValidationError::OverLimit { .. } => "chatbot.errorLimit",
            ValidationError::Cooldown { .. } => "chatbot.errorCooldown",
            ValidationError::Pending => "chatbot.errorPending",
        }
    }
}

/// An accepted submit whose exchange has not resolved yet.
#[derive(Debug)]
#[must_use = "a pending exchange must be passed back to ChatSession::complete"]
pub struct PendingExchange {
    text: String,
}

impl PendingExchange {
    /// The user text to hand to the gateway.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Read-only projection handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub history: Vec<ChatMessage>,
    pub draft: String,
    pub is_pending: bool,
    pub last_error: Option<String>,
    pub cooldown_remaining_secs: u64,
    pub character_limit: usize,
}

/// Client-side state of one chat conversation.
///
/// At most one exchange is in flight at a time. The cooldown is a UX
/// affordance, not an abuse control: it is enforced only by this process.
pub struct ChatSession {
    settings: ChatSettings,
    history: Vec<ChatMessage>,
    draft: String,
    cooldown: Cooldown,
    ticker: CooldownTicker,
    is_pending: bool,
    last_error: Option<String>,
    last_activity: Instant,
}

impl ChatSession {
    pub fn new(settings: ChatSettings) -> Self {
        Self {
            settings,
            history: Vec::new(),
            draft: String::new(),
            cooldown: Cooldown::new(settings.cooldown),
            ticker: CooldownTicker::new(),
            is_pending: false,
            last_error: None,
            last_activity: Instant::now(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_pending(&self) -> bool {
        self.is_pending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn character_limit(&self) -> usize {
        self.settings.character_limit
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.cooldown.last_send()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// True once the session has been untouched for its TTL. A session with
    /// an exchange in flight is never idle.
    pub fn is_idle_at(&self, now: Instant) -> bool {
        !self.is_pending
            && now.saturating_duration_since(self.last_activity) >= self.settings.session_ttl
    }

    pub fn cooldown_remaining_secs(&self) -> u64 {
        self.cooldown_remaining_secs_at(Instant::now())
    }

    pub fn cooldown_remaining_secs_at(&self, now: Instant) -> u64 {
        self.cooldown.remaining_secs(now)
    }

    /// Live countdown, updated once per second while a cooldown runs and at
    /// least one receiver is held.
    pub fn subscribe_cooldown(&self) -> watch::Receiver<u64> {
        self.ticker.subscribe()
    }

    /// Replaces the draft; over-limit text is rejected and the old draft kept.
    pub fn update_draft(&mut self, text: &str) -> Result<(), ValidationError> {
        self.last_activity = Instant::now();
        let limit = self.settings.character_limit;
        if text.chars().count() > limit {
            return Err(self.reject(ValidationError::OverLimit { limit }));
        }
        self.draft = text.to_string();
        Ok(())
    }

    fn reject(&mut self, err: ValidationError) -> ValidationError {
        debug!("Chat submit rejected: {}", err);
        self.last_error = Some(err.to_string());
        err
    }

    fn validate(&self, text: &str, now: Instant) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        let limit = self.settings.character_limit;
        if text.chars().count() > limit {
            return Err(ValidationError::OverLimit { limit });
        }
        if self.cooldown.is_active(now) {
            return Err(ValidationError::Cooldown {
                remaining_secs: self.cooldown.remaining_secs(now),
            });
        }
        if self.is_pending {
            return Err(ValidationError::Pending);
        }
        Ok(())
    }

    pub fn begin_submit(&mut self, text: &str) -> Result<PendingExchange, ValidationError> {
        self.begin_submit_at(text, Instant::now())
    }

    /// Applies the send guards and, if they pass, records the user message,
    /// clears the draft, starts the cooldown and marks the session pending.
    pub fn begin_submit_at(
        &mut self,
        text: &str,
        now: Instant,
    ) -> Result<PendingExchange, ValidationError> {
        self.last_activity = now;
        if let Err(err) = self.validate(text, now) {
            return Err(self.reject(err));
        }

        self.history.push(ChatMessage::user(text));
        self.draft.clear();
        self.cooldown.start(now);
        self.ticker.restart(self.cooldown);
        self.is_pending = true;

        Ok(PendingExchange {
            text: text.to_string(),
        })
    }

    /// Submits whatever is currently in the draft.
    pub fn begin_submit_draft(&mut self) -> Result<PendingExchange, ValidationError> {
        let text = self.draft.clone();
        self.begin_submit(&text)
    }

    /// Records the outcome of an exchange and returns the assistant reply.
    pub fn complete(
        &mut self,
        exchange: PendingExchange,
        result: Result<String, GatewayError>,
    ) -> &ChatMessage {
        self.is_pending = false;
        self.last_activity = Instant::now();
        match result {
            Ok(reply) => {
                self.last_error = None;
                self.history.push(ChatMessage::assistant(reply));
            }
            Err(err) => {
                warn!("Chat exchange for '{}' failed: {}", exchange.text, err);
                self.last_error = Some(err.to_string());
                self.history.push(ChatMessage::assistant(FALLBACK_REPLY));
            }
        }
        &self.history[self.history.len() - 1]
    }

    /// Full submit: guards, one exchange through `gateway`, then the outcome.
    pub async fn submit<G>(&mut self, gateway: &G, text: &str) -> Result<&ChatMessage, ValidationError>
    where
        G: Gateway + ?Sized,
    {
        let exchange = self.begin_submit(text)?;
        let result = gateway.get_response(exchange.text()).await;
        Ok(self.complete(exchange, result))
    }

    /// Empties history and the last error; cooldown and pending are untouched.
    pub fn clear_history(&mut self) {
        self.last_activity = Instant::now();
        self.history.clear();
        self.last_error = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            history: self.history.clone(),
            draft: self.draft.clone(),
            is_pending: self.is_pending,
            last_error: self.last_error.clone(),
            cooldown_remaining_secs: self.cooldown_remaining_secs(),
            character_limit: self.settings.character_limit,
        }
    }
}
