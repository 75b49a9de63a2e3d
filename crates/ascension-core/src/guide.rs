//! Guide - conversational companion behind a completion service
//!
//! The session asks a [`CompletionService`] for a reply to the running
//! conversation. Any service failure degrades to a fixed fallback line;
//! the guide never stops a turn. The conversation is bounded, oldest
//! messages dropped first.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reply used whenever the service cannot answer.
pub const FALLBACK_LINE: &str = "The guide is deep in meditation. Try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Guide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
    #[error("completion service rate limited")]
    RateLimited,
    #[error("completion service rejected the input: {0}")]
    MalformedInput(String),
}

/// Anything that can produce the guide's next line.
pub trait CompletionService: Send {
    fn complete(&mut self, conversation: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Offline service cycling through canned lines.
#[derive(Debug, Clone)]
pub struct OfflineGuide {
    lines: Vec<String>,
    next: usize,
}

impl OfflineGuide {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines, next: 0 }
    }
}

impl CompletionService for OfflineGuide {
    fn complete(&mut self, conversation: &[ChatMessage]) -> Result<String, CompletionError> {
        if conversation.last().map_or(true, |m| m.content.trim().is_empty()) {
            return Err(CompletionError::MalformedInput("empty question".to_string()));
        }
        if self.lines.is_empty() {
            return Err(CompletionError::Unavailable("no lines loaded".to_string()));
        }
        let line = self.lines[self.next % self.lines.len()].clone();
        self.next = self.next.wrapping_add(1);
        Ok(line)
    }
}

/// What a consultation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideReply {
    pub text: String,
    /// Set when the fallback line was used.
    pub error: Option<CompletionError>,
}

/// Bounded conversation plus the service that answers it.
pub struct Guide {
    service: Box<dyn CompletionService>,
    history: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Guide {
    pub fn new(service: Box<dyn CompletionService>, capacity: usize) -> Self {
        Self {
            service,
            history: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    pub fn set_service(&mut self, service: Box<dyn CompletionService>) {
        self.service = service;
    }

    pub fn history(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn push(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    /// Ask a question. Service errors yield [`FALLBACK_LINE`].
    pub fn consult(&mut self, question: &str, context: &str) -> GuideReply {
        self.push(ChatMessage::new(Role::User, question));

        let mut conversation = Vec::with_capacity(self.history.len() + 1);
        conversation.push(ChatMessage::new(Role::System, context));
        conversation.extend(self.history.iter().cloned());

        let (text, error) = match self.service.complete(&conversation) {
            Ok(text) => (text, None),
            Err(e) => {
                log::warn!("Guide unavailable: {}", e);
                (FALLBACK_LINE.to_string(), Some(e))
            }
        };
        self.push(ChatMessage::new(Role::Guide, text.clone()));
        GuideReply { text, error }
    }
}

impl std::fmt::Debug for Guide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guide")
            .field("history", &self.history.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
