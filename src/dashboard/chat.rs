//! Locally simulated agent chat.
//!
//! A user message is appended at once; a single canned acknowledgment from
//! the agent follows after a fixed delay. Nothing goes to the backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::models::{ChatMessage, ChatSender, MessageKind};
use super::store::DashboardStore;

pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_secs(2);

pub const AGENT_ACKNOWLEDGMENT: &str = "Got it! I'll adjust my analysis focus based on your feedback. Let me work on that and I'll update you with the results.";

/// Wall-clock timestamps that follow the tokio clock and never repeat.
struct SessionClock {
    base: DateTime<Utc>,
    started: Instant,
    last: Option<DateTime<Utc>>,
}

impl SessionClock {
    fn new() -> Self {
        Self {
            base: Utc::now(),
            started: Instant::now(),
            last: None,
        }
    }

    fn now(&mut self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap_or(TimeDelta::zero());
        let mut stamp = self.base + elapsed;
        if let Some(last) = self.last
            && stamp <= last
        {
            stamp = last + TimeDelta::microseconds(1);
        }
        self.last = Some(stamp);
        stamp
    }
}

pub struct ChatSession {
    store: DashboardStore,
    reply_delay: Duration,
    clock: Arc<Mutex<SessionClock>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl ChatSession {
    pub fn new(store: DashboardStore, reply_delay: Duration) -> Self {
        Self {
            store,
            reply_delay,
            clock: Arc::new(Mutex::new(SessionClock::new())),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.store.chat()
    }

    /// Append `text` from the user and schedule the agent's reply.
    /// Blank input is ignored and returns `None`.
    pub fn send_message(&self, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender: ChatSender::User,
            message: text.to_string(),
            timestamp: stamp(&self.clock),
            kind: None,
        };
        if !self.store.append_chat(message.clone()) {
            return None;
        }
        tracing::debug!(message_id = %message.id, "User chat message appended");

        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let delay = self.reply_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reply = ChatMessage {
                id: uuid::Uuid::new_v4().to_string(),
                sender: ChatSender::Agent,
                message: AGENT_ACKNOWLEDGMENT.to_string(),
                timestamp: stamp(&clock),
                kind: Some(MessageKind::Info),
            };
            store.append_chat(reply);
        });

        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        Some(message)
    }

    /// Wait for scheduled replies.
    pub async fn settle(&self) {
        let handles: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub fn abort_pending(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        for handle in pending.drain(..) {
            handle.abort();
        }
    }
}

fn stamp(clock: &Mutex<SessionClock>) -> DateTime<Utc> {
    clock.lock().unwrap_or_else(|p| p.into_inner()).now()
}
