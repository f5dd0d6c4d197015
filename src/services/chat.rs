//! Chat transcript service
//!
//! Keeps a per-user transcript. The user entry is appended at once; the bot
//! entry is appended by a one-shot task after the reply delay, which also
//! records the completed turn in the history. There is no cancellation and
//! no guard against overlapping queries: every accepted query gets its own
//! independent task.
//!
//! A transcript lives as long as the login that produced it. Logging out
//! drops it, and a reply still in flight for a dropped transcript is
//! discarded instead of resurrecting it.

use crate::models::{ChatTurn, TranscriptEntry};
use crate::services::resolver::{resolve, Resolution};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Error types for chat operations
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Reply task failed: {0}")]
    ReplyLost(#[from] tokio::task::JoinError),
}

/// Oldest lines are dropped past this many transcript entries
pub const MAX_TRANSCRIPT_ENTRIES: usize = 200;

/// Oldest turns are dropped past this many completed turns
pub const MAX_HISTORY_TURNS: usize = MAX_TRANSCRIPT_ENTRIES / 2;

#[derive(Debug)]
struct Conversation {
    id: u64,
    entries: Vec<TranscriptEntry>,
    history: Vec<ChatTurn>,
}

impl Conversation {
    fn new(id: u64) -> Self {
        Self {
            id,
            entries: Vec::new(),
            history: Vec::new(),
        }
    }

    fn push_entry(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
        if self.entries.len() > MAX_TRANSCRIPT_ENTRIES {
            let excess = self.entries.len() - MAX_TRANSCRIPT_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    fn push_turn(&mut self, turn: ChatTurn) {
        self.history.push(turn);
        if self.history.len() > MAX_HISTORY_TURNS {
            let excess = self.history.len() - MAX_HISTORY_TURNS;
            self.history.drain(..excess);
        }
    }
}

/// A reply that has been scheduled but may not have arrived yet
#[derive(Debug)]
pub struct PendingReply {
    pub resolution: Resolution,
    handle: JoinHandle<ChatTurn>,
}

impl PendingReply {
    /// Wait for the deferred reply to land in the transcript
    pub async fn wait(self) -> Result<ChatTurn, ChatError> {
        Ok(self.handle.await?)
    }
}

/// Chat service holding every user's transcript
#[derive(Clone)]
pub struct ChatService {
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
    next_id: Arc<AtomicU64>,
    reply_delay: Duration,
}

impl ChatService {
    pub fn new(reply_delay: Duration) -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            reply_delay,
        }
    }

    /// Accept a query for `username`.
    ///
    /// Empty or whitespace-only input is rejected without touching the
    /// transcript.
    pub async fn submit(&self, username: &str, query: &str) -> Result<PendingReply, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        let resolution = resolve(query);
        let conversation_id = {
            let mut conversations = self.conversations.write().await;
            let conversation = conversations
                .entry(username.to_string())
                .or_insert_with(|| Conversation::new(self.next_id.fetch_add(1, Ordering::Relaxed)));
            conversation.push_entry(TranscriptEntry::user(query));
            conversation.id
        };

        let conversations = Arc::clone(&self.conversations);
        let delay = self.reply_delay;
        let username = username.to_string();
        let user_text = query.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let turn = ChatTurn {
                user_text,
                bot_text: resolution.text.to_string(),
                timestamp: Utc::now(),
            };

            let mut conversations = conversations.write().await;
            match conversations.get_mut(&username) {
                Some(conversation) if conversation.id == conversation_id => {
                    conversation.push_entry(TranscriptEntry::bot(resolution.text));
                    conversation.push_turn(turn.clone());
                }
                _ => tracing::debug!("Discarding reply for closed conversation of {}", username),
            }
            turn
        });

        Ok(PendingReply { resolution, handle })
    }

    /// Visible transcript for a user, oldest first
    pub async fn transcript(&self, username: &str) -> Vec<TranscriptEntry> {
        self.conversations
            .read()
            .await
            .get(username)
            .map(|c| c.entries.clone())
            .unwrap_or_default()
    }

    /// Completed turns for a user, oldest first
    pub async fn history(&self, username: &str) -> Vec<ChatTurn> {
        self.conversations
            .read()
            .await
            .get(username)
            .map(|c| c.history.clone())
            .unwrap_or_default()
    }

    /// Drop the user's transcript and history
    pub async fn clear(&self, username: &str) {
        self.conversations.write().await.remove(username);
    }

    pub fn reply_delay(&self) -> Duration {
        self.reply_delay
    }
}
