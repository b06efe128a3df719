//! Per-conversation session locks
//!
//! A `SessionHandle` is the only way to drive the engine for a conversation.
//! Holding one excludes every other handle for the same conversation; the
//! lock is released when the handle is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::store::Conversation;

/// Lock table keyed by conversation id.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, conversation_id: i64) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(conversation_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait for exclusive access to a conversation.
    pub async fn acquire(self: &Arc<Self>, conversation: Conversation) -> SessionHandle {
        let guard = self.entry(conversation.id).lock_owned().await;
        debug!(conversation_id = conversation.id, "session acquired");
        SessionHandle {
            conversation,
            guard: Some(guard),
            locks: Arc::clone(self),
        }
    }

    /// Drop the table entry once nobody holds or waits for it.
    fn release(&self, conversation_id: i64) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(&conversation_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&conversation_id);
            }
        }
    }

    /// Number of conversations with a live or awaited lock.
    pub fn active(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Exclusive access to one conversation.
#[derive(Debug)]
pub struct SessionHandle {
    conversation: Conversation,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<SessionLocks>,
}

impl SessionHandle {
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_id(&self) -> i64 {
        self.conversation.id
    }

    pub fn customer_id(&self) -> &str {
        &self.conversation.customer_id
    }

    pub fn is_open(&self) -> bool {
        self.conversation.is_open()
    }

    pub(crate) fn mark_closed(&mut self, end_time: i64, intent: Option<&str>) {
        self.conversation.end_time = Some(end_time);
        self.conversation.intent = intent.map(str::to_string);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.conversation.id);
        debug!(conversation_id = self.conversation.id, "session released");
    }
}
