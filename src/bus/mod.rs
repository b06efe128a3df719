//! Message Bus Module
//!
//! The `MessageBus` is the single hand-off between the webhook handlers
//! (producers) and the dispatcher (consumer).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Webhook   │────>│  MessageBus │────>│  Dispatcher │
//! │   (POST)    │     │  (inbound)  │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! The queue is unbounded: a webhook call never waits on conversation
//! processing, it only waits for the enqueue.
//!
//! # Example
//!
//! ```
//! use wagate::bus::{MessageBus, InboundMessage};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = MessageBus::new();
//!
//!     let msg = InboundMessage::text("wamid.1", "601", "Hello", 0);
//!     bus.publish_inbound(msg).unwrap();
//!
//!     if let Some(received) = bus.consume_inbound().await {
//!         println!("Received: {:?}", received.text);
//!     }
//! }
//! ```

pub mod message;

pub use message::{ContactProfile, InboundMessage, MediaAttachment, MediaType, MessageKind};

use crate::error::{GatewayError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Unbounded in-process queue of normalized inbound messages.
pub struct MessageBus {
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    /// Receiver (wrapped in Arc<Mutex> for shared access)
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<InboundMessage>>>,
    closed: AtomicBool,
}

impl MessageBus {
    /// Creates a new, open `MessageBus`.
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            closed: AtomicBool::new(false),
        }
    }

    /// Publishes an inbound message to the bus.
    ///
    /// Never blocks. Called by the ingestion pipeline once per normalized
    /// message.
    ///
    /// # Errors
    /// Returns `GatewayError::BusClosed` after [`close`](Self::close) or if
    /// the receiver has been dropped.
    pub fn publish_inbound(&self, msg: InboundMessage) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::BusClosed);
        }
        self.inbound_tx
            .send(msg)
            .map_err(|_| GatewayError::BusClosed)
    }

    /// Consumes the next inbound message from the bus.
    ///
    /// Returns `None` once the bus is closed and drained.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        let mut rx = self.inbound_rx.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return rx.try_recv().ok();
        }
        rx.recv().await
    }

    /// Stop accepting new messages. Already queued messages stay consumable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
