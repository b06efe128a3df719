//! Dispatcher - drains the message bus into a [`MessageHandler`]
//!
//! With one worker (the default) every message is handled in arrival order,
//! one at a time. With `N > 1` workers each message is routed to the worker
//! owning its correspondent, so different customers proceed in parallel while
//! each customer's messages keep their order.
//!
//! Handler errors are logged and never stop the dispatcher.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, info_span, Instrument};

use crate::bus::{InboundMessage, MessageBus};
use crate::error::{GatewayError, Result};

/// Receives each normalized inbound message exactly once.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, msg: InboundMessage) -> Result<()>;
}

/// Worker index for a correspondent.
pub fn shard_for(correspondent_id: &str, workers: usize) -> usize {
    if workers <= 1 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    correspondent_id.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

async fn process(handler: &dyn MessageHandler, msg: InboundMessage) {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "request",
        request_id = %request_id,
        customer = %msg.correspondent_id,
        message_id = %msg.message_id,
    );
    async {
        let start = Instant::now();
        match handler.on_message(msg).await {
            Ok(()) => info!(
                latency_ms = start.elapsed().as_millis() as u64,
                "Message handled"
            ),
            Err(e) => error!(
                latency_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Message handling failed"
            ),
        }
    }
    .instrument(span)
    .await
}

/// Long-lived consumer of the inbound queue.
pub struct Dispatcher {
    bus: Arc<MessageBus>,
    handler: Arc<dyn MessageHandler>,
    workers: usize,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl Dispatcher {
    pub fn new(bus: Arc<MessageBus>, handler: Arc<dyn MessageHandler>, workers: usize) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            bus,
            handler,
            workers: workers.max(1),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Consume the bus until [`stop`](Self::stop) is called or the bus is
    /// closed and drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is already running.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::Config("Dispatcher already running".into()));
        }
        info!(workers = self.workers, "Starting dispatcher");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let _ = *shutdown_rx.borrow_and_update();

        if self.workers == 1 {
            self.run_serial(&mut shutdown_rx).await;
        } else {
            self.run_sharded(&mut shutdown_rx).await;
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Dispatcher stopped");
        Ok(())
    }

    async fn run_serial(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Received shutdown signal");
                        break;
                    }
                }
                msg = self.bus.consume_inbound() => {
                    match msg {
                        Some(msg) => process(self.handler.as_ref(), msg).await,
                        None => {
                            info!("Inbound queue closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn run_sharded(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        let mut senders = Vec::with_capacity(self.workers);
        let mut handles = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let (tx, mut rx) = mpsc::unbounded_channel::<InboundMessage>();
            let handler = Arc::clone(&self.handler);
            senders.push(tx);
            handles.push(tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    process(handler.as_ref(), msg).await;
                }
                tracing::debug!(worker, "Dispatcher worker drained");
            }));
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Received shutdown signal");
                        break;
                    }
                }
                msg = self.bus.consume_inbound() => {
                    let Some(msg) = msg else {
                        info!("Inbound queue closed");
                        break;
                    };
                    let shard = shard_for(&msg.correspondent_id, self.workers);
                    if senders[shard].send(msg).is_err() {
                        error!(shard, "Dispatcher worker is gone, message dropped");
                    }
                }
            }
        }

        // Closing the worker queues lets each worker finish what it holds.
        drop(senders);
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Dispatcher worker panicked");
            }
        }
    }

    /// Signal [`start`](Self::start) to return after the message in flight.
    pub fn stop(&self) {
        info!("Stopping dispatcher");
        let _ = self.shutdown_tx.send(true);
    }
}
