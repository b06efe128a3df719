//! Gateway module - webhook ingestion
//!
//! The HTTP side of wagate. [`webhook::router`] exposes the verification and
//! notification endpoint; [`IngestPipeline`] turns notification bodies into
//! [`InboundMessage`](crate::bus::InboundMessage)s on the bus, downloading
//! media and dropping redeliveries along the way.

pub mod idempotency;
pub mod ingest;
pub mod webhook;

pub use idempotency::IdempotencyStore;
pub use ingest::{IngestOutcome, IngestPipeline, VerifyParams};
pub use webhook::router;
