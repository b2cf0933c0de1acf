//! # Courier Service
//!
//! Durable offline operation synchronization for the Courier CRM backend.
//!
//! CRM clients keep working while disconnected; their mutations arrive here
//! as queued operations. This crate persists the queue, conflicts, and
//! autosave drafts in PostgreSQL and runs the background synchronizer that
//! replays operations against the authoritative store through the entity
//! handlers the surrounding CRUD layer registers.
//!
//! The crate is a library: the host constructs one [`SyncService`] with
//! injected store handles and passes it by reference to its request
//! handlers. Nothing here installs global state or a tracing subscriber.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier_service::{db, HandlerRegistry, NoopSink, SyncConfig, SyncService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::from_env()?;
//! let pool = db::create_pool(&config.database_url).await?;
//! db::run_migrations(&pool).await?;
//!
//! let mut registry = HandlerRegistry::new();
//! // registry.register(EntityKind::Lead, OperationKind::Create, lead_create_handler)?;
//! // ... one handler per (entity, operation) pair the deployment supports
//!
//! let service = SyncService::new(pool, config, Arc::new(registry), Arc::new(NoopSink));
//!
//! // Background loops, stopped explicitly on shutdown.
//! let worker = service.synchronizer().start();
//! let sweeper = service.sweeper().start();
//!
//! // Request handlers call service.enqueue(...), service.queue_status(...),
//! // service.list_conflicts(...), service.autosave(...), and friends.
//!
//! worker.stop().await;
//! sweeper.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod notify;
pub mod service;
pub mod sweeper;
mod time;
pub mod worker;

pub use config::{ConfigError, SyncConfig};
pub use error::{Result, SyncError};
pub use handler::{ApplyOutcome, EntityHandler, HandlerError, HandlerRegistry, RegistryError};
pub use notify::{
    user_topic, ChannelSink, Notification, NoopSink, NotificationSink, QueueEvent,
};
pub use service::SyncService;
pub use sweeper::{RetentionSweeper, SweepReport};
pub use worker::{PassSummary, Synchronizer, WorkerHandle};

// The engine types callers interact with directly (entity tags, statuses,
// conflict records, snapshots) re-exported for convenience.
pub use courier_engine as engine;
