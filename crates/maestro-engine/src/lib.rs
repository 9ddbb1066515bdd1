//! Maestro Engine
//!
//! This crate provides the process orchestrator for maestro. It creates
//! processes from validated templates, runs the periodic advance pass that
//! moves their task queues forward, and keeps assignments and notifications
//! in step with the process variables.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Orchestrator::run(cancel)                  │
//! │  - ticks every advance_interval_secs                        │
//! │  - one advance pass per tick                                │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Orchestrator::advance                     │
//! │  - due queue entries → task plugins → next step             │
//! │  - AND joins, loopback regeneration                         │
//! │  - reminder and escalation scan                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          Store / TaskPluginRegistry / IdentityResolver      │
//! │  - persistence, task type behavior, users and roles         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use maestro_engine::{Orchestrator, ProcessLaunch};
//! use maestro_plugin::TaskPluginRegistry;
//! use maestro_store::MemoryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(MemoryStore::new()),
//!     TaskPluginRegistry::with_builtins(),
//! );
//! orchestrator.save_template(template).await?;
//!
//! if let ProcessLaunch::Started(pid) = orchestrator.new_process("leave", "alice").await? {
//!     println!("started process {pid}");
//! }
//!
//! let cancel = CancellationToken::new();
//! orchestrator.run(cancel).await;
//! ```

mod advance;
mod assignment;
mod config;
mod error;
mod identity;
mod next_step;
mod notify;
mod orchestrator;
mod scheduler;
mod validity;

pub use advance::{AdvanceReport, QueueAdvanceOutcome, SkipReason};
pub use config::OrchestratorConfig;
pub use error::{AdvanceError, AdvanceErrorKind, EngineError};
pub use identity::{Identity, IdentityResolver, StaticDirectory};
pub use notify::{
  ChannelNotifier, LogNotifier, MessageContext, MessageRenderer, NoopNotifier, Notification,
  Notifier,
};
pub use orchestrator::{Orchestrator, ProcessLaunch};
pub use scheduler::NotificationTally;
pub use validity::{ValidationReport, validate};
