//! Maestro Store
//!
//! This crate provides the storage traits and implementations for maestro
//! templates, processes and their task queues.
//!
//! The store is split along the records it owns:
//! - [`TemplateStore`]: template definitions
//! - [`ProcessStore`]: processes and the entities attached to them
//! - [`QueueStore`]: queue entries (task instances), including the due scans
//!   the orchestrator runs every pass
//! - [`AssignmentStore`]: who a queue entry is assigned to
//! - [`VariableStore`]: process variables
//! - [`StatusStore`]: workflow status stages
//!
//! [`Store`] is the union of all of them and is implemented automatically.
//! [`MemoryStore`] keeps everything in memory; [`SqliteStore`] persists to
//! SQLite.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
  ArchiveState, Assignment, AssignmentId, EntityIdentifier, NewAssignment, NewProcess,
  NewQueueEntry, Process, ProcessCompletion, ProcessId, ProcessStatusStage, ProcessVariable,
  QueueEntry, QueueId, TaskStatus,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maestro_template::Template;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A stored value could not be mapped back to its type.
  #[error("corrupt record: {0}")]
  Corrupt(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Running migrations failed.
  #[error("migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  /// A template could not be (de)serialized.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
  async fn get_template(&self, template_id: &str) -> Result<Template, Error>;

  /// Insert or replace a template.
  async fn save_template(&self, template: &Template) -> Result<(), Error>;

  async fn list_templates(&self) -> Result<Vec<Template>, Error>;
}

#[async_trait]
pub trait ProcessStore: Send + Sync {
  /// Create a process and return it with its assigned id.
  async fn create_process(&self, process: &NewProcess) -> Result<Process, Error>;

  async fn get_process(&self, process_id: ProcessId) -> Result<Process, Error>;

  async fn update_process(&self, process: &Process) -> Result<(), Error>;

  /// Delete a process and every record it owns.
  async fn delete_process(&self, process_id: ProcessId) -> Result<(), Error>;

  async fn add_entity_identifier(&self, entity: &EntityIdentifier) -> Result<(), Error>;

  async fn list_entity_identifiers(
    &self,
    process_id: ProcessId,
  ) -> Result<Vec<EntityIdentifier>, Error>;
}

#[async_trait]
pub trait QueueStore: Send + Sync {
  /// Create an active, un-archived queue entry and return it with its id.
  async fn create_queue_entry(&self, entry: &NewQueueEntry) -> Result<QueueEntry, Error>;

  async fn get_queue_entry(&self, queue_id: QueueId) -> Result<QueueEntry, Error>;

  async fn update_queue_entry(&self, entry: &QueueEntry) -> Result<(), Error>;

  /// All entries of a process in creation order.
  async fn list_queue_entries(&self, process_id: ProcessId) -> Result<Vec<QueueEntry>, Error>;

  /// Entries the advance pass should process, in ascending id order.
  ///
  /// See [`QueueEntry::is_due`]; entries of completed processes are excluded.
  async fn due_queue_entries(&self) -> Result<Vec<QueueEntry>, Error>;

  /// Interactive, active, un-archived entries of running processes.
  async fn open_interactive_entries(&self) -> Result<Vec<QueueEntry>, Error>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
  async fn create_assignment(&self, assignment: &NewAssignment) -> Result<Assignment, Error>;

  async fn list_assignments(&self, queue_id: QueueId) -> Result<Vec<Assignment>, Error>;

  async fn delete_assignments(&self, queue_id: QueueId) -> Result<(), Error>;

  /// Flag every assignment of the entry as completed.
  async fn complete_assignments(&self, queue_id: QueueId) -> Result<(), Error>;

  /// Uncompleted assignments of a process derived from `variable`.
  async fn pending_variable_assignments(
    &self,
    process_id: ProcessId,
    variable: &str,
  ) -> Result<Vec<Assignment>, Error>;

  /// Assignments naming the given actor.
  async fn assignments_for_actor(
    &self,
    assign_type: &str,
    assign_id: &str,
  ) -> Result<Vec<Assignment>, Error>;
}

#[async_trait]
pub trait VariableStore: Send + Sync {
  async fn get_variable(&self, process_id: ProcessId, name: &str) -> Result<Option<String>, Error>;

  /// Insert or update a variable.
  async fn set_variable(&self, process_id: ProcessId, name: &str, value: &str) -> Result<(), Error>;

  async fn list_variables(&self, process_id: ProcessId) -> Result<Vec<ProcessVariable>, Error>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
  async fn create_stage(&self, stage: &ProcessStatusStage) -> Result<(), Error>;

  async fn list_stages(&self, process_id: ProcessId) -> Result<Vec<ProcessStatusStage>, Error>;

  async fn complete_stage(
    &self,
    process_id: ProcessId,
    stage_number: u32,
    completed_at: DateTime<Utc>,
  ) -> Result<(), Error>;
}

/// Every store the orchestrator needs.
pub trait Store:
  TemplateStore + ProcessStore + QueueStore + AssignmentStore + VariableStore + StatusStore
{
}

impl<T> Store for T where
  T: TemplateStore + ProcessStore + QueueStore + AssignmentStore + VariableStore + StatusStore
{
}
