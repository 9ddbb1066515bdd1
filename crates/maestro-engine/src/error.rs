//! Engine errors.

use maestro_plugin::TaskError;
use maestro_store::{ProcessId, QueueId};

/// Errors raised by orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The template referenced by a process or request does not exist.
  #[error("template '{template_id}' not found")]
  TemplateNotFound { template_id: String },

  /// The template a process runs is broken in a way that stalls it.
  #[error("template corruption in '{template_id}': {message}")]
  TemplateCorruption {
    template_id: String,
    message: String,
  },

  /// Creating or saving a record failed.
  #[error("failed to save {entity} '{key}'")]
  Save {
    entity: &'static str,
    key: String,
    #[source]
    source: maestro_store::Error,
  },

  /// A fixed assignment names an actor the identity resolver does not know.
  #[error("no {kind} named '{id}' for task '{task_id}'")]
  AssignmentLookup {
    task_id: String,
    kind: String,
    id: String,
  },

  /// The queue entry cannot take the requested transition.
  #[error("queue entry {queue_id} {message}")]
  InvalidTransition { queue_id: QueueId, message: String },

  /// A notification message could not be rendered.
  #[error("failed to render {kind} message for task '{task_id}'")]
  Render {
    task_id: String,
    kind: String,
    #[source]
    source: minijinja::Error,
  },

  /// A task plugin failed.
  #[error(transparent)]
  Task(#[from] TaskError),

  /// Store operation failed.
  #[error("store error: {0}")]
  Store(#[from] maestro_store::Error),
}

/// Classification of a failed queue entry in an advance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceErrorKind {
  /// The process is stalled until its template is fixed.
  TemplateCorruption,
  /// The plugin failed; the entry stays active and is retried.
  TaskFailed,
  Persistence,
}

/// A queue entry that could not be advanced.
#[derive(Debug, thiserror::Error)]
#[error("advancing queue entry {queue_id} of process {process_id} failed")]
pub struct AdvanceError {
  pub queue_id: QueueId,
  pub process_id: ProcessId,
  pub task_id: String,
  pub kind: AdvanceErrorKind,
  #[source]
  pub source: EngineError,
}

impl AdvanceError {
  pub(crate) fn new(
    queue_id: QueueId,
    process_id: ProcessId,
    task_id: impl Into<String>,
    source: EngineError,
  ) -> Self {
    let kind = match &source {
      EngineError::TemplateCorruption { .. } | EngineError::TemplateNotFound { .. } => {
        AdvanceErrorKind::TemplateCorruption
      }
      EngineError::Task(_) | EngineError::Render { .. } => AdvanceErrorKind::TaskFailed,
      _ => AdvanceErrorKind::Persistence,
    };
    Self {
      queue_id,
      process_id,
      task_id: task_id.into(),
      kind,
      source,
    }
  }

  /// Fatal to the affected process: it stays stalled until repaired.
  pub fn is_fatal(&self) -> bool {
    self.kind == AdvanceErrorKind::TemplateCorruption
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_advance_error_kind_follows_source() {
    let corrupt = AdvanceError::new(
      1,
      1,
      "a",
      EngineError::TemplateCorruption {
        template_id: "t".to_string(),
        message: "no plugin".to_string(),
      },
    );
    assert!(corrupt.is_fatal());

    let failed = AdvanceError::new(
      2,
      1,
      "b",
      EngineError::Task(TaskError::Failed {
        message: "boom".to_string(),
      }),
    );
    assert_eq!(failed.kind, AdvanceErrorKind::TaskFailed);
    assert!(!failed.is_fatal());

    let store = AdvanceError::new(
      3,
      1,
      "c",
      EngineError::Store(maestro_store::Error::NotFound("queue entry 3".to_string())),
    );
    assert_eq!(store.kind, AdvanceErrorKind::Persistence);
  }
}
