use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("task not found: {0}")]
  TaskNotFound(String),

  #[error("task '{0}' is defined more than once")]
  DuplicateTask(String),

  #[error("pointer references unknown task: from={from}, to={to}")]
  InvalidPointer { from: String, to: String },

  #[error("template '{0}' has no start task")]
  NoStartTask(String),

  #[error("malformed assignment clause '{clause}': {reason}")]
  MalformedAssignment { clause: String, reason: String },

  #[error("malformed notification clause '{clause}': {reason}")]
  MalformedNotification { clause: String, reason: String },

  #[error("invalid template JSON: {0}")]
  Json(#[from] serde_json::Error),
}
