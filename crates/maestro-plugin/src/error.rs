use thiserror::Error;

/// Errors a task plugin can raise while executing.
#[derive(Debug, Error)]
pub enum TaskError {
  /// A required `data` key is missing from the task definition.
  #[error("task '{task_id}' is missing data key '{field}'")]
  MissingData { task_id: String, field: String },

  /// A `data` value could not be interpreted.
  #[error("task '{task_id}' has invalid '{field}': {message}")]
  InvalidData {
    task_id: String,
    field: String,
    message: String,
  },

  /// The plugin's own work failed.
  #[error("task failed: {message}")]
  Failed { message: String },
}
