use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  /// Blocks the template from being validated.
  Failure,
  Warning,
}

/// A single finding of the template validity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
  pub severity: Severity,
  /// The offending task, if the finding is about one.
  pub task_id: Option<String>,
  pub message: String,
}

impl Issue {
  pub fn failure(task_id: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Failure,
      task_id: Some(task_id.into()),
      message: message.into(),
    }
  }

  pub fn warning(task_id: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Warning,
      task_id: Some(task_id.into()),
      message: message.into(),
    }
  }

  /// A failure about the template as a whole.
  pub fn template_failure(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Failure,
      task_id: None,
      message: message.into(),
    }
  }

  pub fn is_failure(&self) -> bool {
    self.severity == Severity::Failure
  }
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.task_id {
      Some(task_id) => write!(f, "{}: {}", task_id, self.message),
      None => f.write_str(&self.message),
    }
  }
}
