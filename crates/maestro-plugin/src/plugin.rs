use std::collections::BTreeMap;

use async_trait::async_trait;
use maestro_store::{QueueEntry, TaskStatus};
use maestro_template::{Branch, TaskDef, Template};

use crate::error::TaskError;
use crate::issue::Issue;

/// Read-only view of a process handed to a plugin while it executes.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
  pub template: &'a Template,
  pub task: &'a TaskDef,
  /// The queue entry being executed.
  pub entry: &'a QueueEntry,
  pub variables: &'a BTreeMap<String, String>,
  /// Every queue entry of the process, in creation order.
  pub entries: &'a [QueueEntry],
}

impl<'a> TaskContext<'a> {
  pub fn variable(&self, name: &str) -> Option<&'a str> {
    self.variables.get(name).map(String::as_str)
  }

  /// Look up a required `data` key of the task.
  pub fn data(&self, key: &str) -> Result<&'a str, TaskError> {
    self
      .task
      .data
      .get(key)
      .map(String::as_str)
      .ok_or_else(|| TaskError::MissingData {
        task_id: self.task.id.clone(),
        field: key.to_string(),
      })
  }

  /// Entries of the process created for `task_id`.
  pub fn entries_for(&self, task_id: &'a str) -> impl Iterator<Item = &'a QueueEntry> + 'a {
    self.entries.iter().filter(move |e| e.task_id == task_id)
  }
}

/// A state change requested by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEffect {
  SetVariable { name: String, value: String },
  /// Mark the process completed.
  EndProcess,
}

/// Result of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
  /// Not ready yet; the entry stays active and is retried on the next pass.
  Waiting,
  Completed { effects: Vec<TaskEffect> },
}

impl Execution {
  pub fn completed() -> Self {
    Execution::Completed {
      effects: Vec::new(),
    }
  }
}

/// Behavior of one task type.
///
/// A fresh plugin is built for every execution, so `execution_status` and
/// `completion_status` may report state recorded by the preceding
/// `execute` call.
#[async_trait]
pub trait TaskPlugin: Send + Sync {
  /// Interactive tasks are completed by an external actor and are never
  /// executed by the advance pass.
  fn is_interactive(&self) -> bool {
    false
  }

  async fn execute(&mut self, ctx: &TaskContext<'_>) -> Result<Execution, TaskError>;

  /// Status stamped on the entry once it completes.
  fn execution_status(&self) -> TaskStatus {
    TaskStatus::Success
  }

  /// Branch the next-step resolver follows.
  fn completion_status(&self) -> Branch {
    Branch::True
  }

  /// Task-type specific validity findings.
  fn validate(&self, _template: &Template, _task: &TaskDef) -> Vec<Issue> {
    Vec::new()
  }
}
