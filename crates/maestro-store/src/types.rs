use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

pub type ProcessId = i64;
pub type QueueId = i64;
pub type AssignmentId = i64;

macro_rules! integer_enum {
  ($name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
    impl $name {
      /// The integer stored in the database.
      pub fn as_i64(self) -> i64 {
        match self {
          $($name::$variant => $value,)+
        }
      }
    }

    impl TryFrom<i64> for $name {
      type Error = Error;

      fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
          $($value => Ok($name::$variant),)+
          other => Err(Error::Corrupt(format!(
            "{} has no variant for {}",
            stringify!($name),
            other
          ))),
        }
      }
    }
  };
}

/// Completion state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCompletion {
  Running,
  Completed,
  Aborted,
}

integer_enum!(ProcessCompletion {
  Running = 0,
  Completed = 1,
  Aborted = 2,
});

/// Status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Active,
  Success,
  Cancelled,
  Hold,
  Aborted,
}

integer_enum!(TaskStatus {
  Active = 0,
  Success = 1,
  Cancelled = 2,
  Hold = 3,
  Aborted = 4,
});

/// Archival state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveState {
  Active,
  /// Consumed by the next-step resolver.
  Archived,
  /// Superseded by a loopback, kept for audit.
  Regenerated,
}

integer_enum!(ArchiveState {
  Active = 0,
  Archived = 1,
  Regenerated = 2,
});

/// One running instance of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
  pub id: ProcessId,
  pub template_id: String,
  pub label: String,
  pub complete: ProcessCompletion,
  pub initiator: String,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl Process {
  pub fn is_running(&self) -> bool {
    self.complete == ProcessCompletion::Running
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcess {
  pub template_id: String,
  pub label: String,
  pub initiator: String,
  pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessVariable {
  pub process_id: ProcessId,
  pub name: String,
  pub value: String,
}

/// A task instance within a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
  pub id: QueueId,
  pub process_id: ProcessId,
  pub task_id: String,
  pub task_type: String,
  pub label: String,
  pub is_interactive: bool,
  pub status: TaskStatus,
  pub archived: ArchiveState,
  pub run_once: bool,
  /// When the entry was created.
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub completed_by: Option<String>,
  pub next_reminder_time: Option<DateTime<Utc>>,
  pub reminder_interval_days: u32,
  pub num_reminders_sent: u32,
  pub escalation_interval_days: u32,
  pub last_escalation_time: Option<DateTime<Utc>>,
  pub num_escalations_sent: u32,
}

impl QueueEntry {
  /// Not archived and not completed.
  pub fn is_open(&self) -> bool {
    self.archived == ArchiveState::Active && self.status == TaskStatus::Active
  }

  pub fn is_completed(&self) -> bool {
    self.status != TaskStatus::Active
  }

  /// The due predicate of the advance pass, excluding the process check.
  ///
  /// Engine tasks are due while active; interactive tasks are due once an
  /// external actor has completed them.
  pub fn is_due(&self) -> bool {
    if self.archived != ArchiveState::Active {
      return false;
    }
    if self.is_interactive {
      self.status != TaskStatus::Active && self.run_once
    } else {
      self.status == TaskStatus::Active && !self.run_once
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueueEntry {
  pub process_id: ProcessId,
  pub task_id: String,
  pub task_type: String,
  pub label: String,
  pub is_interactive: bool,
  pub run_once: bool,
  pub started_at: DateTime<Utc>,
  pub next_reminder_time: Option<DateTime<Utc>>,
  pub reminder_interval_days: u32,
  pub escalation_interval_days: u32,
}

/// Binding of a queue entry to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub id: AssignmentId,
  pub queue_id: QueueId,
  pub process_id: ProcessId,
  pub assign_type: String,
  pub assign_id: String,
  pub by_variable: bool,
  pub source_variable: Option<String>,
  pub task_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
  pub queue_id: QueueId,
  pub process_id: ProcessId,
  pub assign_type: String,
  pub assign_id: String,
  pub by_variable: bool,
  pub source_variable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatusStage {
  pub process_id: ProcessId,
  pub stage_number: u32,
  pub message: String,
  pub completed_at: Option<DateTime<Utc>>,
}

/// An external entity (content, submission, ...) attached to a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIdentifier {
  pub process_id: ProcessId,
  pub unique_id: String,
  pub entity_type: String,
  pub entity_id: String,
  pub bundle: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(is_interactive: bool, status: TaskStatus, archived: ArchiveState) -> QueueEntry {
    QueueEntry {
      id: 1,
      process_id: 1,
      task_id: "t".to_string(),
      task_type: "Work".to_string(),
      label: "t".to_string(),
      is_interactive,
      status,
      archived,
      run_once: is_interactive,
      started_at: Utc::now(),
      completed_at: None,
      completed_by: None,
      next_reminder_time: None,
      reminder_interval_days: 0,
      num_reminders_sent: 0,
      escalation_interval_days: 0,
      last_escalation_time: None,
      num_escalations_sent: 0,
    }
  }

  #[test]
  fn test_due_predicate() {
    assert!(entry(false, TaskStatus::Active, ArchiveState::Active).is_due());
    assert!(!entry(false, TaskStatus::Success, ArchiveState::Active).is_due());
    assert!(!entry(true, TaskStatus::Active, ArchiveState::Active).is_due());
    assert!(entry(true, TaskStatus::Success, ArchiveState::Active).is_due());
    assert!(!entry(true, TaskStatus::Success, ArchiveState::Archived).is_due());
  }

  #[test]
  fn test_integer_mapping() {
    assert_eq!(TaskStatus::Active.as_i64(), 0);
    assert_eq!(ArchiveState::try_from(2).unwrap(), ArchiveState::Regenerated);
    assert!(matches!(ProcessCompletion::try_from(9), Err(Error::Corrupt(_))));
  }
}
