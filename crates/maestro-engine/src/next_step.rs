//! Next-step resolution.
//!
//! When a queue entry completes, the resolver creates entries for the
//! successors of its task. Reaching a task that already ran in this process
//! (a loopback) does not fork a second copy of the downstream branch:
//! instead every completed entry of the process is regenerated (superseded)
//! except those still feeding an open AND join, and the revisited task
//! starts over.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use maestro_store::{ArchiveState, NewQueueEntry, ProcessId, QueueEntry, QueueId};
use maestro_template::{Branch, NotificationKind, TaskDef, TaskType, Template};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::orchestrator::Orchestrator;

/// Tasks whose entries must survive a regeneration sweep.
///
/// These are the tasks pointing at an open AND join, followed transitively
/// through feeders that are themselves joins, so nested joins keep their
/// inputs too.
pub(crate) fn protected_tasks<'a>(
  template: &'a Template,
  entries: &'a [QueueEntry],
) -> HashSet<&'a str> {
  let mut pending: Vec<&str> = entries
    .iter()
    .filter(|e| e.is_open() && TaskType::from(e.task_type.as_str()) == TaskType::And)
    .map(|e| e.task_id.as_str())
    .collect();

  let mut protected = HashSet::new();
  while let Some(join) = pending.pop() {
    for feeder in template.task_pointers(join) {
      if protected.insert(feeder) && template.task(feeder).is_some_and(TaskDef::is_join) {
        pending.push(feeder);
      }
    }
  }
  protected
}

impl Orchestrator {
  /// Create entries for the successors of `from` on the given branch.
  ///
  /// Returns the ids of the created entries. A branch with no successors, or
  /// successors that are already open, creates nothing.
  pub(crate) async fn next_step(
    &self,
    template: &Template,
    from: &TaskDef,
    process_id: ProcessId,
    branch: Branch,
    now: DateTime<Utc>,
  ) -> Result<Vec<QueueId>, EngineError> {
    let mut created = Vec::new();

    for next_id in from.successors(branch) {
      let Some(next) = template.task(next_id) else {
        warn!(
          process_id,
          task_id = %from.id,
          next_step = %next_id,
          "dangling_next_step"
        );
        continue;
      };

      let entries = self.store.list_queue_entries(process_id).await?;
      let revisit = !next.is_join()
        && entries.iter().any(|e| {
          e.task_id == *next_id && e.is_completed() && e.archived != ArchiveState::Regenerated
        });
      if revisit {
        self.regenerate(template, process_id, &entries).await?;
      }

      // regeneration only touches completed entries, so open ones are current
      if entries.iter().any(|e| e.task_id == *next_id && e.is_open()) {
        debug!(process_id, task_id = %next_id, "task_already_open");
        continue;
      }

      let entry = self.create_task(template, next, process_id, now).await?;
      created.push(entry.id);
    }

    Ok(created)
  }

  async fn regenerate(
    &self,
    template: &Template,
    process_id: ProcessId,
    entries: &[QueueEntry],
  ) -> Result<(), EngineError> {
    let protected = protected_tasks(template, entries);

    let mut regenerated = 0;
    for entry in entries {
      if !entry.is_completed()
        || entry.archived == ArchiveState::Regenerated
        || protected.contains(entry.task_id.as_str())
      {
        continue;
      }
      let mut entry = entry.clone();
      entry.archived = ArchiveState::Regenerated;
      self.store.update_queue_entry(&entry).await?;
      debug!(
        process_id,
        queue_id = entry.id,
        task_id = %entry.task_id,
        "task_regenerated"
      );
      regenerated += 1;
    }

    info!(
      process_id,
      regenerated,
      protected = protected.len(),
      "process_regenerated"
    );
    Ok(())
  }

  /// Create a queue entry for `task`, assigning it and announcing the
  /// assignment when the task is interactive.
  pub(crate) async fn create_task(
    &self,
    template: &Template,
    task: &TaskDef,
    process_id: ProcessId,
    now: DateTime<Utc>,
  ) -> Result<QueueEntry, EngineError> {
    let is_interactive = self
      .plugins
      .resolve(task.task_type.as_str())
      .is_some_and(|plugin| plugin.is_interactive());
    let (reminder_interval_days, escalation_interval_days) = if is_interactive {
      (task.reminder_interval_days, task.escalation_interval_days)
    } else {
      (0, 0)
    };
    let next_reminder_time = (reminder_interval_days > 0)
      .then(|| now + Duration::days(i64::from(reminder_interval_days)));

    let label = if task.label.is_empty() {
      task.id.clone()
    } else {
      task.label.clone()
    };
    let entry = self
      .store
      .create_queue_entry(&NewQueueEntry {
        process_id,
        task_id: task.id.clone(),
        task_type: task.task_type.to_string(),
        label,
        is_interactive,
        run_once: is_interactive,
        started_at: now,
        next_reminder_time,
        reminder_interval_days,
        escalation_interval_days,
      })
      .await
      .map_err(|source| EngineError::Save {
        entity: "queue entry",
        key: format!("{}/{}", process_id, task.id),
        source,
      })?;

    info!(
      process_id,
      queue_id = entry.id,
      task_id = %task.id,
      task_type = %task.task_type,
      is_interactive,
      "task_created"
    );

    if is_interactive {
      self.assign(task, &entry).await?;
      if self.config.send_notifications {
        if let Err(e) = self
          .send_notification(task, &entry, NotificationKind::Assignment)
          .await
        {
          warn!(
            process_id,
            queue_id = entry.id,
            error = %e,
            "assignment_notification_failed"
          );
        }
      }
    }

    if task.participate_in_workflow_status_stage {
      let stage = task.workflow_status_stage_number.to_string();
      let current_stage = [
        (self.config.current_stage_variable.as_str(), stage.as_str()),
        (
          self.config.current_stage_message_variable.as_str(),
          task.workflow_status_stage_message.as_str(),
        ),
      ];
      for (name, value) in current_stage {
        if !name.is_empty() {
          self.set_variable_locked(template, process_id, name, value).await?;
        }
      }
    }

    Ok(entry)
  }

  /// Stamp the task's status stage completed, if it participates in one.
  pub(crate) async fn complete_stage(
    &self,
    process_id: ProcessId,
    task: &TaskDef,
    now: DateTime<Utc>,
  ) -> Result<(), EngineError> {
    if !task.participate_in_workflow_status_stage {
      return Ok(());
    }
    match self
      .store
      .complete_stage(process_id, task.workflow_status_stage_number, now)
      .await
    {
      Ok(()) => Ok(()),
      Err(maestro_store::Error::NotFound(_)) => {
        warn!(
          process_id,
          task_id = %task.id,
          stage_number = task.workflow_status_stage_number,
          "status_stage_missing"
        );
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use maestro_store::TaskStatus;

  fn entry(id: i64, task_id: &str, task_type: &str, status: TaskStatus) -> QueueEntry {
    QueueEntry {
      id,
      process_id: 1,
      task_id: task_id.to_string(),
      task_type: task_type.to_string(),
      label: task_id.to_string(),
      is_interactive: false,
      status,
      archived: ArchiveState::Active,
      run_once: false,
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
  fn test_protection_follows_nested_joins() {
    // a -> inner(AND) <- b ; inner -> outer(AND) <- c ; d unrelated
    let template = Template::new(
      "nested",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["a", "b", "c", "d"]),
        TaskDef::new("a", "Work").with_next(&["inner"]),
        TaskDef::new("b", "Work").with_next(&["inner"]),
        TaskDef::new("inner", TaskType::And).with_next(&["outer"]),
        TaskDef::new("c", "Work").with_next(&["outer"]),
        TaskDef::new("outer", TaskType::And).with_next(&["end"]),
        TaskDef::new("d", "Work").with_next(&["end"]),
        TaskDef::new("end", TaskType::End),
      ],
      vec![],
    );
    let entries = vec![
      entry(1, "a", "Work", TaskStatus::Success),
      entry(2, "c", "Work", TaskStatus::Success),
      entry(3, "outer", "MaestroAnd", TaskStatus::Active),
    ];

    let protected = protected_tasks(&template, &entries);
    let mut protected: Vec<_> = protected.into_iter().collect();
    protected.sort_unstable();
    assert_eq!(protected, vec!["a", "b", "c", "inner"]);
  }

  #[test]
  fn test_no_open_join_protects_nothing() {
    let template = Template::new(
      "flat",
      vec![
        TaskDef::new("a", "Work").with_next(&["join"]),
        TaskDef::new("join", TaskType::And),
      ],
      vec![],
    );
    let entries = vec![
      entry(1, "a", "Work", TaskStatus::Success),
      entry(2, "join", "MaestroAnd", TaskStatus::Success),
    ];
    assert!(protected_tasks(&template, &entries).is_empty());
  }
}
