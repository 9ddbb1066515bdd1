//! The advance pass.

use chrono::{DateTime, Utc};
use maestro_plugin::{Execution, TaskContext, TaskEffect};
use maestro_store::{ArchiveState, ProcessCompletion, QueueEntry, QueueId};
use maestro_template::Branch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{AdvanceError, EngineError};
use crate::orchestrator::Orchestrator;

/// Why a due entry was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// The owning process completed or was aborted.
  ProcessComplete,
  /// An earlier entry of the same pass archived or regenerated it.
  NoLongerDue,
}

/// What happened to one due queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueAdvanceOutcome {
  /// The entry completed, was archived and its successors were created.
  Completed {
    queue_id: QueueId,
    task_id: String,
    created: Vec<QueueId>,
  },
  /// The plugin is not ready; the entry is retried next pass.
  Waiting { queue_id: QueueId },
  Skipped { queue_id: QueueId, reason: SkipReason },
}

/// Summary of one advance pass.
#[derive(Debug, Default)]
pub struct AdvanceReport {
  pub outcomes: Vec<QueueAdvanceOutcome>,
  pub errors: Vec<AdvanceError>,
  pub reminders_sent: usize,
  pub escalations_sent: usize,
}

impl AdvanceReport {
  /// Number of entries completed in this pass.
  pub fn completed(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| matches!(o, QueueAdvanceOutcome::Completed { .. }))
      .count()
  }

  /// Ids of the entries created in this pass.
  pub fn created(&self) -> Vec<QueueId> {
    self
      .outcomes
      .iter()
      .flat_map(|o| match o {
        QueueAdvanceOutcome::Completed { created, .. } => created.as_slice(),
        _ => &[],
      })
      .copied()
      .collect()
  }

  /// Some process is stalled on a broken template.
  pub fn has_fatal_errors(&self) -> bool {
    self.errors.iter().any(AdvanceError::is_fatal)
  }

  /// Nothing changed: no completions, errors or notifications.
  pub fn is_idle(&self) -> bool {
    self.completed() == 0
      && self.errors.is_empty()
      && self.reminders_sent == 0
      && self.escalations_sent == 0
  }
}

impl Orchestrator {
  /// Run one advance pass now.
  pub async fn advance(&self) -> Result<AdvanceReport, EngineError> {
    self.advance_at(Utc::now()).await
  }

  /// Run one advance pass as of `now`.
  ///
  /// Due entries are processed in creation order. A failing entry is logged
  /// and reported but never stops the pass. Only a failure to list the due
  /// entries, or of the notification scan, fails the pass as a whole.
  #[instrument(name = "advance_pass", skip(self))]
  pub async fn advance_at(&self, now: DateTime<Utc>) -> Result<AdvanceReport, EngineError> {
    let _pass = self.pass_lock.lock().await;

    let due = self.store.due_queue_entries().await?;
    debug!(due = due.len(), "advance_started");

    let mut report = AdvanceReport::default();
    for entry in due {
      match self.advance_entry(&entry, now).await {
        Ok(outcome) => report.outcomes.push(outcome),
        Err(source) => {
          let err = AdvanceError::new(entry.id, entry.process_id, &entry.task_id, source);
          if err.is_fatal() {
            error!(
              queue_id = entry.id,
              process_id = entry.process_id,
              task_id = %entry.task_id,
              error = %err.source,
              "process_stalled"
            );
          } else {
            warn!(
              queue_id = entry.id,
              process_id = entry.process_id,
              task_id = %entry.task_id,
              kind = ?err.kind,
              error = %err.source,
              "task_advance_failed"
            );
          }
          report.errors.push(err);
        }
      }
    }

    let tally = self.schedule_notifications(now).await?;
    report.reminders_sent = tally.reminders;
    report.escalations_sent = tally.escalations;

    info!(
      processed = report.outcomes.len(),
      completed = report.completed(),
      errors = report.errors.len(),
      "advance_completed"
    );
    Ok(report)
  }

  #[instrument(
    name = "advance_entry",
    skip(self, due, now),
    fields(
      queue_id = due.id,
      process_id = due.process_id,
      task_id = %due.task_id,
    )
  )]
  async fn advance_entry(
    &self,
    due: &QueueEntry,
    now: DateTime<Utc>,
  ) -> Result<QueueAdvanceOutcome, EngineError> {
    let _guard = self.lock_process(due.process_id).await;

    let mut entry = self.store.get_queue_entry(due.id).await?;
    if !entry.is_due() {
      return Ok(QueueAdvanceOutcome::Skipped {
        queue_id: entry.id,
        reason: SkipReason::NoLongerDue,
      });
    }
    let process = self.store.get_process(entry.process_id).await?;
    if !process.is_running() {
      return Ok(QueueAdvanceOutcome::Skipped {
        queue_id: entry.id,
        reason: SkipReason::ProcessComplete,
      });
    }

    let template = self.load_template(&process.template_id).await?;
    let task = template
      .task(&entry.task_id)
      .ok_or_else(|| EngineError::TemplateCorruption {
        template_id: template.id.clone(),
        message: format!("task '{}' does not exist", entry.task_id),
      })?;
    let plugin = self.plugins.resolve(&entry.task_type);

    let mut end_process = false;
    let branch = if entry.is_interactive {
      plugin.map_or(Branch::True, |p| p.completion_status())
    } else {
      let Some(mut plugin) = plugin else {
        return Err(EngineError::TemplateCorruption {
          template_id: template.id.clone(),
          message: format!("no plugin registered for task type '{}'", entry.task_type),
        });
      };

      let variables = self.variables_map(process.id).await?;
      let entries = self.store.list_queue_entries(process.id).await?;
      let ctx = TaskContext {
        template: &template,
        task,
        entry: &entry,
        variables: &variables,
        entries: &entries,
      };
      let effects = match plugin.execute(&ctx).await? {
        Execution::Waiting => {
          debug!(queue_id = entry.id, "task_waiting");
          return Ok(QueueAdvanceOutcome::Waiting { queue_id: entry.id });
        }
        Execution::Completed { effects } => effects,
      };

      entry.status = plugin.execution_status();
      entry.completed_at = Some(now);
      self.store.update_queue_entry(&entry).await?;

      for effect in effects {
        match effect {
          TaskEffect::SetVariable { name, value } => {
            self
              .set_variable_locked(&template, process.id, &name, &value)
              .await?
          }
          TaskEffect::EndProcess => end_process = true,
        }
      }
      self.complete_stage(process.id, task, now).await?;
      plugin.completion_status()
    };

    let created = self
      .next_step(&template, task, process.id, branch, now)
      .await?;

    // a loopback reached from this entry may already have regenerated it
    let mut consumed = self.store.get_queue_entry(entry.id).await?;
    if consumed.archived == ArchiveState::Active {
      consumed.archived = ArchiveState::Archived;
      self.store.update_queue_entry(&consumed).await?;
    }

    if end_process {
      self
        .finish_process(process.id, ProcessCompletion::Completed)
        .await?;
    }

    info!(
      queue_id = entry.id,
      process_id = process.id,
      task_id = %entry.task_id,
      status = ?entry.status,
      branch = ?branch,
      created = ?created,
      "task_completed"
    );
    Ok(QueueAdvanceOutcome::Completed {
      queue_id: entry.id,
      task_id: entry.task_id,
      created,
    })
  }
}
