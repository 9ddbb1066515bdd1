//! Assignment resolution.
//!
//! An interactive task's assignment rules are resolved against the process
//! variables when its queue entry is created. Variable-mode rules are
//! re-resolved whenever their variable changes while the task is open.

use std::collections::BTreeSet;

use maestro_store::{Assignment, NewAssignment, ProcessId, QueueEntry, QueueId};
use maestro_template::{ActorKind, AssignmentRule, NotificationKind, TaskDef, Template};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::orchestrator::Orchestrator;

/// Split a variable value holding a comma separated list of identifiers.
pub(crate) fn split_identifiers(value: &str) -> Vec<&str> {
  value
    .split(',')
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .collect()
}

/// One actor a rule resolved to.
pub(crate) struct Target<'a> {
  pub(crate) kind: &'a ActorKind,
  pub(crate) id: String,
  pub(crate) source_variable: Option<&'a str>,
}

impl Orchestrator {
  /// Expand rules into concrete actors using the current variable values.
  pub(crate) async fn expand_rules<'a>(
    &self,
    process_id: ProcessId,
    rules: impl Iterator<Item = &'a AssignmentRule>,
  ) -> Result<Vec<Target<'a>>, EngineError> {
    let mut targets = Vec::new();
    for rule in rules {
      match rule {
        AssignmentRule::Fixed { kind, id } => targets.push(Target {
          kind,
          id: id.clone(),
          source_variable: None,
        }),
        AssignmentRule::Variable { kind, variable } => {
          let value = self
            .store
            .get_variable(process_id, variable)
            .await?
            .unwrap_or_default();
          let ids = split_identifiers(&value);
          if ids.is_empty() {
            debug!(process_id, variable = %variable, "assignment_variable_empty");
          }
          targets.extend(ids.into_iter().map(|id| Target {
            kind,
            id: id.to_string(),
            source_variable: Some(variable.as_str()),
          }));
        }
      }
    }
    Ok(targets)
  }

  /// Create the assignment rows of a freshly created (or reset) entry.
  ///
  /// A user the identity resolver does not know is reported and skipped;
  /// the remaining clauses still resolve.
  pub(crate) async fn assign(
    &self,
    task: &TaskDef,
    entry: &QueueEntry,
  ) -> Result<Vec<Assignment>, EngineError> {
    let targets = self.expand_rules(entry.process_id, task.assigned.iter()).await?;

    let mut created = Vec::new();
    for target in targets {
      if *target.kind == ActorKind::User && self.identities.user_by_name(&target.id).await.is_none() {
        let err = EngineError::AssignmentLookup {
          task_id: task.id.clone(),
          kind: target.kind.to_string(),
          id: target.id.clone(),
        };
        warn!(
          process_id = entry.process_id,
          queue_id = entry.id,
          error = %err,
          "assignment_unresolved"
        );
        continue;
      }

      let assignment = self
        .store
        .create_assignment(&NewAssignment {
          queue_id: entry.id,
          process_id: entry.process_id,
          assign_type: target.kind.to_string(),
          assign_id: target.id.clone(),
          by_variable: target.source_variable.is_some(),
          source_variable: target.source_variable.map(str::to_string),
        })
        .await
        .map_err(|source| EngineError::Save {
          entity: "assignment",
          key: format!("{}/{}:{}", entry.id, target.kind, target.id),
          source,
        })?;
      created.push(assignment);
    }

    info!(
      process_id = entry.process_id,
      queue_id = entry.id,
      task_id = %task.id,
      assignees = created.len(),
      "task_assigned"
    );
    Ok(created)
  }

  /// Set a variable and reassign open tasks that depend on it.
  ///
  /// The caller holds the process lock.
  pub(crate) async fn set_variable_locked(
    &self,
    template: &Template,
    process_id: ProcessId,
    name: &str,
    value: &str,
  ) -> Result<(), EngineError> {
    if self.store.get_variable(process_id, name).await?.as_deref() == Some(value) {
      debug!(process_id, variable = %name, "variable_unchanged");
      return Ok(());
    }

    self
      .store
      .set_variable(process_id, name, value)
      .await
      .map_err(|source| EngineError::Save {
        entity: "process variable",
        key: name.to_string(),
        source,
      })?;
    debug!(process_id, variable = %name, "variable_set");

    let mut stale: BTreeSet<QueueId> = self
      .store
      .pending_variable_assignments(process_id, name)
      .await?
      .into_iter()
      .map(|a| a.queue_id)
      .collect();
    // entries whose variable was empty when they were assigned have no rows yet
    for entry in self.store.list_queue_entries(process_id).await? {
      let depends = template
        .task(&entry.task_id)
        .is_some_and(|t| t.assigned.iter().any(|r| r.variable() == Some(name)));
      if entry.is_interactive && entry.is_open() && depends {
        stale.insert(entry.id);
      }
    }

    for queue_id in stale {
      let entry = self.store.get_queue_entry(queue_id).await?;
      if !entry.is_open() {
        continue;
      }
      let Some(task) = template.task(&entry.task_id) else {
        continue;
      };

      self.store.delete_assignments(queue_id).await?;
      self.assign(task, &entry).await?;
      info!(
        process_id,
        queue_id,
        variable = %name,
        "task_reassigned"
      );
      if self.config.send_notifications {
        if let Err(e) = self
          .send_notification(task, &entry, NotificationKind::Assignment)
          .await
        {
          warn!(process_id, queue_id, error = %e, "assignment_notification_failed");
        }
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_split_identifiers() {
    assert_eq!(split_identifiers("alice, bob,,carol "), vec!["alice", "bob", "carol"]);
    assert!(split_identifiers(" ").is_empty());
  }
}
