use async_trait::async_trait;
use maestro_store::{ArchiveState, TaskStatus};
use maestro_template::{TaskDef, Template};

use crate::error::TaskError;
use crate::issue::Issue;
use crate::plugin::{Execution, TaskContext, TaskPlugin};

/// `MaestroAnd`: waits until every task pointing at it has completed.
///
/// A feeding task counts once one of its entries has been consumed by the
/// next-step resolver with a successful status. Regenerated entries belong
/// to a superseded pass through the graph and do not count.
#[derive(Debug, Default)]
pub struct AndPlugin;

#[async_trait]
impl TaskPlugin for AndPlugin {
  async fn execute(&mut self, ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
    let pointers = ctx.template.task_pointers(&ctx.task.id);
    let pending: Vec<&str> = pointers
      .into_iter()
      .filter(|feeder| {
        !ctx.entries_for(feeder).any(|e| {
          e.archived == ArchiveState::Archived && e.status == TaskStatus::Success
        })
      })
      .collect();

    if pending.is_empty() {
      Ok(Execution::completed())
    } else {
      tracing::debug!(
        process_id = ctx.entry.process_id,
        task_id = %ctx.task.id,
        pending = ?pending,
        "join_waiting"
      );
      Ok(Execution::Waiting)
    }
  }

  fn validate(&self, template: &Template, task: &TaskDef) -> Vec<Issue> {
    if template.task_pointers(&task.id).len() < 2 {
      vec![Issue::warning(
        &task.id,
        "AND join has fewer than two incoming tasks",
      )]
    } else {
      Vec::new()
    }
  }
}

/// `MaestroOr`: continues as soon as any incoming branch arrives.
#[derive(Debug, Default)]
pub struct OrPlugin;

#[async_trait]
impl TaskPlugin for OrPlugin {
  async fn execute(&mut self, _ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
    Ok(Execution::completed())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builtin::testing::{entry, variables};
  use maestro_template::TaskType;

  fn template() -> Template {
    Template::new(
      "join",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["a", "b"]),
        TaskDef::new("a", TaskType::Start).with_next(&["join"]),
        TaskDef::new("b", TaskType::Interactive).with_next(&["join"]),
        TaskDef::new("join", TaskType::And).with_next(&["end"]),
        TaskDef::new("end", TaskType::End),
      ],
      vec![],
    )
  }

  async fn run(entries: &[maestro_store::QueueEntry]) -> Execution {
    let template = template();
    let task = template.task("join").unwrap();
    let vars = variables(&[]);
    let current = entries.last().unwrap();
    let ctx = TaskContext {
      template: &template,
      task,
      entry: current,
      variables: &vars,
      entries,
    };
    AndPlugin.execute(&ctx).await.unwrap()
  }

  #[tokio::test]
  async fn test_and_waits_for_every_feeder() {
    let entries = vec![
      entry(1, "a", TaskStatus::Success, ArchiveState::Archived),
      entry(2, "b", TaskStatus::Active, ArchiveState::Active),
      entry(3, "join", TaskStatus::Active, ArchiveState::Active),
    ];
    assert_eq!(run(&entries).await, Execution::Waiting);
  }

  #[tokio::test]
  async fn test_and_ignores_regenerated_feeders() {
    let entries = vec![
      entry(1, "a", TaskStatus::Success, ArchiveState::Archived),
      entry(2, "b", TaskStatus::Success, ArchiveState::Regenerated),
      entry(3, "join", TaskStatus::Active, ArchiveState::Active),
    ];
    assert_eq!(run(&entries).await, Execution::Waiting);
  }

  #[tokio::test]
  async fn test_and_completes_when_all_feeders_consumed() {
    let entries = vec![
      entry(1, "a", TaskStatus::Success, ArchiveState::Archived),
      entry(2, "b", TaskStatus::Success, ArchiveState::Archived),
      entry(3, "join", TaskStatus::Active, ArchiveState::Active),
    ];
    assert_eq!(run(&entries).await, Execution::completed());
  }

  #[test]
  fn test_single_input_and_warns() {
    let template = Template::new(
      "t",
      vec![
        TaskDef::new("a", TaskType::Start).with_next(&["join"]),
        TaskDef::new("join", TaskType::And),
      ],
      vec![],
    );
    let issues = AndPlugin.validate(&template, template.task("join").unwrap());
    assert_eq!(issues.len(), 1);
  }
}
