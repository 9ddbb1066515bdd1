use async_trait::async_trait;
use maestro_template::{TaskDef, Template};

use crate::error::TaskError;
use crate::issue::Issue;
use crate::plugin::{Execution, TaskContext, TaskEffect, TaskPlugin};

/// `MaestroStart`: completes immediately.
#[derive(Debug, Default)]
pub struct StartPlugin;

#[async_trait]
impl TaskPlugin for StartPlugin {
  async fn execute(&mut self, _ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
    Ok(Execution::completed())
  }
}

/// `MaestroEnd`: completes the whole process.
#[derive(Debug, Default)]
pub struct EndPlugin;

#[async_trait]
impl TaskPlugin for EndPlugin {
  async fn execute(&mut self, _ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
    Ok(Execution::Completed {
      effects: vec![TaskEffect::EndProcess],
    })
  }
}

/// `MaestroInteractive`: a human task completed outside the advance pass.
#[derive(Debug, Default)]
pub struct InteractivePlugin;

#[async_trait]
impl TaskPlugin for InteractivePlugin {
  fn is_interactive(&self) -> bool {
    true
  }

  async fn execute(&mut self, _ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
    Ok(Execution::Waiting)
  }

  fn validate(&self, _template: &Template, task: &TaskDef) -> Vec<Issue> {
    if task.assigned.is_empty() {
      vec![Issue::warning(
        &task.id,
        "interactive task has no assignment and can only be completed by an administrator",
      )]
    } else {
      Vec::new()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builtin::testing::{entry, variables};
  use maestro_store::{ArchiveState, TaskStatus};
  use maestro_template::{AssignmentRule, TaskType};

  #[tokio::test]
  async fn test_end_requests_process_end() {
    let task = TaskDef::new("end", TaskType::End);
    let template = Template::new("t", vec![task.clone()], vec![]);
    let current = entry(1, "end", TaskStatus::Active, ArchiveState::Active);
    let vars = variables(&[]);
    let ctx = TaskContext {
      template: &template,
      task: &task,
      entry: &current,
      variables: &vars,
      entries: std::slice::from_ref(&current),
    };

    let execution = EndPlugin.execute(&ctx).await.unwrap();
    assert_eq!(
      execution,
      Execution::Completed {
        effects: vec![TaskEffect::EndProcess]
      }
    );
  }

  #[test]
  fn test_unassigned_interactive_task_warns() {
    let template = Template::new("t", vec![], vec![]);
    let bare = TaskDef::new("review", TaskType::Interactive);
    let issues = InteractivePlugin.validate(&template, &bare);
    assert_eq!(issues.len(), 1);
    assert!(!issues[0].is_failure());

    let assigned = bare.with_assignment(vec![AssignmentRule::Fixed {
      kind: "user".into(),
      id: "alice".to_string(),
    }]);
    assert!(InteractivePlugin.validate(&template, &assigned).is_empty());
  }
}
