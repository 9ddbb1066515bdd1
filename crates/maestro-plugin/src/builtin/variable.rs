use async_trait::async_trait;
use maestro_template::{TaskDef, Template};

use crate::error::TaskError;
use crate::issue::Issue;
use crate::plugin::{Execution, TaskContext, TaskEffect, TaskPlugin};

/// `MaestroSetProcessVariable`: sets `data.variable` to `data.value`.
#[derive(Debug, Default)]
pub struct SetProcessVariablePlugin;

#[async_trait]
impl TaskPlugin for SetProcessVariablePlugin {
  async fn execute(&mut self, ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
    let name = ctx.data("variable")?;
    let value = ctx.task.data.get("value").cloned().unwrap_or_default();
    Ok(Execution::Completed {
      effects: vec![TaskEffect::SetVariable {
        name: name.to_string(),
        value,
      }],
    })
  }

  fn validate(&self, template: &Template, task: &TaskDef) -> Vec<Issue> {
    match task.data.get("variable") {
      None => vec![Issue::failure(&task.id, "no 'variable' to set")],
      Some(variable) if !template.declares_variable(variable) => vec![Issue::failure(
        &task.id,
        format!("sets undeclared variable '{}'", variable),
      )],
      Some(_) => Vec::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builtin::testing::{entry, variables};
  use maestro_store::{ArchiveState, TaskStatus};
  use maestro_template::{TaskType, VariableDef};

  #[tokio::test]
  async fn test_emits_set_variable_effect() {
    let task = TaskDef::new("route", TaskType::SetProcessVariable)
      .with_data("variable", "approver")
      .with_data("value", "finance");
    let template = Template::new("t", vec![task.clone()], vec![]);
    let current = entry(1, "route", TaskStatus::Active, ArchiveState::Active);
    let vars = variables(&[]);
    let ctx = TaskContext {
      template: &template,
      task: &task,
      entry: &current,
      variables: &vars,
      entries: std::slice::from_ref(&current),
    };

    let execution = SetProcessVariablePlugin.execute(&ctx).await.unwrap();
    assert_eq!(
      execution,
      Execution::Completed {
        effects: vec![TaskEffect::SetVariable {
          name: "approver".to_string(),
          value: "finance".to_string(),
        }]
      }
    );
  }

  #[test]
  fn test_requires_declared_variable() {
    let template = Template::new("t", vec![], vec![VariableDef::new("approver", "")]);
    let declared = TaskDef::new("route", TaskType::SetProcessVariable).with_data("variable", "approver");
    let undeclared = TaskDef::new("route", TaskType::SetProcessVariable).with_data("variable", "other");

    assert!(SetProcessVariablePlugin.validate(&template, &declared).is_empty());
    assert!(SetProcessVariablePlugin.validate(&template, &undeclared)[0].is_failure());
  }
}
