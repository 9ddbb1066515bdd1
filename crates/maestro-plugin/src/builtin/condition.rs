use std::cmp::Ordering;

use async_trait::async_trait;
use maestro_template::{Branch, TaskDef, Template};

use crate::error::TaskError;
use crate::issue::Issue;
use crate::plugin::{Execution, TaskContext, TaskPlugin};

const OPERATORS: [&str; 6] = ["==", "!=", ">", "<", ">=", "<="];

/// `MaestroIf`: compares a process variable against a value.
///
/// Configured through `data.variable`, `data.operator` (defaults to `==`)
/// and `data.value`. Values that both parse as numbers are compared
/// numerically, anything else as strings. A false comparison continues
/// through the task's false branch.
#[derive(Debug, Default)]
pub struct IfPlugin {
  branch: Branch,
}

fn compare(left: &str, right: &str) -> Option<Ordering> {
  match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
    (Ok(l), Ok(r)) => l.partial_cmp(&r),
    _ => Some(left.cmp(right)),
  }
}

fn evaluate(left: &str, operator: &str, right: &str) -> Option<bool> {
  let ordering = compare(left, right)?;
  let result = match operator {
    "==" => ordering == Ordering::Equal,
    "!=" => ordering != Ordering::Equal,
    ">" => ordering == Ordering::Greater,
    "<" => ordering == Ordering::Less,
    ">=" => ordering != Ordering::Less,
    "<=" => ordering != Ordering::Greater,
    _ => return None,
  };
  Some(result)
}

#[async_trait]
impl TaskPlugin for IfPlugin {
  async fn execute(&mut self, ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
    let variable = ctx.data("variable")?;
    let operator = ctx.task.data.get("operator").map_or("==", String::as_str);
    let expected = ctx.task.data.get("value").map_or("", String::as_str);
    let actual = ctx.variable(variable).unwrap_or_default();

    let result = evaluate(actual, operator, expected).ok_or_else(|| TaskError::InvalidData {
      task_id: ctx.task.id.clone(),
      field: "operator".to_string(),
      message: format!("cannot compare '{}' {} '{}'", actual, operator, expected),
    })?;

    self.branch = if result { Branch::True } else { Branch::False };
    tracing::debug!(
      process_id = ctx.entry.process_id,
      task_id = %ctx.task.id,
      variable = %variable,
      result,
      "condition_evaluated"
    );
    Ok(Execution::completed())
  }

  fn completion_status(&self) -> Branch {
    self.branch
  }

  fn validate(&self, template: &Template, task: &TaskDef) -> Vec<Issue> {
    let mut issues = Vec::new();
    match task.data.get("variable") {
      None => issues.push(Issue::failure(&task.id, "condition has no 'variable' to test")),
      Some(variable) if !template.declares_variable(variable) => issues.push(Issue::failure(
        &task.id,
        format!("condition tests undeclared variable '{}'", variable),
      )),
      Some(_) => {}
    }
    if let Some(operator) = task.data.get("operator") {
      if !OPERATORS.contains(&operator.as_str()) {
        issues.push(Issue::failure(
          &task.id,
          format!("unknown operator '{}'", operator),
        ));
      }
    }
    if task.next_false_step.is_empty() {
      issues.push(Issue::warning(
        &task.id,
        "condition has no false branch; a false result ends this path",
      ));
    }
    issues
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builtin::testing::{entry, variables};
  use maestro_store::{ArchiveState, TaskStatus};
  use maestro_template::{TaskType, VariableDef};

  async fn branch_for(amount: &str, operator: &str, value: &str) -> Branch {
    let task = TaskDef::new("check", TaskType::If)
      .with_data("variable", "amount")
      .with_data("operator", operator)
      .with_data("value", value);
    let template = Template::new("t", vec![task.clone()], vec![]);
    let current = entry(1, "check", TaskStatus::Active, ArchiveState::Active);
    let vars = variables(&[("amount", amount)]);
    let ctx = TaskContext {
      template: &template,
      task: &task,
      entry: &current,
      variables: &vars,
      entries: std::slice::from_ref(&current),
    };
    let mut plugin = IfPlugin::default();
    plugin.execute(&ctx).await.unwrap();
    plugin.completion_status()
  }

  #[tokio::test]
  async fn test_numeric_comparison() {
    assert_eq!(branch_for("1500", ">", "1000").await, Branch::True);
    assert_eq!(branch_for("900", ">", "1000").await, Branch::False);
    assert_eq!(branch_for("10", "<=", "10.0").await, Branch::True);
  }

  #[tokio::test]
  async fn test_string_comparison() {
    assert_eq!(branch_for("approved", "==", "approved").await, Branch::True);
    assert_eq!(branch_for("rejected", "!=", "approved").await, Branch::True);
  }

  #[tokio::test]
  async fn test_missing_variable_key_fails() {
    let task = TaskDef::new("check", TaskType::If);
    let template = Template::new("t", vec![task.clone()], vec![]);
    let current = entry(1, "check", TaskStatus::Active, ArchiveState::Active);
    let vars = variables(&[]);
    let ctx = TaskContext {
      template: &template,
      task: &task,
      entry: &current,
      variables: &vars,
      entries: std::slice::from_ref(&current),
    };
    let err = IfPlugin::default().execute(&ctx).await.unwrap_err();
    assert!(matches!(err, TaskError::MissingData { .. }));
  }

  #[test]
  fn test_validate_condition() {
    let template = Template::new("t", vec![], vec![VariableDef::new("amount", "0")]);
    let good = TaskDef::new("check", TaskType::If)
      .with_data("variable", "amount")
      .with_next(&["a"])
      .with_false_next(&["b"]);
    assert!(IfPlugin::default().validate(&template, &good).is_empty());

    let bad = TaskDef::new("check", TaskType::If)
      .with_data("variable", "total")
      .with_data("operator", "=~");
    let issues = IfPlugin::default().validate(&template, &bad);
    assert_eq!(issues.iter().filter(|i| i.is_failure()).count(), 2);
  }
}
