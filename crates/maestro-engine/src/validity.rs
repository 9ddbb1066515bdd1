//! Template validity checking.

use maestro_plugin::{Issue, TaskPluginRegistry};
use maestro_template::{TaskType, Template};
use minijinja::Environment;
use serde::Serialize;

/// Outcome of a validity check, split by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
  pub failures: Vec<Issue>,
  pub warnings: Vec<Issue>,
}

impl ValidationReport {
  /// No failures; warnings do not block a template.
  pub fn is_valid(&self) -> bool {
    self.failures.is_empty()
  }

  fn push(&mut self, issue: Issue) {
    if issue.is_failure() {
      self.failures.push(issue);
    } else {
      self.warnings.push(issue);
    }
  }
}

/// Check a template's structure and let each task's plugin add findings.
pub fn validate(template: &Template, plugins: &TaskPluginRegistry) -> ValidationReport {
  let mut report = ValidationReport::default();
  let graph = template.graph();

  match template.tasks_of_type(&TaskType::Start).count() {
    1 => {}
    0 => report.push(Issue::template_failure("template has no start task")),
    n => report.push(Issue::template_failure(format!(
      "template has {} start tasks, expected exactly one",
      n
    ))),
  }

  match template.tasks_of_type(&TaskType::End).count() {
    1 => {}
    0 => report.push(Issue::template_failure("template has no end task")),
    n => report.push(Issue::template_failure(format!(
      "template has {} end tasks, expected exactly one",
      n
    ))),
  }

  for (from, to) in graph.dangling_pointers() {
    report.push(Issue::failure(
      from,
      format!("points to unknown task '{}'", to),
    ));
  }

  for task in template.tasks.values() {
    let upstream = graph.upstream(&task.id);
    let incoming = upstream.len();
    let from_others = upstream.iter().any(|from| *from != task.id);
    if task.task_type != TaskType::Start && !from_others {
      report.push(Issue::failure(&task.id, "no task points to this task"));
    }
    if incoming > 1 && !task.is_join() {
      report.push(Issue::warning(
        &task.id,
        format!(
          "{} tasks point here but it is not a join; revisits will regenerate the process",
          incoming
        ),
      ));
    }

    let rule_variables = task
      .assigned
      .iter()
      .chain(task.notifications.iter().map(|n| &n.target))
      .filter_map(|rule| rule.variable());
    for variable in rule_variables {
      if !template.declares_variable(variable) {
        report.push(Issue::failure(
          &task.id,
          format!("rule uses undeclared variable '{}'", variable),
        ));
      }
    }

    let env = Environment::new();
    for (kind, source) in &task.messages {
      if let Err(e) = env.template_from_str(source) {
        report.push(Issue::failure(
          &task.id,
          format!("{} message does not parse: {}", kind.as_str(), e),
        ));
      }
    }

    match plugins.resolve(task.task_type.as_str()) {
      Some(plugin) => {
        for issue in plugin.validate(template, task) {
          report.push(issue);
        }
      }
      None => report.push(Issue::failure(
        &task.id,
        format!("no plugin registered for task type '{}'", task.task_type),
      )),
    }
  }

  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use maestro_template::{AssignmentRule, NotificationKind, TaskDef, VariableDef};

  fn assigned() -> Vec<AssignmentRule> {
    vec![AssignmentRule::Fixed {
      kind: "user".into(),
      id: "alice".to_string(),
    }]
  }

  #[test]
  fn test_valid_template() {
    let template = Template::new(
      "ok",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["review"]),
        TaskDef::new("review", TaskType::Interactive)
          .with_next(&["end"])
          .with_assignment(assigned()),
        TaskDef::new("end", TaskType::End),
      ],
      vec![],
    );
    let report = validate(&template, &TaskPluginRegistry::with_builtins());
    assert!(report.is_valid(), "{:?}", report);
    assert!(report.warnings.is_empty());
  }

  #[test]
  fn test_missing_end_task_fails() {
    let template = Template::new(
      "no-end",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["a"]),
        TaskDef::new("a", TaskType::Or),
      ],
      vec![],
    );
    let report = validate(&template, &TaskPluginRegistry::with_builtins());
    assert!(!report.is_valid());
    assert!(
      report
        .failures
        .iter()
        .any(|f| f.message == "template has no end task")
    );
  }

  #[test]
  fn test_structural_findings() {
    let template = Template::new(
      "broken",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["a", "b", "ghost"]),
        TaskDef::new("a", TaskType::Or).with_next(&["merge"]),
        TaskDef::new("b", TaskType::Or).with_next(&["merge"]),
        TaskDef::new("merge", TaskType::Interactive)
          .with_next(&["end"])
          .with_assignment(vec![AssignmentRule::Variable {
            kind: "role".into(),
            variable: "approver".to_string(),
          }]),
        TaskDef::new("orphan", "CustomThing").with_next(&["end"]),
        TaskDef::new("end", TaskType::End),
      ],
      vec![VariableDef::new("other", "")],
    );
    let report = validate(&template, &TaskPluginRegistry::with_builtins());

    let failed_tasks: Vec<_> = report
      .failures
      .iter()
      .filter_map(|f| f.task_id.as_deref())
      .collect();
    // dangling pointer, undeclared variable, unreachable orphan, unknown plugin
    assert!(failed_tasks.contains(&"start"));
    assert!(failed_tasks.contains(&"merge"));
    assert_eq!(failed_tasks.iter().filter(|t| **t == "orphan").count(), 2);

    let warned: Vec<_> = report
      .warnings
      .iter()
      .filter_map(|w| w.task_id.as_deref())
      .collect();
    // both have two inputs without being joins
    assert_eq!(warned, vec!["end", "merge"]);
  }

  #[test]
  fn test_two_start_tasks_fail() {
    let template = Template::new(
      "two-starts",
      vec![
        TaskDef::new("s1", TaskType::Start).with_next(&["end"]),
        TaskDef::new("s2", TaskType::Start).with_next(&["end"]),
        TaskDef::new("end", TaskType::End),
      ],
      vec![],
    );
    let report = validate(&template, &TaskPluginRegistry::with_builtins());
    assert_eq!(report.failures.len(), 1);
    // end has two inputs and is not a join
    assert_eq!(report.warnings.len(), 1);
  }

  #[test]
  fn test_self_loop_does_not_make_a_task_reachable() {
    let template = Template::new(
      "island",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["end"]),
        TaskDef::new("island", TaskType::Or).with_next(&["island", "end"]),
        TaskDef::new("end", TaskType::End),
      ],
      vec![],
    );
    let report = validate(&template, &TaskPluginRegistry::with_builtins());
    assert!(!report.is_valid());
    assert!(report.failures.iter().any(|f| {
      f.task_id.as_deref() == Some("island") && f.message == "no task points to this task"
    }));
  }

  #[test]
  fn test_unparseable_message_override_fails() {
    let mut review = TaskDef::new("review", TaskType::Interactive)
      .with_next(&["end"])
      .with_assignment(assigned());
    review
      .messages
      .insert(NotificationKind::Assignment, "{{ unclosed".to_string());
    let template = Template::new(
      "bad-message",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["review"]),
        review,
        TaskDef::new("end", TaskType::End),
      ],
      vec![],
    );
    let report = validate(&template, &TaskPluginRegistry::with_builtins());
    assert_eq!(report.failures.len(), 1, "{:?}", report);
    assert_eq!(report.failures[0].task_id.as_deref(), Some("review"));
    assert!(
      report.failures[0]
        .message
        .starts_with("assignment message does not parse")
    );
  }
}
