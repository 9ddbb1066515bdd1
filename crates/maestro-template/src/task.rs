use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rule::{AssignmentRule, NotificationKind, NotificationRule};

/// The task type, mapping a task to its plugin.
///
/// The built-in types are named the way templates spell them
/// (`MaestroStart`, `MaestroAnd`, ...); anything else is a custom type
/// resolved through the plugin registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
  Start,
  End,
  And,
  Or,
  If,
  SetProcessVariable,
  Interactive,
  Custom(String),
}

impl TaskType {
  pub fn as_str(&self) -> &str {
    match self {
      TaskType::Start => "MaestroStart",
      TaskType::End => "MaestroEnd",
      TaskType::And => "MaestroAnd",
      TaskType::Or => "MaestroOr",
      TaskType::If => "MaestroIf",
      TaskType::SetProcessVariable => "MaestroSetProcessVariable",
      TaskType::Interactive => "MaestroInteractive",
      TaskType::Custom(name) => name,
    }
  }

  /// AND/OR joins gate on several incoming branches.
  pub fn is_join(&self) -> bool {
    matches!(self, TaskType::And | TaskType::Or)
  }
}

impl From<&str> for TaskType {
  fn from(value: &str) -> Self {
    match value {
      "MaestroStart" => TaskType::Start,
      "MaestroEnd" => TaskType::End,
      "MaestroAnd" => TaskType::And,
      "MaestroOr" => TaskType::Or,
      "MaestroIf" => TaskType::If,
      "MaestroSetProcessVariable" => TaskType::SetProcessVariable,
      "MaestroInteractive" => TaskType::Interactive,
      other => TaskType::Custom(other.to_string()),
    }
  }
}

impl From<String> for TaskType {
  fn from(value: String) -> Self {
    TaskType::from(value.as_str())
  }
}

impl From<TaskType> for String {
  fn from(value: TaskType) -> Self {
    value.as_str().to_string()
  }
}

impl fmt::Display for TaskType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Which successor list a completed task continues through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
  #[default]
  True,
  False,
}

/// A single task in a template graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub id: String,
  #[serde(rename = "type")]
  pub task_type: TaskType,
  #[serde(default)]
  pub label: String,
  /// Successors taken on the default (true) branch.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub next_step: Vec<String>,
  /// Successors taken when the task completes on the false branch.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub next_false_step: Vec<String>,
  #[serde(default, with = "crate::rule::assignment_spec")]
  pub assigned: Vec<AssignmentRule>,
  #[serde(default, with = "crate::rule::notification_spec")]
  pub notifications: Vec<NotificationRule>,
  #[serde(default)]
  pub reminder_interval_days: u32,
  #[serde(default)]
  pub escalation_interval_days: u32,
  #[serde(default)]
  pub participate_in_workflow_status_stage: bool,
  #[serde(default)]
  pub workflow_status_stage_number: u32,
  #[serde(default)]
  pub workflow_status_stage_message: String,
  /// Free-form plugin configuration.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub data: BTreeMap<String, String>,
  /// Message template overrides per notification event.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub messages: BTreeMap<NotificationKind, String>,
}

impl TaskDef {
  pub fn new(id: impl Into<String>, task_type: impl Into<TaskType>) -> Self {
    let id = id.into();
    Self {
      label: id.clone(),
      id,
      task_type: task_type.into(),
      next_step: Vec::new(),
      next_false_step: Vec::new(),
      assigned: Vec::new(),
      notifications: Vec::new(),
      reminder_interval_days: 0,
      escalation_interval_days: 0,
      participate_in_workflow_status_stage: false,
      workflow_status_stage_number: 0,
      workflow_status_stage_message: String::new(),
      data: BTreeMap::new(),
      messages: BTreeMap::new(),
    }
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  pub fn with_next(mut self, next: &[&str]) -> Self {
    self.next_step = next.iter().map(|s| s.to_string()).collect();
    self
  }

  pub fn with_false_next(mut self, next: &[&str]) -> Self {
    self.next_false_step = next.iter().map(|s| s.to_string()).collect();
    self
  }

  pub fn with_assignment(mut self, rules: Vec<AssignmentRule>) -> Self {
    self.assigned = rules;
    self
  }

  pub fn with_notifications(mut self, rules: Vec<NotificationRule>) -> Self {
    self.notifications = rules;
    self
  }

  pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.data.insert(key.into(), value.into());
    self
  }

  pub fn with_stage(mut self, number: u32, message: impl Into<String>) -> Self {
    self.participate_in_workflow_status_stage = true;
    self.workflow_status_stage_number = number;
    self.workflow_status_stage_message = message.into();
    self
  }

  pub fn with_reminders(mut self, reminder_days: u32, escalation_days: u32) -> Self {
    self.reminder_interval_days = reminder_days;
    self.escalation_interval_days = escalation_days;
    self
  }

  /// Successors for the given completion branch.
  pub fn successors(&self, branch: Branch) -> &[String] {
    match branch {
      Branch::True => &self.next_step,
      Branch::False => &self.next_false_step,
    }
  }

  pub fn is_join(&self) -> bool {
    self.task_type.is_join()
  }

  /// Every task this task points at, on either branch, without duplicates.
  pub fn pointers(&self) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for next in self.next_step.iter().chain(&self.next_false_step) {
      if !out.contains(&next.as_str()) {
        out.push(next);
      }
    }
    out
  }

  /// Notification rules registered for one event.
  pub fn notifications_for(&self, event: NotificationKind) -> impl Iterator<Item = &NotificationRule> {
    self.notifications.iter().filter(move |n| n.event == event)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_task_type_round_trips_custom_names() {
    assert_eq!(TaskType::from("MaestroAnd"), TaskType::And);
    assert!(TaskType::from("MaestroOr").is_join());
    let custom = TaskType::from("ContentReview");
    assert_eq!(custom, TaskType::Custom("ContentReview".to_string()));
    assert_eq!(String::from(custom), "ContentReview");
  }

  #[test]
  fn test_deserialize_task_parses_rules_once() {
    let task: TaskDef = serde_json::from_value(json!({
      "id": "review",
      "type": "MaestroInteractive",
      "label": "Review",
      "next_step": ["end"],
      "next_false_step": ["rework"],
      "assigned": "user:fixed:alice,role:variable:approver",
      "notifications": "role:fixed:managers:escalation",
      "escalation_interval_days": 3,
      "messages": { "escalation": "{{ task_label }} is overdue" }
    }))
    .unwrap();

    assert_eq!(task.task_type, TaskType::Interactive);
    assert_eq!(task.assigned.len(), 2);
    assert_eq!(task.successors(Branch::False), ["rework".to_string()]);
    assert_eq!(task.notifications_for(NotificationKind::Escalation).count(), 1);
    assert_eq!(
      task.messages.get(&NotificationKind::Escalation).map(String::as_str),
      Some("{{ task_label }} is overdue")
    );
  }

  #[test]
  fn test_malformed_assignment_fails_deserialization() {
    let result: Result<TaskDef, _> = serde_json::from_value(json!({
      "id": "review",
      "type": "MaestroInteractive",
      "assigned": "user:alice"
    }));
    assert!(result.is_err());
  }

  #[test]
  fn test_pointers_deduplicate_branches() {
    let task = TaskDef::new("if", TaskType::If)
      .with_next(&["a", "b"])
      .with_false_next(&["a", "c"]);
    assert_eq!(task.pointers(), vec!["a", "b", "c"]);
  }
}
