use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::graph::TaskGraph;
use crate::task::{TaskDef, TaskType};

/// A process variable declared by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDef {
  pub name: String,
  #[serde(default)]
  pub default: String,
}

impl VariableDef {
  pub fn new(name: impl Into<String>, default: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      default: default.into(),
    }
  }
}

/// An immutable workflow template.
///
/// `validated` is only ever set by the validity checker; processes can only
/// be started from validated templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
  pub id: String,
  #[serde(default)]
  pub label: String,
  #[serde(with = "task_list")]
  pub tasks: BTreeMap<String, TaskDef>,
  #[serde(default)]
  pub variables: Vec<VariableDef>,
  #[serde(default)]
  pub validated: bool,
}

impl Template {
  pub fn new(
    id: impl Into<String>,
    tasks: impl IntoIterator<Item = TaskDef>,
    variables: Vec<VariableDef>,
  ) -> Self {
    let id = id.into();
    Self {
      label: id.clone(),
      id,
      tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
      variables,
      validated: false,
    }
  }

  /// Parse a template from its JSON document.
  pub fn from_json(json: &str) -> Result<Self, TemplateError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn to_json(&self) -> Result<String, TemplateError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Build the pointer graph for traversal.
  pub fn graph(&self) -> TaskGraph<'_> {
    TaskGraph::new(&self.tasks)
  }

  pub fn task(&self, task_id: &str) -> Option<&TaskDef> {
    self.tasks.get(task_id)
  }

  /// Like [`Template::task`], but a missing task is an error.
  pub fn require_task(&self, task_id: &str) -> Result<&TaskDef, TemplateError> {
    self
      .task(task_id)
      .ok_or_else(|| TemplateError::TaskNotFound(task_id.to_string()))
  }

  /// The task processes start at.
  pub fn start_task(&self) -> Result<&TaskDef, TemplateError> {
    self
      .tasks
      .values()
      .find(|t| t.task_type == TaskType::Start)
      .ok_or_else(|| TemplateError::NoStartTask(self.id.clone()))
  }

  /// Tasks whose next step or next false step points at `task_id`.
  pub fn task_pointers(&self, task_id: &str) -> Vec<&str> {
    self.graph().upstream(task_id).to_vec()
  }

  pub fn declares_variable(&self, name: &str) -> bool {
    self.variables.iter().any(|v| v.name == name)
  }

  pub fn tasks_of_type<'a>(&'a self, task_type: &'a TaskType) -> impl Iterator<Item = &'a TaskDef> {
    self.tasks.values().filter(move |t| &t.task_type == task_type)
  }
}

/// Serde adapter storing the task map as a list of tasks.
mod task_list {
  use std::collections::BTreeMap;

  use serde::ser::SerializeSeq;
  use serde::{Deserialize, Deserializer, Serializer};

  use crate::error::TemplateError;
  use crate::task::TaskDef;

  pub fn serialize<S: Serializer>(tasks: &BTreeMap<String, TaskDef>, s: S) -> Result<S::Ok, S::Error> {
    let mut seq = s.serialize_seq(Some(tasks.len()))?;
    for task in tasks.values() {
      seq.serialize_element(task)?;
    }
    seq.end()
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, TaskDef>, D::Error> {
    let list = Vec::<TaskDef>::deserialize(d)?;
    let mut tasks = BTreeMap::new();
    for task in list {
      if tasks.contains_key(&task.id) {
        return Err(serde::de::Error::custom(TemplateError::DuplicateTask(task.id)));
      }
      tasks.insert(task.id.clone(), task);
    }
    Ok(tasks)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TEMPLATE: &str = r#"{
    "id": "expense",
    "label": "Expense approval",
    "variables": [{ "name": "approver", "default": "managers" }],
    "tasks": [
      { "id": "start", "type": "MaestroStart", "next_step": ["review"] },
      {
        "id": "review",
        "type": "MaestroInteractive",
        "next_step": ["end"],
        "assigned": "role:variable:approver"
      },
      { "id": "end", "type": "MaestroEnd" }
    ]
  }"#;

  #[test]
  fn test_parse_template_document() {
    let template = Template::from_json(TEMPLATE).unwrap();

    assert_eq!(template.label, "Expense approval");
    assert!(!template.validated);
    assert_eq!(template.start_task().unwrap().id, "start");
    assert_eq!(template.task_pointers("end"), vec!["review"]);
    assert!(template.declares_variable("approver"));
    assert!(template.require_task("nope").is_err());
  }

  #[test]
  fn test_duplicate_task_ids_are_rejected() {
    let json = r#"{
      "id": "dup",
      "tasks": [
        { "id": "start", "type": "MaestroStart" },
        { "id": "start", "type": "MaestroEnd" }
      ]
    }"#;
    let err = Template::from_json(json).unwrap_err();
    assert!(err.to_string().contains("more than once"));
  }

  #[test]
  fn test_serialized_template_parses_back() {
    let template = Template::from_json(TEMPLATE).unwrap();
    let json = template.to_json().unwrap();
    assert!(json.contains("role:variable:approver"));
    assert_eq!(Template::from_json(&json).unwrap(), template);
  }

  #[test]
  fn test_missing_start_task() {
    let template = Template::new("empty", vec![TaskDef::new("end", TaskType::End)], vec![]);
    assert!(matches!(
      template.start_task(),
      Err(TemplateError::NoStartTask(_))
    ));
  }
}
