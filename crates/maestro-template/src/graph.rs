use std::collections::{BTreeMap, HashMap};

use crate::task::TaskDef;

/// Reverse pointers of a template: for each task, the tasks pointing at it.
///
/// Both branches count, so a task reachable only through a false branch is
/// still pointed at.
#[derive(Debug, Clone)]
pub struct TaskGraph<'a> {
  tasks: &'a BTreeMap<String, TaskDef>,
  incoming: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> TaskGraph<'a> {
  pub fn new(tasks: &'a BTreeMap<String, TaskDef>) -> Self {
    let mut incoming: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
    for (from, task) in tasks {
      for to in task.pointers() {
        incoming.entry(to).or_default().push(from.as_str());
      }
    }
    Self { tasks, incoming }
  }

  /// Tasks pointing at `task_id`, in task id order. May include the task
  /// itself when it loops onto itself.
  pub fn upstream(&self, task_id: &str) -> &[&'a str] {
    self
      .incoming
      .get(task_id)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Every (from, to) pointer whose target is not a known task.
  pub fn dangling_pointers(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    let tasks = self.tasks;
    tasks.iter().flat_map(move |(from, task)| {
      task
        .pointers()
        .into_iter()
        .filter(move |to| !tasks.contains_key(*to))
        .map(move |to| (from.as_str(), to))
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::TaskType;

  fn tasks(defs: Vec<TaskDef>) -> BTreeMap<String, TaskDef> {
    defs.into_iter().map(|t| (t.id.clone(), t)).collect()
  }

  #[test]
  fn test_upstream_of_a_join() {
    let tasks = tasks(vec![
      TaskDef::new("start", TaskType::Start).with_next(&["a", "b"]),
      TaskDef::new("a", "Work").with_next(&["and"]),
      TaskDef::new("b", "Work").with_next(&["and"]),
      TaskDef::new("and", TaskType::And).with_next(&["end"]),
      TaskDef::new("end", TaskType::End),
    ]);
    let graph = TaskGraph::new(&tasks);

    assert_eq!(graph.upstream("and"), ["a", "b"]);
    assert_eq!(graph.upstream("end"), ["and"]);
    assert!(graph.upstream("start").is_empty());
    assert!(graph.upstream("missing").is_empty());
  }

  #[test]
  fn test_false_branch_and_self_loop_count() {
    let tasks = tasks(vec![
      TaskDef::new("start", TaskType::Start).with_next(&["check"]),
      TaskDef::new("check", TaskType::If)
        .with_next(&["end"])
        .with_false_next(&["check"]),
      TaskDef::new("end", TaskType::End),
    ]);
    let graph = TaskGraph::new(&tasks);

    assert_eq!(graph.upstream("check"), ["check", "start"]);
    assert_eq!(graph.upstream("end"), ["check"]);
  }

  #[test]
  fn test_dangling_pointers_are_reported() {
    let tasks = tasks(vec![
      TaskDef::new("start", TaskType::Start).with_next(&["ghost", "end"]),
      TaskDef::new("end", TaskType::End),
    ]);
    let graph = TaskGraph::new(&tasks);
    let dangling: Vec<_> = graph.dangling_pointers().collect();
    assert_eq!(dangling, vec![("start", "ghost")]);
  }
}
