use std::collections::HashMap;
use std::sync::Arc;

use maestro_template::TaskType;

use crate::builtin::{
  AndPlugin, EndPlugin, IfPlugin, InteractivePlugin, OrPlugin, SetProcessVariablePlugin,
  StartPlugin,
};
use crate::plugin::TaskPlugin;

/// Builds a fresh plugin instance for one execution.
pub type TaskPluginFactory = Arc<dyn Fn() -> Box<dyn TaskPlugin> + Send + Sync>;

/// Explicit map from task type name to plugin factory.
#[derive(Clone, Default)]
pub struct TaskPluginRegistry {
  factories: HashMap<String, TaskPluginFactory>,
}

impl TaskPluginRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with every built-in task type registered.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register(TaskType::Start.as_str(), || StartPlugin);
    registry.register(TaskType::End.as_str(), || EndPlugin);
    registry.register(TaskType::And.as_str(), || AndPlugin);
    registry.register(TaskType::Or.as_str(), || OrPlugin);
    registry.register(TaskType::If.as_str(), IfPlugin::default);
    registry.register(
      TaskType::SetProcessVariable.as_str(),
      || SetProcessVariablePlugin,
    );
    registry.register(TaskType::Interactive.as_str(), || InteractivePlugin);
    registry
  }

  /// Register (or replace) the plugin for a task type.
  pub fn register<P, F>(&mut self, task_type: impl Into<String>, factory: F)
  where
    P: TaskPlugin + 'static,
    F: Fn() -> P + Send + Sync + 'static,
  {
    let task_type = task_type.into();
    tracing::debug!(task_type = %task_type, "task_plugin_registered");
    self
      .factories
      .insert(task_type, Arc::new(move || Box::new(factory()) as Box<dyn TaskPlugin>));
  }

  /// Build a plugin for the task type, if one is registered.
  pub fn resolve(&self, task_type: &str) -> Option<Box<dyn TaskPlugin>> {
    self.factories.get(task_type).map(|factory| factory())
  }

  pub fn contains(&self, task_type: &str) -> bool {
    self.factories.contains_key(task_type)
  }

  /// Registered task type names, sorted.
  pub fn task_types(&self) -> Vec<&str> {
    let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
    types.sort_unstable();
    types
  }
}

impl std::fmt::Debug for TaskPluginRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TaskPluginRegistry")
      .field("task_types", &self.task_types())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::TaskError;
  use crate::plugin::{Execution, TaskContext};
  use async_trait::async_trait;

  struct Review;

  #[async_trait]
  impl TaskPlugin for Review {
    fn is_interactive(&self) -> bool {
      true
    }

    async fn execute(&mut self, _ctx: &TaskContext<'_>) -> Result<Execution, TaskError> {
      Ok(Execution::Waiting)
    }
  }

  #[test]
  fn test_builtins_are_registered() {
    let registry = TaskPluginRegistry::with_builtins();
    assert!(registry.contains("MaestroStart"));
    assert!(registry.contains("MaestroSetProcessVariable"));
    assert_eq!(registry.task_types().len(), 7);
    assert!(registry.resolve("MaestroInteractive").unwrap().is_interactive());
    assert!(!registry.resolve("MaestroAnd").unwrap().is_interactive());
    assert!(registry.resolve("ContentReview").is_none());
  }

  #[test]
  fn test_register_custom_type() {
    let mut registry = TaskPluginRegistry::new();
    registry.register("ContentReview", || Review);
    assert!(registry.resolve("ContentReview").unwrap().is_interactive());
    assert_eq!(registry.task_types(), vec!["ContentReview"]);
  }
}
