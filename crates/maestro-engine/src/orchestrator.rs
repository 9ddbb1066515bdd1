use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use maestro_plugin::{Issue, TaskPluginRegistry};
use maestro_store::{
  EntityIdentifier, NewProcess, Process, ProcessCompletion, ProcessId, ProcessStatusStage,
  ProcessVariable, QueueEntry, QueueId, Store, TaskStatus,
};
use maestro_template::Template;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

use crate::config::OrchestratorConfig;
use crate::error::EngineError;
use crate::identity::{IdentityResolver, StaticDirectory};
use crate::notify::{MessageRenderer, NoopNotifier, Notifier};
use crate::validity::{self, ValidationReport};

/// Result of asking for a new process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessLaunch {
  Started(ProcessId),
  /// The template is not validated; nothing was created.
  Rejected(ValidationReport),
}

impl ProcessLaunch {
  pub fn process_id(&self) -> Option<ProcessId> {
    match self {
      ProcessLaunch::Started(process_id) => Some(*process_id),
      ProcessLaunch::Rejected(_) => None,
    }
  }
}

/// Drives processes through their templates.
///
/// All mutations of one process are serialized through a per-process lock,
/// and advance passes are serialized with each other, so a queue entry is
/// never executed twice.
pub struct Orchestrator {
  pub(crate) store: Arc<dyn Store>,
  pub(crate) plugins: TaskPluginRegistry,
  pub(crate) identities: Arc<dyn IdentityResolver>,
  pub(crate) notifier: Arc<dyn Notifier>,
  pub(crate) messages: MessageRenderer,
  pub(crate) config: OrchestratorConfig,
  process_locks: Mutex<HashMap<ProcessId, Arc<Mutex<()>>>>,
  pub(crate) pass_lock: Mutex<()>,
}

impl Orchestrator {
  /// Create an orchestrator with an empty identity directory, no
  /// notification delivery and the default configuration.
  pub fn new(store: Arc<dyn Store>, plugins: TaskPluginRegistry) -> Self {
    Self {
      store,
      plugins,
      identities: Arc::new(StaticDirectory::new()),
      notifier: Arc::new(NoopNotifier),
      messages: MessageRenderer::new(),
      config: OrchestratorConfig::default(),
      process_locks: Mutex::new(HashMap::new()),
      pass_lock: Mutex::new(()),
    }
  }

  pub fn with_identities(mut self, identities: Arc<dyn IdentityResolver>) -> Self {
    self.identities = identities;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn config(&self) -> &OrchestratorConfig {
    &self.config
  }

  pub fn store(&self) -> &Arc<dyn Store> {
    &self.store
  }

  pub fn plugins(&self) -> &TaskPluginRegistry {
    &self.plugins
  }

  pub(crate) async fn lock_process(&self, process_id: ProcessId) -> OwnedMutexGuard<()> {
    let lock = self
      .process_locks
      .lock()
      .await
      .entry(process_id)
      .or_default()
      .clone();
    lock.lock_owned().await
  }

  #[cfg(test)]
  pub(crate) async fn tracked_process_locks(&self) -> usize {
    self.process_locks.lock().await.len()
  }

  pub(crate) async fn load_template(&self, template_id: &str) -> Result<Template, EngineError> {
    match self.store.get_template(template_id).await {
      Ok(template) => Ok(template),
      Err(maestro_store::Error::NotFound(_)) => Err(EngineError::TemplateNotFound {
        template_id: template_id.to_string(),
      }),
      Err(e) => Err(e.into()),
    }
  }

  pub(crate) async fn variables_map(
    &self,
    process_id: ProcessId,
  ) -> Result<BTreeMap<String, String>, EngineError> {
    Ok(
      self
        .store
        .list_variables(process_id)
        .await?
        .into_iter()
        .map(|v| (v.name, v.value))
        .collect(),
    )
  }

  /// Check a stored template and persist its `validated` flag.
  #[instrument(skip(self))]
  pub async fn validate_template(&self, template_id: &str) -> Result<ValidationReport, EngineError> {
    let template = self.load_template(template_id).await?;
    self.save_template(template).await
  }

  /// Validate a template and store it with the resulting `validated` flag.
  pub async fn save_template(&self, mut template: Template) -> Result<ValidationReport, EngineError> {
    let report = validity::validate(&template, &self.plugins);
    template.validated = report.is_valid();
    self
      .store
      .save_template(&template)
      .await
      .map_err(|source| EngineError::Save {
        entity: "template",
        key: template.id.clone(),
        source,
      })?;

    info!(
      template_id = %template.id,
      validated = template.validated,
      failures = report.failures.len(),
      warnings = report.warnings.len(),
      "template_validated"
    );
    Ok(report)
  }

  /// Start a process from a validated template.
  ///
  /// Creates the process, its variables (template defaults plus the
  /// initiator), its status stages and the queue entry of the start task.
  #[instrument(skip(self))]
  pub async fn new_process(
    &self,
    template_id: &str,
    initiator: &str,
  ) -> Result<ProcessLaunch, EngineError> {
    let template = self.load_template(template_id).await?;
    if !template.validated {
      let mut report = validity::validate(&template, &self.plugins);
      if report.is_valid() {
        report
          .failures
          .push(Issue::template_failure("template has not been validated"));
      }
      warn!(
        template_id,
        failures = report.failures.len(),
        "process_rejected"
      );
      return Ok(ProcessLaunch::Rejected(report));
    }

    let start = template
      .start_task()
      .map_err(|e| EngineError::TemplateCorruption {
        template_id: template.id.clone(),
        message: e.to_string(),
      })?;

    let now = Utc::now();
    let label = if template.label.is_empty() {
      template.id.clone()
    } else {
      template.label.clone()
    };
    let process = self
      .store
      .create_process(&NewProcess {
        template_id: template.id.clone(),
        label,
        initiator: initiator.to_string(),
        started_at: now,
      })
      .await
      .map_err(|source| EngineError::Save {
        entity: "process",
        key: template.id.clone(),
        source,
      })?;
    let _guard = self.lock_process(process.id).await;

    let mut initial: Vec<(&str, &str)> = template
      .variables
      .iter()
      .map(|v| (v.name.as_str(), v.default.as_str()))
      .collect();
    if !self.config.initiator_variable.is_empty() {
      initial.push((self.config.initiator_variable.as_str(), initiator));
    }
    for (name, value) in initial {
      self
        .store
        .set_variable(process.id, name, value)
        .await
        .map_err(|source| EngineError::Save {
          entity: "process variable",
          key: name.to_string(),
          source,
        })?;
    }

    let mut stages: BTreeMap<u32, &str> = BTreeMap::new();
    for task in template.tasks.values() {
      if task.participate_in_workflow_status_stage {
        stages
          .entry(task.workflow_status_stage_number)
          .or_insert(task.workflow_status_stage_message.as_str());
      }
    }
    for (stage_number, message) in stages {
      self
        .store
        .create_stage(&ProcessStatusStage {
          process_id: process.id,
          stage_number,
          message: message.to_string(),
          completed_at: None,
        })
        .await
        .map_err(|source| EngineError::Save {
          entity: "status stage",
          key: format!("{}/{}", process.id, stage_number),
          source,
        })?;
    }

    self.create_task(&template, start, process.id, now).await?;

    info!(
      process_id = process.id,
      template_id = %template.id,
      initiator,
      "process_started"
    );
    Ok(ProcessLaunch::Started(process.id))
  }

  pub async fn process(&self, process_id: ProcessId) -> Result<Process, EngineError> {
    Ok(self.store.get_process(process_id).await?)
  }

  /// Mark a running process completed.
  pub async fn end_process(&self, process_id: ProcessId) -> Result<(), EngineError> {
    let _guard = self.lock_process(process_id).await;
    self.finish_process(process_id, ProcessCompletion::Completed).await
  }

  pub(crate) async fn finish_process(
    &self,
    process_id: ProcessId,
    completion: ProcessCompletion,
  ) -> Result<(), EngineError> {
    let mut process = self.store.get_process(process_id).await?;
    if !process.is_running() {
      return Ok(());
    }
    process.complete = completion;
    process.completed_at = Some(Utc::now());
    self.store.update_process(&process).await?;
    info!(process_id, completion = ?completion, "process_ended");

    // drop the entry once only the map and the caller's guard hold it
    let mut locks = self.process_locks.lock().await;
    if locks
      .get(&process_id)
      .is_some_and(|lock| Arc::strong_count(lock) <= 2)
    {
      locks.remove(&process_id);
    }
    Ok(())
  }

  /// Stop a process; its open queue entries become aborted.
  #[instrument(skip(self))]
  pub async fn abort_process(&self, process_id: ProcessId) -> Result<(), EngineError> {
    let _guard = self.lock_process(process_id).await;
    let now = Utc::now();
    for mut entry in self.store.list_queue_entries(process_id).await? {
      if entry.is_open() {
        entry.status = TaskStatus::Aborted;
        entry.completed_at = Some(now);
        self.store.update_queue_entry(&entry).await?;
      }
    }
    self.finish_process(process_id, ProcessCompletion::Aborted).await
  }

  /// Remove a process and everything it owns.
  #[instrument(skip(self))]
  pub async fn delete_process(&self, process_id: ProcessId) -> Result<(), EngineError> {
    {
      let _guard = self.lock_process(process_id).await;
      self.store.delete_process(process_id).await?;
    }
    self.process_locks.lock().await.remove(&process_id);
    info!(process_id, "process_deleted");
    Ok(())
  }

  pub async fn set_process_label(&self, process_id: ProcessId, label: &str) -> Result<(), EngineError> {
    let _guard = self.lock_process(process_id).await;
    let mut process = self.store.get_process(process_id).await?;
    process.label = label.to_string();
    self.store.update_process(&process).await?;
    Ok(())
  }

  pub async fn process_variable(
    &self,
    process_id: ProcessId,
    name: &str,
  ) -> Result<Option<String>, EngineError> {
    Ok(self.store.get_variable(process_id, name).await?)
  }

  pub async fn process_variables(
    &self,
    process_id: ProcessId,
  ) -> Result<Vec<ProcessVariable>, EngineError> {
    Ok(self.store.list_variables(process_id).await?)
  }

  /// Set a process variable, re-resolving the assignments of open tasks
  /// that are assigned through it.
  #[instrument(skip(self, value))]
  pub async fn set_process_variable(
    &self,
    process_id: ProcessId,
    name: &str,
    value: &str,
  ) -> Result<(), EngineError> {
    let _guard = self.lock_process(process_id).await;
    let process = self.store.get_process(process_id).await?;
    let template = self.load_template(&process.template_id).await?;
    self
      .set_variable_locked(&template, process.id, name, value)
      .await
  }

  pub async fn process_stages(
    &self,
    process_id: ProcessId,
  ) -> Result<Vec<ProcessStatusStage>, EngineError> {
    Ok(self.store.list_stages(process_id).await?)
  }

  pub async fn queue_entries(&self, process_id: ProcessId) -> Result<Vec<QueueEntry>, EngineError> {
    Ok(self.store.list_queue_entries(process_id).await?)
  }

  pub async fn add_entity_identifier(&self, entity: EntityIdentifier) -> Result<(), EngineError> {
    let _guard = self.lock_process(entity.process_id).await;
    self.store.get_process(entity.process_id).await?;
    self
      .store
      .add_entity_identifier(&entity)
      .await
      .map_err(|source| EngineError::Save {
        entity: "entity identifier",
        key: entity.unique_id.clone(),
        source,
      })
  }

  pub async fn entity_identifiers(
    &self,
    process_id: ProcessId,
  ) -> Result<Vec<EntityIdentifier>, EngineError> {
    Ok(self.store.list_entity_identifiers(process_id).await?)
  }

  /// Record that `by` completed an interactive task.
  ///
  /// The next advance pass continues the process from it.
  pub async fn complete_task(&self, queue_id: QueueId, by: &str) -> Result<QueueEntry, EngineError> {
    self.close_task(queue_id, by, TaskStatus::Success).await
  }

  pub async fn cancel_task(&self, queue_id: QueueId, by: &str) -> Result<QueueEntry, EngineError> {
    self.close_task(queue_id, by, TaskStatus::Cancelled).await
  }

  /// Put an interactive task on hold.
  pub async fn hold_task(&self, queue_id: QueueId, by: &str) -> Result<QueueEntry, EngineError> {
    self.close_task(queue_id, by, TaskStatus::Hold).await
  }

  #[instrument(skip(self))]
  async fn close_task(
    &self,
    queue_id: QueueId,
    by: &str,
    status: TaskStatus,
  ) -> Result<QueueEntry, EngineError> {
    let entry = self.store.get_queue_entry(queue_id).await?;
    let _guard = self.lock_process(entry.process_id).await;

    // re-read under the lock
    let mut entry = self.store.get_queue_entry(queue_id).await?;
    if !entry.is_interactive || !entry.is_open() {
      return Err(EngineError::InvalidTransition {
        queue_id,
        message: "is not an open interactive task".to_string(),
      });
    }
    let process = self.store.get_process(entry.process_id).await?;
    if !process.is_running() {
      return Err(EngineError::InvalidTransition {
        queue_id,
        message: format!("belongs to process {} which is no longer running", process.id),
      });
    }

    let now = Utc::now();
    entry.status = status;
    entry.completed_at = Some(now);
    entry.completed_by = Some(by.to_string());
    self.store.update_queue_entry(&entry).await?;
    self.store.complete_assignments(queue_id).await?;

    let template = self.load_template(&process.template_id).await?;
    if let Some(task) = template.task(&entry.task_id) {
      self.complete_stage(process.id, task, now).await?;
    }

    info!(
      process_id = entry.process_id,
      queue_id,
      task_id = %entry.task_id,
      status = ?status,
      by,
      "task_closed"
    );
    Ok(entry)
  }

  /// Open tasks assigned to the user directly or through one of their roles.
  pub async fn tasks_for_user(&self, name: &str) -> Result<Vec<QueueEntry>, EngineError> {
    let mut queue_ids: BTreeSet<QueueId> = self
      .store
      .assignments_for_actor("user", name)
      .await?
      .into_iter()
      .map(|a| a.queue_id)
      .collect();
    for role in self.identities.roles_for_user(name).await {
      for assignment in self.store.assignments_for_actor("role", &role).await? {
        queue_ids.insert(assignment.queue_id);
      }
    }

    let mut tasks = Vec::new();
    for queue_id in queue_ids {
      let entry = self.store.get_queue_entry(queue_id).await?;
      if entry.is_open() && self.store.get_process(entry.process_id).await?.is_running() {
        tasks.push(entry);
      }
    }
    Ok(tasks)
  }

  /// Whether the user is assigned the task, directly or through a role.
  pub async fn can_user_execute(&self, queue_id: QueueId, name: &str) -> Result<bool, EngineError> {
    let assignments = self.store.list_assignments(queue_id).await?;
    if assignments
      .iter()
      .any(|a| a.assign_type == "user" && a.assign_id == name)
    {
      return Ok(true);
    }
    let roles = self.identities.roles_for_user(name).await;
    Ok(
      assignments
        .iter()
        .any(|a| a.assign_type == "role" && roles.contains(&a.assign_id)),
    )
  }
}

impl std::fmt::Debug for Orchestrator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Orchestrator")
      .field("plugins", &self.plugins)
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}
