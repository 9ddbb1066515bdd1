//! In-memory store implementation.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maestro_template::Template;
use tokio::sync::RwLock;

use crate::types::*;
use crate::{
  AssignmentStore, Error, ProcessStore, QueueStore, StatusStore, TemplateStore, VariableStore,
};

#[derive(Debug, Default)]
struct Inner {
  templates: HashMap<String, Template>,
  processes: BTreeMap<ProcessId, Process>,
  variables: BTreeMap<(ProcessId, String), String>,
  queue: BTreeMap<QueueId, QueueEntry>,
  assignments: BTreeMap<AssignmentId, Assignment>,
  stages: BTreeMap<(ProcessId, u32), ProcessStatusStage>,
  entities: Vec<EntityIdentifier>,
  last_process_id: ProcessId,
  last_queue_id: QueueId,
  last_assignment_id: AssignmentId,
}

impl Inner {
  fn process_running(&self, process_id: ProcessId) -> bool {
    self
      .processes
      .get(&process_id)
      .is_some_and(Process::is_running)
  }
}

/// Store keeping every record in memory, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl TemplateStore for MemoryStore {
  async fn get_template(&self, template_id: &str) -> Result<Template, Error> {
    let inner = self.inner.read().await;
    inner
      .templates
      .get(template_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("template {}", template_id)))
  }

  async fn save_template(&self, template: &Template) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner
      .templates
      .insert(template.id.clone(), template.clone());
    Ok(())
  }

  async fn list_templates(&self) -> Result<Vec<Template>, Error> {
    let inner = self.inner.read().await;
    let mut templates: Vec<Template> = inner.templates.values().cloned().collect();
    templates.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(templates)
  }
}

#[async_trait]
impl ProcessStore for MemoryStore {
  async fn create_process(&self, process: &NewProcess) -> Result<Process, Error> {
    let mut inner = self.inner.write().await;
    inner.last_process_id += 1;
    let created = Process {
      id: inner.last_process_id,
      template_id: process.template_id.clone(),
      label: process.label.clone(),
      complete: ProcessCompletion::Running,
      initiator: process.initiator.clone(),
      started_at: process.started_at,
      completed_at: None,
    };
    inner.processes.insert(created.id, created.clone());
    Ok(created)
  }

  async fn get_process(&self, process_id: ProcessId) -> Result<Process, Error> {
    let inner = self.inner.read().await;
    inner
      .processes
      .get(&process_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("process {}", process_id)))
  }

  async fn update_process(&self, process: &Process) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    match inner.processes.get_mut(&process.id) {
      Some(existing) => {
        *existing = process.clone();
        Ok(())
      }
      None => Err(Error::NotFound(format!("process {}", process.id))),
    }
  }

  async fn delete_process(&self, process_id: ProcessId) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    if inner.processes.remove(&process_id).is_none() {
      return Err(Error::NotFound(format!("process {}", process_id)));
    }
    inner.variables.retain(|(pid, _), _| *pid != process_id);
    inner.queue.retain(|_, e| e.process_id != process_id);
    inner.assignments.retain(|_, a| a.process_id != process_id);
    inner.stages.retain(|(pid, _), _| *pid != process_id);
    inner.entities.retain(|e| e.process_id != process_id);
    Ok(())
  }

  async fn add_entity_identifier(&self, entity: &EntityIdentifier) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner
      .entities
      .retain(|e| !(e.process_id == entity.process_id && e.unique_id == entity.unique_id));
    inner.entities.push(entity.clone());
    Ok(())
  }

  async fn list_entity_identifiers(
    &self,
    process_id: ProcessId,
  ) -> Result<Vec<EntityIdentifier>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .entities
        .iter()
        .filter(|e| e.process_id == process_id)
        .cloned()
        .collect(),
    )
  }
}

#[async_trait]
impl QueueStore for MemoryStore {
  async fn create_queue_entry(&self, entry: &NewQueueEntry) -> Result<QueueEntry, Error> {
    let mut inner = self.inner.write().await;
    inner.last_queue_id += 1;
    let created = QueueEntry {
      id: inner.last_queue_id,
      process_id: entry.process_id,
      task_id: entry.task_id.clone(),
      task_type: entry.task_type.clone(),
      label: entry.label.clone(),
      is_interactive: entry.is_interactive,
      status: TaskStatus::Active,
      archived: ArchiveState::Active,
      run_once: entry.run_once,
      started_at: entry.started_at,
      completed_at: None,
      completed_by: None,
      next_reminder_time: entry.next_reminder_time,
      reminder_interval_days: entry.reminder_interval_days,
      num_reminders_sent: 0,
      escalation_interval_days: entry.escalation_interval_days,
      last_escalation_time: None,
      num_escalations_sent: 0,
    };
    inner.queue.insert(created.id, created.clone());
    Ok(created)
  }

  async fn get_queue_entry(&self, queue_id: QueueId) -> Result<QueueEntry, Error> {
    let inner = self.inner.read().await;
    inner
      .queue
      .get(&queue_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("queue entry {}", queue_id)))
  }

  async fn update_queue_entry(&self, entry: &QueueEntry) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    match inner.queue.get_mut(&entry.id) {
      Some(existing) => {
        *existing = entry.clone();
        Ok(())
      }
      None => Err(Error::NotFound(format!("queue entry {}", entry.id))),
    }
  }

  async fn list_queue_entries(&self, process_id: ProcessId) -> Result<Vec<QueueEntry>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .queue
        .values()
        .filter(|e| e.process_id == process_id)
        .cloned()
        .collect(),
    )
  }

  async fn due_queue_entries(&self) -> Result<Vec<QueueEntry>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .queue
        .values()
        .filter(|e| e.is_due() && inner.process_running(e.process_id))
        .cloned()
        .collect(),
    )
  }

  async fn open_interactive_entries(&self) -> Result<Vec<QueueEntry>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .queue
        .values()
        .filter(|e| e.is_interactive && e.is_open() && inner.process_running(e.process_id))
        .cloned()
        .collect(),
    )
  }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
  async fn create_assignment(&self, assignment: &NewAssignment) -> Result<Assignment, Error> {
    let mut inner = self.inner.write().await;
    inner.last_assignment_id += 1;
    let created = Assignment {
      id: inner.last_assignment_id,
      queue_id: assignment.queue_id,
      process_id: assignment.process_id,
      assign_type: assignment.assign_type.clone(),
      assign_id: assignment.assign_id.clone(),
      by_variable: assignment.by_variable,
      source_variable: assignment.source_variable.clone(),
      task_completed: false,
    };
    inner.assignments.insert(created.id, created.clone());
    Ok(created)
  }

  async fn list_assignments(&self, queue_id: QueueId) -> Result<Vec<Assignment>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .assignments
        .values()
        .filter(|a| a.queue_id == queue_id)
        .cloned()
        .collect(),
    )
  }

  async fn delete_assignments(&self, queue_id: QueueId) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner.assignments.retain(|_, a| a.queue_id != queue_id);
    Ok(())
  }

  async fn complete_assignments(&self, queue_id: QueueId) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    for assignment in inner.assignments.values_mut() {
      if assignment.queue_id == queue_id {
        assignment.task_completed = true;
      }
    }
    Ok(())
  }

  async fn pending_variable_assignments(
    &self,
    process_id: ProcessId,
    variable: &str,
  ) -> Result<Vec<Assignment>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .assignments
        .values()
        .filter(|a| {
          a.process_id == process_id
            && a.by_variable
            && !a.task_completed
            && a.source_variable.as_deref() == Some(variable)
        })
        .cloned()
        .collect(),
    )
  }

  async fn assignments_for_actor(
    &self,
    assign_type: &str,
    assign_id: &str,
  ) -> Result<Vec<Assignment>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .assignments
        .values()
        .filter(|a| a.assign_type == assign_type && a.assign_id == assign_id)
        .cloned()
        .collect(),
    )
  }
}

#[async_trait]
impl VariableStore for MemoryStore {
  async fn get_variable(&self, process_id: ProcessId, name: &str) -> Result<Option<String>, Error> {
    let inner = self.inner.read().await;
    Ok(inner.variables.get(&(process_id, name.to_string())).cloned())
  }

  async fn set_variable(&self, process_id: ProcessId, name: &str, value: &str) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner
      .variables
      .insert((process_id, name.to_string()), value.to_string());
    Ok(())
  }

  async fn list_variables(&self, process_id: ProcessId) -> Result<Vec<ProcessVariable>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .variables
        .iter()
        .filter(|((pid, _), _)| *pid == process_id)
        .map(|((pid, name), value)| ProcessVariable {
          process_id: *pid,
          name: name.clone(),
          value: value.clone(),
        })
        .collect(),
    )
  }
}

#[async_trait]
impl StatusStore for MemoryStore {
  async fn create_stage(&self, stage: &ProcessStatusStage) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner
      .stages
      .insert((stage.process_id, stage.stage_number), stage.clone());
    Ok(())
  }

  async fn list_stages(&self, process_id: ProcessId) -> Result<Vec<ProcessStatusStage>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .stages
        .values()
        .filter(|s| s.process_id == process_id)
        .cloned()
        .collect(),
    )
  }

  async fn complete_stage(
    &self,
    process_id: ProcessId,
    stage_number: u32,
    completed_at: DateTime<Utc>,
  ) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    match inner.stages.get_mut(&(process_id, stage_number)) {
      Some(stage) => {
        stage.completed_at = Some(completed_at);
        Ok(())
      }
      None => Err(Error::NotFound(format!(
        "status stage {} of process {}",
        stage_number, process_id
      ))),
    }
  }
}
