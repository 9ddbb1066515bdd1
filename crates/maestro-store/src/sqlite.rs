use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maestro_template::Template;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::types::*;
use crate::{
  AssignmentStore, Error, ProcessStore, QueueStore, StatusStore, TemplateStore, VariableStore,
};

const PROCESS_COLUMNS: &str =
  "process_id, template_id, label, complete, initiator, started_at, completed_at";

const QUEUE_COLUMNS: &str = "q.queue_id, q.process_id, q.task_id, q.task_type, q.label, \
  q.is_interactive, q.status, q.archived, q.run_once, q.started_at, q.completed_at, \
  q.completed_by, q.next_reminder_time, q.reminder_interval_days, q.num_reminders_sent, \
  q.escalation_interval_days, q.last_escalation_time, q.num_escalations_sent";

const ASSIGNMENT_COLUMNS: &str = "assignment_id, queue_id, process_id, assign_type, assign_id, \
  by_variable, source_variable, task_completed";

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database file at `path` and migrate it.
  pub async fn open(path: &std::path::Path) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true)
      .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// A migrated in-memory database on a single connection.
  pub async fn in_memory() -> Result<Self, Error> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect("sqlite::memory:")
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }
}

fn process_from_row(row: &SqliteRow) -> Result<Process, Error> {
  Ok(Process {
    id: row.try_get("process_id")?,
    template_id: row.try_get("template_id")?,
    label: row.try_get("label")?,
    complete: ProcessCompletion::try_from(row.try_get::<i64, _>("complete")?)?,
    initiator: row.try_get("initiator")?,
    started_at: row.try_get("started_at")?,
    completed_at: row.try_get("completed_at")?,
  })
}

fn queue_from_row(row: &SqliteRow) -> Result<QueueEntry, Error> {
  Ok(QueueEntry {
    id: row.try_get("queue_id")?,
    process_id: row.try_get("process_id")?,
    task_id: row.try_get("task_id")?,
    task_type: row.try_get("task_type")?,
    label: row.try_get("label")?,
    is_interactive: row.try_get("is_interactive")?,
    status: TaskStatus::try_from(row.try_get::<i64, _>("status")?)?,
    archived: ArchiveState::try_from(row.try_get::<i64, _>("archived")?)?,
    run_once: row.try_get("run_once")?,
    started_at: row.try_get("started_at")?,
    completed_at: row.try_get("completed_at")?,
    completed_by: row.try_get("completed_by")?,
    next_reminder_time: row.try_get("next_reminder_time")?,
    reminder_interval_days: row.try_get::<i64, _>("reminder_interval_days")? as u32,
    num_reminders_sent: row.try_get::<i64, _>("num_reminders_sent")? as u32,
    escalation_interval_days: row.try_get::<i64, _>("escalation_interval_days")? as u32,
    last_escalation_time: row.try_get("last_escalation_time")?,
    num_escalations_sent: row.try_get::<i64, _>("num_escalations_sent")? as u32,
  })
}

fn assignment_from_row(row: &SqliteRow) -> Result<Assignment, Error> {
  Ok(Assignment {
    id: row.try_get("assignment_id")?,
    queue_id: row.try_get("queue_id")?,
    process_id: row.try_get("process_id")?,
    assign_type: row.try_get("assign_type")?,
    assign_id: row.try_get("assign_id")?,
    by_variable: row.try_get("by_variable")?,
    source_variable: row.try_get("source_variable")?,
    task_completed: row.try_get("task_completed")?,
  })
}

fn stage_from_row(row: &SqliteRow) -> Result<ProcessStatusStage, Error> {
  Ok(ProcessStatusStage {
    process_id: row.try_get("process_id")?,
    stage_number: row.try_get::<i64, _>("stage_number")? as u32,
    message: row.try_get("message")?,
    completed_at: row.try_get("completed_at")?,
  })
}

#[async_trait]
impl TemplateStore for SqliteStore {
  async fn get_template(&self, template_id: &str) -> Result<Template, Error> {
    let row = sqlx::query("SELECT body FROM templates WHERE template_id = ?")
      .bind(template_id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| Error::NotFound(format!("template {}", template_id)))?;
    let body: String = row.try_get("body")?;
    Ok(serde_json::from_str(&body)?)
  }

  async fn save_template(&self, template: &Template) -> Result<(), Error> {
    let body = serde_json::to_string(template)?;
    sqlx::query(
      r#"
            INSERT INTO templates (template_id, body) VALUES (?, ?)
            ON CONFLICT(template_id) DO UPDATE SET body = excluded.body
            "#,
    )
    .bind(&template.id)
    .bind(body)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_templates(&self) -> Result<Vec<Template>, Error> {
    let rows = sqlx::query("SELECT body FROM templates ORDER BY template_id ASC")
      .fetch_all(&self.pool)
      .await?;
    rows
      .iter()
      .map(|row| {
        let body: String = row.try_get("body")?;
        Ok(serde_json::from_str(&body)?)
      })
      .collect()
  }
}

#[async_trait]
impl ProcessStore for SqliteStore {
  async fn create_process(&self, process: &NewProcess) -> Result<Process, Error> {
    let result = sqlx::query(
      r#"
            INSERT INTO processes (template_id, label, complete, initiator, started_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
    )
    .bind(&process.template_id)
    .bind(&process.label)
    .bind(ProcessCompletion::Running.as_i64())
    .bind(&process.initiator)
    .bind(process.started_at)
    .execute(&self.pool)
    .await?;

    Ok(Process {
      id: result.last_insert_rowid(),
      template_id: process.template_id.clone(),
      label: process.label.clone(),
      complete: ProcessCompletion::Running,
      initiator: process.initiator.clone(),
      started_at: process.started_at,
      completed_at: None,
    })
  }

  async fn get_process(&self, process_id: ProcessId) -> Result<Process, Error> {
    let row = sqlx::query(&format!(
      "SELECT {} FROM processes WHERE process_id = ?",
      PROCESS_COLUMNS
    ))
    .bind(process_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("process {}", process_id)))?;
    process_from_row(&row)
  }

  async fn update_process(&self, process: &Process) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
            UPDATE processes
            SET label = ?, complete = ?, completed_at = ?
            WHERE process_id = ?
            "#,
    )
    .bind(&process.label)
    .bind(process.complete.as_i64())
    .bind(process.completed_at)
    .bind(process.id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("process {}", process.id)));
    }
    Ok(())
  }

  async fn delete_process(&self, process_id: ProcessId) -> Result<(), Error> {
    let mut tx = self.pool.begin().await?;
    for table in [
      "assignments",
      "queue",
      "process_variables",
      "status_stages",
      "entity_identifiers",
    ] {
      sqlx::query(&format!("DELETE FROM {} WHERE process_id = ?", table))
        .bind(process_id)
        .execute(&mut *tx)
        .await?;
    }
    let result = sqlx::query("DELETE FROM processes WHERE process_id = ?")
      .bind(process_id)
      .execute(&mut *tx)
      .await?;
    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("process {}", process_id)));
    }
    tx.commit().await?;
    Ok(())
  }

  async fn add_entity_identifier(&self, entity: &EntityIdentifier) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO entity_identifiers (process_id, unique_id, entity_type, entity_id, bundle)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(process_id, unique_id) DO UPDATE SET
              entity_type = excluded.entity_type,
              entity_id = excluded.entity_id,
              bundle = excluded.bundle
            "#,
    )
    .bind(entity.process_id)
    .bind(&entity.unique_id)
    .bind(&entity.entity_type)
    .bind(&entity.entity_id)
    .bind(&entity.bundle)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_entity_identifiers(
    &self,
    process_id: ProcessId,
  ) -> Result<Vec<EntityIdentifier>, Error> {
    let rows = sqlx::query(
      r#"
            SELECT process_id, unique_id, entity_type, entity_id, bundle
            FROM entity_identifiers
            WHERE process_id = ?
            ORDER BY unique_id ASC
            "#,
    )
    .bind(process_id)
    .fetch_all(&self.pool)
    .await?;

    rows
      .iter()
      .map(|row| {
        Ok(EntityIdentifier {
          process_id: row.try_get("process_id")?,
          unique_id: row.try_get("unique_id")?,
          entity_type: row.try_get("entity_type")?,
          entity_id: row.try_get("entity_id")?,
          bundle: row.try_get("bundle")?,
        })
      })
      .collect()
  }
}

#[async_trait]
impl QueueStore for SqliteStore {
  async fn create_queue_entry(&self, entry: &NewQueueEntry) -> Result<QueueEntry, Error> {
    let result = sqlx::query(
            r#"
            INSERT INTO queue (process_id, task_id, task_type, label, is_interactive, status, archived, run_once, started_at, next_reminder_time, reminder_interval_days, escalation_interval_days)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.process_id)
        .bind(&entry.task_id)
        .bind(&entry.task_type)
        .bind(&entry.label)
        .bind(entry.is_interactive)
        .bind(TaskStatus::Active.as_i64())
        .bind(ArchiveState::Active.as_i64())
        .bind(entry.run_once)
        .bind(entry.started_at)
        .bind(entry.next_reminder_time)
        .bind(i64::from(entry.reminder_interval_days))
        .bind(i64::from(entry.escalation_interval_days))
        .execute(&self.pool)
        .await?;

    self.get_queue_entry(result.last_insert_rowid()).await
  }

  async fn get_queue_entry(&self, queue_id: QueueId) -> Result<QueueEntry, Error> {
    let row = sqlx::query(&format!(
      "SELECT {} FROM queue q WHERE q.queue_id = ?",
      QUEUE_COLUMNS
    ))
    .bind(queue_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("queue entry {}", queue_id)))?;
    queue_from_row(&row)
  }

  async fn update_queue_entry(&self, entry: &QueueEntry) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
            UPDATE queue
            SET label = ?, status = ?, archived = ?, completed_at = ?, completed_by = ?,
                next_reminder_time = ?, num_reminders_sent = ?,
                last_escalation_time = ?, num_escalations_sent = ?
            WHERE queue_id = ?
            "#,
    )
    .bind(&entry.label)
    .bind(entry.status.as_i64())
    .bind(entry.archived.as_i64())
    .bind(entry.completed_at)
    .bind(&entry.completed_by)
    .bind(entry.next_reminder_time)
    .bind(i64::from(entry.num_reminders_sent))
    .bind(entry.last_escalation_time)
    .bind(i64::from(entry.num_escalations_sent))
    .bind(entry.id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("queue entry {}", entry.id)));
    }
    Ok(())
  }

  async fn list_queue_entries(&self, process_id: ProcessId) -> Result<Vec<QueueEntry>, Error> {
    let rows = sqlx::query(&format!(
      "SELECT {} FROM queue q WHERE q.process_id = ? ORDER BY q.queue_id ASC",
      QUEUE_COLUMNS
    ))
    .bind(process_id)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(queue_from_row).collect()
  }

  async fn due_queue_entries(&self) -> Result<Vec<QueueEntry>, Error> {
    let rows = sqlx::query(&format!(
      r#"
            SELECT {}
            FROM queue q
            JOIN processes p ON p.process_id = q.process_id
            WHERE p.complete = ?
              AND q.archived = ?
              AND (
                (q.is_interactive = 0 AND q.status = ? AND q.run_once = 0)
                OR (q.is_interactive = 1 AND q.status <> ? AND q.run_once = 1)
              )
            ORDER BY q.queue_id ASC
            "#,
      QUEUE_COLUMNS
    ))
    .bind(ProcessCompletion::Running.as_i64())
    .bind(ArchiveState::Active.as_i64())
    .bind(TaskStatus::Active.as_i64())
    .bind(TaskStatus::Active.as_i64())
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(queue_from_row).collect()
  }

  async fn open_interactive_entries(&self) -> Result<Vec<QueueEntry>, Error> {
    let rows = sqlx::query(&format!(
      r#"
            SELECT {}
            FROM queue q
            JOIN processes p ON p.process_id = q.process_id
            WHERE p.complete = ?
              AND q.is_interactive = 1
              AND q.archived = ?
              AND q.status = ?
            ORDER BY q.queue_id ASC
            "#,
      QUEUE_COLUMNS
    ))
    .bind(ProcessCompletion::Running.as_i64())
    .bind(ArchiveState::Active.as_i64())
    .bind(TaskStatus::Active.as_i64())
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(queue_from_row).collect()
  }
}

#[async_trait]
impl AssignmentStore for SqliteStore {
  async fn create_assignment(&self, assignment: &NewAssignment) -> Result<Assignment, Error> {
    let result = sqlx::query(
      r#"
            INSERT INTO assignments (queue_id, process_id, assign_type, assign_id, by_variable, source_variable, task_completed)
            VALUES (?, ?, ?, ?, ?, ?, 0)
            "#,
    )
    .bind(assignment.queue_id)
    .bind(assignment.process_id)
    .bind(&assignment.assign_type)
    .bind(&assignment.assign_id)
    .bind(assignment.by_variable)
    .bind(&assignment.source_variable)
    .execute(&self.pool)
    .await?;

    Ok(Assignment {
      id: result.last_insert_rowid(),
      queue_id: assignment.queue_id,
      process_id: assignment.process_id,
      assign_type: assignment.assign_type.clone(),
      assign_id: assignment.assign_id.clone(),
      by_variable: assignment.by_variable,
      source_variable: assignment.source_variable.clone(),
      task_completed: false,
    })
  }

  async fn list_assignments(&self, queue_id: QueueId) -> Result<Vec<Assignment>, Error> {
    let rows = sqlx::query(&format!(
      "SELECT {} FROM assignments WHERE queue_id = ? ORDER BY assignment_id ASC",
      ASSIGNMENT_COLUMNS
    ))
    .bind(queue_id)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(assignment_from_row).collect()
  }

  async fn delete_assignments(&self, queue_id: QueueId) -> Result<(), Error> {
    sqlx::query("DELETE FROM assignments WHERE queue_id = ?")
      .bind(queue_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn complete_assignments(&self, queue_id: QueueId) -> Result<(), Error> {
    sqlx::query("UPDATE assignments SET task_completed = 1 WHERE queue_id = ?")
      .bind(queue_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn pending_variable_assignments(
    &self,
    process_id: ProcessId,
    variable: &str,
  ) -> Result<Vec<Assignment>, Error> {
    let rows = sqlx::query(&format!(
      r#"
            SELECT {}
            FROM assignments
            WHERE process_id = ? AND by_variable = 1 AND task_completed = 0 AND source_variable = ?
            ORDER BY assignment_id ASC
            "#,
      ASSIGNMENT_COLUMNS
    ))
    .bind(process_id)
    .bind(variable)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(assignment_from_row).collect()
  }

  async fn assignments_for_actor(
    &self,
    assign_type: &str,
    assign_id: &str,
  ) -> Result<Vec<Assignment>, Error> {
    let rows = sqlx::query(&format!(
      "SELECT {} FROM assignments WHERE assign_type = ? AND assign_id = ? ORDER BY assignment_id ASC",
      ASSIGNMENT_COLUMNS
    ))
    .bind(assign_type)
    .bind(assign_id)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(assignment_from_row).collect()
  }
}

#[async_trait]
impl VariableStore for SqliteStore {
  async fn get_variable(&self, process_id: ProcessId, name: &str) -> Result<Option<String>, Error> {
    let row = sqlx::query("SELECT value FROM process_variables WHERE process_id = ? AND name = ?")
      .bind(process_id)
      .bind(name)
      .fetch_optional(&self.pool)
      .await?;
    match row {
      Some(row) => Ok(Some(row.try_get("value")?)),
      None => Ok(None),
    }
  }

  async fn set_variable(&self, process_id: ProcessId, name: &str, value: &str) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO process_variables (process_id, name, value) VALUES (?, ?, ?)
            ON CONFLICT(process_id, name) DO UPDATE SET value = excluded.value
            "#,
    )
    .bind(process_id)
    .bind(name)
    .bind(value)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn list_variables(&self, process_id: ProcessId) -> Result<Vec<ProcessVariable>, Error> {
    let rows = sqlx::query(
      "SELECT process_id, name, value FROM process_variables WHERE process_id = ? ORDER BY name ASC",
    )
    .bind(process_id)
    .fetch_all(&self.pool)
    .await?;
    rows
      .iter()
      .map(|row| {
        Ok(ProcessVariable {
          process_id: row.try_get("process_id")?,
          name: row.try_get("name")?,
          value: row.try_get("value")?,
        })
      })
      .collect()
  }
}

#[async_trait]
impl StatusStore for SqliteStore {
  async fn create_stage(&self, stage: &ProcessStatusStage) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO status_stages (process_id, stage_number, message, completed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(process_id, stage_number) DO UPDATE SET message = excluded.message
            "#,
    )
    .bind(stage.process_id)
    .bind(i64::from(stage.stage_number))
    .bind(&stage.message)
    .bind(stage.completed_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn list_stages(&self, process_id: ProcessId) -> Result<Vec<ProcessStatusStage>, Error> {
    let rows = sqlx::query(
      r#"
            SELECT process_id, stage_number, message, completed_at
            FROM status_stages
            WHERE process_id = ?
            ORDER BY stage_number ASC
            "#,
    )
    .bind(process_id)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(stage_from_row).collect()
  }

  async fn complete_stage(
    &self,
    process_id: ProcessId,
    stage_number: u32,
    completed_at: DateTime<Utc>,
  ) -> Result<(), Error> {
    let result = sqlx::query(
      "UPDATE status_stages SET completed_at = ? WHERE process_id = ? AND stage_number = ?",
    )
    .bind(completed_at)
    .bind(process_id)
    .bind(i64::from(stage_number))
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!(
        "status stage {} of process {}",
        stage_number, process_id
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use maestro_template::{TaskDef, TaskType};

  fn new_entry(process_id: ProcessId, task_id: &str, is_interactive: bool) -> NewQueueEntry {
    NewQueueEntry {
      process_id,
      task_id: task_id.to_string(),
      task_type: "MaestroInteractive".to_string(),
      label: task_id.to_string(),
      is_interactive,
      run_once: is_interactive,
      started_at: Utc::now(),
      next_reminder_time: None,
      reminder_interval_days: 2,
      escalation_interval_days: 0,
    }
  }

  async fn new_process(store: &SqliteStore) -> Process {
    store
      .create_process(&NewProcess {
        template_id: "t".to_string(),
        label: "Test".to_string(),
        initiator: "alice".to_string(),
        started_at: Utc::now(),
      })
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_template_round_trip() {
    let store = SqliteStore::in_memory().await.unwrap();
    let template = Template::new(
      "flow",
      vec![
        TaskDef::new("start", TaskType::Start).with_next(&["end"]),
        TaskDef::new("end", TaskType::End),
      ],
      vec![],
    );
    store.save_template(&template).await.unwrap();
    assert_eq!(store.get_template("flow").await.unwrap(), template);
    assert!(matches!(
      store.get_template("other").await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_queue_entry_persists_state() {
    let store = SqliteStore::in_memory().await.unwrap();
    let process = new_process(&store).await;
    let mut entry = store
      .create_queue_entry(&new_entry(process.id, "review", true))
      .await
      .unwrap();
    assert_eq!(entry.reminder_interval_days, 2);
    assert!(store.due_queue_entries().await.unwrap().is_empty());
    assert_eq!(store.open_interactive_entries().await.unwrap().len(), 1);

    entry.status = TaskStatus::Success;
    entry.completed_by = Some("bob".to_string());
    store.update_queue_entry(&entry).await.unwrap();

    let due = store.due_queue_entries().await.unwrap();
    assert_eq!(due, vec![entry.clone()]);

    entry.archived = ArchiveState::Archived;
    store.update_queue_entry(&entry).await.unwrap();
    assert!(store.due_queue_entries().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_variables_upsert() {
    let store = SqliteStore::in_memory().await.unwrap();
    let process = new_process(&store).await;
    store.set_variable(process.id, "approver", "a").await.unwrap();
    store.set_variable(process.id, "approver", "b").await.unwrap();
    assert_eq!(
      store.get_variable(process.id, "approver").await.unwrap(),
      Some("b".to_string())
    );
    assert_eq!(store.list_variables(process.id).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_delete_process_cascades() {
    let store = SqliteStore::in_memory().await.unwrap();
    let process = new_process(&store).await;
    let entry = store
      .create_queue_entry(&new_entry(process.id, "review", true))
      .await
      .unwrap();
    store
      .create_assignment(&NewAssignment {
        queue_id: entry.id,
        process_id: process.id,
        assign_type: "user".to_string(),
        assign_id: "bob".to_string(),
        by_variable: false,
        source_variable: None,
      })
      .await
      .unwrap();
    store
      .create_stage(&ProcessStatusStage {
        process_id: process.id,
        stage_number: 1,
        message: "Review".to_string(),
        completed_at: None,
      })
      .await
      .unwrap();

    store.delete_process(process.id).await.unwrap();

    assert!(store.list_queue_entries(process.id).await.unwrap().is_empty());
    assert!(store.list_assignments(entry.id).await.unwrap().is_empty());
    assert!(store.list_stages(process.id).await.unwrap().is_empty());
    assert!(matches!(
      store.delete_process(process.id).await,
      Err(Error::NotFound(_))
    ));
  }
}
