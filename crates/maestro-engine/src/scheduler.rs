//! Notification scheduling and the periodic runner.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use maestro_store::QueueEntry;
use maestro_template::{ActorKind, NotificationKind, TaskDef, Template};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::EngineError;
use crate::identity::Identity;
use crate::notify::{MessageContext, Notification};
use crate::orchestrator::Orchestrator;

/// Reminders and escalations sent by one scheduling scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationTally {
  pub reminders: usize,
  pub escalations: usize,
}

impl Orchestrator {
  /// Resolve who receives a notification for the entry.
  ///
  /// Explicit notification rules for the event win. Without rules, the
  /// assignees receive assignment and reminder notifications; escalations
  /// only ever go to explicitly configured recipients.
  pub(crate) async fn recipients(
    &self,
    task: &TaskDef,
    entry: &QueueEntry,
    kind: NotificationKind,
  ) -> Result<Vec<Identity>, EngineError> {
    let mut actors: Vec<(ActorKind, String)> = Vec::new();
    let rules: Vec<_> = task.notifications_for(kind).map(|n| &n.target).collect();
    if rules.is_empty() {
      if kind != NotificationKind::Escalation {
        for assignment in self.store.list_assignments(entry.id).await? {
          actors.push((
            ActorKind::from(assignment.assign_type.as_str()),
            assignment.assign_id,
          ));
        }
      }
    } else {
      for target in self.expand_rules(entry.process_id, rules.into_iter()).await? {
        actors.push((target.kind.clone(), target.id));
      }
    }

    let mut recipients = BTreeSet::new();
    for (actor_kind, id) in actors {
      match actor_kind {
        ActorKind::User => match self.identities.user_by_name(&id).await {
          Some(identity) => {
            recipients.insert(identity);
          }
          None => warn!(queue_id = entry.id, user = %id, "recipient_unknown"),
        },
        ActorKind::Role => recipients.extend(self.identities.users_in_role(&id).await),
        ActorKind::Other(other) => {
          warn!(queue_id = entry.id, kind = %other, id = %id, "recipient_kind_unsupported")
        }
      }
    }
    Ok(recipients.into_iter().collect())
  }

  /// Render and deliver one notification. Returns the recipient count.
  pub(crate) async fn send_notification(
    &self,
    task: &TaskDef,
    entry: &QueueEntry,
    kind: NotificationKind,
  ) -> Result<usize, EngineError> {
    let recipients = self.recipients(task, entry, kind).await?;
    if recipients.is_empty() {
      warn!(
        process_id = entry.process_id,
        queue_id = entry.id,
        kind = %kind,
        "notification_without_recipients"
      );
      return Ok(0);
    }

    let process = self.store.get_process(entry.process_id).await?;
    let variables = self.variables_map(entry.process_id).await?;
    let message = self.messages.render(
      kind,
      task.messages.get(&kind).map(String::as_str),
      &MessageContext {
        task_id: &task.id,
        task_label: &entry.label,
        process_id: process.id,
        process_label: &process.label,
        queue_id: entry.id,
        started_at: entry.started_at,
        reminders_sent: entry.num_reminders_sent,
        escalations_sent: entry.num_escalations_sent,
        variables: &variables,
      },
    )?;

    let count = recipients.len();
    self.notifier.notify(Notification {
      kind,
      process_id: entry.process_id,
      queue_id: entry.id,
      task_id: task.id.clone(),
      recipients,
      message,
    });
    Ok(count)
  }

  /// Send the reminders and escalations that are due at `now`.
  ///
  /// Reminders repeat every `reminder_interval_days` starting one interval
  /// after the entry was created. The n-th escalation is due once
  /// `n * escalation_interval_days` have passed. Both counters only grow.
  #[instrument(name = "notification_scan", skip(self))]
  pub async fn schedule_notifications(
    &self,
    now: DateTime<Utc>,
  ) -> Result<NotificationTally, EngineError> {
    let mut tally = NotificationTally::default();
    if !self.config.send_reminders && !self.config.send_escalations {
      return Ok(tally);
    }

    let mut templates: HashMap<String, Template> = HashMap::new();
    for candidate in self.store.open_interactive_entries().await? {
      let _guard = self.lock_process(candidate.process_id).await;
      let mut entry = self.store.get_queue_entry(candidate.id).await?;
      if !entry.is_open() {
        continue;
      }

      let process = self.store.get_process(entry.process_id).await?;
      if !templates.contains_key(&process.template_id) {
        let template = self.load_template(&process.template_id).await?;
        templates.insert(process.template_id.clone(), template);
      }
      let Some(task) = templates
        .get(&process.template_id)
        .and_then(|t| t.task(&entry.task_id))
      else {
        continue;
      };

      let mut changed = false;

      if self.config.send_reminders && entry.reminder_interval_days > 0 {
        let interval = Duration::days(i64::from(entry.reminder_interval_days));
        let due = entry
          .next_reminder_time
          .unwrap_or(entry.started_at + interval);
        if due <= now {
          if let Err(e) = self
            .send_notification(task, &entry, NotificationKind::Reminder)
            .await
          {
            warn!(queue_id = entry.id, error = %e, "reminder_failed");
          }
          entry.next_reminder_time = Some(due + interval);
          entry.num_reminders_sent += 1;
          tally.reminders += 1;
          changed = true;
        }
      }

      if self.config.send_escalations && entry.escalation_interval_days > 0 {
        let due = entry.started_at
          + Duration::days(
            i64::from(entry.escalation_interval_days) * i64::from(1 + entry.num_escalations_sent),
          );
        if now > due {
          match self
            .send_notification(task, &entry, NotificationKind::Escalation)
            .await
          {
            Ok(0) => warn!(queue_id = entry.id, "escalation_without_recipients"),
            Ok(_) => {}
            Err(e) => warn!(queue_id = entry.id, error = %e, "escalation_failed"),
          }
          entry.num_escalations_sent += 1;
          entry.last_escalation_time = Some(now);
          tally.escalations += 1;
          changed = true;
        }
      }

      if changed {
        self.store.update_queue_entry(&entry).await?;
      }
    }

    Ok(tally)
  }

  /// Run advance passes on the configured interval until cancelled.
  pub async fn run(&self, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(self.config.advance_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
      interval_secs = self.config.advance_interval().as_secs(),
      "orchestrator_started"
    );

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!("orchestrator_stopped");
              break;
          }
          _ = interval.tick() => {
              match self.advance().await {
                  Ok(report) => {
                      if !report.is_idle() {
                          info!(
                              completed = report.completed(),
                              errors = report.errors.len(),
                              reminders = report.reminders_sent,
                              escalations = report.escalations_sent,
                              "advance_pass_finished"
                          );
                      }
                  }
                  Err(e) => {
                      error!(error = %e, "advance_pass_failed");
                  }
              }
          }
      }
    }
  }
}
