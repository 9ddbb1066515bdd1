//! Notifications and notifiers.
//!
//! The engine decides who is told what and renders the message; a
//! [`Notifier`] only delivers. Transport (mail, chat, ...) lives outside
//! the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use maestro_store::{ProcessId, QueueId};
use maestro_template::NotificationKind;
use minijinja::{Environment, Value, context};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::identity::Identity;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
  pub kind: NotificationKind,
  pub process_id: ProcessId,
  pub queue_id: QueueId,
  pub task_id: String,
  pub recipients: Vec<Identity>,
  pub message: String,
}

/// Delivers notifications.
///
/// Called synchronously from the orchestrator; implementations that do
/// slow work should hand the notification off (see [`ChannelNotifier`]).
pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}

/// Discards every notification.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
  fn notify(&self, _notification: Notification) {}
}

/// Forwards notifications to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<Notification>) -> Self {
    Self { sender }
  }
}

impl Notifier for ChannelNotifier {
  fn notify(&self, notification: Notification) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(notification);
  }
}

/// Emits every notification as a tracing event.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, notification: Notification) {
    let recipients: Vec<&str> = notification
      .recipients
      .iter()
      .map(|r| r.name.as_str())
      .collect();
    tracing::info!(
      kind = %notification.kind,
      process_id = notification.process_id,
      queue_id = notification.queue_id,
      task_id = %notification.task_id,
      recipients = ?recipients,
      message = %notification.message,
      "notification"
    );
  }
}

const DEFAULT_ASSIGNMENT: &str =
  "You have been assigned \"{{ task_label }}\" in {{ process_label }} (process {{ process_id }}).";

const DEFAULT_REMINDER: &str = "Reminder: \"{{ task_label }}\" in {{ process_label }} is still \
   waiting for you (reminder {{ reminders_sent + 1 }}).";

const DEFAULT_ESCALATION: &str = "Escalation: \"{{ task_label }}\" in {{ process_label }} has been \
   open since {{ started_at }} and was escalated {{ escalations_sent }} time(s) before.";

/// Values a message template can reference.
#[derive(Debug, Clone)]
pub struct MessageContext<'a> {
  pub task_id: &'a str,
  pub task_label: &'a str,
  pub process_id: ProcessId,
  pub process_label: &'a str,
  pub queue_id: QueueId,
  pub started_at: DateTime<Utc>,
  pub reminders_sent: u32,
  pub escalations_sent: u32,
  pub variables: &'a BTreeMap<String, String>,
}

/// Renders notification messages with minijinja.
///
/// Tasks may override the message per event through `TaskDef::messages`;
/// otherwise the built-in default for the event is used.
pub struct MessageRenderer {
  env: Environment<'static>,
}

impl MessageRenderer {
  pub fn new() -> Self {
    let mut env = Environment::new();
    for (kind, source) in [
      (NotificationKind::Assignment, DEFAULT_ASSIGNMENT),
      (NotificationKind::Reminder, DEFAULT_REMINDER),
      (NotificationKind::Escalation, DEFAULT_ESCALATION),
    ] {
      // The defaults are static and known to parse.
      let _ = env.add_template(kind.as_str(), source);
    }
    Self { env }
  }

  pub fn render(
    &self,
    kind: NotificationKind,
    override_source: Option<&str>,
    ctx: &MessageContext<'_>,
  ) -> Result<String, EngineError> {
    let values = context! {
      task_id => ctx.task_id,
      task_label => ctx.task_label,
      process_id => ctx.process_id,
      process_label => ctx.process_label,
      queue_id => ctx.queue_id,
      started_at => ctx.started_at.to_rfc3339(),
      reminders_sent => ctx.reminders_sent,
      escalations_sent => ctx.escalations_sent,
      variables => Value::from_serialize(ctx.variables),
    };

    let rendered = match override_source {
      Some(source) => self.env.render_str(source, values),
      None => self
        .env
        .get_template(kind.as_str())
        .and_then(|template| template.render(values)),
    };

    rendered.map_err(|source| EngineError::Render {
      task_id: ctx.task_id.to_string(),
      kind: kind.to_string(),
      source,
    })
  }
}

impl Default for MessageRenderer {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for MessageRenderer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MessageRenderer").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn message_context(variables: &BTreeMap<String, String>) -> MessageContext<'_> {
    MessageContext {
      task_id: "review",
      task_label: "Review expense",
      process_id: 7,
      process_label: "Expense approval",
      queue_id: 12,
      started_at: Utc::now(),
      reminders_sent: 1,
      escalations_sent: 0,
      variables,
    }
  }

  #[test]
  fn test_default_messages() {
    let renderer = MessageRenderer::new();
    let variables = BTreeMap::new();
    let ctx = message_context(&variables);

    let assignment = renderer
      .render(NotificationKind::Assignment, None, &ctx)
      .unwrap();
    assert_eq!(
      assignment,
      "You have been assigned \"Review expense\" in Expense approval (process 7)."
    );

    let reminder = renderer.render(NotificationKind::Reminder, None, &ctx).unwrap();
    assert!(reminder.contains("(reminder 2)"));
  }

  #[test]
  fn test_override_sees_process_variables() {
    let renderer = MessageRenderer::new();
    let variables = BTreeMap::from([("amount".to_string(), "1500".to_string())]);
    let ctx = message_context(&variables);

    let message = renderer
      .render(
        NotificationKind::Escalation,
        Some("{{ task_label }} for {{ variables.amount }} is overdue"),
        &ctx,
      )
      .unwrap();
    assert_eq!(message, "Review expense for 1500 is overdue");
  }

  #[test]
  fn test_broken_override_is_a_render_error() {
    let renderer = MessageRenderer::new();
    let variables = BTreeMap::new();
    let err = renderer
      .render(
        NotificationKind::Assignment,
        Some("{{ unclosed"),
        &message_context(&variables),
      )
      .unwrap_err();
    assert!(matches!(err, EngineError::Render { .. }));
  }

  #[test]
  fn test_channel_notifier_forwards() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);
    notifier.notify(Notification {
      kind: NotificationKind::Reminder,
      process_id: 1,
      queue_id: 2,
      task_id: "review".to_string(),
      recipients: vec![Identity::new("alice", "alice@example.com")],
      message: "hi".to_string(),
    });
    assert_eq!(rx.try_recv().unwrap().queue_id, 2);
  }
}
