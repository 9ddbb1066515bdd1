//! Assignment and notification rules.
//!
//! Both are authored as comma separated clauses:
//!
//! - assignment: `kind:mode:value`, e.g. `user:fixed:alice,role:variable:approver`
//! - notification: `kind:mode:value:event`, e.g. `role:fixed:managers:escalation`
//!
//! `mode` is either `fixed` (the value is the actor identifier) or `variable`
//! (the value names a process variable holding a comma separated list of
//! identifiers). An empty assignment spec, or the literal `engine`, means the
//! task runs under the engine's own authority and has no assignees.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// The kind of actor a rule targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorKind {
  User,
  Role,
  Other(String),
}

impl ActorKind {
  pub fn as_str(&self) -> &str {
    match self {
      ActorKind::User => "user",
      ActorKind::Role => "role",
      ActorKind::Other(kind) => kind,
    }
  }
}

impl From<&str> for ActorKind {
  fn from(value: &str) -> Self {
    match value {
      "user" => ActorKind::User,
      "role" => ActorKind::Role,
      other => ActorKind::Other(other.to_string()),
    }
  }
}

impl fmt::Display for ActorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Who a task (or a notification) is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentRule {
  /// A literal actor identifier.
  Fixed { kind: ActorKind, id: String },
  /// The actors listed in a process variable.
  Variable { kind: ActorKind, variable: String },
}

impl AssignmentRule {
  pub fn kind(&self) -> &ActorKind {
    match self {
      AssignmentRule::Fixed { kind, .. } | AssignmentRule::Variable { kind, .. } => kind,
    }
  }

  /// The process variable this rule reads, if any.
  pub fn variable(&self) -> Option<&str> {
    match self {
      AssignmentRule::Fixed { .. } => None,
      AssignmentRule::Variable { variable, .. } => Some(variable),
    }
  }

  fn parse_parts(kind: &str, mode: &str, value: &str) -> Result<Self, String> {
    if kind.is_empty() {
      return Err("missing actor kind".to_string());
    }
    if value.is_empty() {
      return Err("missing value".to_string());
    }
    let kind = ActorKind::from(kind);
    match mode {
      "fixed" => Ok(AssignmentRule::Fixed {
        kind,
        id: value.to_string(),
      }),
      "variable" => Ok(AssignmentRule::Variable {
        kind,
        variable: value.to_string(),
      }),
      other => Err(format!("unknown mode '{}', expected fixed or variable", other)),
    }
  }
}

impl fmt::Display for AssignmentRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AssignmentRule::Fixed { kind, id } => write!(f, "{}:fixed:{}", kind, id),
      AssignmentRule::Variable { kind, variable } => write!(f, "{}:variable:{}", kind, variable),
    }
  }
}

/// The event a notification is sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  Assignment,
  Reminder,
  Escalation,
}

impl NotificationKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      NotificationKind::Assignment => "assignment",
      NotificationKind::Reminder => "reminder",
      NotificationKind::Escalation => "escalation",
    }
  }
}

impl FromStr for NotificationKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "assignment" => Ok(NotificationKind::Assignment),
      "reminder" => Ok(NotificationKind::Reminder),
      "escalation" => Ok(NotificationKind::Escalation),
      other => Err(format!("unknown notification event '{}'", other)),
    }
  }
}

impl fmt::Display for NotificationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A notification recipient rule bound to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRule {
  pub target: AssignmentRule,
  pub event: NotificationKind,
}

impl fmt::Display for NotificationRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.target, self.event)
  }
}

fn clauses(spec: &str) -> impl Iterator<Item = &str> {
  spec.split(',').map(str::trim).filter(|c| !c.is_empty())
}

/// Parse an assignment spec into typed rules.
pub fn parse_assignment_spec(spec: &str) -> Result<Vec<AssignmentRule>, TemplateError> {
  let spec = spec.trim();
  if spec.is_empty() || spec.eq_ignore_ascii_case("engine") {
    return Ok(Vec::new());
  }

  clauses(spec)
    .map(|clause| {
      let parts: Vec<&str> = clause.split(':').map(str::trim).collect();
      let [kind, mode, value] = parts.as_slice() else {
        return Err(TemplateError::MalformedAssignment {
          clause: clause.to_string(),
          reason: "expected kind:mode:value".to_string(),
        });
      };
      AssignmentRule::parse_parts(kind, mode, value).map_err(|reason| {
        TemplateError::MalformedAssignment {
          clause: clause.to_string(),
          reason,
        }
      })
    })
    .collect()
}

/// Parse a notification spec into typed rules.
pub fn parse_notification_spec(spec: &str) -> Result<Vec<NotificationRule>, TemplateError> {
  clauses(spec)
    .map(|clause| {
      let malformed = |reason: String| TemplateError::MalformedNotification {
        clause: clause.to_string(),
        reason,
      };
      let parts: Vec<&str> = clause.split(':').map(str::trim).collect();
      let [kind, mode, value, event] = parts.as_slice() else {
        return Err(malformed("expected kind:mode:value:event".to_string()));
      };
      let target = AssignmentRule::parse_parts(kind, mode, value).map_err(malformed)?;
      let event = event.parse().map_err(malformed)?;
      Ok(NotificationRule { target, event })
    })
    .collect()
}

pub fn format_assignment_spec(rules: &[AssignmentRule]) -> String {
  rules
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(",")
}

pub fn format_notification_spec(rules: &[NotificationRule]) -> String {
  rules
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(",")
}

/// Serde adapter storing assignment rules as their string spec.
pub(crate) mod assignment_spec {
  use serde::{Deserialize, Deserializer, Serializer};

  use super::{AssignmentRule, format_assignment_spec, parse_assignment_spec};

  pub fn serialize<S: Serializer>(rules: &[AssignmentRule], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_assignment_spec(rules))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<AssignmentRule>, D::Error> {
    let spec = String::deserialize(d)?;
    parse_assignment_spec(&spec).map_err(serde::de::Error::custom)
  }
}

/// Serde adapter storing notification rules as their string spec.
pub(crate) mod notification_spec {
  use serde::{Deserialize, Deserializer, Serializer};

  use super::{NotificationRule, format_notification_spec, parse_notification_spec};

  pub fn serialize<S: Serializer>(rules: &[NotificationRule], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_notification_spec(rules))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NotificationRule>, D::Error> {
    let spec = String::deserialize(d)?;
    parse_notification_spec(&spec).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_engine_and_empty_specs_have_no_rules() {
    assert!(parse_assignment_spec("").unwrap().is_empty());
    assert!(parse_assignment_spec("  engine ").unwrap().is_empty());
  }

  #[test]
  fn test_parse_mixed_assignment_spec() {
    let rules = parse_assignment_spec("user:fixed:alice, role:variable:approver").unwrap();
    assert_eq!(
      rules,
      vec![
        AssignmentRule::Fixed {
          kind: ActorKind::User,
          id: "alice".to_string(),
        },
        AssignmentRule::Variable {
          kind: ActorKind::Role,
          variable: "approver".to_string(),
        },
      ]
    );
    assert_eq!(rules[1].variable(), Some("approver"));
  }

  #[test]
  fn test_custom_actor_kind_is_kept() {
    let rules = parse_assignment_spec("group:fixed:finance").unwrap();
    assert_eq!(rules[0].kind(), &ActorKind::Other("group".to_string()));
    assert_eq!(format_assignment_spec(&rules), "group:fixed:finance");
  }

  #[test]
  fn test_bad_mode_is_rejected() {
    let err = parse_assignment_spec("user:sometimes:alice").unwrap_err();
    assert!(matches!(err, TemplateError::MalformedAssignment { .. }));
  }

  #[test]
  fn test_missing_part_is_rejected() {
    let err = parse_assignment_spec("user:fixed").unwrap_err();
    assert!(err.to_string().contains("expected kind:mode:value"));
  }

  #[test]
  fn test_parse_notification_spec() {
    let rules =
      parse_notification_spec("role:fixed:managers:escalation,user:variable:initiator:reminder")
        .unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].event, NotificationKind::Escalation);
    assert_eq!(rules[1].target.variable(), Some("initiator"));
  }

  #[test]
  fn test_unknown_notification_event_is_rejected() {
    let err = parse_notification_spec("user:fixed:bob:weekly").unwrap_err();
    assert!(matches!(err, TemplateError::MalformedNotification { .. }));
  }
}
