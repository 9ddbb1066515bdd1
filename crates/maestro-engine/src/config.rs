//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Behavior switches and well-known variable names for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
  /// Send assignment notifications when tasks are created or reassigned.
  #[serde(default = "default_true")]
  pub send_notifications: bool,

  #[serde(default = "default_true")]
  pub send_reminders: bool,

  #[serde(default = "default_true")]
  pub send_escalations: bool,

  /// Seconds between advance passes of the periodic runner.
  #[serde(default = "default_advance_interval")]
  pub advance_interval_secs: u64,

  /// Process variable set to the initiator when a process starts.
  #[serde(default = "default_initiator_variable")]
  pub initiator_variable: String,

  /// Process variable holding the number of the current workflow stage.
  #[serde(default = "default_current_stage_variable")]
  pub current_stage_variable: String,

  #[serde(default = "default_current_stage_message_variable")]
  pub current_stage_message_variable: String,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      send_notifications: true,
      send_reminders: true,
      send_escalations: true,
      advance_interval_secs: default_advance_interval(),
      initiator_variable: default_initiator_variable(),
      current_stage_variable: default_current_stage_variable(),
      current_stage_message_variable: default_current_stage_message_variable(),
    }
  }
}

impl OrchestratorConfig {
  pub fn advance_interval(&self) -> Duration {
    Duration::from_secs(self.advance_interval_secs.max(1))
  }
}

fn default_true() -> bool {
  true
}

fn default_advance_interval() -> u64 {
  60
}

fn default_initiator_variable() -> String {
  "initiator".to_string()
}

fn default_current_stage_variable() -> String {
  "workflow_current_stage".to_string()
}

fn default_current_stage_message_variable() -> String {
  "workflow_current_stage_message".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_config_uses_defaults() {
    let config: OrchestratorConfig =
      serde_json::from_str(r#"{ "send_reminders": false, "advance_interval_secs": 5 }"#).unwrap();
    assert!(!config.send_reminders);
    assert!(config.send_escalations);
    assert_eq!(config.advance_interval(), Duration::from_secs(5));
    assert_eq!(config.initiator_variable, "initiator");
  }

  #[test]
  fn test_zero_interval_is_clamped() {
    let config = OrchestratorConfig {
      advance_interval_secs: 0,
      ..Default::default()
    };
    assert_eq!(config.advance_interval(), Duration::from_secs(1));
  }
}
