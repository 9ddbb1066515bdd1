//! Maestro Template
//!
//! This crate contains the immutable workflow template representation for
//! maestro. A template is a directed graph of tasks plus the process variables
//! every process started from it receives.
//!
//! Templates are JSON documents. The assignment and notification
//! mini-languages (`kind:mode:value[:event]`, comma separated) are parsed once
//! while deserializing, so the engine only ever sees typed rules.
//!
//! ```json
//! {
//!   "id": "expense",
//!   "label": "Expense approval",
//!   "variables": [{ "name": "approver", "default": "managers" }],
//!   "tasks": [
//!     { "id": "start", "type": "MaestroStart", "next_step": ["review"] },
//!     {
//!       "id": "review",
//!       "type": "MaestroInteractive",
//!       "next_step": ["end"],
//!       "assigned": "role:variable:approver"
//!     },
//!     { "id": "end", "type": "MaestroEnd" }
//!   ]
//! }
//! ```

mod error;
mod graph;
mod rule;
mod task;
mod template;

pub use error::TemplateError;
pub use graph::TaskGraph;
pub use rule::{
  ActorKind, AssignmentRule, NotificationKind, NotificationRule, format_assignment_spec,
  format_notification_spec, parse_assignment_spec, parse_notification_spec,
};
pub use task::{Branch, TaskDef, TaskType};
pub use template::{Template, VariableDef};
