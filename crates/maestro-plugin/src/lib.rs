//! Maestro Plugin
//!
//! Task types are plugins: each task type in a template maps to a
//! [`TaskPlugin`] built by a factory registered in a [`TaskPluginRegistry`].
//!
//! Plugins never touch the stores. They read a [`TaskContext`] snapshot of
//! the process and describe what should change through [`TaskEffect`]s,
//! which the orchestrator applies.

mod builtin;
mod error;
mod issue;
mod plugin;
mod registry;

pub use builtin::{
  AndPlugin, EndPlugin, IfPlugin, InteractivePlugin, OrPlugin, SetProcessVariablePlugin,
  StartPlugin,
};
pub use error::TaskError;
pub use issue::{Issue, Severity};
pub use plugin::{Execution, TaskContext, TaskEffect, TaskPlugin};
pub use registry::{TaskPluginFactory, TaskPluginRegistry};
