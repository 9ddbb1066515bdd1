//! Built-in task types.

mod condition;
mod control;
mod join;
mod variable;

pub use condition::IfPlugin;
pub use control::{EndPlugin, InteractivePlugin, StartPlugin};
pub use join::{AndPlugin, OrPlugin};
pub use variable::SetProcessVariablePlugin;
