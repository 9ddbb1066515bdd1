//! Identity resolution.
//!
//! The engine never owns users or roles. It asks an [`IdentityResolver`]
//! who is behind an assignment when it needs to notify or authorize someone.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
  pub name: String,
  #[serde(default)]
  pub email: String,
}

impl Identity {
  pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      email: email.into(),
    }
  }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
  async fn users_in_role(&self, role: &str) -> Vec<Identity>;

  async fn user_by_name(&self, name: &str) -> Option<Identity>;

  async fn roles_for_user(&self, name: &str) -> Vec<String>;
}

/// A fixed user and role directory, typically loaded from JSON:
///
/// ```json
/// {
///   "users": [{ "name": "alice", "email": "alice@example.com" }],
///   "roles": { "managers": ["alice"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDirectory {
  #[serde(default)]
  pub users: Vec<Identity>,
  #[serde(default)]
  pub roles: BTreeMap<String, BTreeSet<String>>,
}

impl StaticDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  pub fn with_user(mut self, name: &str, email: &str) -> Self {
    self.users.retain(|u| u.name != name);
    self.users.push(Identity::new(name, email));
    self
  }

  pub fn with_role(mut self, role: &str, members: &[&str]) -> Self {
    self
      .roles
      .entry(role.to_string())
      .or_default()
      .extend(members.iter().map(|m| m.to_string()));
    self
  }
}

#[async_trait]
impl IdentityResolver for StaticDirectory {
  async fn users_in_role(&self, role: &str) -> Vec<Identity> {
    let Some(members) = self.roles.get(role) else {
      return Vec::new();
    };
    self
      .users
      .iter()
      .filter(|u| members.contains(&u.name))
      .cloned()
      .collect()
  }

  async fn user_by_name(&self, name: &str) -> Option<Identity> {
    self.users.iter().find(|u| u.name == name).cloned()
  }

  async fn roles_for_user(&self, name: &str) -> Vec<String> {
    self
      .roles
      .iter()
      .filter(|(_, members)| members.contains(name))
      .map(|(role, _)| role.clone())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_directory_from_json() {
    let directory = StaticDirectory::from_json(
      r#"{
        "users": [
          { "name": "alice", "email": "alice@example.com" },
          { "name": "bob" }
        ],
        "roles": { "managers": ["alice", "carol"] }
      }"#,
    )
    .unwrap();

    let managers = directory.users_in_role("managers").await;
    assert_eq!(managers, vec![Identity::new("alice", "alice@example.com")]);
    assert_eq!(directory.user_by_name("bob").await.unwrap().email, "");
    assert!(directory.user_by_name("carol").await.is_none());
    assert_eq!(directory.roles_for_user("alice").await, vec!["managers"]);
    assert!(directory.users_in_role("finance").await.is_empty());
  }
}
