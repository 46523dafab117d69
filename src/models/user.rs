use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            _ => None,
        }
    }
}

/// A user acting on trucks, as returned by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub identity: String,
    pub name: String,
    pub role: Role,
    pub assigned_checkpoints: BTreeSet<String>,
}

impl User {
    pub fn new(identity: &str, name: &str, role: Role) -> Self {
        Self {
            identity: identity.to_string(),
            name: name.to_string(),
            role,
            assigned_checkpoints: BTreeSet::new(),
        }
    }

    pub fn with_checkpoints<I, S>(mut self, checkpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assigned_checkpoints
            .extend(checkpoints.into_iter().map(Into::into));
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the user may record events at `checkpoint`
    pub fn may_operate(&self, checkpoint: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Operator => self.assigned_checkpoints.contains(checkpoint),
        }
    }
}
