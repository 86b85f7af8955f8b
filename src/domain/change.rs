//! Change events recorded by the capture triggers

use super::ids::ChangeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of row mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// Name as written by the trigger (`TG_OP`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Operation::Insert),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(format!("Unknown change operation '{other}'")),
        }
    }
}

/// One entry of the change log
///
/// Events are immutable once written. `old_data` is present for updates and
/// deletes, `new_data` for inserts and updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub change_id: ChangeId,
    pub table_name: String,
    pub operation: Operation,
    pub record_id: i64,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
    pub actor: Option<String>,
}

impl ChangeEvent {
    /// Whether the event removes the row
    pub fn is_delete(&self) -> bool {
        self.operation == Operation::Delete
    }
}
