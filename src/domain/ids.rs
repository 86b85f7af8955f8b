//! Domain identifier types with validation
//!
//! Newtype wrappers for tenant ids, change-log positions and table names.
//! Table names end up in generated DDL and queries, so they are validated
//! as plain SQL identifiers on construction.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
    })
}

/// Check that `name` can be spliced into SQL as an unquoted identifier
///
/// # Errors
///
/// Returns a description of the problem if the name is empty, too long or
/// contains anything other than ASCII letters, digits and underscores.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(format!(
            "'{name}' is not a valid SQL identifier (letters, digits and '_' only, max 63 chars)"
        ))
    }
}

/// Tenant identifier
///
/// Every target document is keyed by tenant, so several source systems can
/// share one target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(i32);

impl TenantId {
    /// Creates a new TenantId
    ///
    /// # Errors
    ///
    /// Tenant ids must be positive.
    pub fn new(id: i32) -> Result<Self, String> {
        if id <= 0 {
            return Err(format!("Tenant ID must be positive, got {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the raw tenant id
    pub fn get(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("Invalid tenant ID '{s}': {e}"))?;
        Self::new(id)
    }
}

/// Position in the change log
///
/// Change ids are assigned by the log's sequence and strictly increase in
/// commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(i64);

impl ChangeId {
    /// Wraps a raw change id
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw change id
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChangeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Source table name
///
/// # Examples
///
/// ```
/// use fhir_bridge::domain::ids::TableName;
///
/// let table = TableName::new("lab_results").unwrap();
/// assert_eq!(table.as_str(), "lab_results");
/// assert!(TableName::new("patients; DROP TABLE x").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Creates a validated table name
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self(name))
    }

    /// Returns the table name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_rejects_non_positive() {
        assert!(TenantId::new(1).is_ok());
        assert!(TenantId::new(0).is_err());
        assert!(TenantId::new(-3).is_err());
    }

    #[test]
    fn test_tenant_id_from_str() {
        let tenant = TenantId::from_str(" 7 ").unwrap();
        assert_eq!(tenant.get(), 7);
        assert!(TenantId::from_str("seven").is_err());
    }

    #[test]
    fn test_change_id_ordering() {
        assert!(ChangeId::new(10) > ChangeId::new(9));
        assert_eq!(ChangeId::from(5).get(), 5);
    }

    #[test]
    fn test_table_name_validation() {
        assert!(TableName::new("patients").is_ok());
        assert!(TableName::new("_audit_2024").is_ok());
        assert!(TableName::new("").is_err());
        assert!(TableName::new("1patients").is_err());
        assert!(TableName::new("public.patients").is_err());
        assert!(TableName::new("x\"; DROP TABLE y; --").is_err());
        assert!(TableName::new("a".repeat(64)).is_err());
    }

    #[test]
    fn test_table_name_serde() {
        let table: TableName = serde_json::from_str("\"encounters\"").unwrap();
        assert_eq!(table.as_str(), "encounters");
        assert!(serde_json::from_str::<TableName>("\"bad name\"").is_err());
        assert_eq!(serde_json::to_string(&table).unwrap(), "\"encounters\"");
    }
}
