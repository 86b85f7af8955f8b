//! Secret handling for connection strings
//!
//! Connection strings embed database passwords, so they are held in a
//! `secrecy::Secret` that redacts `Debug` output and zeroizes its buffer on
//! drop. Call `expose_secret()` only at the point of connecting.
//!
//! ```rust
//! use fhir_bridge::config::{redact_connection_string, secret_string};
//! use secrecy::ExposeSecret;
//!
//! let conn = secret_string("postgresql://sync:hunter2@db:5432/hospital".to_string());
//! assert!(!format!("{conn:?}").contains("hunter2"));
//! assert_eq!(
//!     redact_connection_string(conn.expose_secret().as_ref()),
//!     "postgresql://***@db:5432/hospital"
//! );
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String payload of a [`SecretString`]
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the secret starts with `prefix`
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Parses the secret into another type
    pub fn parse<F: std::str::FromStr>(&self) -> Result<F, F::Err> {
        self.0.parse()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A secret string, zeroized on drop and redacted in `Debug`
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Removes credentials from a PostgreSQL URL for display
///
/// Everything between the scheme and the last `@` is replaced by `***`.
/// Strings without credentials are returned with the scheme only.
pub fn redact_connection_string(conn: &str) -> String {
    let (scheme, rest) = conn.split_once("://").unwrap_or(("postgresql", conn));
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => format!("{scheme}://{rest}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("postgresql://a:b@h/db".to_string());
        assert_eq!(secret.expose_secret(), "postgresql://a:b@h/db");
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("sensitive-data".to_string());
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("sensitive-data"));
    }

    #[test]
    fn test_secret_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            connection_string: SecretString,
        }

        let section: Section =
            toml::from_str(r#"connection_string = "postgres://u:p@localhost/x""#).unwrap();
        assert!(section.connection_string.expose_secret().starts_with("postgres://"));
    }

    #[test]
    fn test_redact_connection_string() {
        assert_eq!(
            redact_connection_string("postgresql://user:p@ss@localhost:5432/fhir"),
            "postgresql://***@localhost:5432/fhir"
        );
        assert_eq!(
            redact_connection_string("postgres://localhost/fhir"),
            "postgres://localhost/fhir"
        );
    }
}
