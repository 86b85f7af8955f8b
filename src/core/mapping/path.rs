//! Target path grammar
//!
//! Paths address a location inside a target document using dot-separated
//! keys with optional array indices, e.g. `name[0].given[0]` or
//! `dosageInstruction[0].doseAndRate[0].doseQuantity.value`. They are parsed
//! once when a mapping spec is compiled and then only written through.

use crate::domain::record::json_kind;
use crate::domain::MappingError;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Largest array index a path may address
pub const MAX_INDEX: usize = 10_000;

/// One step of a parsed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

impl PathStep {
    /// Empty container a step expects to traverse into
    fn empty_container(&self) -> Value {
        match self {
            PathStep::Key(_) => Value::Object(Map::new()),
            PathStep::Index(_) => Value::Array(Vec::new()),
        }
    }
}

/// A compiled target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    raw: String,
    steps: Vec<PathStep>,
}

impl TargetPath {
    /// Parses a path
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidPath`] when the path is empty, starts
    /// with an index, has empty segments, has malformed brackets, or
    /// addresses an index above [`MAX_INDEX`].
    ///
    /// # Examples
    ///
    /// ```
    /// use fhir_bridge::core::mapping::path::{PathStep, TargetPath};
    ///
    /// let path = TargetPath::parse("name[0].given[1]").unwrap();
    /// assert_eq!(
    ///     path.steps(),
    ///     &[
    ///         PathStep::Key("name".into()),
    ///         PathStep::Index(0),
    ///         PathStep::Key("given".into()),
    ///         PathStep::Index(1),
    ///     ]
    /// );
    /// ```
    pub fn parse(raw: &str) -> Result<Self, MappingError> {
        let invalid = |reason: &str| MappingError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut steps = Vec::new();
        for segment in raw.split('.') {
            let (key, mut rest) = match segment.find('[') {
                Some(pos) => segment.split_at(pos),
                None => (segment, ""),
            };

            if key.is_empty() {
                return Err(invalid("every segment must start with a key"));
            }
            if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid("keys may only contain letters, digits and '_'"));
            }
            steps.push(PathStep::Key(key.to_string()));

            while !rest.is_empty() {
                let inner = rest
                    .strip_prefix('[')
                    .ok_or_else(|| invalid("unexpected characters after index"))?;
                let close = inner
                    .find(']')
                    .ok_or_else(|| invalid("unterminated '['"))?;
                let digits = &inner[..close];
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid("array index must be a non-negative integer"));
                }
                let index = digits
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index <= MAX_INDEX)
                    .ok_or_else(|| invalid("array index out of range"))?;
                steps.push(PathStep::Index(index));
                rest = &inner[close + 1..];
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            steps,
        })
    }

    /// The path as written in the mapping spec
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed steps, never empty, first step always a key
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Writes `value` at this path inside `root`
    ///
    /// Missing intermediate nodes are created. Index steps grow arrays with
    /// `{}` placeholders up to the requested position; a final index step
    /// pads with `null` instead. Existing nodes are reused, so paths sharing
    /// a prefix build into the same subtree.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::PathConflict`] when a step needs an object or
    /// array but finds a node of another kind.
    pub fn write(&self, root: &mut Map<String, Value>, value: Value) -> Result<(), MappingError> {
        let Some((PathStep::Key(first), rest)) = self.steps.split_first() else {
            return Err(MappingError::InvalidPath {
                path: self.raw.clone(),
                reason: "path must start with a key".to_string(),
            });
        };

        let Some(next) = rest.first() else {
            root.insert(first.clone(), value);
            return Ok(());
        };

        let mut node = root
            .entry(first.clone())
            .or_insert_with(|| next.empty_container());
        if node.is_null() {
            *node = next.empty_container();
        }

        for (pos, step) in rest.iter().enumerate() {
            let following = rest.get(pos + 1);
            match step {
                PathStep::Key(key) => {
                    let object = match node {
                        Value::Object(object) => object,
                        other => return Err(self.conflict(other)),
                    };
                    match following {
                        None => {
                            object.insert(key.clone(), value);
                            return Ok(());
                        }
                        Some(following) => {
                            let child = object
                                .entry(key.clone())
                                .or_insert_with(|| following.empty_container());
                            if child.is_null() {
                                *child = following.empty_container();
                            }
                            node = child;
                        }
                    }
                }
                PathStep::Index(index) => {
                    let index = *index;
                    let array = match node {
                        Value::Array(array) => array,
                        other => return Err(self.conflict(other)),
                    };
                    match following {
                        None => {
                            if array.len() <= index {
                                array.resize(index + 1, Value::Null);
                            }
                            array[index] = value;
                            return Ok(());
                        }
                        Some(following) => {
                            while array.len() < index {
                                array.push(Value::Object(Map::new()));
                            }
                            if array.len() == index {
                                array.push(following.empty_container());
                            }
                            let child = &mut array[index];
                            if child.is_null() {
                                *child = following.empty_container();
                            }
                            node = child;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn conflict(&self, found: &Value) -> MappingError {
        MappingError::PathConflict {
            path: self.raw.clone(),
            found: json_kind(found).to_string(),
        }
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TargetPath {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_all(paths: &[(&str, Value)]) -> Value {
        let mut root = Map::new();
        for (path, value) in paths {
            TargetPath::parse(path)
                .unwrap()
                .write(&mut root, value.clone())
                .unwrap();
        }
        Value::Object(root)
    }

    #[test]
    fn test_parse_simple_key() {
        let path = TargetPath::parse("birthDate").unwrap();
        assert_eq!(path.steps(), &[PathStep::Key("birthDate".to_string())]);
        assert_eq!(path.as_str(), "birthDate");
    }

    #[test]
    fn test_parse_nested_indices() {
        let path = TargetPath::parse("interpretation[0].coding[0].code").unwrap();
        assert_eq!(path.steps().len(), 5);
        assert_eq!(path.steps()[4], PathStep::Key("code".to_string()));
    }

    #[test]
    fn test_parse_consecutive_indices() {
        let path = TargetPath::parse("matrix[1][2]").unwrap();
        assert_eq!(
            path.steps(),
            &[
                PathStep::Key("matrix".to_string()),
                PathStep::Index(1),
                PathStep::Index(2),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for bad in ["", "  ", "[0]", "a..b", "a.", "a[", "a[]", "a[x]", "a[0]b", "a-b", "a[-1]"] {
            assert!(
                matches!(TargetPath::parse(bad), Err(MappingError::InvalidPath { .. })),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_parse_caps_array_index() {
        let path = TargetPath::parse(&format!("line[{MAX_INDEX}]")).unwrap();
        assert_eq!(path.steps()[1], PathStep::Index(MAX_INDEX));

        for bad in [
            format!("line[{}]", MAX_INDEX + 1),
            "x[4000000000]".to_string(),
            "x[0][99999999999999999999999]".to_string(),
        ] {
            let err = TargetPath::parse(&bad).unwrap_err();
            assert_eq!(
                err,
                MappingError::InvalidPath {
                    path: bad.clone(),
                    reason: "array index out of range".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_write_grows_arrays_with_placeholders() {
        let doc = write_all(&[("x[2].y", json!(1))]);
        assert_eq!(doc, json!({"x": [{}, {}, {"y": 1}]}));
    }

    #[test]
    fn test_write_final_index_pads_with_null() {
        let doc = write_all(&[("line[2]", json!("c"))]);
        assert_eq!(doc, json!({"line": [null, null, "c"]}));
    }

    #[test]
    fn test_write_merges_shared_prefixes() {
        let doc = write_all(&[
            ("name[0].given[0]", json!("Ada")),
            ("name[0].family", json!("Lovelace")),
            ("telecom[0].value", json!("555-0100")),
            ("telecom[1].value", json!("ada@example.org")),
        ]);
        assert_eq!(
            doc,
            json!({
                "name": [{"given": ["Ada"], "family": "Lovelace"}],
                "telecom": [{"value": "555-0100"}, {"value": "ada@example.org"}],
            })
        );
    }

    #[test]
    fn test_write_later_value_wins() {
        let doc = write_all(&[("status", json!("active")), ("status", json!("finished"))]);
        assert_eq!(doc, json!({"status": "finished"}));
    }

    #[test]
    fn test_write_fills_null_placeholder_with_container() {
        let doc = write_all(&[("line[1]", json!("b")), ("line[0].text", json!("a"))]);
        assert_eq!(doc, json!({"line": [{"text": "a"}, "b"]}));
    }

    #[test]
    fn test_write_reports_conflicts() {
        let mut root = Map::new();
        TargetPath::parse("code")
            .unwrap()
            .write(&mut root, json!("x"))
            .unwrap();

        let err = TargetPath::parse("code.text")
            .unwrap()
            .write(&mut root, json!("y"))
            .unwrap_err();
        assert_eq!(
            err,
            MappingError::PathConflict {
                path: "code.text".to_string(),
                found: "string".to_string(),
            }
        );

        let err = TargetPath::parse("code[0]")
            .unwrap()
            .write(&mut root, json!("z"))
            .unwrap_err();
        assert!(matches!(err, MappingError::PathConflict { .. }));
    }
}
