//! Transformation registry
//!
//! A closed set of value transformations referenced by name from mapping
//! specs. Every transformation is total: it returns a JSON value (possibly
//! null) for any input and never fails.

use crate::domain::record::{SourceValue, DATETIME_FORMAT, DATE_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Named value transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transformation {
    ToString,
    ToDecimal,
    FormatDate,
    FormatDatetime,
    NormalizeGender,
    PatientReference,
    EncounterReference,
    MapEncounterClass,
    MapEncounterStatus,
    MapAbnormalFlag,
    MapMedicationStatus,
    ExtractDosageValue,
}

impl Transformation {
    /// Every registered transformation
    pub const ALL: [Transformation; 12] = [
        Transformation::ToString,
        Transformation::ToDecimal,
        Transformation::FormatDate,
        Transformation::FormatDatetime,
        Transformation::NormalizeGender,
        Transformation::PatientReference,
        Transformation::EncounterReference,
        Transformation::MapEncounterClass,
        Transformation::MapEncounterStatus,
        Transformation::MapAbnormalFlag,
        Transformation::MapMedicationStatus,
        Transformation::ExtractDosageValue,
    ];

    /// Registry name used in mapping specs
    pub fn name(&self) -> &'static str {
        match self {
            Transformation::ToString => "to_string",
            Transformation::ToDecimal => "to_decimal",
            Transformation::FormatDate => "format_date",
            Transformation::FormatDatetime => "format_datetime",
            Transformation::NormalizeGender => "normalize_gender",
            Transformation::PatientReference => "patient_reference",
            Transformation::EncounterReference => "encounter_reference",
            Transformation::MapEncounterClass => "map_encounter_class",
            Transformation::MapEncounterStatus => "map_encounter_status",
            Transformation::MapAbnormalFlag => "map_abnormal_flag",
            Transformation::MapMedicationStatus => "map_medication_status",
            Transformation::ExtractDosageValue => "extract_dosage_value",
        }
    }

    /// Looks a transformation up by registry name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Applies the transformation
    pub fn apply(&self, value: &SourceValue) -> Value {
        match self {
            Transformation::ToString => to_string(value),
            Transformation::ToDecimal => to_decimal(value),
            Transformation::FormatDate => format_date(value),
            Transformation::FormatDatetime => format_datetime(value),
            Transformation::NormalizeGender => normalize_gender(value),
            Transformation::PatientReference => reference("Patient", value),
            Transformation::EncounterReference => reference("Encounter", value),
            Transformation::MapEncounterClass => lookup(
                value,
                &[
                    ("inpatient", "IMP"),
                    ("outpatient", "AMB"),
                    ("emergency", "EMER"),
                    ("home", "HH"),
                    ("virtual", "VR"),
                ],
                "AMB",
            ),
            Transformation::MapEncounterStatus => lookup(
                value,
                &[
                    ("active", "in-progress"),
                    ("discharged", "finished"),
                    ("cancelled", "cancelled"),
                    ("transferred", "in-progress"),
                    ("planned", "planned"),
                ],
                "unknown",
            ),
            Transformation::MapAbnormalFlag => {
                if value.is_null() {
                    return Value::Null;
                }
                lookup(
                    value,
                    &[
                        ("normal", "N"),
                        ("high", "H"),
                        ("low", "L"),
                        ("critical", "HH"),
                        ("abnormal", "A"),
                    ],
                    "N",
                )
            }
            Transformation::MapMedicationStatus => lookup(
                value,
                &[
                    ("active", "active"),
                    ("completed", "completed"),
                    ("discontinued", "stopped"),
                    ("cancelled", "cancelled"),
                    ("on-hold", "on-hold"),
                ],
                "unknown",
            ),
            Transformation::ExtractDosageValue => extract_dosage_value(value),
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transformation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("Unknown transformation '{s}'"))
    }
}

fn normalized(value: &SourceValue) -> String {
    value.to_string().trim().to_lowercase()
}

fn lookup(value: &SourceValue, table: &[(&str, &'static str)], default: &'static str) -> Value {
    let key = normalized(value);
    let code = table
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| *to)
        .unwrap_or(default);
    Value::String(code.to_string())
}

fn to_string(value: &SourceValue) -> Value {
    match value {
        SourceValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

fn to_decimal(value: &SourceValue) -> Value {
    let parsed = match value {
        SourceValue::Integer(i) => Some(*i as f64),
        SourceValue::Float(f) => Some(*f),
        SourceValue::Text(s) => s.trim().parse::<f64>().ok(),
        SourceValue::Json(Value::Number(n)) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Interprets ISO-like text as a timestamp
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD[T ]HH:MM:SS[.f]` and RFC 3339 with an
/// offset, which is how `to_jsonb` renders `date`, `timestamp` and
/// `timestamptz` columns. Offsets are dropped, keeping the wall-clock time.
fn parse_temporal(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn format_date(value: &SourceValue) -> Value {
    match value {
        SourceValue::Null => Value::Null,
        SourceValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
        SourceValue::DateTime(dt) => Value::String(dt.format(DATE_FORMAT).to_string()),
        SourceValue::Text(s) => match parse_temporal(s) {
            Some(dt) => Value::String(dt.format(DATE_FORMAT).to_string()),
            None => Value::String(s.clone()),
        },
        other => Value::String(other.to_string()),
    }
}

fn format_datetime(value: &SourceValue) -> Value {
    match value {
        SourceValue::Null => Value::Null,
        SourceValue::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        SourceValue::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|dt| Value::String(dt.format(DATETIME_FORMAT).to_string()))
            .unwrap_or(Value::Null),
        SourceValue::Text(s) => match parse_temporal(s) {
            Some(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
            None => Value::String(s.clone()),
        },
        other => Value::String(other.to_string()),
    }
}

fn normalize_gender(value: &SourceValue) -> Value {
    let code = match normalized(value).as_str() {
        "m" | "male" | "man" => "male",
        "f" | "female" | "woman" => "female",
        "o" | "other" => "other",
        _ => "unknown",
    };
    Value::String(code.to_string())
}

fn reference(resource: &str, value: &SourceValue) -> Value {
    match value {
        SourceValue::Null => Value::Null,
        id => Value::String(format!("{resource}/{id}")),
    }
}

fn dosage_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+\.?\d*)").expect("dosage pattern is valid"))
}

fn extract_dosage_value(value: &SourceValue) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let text = value.to_string();
    dosage_pattern()
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| Value::String(m.as_str().to_string()))
        .unwrap_or(Value::Null)
}
