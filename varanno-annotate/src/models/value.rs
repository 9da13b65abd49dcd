use std::fmt::{self, Display};

use chrono::{DateTime, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};

///
/// Declared type of an annotation slot.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Int,
    Long,
    Double,
    Bool,
    Timestamp,
    Enum,
}

///
/// A typed annotation value. Enum values are kept as their declared label.
///
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Enum(String),
}

impl FieldValue {
    ///
    /// Parse a raw textual value into `field_type`.
    ///
    /// Empty strings and unparsable numbers give `None`. Booleans are `true`
    /// only for a case-insensitive `true`. Enum labels must match one of
    /// `allowed` exactly; an empty `allowed` list accepts any label.
    ///
    pub fn parse(field_type: FieldType, raw: &str, allowed: &[String]) -> Option<FieldValue> {
        if raw.is_empty() {
            return None;
        }
        match field_type {
            FieldType::Text => Some(FieldValue::Text(raw.to_string())),
            FieldType::Int => raw.trim().parse().ok().map(FieldValue::Int),
            FieldType::Long => raw.trim().parse().ok().map(FieldValue::Long),
            FieldType::Double => raw.trim().parse().ok().map(FieldValue::Double),
            FieldType::Bool => Some(FieldValue::Bool(raw.eq_ignore_ascii_case("true"))),
            FieldType::Timestamp => parse_timestamp(raw).map(FieldValue::Timestamp),
            FieldType::Enum => {
                if allowed.is_empty() || allowed.iter().any(|v| v == raw) {
                    Some(FieldValue::Enum(raw.to_string()))
                } else {
                    None
                }
            }
        }
    }

    ///
    /// Convert to `field_type` when the conversion loses nothing meaningful:
    /// between the numeric types, and between text and enum labels.
    ///
    pub fn coerce(self, field_type: FieldType, allowed: &[String]) -> Option<FieldValue> {
        use FieldValue::*;
        match (field_type, self) {
            (FieldType::Text, Text(v)) | (FieldType::Text, Enum(v)) => Some(Text(v)),
            (FieldType::Enum, Text(v)) | (FieldType::Enum, Enum(v)) => {
                FieldValue::parse(FieldType::Enum, &v, allowed)
            }
            (FieldType::Int, Int(v)) => Some(Int(v)),
            (FieldType::Int, Long(v)) => i32::try_from(v).ok().map(Int),
            (FieldType::Long, Int(v)) => Some(Long(v as i64)),
            (FieldType::Long, Long(v)) => Some(Long(v)),
            (FieldType::Double, Int(v)) => Some(Double(v as f64)),
            (FieldType::Double, Long(v)) => Some(Double(v as f64)),
            (FieldType::Double, Double(v)) => Some(Double(v)),
            (FieldType::Bool, Bool(v)) => Some(Bool(v)),
            (FieldType::Timestamp, Timestamp(v)) => Some(Timestamp(v)),
            (field_type, Text(v)) => FieldValue::parse(field_type, &v, allowed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) | FieldValue::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Long(v) => Some(*v as f64),
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v as i64),
            FieldValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ts| ts.and_utc())
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(v) | FieldValue::Enum(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Long(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(v) | FieldValue::Enum(v) => serializer.serialize_str(v),
            FieldValue::Int(v) => serializer.serialize_i32(*v),
            FieldValue::Long(v) => serializer.serialize_i64(*v),
            FieldValue::Double(v) => serializer.serialize_f64(*v),
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
            FieldValue::Timestamp(v) => serializer.serialize_str(&v.to_rfc3339()),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[rstest]
    #[case(FieldType::Int, "42", Some(FieldValue::Int(42)))]
    #[case(FieldType::Int, "4.2", None)]
    #[case(FieldType::Long, "123456789012", Some(FieldValue::Long(123456789012)))]
    #[case(FieldType::Double, "0.25", Some(FieldValue::Double(0.25)))]
    #[case(FieldType::Double, ".", None)]
    #[case(FieldType::Bool, "TRUE", Some(FieldValue::Bool(true)))]
    #[case(FieldType::Bool, "yes", Some(FieldValue::Bool(false)))]
    #[case(FieldType::Text, "", None)]
    #[case(FieldType::Text, "PASS", Some(FieldValue::Text("PASS".to_string())))]
    fn test_parse(
        #[case] field_type: FieldType,
        #[case] raw: &str,
        #[case] expected: Option<FieldValue>,
    ) {
        assert_eq!(FieldValue::parse(field_type, raw, &[]), expected);
    }

    #[rstest]
    fn test_parse_enum_requires_exact_label() {
        let allowed = labels(&["DAMAGING", "TOLERATED"]);
        assert_eq!(
            FieldValue::parse(FieldType::Enum, "DAMAGING", &allowed),
            Some(FieldValue::Enum("DAMAGING".to_string()))
        );
        assert_eq!(FieldValue::parse(FieldType::Enum, "damaging", &allowed), None);
        assert_eq!(
            FieldValue::parse(FieldType::Enum, "anything", &[]),
            Some(FieldValue::Enum("anything".to_string()))
        );
    }

    #[rstest]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            FieldValue::parse(FieldType::Timestamp, "2024-03-01 12:30:00", &[]),
            Some(FieldValue::Timestamp(expected))
        );
        assert_eq!(
            FieldValue::parse(FieldType::Timestamp, "2024-03-01T12:30:00Z", &[]),
            Some(FieldValue::Timestamp(expected))
        );
        assert_eq!(FieldValue::parse(FieldType::Timestamp, "yesterday", &[]), None);
    }

    #[rstest]
    fn test_coerce_numeric() {
        assert_eq!(
            FieldValue::Int(3).coerce(FieldType::Long, &[]),
            Some(FieldValue::Long(3))
        );
        assert_eq!(
            FieldValue::Long(7).coerce(FieldType::Double, &[]),
            Some(FieldValue::Double(7.0))
        );
        assert_eq!(FieldValue::Long(i64::MAX).coerce(FieldType::Int, &[]), None);
        assert_eq!(
            FieldValue::Text("12".to_string()).coerce(FieldType::Int, &[]),
            Some(FieldValue::Int(12))
        );
        assert_eq!(FieldValue::Double(1.5).coerce(FieldType::Int, &[]), None);
    }

    #[rstest]
    fn test_serialize_and_display() {
        let values = vec![
            FieldValue::Text("a".to_string()),
            FieldValue::Int(1),
            FieldValue::Double(0.5),
            FieldValue::Bool(false),
        ];
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"["a",1,0.5,false]"#);
        assert_eq!(FieldValue::Double(20.0).to_string(), "20");
        assert_eq!(FieldValue::Enum("HIGH".to_string()).to_string(), "HIGH");
    }
}
