use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Number, Value};

use crate::instance::ModelRef;

/// A live value held in an instance field.
///
/// Absence is never a variant: fields hold `Option<FieldValue>`.
#[derive(Clone, Debug)]
pub enum FieldValue {
    Bool(bool),
    Number(Number),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Structured value produced by a custom scalar type.
    Json(Value),
    Model(ModelRef),
}

impl FieldValue {
    /// Build a number value; `None` for NaN and infinities.
    pub fn from_f64(v: f64) -> Option<Self> {
        Number::from_f64(v).map(Self::Number)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::DateTime(dt) => Some(dt.date_naive()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelRef> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Json(_) => "json",
            Self::Model(_) => "model",
        }
    }
}

/// Model values compare by identity, everything else by value.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Model(a), Self::Model(b)) => ModelRef::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Number(v.into())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Number(v.into())
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<ModelRef> for FieldValue {
    fn from(v: ModelRef) -> Self {
        Self::Model(v)
    }
}

/// Short name of a JSON value's kind, for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        assert_eq!(FieldValue::from("x").as_str(), Some("x"));
        assert_eq!(FieldValue::from(3i64).as_i64(), Some(3));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::from("x").as_bool(), None);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(FieldValue::from_f64(f64::NAN).is_none());
        assert_eq!(FieldValue::from_f64(1.5).unwrap().as_f64(), Some(1.5));
    }

    #[test]
    fn datetime_projects_to_date() {
        let dt = DateTime::parse_from_rfc3339("2024-05-06T07:08:09Z")
            .unwrap()
            .with_timezone(&Utc);
        let date = FieldValue::from(dt).as_date().unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
    }

    #[test]
    fn different_variants_are_unequal() {
        assert_ne!(FieldValue::from("1"), FieldValue::from(1i64));
    }
}
