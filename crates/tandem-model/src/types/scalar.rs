use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::context::Context;
use crate::error::{ModelError, ModelResult};
use crate::types::{Type, TypeKind};
use crate::value::{json_kind, FieldValue};

type ToSnapshot = Arc<dyn Fn(&FieldValue) -> ModelResult<Value> + Send + Sync>;
type FromSnapshot = Arc<dyn Fn(&Value) -> ModelResult<FieldValue> + Send + Sync>;

/// Leaf type defined by a pair of conversions.
///
/// Absence maps to absence in both directions: the conversions only ever
/// see present values.
#[derive(Clone)]
pub struct ScalarType {
    name: String,
    to_snapshot: ToSnapshot,
    from_snapshot: FromSnapshot,
}

impl ScalarType {
    pub fn new<S, D>(name: impl Into<String>, serialize: S, deserialize: D) -> Self
    where
        S: Fn(&FieldValue) -> ModelResult<Value> + Send + Sync + 'static,
        D: Fn(&Value) -> ModelResult<FieldValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            to_snapshot: Arc::new(serialize),
            from_snapshot: Arc::new(deserialize),
        }
    }

    /// Calendar date as `YYYY-MM-DD`. Accepts full ISO-8601 instants on input.
    pub fn date() -> Self {
        Self::new(
            "Date",
            |value| match value.as_date() {
                Some(d) => Ok(Value::String(d.format("%Y-%m-%d").to_string())),
                None => Err(mismatch("Date", "date", value.kind())),
            },
            |snapshot| {
                let text = expect_str("Date", snapshot)?;
                parse_date(text)
                    .map(FieldValue::Date)
                    .ok_or_else(|| invalid("Date", text, "not an ISO-8601 date"))
            },
        )
    }

    /// Instant as ISO-8601 UTC with milliseconds. A bare date on input reads
    /// as midnight UTC.
    pub fn datetime() -> Self {
        Self::new(
            "DateTime",
            |value| {
                let instant = match value {
                    FieldValue::DateTime(dt) => *dt,
                    FieldValue::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
                    other => return Err(mismatch("DateTime", "datetime", other.kind())),
                };
                Ok(Value::String(
                    instant.to_rfc3339_opts(SecondsFormat::Millis, true),
                ))
            },
            |snapshot| {
                let text = expect_str("DateTime", snapshot)?;
                parse_datetime(text)
                    .map(FieldValue::DateTime)
                    .ok_or_else(|| invalid("DateTime", text, "not an ISO-8601 instant"))
            },
        )
    }

    /// Snapshot form of an optional live value.
    pub fn to_snapshot(&self, value: Option<&FieldValue>) -> ModelResult<Option<Value>> {
        value.map(|v| (self.to_snapshot)(v)).transpose()
    }

    /// Live form of an optional snapshot value. JSON `null` counts as absent.
    pub fn from_snapshot(&self, snapshot: Option<&Value>) -> ModelResult<Option<FieldValue>> {
        match snapshot {
            None | Some(Value::Null) => Ok(None),
            Some(v) => (self.from_snapshot)(v).map(Some),
        }
    }
}

impl fmt::Debug for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarType").field("name", &self.name).finish()
    }
}

impl Type for ScalarType {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Scalar
    }

    fn serialize(&self, value: &FieldValue) -> ModelResult<Option<Value>> {
        self.to_snapshot(Some(value))
    }

    fn deserialize(
        &self,
        snapshot: &Value,
        _existing: Option<&FieldValue>,
        _context: &Context,
    ) -> ModelResult<Option<FieldValue>> {
        self.from_snapshot(Some(snapshot))
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date_naive()))
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        })
}

fn expect_str<'a>(type_name: &str, snapshot: &'a Value) -> ModelResult<&'a str> {
    snapshot
        .as_str()
        .ok_or_else(|| mismatch(type_name, "string", json_kind(snapshot)))
}

fn mismatch(type_name: &str, expected: &str, found: &str) -> ModelError {
    ModelError::TypeMismatch {
        type_name: type_name.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn invalid(type_name: &str, value: &str, reason: &str) -> ModelError {
    ModelError::InvalidScalar {
        type_name: type_name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
