use serde_json::Value;

use crate::context::Context;
use crate::error::{ModelError, ModelResult};
use crate::types::{Type, TypeKind};
use crate::value::{json_kind, FieldValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
}

impl PrimitiveKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Pass-through type for JSON-native leaves.
#[derive(Clone, Debug)]
pub struct PrimitiveType {
    name: String,
    primitive: PrimitiveKind,
}

impl PrimitiveType {
    pub fn new(name: impl Into<String>, primitive: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            primitive,
        }
    }

    pub fn primitive(&self) -> PrimitiveKind {
        self.primitive
    }

    fn mismatch(&self, found: &str) -> ModelError {
        ModelError::TypeMismatch {
            type_name: self.name.clone(),
            expected: self.primitive.as_str().to_string(),
            found: found.to_string(),
        }
    }
}

impl Type for PrimitiveType {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Primitive
    }

    fn serialize(&self, value: &FieldValue) -> ModelResult<Option<Value>> {
        match (self.primitive, value) {
            (PrimitiveKind::String, FieldValue::String(s)) => Ok(Some(Value::String(s.clone()))),
            (PrimitiveKind::Number, FieldValue::Number(n)) => Ok(Some(Value::Number(n.clone()))),
            (PrimitiveKind::Boolean, FieldValue::Bool(b)) => Ok(Some(Value::Bool(*b))),
            _ => Err(self.mismatch(value.kind())),
        }
    }

    fn deserialize(
        &self,
        snapshot: &Value,
        _existing: Option<&FieldValue>,
        _context: &Context,
    ) -> ModelResult<Option<FieldValue>> {
        match (self.primitive, snapshot) {
            (_, Value::Null) => Ok(None),
            (PrimitiveKind::String, Value::String(s)) => Ok(Some(FieldValue::String(s.clone()))),
            (PrimitiveKind::Number, Value::Number(n)) => Ok(Some(FieldValue::Number(n.clone()))),
            (PrimitiveKind::Boolean, Value::Bool(b)) => Ok(Some(FieldValue::Bool(*b))),
            _ => Err(self.mismatch(json_kind(snapshot))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string_type() -> PrimitiveType {
        PrimitiveType::new("StringType", PrimitiveKind::String)
    }

    #[test]
    fn passes_values_through() {
        let ty = string_type();
        let live = ty
            .deserialize(&json!("hello"), None, &Context::none())
            .unwrap()
            .unwrap();
        assert_eq!(live, FieldValue::from("hello"));
        assert_eq!(ty.serialize(&live).unwrap(), Some(json!("hello")));
    }

    #[test]
    fn overwrites_existing_value() {
        let ty = PrimitiveType::new("NumberType", PrimitiveKind::Number);
        let existing = FieldValue::from(1i64);
        let live = ty
            .deserialize(&json!(2), Some(&existing), &Context::none())
            .unwrap();
        assert_eq!(live, Some(FieldValue::from(2i64)));
    }

    #[test]
    fn null_is_absent() {
        let ty = string_type();
        assert_eq!(ty.deserialize(&Value::Null, None, &Context::none()).unwrap(), None);
    }

    #[test]
    fn wrong_json_kind_is_rejected() {
        let ty = PrimitiveType::new("BooleanType", PrimitiveKind::Boolean);
        let err = ty.deserialize(&json!("yes"), None, &Context::none()).unwrap_err();
        assert_eq!(
            err,
            ModelError::TypeMismatch {
                type_name: "BooleanType".into(),
                expected: "boolean".into(),
                found: "string".into(),
            }
        );
    }

    #[test]
    fn wrong_live_kind_is_rejected() {
        let ty = string_type();
        assert!(ty.serialize(&FieldValue::from(true)).is_err());
    }
}
