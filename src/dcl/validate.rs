//! Desired-state validation, run before any network call

use super::schema::{FieldSchema, FieldType, ResourceSchema};
use super::value::{Fields, Resource, Value};
use crate::error::{DclError, Result};
use std::collections::BTreeMap;

/// Check required fields, oneof exclusivity, value types and enum values
pub fn validate(schema: &ResourceSchema, desired: &Resource) -> Result<()> {
    if desired.kind() != schema.kind {
        return Err(DclError::validation(
            "kind",
            format!("expected {}, got {}", schema.kind, desired.kind()),
        ));
    }
    for key in &schema.identity {
        if desired.get(key).map(Value::is_empty).unwrap_or(true) {
            return Err(DclError::validation(key.as_str(), "identity field is required"));
        }
    }
    validate_fields(&schema.fields, desired.fields(), "")
}

fn validate_fields(fields: &[FieldSchema], values: &Fields, prefix: &str) -> Result<()> {
    for key in values.keys() {
        if !fields.iter().any(|f| &f.name == key) {
            return Err(DclError::validation(path(prefix, key), "unknown field"));
        }
    }

    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for field in fields {
        let value = values.get(&field.name);
        let field_path = path(prefix, &field.name);
        let set = value.map(|v| !v.is_empty()).unwrap_or(false);

        if field.required && !set {
            return Err(DclError::validation(field_path, "required field is missing"));
        }
        if let Some(group) = &field.oneof {
            if set {
                groups.entry(group.as_str()).or_default().push(field.name.as_str());
            }
        }
        if let Some(value) = value {
            validate_value(&field.ty, value, &field_path)?;
        }
    }

    for (group, members) in groups {
        if members.len() > 1 {
            return Err(DclError::validation(
                path(prefix, members[1]),
                format!(
                    "only one of {} may be set (oneof group `{}`)",
                    members.join(", "),
                    group
                ),
            ));
        }
    }
    Ok(())
}

fn validate_value(ty: &FieldType, value: &Value, field_path: &str) -> Result<()> {
    let mismatch = || {
        DclError::validation(
            field_path,
            format!("expected {}, got {}", ty.name(), value.type_name()),
        )
    };
    match (ty, value) {
        (FieldType::String | FieldType::SelfLink, Value::String(_)) => Ok(()),
        (FieldType::Enum { values }, Value::String(s)) => {
            if values.is_empty() || s.is_empty() || values.iter().any(|v| v == s) {
                Ok(())
            } else {
                Err(DclError::validation(
                    field_path,
                    format!("`{}` is not one of {}", s, values.join(", ")),
                ))
            }
        }
        (FieldType::Integer, Value::Integer(_)) => Ok(()),
        (FieldType::Double, Value::Double(_) | Value::Integer(_)) => Ok(()),
        (FieldType::Boolean, Value::Bool(_)) => Ok(()),
        (FieldType::Object { .. }, Value::Empty) => Ok(()),
        (FieldType::Object { fields }, Value::Object(nested)) => {
            validate_fields(fields, nested, field_path)
        }
        (FieldType::List { items, .. }, Value::List(elems)) => {
            for (i, elem) in elems.iter().enumerate() {
                validate_value(items, elem, &format!("{}[{}]", field_path, i))?;
            }
            Ok(())
        }
        _ => Err(mismatch()),
    }
}

fn path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
