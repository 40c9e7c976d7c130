//! Per-type field schema
//!
//! The engine is driven entirely by this table: every comparison,
//! canonicalization rule and diff selector is read from the static
//! metadata of a field, never computed from values.

use super::value::{Fields, Resource, Value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::fmt;

/// Named partial-update operations. Closed set, resolved when the schema loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperation {
    /// Partial update of the resource itself
    Patch,
    /// Rule update addressed through the owning policy
    PatchRule,
}

impl UpdateOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::PatchRule => "patch_rule",
        }
    }
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    #[default]
    Mutable,
    /// Settable only at creation; any change forces recreation
    Immutable,
    /// Server assigned; never sent in requests
    OutputOnly,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// Reference to another resource; compared after self-link normalization
    SelfLink,
    Enum {
        #[serde(default)]
        values: Vec<String>,
    },
    Integer,
    Double,
    Boolean,
    Object {
        fields: Vec<FieldSchema>,
    },
    /// Array field; `set` arrays compare without regard to order
    List {
        items: Box<FieldType>,
        #[serde(default)]
        set: bool,
    },
}

impl FieldType {
    pub fn list(items: FieldType) -> Self {
        Self::List {
            items: Box::new(items),
            set: false,
        }
    }

    pub fn set(items: FieldType) -> Self {
        Self::List {
            items: Box::new(items),
            set: true,
        }
    }

    pub fn object(fields: Vec<FieldSchema>) -> Self {
        Self::Object { fields }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::SelfLink => "self_link",
            Self::Enum { .. } => "enum",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Object { .. } => "object",
            Self::List { set: true, .. } => "set",
            Self::List { .. } => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(flatten)]
    pub ty: FieldType,
    #[serde(default)]
    pub mutability: Mutability,
    /// Server fills the value when the request leaves it unset
    #[serde(default)]
    pub server_default: bool,
    /// Operation that applies a change of this field in place
    #[serde(default)]
    pub update: Option<UpdateOperation>,
    /// Mutually exclusive group id
    #[serde(default)]
    pub oneof: Option<String>,
    /// Static default used when neither desired nor initial state sets the field
    #[serde(default)]
    pub default: Option<Json>,
    #[serde(default)]
    pub required: bool,
    /// Request-scoped path parameter (project, location, parent); never read
    /// back from the server and never sent in a body
    #[serde(default)]
    pub url_param: bool,
}

impl FieldSchema {
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mutability: Mutability::Mutable,
            server_default: false,
            update: None,
            oneof: None,
            default: None,
            required: false,
            url_param: false,
        }
    }

    pub fn immutable(mut self) -> Self {
        self.mutability = Mutability::Immutable;
        self
    }

    pub fn output_only(mut self) -> Self {
        self.mutability = Mutability::OutputOnly;
        self
    }

    pub fn server_default(mut self) -> Self {
        self.server_default = true;
        self
    }

    pub fn update(mut self, op: UpdateOperation) -> Self {
        self.update = Some(op);
        self
    }

    pub fn oneof(mut self, group: &str) -> Self {
        self.oneof = Some(group.to_string());
        self
    }

    pub fn default_value(mut self, value: Json) -> Self {
        self.default = Some(value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn url_param(mut self) -> Self {
        self.url_param = true;
        self
    }

    pub fn is_output_only(&self) -> bool {
        self.mutability == Mutability::OutputOnly
    }

    /// Static default converted to the field's type
    pub fn static_default(&self) -> Option<Value> {
        self.default.as_ref().and_then(|d| decode_value(&self.ty, d))
    }
}

/// Declarative description of one resource type
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSchema {
    /// Filled from the registry key when loaded from JSON
    #[serde(default)]
    pub kind: String,
    /// Fields that identify one resource
    pub identity: Vec<String>,
    /// Fields that scope a list call
    #[serde(default)]
    pub parent: Vec<String>,
    pub fields: Vec<FieldSchema>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Human readable identity, e.g. `Route project=p name=r1`
    pub fn describe(&self, resource: &Resource) -> String {
        let mut out = self.kind.clone();
        for key in &self.identity {
            if let Some(value) = resource.get(key) {
                let shown = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.push_str(&format!(" {}={}", key, shown));
            }
        }
        out
    }

    /// Copy only the identity fields out of a resource
    pub fn identity_of(&self, resource: &Resource) -> Resource {
        let mut id = Resource::new(&self.kind);
        for key in self.identity.iter().chain(self.parent.iter()) {
            if let Some(value) = resource.get(key) {
                id.set(key, value.clone());
            }
        }
        id
    }

    /// Schema-aware conversion from wire JSON. Unknown keys are kept untyped.
    pub fn decode(&self, json: &Json) -> Resource {
        let Some(map) = json.as_object() else {
            return Resource::new(&self.kind);
        };
        Resource::from_fields(&self.kind, decode_object(&self.fields, map))
    }

    /// Wire JSON of the top-level fields accepted by `include`.
    ///
    /// Absent fields are never written, and output-only nested fields are
    /// dropped.
    pub fn encode(&self, resource: &Resource, include: impl Fn(&FieldSchema) -> bool) -> Json {
        let mut out = Map::new();
        for field in self.fields.iter().filter(|f| include(f)) {
            if let Some(value) = resource.get(&field.name) {
                out.insert(field.name.clone(), encode_value(&field.ty, value));
            }
        }
        Json::Object(out)
    }
}

fn decode_object(fields: &[FieldSchema], map: &Map<String, Json>) -> Fields {
    let mut out = Fields::new();
    for (key, raw) in map {
        let decoded = match fields.iter().find(|f| &f.name == key) {
            Some(field) => decode_value(&field.ty, raw),
            None => Value::from_json(raw),
        };
        if let Some(value) = decoded {
            out.insert(key.clone(), value);
        }
    }
    out
}

/// Convert a JSON value to the field's type, falling back to an untyped value
pub fn decode_value(ty: &FieldType, raw: &Json) -> Option<Value> {
    match (ty, raw) {
        (_, Json::Null) => None,
        (FieldType::String | FieldType::SelfLink | FieldType::Enum { .. }, Json::Number(n)) => {
            Some(Value::String(n.to_string()))
        }
        (FieldType::Integer, Json::String(s)) => match s.parse::<i64>() {
            Ok(i) => Some(Value::Integer(i)),
            Err(_) => Some(Value::String(s.clone())),
        },
        (FieldType::Double, Json::Number(n)) => n.as_f64().map(Value::Double),
        (FieldType::Object { fields }, Json::Object(map)) => {
            if map.is_empty() {
                Some(Value::Empty)
            } else {
                Some(Value::Object(decode_object(fields, map)))
            }
        }
        (FieldType::List { items, .. }, Json::Array(arr)) => Some(Value::List(
            arr.iter().filter_map(|v| decode_value(items, v)).collect(),
        )),
        _ => Value::from_json(raw),
    }
}

fn encode_value(ty: &FieldType, value: &Value) -> Json {
    match (ty, value) {
        (FieldType::Object { fields }, Value::Object(nested)) => {
            let mut out = Map::new();
            for field in fields.iter().filter(|f| !f.is_output_only()) {
                if let Some(v) = nested.get(&field.name) {
                    out.insert(field.name.clone(), encode_value(&field.ty, v));
                }
            }
            Json::Object(out)
        }
        (FieldType::List { items, .. }, Value::List(values)) => {
            Json::Array(values.iter().map(|v| encode_value(items, v)).collect())
        }
        _ => value.to_json(),
    }
}
