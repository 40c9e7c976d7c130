//! Canonicalization
//!
//! Two passes with different purposes:
//!
//! - [`canonicalize_desired`] merges the caller's desired state with the
//!   observed state so that representational differences (self-link forms,
//!   set ordering, omitted fields) never show up as diffs.
//! - [`canonicalize_new_state`] normalizes a server snapshot against the
//!   desired state for display and post-apply verification.
//!
//! Both are idempotent.

use super::compare::{match_set, values_equal};
use super::schema::{FieldSchema, FieldType, ResourceSchema};
use super::value::{Fields, Resource, Value};
use std::collections::{BTreeMap, HashMap};

/// Merge raw desired state with the initial state observed on the server
pub fn canonicalize_desired(
    schema: &ResourceSchema,
    raw_desired: &Resource,
    initial: Option<&Resource>,
) -> Resource {
    let fields = desired_fields(
        &schema.fields,
        raw_desired.fields(),
        initial.map(Resource::fields),
    );
    Resource::from_fields(&schema.kind, fields)
}

/// Normalize a server snapshot against the raw desired state
pub fn canonicalize_new_state(
    schema: &ResourceSchema,
    raw_new: &Resource,
    raw_desired: &Resource,
) -> Resource {
    let mut fields = new_fields(&schema.fields, raw_new.fields(), raw_desired.fields());

    // Path parameters come from the request, never from the response
    for field in schema.fields.iter().filter(|f| f.url_param) {
        if let Some(value) = raw_desired.get(&field.name) {
            fields.insert(field.name.clone(), value.clone());
        }
    }
    Resource::from_fields(&schema.kind, fields)
}

/// Desired values that express no opinion. The empty-object marker is an
/// opinion ("clear it") and is not included.
fn no_opinion(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::Empty) => false,
        Some(v) => v.is_empty(),
    }
}

fn desired_fields(fields: &[FieldSchema], raw: &Fields, initial: Option<&Fields>) -> Fields {
    let mut out = Fields::new();

    for field in fields {
        let desired = raw.get(&field.name);
        let observed = initial.and_then(|i| i.get(&field.name));
        if let Some(value) = desired_value(field, desired, observed) {
            out.insert(field.name.clone(), value);
        }
    }

    // Keys outside the schema pass through untouched
    for (key, value) in raw {
        if !fields.iter().any(|f| &f.name == key) {
            out.insert(key.clone(), value.clone());
        }
    }

    collapse_oneofs(fields, raw, &mut out);
    out
}

fn desired_value(field: &FieldSchema, desired: Option<&Value>, initial: Option<&Value>) -> Option<Value> {
    if no_opinion(desired) {
        return match initial {
            Some(i) => Some(i.clone()),
            None => field.static_default().or_else(|| desired.cloned()),
        };
    }
    let desired = desired?;
    match initial {
        _ if *desired == Value::Empty => Some(Value::Empty),
        None => Some(desired_alone(&field.ty, desired)),
        Some(initial) => Some(merge(&field.ty, desired, initial)),
    }
}

/// Canonical form of a desired value with nothing to merge against
fn desired_alone(ty: &FieldType, desired: &Value) -> Value {
    match (ty, desired) {
        (FieldType::Object { fields }, Value::Object(d)) => {
            Value::Object(desired_fields(fields, d, None))
        }
        (FieldType::List { items, .. }, Value::List(d)) => {
            Value::List(d.iter().map(|v| desired_alone(items, v)).collect())
        }
        _ => desired.clone(),
    }
}

fn merge(ty: &FieldType, desired: &Value, initial: &Value) -> Value {
    match (ty, desired, initial) {
        (FieldType::Object { fields }, Value::Object(d), Value::Object(i)) => {
            Value::Object(desired_fields(fields, d, Some(i)))
        }
        (FieldType::List { items, set }, Value::List(d), Value::List(i))
            if matches!(items.as_ref(), FieldType::Object { .. }) =>
        {
            if *set {
                let matched = match_set(items, d, i);
                Value::List(
                    d.iter()
                        .enumerate()
                        .map(|(idx, elem)| match matched.actual_for(idx) {
                            Some(j) => merge(items, elem, &i[j]),
                            None => desired_alone(items, elem),
                        })
                        .collect(),
                )
            } else if d.len() == i.len() {
                Value::List(d.iter().zip(i).map(|(p, q)| merge(items, p, q)).collect())
            } else {
                desired_alone(ty, desired)
            }
        }
        _ if values_equal(ty, desired, initial) => initial.clone(),
        _ => desired_alone(ty, desired),
    }
}

/// At most one member of a oneof group survives the merge: the one set in
/// the raw desired input. Ties within raw desired go to schema order, and
/// so does a group that raw desired leaves entirely unset.
fn collapse_oneofs(fields: &[FieldSchema], raw: &Fields, out: &mut Fields) {
    let mut groups: BTreeMap<&str, Vec<&FieldSchema>> = BTreeMap::new();
    for field in fields {
        if let Some(group) = &field.oneof {
            groups.entry(group.as_str()).or_default().push(field);
        }
    }

    for members in groups.values() {
        let set_after_merge = members
            .iter()
            .filter(|f| !no_opinion(out.get(&f.name)))
            .count();
        if set_after_merge <= 1 {
            continue;
        }
        let Some(keep) = members
            .iter()
            .find(|f| !no_opinion(raw.get(&f.name)))
            .or_else(|| members.iter().find(|f| !no_opinion(out.get(&f.name))))
        else {
            continue;
        };
        for member in members.iter().filter(|f| f.name != keep.name) {
            out.remove(&member.name);
        }
    }
}

fn new_fields(fields: &[FieldSchema], server: &Fields, desired: &Fields) -> Fields {
    let mut out = server.clone();
    for field in fields {
        match (server.get(&field.name), desired.get(&field.name)) {
            (Some(s), Some(d)) => {
                out.insert(field.name.clone(), new_value(&field.ty, s, d));
            }
            (None, Some(Value::Empty)) => {
                out.insert(field.name.clone(), Value::Empty);
            }
            _ => {}
        }
    }
    out
}

fn new_value(ty: &FieldType, server: &Value, desired: &Value) -> Value {
    match (ty, server, desired) {
        (FieldType::Object { fields }, Value::Object(s), Value::Object(d)) => {
            Value::Object(new_fields(fields, s, d))
        }
        (FieldType::List { items, set }, Value::List(s), Value::List(d))
            if matches!(items.as_ref(), FieldType::Object { .. }) =>
        {
            if *set {
                let matched = match_set(items, d, s);
                let by_actual: HashMap<usize, usize> =
                    matched.pairs.iter().map(|(di, si)| (*si, *di)).collect();
                Value::List(
                    s.iter()
                        .enumerate()
                        .map(|(si, elem)| match by_actual.get(&si) {
                            Some(di) => new_value(items, elem, &d[*di]),
                            None => elem.clone(),
                        })
                        .collect(),
                )
            } else if s.len() == d.len() {
                Value::List(s.iter().zip(d).map(|(p, q)| new_value(items, p, q)).collect())
            } else {
                server.clone()
            }
        }
        _ if values_equal(ty, desired, server) => desired.clone(),
        _ => server.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcl::schema::UpdateOperation;
    use serde_json::json;

    fn route_schema() -> ResourceSchema {
        ResourceSchema {
            kind: "Route".to_string(),
            identity: vec!["project".to_string(), "name".to_string()],
            parent: vec!["project".to_string()],
            fields: vec![
                FieldSchema::new("project", FieldType::String).url_param(),
                FieldSchema::new("name", FieldType::String).immutable(),
                FieldSchema::new("network", FieldType::SelfLink).immutable(),
                FieldSchema::new("priority", FieldType::Integer)
                    .immutable()
                    .default_value(json!(1000)),
                FieldSchema::new("nextHopIp", FieldType::String).oneof("next_hop"),
                FieldSchema::new("nextHopInstance", FieldType::SelfLink).oneof("next_hop"),
                FieldSchema::new("description", FieldType::String).update(UpdateOperation::Patch),
                FieldSchema::new("id", FieldType::String).output_only(),
            ],
        }
    }

    #[test]
    fn test_self_link_adopts_initial_form() {
        let schema = route_schema();
        let desired = Resource::new("Route").with("network", "projects/p/global/networks/n");
        let initial = Resource::new("Route").with(
            "network",
            "https://www.googleapis.com/compute/v1/projects/p/global/networks/n",
        );
        let c = canonicalize_desired(&schema, &desired, Some(&initial));
        assert_eq!(c.get("network"), initial.get("network"));
    }

    #[test]
    fn test_static_default_only_when_both_absent() {
        let schema = route_schema();
        let desired = Resource::new("Route").with("name", "r1");
        let c = canonicalize_desired(&schema, &desired, None);
        assert_eq!(c.get("priority"), Some(&Value::Integer(1000)));

        let initial = Resource::new("Route").with("priority", 500);
        let c = canonicalize_desired(&schema, &desired, Some(&initial));
        assert_eq!(c.get("priority"), Some(&Value::Integer(500)));
    }

    #[test]
    fn test_oneof_raw_desired_wins() {
        let schema = route_schema();
        let desired = Resource::new("Route").with("nextHopIp", "1.2.3.4");
        let initial = Resource::new("Route").with("nextHopInstance", "i1");

        let once = canonicalize_desired(&schema, &desired, Some(&initial));
        assert_eq!(once.get_str("nextHopIp"), Some("1.2.3.4"));
        assert!(once.get("nextHopInstance").is_none());

        let twice = canonicalize_desired(&schema, &once, Some(&initial));
        assert_eq!(twice, once);
    }

    #[test]
    fn test_oneof_collapses_when_raw_names_no_member() {
        let schema = route_schema();
        let desired = Resource::new("Route").with("project", "p").with("name", "r1");
        let initial = Resource::new("Route")
            .with("nextHopIp", "10.0.0.1")
            .with("nextHopInstance", "i1");

        let once = canonicalize_desired(&schema, &desired, Some(&initial));
        assert_eq!(once.get_str("nextHopIp"), Some("10.0.0.1"));
        assert!(once.get("nextHopInstance").is_none());

        let twice = canonicalize_desired(&schema, &once, Some(&initial));
        assert_eq!(twice, once);
    }

    #[test]
    fn test_empty_marker_is_kept() {
        let schema = ResourceSchema {
            kind: "X".to_string(),
            identity: vec![],
            parent: vec![],
            fields: vec![FieldSchema::new(
                "match",
                FieldType::object(vec![FieldSchema::new("a", FieldType::String)]),
            )],
        };
        let mut nested = Fields::new();
        nested.insert("a".to_string(), Value::from("x"));
        let desired = Resource::new("X").with("match", Value::Empty);
        let initial = Resource::new("X").with("match", Value::Object(nested));
        let c = canonicalize_desired(&schema, &desired, Some(&initial));
        assert_eq!(c.get("match"), Some(&Value::Empty));
    }

    #[test]
    fn test_new_state_takes_url_params_from_desired() {
        let schema = route_schema();
        let server = Resource::new("Route")
            .with("name", "r1")
            .with("id", "42")
            .with("network", "https://www.googleapis.com/compute/v1/projects/p/global/networks/n");
        let desired = Resource::new("Route")
            .with("project", "p")
            .with("name", "r1")
            .with("network", "projects/p/global/networks/n");
        let n = canonicalize_new_state(&schema, &server, &desired);
        assert_eq!(n.get_str("project"), Some("p"));
        assert_eq!(n.get_str("network"), Some("projects/p/global/networks/n"));
        assert_eq!(n.get_str("id"), Some("42"));
        assert_eq!(canonicalize_new_state(&schema, &n, &desired), n);
    }
}
