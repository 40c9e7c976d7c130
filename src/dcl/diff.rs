//! Differ
//!
//! Walks canonical desired and canonical actual state in schema order and
//! reports every field-level discrepancy, tagged with the operation that
//! would remedy it. Pure: no I/O, inputs are never mutated.

use super::compare::{compare, match_set, selector_for, OperationSelector};
use super::schema::{FieldSchema, FieldType, ResourceSchema};
use super::value::{Fields, Resource, Value};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    /// Dotted path, with `[i]` for positional list elements
    pub path: String,
    pub desired: Option<Value>,
    pub actual: Option<Value>,
    pub selector: OperationSelector,
}

impl FieldDiff {
    pub fn is_actionable(&self) -> bool {
        self.selector != OperationSelector::Ignore
    }
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| match v {
            Some(v) => v.to_string(),
            None => "<unset>".to_string(),
        };
        write!(
            f,
            "{}: desired {}, actual {} ({})",
            self.path,
            show(&self.desired),
            show(&self.actual),
            self.selector
        )
    }
}

/// Diff two canonical snapshots of the same resource
pub fn diff(schema: &ResourceSchema, desired: &Resource, actual: &Resource) -> Vec<FieldDiff> {
    let mut out = Vec::new();
    diff_fields(
        &schema.fields,
        desired.fields(),
        actual.fields(),
        "",
        OperationSelector::RequiresRecreate,
        &mut out,
    );
    out
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn diff_fields(
    fields: &[FieldSchema],
    desired: &Fields,
    actual: &Fields,
    prefix: &str,
    inherited: OperationSelector,
    out: &mut Vec<FieldDiff>,
) {
    for field in fields {
        diff_field(
            field,
            desired.get(&field.name),
            actual.get(&field.name),
            &join(prefix, &field.name),
            inherited,
            out,
        );
    }
}

fn diff_field(
    field: &FieldSchema,
    desired: Option<&Value>,
    actual: Option<&Value>,
    path: &str,
    inherited: OperationSelector,
    out: &mut Vec<FieldDiff>,
) {
    if !compare(desired, actual, field) {
        return;
    }
    let selector = selector_for(field, inherited);
    let before = out.len();

    match (&field.ty, desired, actual) {
        (FieldType::Object { fields }, Some(Value::Object(d)), Some(Value::Object(a))) => {
            diff_fields(fields, d, a, path, selector, out);
        }
        (FieldType::List { items, set }, Some(Value::List(d)), Some(Value::List(a))) => {
            if let FieldType::Object { fields } = items.as_ref() {
                if *set {
                    diff_object_set(items, d, a, path, selector, out);
                } else {
                    diff_object_list(fields, d, a, path, selector, out);
                }
            }
        }
        _ => {}
    }

    // Leaf values, or containers whose difference is not expressible per element
    if out.len() == before {
        out.push(FieldDiff {
            path: path.to_string(),
            desired: desired.cloned(),
            actual: actual.cloned(),
            selector,
        });
    }
}

fn diff_object_list(
    fields: &[FieldSchema],
    desired: &[Value],
    actual: &[Value],
    path: &str,
    selector: OperationSelector,
    out: &mut Vec<FieldDiff>,
) {
    for i in 0..desired.len().max(actual.len()) {
        let element_path = format!("{}[{}]", path, i);
        match (desired.get(i), actual.get(i)) {
            (Some(Value::Object(d)), Some(Value::Object(a))) => {
                diff_fields(fields, d, a, &element_path, selector, out);
            }
            (d, a) if d != a => out.push(FieldDiff {
                path: element_path,
                desired: d.cloned(),
                actual: a.cloned(),
                selector,
            }),
            _ => {}
        }
    }
}

/// Unmatched desired elements are additions, unmatched actual elements removals
fn diff_object_set(
    items: &FieldType,
    desired: &[Value],
    actual: &[Value],
    path: &str,
    selector: OperationSelector,
    out: &mut Vec<FieldDiff>,
) {
    let matched = match_set(items, desired, actual);
    for i in matched.unmatched_desired {
        out.push(FieldDiff {
            path: path.to_string(),
            desired: Some(desired[i].clone()),
            actual: None,
            selector,
        });
    }
    for j in matched.unmatched_actual {
        out.push(FieldDiff {
            path: path.to_string(),
            desired: None,
            actual: Some(actual[j].clone()),
            selector,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcl::schema::UpdateOperation;

    fn schema() -> ResourceSchema {
        let layer4 = FieldType::object(vec![
            FieldSchema::new("ipProtocol", FieldType::String),
            FieldSchema::new("ports", FieldType::set(FieldType::String)),
        ]);
        ResourceSchema {
            kind: "FirewallPolicyRule".to_string(),
            identity: vec!["priority".to_string()],
            parent: vec![],
            fields: vec![
                FieldSchema::new("priority", FieldType::Integer).immutable(),
                FieldSchema::new("description", FieldType::String)
                    .update(UpdateOperation::PatchRule),
                FieldSchema::new(
                    "match",
                    FieldType::object(vec![
                        FieldSchema::new("srcIpRanges", FieldType::set(FieldType::String)),
                        FieldSchema::new("layer4Configs", FieldType::set(layer4)),
                    ]),
                )
                .update(UpdateOperation::PatchRule),
                FieldSchema::new("kind", FieldType::String).output_only(),
            ],
        }
    }

    fn layer4(proto: &str) -> Value {
        let mut f = Fields::new();
        f.insert("ipProtocol".to_string(), Value::from(proto));
        Value::Object(f)
    }

    fn rule_match(ranges: Vec<&str>, l4: Vec<Value>) -> Value {
        let mut f = Fields::new();
        f.insert("srcIpRanges".to_string(), Value::from(ranges));
        f.insert("layer4Configs".to_string(), Value::List(l4));
        Value::Object(f)
    }

    #[test]
    fn test_identical_resources_have_no_diff() {
        let r = Resource::new("FirewallPolicyRule")
            .with("priority", 10)
            .with("match", rule_match(vec!["10.0.0.0/8"], vec![layer4("tcp")]));
        assert!(diff(&schema(), &r, &r).is_empty());
    }

    #[test]
    fn test_nested_diff_inherits_parent_operation() {
        let d = Resource::new("FirewallPolicyRule")
            .with("match", rule_match(vec!["10.0.0.0/8"], vec![layer4("tcp")]));
        let a = Resource::new("FirewallPolicyRule")
            .with("match", rule_match(vec!["10.0.0.0/8"], vec![layer4("udp"), layer4("tcp")]))
            .with("kind", "compute#firewallPolicyRule");
        let diffs = diff(&schema(), &d, &a);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "match.layer4Configs");
        assert_eq!(diffs[0].desired, None);
        assert_eq!(diffs[0].actual, Some(layer4("udp")));
        assert_eq!(
            diffs[0].selector,
            OperationSelector::Triggers(UpdateOperation::PatchRule)
        );
    }

    #[test]
    fn test_immutable_field_requires_recreate() {
        let d = Resource::new("FirewallPolicyRule").with("priority", 10);
        let a = Resource::new("FirewallPolicyRule").with("priority", 20);
        let diffs = diff(&schema(), &d, &a);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].selector, OperationSelector::RequiresRecreate);
        assert_eq!(diffs[0].to_string(), "priority: desired 10, actual 20 (requires recreate)");
    }

    #[test]
    fn test_empty_marker_clears_server_default_object() {
        let schema = crate::resource::get_resource("PacketMirroring")
            .expect("PacketMirroring is registered")
            .schema
            .clone();
        let mut filter = Fields::new();
        filter.insert("cidrRanges".to_string(), Value::from(vec!["10.0.0.0/8"]));
        filter.insert("direction".to_string(), Value::from("BOTH"));

        let d = Resource::new("PacketMirroring").with("filter", Value::Empty);
        let a = Resource::new("PacketMirroring").with("filter", Value::Object(filter));
        let diffs = diff(&schema, &d, &a);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "filter");
        assert_eq!(diffs[0].desired, Some(Value::Empty));
        assert_eq!(
            diffs[0].selector,
            OperationSelector::Triggers(UpdateOperation::Patch)
        );

        let untouched = Resource::new("PacketMirroring");
        assert!(diff(&schema, &untouched, &a).is_empty());
    }

    #[test]
    fn test_diff_is_deterministic() {
        let d = Resource::new("FirewallPolicyRule")
            .with("description", "new")
            .with("priority", 1);
        let a = Resource::new("FirewallPolicyRule")
            .with("description", "old")
            .with("priority", 2);
        let first = diff(&schema(), &d, &a);
        let second = diff(&schema(), &d, &a);
        assert_eq!(first, second);
        assert_eq!(first[0].path, "priority");
        assert_eq!(first[1].path, "description");
    }
}
