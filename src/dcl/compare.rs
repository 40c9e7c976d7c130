//! Value comparison
//!
//! Decides whether a desired and an actual field value differ, using only
//! the field's static metadata.

use super::schema::{FieldSchema, FieldType, Mutability, UpdateOperation};
use super::value::Value;
use serde::Serialize;
use std::fmt;
use url::Url;

/// What a differing field asks the planner to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "operation")]
pub enum OperationSelector {
    RequiresRecreate,
    Triggers(UpdateOperation),
    /// Output-only drift with no actionable consequence
    Ignore,
}

impl fmt::Display for OperationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiresRecreate => f.write_str("requires recreate"),
            Self::Triggers(op) => write!(f, "triggers {}", op),
            Self::Ignore => f.write_str("ignored"),
        }
    }
}

/// Selector declared for a field. Nested fields without their own update
/// operation inherit the one of the enclosing field.
pub fn selector_for(field: &FieldSchema, inherited: OperationSelector) -> OperationSelector {
    match field.mutability {
        Mutability::OutputOnly => OperationSelector::Ignore,
        Mutability::Immutable => OperationSelector::RequiresRecreate,
        Mutability::Mutable => field
            .update
            .map(OperationSelector::Triggers)
            .unwrap_or(inherited),
    }
}

fn is_unset(value: Option<&Value>) -> bool {
    value.map(Value::is_empty).unwrap_or(true)
}

/// Whether `desired` and `actual` differ for `field`.
pub fn compare(desired: Option<&Value>, actual: Option<&Value>, field: &FieldSchema) -> bool {
    // The empty-object marker asks for exactly an empty value, so only
    // server-owned nested values may remain
    if let Some(Value::Empty) = desired {
        return match (&field.ty, actual) {
            (FieldType::Object { fields }, Some(Value::Object(a))) => fields
                .iter()
                .any(|f| compare(None, a.get(&f.name), f)),
            _ => !is_unset(actual),
        };
    }
    let desired_unset = is_unset(desired);
    if desired_unset && is_unset(actual) {
        return false;
    }
    // No opinion expressed on a server-owned value
    if desired_unset && (field.is_output_only() || field.server_default) {
        return false;
    }
    match (desired, actual) {
        (Some(d), Some(a)) => !values_equal(&field.ty, d, a),
        _ => true,
    }
}

/// Deep semantic equality of two present values
pub fn values_equal(ty: &FieldType, a: &Value, b: &Value) -> bool {
    if a.is_empty() || b.is_empty() {
        return a.is_empty() && b.is_empty();
    }
    match (ty, a, b) {
        (FieldType::SelfLink, Value::String(x), Value::String(y)) => self_links_equal(x, y),
        (FieldType::Integer | FieldType::Double, _, _) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (FieldType::Object { fields }, Value::Object(x), Value::Object(y)) => fields
            .iter()
            .all(|f| !compare(x.get(&f.name), y.get(&f.name), f)),
        (FieldType::List { items, set: false }, Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(items, p, q))
        }
        (FieldType::List { items, set: true }, Value::List(x), Value::List(y)) => {
            if x.len() != y.len() {
                return false;
            }
            let matched = match_set(items, x, y);
            matched.unmatched_desired.is_empty() && matched.unmatched_actual.is_empty()
        }
        _ => a == b,
    }
}

/// Pairing of set elements by zero-diff equality
#[derive(Debug, Default, PartialEq)]
pub struct SetMatch {
    /// (desired index, actual index)
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_desired: Vec<usize>,
    pub unmatched_actual: Vec<usize>,
}

impl SetMatch {
    pub fn actual_for(&self, desired_index: usize) -> Option<usize> {
        self.pairs
            .iter()
            .find(|(d, _)| *d == desired_index)
            .map(|(_, a)| *a)
    }
}

/// Match set elements structurally rather than by position.
///
/// Desired elements are visited in order and each takes the lowest-index
/// unclaimed actual element it equals. When two desired elements equal the
/// same actual element, the earlier one wins and the later one moves on to
/// the next candidate.
pub fn match_set(items: &FieldType, desired: &[Value], actual: &[Value]) -> SetMatch {
    let mut claimed = vec![false; actual.len()];
    let mut result = SetMatch::default();

    for (i, d) in desired.iter().enumerate() {
        let hit = (0..actual.len()).find(|&j| !claimed[j] && values_equal(items, d, &actual[j]));
        match hit {
            Some(j) => {
                claimed[j] = true;
                result.pairs.push((i, j));
            }
            None => result.unmatched_desired.push(i),
        }
    }

    result.unmatched_actual = claimed
        .iter()
        .enumerate()
        .filter(|(_, c)| !**c)
        .map(|(j, _)| j)
        .collect();
    result
}

/// Path segments where the short form of a resource reference begins
const SELF_LINK_ROOTS: &[&str] = &["projects", "locations", "organizations", "folders"];

/// Strip scheme, host and API version from a resource reference.
///
/// `https://www.googleapis.com/compute/v1/projects/p/global/networks/n`
/// becomes `projects/p/global/networks/n`.
pub fn normalize_self_link(link: &str) -> String {
    let path = match Url::parse(link) {
        Ok(url) => url.path().to_string(),
        Err(_) => link.to_string(),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let start = segments
        .iter()
        .position(|s| SELF_LINK_ROOTS.contains(s))
        .unwrap_or(0);
    segments[start..].join("/")
}

/// Equality of two resource references.
///
/// After normalization, a partial reference equals a longer one when it is a
/// whole-segment suffix of it, so a bare name matches its full self link.
/// A bare name carries no collection, so `n` equals both `.../networks/n`
/// and `.../subnetworks/n`. Once both sides name a collection, it must match.
pub fn self_links_equal(a: &str, b: &str) -> bool {
    let a = normalize_self_link(a);
    let b = normalize_self_link(b);
    if a == b {
        return true;
    }
    let (short, long) = if a.len() < b.len() { (&a, &b) } else { (&b, &a) };
    !short.is_empty() && long.ends_with(short.as_str()) && long[..long.len() - short.len()].ends_with('/')
}

/// Last segment of a resource reference
pub fn short_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcl::value::Fields;

    #[test]
    fn test_self_link_equivalence() {
        assert!(self_links_equal(
            "projects/p/global/networks/n",
            "https://www.googleapis.com/compute/v1/projects/p/global/networks/n"
        ));
        assert!(self_links_equal(
            "n",
            "https://compute.googleapis.com/compute/beta/projects/p/global/networks/n"
        ));
        assert!(!self_links_equal(
            "projects/p/global/networks/n",
            "projects/p/global/networks/other-n"
        ));
        assert!(!self_links_equal("networks/n", "projects/p/global/subnetworks/xnetworks/n2"));
    }

    #[test]
    fn test_collection_must_match_when_both_sides_name_one() {
        assert!(!self_links_equal(
            "networks/n",
            "projects/p/regions/r/subnetworks/n"
        ));
        assert!(!self_links_equal(
            "projects/p/global/networks/n",
            "projects/p/regions/r/subnetworks/n"
        ));
        // a bare name cannot tell collections apart
        assert!(self_links_equal("n", "projects/p/regions/r/subnetworks/n"));
        assert!(self_links_equal("n", "projects/p/global/networks/n"));
    }

    #[test]
    fn test_normalize_firewall_policy_link() {
        assert_eq!(
            normalize_self_link(
                "https://www.googleapis.com/compute/v1/locations/global/firewallPolicies/123"
            ),
            "locations/global/firewallPolicies/123"
        );
    }

    #[test]
    fn test_absent_and_empty_are_equal() {
        let field = FieldSchema::new("description", FieldType::String);
        assert!(!compare(None, Some(&Value::from("")), &field));
        assert!(!compare(Some(&Value::Empty), None, &field));
        assert!(compare(None, Some(&Value::from("x")), &field));
    }

    #[test]
    fn test_output_only_and_server_default_ignore_missing_desired() {
        let id = FieldSchema::new("id", FieldType::String).output_only();
        assert!(!compare(None, Some(&Value::from("42")), &id));

        let prio = FieldSchema::new("priority", FieldType::Integer).server_default();
        assert!(!compare(None, Some(&Value::Integer(1000)), &prio));
        assert!(compare(Some(&Value::Integer(10)), Some(&Value::Integer(1000)), &prio));
    }

    #[test]
    fn test_set_ignores_order_but_list_does_not() {
        let a = Value::from(vec!["x", "y"]);
        let b = Value::from(vec!["y", "x"]);
        let set = FieldSchema::new("tags", FieldType::set(FieldType::String));
        let list = FieldSchema::new("tags", FieldType::list(FieldType::String));
        assert!(!compare(Some(&a), Some(&b), &set));
        assert!(compare(Some(&a), Some(&b), &list));
    }

    #[test]
    fn test_empty_marker_differs_from_populated_object() {
        let field = FieldSchema::new(
            "match",
            FieldType::object(vec![FieldSchema::new("layer4", FieldType::String)]),
        );
        let mut populated = Fields::new();
        populated.insert("layer4".to_string(), Value::from("tcp"));
        assert!(compare(
            Some(&Value::Empty),
            Some(&Value::Object(populated)),
            &field
        ));
        assert!(!compare(Some(&Value::Empty), None, &field));
    }

    #[test]
    fn test_empty_marker_is_not_swallowed_by_server_default() {
        let field = FieldSchema::new(
            "filter",
            FieldType::object(vec![
                FieldSchema::new("cidrRanges", FieldType::set(FieldType::String)),
                FieldSchema::new("direction", FieldType::String).server_default(),
            ]),
        )
        .server_default();

        let mut ranges = Fields::new();
        ranges.insert("cidrRanges".to_string(), Value::from(vec!["10.0.0.0/8"]));
        assert!(compare(Some(&Value::Empty), Some(&Value::Object(ranges)), &field));

        let mut defaulted = Fields::new();
        defaulted.insert("direction".to_string(), Value::from("BOTH"));
        assert!(!compare(Some(&Value::Empty), Some(&Value::Object(defaulted)), &field));

        assert!(!compare(None, Some(&Value::Empty), &field));
    }

    #[test]
    fn test_match_set_tie_break_first_desired_wins() {
        let items = FieldType::String;
        let desired = vec![Value::from("a"), Value::from("a")];
        let actual = vec![Value::from("b"), Value::from("a")];
        let m = match_set(&items, &desired, &actual);
        assert_eq!(m.pairs, vec![(0, 1)]);
        assert_eq!(m.unmatched_desired, vec![1]);
        assert_eq!(m.unmatched_actual, vec![0]);
    }

    #[test]
    fn test_selector_inheritance() {
        let parent = OperationSelector::Triggers(UpdateOperation::PatchRule);
        let nested = FieldSchema::new("layer4", FieldType::String);
        assert_eq!(selector_for(&nested, parent), parent);
        assert_eq!(
            selector_for(&nested.clone().immutable(), parent),
            OperationSelector::RequiresRecreate
        );
        assert_eq!(
            selector_for(&nested.output_only(), parent),
            OperationSelector::Ignore
        );
    }
}
