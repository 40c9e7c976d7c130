//! Operation planning
//!
//! Turns a diff list into the API operations that remedy it, after the
//! caller's lifecycle directives have had their say.

use super::compare::OperationSelector;
use super::diff::FieldDiff;
use super::schema::UpdateOperation;
use crate::error::{DclError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Actions an apply may be forbidden from taking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleDirective {
    /// Fail instead of creating a missing resource
    BlockCreation,
    /// Fail if the resource already exists
    BlockAcquire,
    /// Fail instead of changing an existing resource
    BlockModification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update {
        operation: UpdateOperation,
        diffs: Vec<FieldDiff>,
    },
}

impl Operation {
    pub fn name(&self) -> String {
        match self {
            Operation::Create => "create".to_string(),
            Operation::Update { operation, .. } => operation.to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => f.write_str("create"),
            Operation::Update { operation, diffs } => {
                let paths: Vec<&str> = diffs.iter().map(|d| d.path.as_str()).collect();
                write!(f, "{} [{}]", operation, paths.join(", "))
            }
        }
    }
}

/// Ordered operations for one apply: one create, N updates, or nothing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyPlan {
    pub operations: Vec<Operation>,
    /// Actionable diffs the plan was built from
    pub diffs: Vec<FieldDiff>,
}

impl ApplyPlan {
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Build the plan for `diffs`.
///
/// `subject` names the resource in lifecycle errors. Updates are grouped
/// per operation and ordered by operation kind, which is stable across runs.
pub fn plan(
    subject: &str,
    diffs: &[FieldDiff],
    exists: bool,
    lifecycle: &[LifecycleDirective],
) -> Result<ApplyPlan> {
    let diffs: Vec<FieldDiff> = diffs.iter().filter(|d| d.is_actionable()).cloned().collect();

    if !exists {
        if lifecycle.contains(&LifecycleDirective::BlockCreation) {
            return Err(DclError::infeasible(
                subject,
                "resource does not exist and creation is blocked",
            ));
        }
        return Ok(ApplyPlan {
            operations: vec![Operation::Create],
            diffs,
        });
    }

    if lifecycle.contains(&LifecycleDirective::BlockAcquire) {
        return Err(DclError::infeasible(
            subject,
            "resource already exists and acquiring it is blocked",
        ));
    }
    if let Some(recreate) = diffs
        .iter()
        .find(|d| d.selector == OperationSelector::RequiresRecreate)
    {
        return Err(DclError::infeasible(
            recreate.path.as_str(),
            format!("changing this field requires recreating the resource ({})", recreate),
        ));
    }
    if let Some(first) = diffs.first() {
        if lifecycle.contains(&LifecycleDirective::BlockModification) {
            return Err(DclError::infeasible(
                first.path.as_str(),
                format!("modification is blocked ({})", first),
            ));
        }
    }

    let mut groups: BTreeMap<UpdateOperation, Vec<FieldDiff>> = BTreeMap::new();
    for diff in &diffs {
        if let OperationSelector::Triggers(op) = diff.selector {
            groups.entry(op).or_default().push(diff.clone());
        }
    }

    Ok(ApplyPlan {
        operations: groups
            .into_iter()
            .map(|(operation, diffs)| Operation::Update { operation, diffs })
            .collect(),
        diffs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcl::value::Value;

    fn field_diff(path: &str, selector: OperationSelector) -> FieldDiff {
        FieldDiff {
            path: path.to_string(),
            desired: Some(Value::from("new")),
            actual: Some(Value::from("old")),
            selector,
        }
    }

    #[test]
    fn test_missing_resource_plans_single_create() {
        let p = plan("Route name=r1", &[], false, &[]).unwrap();
        assert_eq!(p.operations, vec![Operation::Create]);
    }

    #[test]
    fn test_updates_grouped_per_operation() {
        let diffs = vec![
            field_diff("description", OperationSelector::Triggers(UpdateOperation::Patch)),
            field_diff("match.srcIpRanges", OperationSelector::Triggers(UpdateOperation::PatchRule)),
            field_diff("labels", OperationSelector::Triggers(UpdateOperation::Patch)),
            field_diff("id", OperationSelector::Ignore),
        ];
        let p = plan("x", &diffs, true, &[]).unwrap();
        assert_eq!(p.operations.len(), 2);
        assert_eq!(p.diffs.len(), 3);
        match &p.operations[0] {
            Operation::Update { operation, diffs } => {
                assert_eq!(*operation, UpdateOperation::Patch);
                assert_eq!(diffs.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recreate_is_infeasible_for_existing() {
        let diffs = vec![
            field_diff("description", OperationSelector::Triggers(UpdateOperation::Patch)),
            field_diff("network", OperationSelector::RequiresRecreate),
        ];
        let err = plan("x", &diffs, true, &[]).unwrap_err();
        assert!(matches!(err, DclError::Infeasible { ref subject, .. } if subject == "network"));
    }

    #[test]
    fn test_lifecycle_directives() {
        let d = vec![field_diff("description", OperationSelector::Triggers(UpdateOperation::Patch))];
        assert!(plan("x", &[], false, &[LifecycleDirective::BlockCreation]).is_err());
        assert!(plan("x", &[], true, &[LifecycleDirective::BlockAcquire]).is_err());
        assert!(plan("x", &d, true, &[LifecycleDirective::BlockModification]).is_err());
        // Nothing to modify, nothing blocked
        let p = plan("x", &[], true, &[LifecycleDirective::BlockModification]).unwrap();
        assert!(p.is_noop());
    }
}
