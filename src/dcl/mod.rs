//! Declarative reconciliation engine
//!
//! One generic implementation of canonicalize / diff / plan / apply,
//! driven by a per-type [`ResourceSchema`] and a [`ResourceApi`]
//! collaborator.
//!
//! # Module Structure
//!
//! - [`value`] - Tri-state resource model
//! - [`schema`] - Field metadata table
//! - [`compare`] - Field value comparison and self-link normalization
//! - [`canonicalize`] - Desired-state and new-state canonicalization
//! - [`validate`] - Pre-network validation of desired state
//! - [`diff`] - Field-level diffing
//! - [`plan`] - Lifecycle checks and operation grouping
//! - [`apply`] - The [`Reconciler`]: apply, get, delete, delete-all
//! - [`list`] - Paged listing
//!
//! # Example
//!
//! ```ignore
//! use gdcl::dcl::{Reconciler, Resource};
//!
//! async fn example(reconciler: &Reconciler<impl gdcl::dcl::ResourceApi>) -> gdcl::error::Result<()> {
//!     let desired = Resource::new("Route")
//!         .with("project", "my-project")
//!         .with("name", "default-egress")
//!         .with("network", "projects/my-project/global/networks/default")
//!         .with("destRange", "0.0.0.0/0")
//!         .with("nextHopGateway", "default-internet-gateway");
//!     let state = reconciler.apply(&desired, &[]).await?;
//!     println!("{:?}", state.get("selfLink"));
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod apply;
pub mod canonicalize;
pub mod compare;
pub mod diff;
pub mod list;
pub mod plan;
pub mod schema;
pub mod validate;
pub mod value;

pub use api::{Page, ResourceApi};
pub use apply::Reconciler;
pub use compare::OperationSelector;
pub use diff::FieldDiff;
pub use list::ResourceList;
pub use plan::{ApplyPlan, LifecycleDirective, Operation};
pub use schema::{FieldSchema, FieldType, Mutability, ResourceSchema, UpdateOperation};
pub use value::{Fields, Resource, Value};
