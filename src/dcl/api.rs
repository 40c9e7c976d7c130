//! The per-type CRUD collaborator the engine drives

use super::diff::FieldDiff;
use super::schema::{ResourceSchema, UpdateOperation};
use super::value::Resource;
use crate::error::Result;
use async_trait::async_trait;

/// One page of a list call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Resource>,
    pub next_page_token: Option<String>,
}

/// Remote access to one resource type.
///
/// Mutating calls return only once the platform's long-running operation
/// has reached a terminal state. `get` signals absence with
/// [`DclError::NotFound`](crate::error::DclError::NotFound).
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn get(&self, schema: &ResourceSchema, identity: &Resource) -> Result<Resource>;

    /// Returns the created resource when the response carries it
    async fn create(&self, schema: &ResourceSchema, desired: &Resource) -> Result<Option<Resource>>;

    /// Apply the fields selected by `diffs` through `operation`
    async fn patch(
        &self,
        schema: &ResourceSchema,
        operation: UpdateOperation,
        desired: &Resource,
        diffs: &[FieldDiff],
    ) -> Result<Option<Resource>>;

    async fn delete(&self, schema: &ResourceSchema, identity: &Resource) -> Result<()>;

    async fn list(
        &self,
        schema: &ResourceSchema,
        parent: &Resource,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page>;
}
