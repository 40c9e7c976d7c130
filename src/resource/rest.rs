//! REST collaborator
//!
//! [`RestApi`] implements [`ResourceApi`] for any kind in the registry by
//! expanding its endpoint templates, encoding request bodies from the
//! schema and waiting on the returned Compute Engine operations.

use super::registry::{get_resource, ResourceDef};
use super::template::{expand, with_query};
use crate::dcl::{FieldDiff, FieldSchema, Page, Resource, ResourceApi, ResourceSchema, UpdateOperation};
use crate::error::{DclError, Result};
use crate::gcp::client::GcpClient;
use crate::gcp::operations::{is_operation, wait_for_operation};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

pub struct RestApi {
    client: GcpClient,
    operation_poll: Duration,
}

impl RestApi {
    pub fn new(client: GcpClient, operation_poll: Duration) -> Self {
        Self {
            client,
            operation_poll,
        }
    }

    fn definition(schema: &ResourceSchema) -> Result<&'static ResourceDef> {
        get_resource(&schema.kind).ok_or_else(|| DclError::UnknownKind(schema.kind.clone()))
    }

    /// Send a mutating call and wait for its operation. Returns the resource
    /// only when the server answered with one directly.
    async fn mutate(
        &self,
        schema: &ResourceSchema,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Resource>> {
        let url = with_query(
            &self.client.compute_url(path),
            "requestId",
            &uuid::Uuid::new_v4().to_string(),
        );
        let response = self.client.send(method, &url, body).await?;

        if is_operation(&response) {
            wait_for_operation(&self.client, response, self.operation_poll).await?;
            return Ok(None);
        }
        if response.is_null() {
            return Ok(None);
        }
        Ok(Some(schema.decode(&response)))
    }
}

/// Body fields for a create call
fn create_field(field: &FieldSchema) -> bool {
    !field.is_output_only() && !field.url_param
}

/// Top-level field names touched by `diffs`
fn touched_fields(diffs: &[FieldDiff]) -> HashSet<&str> {
    diffs
        .iter()
        .map(|d| {
            let end = d.path.find(['.', '[']).unwrap_or(d.path.len());
            &d.path[..end]
        })
        .collect()
}

/// Rule lookups answer 400 for a priority that holds no rule
fn missing_as_not_found(err: DclError, codes: &[u16]) -> DclError {
    match err {
        DclError::Http { status, message } if codes.contains(&status) => {
            tracing::debug!("Treating HTTP {} as not found: {}", status, message);
            DclError::NotFound(message)
        }
        other => other,
    }
}

/// Navigate a dot path into a response
fn extract_items<'a>(response: &'a Value, path: &str) -> &'a [Value] {
    let mut current = response;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = match current.get(part) {
            Some(v) => v,
            None => return &[],
        };
    }
    current.as_array().map(|a| a.as_slice()).unwrap_or(&[])
}

#[async_trait]
impl ResourceApi for RestApi {
    async fn get(&self, schema: &ResourceSchema, identity: &Resource) -> Result<Resource> {
        let def = Self::definition(schema)?;
        let path = expand(&def.endpoints.get.path, identity)?;
        let url = self.client.compute_url(&path);
        let response = self
            .client
            .send(def.endpoints.get.method.as_reqwest(), &url, None)
            .await
            .map_err(|e| missing_as_not_found(e, &def.endpoints.get.not_found_codes))?;
        if !response.is_object() {
            return Err(DclError::MalformedResponse(format!("{}: expected an object", url)));
        }
        Ok(schema.decode(&response))
    }

    async fn create(&self, schema: &ResourceSchema, desired: &Resource) -> Result<Option<Resource>> {
        let def = Self::definition(schema)?;
        let endpoint = &def.endpoints.create;
        let path = expand(&endpoint.path, desired)?;
        let body = schema.encode(desired, create_field);
        tracing::info!("Creating {}", schema.describe(desired));
        self.mutate(schema, endpoint.method.as_reqwest(), &path, Some(&body))
            .await
    }

    async fn patch(
        &self,
        schema: &ResourceSchema,
        operation: UpdateOperation,
        desired: &Resource,
        diffs: &[FieldDiff],
    ) -> Result<Option<Resource>> {
        let def = Self::definition(schema)?;
        let Some(endpoint) = def.endpoints.update.get(&operation) else {
            return Err(DclError::infeasible(
                schema.describe(desired),
                format!("no endpoint for update operation {}", operation),
            ));
        };
        let path = expand(&endpoint.path, desired)?;

        let touched = touched_fields(diffs);
        let body = schema.encode(desired, |field| {
            if !create_field(field) {
                return false;
            }
            schema.identity.contains(&field.name)
                || field.update == Some(operation)
                || touched.contains(field.name.as_str())
        });

        tracing::info!("Updating {} via {}", schema.describe(desired), operation);
        self.mutate(schema, endpoint.method.as_reqwest(), &path, Some(&body))
            .await
    }

    async fn delete(&self, schema: &ResourceSchema, identity: &Resource) -> Result<()> {
        let def = Self::definition(schema)?;
        let endpoint = &def.endpoints.delete;
        let path = expand(&endpoint.path, identity)?;
        tracing::info!("Deleting {}", schema.describe(identity));
        self.mutate(schema, endpoint.method.as_reqwest(), &path, None)
            .await?;
        Ok(())
    }

    async fn list(
        &self,
        schema: &ResourceSchema,
        parent: &Resource,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page> {
        let def = Self::definition(schema)?;
        let endpoint = &def.endpoints.list;
        let mut url = self.client.compute_url(&expand(&endpoint.path, parent)?);
        if endpoint.paged {
            url = with_query(&url, "maxResults", &page_size.to_string());
            if let Some(token) = page_token {
                url = with_query(&url, "pageToken", token);
            }
        }

        let response = self
            .client
            .send(endpoint.method.as_reqwest(), &url, None)
            .await?;

        let items = extract_items(&response, &endpoint.items)
            .iter()
            .map(|item| schema.decode(item))
            .collect();
        let next_page_token = if endpoint.paged {
            response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        } else {
            None
        };

        Ok(Page {
            items,
            next_page_token,
        })
    }
}
