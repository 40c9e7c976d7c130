//! Apply orchestration
//!
//! [`Reconciler`] is the entry point callers use for one resource type.
//! An apply runs: validate, fetch, canonicalize, diff, plan, execute,
//! re-fetch, re-canonicalize, verify. The whole cycle restarts from the
//! fetch when any step fails with a 409 conflict, up to the configured
//! bound.

use super::api::{Page, ResourceApi};
use super::canonicalize::{canonicalize_desired, canonicalize_new_state};
use super::diff::diff;
use super::plan::{plan, ApplyPlan, LifecycleDirective, Operation};
use super::schema::ResourceSchema;
use super::validate::validate;
use super::value::Resource;
use crate::config::ReconcileSettings;
use crate::error::{DclError, Result};
use std::future::Future;
use std::time::Instant;

/// Generic reconciliation engine bound to one resource type.
///
/// Holds no per-call state: independent resources may be applied
/// concurrently through the same reconciler.
pub struct Reconciler<A> {
    api: A,
    schema: ResourceSchema,
    settings: ReconcileSettings,
}

/// Result of the read-only half of an apply
struct Prepared {
    initial: Option<Resource>,
    desired: Resource,
    plan: ApplyPlan,
}

impl<A: ResourceApi> Reconciler<A> {
    pub fn new(api: A, schema: ResourceSchema, settings: ReconcileSettings) -> Self {
        Self {
            api,
            schema,
            settings,
        }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Converge the remote resource toward `desired` and return the
    /// canonical state observed afterwards.
    pub async fn apply(
        &self,
        desired: &Resource,
        lifecycle: &[LifecycleDirective],
    ) -> Result<Resource> {
        validate(&self.schema, desired)?;

        let started = Instant::now();
        let mut retries = 0;
        loop {
            match self.apply_once(desired, lifecycle).await {
                Err(err) if err.is_conflict() && self.may_retry(retries, started) => {
                    retries += 1;
                    tracing::warn!(
                        "{}: conflict, restarting apply ({}/{}): {}",
                        self.schema.describe(desired),
                        retries,
                        self.settings.conflict_retries,
                        err
                    );
                    tokio::time::sleep(self.settings.conflict_backoff()).await;
                }
                result => return result,
            }
        }
    }

    /// Compute what `apply` would do without changing anything
    pub async fn plan(
        &self,
        desired: &Resource,
        lifecycle: &[LifecycleDirective],
    ) -> Result<ApplyPlan> {
        validate(&self.schema, desired)?;
        Ok(self.prepare(desired, lifecycle).await?.plan)
    }

    fn may_retry(&self, retries: u32, started: Instant) -> bool {
        if retries >= self.settings.conflict_retries {
            return false;
        }
        match self.settings.max_conflict_elapsed() {
            Some(ceiling) => started.elapsed() < ceiling,
            None => true,
        }
    }

    async fn prepare(
        &self,
        desired: &Resource,
        lifecycle: &[LifecycleDirective],
    ) -> Result<Prepared> {
        let subject = self.schema.describe(desired);

        let initial = match self.bounded("get", self.api.get(&self.schema, desired)).await {
            Ok(raw) => Some(canonicalize_new_state(&self.schema, &raw, desired)),
            Err(err) if err.is_not_found() => {
                tracing::debug!("{}: not found, will create", subject);
                None
            }
            Err(err) => return Err(err),
        };

        let canonical = canonicalize_desired(&self.schema, desired, initial.as_ref());
        let diffs = match &initial {
            Some(actual) => diff(&self.schema, &canonical, actual),
            None => Vec::new(),
        };
        for d in &diffs {
            tracing::debug!("{}: diff {}", subject, d);
        }

        let plan = plan(&subject, &diffs, initial.is_some(), lifecycle)?;
        tracing::info!(
            "{}: {} operation(s) planned from {} diff(s)",
            subject,
            plan.operations.len(),
            plan.diffs.len()
        );

        Ok(Prepared {
            initial,
            desired: canonical,
            plan,
        })
    }

    async fn apply_once(
        &self,
        desired: &Resource,
        lifecycle: &[LifecycleDirective],
    ) -> Result<Resource> {
        let subject = self.schema.describe(desired);
        let prepared = self.prepare(desired, lifecycle).await?;

        let raw_new = if prepared.plan.is_noop() {
            prepared.initial
        } else {
            self.execute(&prepared.plan, &prepared.desired).await?
        };
        let raw_new = match raw_new {
            Some(state) => state,
            None => self.bounded("get", self.api.get(&self.schema, desired)).await?,
        };

        let new_state = canonicalize_new_state(&self.schema, &raw_new, desired);
        let expected = canonicalize_desired(&self.schema, desired, Some(&new_state));
        let residual: Vec<_> = diff(&self.schema, &expected, &new_state)
            .into_iter()
            .filter(|d| d.is_actionable())
            .collect();

        if !residual.is_empty() {
            return Err(DclError::DriftAfterApply {
                kind: subject,
                diffs: residual,
            });
        }

        tracing::info!("{}: applied", subject);
        Ok(new_state)
    }

    /// Run plan operations one at a time, stopping at the first failure.
    /// Returns the response of the last operation, if it carried the resource.
    async fn execute(&self, plan: &ApplyPlan, desired: &Resource) -> Result<Option<Resource>> {
        let mut last = None;
        for operation in &plan.operations {
            tracing::info!("{}: {}", self.schema.describe(desired), operation);
            let result = match operation {
                Operation::Create => {
                    self.bounded("create", self.api.create(&self.schema, desired))
                        .await
                }
                Operation::Update { operation: op, diffs } => {
                    self.bounded(op.as_str(), self.api.patch(&self.schema, *op, desired, diffs))
                        .await
                }
            };
            last = result.map_err(|err| DclError::Step {
                operation: operation.name(),
                source: Box::new(err),
            })?;
        }
        Ok(last)
    }

    /// Fetch one resource and normalize it against its identity
    pub async fn get(&self, identity: &Resource) -> Result<Resource> {
        let raw = self
            .bounded("get", self.api.get(&self.schema, identity))
            .await?;
        Ok(canonicalize_new_state(&self.schema, &raw, identity))
    }

    /// Delete and wait until reads stop returning the resource
    pub async fn delete(&self, resource: &Resource) -> Result<()> {
        let identity = &self.schema.identity_of(resource);
        let subject = self.schema.describe(identity);

        match self
            .bounded("delete", self.api.delete(&self.schema, identity))
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::debug!("{}: already deleted", subject);
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let attempts = self.settings.delete_poll_attempts;
        for attempt in 1..=attempts {
            match self.bounded("get", self.api.get(&self.schema, identity)).await {
                Err(err) if err.is_not_found() => {
                    tracing::info!("{}: deleted", subject);
                    return Ok(());
                }
                Err(err) => return Err(err),
                Ok(_) => {
                    tracing::warn!("{}: still visible after delete ({}/{})", subject, attempt, attempts);
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.delete_poll_interval()).await;
                    }
                }
            }
        }

        Err(DclError::NotDeleted {
            resource: subject,
            attempts,
        })
    }

    /// Delete every listed resource under `parent` accepted by `filter`.
    ///
    /// Every match is attempted; failures are collected into one error.
    pub async fn delete_all<F>(&self, parent: &Resource, filter: F) -> Result<()>
    where
        F: Fn(&Resource) -> bool,
    {
        let mut list = self.list(parent).await?;
        let mut matching = Vec::new();
        loop {
            matching.extend(list.items.iter().filter(|r| filter(r)).cloned());
            if !list.has_next() {
                break;
            }
            list.next().await?;
        }

        tracing::info!("{}: deleting {} resource(s)", self.schema.kind, matching.len());
        let mut errors = Vec::new();
        for resource in &matching {
            if let Err(err) = self.delete(resource).await {
                tracing::warn!("{}: delete failed: {}", self.schema.describe(resource), err);
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DclError::Aggregate(errors))
        }
    }

    /// Fetch one page under `parent`, starting at `page_token`
    pub async fn list_page(
        &self,
        parent: &Resource,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page> {
        let page = self
            .bounded(
                "list",
                self.api.list(&self.schema, parent, page_token, page_size),
            )
            .await?;
        tracing::debug!(
            "{}: listed {} item(s), more: {}",
            self.schema.kind,
            page.items.len(),
            page.next_page_token.is_some()
        );
        Ok(Page {
            items: page
                .items
                .iter()
                .map(|item| canonicalize_new_state(&self.schema, item, parent))
                .collect(),
            next_page_token: page.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    /// Bound one suspension point by the configured call timeout
    async fn bounded<T>(&self, operation: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        let after = self.settings.call_timeout();
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => Err(DclError::Timeout {
                operation: operation.to_string(),
                after,
            }),
        }
    }
}
