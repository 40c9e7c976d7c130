//! Paged listing

use super::api::ResourceApi;
use super::apply::Reconciler;
use super::value::Resource;
use crate::error::{DclError, Result};
use futures::stream::{self, Stream, TryStreamExt};

/// One page of listed resources plus the means to fetch the next one
pub struct ResourceList<'a, A> {
    reconciler: &'a Reconciler<A>,
    parent: Resource,
    page_size: u32,
    pub items: Vec<Resource>,
    next_page_token: Option<String>,
}

impl<'a, A: ResourceApi> ResourceList<'a, A> {
    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }

    /// Continuation token; pass it to [`Reconciler::list_from`] to resume later
    pub fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }

    /// Replace `items` with the next page
    pub async fn next(&mut self) -> Result<()> {
        let Some(token) = self.next_page_token.take() else {
            return Err(DclError::validation("pageToken", "no next page"));
        };
        let page = self
            .reconciler
            .list_page(&self.parent, Some(&token), self.page_size)
            .await?;
        self.items = page.items;
        self.next_page_token = page.next_page_token;
        Ok(())
    }
}

impl<A: ResourceApi> Reconciler<A> {
    /// First page of resources under `parent`
    pub async fn list(&self, parent: &Resource) -> Result<ResourceList<'_, A>> {
        self.list_from(parent, None, self.settings().page_size).await
    }

    /// Page starting at `page_token`, with an explicit page size
    pub async fn list_from(
        &self,
        parent: &Resource,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ResourceList<'_, A>> {
        let page = self.list_page(parent, page_token, page_size).await?;
        Ok(ResourceList {
            reconciler: self,
            parent: parent.clone(),
            page_size,
            items: page.items,
            next_page_token: page.next_page_token,
        })
    }

    /// Every resource under `parent`, fetched lazily one page at a time
    pub fn stream<'a>(&'a self, parent: &'a Resource) -> impl Stream<Item = Result<Resource>> + 'a {
        // State: Some(token) while pages remain; the first page has no token
        stream::try_unfold(Some(None::<String>), move |state| async move {
            let Some(token) = state else {
                return Ok::<_, DclError>(None);
            };
            let page = self
                .list_page(parent, token.as_deref(), self.settings().page_size)
                .await?;
            let next = page.next_page_token.map(Some);
            Ok(Some((stream::iter(page.items.into_iter().map(Ok::<Resource, DclError>)), next)))
        })
        .try_flatten()
    }
}
