//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads every resource type's schema and REST endpoints from
//! embedded JSON files and provides lookup functions for the rest of the
//! application.

use crate::dcl::{ResourceSchema, UpdateOperation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/compute.json")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One REST call. `path` is a template relative to the API endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointDef {
    pub method: HttpMethod,
    pub path: String,
    /// Statuses besides 404 that mean the resource does not exist
    #[serde(default)]
    pub not_found_codes: Vec<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListEndpointDef {
    pub method: HttpMethod,
    pub path: String,
    /// Dot path to the item array in the response
    pub items: String,
    /// Whether the call accepts `pageToken` / `maxResults`
    #[serde(default)]
    pub paged: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsDef {
    pub get: EndpointDef,
    pub create: EndpointDef,
    /// In-place update calls, by operation name
    #[serde(default)]
    pub update: HashMap<UpdateOperation, EndpointDef>,
    pub delete: EndpointDef,
    pub list: ListEndpointDef,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    pub service: String,
    #[serde(flatten)]
    pub schema: ResourceSchema,
    pub endpoints: EndpointsDef,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            for (kind, mut def) in partial.resources {
                def.schema.kind = kind.clone();
                final_config.resources.insert(kind, def);
            }
        }

        final_config
    })
}

/// Get a resource definition by kind
pub fn get_resource(kind: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(kind)
}

/// All known kinds, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}
