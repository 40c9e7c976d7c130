//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing GCP resources.
//! Resource schemas and REST endpoints are loaded from JSON files at compile
//! time, so new resource types can be added without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`template`] - Expands endpoint path templates from resource fields
//! - [`rest`] - Generic REST implementation of the engine's collaborator
//!
//! # Example
//!
//! ```ignore
//! use gdcl::resource::{get_resource, RestApi};
//! use gdcl::dcl::Reconciler;
//!
//! let def = get_resource("Route").unwrap();
//! let reconciler = Reconciler::new(RestApi::new(client, poll), def.schema.clone(), settings);
//! ```

pub mod registry;
pub mod rest;
pub mod template;

pub use registry::{get_all_resource_keys, get_registry, get_resource, ResourceDef};
pub use rest::RestApi;
