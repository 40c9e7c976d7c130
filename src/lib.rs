//! Declarative client for GCP compute resources
//!
//! Reads a desired resource, fetches what exists, computes field-level
//! differences using per-type schema metadata and issues the minimum set of
//! create/update calls to converge.

pub mod config;
pub mod dcl;
pub mod error;
pub mod gcp;
pub mod resource;

/// Version injected at compile time via GDCL_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("GDCL_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
