//! GCP API interaction module
//!
//! Authentication, the HTTP client, and long-running operation polling
//! for the Compute Engine REST API.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities and status classification
//! - [`operations`] - Waiting on Compute Engine operations
//!
//! # Example
//!
//! ```ignore
//! use gdcl::gcp::client::GcpClient;
//!
//! async fn example() -> gdcl::error::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let routes = client.get(&client.compute_url("projects/my-project/global/routes")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod operations;
