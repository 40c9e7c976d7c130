//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use crate::error::Result;
use reqwest::Method;
use serde_json::Value;

/// Compute Engine v1 base URL
pub const COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1/";

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    endpoint: String,
}

impl GcpClient {
    /// Create a client using Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new().await?;
        Self::with_credentials(credentials, COMPUTE_ENDPOINT)
    }

    /// Create a client with explicit credentials and API base URL
    pub fn with_credentials(credentials: GcpCredentials, endpoint: &str) -> Result<Self> {
        let endpoint = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        };
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            endpoint,
        })
    }

    /// Build Compute Engine API URL from a path relative to the endpoint
    pub fn compute_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Send a request with a fresh access token
    pub async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.send(method, url, &token, body).await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        self.send(Method::GET, url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_url_joins_endpoint() {
        let client =
            GcpClient::with_credentials(GcpCredentials::fixed("t"), "http://localhost:8080/compute/v1")
                .unwrap();
        assert_eq!(
            client.compute_url("projects/p/global/routes"),
            "http://localhost:8080/compute/v1/projects/p/global/routes"
        );
    }
}
