//! Credential supply for authenticated API calls
//!
//! Authentication is an opaque concern owned elsewhere in the application.
//! The orchestrator only needs a bearer token (or none) at request time, so
//! the seam is a single-method trait. Presigned asset PUTs never carry a
//! token; only the metadata submission and status polls do.

use async_trait::async_trait;

/// Supplies the bearer token attached to metadata and status requests
///
/// Returning `None` sends the request unauthenticated, which is useful for
/// tests and for deployments that authenticate at a gateway.
#[async_trait]
pub trait CredentialSupplier: Send + Sync {
    /// Current bearer token, if any
    ///
    /// Called once per request, so implementations may refresh tokens
    /// internally without the orchestrator knowing.
    async fn bearer_token(&self) -> Option<String>;
}

/// A fixed, never-refreshed credential
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    /// Always supply the given token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Never supply a token
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialSupplier for StaticCredentials {
    async fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}
