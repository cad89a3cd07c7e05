//! GitHub App authentication.
//!
//! The app client (authenticated with a JWT signed by the app's private key) is
//! built once at startup. Each push exchanges it for a short-lived installation
//! client, which is what actually reads PRs and writes statuses.

use jsonwebtoken::EncodingKey;
use octocrab::Octocrab;
use octocrab::models::{AppId, InstallationId};
use thiserror::Error;
use tracing::debug;

use crate::effects::GitHubConnector;
use crate::types::RepoId;

use super::client::OctocrabClient;
use super::error::GitHubApiError;

/// Errors building the app client at startup.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid GitHub App private key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),

    #[error("failed to build GitHub client: {0}")]
    Client(#[from] octocrab::Error),
}

/// Connects to a single GitHub App installation.
#[derive(Clone)]
pub struct InstallationConnector {
    app: Octocrab,
    installation_id: InstallationId,
}

impl InstallationConnector {
    /// Builds the app client from a PEM-encoded RSA private key.
    pub fn new(app_id: u64, installation_id: u64, private_key_pem: &str) -> Result<Self, AuthError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;
        let app = Octocrab::builder().app(AppId(app_id), key).build()?;
        Ok(Self {
            app,
            installation_id: InstallationId(installation_id),
        })
    }
}

impl std::fmt::Debug for InstallationConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationConnector")
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

impl GitHubConnector for InstallationConnector {
    type Interpreter = OctocrabClient;
    type Error = GitHubApiError;

    async fn connect(&self, repo: &RepoId) -> Result<OctocrabClient, GitHubApiError> {
        let (client, _token) = self
            .app
            .installation_and_token(self.installation_id)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        debug!(repo = %repo, installation_id = self.installation_id.into_inner(), "Obtained installation token");
        Ok(OctocrabClient::new(client, repo.clone()))
    }
}
