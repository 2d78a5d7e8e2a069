//! GitHub-backed release registry client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use relforge_core::{RegistryError, RegistryResult, ReleaseInfo, ReleaseRegistry};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_UPLOADS_BASE: &str = "https://uploads.github.com";

#[derive(Debug, Deserialize)]
struct GhAsset {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhRelease {
    id: u64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    assets: Vec<GhAsset>,
}

/// Release registry backed by the GitHub releases API.
///
/// Lookup semantics match the `ReleaseRegistry` contract: HTTP 404 is
/// `Ok(None)`; auth, rate-limit, and transport failures are errors. Asset
/// upload deletes any existing asset of the same name first, so re-publishing
/// leaves exactly one asset under the name.
pub struct GithubReleaseRegistry {
    client: reqwest::Client,
    api_base: String,
    uploads_base: String,
    repo: String,
    token: String,
}

impl GithubReleaseRegistry {
    /// `repo` is an `owner/name` slug; `token` a GitHub API token with
    /// release write access.
    pub fn new(repo: String, token: String) -> Self {
        Self::with_endpoints(
            repo,
            token,
            DEFAULT_API_BASE.to_string(),
            DEFAULT_UPLOADS_BASE.to_string(),
        )
    }

    /// Override the API endpoints (GitHub Enterprise, tests).
    pub fn with_endpoints(
        repo: String,
        token: String,
        api_base: String,
        uploads_base: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            uploads_base,
            repo,
            token,
        }
    }

    fn check_status(status: StatusCode, context: &str) -> RegistryResult<()> {
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(RegistryError::Auth(format!("{context}: {status}")))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(RegistryError::RateLimited),
            s => Err(RegistryError::Api {
                status: s.as_u16(),
                message: context.to_string(),
            }),
        }
    }

    async fn fetch_release(&self, tag: &str) -> RegistryResult<Option<GhRelease>> {
        let url = format!(
            "{}/repos/{}/releases/tags/{}",
            self.api_base, self.repo, tag
        );
        debug!(%url, "looking up release");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("User-Agent", "relforge")
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_status(response.status(), "release lookup")?;

        let release = response
            .json::<GhRelease>()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;
        Ok(Some(release))
    }

    async fn create_release(&self, tag: &str) -> RegistryResult<GhRelease> {
        let url = format!("{}/repos/{}/releases", self.api_base, self.repo);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("User-Agent", "relforge")
            .header("Accept", "application/vnd.github+json")
            .json(&serde_json::json!({ "tag_name": tag }))
            .send()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        Self::check_status(response.status(), "release creation")?;
        response
            .json::<GhRelease>()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))
    }

    async fn delete_asset(&self, asset_id: u64) -> RegistryResult<()> {
        let url = format!(
            "{}/repos/{}/releases/assets/{asset_id}",
            self.api_base, self.repo
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .header("User-Agent", "relforge")
            .send()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        Self::check_status(response.status(), "asset deletion")
    }
}

#[async_trait]
impl ReleaseRegistry for GithubReleaseRegistry {
    async fn get_release(&self, tag: &str) -> RegistryResult<Option<ReleaseInfo>> {
        Ok(self.fetch_release(tag).await?.map(|release| ReleaseInfo {
            tag: tag.to_string(),
            assets: release.assets.into_iter().map(|a| a.name).collect(),
            created_at: release.created_at,
        }))
    }

    async fn upload_asset(
        &self,
        tag: &str,
        asset_name: &str,
        bytes: &[u8],
    ) -> RegistryResult<()> {
        let release = match self.fetch_release(tag).await? {
            Some(release) => release,
            None => self.create_release(tag).await?,
        };

        // Overwrite: drop the prior asset of the same name before uploading.
        for asset in &release.assets {
            if asset.name == asset_name {
                info!(asset = %asset_name, "replacing existing release asset");
                self.delete_asset(asset.id).await?;
            }
        }

        let url = format!(
            "{}/repos/{}/releases/{}/assets?name={}",
            self.uploads_base, self.repo, release.id, asset_name
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("User-Agent", "relforge")
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        Self::check_status(response.status(), "asset upload")
    }
}
