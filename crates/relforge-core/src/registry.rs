//! Release registry contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Metadata for a release held by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Tag name the release is keyed by (the reference name).
    pub tag: String,

    /// Names of assets attached to the release.
    pub assets: Vec<String>,

    /// When the release was created.
    pub created_at: DateTime<Utc>,
}

/// External release registry holding named, versioned artifact bundles.
///
/// Semantics:
/// - `get_release` returns `Ok(None)` for a missing release. Any other
///   failure (auth, network, rate limit) propagates as `RegistryError` and
///   must not be coerced into a presence verdict by callers.
/// - `upload_asset` overwrites an existing asset of the same name; a
///   re-publish leaves exactly one asset under that name.
#[async_trait]
pub trait ReleaseRegistry: Send + Sync {
    /// Look up the release tagged `tag`, if any.
    async fn get_release(&self, tag: &str) -> RegistryResult<Option<ReleaseInfo>>;

    /// Upload `bytes` as `asset_name` on the release tagged `tag`,
    /// replacing any prior asset of that name.
    async fn upload_asset(&self, tag: &str, asset_name: &str, bytes: &[u8])
        -> RegistryResult<()>;
}

/// Whether a release exists for `tag`. Registry errors propagate; they are
/// never folded into `false` (which would force spurious rebuilds) or `true`
/// (which would skip a needed first build).
pub async fn release_exists(registry: &dyn ReleaseRegistry, tag: &str) -> RegistryResult<bool> {
    Ok(registry.get_release(tag).await?.is_some())
}
