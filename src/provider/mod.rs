//! Layer provider abstraction.
//!
//! Provides the [`LayerProvider`] trait that encapsulates every call the
//! balancer makes against the cloud API.  Each call carries the region it
//! targets so that implementations can resolve per-region configuration.

pub mod lambda;

use bytes::Bytes;

use crate::error::Result;
use crate::layers::Architecture;

pub use lambda::LambdaProvider;

// ---------------------------------------------------------------------------
// Publish request
// ---------------------------------------------------------------------------

/// Parameters of a single `PublishLayerVersion` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub layer_name: String,
    pub description: String,
    pub content: Bytes,
    /// `None` publishes without any architecture constraint.
    pub architecture: Option<Architecture>,
    pub compatible_runtimes: Vec<String>,
    pub license: String,
}

/// Parameters of a single `AddLayerVersionPermission` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub layer_name: String,
    pub version: i64,
    pub statement_id: String,
    pub action: String,
    pub principal: String,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait LayerProvider: Send + Sync {
    /// Most recently published version of `layer_name` in `region`, or `None`
    /// if the layer has never been published there.
    async fn latest_version(&self, layer_name: &str, region: &str) -> Result<Option<i64>>;

    /// Download location of a specific layer version's package.
    async fn content_location(&self, layer_name: &str, version: i64, region: &str)
        -> Result<String>;

    /// Fetch the package body from a location returned by
    /// [`LayerProvider::content_location`].
    async fn download(&self, location: &str) -> Result<Bytes>;

    /// Publish a new layer version, returning its version number.
    async fn publish_version(&self, region: &str, request: &PublishRequest) -> Result<i64>;

    /// Attach a resource policy statement to a published layer version.
    async fn grant_permission(&self, region: &str, grant: &PermissionGrant) -> Result<()>;
}
