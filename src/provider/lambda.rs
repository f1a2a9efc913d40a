//! AWS Lambda implementation of [`LayerProvider`].
//!
//! One SDK client is built per region on first use and reused for the rest
//! of the run.  Building a client resolves credentials up front, so a region
//! without usable credentials fails with a configuration error before any
//! API call is attempted.

use std::collections::HashMap;
use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Architecture as LambdaArchitecture, LayerVersionContentInput, Runtime};
use aws_sdk_lambda::Client;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{LayerProvider, PermissionGrant, PublishRequest};
use crate::cache::single_flight::SingleFlight;
use crate::error::{BalanceError, Result};

pub struct LambdaProvider {
    http_client: reqwest::Client,
    clients: Mutex<HashMap<String, Arc<SingleFlight<Client>>>>,
}

impl LambdaProvider {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Client pinned to `region`, built once and shared by every task.
    ///
    /// A failed build is cached like a success, so every task in the region
    /// sees the same configuration error.
    async fn client_for(&self, region: &str) -> Result<Client> {
        let slot = {
            let mut clients = self.clients.lock().await;
            Arc::clone(clients.entry(region.to_string()).or_default())
        };
        slot.get_or_fetch(|| build_client(region)).await
    }
}

async fn build_client(region: &str) -> Result<Client> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;
    resolve_credentials(&sdk_config, region).await?;
    debug!(region, "built Lambda client");
    Ok(Client::new(&sdk_config))
}

/// The loader always installs the default chain, so only asking it for
/// credentials tells whether any source actually has them.
async fn resolve_credentials(sdk_config: &SdkConfig, region: &str) -> Result<()> {
    let provider = sdk_config.credentials_provider().ok_or_else(|| {
        BalanceError::Config(format!("no AWS credentials provider resolved for {region}"))
    })?;
    provider.provide_credentials().await.map_err(|e| {
        BalanceError::Config(format!(
            "failed to resolve AWS credentials for {region}: {}",
            DisplayErrorContext(e)
        ))
    })?;
    Ok(())
}

fn sdk_error<E>(operation: &str, err: E) -> BalanceError
where
    E: std::error::Error,
{
    BalanceError::transport(operation, DisplayErrorContext(err))
}

/// SDK-typed pieces of a `PublishLayerVersion` call.
#[derive(Debug)]
struct PublishInput {
    content: LayerVersionContentInput,
    runtimes: Vec<Runtime>,
    /// `None` leaves `CompatibleArchitectures` out of the request entirely.
    architectures: Option<Vec<LambdaArchitecture>>,
}

impl PublishInput {
    fn from_request(request: &PublishRequest) -> Self {
        Self {
            content: LayerVersionContentInput::builder()
                .zip_file(Blob::new(request.content.to_vec()))
                .build(),
            runtimes: request
                .compatible_runtimes
                .iter()
                .map(|r| Runtime::from(r.as_str()))
                .collect(),
            architectures: request
                .architecture
                .map(|a| vec![LambdaArchitecture::from(a.as_str())]),
        }
    }
}

#[async_trait::async_trait]
impl LayerProvider for LambdaProvider {
    #[instrument(skip(self))]
    async fn latest_version(&self, layer_name: &str, region: &str) -> Result<Option<i64>> {
        let client = self.client_for(region).await?;

        let resp = client
            .list_layer_versions()
            .layer_name(layer_name)
            .max_items(1)
            .send()
            .await
            .map_err(|e| sdk_error("ListLayerVersions", e))?;

        Ok(resp.layer_versions().first().map(|v| v.version()))
    }

    #[instrument(skip(self))]
    async fn content_location(
        &self,
        layer_name: &str,
        version: i64,
        region: &str,
    ) -> Result<String> {
        let client = self.client_for(region).await?;

        let resp = client
            .get_layer_version()
            .layer_name(layer_name)
            .version_number(version)
            .send()
            .await
            .map_err(|e| sdk_error("GetLayerVersion", e))?;

        resp.content()
            .and_then(|c| c.location())
            .map(str::to_string)
            .ok_or_else(|| {
                BalanceError::transport("GetLayerVersion", "response has no content location")
            })
    }

    async fn download(&self, location: &str) -> Result<Bytes> {
        // Presigned query strings carry credentials; keep them out of logs.
        let shown = location.split('?').next().unwrap_or_default();
        debug!(location = %shown, "GET layer package");

        let resp = self
            .http_client
            .get(location)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BalanceError::transport("download layer package", e))?;

        resp.bytes()
            .await
            .map_err(|e| BalanceError::transport("read layer package body", e))
    }

    #[instrument(
        skip(self, request),
        fields(layer = %request.layer_name, arch = ?request.architecture)
    )]
    async fn publish_version(&self, region: &str, request: &PublishRequest) -> Result<i64> {
        let client = self.client_for(region).await?;
        let input = PublishInput::from_request(request);

        let resp = client
            .publish_layer_version()
            .layer_name(&request.layer_name)
            .description(&request.description)
            .license_info(&request.license)
            .content(input.content)
            .set_compatible_runtimes(Some(input.runtimes))
            .set_compatible_architectures(input.architectures)
            .send()
            .await
            .map_err(|e| sdk_error("PublishLayerVersion", e))?;

        Ok(resp.version())
    }

    #[instrument(skip(self, grant), fields(layer = %grant.layer_name, version = grant.version))]
    async fn grant_permission(&self, region: &str, grant: &PermissionGrant) -> Result<()> {
        let client = self.client_for(region).await?;

        client
            .add_layer_version_permission()
            .layer_name(&grant.layer_name)
            .version_number(grant.version)
            .statement_id(&grant.statement_id)
            .action(&grant.action)
            .principal(&grant.principal)
            .send()
            .await
            .map_err(|e| sdk_error("AddLayerVersionPermission", e))?;

        Ok(())
    }
}
