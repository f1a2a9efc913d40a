//! In-memory [`LayerProvider`] used by the unit tests.
//!
//! Keeps a version counter per (layer, region), records every call in order,
//! and can be told to fail or slow down specific operations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::balance::RunContext;
use crate::config::Config;
use crate::error::{BalanceError, Result};
use crate::layers::{Architecture, LayerDefinition};
use crate::metrics::MetricsRegistry;
use crate::provider::{LayerProvider, PermissionGrant, PublishRequest};

const LOCATION_PREFIX: &str = "https://layers.test/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe {
        layer: String,
        region: String,
    },
    Location {
        layer: String,
        version: i64,
        region: String,
    },
    Download {
        layer: String,
    },
    Publish {
        layer: String,
        region: String,
        version: i64,
    },
    Grant {
        layer: String,
        region: String,
        version: i64,
        statement_id: String,
    },
}

impl Call {
    fn targets(&self, layer_name: &str, region_name: &str) -> bool {
        match self {
            Self::Probe { layer, region }
            | Self::Location { layer, region, .. }
            | Self::Publish { layer, region, .. }
            | Self::Grant { layer, region, .. } => layer == layer_name && region == region_name,
            Self::Download { .. } => false,
        }
    }
}

#[derive(Default)]
struct State {
    versions: HashMap<(String, String), i64>,
    calls: Vec<Call>,
    publishes: Vec<(String, PublishRequest)>,
    downloads: HashMap<String, usize>,
}

#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<State>,
    content: HashMap<String, Bytes>,
    failing_probes: HashSet<String>,
    failing_publishes: HashSet<(String, String)>,
    failing_grants: HashSet<String>,
    download_delay: Option<Duration>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, layer: &str, region: &str, version: i64) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .versions
            .insert((layer.to_string(), region.to_string()), version);
        self
    }

    pub fn with_content(mut self, layer: &str, body: &'static [u8]) -> Self {
        self.content
            .insert(layer.to_string(), Bytes::from_static(body));
        self
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn failing_probe(mut self, region: &str) -> Self {
        self.failing_probes.insert(region.to_string());
        self
    }

    pub fn failing_publish(mut self, layer: &str, region: &str) -> Self {
        self.failing_publishes
            .insert((layer.to_string(), region.to_string()));
        self
    }

    pub fn failing_grant(mut self, region: &str) -> Self {
        self.failing_grants.insert(region.to_string());
        self
    }

    pub fn version(&self, layer: &str, region: &str) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .versions
            .get(&(layer.to_string(), region.to_string()))
            .copied()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn publishes(&self) -> Vec<(String, PublishRequest)> {
        self.state.lock().unwrap().publishes.clone()
    }

    pub fn downloads(&self, layer: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .downloads
            .get(layer)
            .copied()
            .unwrap_or(0)
    }

    /// Whether any region-scoped call was made for the pair.
    pub fn touched(&self, layer: &str, region: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .any(|c| c.targets(layer, region))
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait::async_trait]
impl LayerProvider for FakeProvider {
    async fn latest_version(&self, layer_name: &str, region: &str) -> Result<Option<i64>> {
        self.record(Call::Probe {
            layer: layer_name.to_string(),
            region: region.to_string(),
        });
        if self.failing_probes.contains(region) {
            return Err(BalanceError::transport("ListLayerVersions", "connection reset"));
        }
        Ok(self.version(layer_name, region))
    }

    async fn content_location(
        &self,
        layer_name: &str,
        version: i64,
        region: &str,
    ) -> Result<String> {
        self.record(Call::Location {
            layer: layer_name.to_string(),
            version,
            region: region.to_string(),
        });
        Ok(format!("{LOCATION_PREFIX}{layer_name}/{version}?X-Amz-Signature=test"))
    }

    async fn download(&self, location: &str) -> Result<Bytes> {
        let layer = location
            .trim_start_matches(LOCATION_PREFIX)
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Download {
                layer: layer.clone(),
            });
            *state.downloads.entry(layer.clone()).or_default() += 1;
        }

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        self.content
            .get(&layer)
            .cloned()
            .ok_or_else(|| BalanceError::transport("download layer package", "404 Not Found"))
    }

    async fn publish_version(&self, region: &str, request: &PublishRequest) -> Result<i64> {
        let key = (request.layer_name.clone(), region.to_string());
        if self.failing_publishes.contains(&key) {
            return Err(BalanceError::transport("PublishLayerVersion", "access denied"));
        }

        let mut state = self.state.lock().unwrap();
        let version = {
            let v = state.versions.entry(key).or_insert(0);
            *v += 1;
            *v
        };
        state.calls.push(Call::Publish {
            layer: request.layer_name.clone(),
            region: region.to_string(),
            version,
        });
        state.publishes.push((region.to_string(), request.clone()));
        Ok(version)
    }

    async fn grant_permission(&self, region: &str, grant: &PermissionGrant) -> Result<()> {
        if self.failing_grants.contains(region) {
            return Err(BalanceError::transport(
                "AddLayerVersionPermission",
                "policy limit exceeded",
            ));
        }
        self.record(Call::Grant {
            layer: grant.layer_name.clone(),
            region: region.to_string(),
            version: grant.version,
            statement_id: grant.statement_id.clone(),
        });
        Ok(())
    }
}

/// Run context over `fake` with layers `L` (x86_64) and `L-Arm64` (arm64).
///
/// The first region is the canonical one.
pub fn test_context(
    fake: FakeProvider,
    regions: &[&str],
    single_architecture: &[&str],
) -> (RunContext, Arc<FakeProvider>) {
    shared_context(Arc::new(fake), regions, single_architecture)
}

pub fn shared_context(
    fake: Arc<FakeProvider>,
    regions: &[&str],
    single_architecture: &[&str],
) -> (RunContext, Arc<FakeProvider>) {
    let config = Config {
        canonical_region: regions[0].to_string(),
        layers: vec![
            LayerDefinition::new("L", "L description", Architecture::X86_64),
            LayerDefinition::new("L-Arm64", "L-Arm64 description", Architecture::Arm64),
        ],
        regions: regions.iter().map(|r| r.to_string()).collect(),
        single_architecture_regions: single_architecture.iter().map(|r| r.to_string()).collect(),
        ..Config::default()
    };
    let provider: Arc<dyn LayerProvider> = fake.clone();
    let ctx = RunContext::new(&config, provider, MetricsRegistry::new());
    (ctx, fake)
}
