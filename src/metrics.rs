use std::sync::Arc;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RegionLabels {
    pub region: String,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Counters describing the provider traffic of one run.
pub struct Metrics {
    pub probes: Counter,
    pub publishes: Family<RegionLabels, Counter>,
    pub permission_grants: Counter,
    pub downloads: Counter,
    pub download_bytes: Counter,
    pub target_version: Gauge,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let probes = Counter::default();
        registry.register(
            "layer_balancer_probes",
            "Layer version listings issued",
            probes.clone(),
        );

        let publishes = Family::<RegionLabels, Counter>::default();
        registry.register(
            "layer_balancer_publishes",
            "Layer versions published by region",
            publishes.clone(),
        );

        let permission_grants = Counter::default();
        registry.register(
            "layer_balancer_permission_grants",
            "Public access statements attached to published versions",
            permission_grants.clone(),
        );

        let downloads = Counter::default();
        registry.register(
            "layer_balancer_downloads",
            "Canonical layer packages downloaded",
            downloads.clone(),
        );

        let download_bytes = Counter::default();
        registry.register(
            "layer_balancer_download_bytes",
            "Bytes of canonical layer packages downloaded",
            download_bytes.clone(),
        );

        let target_version: Gauge = Gauge::default();
        registry.register(
            "layer_balancer_target_version",
            "Highest layer version discovered across all regions",
            target_version.clone(),
        );

        Self {
            probes,
            publishes,
            permission_grants,
            downloads,
            download_bytes,
            target_version,
        }
    }

    /// Total publishes across all regions.
    pub fn total_publishes(&self, regions: &[String]) -> u64 {
        regions
            .iter()
            .map(|region| {
                self.publishes
                    .get_or_create(&RegionLabels {
                        region: region.clone(),
                    })
                    .get()
            })
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &self.registry)?;
        Ok(out)
    }
}
