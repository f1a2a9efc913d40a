use std::sync::Arc;

use crate::cache::LayerContentCache;
use crate::config::{Config, PublishConfig};
use crate::layers::{LayerDefinition, RegionSet};
use crate::metrics::MetricsRegistry;
use crate::provider::LayerProvider;

/// A layer definition paired with its run-scoped package cache.
#[derive(Debug)]
pub struct CanonicalLayer {
    pub definition: LayerDefinition,
    pub content: LayerContentCache,
}

impl CanonicalLayer {
    pub fn new(definition: LayerDefinition) -> Self {
        Self {
            definition,
            content: LayerContentCache::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// State shared by every task of one balancing run.
///
/// Owned by the coordinator and handed to tasks behind an `Arc`; nothing in it
/// outlives the run.
pub struct RunContext {
    pub provider: Arc<dyn LayerProvider>,
    pub layers: Vec<Arc<CanonicalLayer>>,
    pub regions: RegionSet,
    pub canonical_region: String,
    pub publish: PublishConfig,
    pub metrics: MetricsRegistry,
}

impl RunContext {
    pub fn new(
        config: &Config,
        provider: Arc<dyn LayerProvider>,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            provider,
            layers: config
                .layers
                .iter()
                .cloned()
                .map(|definition| Arc::new(CanonicalLayer::new(definition)))
                .collect(),
            regions: config.region_set(),
            canonical_region: config.canonical_region.clone(),
            publish: config.publish.clone(),
            metrics,
        }
    }

    /// Every (layer, region) pair that takes part in the run, in table order.
    pub fn pairs(&self) -> Vec<(Arc<CanonicalLayer>, String)> {
        self.layers
            .iter()
            .flat_map(|layer| {
                self.regions
                    .regions()
                    .iter()
                    .filter(|region| self.regions.includes(&layer.definition, region))
                    .map(|region| (Arc::clone(layer), region.clone()))
            })
            .collect()
    }
}
