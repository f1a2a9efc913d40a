//! Static layer and region tables.
//!
//! A [`LayerDefinition`] describes one canonical layer; a [`RegionSet`] holds
//! the regions it must be kept in sync across, including the regions that do
//! not accept architecture-tagged publishes.

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Architecture
// ---------------------------------------------------------------------------

/// Target instruction set of a layer package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    #[serde(alias = "x86-64", alias = "x86")]
    X86_64,
    Arm64,
}

impl Architecture {
    /// Name used by the Lambda API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Layer definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub architecture: Architecture,
}

impl LayerDefinition {
    pub fn new(name: &str, description: &str, architecture: Architecture) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            architecture,
        }
    }
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSet {
    regions: Vec<String>,
    single_architecture: Vec<String>,
}

impl RegionSet {
    pub fn new(regions: Vec<String>, single_architecture: Vec<String>) -> Self {
        Self {
            regions,
            single_architecture,
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Regions that reject the `CompatibleArchitectures` publish parameter.
    pub fn is_single_architecture(&self, region: &str) -> bool {
        self.single_architecture.iter().any(|r| r == region)
    }

    /// Whether `layer` is kept in sync in `region` at all.
    ///
    /// arm64 layers do not exist in single-architecture regions.
    pub fn includes(&self, layer: &LayerDefinition, region: &str) -> bool {
        !(layer.architecture == Architecture::Arm64 && self.is_single_architecture(region))
    }

    /// Architecture tag to publish with in `region`, if any.
    pub fn publish_architecture(
        &self,
        layer: &LayerDefinition,
        region: &str,
    ) -> Option<Architecture> {
        if self.is_single_architecture(region) {
            None
        } else {
            Some(layer.architecture)
        }
    }
}
