use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BalanceError, Result};
use crate::layers::{Architecture, LayerDefinition, RegionSet};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything a run needs to know about which layers to balance and where.
///
/// Every field has a built-in default, so running without a config file
/// balances the Powertools layers across all commercial regions.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Region the layer package is downloaded from.
    #[serde(default = "default_canonical_region")]
    pub canonical_region: String,
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerDefinition>,
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    /// Regions that do not accept `CompatibleArchitectures` on publish.
    #[serde(default = "default_single_architecture_regions")]
    pub single_architecture_regions: Vec<String>,
    #[serde(default)]
    pub publish: PublishConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            canonical_region: default_canonical_region(),
            layers: default_layers(),
            regions: default_regions(),
            single_architecture_regions: default_single_architecture_regions(),
            publish: PublishConfig::default(),
        }
    }
}

impl Config {
    pub fn region_set(&self) -> RegionSet {
        RegionSet::new(
            self.regions.clone(),
            self.single_architecture_regions.clone(),
        )
    }
}

fn default_canonical_region() -> String {
    "eu-central-1".to_string()
}

fn default_layers() -> Vec<LayerDefinition> {
    vec![
        LayerDefinition::new(
            "AWSLambdaPowertoolsPythonV2",
            "Lambda Powertools for Python [x86_64] with extra dependencies version bump",
            Architecture::X86_64,
        ),
        LayerDefinition::new(
            "AWSLambdaPowertoolsPythonV2-Arm64",
            "Lambda Powertools for Python [arm64] with extra dependencies version bump",
            Architecture::Arm64,
        ),
    ]
}

fn default_regions() -> Vec<String> {
    [
        "af-south-1",
        "ap-east-1",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-northeast-3",
        "ap-south-1",
        "ap-south-2",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-southeast-3",
        "ap-southeast-4",
        "ca-central-1",
        "eu-central-1",
        "eu-central-2",
        "eu-north-1",
        "eu-south-1",
        "eu-south-2",
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        "me-central-1",
        "me-south-1",
        "sa-east-1",
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

fn default_single_architecture_regions() -> Vec<String> {
    [
        "ap-south-2",
        "ap-southeast-4",
        "eu-central-2",
        "eu-south-2",
        "me-central-1",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// Publish parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    #[serde(default = "default_license")]
    pub license: String,
    #[serde(default = "default_compatible_runtimes")]
    pub compatible_runtimes: Vec<String>,
    /// Statement id reused for every public-access grant.
    #[serde(default = "default_statement_id")]
    pub statement_id: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default = "default_principal")]
    pub principal: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            license: default_license(),
            compatible_runtimes: default_compatible_runtimes(),
            statement_id: default_statement_id(),
            action: default_action(),
            principal: default_principal(),
        }
    }
}

fn default_license() -> String {
    "MIT-0".to_string()
}

fn default_compatible_runtimes() -> Vec<String> {
    vec![
        "python3.7".to_string(),
        "python3.8".to_string(),
        "python3.9".to_string(),
    ]
}

fn default_statement_id() -> String {
    "PublicLayerAccess".to_string()
}

fn default_action() -> String {
    "lambda:GetLayerVersion".to_string()
}

fn default_principal() -> String {
    "*".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        BalanceError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
        BalanceError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Sanity checks that cannot be expressed purely with serde.
pub fn validate_config(config: &Config) -> Result<()> {
    check_config(config).map_err(|e| BalanceError::Config(format!("{e:#}")))
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    anyhow::ensure!(!config.layers.is_empty(), "at least one layer is required");
    anyhow::ensure!(!config.regions.is_empty(), "at least one region is required");
    anyhow::ensure!(
        !config.canonical_region.is_empty(),
        "canonical_region must not be empty"
    );
    anyhow::ensure!(
        !config.publish.compatible_runtimes.is_empty(),
        "publish.compatible_runtimes must not be empty"
    );

    let mut seen = HashSet::new();
    for region in &config.regions {
        anyhow::ensure!(seen.insert(region.as_str()), "duplicate region {region}");
    }
    for region in &config.single_architecture_regions {
        anyhow::ensure!(
            seen.contains(region.as_str()),
            "single-architecture region {region} is not in regions"
        );
    }

    let mut names = HashSet::new();
    for layer in &config.layers {
        anyhow::ensure!(!layer.name.is_empty(), "layer name must not be empty");
        anyhow::ensure!(
            names.insert(layer.name.as_str()),
            "duplicate layer {}",
            layer.name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        validate_config(&config).unwrap();
        assert_eq!(config.canonical_region, "eu-central-1");
        assert_eq!(config.regions.len(), 27);
        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.publish.statement_id, "PublicLayerAccess");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "regions: [eu-west-1, eu-south-2]\nsingle_architecture_regions: [eu-south-2]"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.regions, vec!["eu-west-1", "eu-south-2"]);
        assert_eq!(config.canonical_region, "eu-central-1");
        assert_eq!(config.publish.license, "MIT-0");
        assert!(config.region_set().is_single_architecture("eu-south-2"));
    }

    #[test]
    fn layers_parse_with_architecture() {
        let yaml = r#"
layers:
  - name: MyLayer
    description: mine
  - name: MyLayer-Arm64
    description: mine on arm
    architecture: arm64
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.layers[0].architecture, Architecture::X86_64);
        assert_eq!(config.layers[1].architecture, Architecture::Arm64);
    }

    #[test]
    fn unknown_single_architecture_region_is_rejected() {
        let config = Config {
            regions: vec!["us-east-1".into()],
            single_architecture_regions: vec!["eu-south-2".into()],
            ..Config::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert_eq!(
            err,
            BalanceError::Config("single-architecture region eu-south-2 is not in regions".into())
        );
    }

    #[test]
    fn duplicate_layers_are_rejected() {
        let mut config = Config::default();
        let first = config.layers[0].clone();
        config.layers.push(first);
        assert_eq!(
            validate_config(&config).unwrap_err(),
            BalanceError::Config("duplicate layer AWSLambdaPowertoolsPythonV2".into())
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_config("/nonexistent/layer-balancer.yaml").unwrap_err();
        assert!(matches!(err, BalanceError::Config(_)));
    }
}
