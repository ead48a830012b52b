//! terrawalk configuration
//!
//! Loaded from `terrawalk.toml` at startup, falls back to defaults if no
//! config file exists. CLI flags override what is loaded here.

use serde::{Deserialize, Serialize};
use std::path::Path;
use terrawalk_core::AbsProviderConfig;
use terrawalk_graph::{ProviderSchema, ResourceSchema, StaticProviderFactory, DEFAULT_PARALLELISM};

pub const DEFAULT_CONFIG_FILE: &str = "terrawalk.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrawalkConfig {
    pub walk: WalkConfig,
    /// Providers available to the walk, with the resource types they serve.
    pub providers: Vec<ProviderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Maximum number of nodes executing at once.
    pub parallelism: usize,
}

/// One provider declaration.
///
/// ```toml
/// [[providers]]
/// source = "hashicorp/aws"
/// alias = "east"
/// resource_types = ["aws_instance"]
/// data_types = ["aws_ami"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEntry {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub resource_types: Vec<String>,
    pub data_types: Vec<String>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl ProviderEntry {
    /// Root-module provider configuration this entry declares.
    pub fn provider_config(&self) -> AbsProviderConfig {
        let addr = AbsProviderConfig::new(&self.source);
        match &self.alias {
            Some(alias) => addr.with_alias(alias),
            None => addr,
        }
    }

    pub fn schema(&self) -> ProviderSchema {
        let schema = self
            .resource_types
            .iter()
            .fold(ProviderSchema::default(), |s, t| {
                s.with_managed(t, ResourceSchema::default())
            });
        self.data_types
            .iter()
            .fold(schema, |s, t| s.with_data(t, ResourceSchema::default()))
    }
}

impl TerrawalkConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Schema-only provider factory for every declared provider. Entries that
    /// share a source (aliases) are merged into one schema.
    pub fn provider_factory(&self) -> StaticProviderFactory {
        let mut merged: Vec<(String, ProviderSchema)> = Vec::new();
        for entry in &self.providers {
            let source = entry.provider_config().source;
            let schema = entry.schema();
            match merged.iter_mut().find(|(s, _)| *s == source) {
                Some((_, existing)) => {
                    existing.managed.extend(schema.managed);
                    existing.data.extend(schema.data);
                }
                None => merged.push((source, schema)),
            }
        }

        let mut factory = StaticProviderFactory::new();
        for (source, schema) in merged {
            factory.register(&source, schema);
        }
        factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_providers_and_defaults() {
        let config: TerrawalkConfig = toml::from_str(
            r#"
            [[providers]]
            source = "hashicorp/aws"
            resource_types = ["aws_instance"]

            [[providers]]
            source = "hashicorp/aws"
            alias = "east"
            data_types = ["aws_ami"]
            "#,
        )
        .unwrap();
        assert_eq!(config.walk.parallelism, DEFAULT_PARALLELISM);
        assert_eq!(config.providers.len(), 2);

        assert_eq!(
            config.providers[1].provider_config().to_string(),
            r#"provider["registry.terraform.io/hashicorp/aws"].east"#
        );
        assert_eq!(config.provider_factory().sources().len(), 1);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = TerrawalkConfig::load(Path::new("/nonexistent/terrawalk.toml"));
        assert!(config.providers.is_empty());
        assert_eq!(config.walk.parallelism, DEFAULT_PARALLELISM);
    }

    #[test]
    fn toml_output_parses_back() {
        let mut config = TerrawalkConfig::default();
        config.walk.parallelism = 3;
        config.providers.push(ProviderEntry {
            source: "hashicorp/random".into(),
            resource_types: vec!["random_id".into()],
            ..Default::default()
        });
        let parsed: TerrawalkConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.walk.parallelism, 3);
        assert_eq!(parsed.providers[0].resource_types, vec!["random_id"]);
    }
}
