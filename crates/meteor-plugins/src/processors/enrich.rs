//! Enrichment processor.
//!
//! Copies fixed values from the recipe onto every asset: top-level config
//! entries land in the asset's free-form `attributes`, and the reserved
//! `labels` sub-map merges into the asset's labels.
//!
//! ```yaml
//! processors:
//!   - name: enrich
//!     config:
//!       team: data-platform
//!       tier: gold
//!       labels:
//!         env: production
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;

use meteor_core::{
    Config, Plugin, PluginContext, PluginError, PluginInfo, PluginKind, Processor, Record,
};

const SAMPLE_CONFIG: &str = "\
# Every entry is copied into the asset's attributes; the reserved
# `labels` map merges into the asset's labels.
team: data-platform
labels:
  env: production
";

const LABELS_KEY: &str = "labels";

/// Appends fixed attributes and labels to every asset.
#[derive(Debug, Default)]
pub struct EnrichProcessor {
    attributes: BTreeMap<String, serde_json::Value>,
    labels: BTreeMap<String, String>,
}

impl EnrichProcessor {
    fn parse_config(
        config: &Config,
    ) -> Result<(BTreeMap<String, serde_json::Value>, BTreeMap<String, String>), PluginError> {
        let mut attributes = BTreeMap::new();
        let mut labels = BTreeMap::new();

        for (key, value) in config.iter() {
            let Some(key) = key.as_str() else {
                return Err(PluginError::invalid_config(
                    PluginKind::Processor,
                    "enrich",
                    format!("non-string key: {key:?}"),
                ));
            };

            if key == LABELS_KEY {
                labels = serde_yaml::from_value(value.clone()).map_err(|err| {
                    PluginError::invalid_config(
                        PluginKind::Processor,
                        "enrich",
                        format!("labels must map strings to strings: {err}"),
                    )
                })?;
                continue;
            }

            let json = serde_json::to_value(value).map_err(|err| {
                PluginError::invalid_config(
                    PluginKind::Processor,
                    "enrich",
                    format!("value of \"{key}\" is not representable: {err}"),
                )
            })?;
            attributes.insert(key.to_string(), json);
        }

        Ok((attributes, labels))
    }
}

#[async_trait]
impl Plugin for EnrichProcessor {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "Append fixed attributes and labels to every asset".into(),
            sample_config: SAMPLE_CONFIG.into(),
            summary: "Static enrichment from the recipe; existing asset values win only when \
                      the keys do not collide."
                .into(),
            tags: vec!["transform".into(), "processor".into()],
        }
    }

    fn validate(&self, config: &Config) -> Result<(), PluginError> {
        Self::parse_config(config).map(|_| ())
    }

    async fn init(&mut self, _ctx: &PluginContext, config: Config) -> Result<(), PluginError> {
        let (attributes, labels) = Self::parse_config(&config)?;
        self.attributes = attributes;
        self.labels = labels;
        Ok(())
    }
}

#[async_trait]
impl Processor for EnrichProcessor {
    async fn process(
        &mut self,
        _ctx: &PluginContext,
        record: Record,
    ) -> Result<Record, PluginError> {
        if self.attributes.is_empty() && self.labels.is_empty() {
            return Ok(record);
        }

        let mut asset = record.into_asset();
        for (key, value) in &self.attributes {
            asset.attributes.insert(key.clone(), value.clone());
        }
        for (key, value) in &self.labels {
            asset.labels.insert(key.clone(), value.clone());
        }
        Ok(Record::new(asset))
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use meteor_core::{Asset, AssetData, TableData};

    use super::*;

    fn ctx() -> PluginContext {
        PluginContext::new("test", CancellationToken::new())
    }

    fn record() -> Record {
        Record::new(Asset::new(
            "csv::/tmp/users.csv",
            "users",
            "csv",
            AssetData::Table(TableData::default()),
        ))
    }

    fn config_from_yaml(yaml: &str) -> Config {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(yaml).unwrap();
        Config::from(mapping)
    }

    #[tokio::test]
    async fn appends_attributes_and_labels() {
        let mut processor = EnrichProcessor::default();
        processor
            .init(
                &ctx(),
                config_from_yaml("team: data-platform\nlabels:\n  env: production\n"),
            )
            .await
            .unwrap();

        let processed = processor.process(&ctx(), record()).await.unwrap();
        let asset = processed.asset();

        assert_eq!(
            asset.attributes.get("team"),
            Some(&serde_json::Value::String("data-platform".into()))
        );
        assert_eq!(
            asset.labels.get("env").map(String::as_str),
            Some("production")
        );
    }

    #[tokio::test]
    async fn empty_config_passes_records_through() {
        let mut processor = EnrichProcessor::default();
        processor.init(&ctx(), Config::new()).await.unwrap();

        let input = record();
        let output = processor.process(&ctx(), input.clone()).await.unwrap();
        assert_eq!(output.asset(), input.asset());
    }

    #[test]
    fn labels_must_be_a_string_map() {
        let processor = EnrichProcessor::default();
        let err = processor
            .validate(&config_from_yaml("labels: not-a-map\n"))
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidConfig { .. }));
    }
}
