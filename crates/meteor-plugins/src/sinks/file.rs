//! File sink: appends records to a local file as JSON lines or YAML
//! documents.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use meteor_core::{
    Config, Plugin, PluginContext, PluginError, PluginInfo, PluginKind, Record, Sink,
};

const SAMPLE_CONFIG: &str = "\
# Destination file; created when missing
path: ./out/assets.json
# json (one line per record) or yaml (one document per record)
format: json
# Truncate instead of appending
overwrite: false
";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FileFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileSinkConfig {
    path: String,
    #[serde(default)]
    format: FileFormat,
    #[serde(default)]
    overwrite: bool,
}

/// Writes records to a file, one JSON line or YAML document each.
#[derive(Debug, Default)]
pub struct FileSink {
    format: FileFormat,
    out: Option<File>,
}

impl FileSink {
    fn parse_config(config: &Config) -> Result<FileSinkConfig, PluginError> {
        let parsed: FileSinkConfig = config
            .extract()
            .map_err(|err| PluginError::invalid_config(PluginKind::Sink, "file", err))?;
        if parsed.path.is_empty() {
            return Err(PluginError::invalid_config(
                PluginKind::Sink,
                "file",
                "path is required",
            ));
        }
        Ok(parsed)
    }

    fn encode(&self, record: &Record) -> Result<Vec<u8>, PluginError> {
        match self.format {
            FileFormat::Json => {
                let mut line = serde_json::to_vec(record)
                    .map_err(|err| PluginError::sink_failed("file", err))?;
                line.push(b'\n');
                Ok(line)
            }
            FileFormat::Yaml => {
                let doc = serde_yaml::to_string(record)
                    .map_err(|err| PluginError::sink_failed("file", err))?;
                Ok(format!("---\n{doc}").into_bytes())
            }
        }
    }
}

#[async_trait]
impl Plugin for FileSink {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "Write records to a local file".into(),
            sample_config: SAMPLE_CONFIG.into(),
            summary: "Appends one JSON line or YAML document per record; replays after a \
                      retry may duplicate lines."
                .into(),
            tags: vec!["file".into(), "sink".into()],
        }
    }

    fn validate(&self, config: &Config) -> Result<(), PluginError> {
        Self::parse_config(config).map(|_| ())
    }

    async fn init(&mut self, _ctx: &PluginContext, config: Config) -> Result<(), PluginError> {
        let parsed = Self::parse_config(&config)?;

        if let Some(parent) = std::path::Path::new(&parsed.path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| PluginError::sink_failed("file", err))?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if parsed.overwrite {
            options.truncate(true);
        } else {
            options.append(true);
        }
        let file = options
            .open(&parsed.path)
            .await
            .map_err(|err| PluginError::sink_failed("file", format!("{}: {err}", parsed.path)))?;

        self.format = parsed.format;
        self.out = Some(file);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PluginError> {
        if let Some(mut file) = self.out.take() {
            file.flush()
                .await
                .map_err(|err| PluginError::sink_failed("file", err))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn sink(&mut self, _ctx: &PluginContext, batch: &[Record]) -> Result<(), PluginError> {
        let encoded: Vec<Vec<u8>> = batch
            .iter()
            .map(|record| self.encode(record))
            .collect::<Result<_, _>>()?;

        let file = self
            .out
            .as_mut()
            .ok_or_else(|| PluginError::sink_failed("file", "sink is not initialized"))?;
        for bytes in encoded {
            file.write_all(&bytes)
                .await
                .map_err(|err| PluginError::sink_failed("file", err))?;
        }
        Ok(())
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

    fn record(urn: &str) -> Record {
        Record::new(Asset::new(
            urn,
            "t",
            "test",
            AssetData::Table(TableData::default()),
        ))
    }

    fn config(path: &str, extra: &[(&str, &str)]) -> Config {
        let mut config = Config::new();
        config.insert("path", serde_yaml::Value::String(path.into()));
        for (key, value) in extra {
            config.insert(*key, serde_yaml::Value::String((*value).into()));
        }
        config
    }

    #[test]
    fn validate_requires_a_path() {
        let sink = FileSink::default();
        assert!(sink.validate(&Config::new()).is_err());
        assert!(sink.validate(&config("./out.json", &[])).is_ok());
    }

    #[tokio::test]
    async fn writes_json_lines_and_flushes_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.json");

        let mut sink = FileSink::default();
        sink.init(&ctx(), config(path.to_str().unwrap(), &[]))
            .await
            .unwrap();
        sink.sink(&ctx(), &[record("a"), record("b")]).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["urn"], "a");
        assert_eq!(first["type"], "table");
    }

    #[tokio::test]
    async fn yaml_format_writes_one_document_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.yaml");

        let mut sink = FileSink::default();
        sink.init(
            &ctx(),
            config(path.to_str().unwrap(), &[("format", "yaml")]),
        )
        .await
        .unwrap();
        sink.sink(&ctx(), &[record("a"), record("b")]).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("---\n").count(), 2);
        assert!(contents.contains("urn: a"));
    }

    #[tokio::test]
    async fn append_mode_keeps_previous_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.json");

        for urn in ["a", "b"] {
            let mut sink = FileSink::default();
            sink.init(&ctx(), config(path.to_str().unwrap(), &[]))
                .await
                .unwrap();
            sink.sink(&ctx(), &[record(urn)]).await.unwrap();
            sink.close().await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
