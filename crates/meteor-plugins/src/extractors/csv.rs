//! CSV table extractor.
//!
//! Treats every CSV file as one `table` asset whose columns come from the
//! header row. `path` may point at a single file or at a directory, in
//! which case every `.csv` file directly inside it becomes an asset.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use meteor_core::{
    Asset, AssetData, Column, Config, Emitter, Extractor, Plugin, PluginContext, PluginError,
    PluginInfo, PluginKind, TableData,
};

const SAMPLE_CONFIG: &str = "\
# Path to a CSV file, or to a directory of CSV files
path: ./data/users.csv
";

#[derive(Debug, Clone, Default, Deserialize)]
struct CsvConfig {
    path: String,
}

/// Extracts one table asset per CSV file.
#[derive(Debug, Default)]
pub struct CsvExtractor {
    config: CsvConfig,
}

impl CsvExtractor {
    fn parse_config(config: &Config) -> Result<CsvConfig, PluginError> {
        let parsed: CsvConfig = config
            .extract()
            .map_err(|err| PluginError::invalid_config(PluginKind::Extractor, "csv", err))?;
        if parsed.path.is_empty() {
            return Err(PluginError::invalid_config(
                PluginKind::Extractor,
                "csv",
                "path is required",
            ));
        }
        Ok(parsed)
    }

    fn files(&self) -> Result<Vec<PathBuf>, PluginError> {
        let path = Path::new(&self.config.path);
        let meta = std::fs::metadata(path)
            .map_err(|err| PluginError::extract_failed(format!("{}: {err}", path.display())))?;

        if meta.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut files = Vec::new();
        let entries = std::fs::read_dir(path)
            .map_err(|err| PluginError::extract_failed(format!("{}: {err}", path.display())))?;
        for entry in entries {
            let entry =
                entry.map_err(|err| PluginError::extract_failed(format!("{}: {err}", path.display())))?;
            let file = entry.path();
            if file.is_file() && file.extension().and_then(|ext| ext.to_str()) == Some("csv") {
                files.push(file);
            }
        }
        files.sort();
        Ok(files)
    }

    fn table_from(file: &Path) -> Result<Asset, PluginError> {
        let mut reader = csv::Reader::from_path(file)
            .map_err(|err| PluginError::extract_failed(format!("{}: {err}", file.display())))?;
        let headers = reader
            .headers()
            .map_err(|err| PluginError::extract_failed(format!("{}: {err}", file.display())))?;

        let columns = headers
            .iter()
            .map(|header| Column {
                name: header.to_string(),
                data_type: "string".into(),
                ..Column::default()
            })
            .collect();

        let name = file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Asset::new(
            format!("csv::{}", file.display()),
            name,
            "csv",
            AssetData::Table(TableData {
                columns,
                row_count: None,
            }),
        ))
    }
}

#[async_trait]
impl Plugin for CsvExtractor {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "Extract tables from CSV files".into(),
            sample_config: SAMPLE_CONFIG.into(),
            summary: "One table asset per CSV file; columns come from the header row.".into(),
            tags: vec!["file".into(), "extractor".into()],
        }
    }

    fn validate(&self, config: &Config) -> Result<(), PluginError> {
        Self::parse_config(config).map(|_| ())
    }

    async fn init(&mut self, _ctx: &PluginContext, config: Config) -> Result<(), PluginError> {
        self.config = Self::parse_config(&config)?;
        Ok(())
    }
}

#[async_trait]
impl Extractor for CsvExtractor {
    async fn extract(&mut self, _ctx: &PluginContext, emit: &Emitter) -> Result<(), PluginError> {
        let files = self.files()?;
        debug!(path = %self.config.path, files = files.len(), "scanning csv files");

        for file in files {
            emit.emit(Self::table_from(&file)?).await?;
        }
        Ok(())
    }
}
