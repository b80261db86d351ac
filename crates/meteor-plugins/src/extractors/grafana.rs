//! Grafana dashboard extractor.
//!
//! Walks the Grafana search API for dashboards and emits one `dashboard`
//! asset per hit, with the dashboard's panels mapped to charts.
//!
//! API calls, authenticated with a bearer API key:
//!
//! ```text
//! GET {base_url}/api/search?type=dash-db          -> [{uid, ...}, ...]
//! GET {base_url}/api/dashboards/uid/{uid}         -> {meta, dashboard}
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use meteor_core::{
    asset::dashboard_urn, Asset, AssetData, Chart, Config, DashboardData, Emitter, Extractor,
    Plugin, PluginContext, PluginError, PluginInfo, PluginKind,
};

const SAMPLE_CONFIG: &str = "\
# Base URL of the Grafana server
base_url: http://grafana.company.com
# API key with viewer access
api_key: ${GRAFANA_API_KEY}
";

#[derive(Debug, Clone, Default, Deserialize)]
struct GrafanaConfig {
    base_url: String,
    api_key: String,
}

// =============================================================================
// API payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchHit {
    uid: String,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    meta: DashboardMeta,
    dashboard: DashboardDetail,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DashboardMeta {
    slug: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DashboardDetail {
    uid: String,
    description: String,
    panels: Vec<Panel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Panel {
    id: i64,
    title: String,
}

// =============================================================================
// Extractor
// =============================================================================

/// Extracts dashboards from a Grafana server.
#[derive(Debug, Default)]
pub struct GrafanaExtractor {
    config: GrafanaConfig,
    client: Option<reqwest::Client>,
}

impl GrafanaExtractor {
    fn parse_config(config: &Config) -> Result<GrafanaConfig, PluginError> {
        let parsed: GrafanaConfig = config
            .extract()
            .map_err(|err| PluginError::invalid_config(PluginKind::Extractor, "grafana", err))?;
        if parsed.base_url.is_empty() {
            return Err(PluginError::invalid_config(
                PluginKind::Extractor,
                "grafana",
                "base_url is required",
            ));
        }
        if parsed.api_key.is_empty() {
            return Err(PluginError::invalid_config(
                PluginKind::Extractor,
                "grafana",
                "api_key is required",
            ));
        }
        Ok(parsed)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, PluginError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PluginError::extract_failed("extractor is not initialized"))?;

        let response = client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|err| PluginError::extract_failed(format!("{url}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PluginError::extract_failed(format!(
                "{url}: unexpected status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|err| PluginError::extract_failed(format!("{url}: {err}")))
    }
}

/// Maps one dashboard API response onto the asset model.
fn dashboard_asset(host: &str, response: &DashboardResponse) -> Asset {
    let charts = response
        .dashboard
        .panels
        .iter()
        .map(|panel| Chart {
            urn: format!("{}.{}", response.dashboard.uid, panel.id),
            name: panel.title.clone(),
            source: "grafana".into(),
        })
        .collect();

    Asset::new(
        dashboard_urn("grafana", host, &response.dashboard.uid),
        response.meta.slug.clone(),
        "grafana",
        AssetData::Dashboard(DashboardData { charts }),
    )
    .with_description(response.dashboard.description.clone())
}

/// The host portion of the base URL, used in dashboard URNs.
fn host_of(base_url: &str) -> &str {
    base_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

#[async_trait]
impl Plugin for GrafanaExtractor {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "Dashboard list from a Grafana server".into(),
            sample_config: SAMPLE_CONFIG.into(),
            summary: "One dashboard asset per dashboard; panels become charts.".into(),
            tags: vec!["oss".into(), "extractor".into()],
        }
    }

    fn validate(&self, config: &Config) -> Result<(), PluginError> {
        Self::parse_config(config).map(|_| ())
    }

    async fn init(&mut self, _ctx: &PluginContext, config: Config) -> Result<(), PluginError> {
        let mut parsed = Self::parse_config(&config)?;
        parsed.base_url = parsed.base_url.trim_end_matches('/').to_string();

        self.client = Some(
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|err| PluginError::extract_failed(err))?,
        );
        self.config = parsed;
        Ok(())
    }
}

#[async_trait]
impl Extractor for GrafanaExtractor {
    async fn extract(&mut self, _ctx: &PluginContext, emit: &Emitter) -> Result<(), PluginError> {
        let base = self.config.base_url.clone();
        let host = host_of(&base).to_string();

        let hits: Vec<SearchHit> = self
            .get_json(&format!("{base}/api/search?type=dash-db"))
            .await?;
        debug!(dashboards = hits.len(), "grafana search finished");

        for hit in hits {
            let response: DashboardResponse = self
                .get_json(&format!("{base}/api/dashboards/uid/{}", hit.uid))
                .await?;
            emit.emit(dashboard_asset(&host, &response)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from_yaml(yaml: &str) -> Config {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(yaml).unwrap();
        Config::from(mapping)
    }

    #[test]
    fn validate_requires_base_url_and_api_key() {
        let extractor = GrafanaExtractor::default();
        assert!(extractor.validate(&Config::new()).is_err());
        assert!(
            extractor
                .validate(&config_from_yaml("base_url: http://grafana.local\n"))
                .is_err()
        );
        assert!(
            extractor
                .validate(&config_from_yaml(
                    "base_url: http://grafana.local\napi_key: secret\n"
                ))
                .is_ok()
        );
    }

    #[test]
    fn maps_dashboards_and_panels_onto_assets() {
        let response: DashboardResponse = serde_json::from_str(
            r#"{
                "meta": {"slug": "payments", "url": "/d/5WsKOvW7z/payments"},
                "dashboard": {
                    "uid": "5WsKOvW7z",
                    "description": "payment volumes",
                    "panels": [
                        {"id": 2, "title": "Success rate"},
                        {"id": 4, "title": "Latency"}
                    ]
                }
            }"#,
        )
        .unwrap();

        let asset = dashboard_asset("grafana.local", &response);
        assert_eq!(asset.urn, "grafana::grafana.local/5WsKOvW7z");
        assert_eq!(asset.name, "payments");
        assert_eq!(asset.description, "payment volumes");

        match &asset.data {
            AssetData::Dashboard(dashboard) => {
                assert_eq!(dashboard.charts.len(), 2);
                assert_eq!(dashboard.charts[0].urn, "5WsKOvW7z.2");
                assert_eq!(dashboard.charts[1].name, "Latency");
            }
            other => panic!("expected dashboard data, got {other:?}"),
        }
    }

    #[test]
    fn host_strips_scheme_and_trailing_slash() {
        assert_eq!(host_of("http://grafana.local/"), "grafana.local");
        assert_eq!(host_of("https://grafana.company.com"), "grafana.company.com");
    }
}
