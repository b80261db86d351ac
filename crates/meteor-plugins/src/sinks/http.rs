//! HTTP catalog sink.
//!
//! Delivers assets to a metadata catalog service:
//! `PATCH {host}/v1beta1/assets` with a JSON body of
//! `{asset, upstreams, downstreams}`. HTTP 200 is success; 5xx responses
//! and transient network failures are retryable, everything else is
//! fatal.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use meteor_core::{
    Asset, Config, LineageRef, Plugin, PluginContext, PluginError, PluginInfo, PluginKind, Record,
    Sink,
};

const SAMPLE_CONFIG: &str = "\
# Base URL of the catalog service
host: http://catalog.company.com
# Additional headers; comma-separated values are sent as repeated headers
headers:
  X-Catalog-Email: meteor@company.com
";

const ASSETS_PATH: &str = "/v1beta1/assets";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
struct HttpSinkConfig {
    host: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct CatalogPayload<'a> {
    asset: &'a Asset,
    upstreams: &'a [LineageRef],
    downstreams: &'a [LineageRef],
}

/// How a delivery attempt ended, derived from the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Accepted,
    Retry,
    Fatal,
}

fn classify_status(status: u16) -> Outcome {
    match status {
        200 => Outcome::Accepted,
        500..=599 => Outcome::Retry,
        _ => Outcome::Fatal,
    }
}

/// Builds the request header map; comma-separated config values become
/// repeated headers.
fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, PluginError> {
    let mut map = HeaderMap::new();
    for (key, values) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            PluginError::invalid_config(PluginKind::Sink, "http", format!("header \"{key}\": {err}"))
        })?;
        for value in values.split(',') {
            let value = HeaderValue::from_str(value.trim()).map_err(|err| {
                PluginError::invalid_config(
                    PluginKind::Sink,
                    "http",
                    format!("header \"{key}\": {err}"),
                )
            })?;
            map.append(name.clone(), value);
        }
    }
    Ok(map)
}

/// Sends every record to the catalog's asset patch endpoint.
#[derive(Debug, Default)]
pub struct HttpSink {
    client: Option<reqwest::Client>,
    url: String,
    headers: HeaderMap,
}

impl HttpSink {
    fn parse_config(config: &Config) -> Result<HttpSinkConfig, PluginError> {
        let parsed: HttpSinkConfig = config
            .extract()
            .map_err(|err| PluginError::invalid_config(PluginKind::Sink, "http", err))?;
        if parsed.host.is_empty() {
            return Err(PluginError::invalid_config(
                PluginKind::Sink,
                "http",
                "host is required",
            ));
        }
        if !parsed.host.starts_with("http://") && !parsed.host.starts_with("https://") {
            return Err(PluginError::invalid_config(
                PluginKind::Sink,
                "http",
                format!("host must be an http(s) URL, got \"{}\"", parsed.host),
            ));
        }
        Ok(parsed)
    }

    async fn send(&self, record: &Record) -> Result<(), PluginError> {
        let asset = record.asset();
        let payload = CatalogPayload {
            asset,
            upstreams: &asset.lineage.upstreams,
            downstreams: &asset.lineage.downstreams,
        };

        debug!(urn = %asset.urn, "sending record to catalog");
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PluginError::sink_failed("http", "sink is not initialized"))?;

        let response = client
            .patch(&self.url)
            .headers(self.headers.clone())
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_connect() || err.is_timeout() => {
                return Err(PluginError::retryable(PluginError::sink_failed(
                    "http",
                    format!("{}: {err}", asset.urn),
                )));
            }
            Err(err) => {
                return Err(PluginError::sink_failed(
                    "http",
                    format!("{}: {err}", asset.urn),
                ));
            }
        };

        let status = response.status().as_u16();
        match classify_status(status) {
            Outcome::Accepted => {
                info!(urn = %asset.urn, "record accepted by catalog");
                Ok(())
            }
            Outcome::Retry => {
                let body = response.text().await.unwrap_or_default();
                Err(PluginError::retryable(PluginError::sink_failed(
                    "http",
                    format!("{}: status {status}: {body}", asset.urn),
                )))
            }
            Outcome::Fatal => {
                let body = response.text().await.unwrap_or_default();
                Err(PluginError::sink_failed(
                    "http",
                    format!("{}: status {status}: {body}", asset.urn),
                ))
            }
        }
    }
}

#[async_trait]
impl Plugin for HttpSink {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "Send records to an HTTP metadata catalog".into(),
            sample_config: SAMPLE_CONFIG.into(),
            summary: "PATCHes every record to {host}/v1beta1/assets; 5xx responses are \
                      retried by the runtime."
                .into(),
            tags: vec!["http".into(), "sink".into()],
        }
    }

    fn validate(&self, config: &Config) -> Result<(), PluginError> {
        let parsed = Self::parse_config(config)?;
        build_headers(&parsed.headers).map(|_| ())
    }

    async fn init(&mut self, _ctx: &PluginContext, config: Config) -> Result<(), PluginError> {
        let parsed = Self::parse_config(&config)?;

        self.headers = build_headers(&parsed.headers)?;
        self.url = format!("{}{ASSETS_PATH}", parsed.host.trim_end_matches('/'));
        self.client = Some(
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .map_err(|err| PluginError::sink_failed("http", err))?,
        );
        Ok(())
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn sink(&mut self, _ctx: &PluginContext, batch: &[Record]) -> Result<(), PluginError> {
        for record in batch {
            self.send(record).await?;
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
    fn success_is_exactly_http_200() {
        assert_eq!(classify_status(200), Outcome::Accepted);
        assert_eq!(classify_status(201), Outcome::Fatal);
        assert_eq!(classify_status(204), Outcome::Fatal);
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_fatal() {
        assert_eq!(classify_status(500), Outcome::Retry);
        assert_eq!(classify_status(503), Outcome::Retry);
        assert_eq!(classify_status(599), Outcome::Retry);
        assert_eq!(classify_status(400), Outcome::Fatal);
        assert_eq!(classify_status(404), Outcome::Fatal);
        assert_eq!(classify_status(429), Outcome::Fatal);
    }

    #[test]
    fn validate_requires_an_http_host() {
        let sink = HttpSink::default();
        assert!(sink.validate(&Config::new()).is_err());
        assert!(
            sink.validate(&config_from_yaml("host: catalog.company.com\n"))
                .is_err()
        );
        assert!(
            sink.validate(&config_from_yaml("host: https://catalog.company.com\n"))
                .is_ok()
        );
    }

    #[test]
    fn comma_separated_header_values_become_repeated_headers() {
        let headers = BTreeMap::from([("X-Other-Header".to_string(), "one, two".to_string())]);
        let map = build_headers(&headers).unwrap();

        let values: Vec<&str> = map
            .get_all("X-Other-Header")
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["one", "two"]);
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let headers = BTreeMap::from([("bad header".to_string(), "value".to_string())]);
        let err = build_headers(&headers).unwrap_err();
        assert!(matches!(err, PluginError::InvalidConfig { .. }));
    }
}
