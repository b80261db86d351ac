//! GitHub organisation member extractor.
//!
//! Lists the members of one organisation and emits a `user` asset per
//! member, enriched with the member's profile where it is visible:
//!
//! ```text
//! GET https://api.github.com/orgs/{org}/members   -> [{login, url}, ...]
//! GET https://api.github.com/users/{login}        -> {login, name, email, ...}
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use meteor_core::{
    Asset, AssetData, Config, Emitter, Extractor, Plugin, PluginContext, PluginError, PluginInfo,
    PluginKind, UserData,
};

const SAMPLE_CONFIG: &str = "\
# Organisation whose members to list
org: odpf
# Token with read:org scope
token: ${GITHUB_TOKEN}
";

const API_BASE: &str = "https://api.github.com";
// GitHub rejects requests without a user agent.
const USER_AGENT: &str = "meteor-metadata-collector";

#[derive(Debug, Clone, Default, Deserialize)]
struct GithubConfig {
    org: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Member {
    login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserProfile {
    login: String,
    url: String,
    name: Option<String>,
    email: Option<String>,
}

/// Extracts organisation members as user assets.
#[derive(Debug, Default)]
pub struct GithubExtractor {
    config: GithubConfig,
    client: Option<reqwest::Client>,
}

impl GithubExtractor {
    fn parse_config(config: &Config) -> Result<GithubConfig, PluginError> {
        let parsed: GithubConfig = config
            .extract()
            .map_err(|err| PluginError::invalid_config(PluginKind::Extractor, "github", err))?;
        if parsed.org.is_empty() {
            return Err(PluginError::invalid_config(
                PluginKind::Extractor,
                "github",
                "org is required",
            ));
        }
        if parsed.token.is_empty() {
            return Err(PluginError::invalid_config(
                PluginKind::Extractor,
                "github",
                "token is required",
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
            .bearer_auth(&self.config.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
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

/// Maps one profile onto a user asset.
fn user_asset(profile: &UserProfile) -> Asset {
    Asset::new(
        profile.url.clone(),
        profile.login.clone(),
        "github",
        AssetData::User(UserData {
            email: profile.email.clone().unwrap_or_default(),
            username: profile.login.clone(),
            full_name: profile.name.clone().unwrap_or_default(),
        }),
    )
}

#[async_trait]
impl Plugin for GithubExtractor {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "User list from a GitHub organisation".into(),
            sample_config: SAMPLE_CONFIG.into(),
            summary: "One user asset per organisation member.".into(),
            tags: vec!["platform".into(), "extractor".into()],
        }
    }

    fn validate(&self, config: &Config) -> Result<(), PluginError> {
        Self::parse_config(config).map(|_| ())
    }

    async fn init(&mut self, _ctx: &PluginContext, config: Config) -> Result<(), PluginError> {
        self.config = Self::parse_config(&config)?;
        self.client = Some(
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|err| PluginError::extract_failed(err))?,
        );
        Ok(())
    }
}

#[async_trait]
impl Extractor for GithubExtractor {
    async fn extract(&mut self, _ctx: &PluginContext, emit: &Emitter) -> Result<(), PluginError> {
        let members: Vec<Member> = self
            .get_json(&format!("{API_BASE}/orgs/{}/members", self.config.org))
            .await?;

        for member in members {
            // Profiles can be restricted; a miss skips the member rather
            // than failing the run.
            let profile: UserProfile =
                match self.get_json(&format!("{API_BASE}/users/{}", member.login)).await {
                    Ok(profile) => profile,
                    Err(err) => {
                        warn!(member = %member.login, error = %err, "skipping member profile");
                        continue;
                    }
                };
            emit.emit(user_asset(&profile)).await?;
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
    fn validate_requires_org_and_token() {
        let extractor = GithubExtractor::default();
        assert!(extractor.validate(&Config::new()).is_err());
        assert!(extractor.validate(&config_from_yaml("org: odpf\n")).is_err());
        assert!(
            extractor
                .validate(&config_from_yaml("org: odpf\ntoken: secret\n"))
                .is_ok()
        );
    }

    #[test]
    fn maps_profiles_onto_user_assets() {
        let profile: UserProfile = serde_json::from_str(
            r#"{
                "login": "jdoe",
                "url": "https://api.github.com/users/jdoe",
                "name": "Jane Doe",
                "email": null
            }"#,
        )
        .unwrap();

        let asset = user_asset(&profile);
        assert_eq!(asset.urn, "https://api.github.com/users/jdoe");
        assert_eq!(asset.service, "github");
        match &asset.data {
            AssetData::User(user) => {
                assert_eq!(user.username, "jdoe");
                assert_eq!(user.full_name, "Jane Doe");
                assert!(user.email.is_empty());
            }
            other => panic!("expected user data, got {other:?}"),
        }
    }
}
