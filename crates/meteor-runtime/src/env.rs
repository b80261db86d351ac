//! Process environment configuration.
//!
//! The agent itself is configured entirely through environment variables;
//! recipes configure the pipelines. Defaults apply when a variable is
//! unset.
//!
//! | variable         | default          |
//! |------------------|------------------|
//! | `LOG_LEVEL`      | `info`           |
//! | `STATSD_ENABLED` | `false`          |
//! | `STATSD_HOST`    | `localhost:8125` |
//! | `STATSD_PREFIX`  | `meteor`         |

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Environment-driven agent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentEnv {
    pub log_level: String,
    pub statsd_enabled: bool,
    pub statsd_host: String,
    pub statsd_prefix: String,
}

impl Default for AgentEnv {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            statsd_enabled: false,
            statsd_host: "localhost:8125".into(),
            statsd_prefix: "meteor".into(),
        }
    }
}

impl AgentEnv {
    /// Loads settings from the process environment over the defaults.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::raw().only(&[
                "LOG_LEVEL",
                "STATSD_ENABLED",
                "STATSD_HOST",
                "STATSD_PREFIX",
            ]))
            .extract()
    }
}
