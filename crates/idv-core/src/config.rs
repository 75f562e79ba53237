//! Client configuration: endpoints, time bounds, feature flags.
//!
//! A [`Config`] is complete — every field has a value. Callers that
//! only want to override a subset apply a [`ConfigPatch`] on top of
//! [`Config::default`], which mirrors how embedders merge a partial
//! configuration over the shipped defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Deployment environment tag, recorded on proving snapshots and
/// analytics events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production backends.
    #[default]
    Prod,
    /// Staging backends.
    Staging,
}

impl Environment {
    /// Canonical lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Staging => "staging",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remote endpoints the capabilities are pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Base URL of the registration / protocol-data API.
    pub api: String,
    /// Websocket URL of the proof-compute service.
    pub prover_ws: String,
    /// Websocket URL of the status relay used by history sync.
    pub relay_ws: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: "https://api.idv.example".into(),
            prover_ws: "wss://prover.idv.example".into(),
            relay_ws: "wss://relay.idv.example".into(),
        }
    }
}

/// Upper bounds for the cooperative operations, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Single HTTP round-trip.
    pub http_ms: u64,
    /// Websocket connect plus first message.
    pub ws_ms: u64,
    /// One scanner session.
    pub scan_ms: u64,
    /// End-to-end proof generation.
    pub proof_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_ms: 30_000,
            ws_ms: 60_000,
            scan_ms: 120_000,
            proof_ms: 300_000,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment tag.
    pub environment: Environment,
    /// Remote endpoints.
    pub endpoints: Endpoints,
    /// Operation time bounds.
    pub timeouts: Timeouts,
    /// Named feature toggles. Unknown names are carried, not rejected,
    /// so older clients tolerate newer flags.
    pub features: BTreeMap<String, bool>,
}

impl Config {
    /// Whether a feature flag is enabled. Absent flags are off.
    pub fn feature(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    /// Apply a partial override on top of this configuration.
    pub fn merge(mut self, patch: ConfigPatch) -> Config {
        if let Some(environment) = patch.environment {
            self.environment = environment;
        }
        if let Some(api) = patch.api {
            self.endpoints.api = api;
        }
        if let Some(prover_ws) = patch.prover_ws {
            self.endpoints.prover_ws = prover_ws;
        }
        if let Some(relay_ws) = patch.relay_ws {
            self.endpoints.relay_ws = relay_ws;
        }
        if let Some(timeouts) = patch.timeouts {
            self.timeouts = timeouts;
        }
        for (name, on) in patch.features {
            self.features.insert(name, on);
        }
        self
    }
}

/// Partial configuration override. Every field is optional; `None`
/// keeps the base value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub environment: Option<Environment>,
    pub api: Option<String>,
    pub prover_ws: Option<String>,
    pub relay_ws: Option<String>,
    pub timeouts: Option<Timeouts>,
    pub features: BTreeMap<String, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_positive_bounds() {
        let config = Config::default();
        assert!(config.timeouts.http_ms > 0);
        assert!(config.timeouts.proof_ms >= config.timeouts.ws_ms);
        assert_eq!(config.environment, Environment::Prod);
    }

    #[test]
    fn merge_overrides_only_given_fields() {
        let merged = Config::default().merge(ConfigPatch {
            environment: Some(Environment::Staging),
            relay_ws: Some("wss://relay.staging.idv.example".into()),
            ..ConfigPatch::default()
        });
        assert_eq!(merged.environment, Environment::Staging);
        assert_eq!(merged.endpoints.relay_ws, "wss://relay.staging.idv.example");
        // Untouched fields keep the defaults.
        assert_eq!(merged.endpoints.api, Endpoints::default().api);
        assert_eq!(merged.timeouts, Timeouts::default());
    }

    #[test]
    fn merge_adds_feature_flags() {
        let merged = Config::default().merge(ConfigPatch {
            features: BTreeMap::from([("nfc_extended".to_string(), true)]),
            ..ConfigPatch::default()
        });
        assert!(merged.feature("nfc_extended"));
        assert!(!merged.feature("absent"));
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn partial_json_deserializes_via_defaults() {
        let config: Config = serde_json::from_str(r#"{"environment":"staging"}"#).unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.timeouts, Timeouts::default());
    }
}
