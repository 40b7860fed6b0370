//! Configuration resolution for `PushRelay`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/pushrelay/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};
use crate::models::{
    DEFAULT_OPERATION_NAME, DEFAULT_QUERY, DEFAULT_ROOT_FIELD, SlotId, SubscriptionQuery,
};

/// GraphQL endpoint for non-subscription operations.
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://mini-curso.herokuapp.com/v1/graphql";

/// WebSocket endpoint the subscription connects to.
pub const DEFAULT_WEBSOCKET_ENDPOINT: &str = "wss://mini-curso.herokuapp.com/v1/graphql";

/// Title shown on every presented notification.
pub const DEFAULT_TITLE: &str = "PushHasura";

/// The single notification slot every display request targets.
pub const DEFAULT_SLOT_ID: SlotId = 1;

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub graphql_endpoint: String,
    pub websocket_endpoint: String,
    pub title: String,
    pub slot_id: SlotId,
    pub query: String,
    pub operation_name: Option<String>,
    /// Subscription variables, sent verbatim in the `start` payload.
    pub variables: Value,
    /// Field under `data` that holds the notification list.
    pub root_field: String,
    /// Static headers attached to the WebSocket upgrade request.
    pub headers: BTreeMap<String, String>,
    /// Payload of the `connection_init` message.
    pub connection_params: Value,
    /// Seconds allowed between dialing and `connection_ack`.
    pub connect_timeout_secs: u64,
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            websocket_endpoint: DEFAULT_WEBSOCKET_ENDPOINT.to_string(),
            title: DEFAULT_TITLE.to_string(),
            slot_id: DEFAULT_SLOT_ID,
            query: DEFAULT_QUERY.to_string(),
            operation_name: Some(DEFAULT_OPERATION_NAME.to_string()),
            variables: Value::Object(serde_json::Map::new()),
            root_field: DEFAULT_ROOT_FIELD.to_string(),
            headers: BTreeMap::new(),
            connection_params: Value::Object(serde_json::Map::new()),
            connect_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// The subscription this configuration binds sessions to.
    pub fn subscription_query(&self) -> SubscriptionQuery {
        let mut query = SubscriptionQuery::new(self.query.clone()).with_variables(self.variables.clone());
        query.operation_name.clone_from(&self.operation_name);
        query
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check that endpoints, title and query are usable.
    pub fn validate(&self) -> Result<()> {
        check_scheme(&self.websocket_endpoint, &["ws", "wss"], "websocket_endpoint")?;
        check_scheme(&self.graphql_endpoint, &["http", "https"], "graphql_endpoint")?;

        if self.title.trim().is_empty() {
            return Err(Error::Config("title must not be empty".to_string()));
        }
        if self.query.trim().is_empty() {
            return Err(Error::Config("query must not be empty".to_string()));
        }
        if self.root_field.trim().is_empty() {
            return Err(Error::Config("root_field must not be empty".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !self.variables.is_object() {
            return Err(Error::Config("variables must be a JSON object".to_string()));
        }
        if !self.connection_params.is_object() {
            return Err(Error::Config(
                "connection_params must be a JSON object".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_scheme(raw: &str, allowed: &[&str], field: &str) -> Result<()> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid {field} '{raw}': {e}")))?;
    if url.host_str().is_none() {
        return Err(Error::Config(format!("{field} must include a host")));
    }
    if !allowed.contains(&url.scheme()) {
        return Err(Error::Config(format!(
            "{field} must use one of {} (found '{}')",
            allowed.join("/"),
            url.scheme()
        )));
    }
    Ok(())
}

/// A settings file layer. Only the keys present in the file override.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    graphql_endpoint: Option<String>,
    websocket_endpoint: Option<String>,
    title: Option<String>,
    slot_id: Option<SlotId>,
    query: Option<String>,
    operation_name: Option<String>,
    variables: Option<Value>,
    root_field: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    connection_params: Option<Value>,
    connect_timeout_secs: Option<u64>,
    log_level: Option<String>,
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` is an additional settings file layered on top of the global
/// one. Unlike the global file it must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<RelayConfig> {
    let mut config = RelayConfig::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    if let Some(path) = explicit {
        let file = load_config_file(path)?;
        merge_config(&mut config, file);
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".pushrelay").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/pushrelay/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("pushrelay").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut RelayConfig, overlay: ConfigFile) {
    if let Some(v) = overlay.graphql_endpoint {
        base.graphql_endpoint = v;
    }
    if let Some(v) = overlay.websocket_endpoint {
        base.websocket_endpoint = v;
    }
    if let Some(v) = overlay.title {
        base.title = v;
    }
    if let Some(v) = overlay.slot_id {
        base.slot_id = v;
    }
    if let Some(v) = overlay.query {
        base.query = v;
    }
    if overlay.operation_name.is_some() {
        base.operation_name = overlay.operation_name;
    }
    if let Some(v) = overlay.variables {
        base.variables = v;
    }
    if let Some(v) = overlay.root_field {
        base.root_field = v;
    }
    // Headers accumulate across layers
    if let Some(headers) = overlay.headers {
        base.headers.extend(headers);
    }
    if let Some(v) = overlay.connection_params {
        base.connection_params = v;
    }
    if let Some(v) = overlay.connect_timeout_secs {
        base.connect_timeout_secs = v;
    }
    if let Some(v) = overlay.log_level {
        base.log_level = v;
    }
}

fn apply_env_overrides(config: &mut RelayConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply `PUSHRELAY_*` overrides using `lookup` as the variable source.
fn apply_overrides_from(config: &mut RelayConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("PUSHRELAY_GRAPHQL_ENDPOINT") {
        config.graphql_endpoint = val;
    }
    if let Some(val) = lookup("PUSHRELAY_WEBSOCKET_ENDPOINT") {
        config.websocket_endpoint = val;
    }
    if let Some(val) = lookup("PUSHRELAY_TITLE") {
        config.title = val;
    }
    if let Some(val) = lookup("PUSHRELAY_SLOT_ID") {
        match val.parse() {
            Ok(n) => config.slot_id = n,
            Err(e) => warn!(value = %val, error = %e, "Ignoring invalid PUSHRELAY_SLOT_ID"),
        }
    }
    if let Some(val) = lookup("PUSHRELAY_LOG_LEVEL") {
        config.log_level = val;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_point_at_hasura_backend() {
        let config = RelayConfig::default();
        assert_eq!(config.websocket_endpoint, DEFAULT_WEBSOCKET_ENDPOINT);
        assert_eq!(config.graphql_endpoint, DEFAULT_GRAPHQL_ENDPOINT);
        assert_eq!(config.slot_id, 1);
        assert!(config.headers.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn default_subscription_query() {
        let query = RelayConfig::default().subscription_query();
        assert_eq!(query, SubscriptionQuery::default());
    }

    #[test]
    fn file_layer_overrides_only_present_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "title": "Orders", "headers": { "x-hasura-role": "user" } }"#,
        )
        .unwrap();

        let mut config = RelayConfig::default();
        merge_config(&mut config, load_config_file(&path).unwrap());

        assert_eq!(config.title, "Orders");
        assert_eq!(config.headers.get("x-hasura-role").map(String::as_str), Some("user"));
        assert_eq!(config.websocket_endpoint, DEFAULT_WEBSOCKET_ENDPOINT);
        assert_eq!(config.slot_id, DEFAULT_SLOT_ID);
    }

    #[test]
    fn headers_accumulate_across_layers() {
        let mut config = RelayConfig::default();
        merge_config(
            &mut config,
            serde_json::from_value(json!({ "headers": { "a": "1" } })).unwrap(),
        );
        merge_config(
            &mut config,
            serde_json::from_value(json!({ "headers": { "b": "2" } })).unwrap(),
        );
        assert_eq!(config.headers.len(), 2);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "titel": "typo" }"#).unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("missing.json").as_path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PUSHRELAY_WEBSOCKET_ENDPOINT", "ws://localhost:8080/v1/graphql"),
            ("PUSHRELAY_TITLE", "Local"),
            ("PUSHRELAY_SLOT_ID", "7"),
        ]);
        let mut config = RelayConfig::default();
        apply_overrides_from(&mut config, |k| vars.get(k).map(ToString::to_string));

        assert_eq!(config.websocket_endpoint, "ws://localhost:8080/v1/graphql");
        assert_eq!(config.title, "Local");
        assert_eq!(config.slot_id, 7);
    }

    #[test]
    fn unparsable_slot_override_is_ignored() {
        let mut config = RelayConfig::default();
        apply_overrides_from(&mut config, |k| {
            (k == "PUSHRELAY_SLOT_ID").then(|| "seven".to_string())
        });
        assert_eq!(config.slot_id, DEFAULT_SLOT_ID);
    }

    #[test]
    fn validate_rejects_http_websocket_endpoint() {
        let config = RelayConfig {
            websocket_endpoint: "https://example.com/v1/graphql".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("websocket_endpoint"));
    }

    #[test]
    fn validate_rejects_ws_graphql_endpoint() {
        let config = RelayConfig {
            graphql_endpoint: "ws://example.com/v1/graphql".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_title_and_query() {
        let blank_title = RelayConfig {
            title: "  ".to_string(),
            ..Default::default()
        };
        let blank_query = RelayConfig {
            query: String::new(),
            ..Default::default()
        };
        assert!(blank_title.validate().is_err());
        assert!(blank_query.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_object_variables() {
        let config = RelayConfig {
            variables: json!([1, 2]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
