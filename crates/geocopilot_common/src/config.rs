//! Configuration for the GeoCopilot service.
//!
//! A JSON document supplies prompt rules, default user prompts and the
//! `USE_ORS` flag; environment variables override service endpoints and
//! routing settings. Loading never fails: anything missing or malformed
//! falls back to defaults (empty rules, keyless routing).

use crate::prompts::{DefaultUserPrompts, PromptRuleSet};
use crate::types::{RouteProvider, DEFAULT_RADIUS_M};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file used when neither `--config` nor `CONFIG_FILE` is given
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Slack on top of the summed upstream timeouts
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 30;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";
const DEFAULT_ORS_URL: &str = "https://api.openrouteservice.org";
const DEFAULT_USER_AGENT: &str = "geo-copilot/1.0";

/// Generation backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Ask for the four-field JSON narrative instead of free text
    pub schema_mode: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout_secs: 120,
            schema_mode: true,
        }
    }
}

/// Geocoding and POI lookup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub nominatim_url: String,
    pub overpass_url: String,
    pub user_agent: String,
    pub geocode_timeout_secs: u64,
    pub poi_timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            geocode_timeout_secs: 20,
            poi_timeout_secs: 30,
        }
    }
}

/// Routing provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Provider asked first; ORS only takes effect with an API key
    pub preferred: RouteProvider,
    pub ors_api_key: Option<String>,
    pub osrm_url: String,
    pub ors_url: String,
    pub osrm_timeout_secs: u64,
    pub ors_timeout_secs: u64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            preferred: RouteProvider::Osrm,
            ors_api_key: None,
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            ors_url: DEFAULT_ORS_URL.to_string(),
            osrm_timeout_secs: 20,
            ors_timeout_secs: 30,
        }
    }
}

impl RoutingSettings {
    /// API key if one is configured and non-blank
    pub fn ors_key(&self) -> Option<&str> {
        self.ors_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Provider tried first once the missing-key fallback is applied
    pub fn effective_provider(&self) -> RouteProvider {
        match self.preferred {
            RouteProvider::Ors if self.ors_key().is_some() => RouteProvider::Ors,
            _ => RouteProvider::Osrm,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full service configuration, immutable after load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmSettings,
    pub services: ServiceSettings,
    pub routing: RoutingSettings,
    pub server: ServerSettings,
    pub default_radius_m: u32,
    pub prompts: PromptRuleSet,
    pub default_user_prompts: DefaultUserPrompts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            services: ServiceSettings::default(),
            routing: RoutingSettings::default(),
            server: ServerSettings::default(),
            default_radius_m: DEFAULT_RADIUS_M,
            prompts: PromptRuleSet::default(),
            default_user_prompts: DefaultUserPrompts::default(),
        }
    }
}

/// Shape of the JSON config document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(rename = "USE_ORS", default)]
    pub use_ors: Option<Value>,
    #[serde(default)]
    pub prompts: PromptRuleSet,
    #[serde(default)]
    pub default_user_prompts: DefaultUserPrompts,
}

impl ConfigFile {
    /// Parse a config document. Errors are returned so the caller can log them.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Read from disk, falling back to an empty document on any problem
    pub fn read(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Cannot read config {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };
        match Self::parse(&content) {
            Ok(file) => {
                info!("Loaded config from {}", path.display());
                file
            }
            Err(e) => {
                warn!("Malformed config {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// `None` when the document leaves the routing choice open
    fn use_ors(&self) -> Option<bool> {
        match &self.use_ors {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::Number(n)) => Some(n.as_f64().map(|n| n != 0.0).unwrap_or(false)),
            Some(Value::String(s)) => Some(parse_flag(s).unwrap_or(false)),
            Some(_) => Some(false),
        }
    }
}

/// Digits (non-zero is true) or a case-insensitive true/false
pub fn parse_flag(raw: &str) -> Option<bool> {
    let v = raw.trim();
    if !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()) {
        return Some(!v.trim_start_matches('0').is_empty());
    }
    match v.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load from the given file (or `CONFIG_FILE`) with process env overrides
    pub fn load(path: Option<&Path>) -> Self {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env("CONFIG_FILE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::from_parts(ConfigFile::read(&path), env)
    }

    /// Bound on one HTTP request: every upstream stage may run to its own timeout
    pub fn request_timeout_secs(&self) -> u64 {
        let geocode = self.services.geocode_timeout_secs;
        // endpoints, both routers, POIs, via lookups, generation
        [
            geocode,
            self.routing.ors_timeout_secs,
            self.routing.osrm_timeout_secs,
            self.services.poi_timeout_secs,
            geocode,
            self.llm.timeout_secs,
            REQUEST_TIMEOUT_MARGIN_SECS,
        ]
        .iter()
        .fold(0u64, |acc, secs| acc.saturating_add(*secs))
    }

    /// Merge a parsed document and environment overrides onto defaults
    pub fn from_parts<F>(file: ConfigFile, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config {
            prompts: file.prompts.clone(),
            default_user_prompts: file.default_user_prompts.clone(),
            ..Config::default()
        };
        let mut explicit_router = false;
        if let Some(use_ors) = file.use_ors() {
            explicit_router = true;
            if use_ors {
                config.routing.preferred = RouteProvider::Ors;
            }
        }

        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = var("OLLAMA_URL") {
            config.llm.base_url = v;
        }
        if let Some(v) = var("LLM_MODEL") {
            config.llm.model = v;
        }
        if let Some(v) = var("SCHEMA_MODE") {
            match parse_flag(&v) {
                Some(b) => config.llm.schema_mode = b,
                None => warn!("Ignoring SCHEMA_MODE={:?}: expected true/false", v),
            }
        }
        if let Some(v) = var("NOMINATIM_URL") {
            config.services.nominatim_url = v;
        }
        if let Some(v) = var("OVERPASS_URL") {
            config.services.overpass_url = v;
        }
        if let Some(v) = var("HTTP_USER_AGENT") {
            config.services.user_agent = v;
        }
        if let Some(v) = var("OSRM_URL") {
            config.routing.osrm_url = v;
        }
        if let Some(v) = var("ORS_URL") {
            config.routing.ors_url = v;
        }
        if let Some(v) = var("USE_ORS") {
            match parse_flag(&v) {
                Some(use_ors) => {
                    explicit_router = true;
                    config.routing.preferred = if use_ors {
                        RouteProvider::Ors
                    } else {
                        RouteProvider::Osrm
                    };
                }
                None => warn!("Ignoring USE_ORS={:?}: expected digits or true/false", v),
            }
        }
        if let Some(v) = var("ROUTER") {
            match v.to_ascii_lowercase().as_str() {
                "ors" => {
                    explicit_router = true;
                    config.routing.preferred = RouteProvider::Ors;
                }
                "osrm" => {
                    explicit_router = true;
                    config.routing.preferred = RouteProvider::Osrm;
                }
                other => warn!("Ignoring ROUTER={:?}: expected osrm or ors", other),
            }
        }
        config.routing.ors_api_key = var("ORS_API_KEY");
        // A key alone selects ORS unless the file or env named a router
        if !explicit_router && config.routing.ors_key().is_some() {
            config.routing.preferred = RouteProvider::Ors;
        }
        if let Some(v) = var("DEFAULT_RADIUS_M") {
            match v.parse::<u32>() {
                Ok(r) if r > 0 => config.default_radius_m = r,
                _ => warn!("Ignoring DEFAULT_RADIUS_M={:?}: expected a positive integer", v),
            }
        }
        if let Some(v) = var("GEOCOPILOT_HOST") {
            config.server.host = v;
        }
        if let Some(v) = var("GEOCOPILOT_PORT") {
            match v.parse::<u16>() {
                Ok(p) => config.server.port = p,
                Err(_) => warn!("Ignoring GEOCOPILOT_PORT={:?}", v),
            }
        }

        if config.routing.preferred == RouteProvider::Ors && config.routing.ors_key().is_none() {
            warn!("ORS routing requested but ORS_API_KEY is not set, falling back to OSRM");
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_parts(ConfigFile::default(), env_from(&[]));
        assert_eq!(config.default_radius_m, 3000);
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.routing.effective_provider(), RouteProvider::Osrm);
        assert!(config.prompts.base.is_empty());
        assert!(config.llm.schema_mode);
    }

    #[test]
    fn test_parse_document() {
        let file = ConfigFile::parse(
            r#"{
                "USE_ORS": 1,
                "prompts": {"base": ["b1", "b2"], "chat": ["c1"], "route": ["r1"]},
                "default_user_prompts": {"chat": "What is nearby?", "route": "Plan my drive"}
            }"#,
        )
        .unwrap();
        let config = Config::from_parts(file, env_from(&[("ORS_API_KEY", "secret")]));
        assert_eq!(config.prompts.base, vec!["b1", "b2"]);
        assert_eq!(config.prompts.route, vec!["r1"]);
        assert_eq!(
            config.default_user_prompts.route.as_deref(),
            Some("Plan my drive")
        );
        assert_eq!(config.routing.effective_provider(), RouteProvider::Ors);
    }

    #[test]
    fn test_shipped_config_parses() {
        let file = ConfigFile::parse(include_str!("../../../config/config.json")).unwrap();
        let config = Config::from_parts(file, env_from(&[]));
        assert!(!config.prompts.base.is_empty());
        assert!(config.default_user_prompts.chat.is_some());
        assert_eq!(config.routing.preferred, RouteProvider::Osrm);
    }

    #[test]
    fn test_ors_without_key_falls_back() {
        let file = ConfigFile::parse(r#"{"USE_ORS": true}"#).unwrap();
        let config = Config::from_parts(file, env_from(&[("ORS_API_KEY", "  ")]));
        assert_eq!(config.routing.preferred, RouteProvider::Ors);
        assert_eq!(config.routing.effective_provider(), RouteProvider::Osrm);
    }

    #[test]
    fn test_ors_key_alone_prefers_ors() {
        let config = Config::from_parts(ConfigFile::default(), env_from(&[("ORS_API_KEY", "k")]));
        assert_eq!(config.routing.preferred, RouteProvider::Ors);
        assert_eq!(config.routing.effective_provider(), RouteProvider::Ors);

        let file = ConfigFile::parse(r#"{"USE_ORS": null}"#).unwrap();
        let config = Config::from_parts(file, env_from(&[("ORS_API_KEY", "k")]));
        assert_eq!(config.routing.effective_provider(), RouteProvider::Ors);
    }

    #[test]
    fn test_explicit_osrm_beats_ors_key() {
        let file = ConfigFile::parse(r#"{"USE_ORS": 0}"#).unwrap();
        let config = Config::from_parts(file, env_from(&[("ORS_API_KEY", "k")]));
        assert_eq!(config.routing.effective_provider(), RouteProvider::Osrm);

        let config = Config::from_parts(
            ConfigFile::default(),
            env_from(&[("ORS_API_KEY", "k"), ("ROUTER", "osrm")]),
        );
        assert_eq!(config.routing.effective_provider(), RouteProvider::Osrm);

        let config = Config::from_parts(
            ConfigFile::default(),
            env_from(&[("ORS_API_KEY", "k"), ("USE_ORS", "false")]),
        );
        assert_eq!(config.routing.effective_provider(), RouteProvider::Osrm);

        // An unparseable router leaves the choice open
        let config = Config::from_parts(
            ConfigFile::default(),
            env_from(&[("ORS_API_KEY", "k"), ("ROUTER", "here")]),
        );
        assert_eq!(config.routing.effective_provider(), RouteProvider::Ors);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile::parse(r#"{"USE_ORS": 1}"#).unwrap();
        let config = Config::from_parts(
            file,
            env_from(&[
                ("ROUTER", "osrm"),
                ("LLM_MODEL", "qwen2.5:7b"),
                ("DEFAULT_RADIUS_M", "1500"),
                ("HTTP_USER_AGENT", "test-agent/0.1"),
                ("SCHEMA_MODE", "false"),
            ]),
        );
        assert_eq!(config.routing.preferred, RouteProvider::Osrm);
        assert_eq!(config.llm.model, "qwen2.5:7b");
        assert_eq!(config.default_radius_m, 1500);
        assert_eq!(config.services.user_agent, "test-agent/0.1");
        assert!(!config.llm.schema_mode);
    }

    #[test]
    fn test_bad_env_values_keep_defaults() {
        let config = Config::from_parts(
            ConfigFile::default(),
            env_from(&[("DEFAULT_RADIUS_M", "0"), ("GEOCOPILOT_PORT", "http"), ("ROUTER", "here")]),
        );
        assert_eq!(config.default_radius_m, 3000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.routing.preferred, RouteProvider::Osrm);
    }

    #[test]
    fn test_request_timeout_covers_upstreams() {
        let mut config = Config::default();
        assert_eq!(config.request_timeout_secs(), 270);

        config.llm.timeout_secs = 600;
        assert_eq!(config.request_timeout_secs(), 750);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("000"), Some(false));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("yes"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load_with(Some(path.as_path()), env_from(&[]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"USE_ORS\": 1, \"prompts\": {{\"base\": \"not a list\"").unwrap();
        let config = Config::load_with(Some(file.path()), env_from(&[]));
        assert!(config.prompts.base.is_empty());
        assert_eq!(config.routing.preferred, RouteProvider::Osrm);
    }

    #[test]
    fn test_config_file_from_env_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"prompts": {{"chat": ["Be brief."]}}}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();
        let config = Config::load_with(None, env_from(&[("CONFIG_FILE", path.as_str())]));
        assert_eq!(config.prompts.rules_for(crate::prompts::EngineKind::Chat), vec!["Be brief."]);
    }
}
