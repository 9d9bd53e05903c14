//! Shared configuration for qlik-embed tools.
//!
//! TOML profiles merged with `QLIK_EMBED_` environment variables, and
//! translation of a profile to `qlik_embed_core::EmbedConfig`. The CLI adds
//! flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use qlik_embed_core::{AuthSettings, CoreError, EmbedConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error(transparent)]
    Embed(#[from] CoreError),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named embed profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "plain".into()
}
fn default_timeout() -> u64 {
    30
}

/// Object ids as written in the file: a TOML list or one comma-separated
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ObjectIds {
    List(Vec<String>),
    Csv(String),
}

impl Default for ObjectIds {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ObjectIds {
    /// Trimmed ids in order, empties dropped.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::List(ids) => clean_ids(ids.iter().map(String::as_str)),
            Self::Csv(raw) => parse_object_ids(raw),
        }
    }
}

/// Split a comma-separated id list.
pub fn parse_object_ids(raw: &str) -> Vec<String> {
    clean_ids(raw.split(','))
}

fn clean_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    ids.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// A named embed profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Tenant host, e.g. "acme.eu.qlikcloud.com". Scheme optional.
    pub host: String,

    pub web_integration_id: Option<String>,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub object_ids: ObjectIds,

    /// Engine identity segment.
    pub identity: Option<String>,

    /// "web-integration" (default) or "oauth2".
    #[serde(default = "default_auth_type")]
    pub auth_type: String,

    pub client_id: Option<String>,

    pub redirect_uri: Option<String>,

    pub token_exchange_url: Option<String>,

    /// Where the tenant login returns to. Defaults to the tenant root.
    pub return_to: Option<String>,

    pub schema_url: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

fn default_auth_type() -> String {
    "web-integration".into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "qlik-embed", "qlik-embed")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Path of the persisted key-value store (redirect guard, cached tokens).
pub fn store_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("store.json"),
        |dirs| dirs.data_dir().join("store.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("qlik-embed");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, still merging the environment.
///
/// Nested keys use a double underscore:
/// `QLIK_EMBED_PROFILES__DEFAULT__APP_ID`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("QLIK_EMBED_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile translation ─────────────────────────────────────────────

impl Config {
    /// The named profile, or the default one when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

/// Turn a host as users type it into a tenant root URL.
///
/// Accepts a bare host, a host with a trailing slash, or a full URL;
/// a missing scheme means `https`. Any path is dropped.
pub fn normalize_tenant(host: &str) -> Result<Url, ConfigError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(invalid("host", "tenant host is required"));
    }
    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    let mut url =
        Url::parse(&candidate).map_err(|e| invalid("host", format!("{candidate}: {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("host", format!("no host in {candidate}")));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Map a profile's `auth_type` and OAuth2 fields to [`AuthSettings`].
pub fn resolve_auth(profile: &Profile) -> Result<AuthSettings, ConfigError> {
    match profile.auth_type.as_str() {
        "web-integration" | "web_integration" => Ok(AuthSettings::WebIntegration),
        "oauth2" => {
            let token_exchange_url = profile
                .token_exchange_url
                .as_deref()
                .map(|u| parse_url("token_exchange_url", u))
                .transpose()?;
            Ok(AuthSettings::OAuth2 {
                client_id: profile.client_id.clone().unwrap_or_default(),
                redirect_uri: profile.redirect_uri.clone(),
                token_exchange_url,
            })
        }
        other => Err(invalid(
            "auth_type",
            format!("expected 'web-integration' or 'oauth2', got '{other}'"),
        )),
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| invalid(field, format!("{raw}: {e}")))
}

/// Build a validated [`EmbedConfig`] from a profile, no CLI overrides.
pub fn profile_to_embed_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<EmbedConfig, ConfigError> {
    let tenant = normalize_tenant(&profile.host)?;
    let auth = resolve_auth(profile)?;

    let mut config = EmbedConfig::new(
        tenant.clone(),
        profile.app_id.trim(),
        profile.object_ids.to_vec(),
        auth,
    )?;
    config.web_integration_id = profile
        .web_integration_id
        .clone()
        .filter(|id| !id.trim().is_empty());
    config.identity = profile.identity.clone().filter(|i| !i.is_empty());
    if let Some(ref return_to) = profile.return_to {
        config.return_to = parse_url("return_to", return_to)?;
    }
    if let Some(ref schema_url) = profile.schema_url {
        config.schema_url = parse_url("schema_url", schema_url)?;
    }

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(toml: &str) -> Config {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap()
    }

    const SAMPLE: &str = r#"
        default_profile = "sales"

        [defaults]
        timeout = 10

        [profiles.sales]
        host = "acme.eu.qlikcloud.com/"
        web_integration_id = "wid-1"
        app_id = "app-1"
        object_ids = "htaMkv, , PXbmM"

        [profiles.portal]
        host = "https://acme.eu.qlikcloud.com"
        auth_type = "oauth2"
        client_id = "client-1"
        app_id = "app-2"
        object_ids = ["a", " b "]
        return_to = "https://portal.example.com/s/dashboard"
        insecure = true
    "#;

    #[test]
    fn object_ids_accept_list_or_csv() {
        let cfg = parse(SAMPLE);
        let (_, sales) = cfg.profile(None).unwrap();
        assert_eq!(sales.object_ids.to_vec(), vec!["htaMkv", "PXbmM"]);
        let (_, portal) = cfg.profile(Some("portal")).unwrap();
        assert_eq!(portal.object_ids.to_vec(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_profile_is_reported() {
        let err = parse(SAMPLE).profile(Some("nope")).unwrap_err();
        assert_eq!(err.to_string(), "profile 'nope' not found");
    }

    #[test]
    fn tenant_host_forms_normalize_to_one_url() {
        for host in [
            "acme.eu.qlikcloud.com",
            "acme.eu.qlikcloud.com/",
            "https://acme.eu.qlikcloud.com",
            "https://acme.eu.qlikcloud.com/some/path",
        ] {
            assert_eq!(
                normalize_tenant(host).unwrap().as_str(),
                "https://acme.eu.qlikcloud.com/",
                "{host}"
            );
        }
        assert_eq!(
            normalize_tenant("http://127.0.0.1:4848").unwrap().as_str(),
            "http://127.0.0.1:4848/"
        );
        assert!(normalize_tenant("  ").is_err());
    }

    #[test]
    fn web_integration_profile_translates() {
        let cfg = parse(SAMPLE);
        let (_, profile) = cfg.profile(None).unwrap();
        let embed = profile_to_embed_config(profile, &cfg.defaults).unwrap();

        assert_eq!(embed.tenant.as_str(), "https://acme.eu.qlikcloud.com/");
        assert_eq!(embed.auth, AuthSettings::WebIntegration);
        assert_eq!(embed.web_integration_id.as_deref(), Some("wid-1"));
        assert_eq!(embed.timeout, Duration::from_secs(10));
        assert_eq!(embed.tls, TlsVerification::SystemDefaults);
        assert_eq!(embed.return_to, embed.tenant);
    }

    #[test]
    fn oauth2_profile_derives_redirect_uri() {
        let cfg = parse(SAMPLE);
        let (_, profile) = cfg.profile(Some("portal")).unwrap();
        let embed = profile_to_embed_config(profile, &cfg.defaults).unwrap();

        assert_eq!(embed.auth.mode(), qlik_embed_core::AuthMode::OAuth2);
        assert_eq!(
            embed.redirect_uri().as_deref(),
            Some("https://portal.example.com/s/oauth-callback")
        );
        assert_eq!(embed.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn missing_identifiers_surface_core_validation() {
        let profile = Profile {
            host: "acme.eu.qlikcloud.com".into(),
            auth_type: default_auth_type(),
            app_id: "app".into(),
            object_ids: ObjectIds::Csv("x".into()),
            ..Profile::default()
        };
        let err = profile_to_embed_config(&profile, &Defaults::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Web integration ID is required for web-integration identity"
        );
    }

    #[test]
    fn unknown_auth_type_is_rejected() {
        let profile = Profile {
            host: "h".into(),
            auth_type: "saml".into(),
            ..Profile::default()
        };
        assert!(matches!(
            resolve_auth(&profile),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                host: "acme.eu.qlikcloud.com".into(),
                auth_type: default_auth_type(),
                web_integration_id: Some("wid".into()),
                app_id: "app".into(),
                object_ids: ObjectIds::List(vec!["a".into(), "b".into()]),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (name, profile) = loaded.profile(None).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile.object_ids.to_vec(), vec!["a", "b"]);
        assert_eq!(profile.web_integration_id.as_deref(), Some("wid"));
    }
}
