//! CLI configuration: thin wrapper around `qlik_embed_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--tenant,
//! --app, --objects, ...) on top of the profile values.

use std::path::PathBuf;
use std::time::Duration;

use qlik_embed_core::{EmbedConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use qlik_embed_config::{
    Config, ObjectIds, Profile, config_path, load_config_or_default, normalize_tenant,
    profile_to_embed_config, store_path,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Store file: flag, else the platform data dir.
pub fn resolve_store_path(global: &GlobalOpts) -> PathBuf {
    global.store.clone().unwrap_or_else(store_path)
}

/// Tenant root from --tenant or the active profile, without requiring
/// the app and object ids.
pub fn resolve_tenant(global: &GlobalOpts) -> Result<url::Url, CliError> {
    if let Some(ref tenant) = global.tenant {
        return Ok(normalize_tenant(tenant)?);
    }
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let profile = cfg
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
    Ok(normalize_tenant(&profile.host)?)
}

/// Build an `EmbedConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile the flags alone must name the tenant.
pub fn resolve_embed_config(global: &GlobalOpts) -> Result<EmbedConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let base = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            if global.tenant.is_none() {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
            Profile {
                auth_type: "web-integration".into(),
                ..Profile::default()
            }
        }
    };

    let profile = apply_overrides(base, global);
    let mut embed = profile_to_embed_config(&profile, &cfg.defaults)?;

    if global.insecure {
        embed.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        embed.timeout = Duration::from_secs(secs);
    }
    Ok(embed)
}

/// Flags take priority over profile values.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref tenant) = global.tenant {
        profile.host.clone_from(tenant);
    }
    if let Some(ref id) = global.web_integration_id {
        profile.web_integration_id = Some(id.clone());
    }
    if let Some(ref app) = global.app {
        profile.app_id.clone_from(app);
    }
    if let Some(ref objects) = global.objects {
        profile.object_ids = ObjectIds::Csv(objects.clone());
    }
    if let Some(ref identity) = global.identity {
        profile.identity = Some(identity.clone());
    }
    if let Some(auth_type) = global.auth_type {
        profile.auth_type = auth_type.as_profile_value().into();
    }
    if let Some(ref client_id) = global.client_id {
        profile.client_id = Some(client_id.clone());
    }
    profile
}
