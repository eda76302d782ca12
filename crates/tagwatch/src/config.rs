//! CLI configuration: thin wrapper around `tagwatch_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--backend, --api-token, etc.).

use secrecy::SecretString;

use tagwatch_config::Backend;
use tagwatch_core::EngineConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use tagwatch_config::{
    Config, Profile, config_path, load_config_or_default, save_config, store_api_token,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile. A profile named with `--profile` must exist; the
/// implicit default may be absent, in which case built-in defaults apply.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    if let Some(profile) = config.profiles.get(&name) {
        return Ok((name, profile.clone()));
    }
    if global.profile.is_some() {
        return Err(profile_not_found(name, config));
    }
    Ok((name, Profile::default()))
}

pub fn profile_not_found(name: String, config: &Config) -> CliError {
    let available: Vec<_> = config.profiles.keys().cloned().collect();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Resolve the backend endpoint with CLI flag overrides applied.
///
/// Flags take priority over profile values; `None` means the built-in
/// demo catalog.
pub fn resolve_backend(
    global: &GlobalOpts,
    config: &Config,
    profile_name: &str,
    profile: &Profile,
) -> Result<Option<Backend>, CliError> {
    let mut profile = profile.clone();
    if let Some(ref url) = global.backend {
        profile.backend = Some(url.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }

    let mut backend = profile.backend(profile_name, &config.defaults)?;
    if let (Some(backend), Some(token)) = (backend.as_mut(), global.api_token.as_ref()) {
        backend.transport.api_token = Some(SecretString::from(token.clone()));
    }
    Ok(backend)
}

/// Engine configuration from the profile plus `--device`.
pub fn resolve_engine_config(
    global: &GlobalOpts,
    profile: &Profile,
) -> Result<EngineConfig, CliError> {
    let mut engine = profile.engine_config()?;
    if let Some(ref device) = global.device {
        engine.preferred_device = Some(device.clone());
    }
    Ok(engine)
}
