//! Config subcommand handlers.

use std::collections::BTreeMap;
use std::str::FromStr;

use dialoguer::{Input, Select};
use secrecy::SecretString;

use tagwatch_core::ReadingMode;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const VALID_KEYS: &str = "backend, api_token, api_token_env, ca_cert, insecure, timeout, \
     reader.preferred_device, reader.device_filters, reader.connect_attempts, \
     scan.reading_mode, scan.min_rssi, scan.epc_prefix, scan.poll_interval_ms, \
     scan.stall_threshold, scan.lookup_timeout_ms, scan.trigger_toggles_scan";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

/// Apply one `config set` assignment to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "backend" => profile.backend = Some(value),
        "api_token" | "api-token" => profile.api_token = Some(value),
        "api_token_env" | "api-token-env" => profile.api_token_env = Some(value),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "insecure" => profile.insecure = Some(parse_value(key, &value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_value(key, &value, "a number (seconds)")?),
        "reader.preferred_device" => profile.reader.preferred_device = Some(value),
        "reader.device_filters" => {
            profile.reader.device_filters = Some(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }
        "reader.connect_attempts" => {
            profile.reader.connect_attempts =
                Some(parse_value(key, &value, "a positive number")?);
        }
        "scan.reading_mode" => {
            let mode = ReadingMode::from_str(&value).map_err(|_| CliError::Validation {
                field: key.into(),
                reason: "must be one of a, b, c".into(),
            })?;
            profile.scan.reading_mode = Some(mode);
        }
        "scan.min_rssi" => profile.scan.min_rssi = Some(parse_value(key, &value, "dBm")?),
        "scan.epc_prefix" => profile.scan.epc_prefix = Some(value.to_uppercase()),
        "scan.poll_interval_ms" => {
            profile.scan.poll_interval_ms = Some(parse_value(key, &value, "milliseconds")?);
        }
        "scan.stall_threshold" => {
            profile.scan.stall_threshold = Some(parse_value(key, &value, "a number of polls")?);
        }
        "scan.lookup_timeout_ms" => {
            profile.scan.lookup_timeout_ms = Some(parse_value(key, &value, "milliseconds")?);
        }
        "scan.trigger_toggles_scan" => {
            profile.scan.trigger_toggles_scan =
                Some(parse_value(key, &value, "'true' or 'false'")?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {VALID_KEYS}"),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| format!("{c:#?}"),
                |_| "config".into(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_key(profile, &key, value)?;
            // Reject values the engine would refuse at scan time.
            profile.engine_config()?;

            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: tagwatch config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(config::profile_not_found(name, &cfg));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(config::profile_not_found(profile_name, &cfg));
            }

            let token = rpassword::prompt_password("API token: ").map_err(prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "api_token".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            config::store_api_token(&profile_name, &SecretString::from(token))?;
            eprintln!("✓ Token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

/// Interactive wizard that writes a fresh config file.
fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("tagwatch configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = Profile::default();

    let backend: String = Input::new()
        .with_prompt("Inventory backend URL (empty for the demo catalog)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    if !backend.trim().is_empty() {
        profile.backend = Some(backend.trim().to_owned());

        let token = rpassword::prompt_password("API token (empty for none): ").map_err(prompt_err)?;
        if !token.is_empty() {
            let store_choices = &[
                "Store in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let store_selection = Select::new()
                .with_prompt("Where to store the API token?")
                .items(store_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            if store_selection == 0 {
                config::store_api_token(&profile_name, &SecretString::from(token))?;
                eprintln!("   ✓ API token stored in system keyring");
            } else {
                profile.api_token = Some(token);
            }
        }
    }

    let mode_choices = &[
        "a: registered tags only",
        "b: all tags, with lookup",
        "c: all tags",
    ];
    let mode_selection = Select::new()
        .with_prompt("Reading mode")
        .items(mode_choices)
        .default(1)
        .interact()
        .map_err(prompt_err)?;
    profile.scan.reading_mode = Some(match mode_selection {
        0 => ReadingMode::OnlyRegistered,
        2 => ReadingMode::AllUnfiltered,
        _ => ReadingMode::AllWithLookup,
    });

    let device: String = Input::new()
        .with_prompt("Preferred reader name (empty for the first match)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    if !device.trim().is_empty() {
        profile.reader.preferred_device = Some(device.trim().to_owned());
    }

    profile.engine_config()?;

    let mut profiles = BTreeMap::new();
    profiles.insert(profile_name.clone(), profile);
    let cfg = Config {
        default_profile: Some(profile_name.clone()),
        defaults: tagwatch_config::Defaults::default(),
        profiles,
    };
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: tagwatch inventory --duration 2s");
    Ok(())
}
