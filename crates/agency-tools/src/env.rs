//! Credential and flag plumbing for the external market-data tool.
//!
//! Omitting a flag never enables live trading: testnet defaults on and
//! trading defaults off.

use std::collections::BTreeMap;

pub const API_KEY_VAR: &str = "BYBIT_API_KEY";
pub const API_SECRET_VAR: &str = "BYBIT_API_SECRET";
pub const TESTNET_VAR: &str = "BYBIT_TESTNET";
pub const TRADING_ENABLED_VAR: &str = "BYBIT_TRADING_ENABLED";

/// Read an environment variable, treating unset and all-whitespace as absent.
pub fn get_env_var(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Build the environment handed to the external tool process from the
/// current process environment.
pub fn build_external_credentials() -> BTreeMap<String, String> {
    build_external_credentials_from(get_env_var)
}

/// Same as [`build_external_credentials`] with an explicit variable lookup.
pub fn build_external_credentials_from<F>(lookup: F) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| non_blank(lookup(name));
    let mut env = BTreeMap::new();

    if let Some(key) = get(API_KEY_VAR) {
        env.insert(API_KEY_VAR.to_string(), key);
    }
    if let Some(secret) = get(API_SECRET_VAR) {
        env.insert(API_SECRET_VAR.to_string(), secret);
    }

    env.insert(
        TESTNET_VAR.to_string(),
        get(TESTNET_VAR).unwrap_or_else(|| "true".to_string()),
    );
    env.insert(
        TRADING_ENABLED_VAR.to_string(),
        get(TRADING_ENABLED_VAR).unwrap_or_else(|| "false".to_string()),
    );

    env
}

/// True when both halves of the credential pair are present.
pub fn has_credentials(env: &BTreeMap<String, String>) -> bool {
    env.contains_key(API_KEY_VAR) && env.contains_key(API_SECRET_VAR)
}
