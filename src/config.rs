// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, fs};

use crate::models::{classify_value, ExpectedError, ValueClass, SUPPORTED_CURRENCIES};
use crate::tolerance::Tolerance;

pub const CONFIG_PATH_ENV: &str = "TOBTC_CONFIG";
pub const BASE_URL_ENV: &str = "TOBTC_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub contract: ContractConfig,
    pub messages: ErrorMessages,
    pub tolerance: ToleranceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub ticker_path: String,
    pub tobtc_path: String,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://blockchain.info".to_string(),
            ticker_path: "/ticker".to_string(),
            tobtc_path: "/tobtc".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ApiConfig {
    pub fn ticker_url(&self) -> String {
        join_url(&self.base_url, &self.ticker_path)
    }

    pub fn tobtc_url(&self) -> String {
        join_url(&self.base_url, &self.tobtc_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Exactly the key set the ticker must advertise.
    pub currencies: Vec<String>,
    pub default_currency: String,
    pub default_amount: String,
    pub content_type: String,
    pub max_response_time_ms: u64,
    pub max_value_digits: usize,
    pub unsupported_currencies: Vec<String>,
    pub invalid_values: Vec<String>,
    /// Sent together as the request where both parameters are invalid.
    pub both_invalid_currency: String,
    pub both_invalid_value: String,
    /// Value sent when the currency parameter is left out.
    pub missing_currency_value: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            currencies: SUPPORTED_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            default_currency: "AUD".to_string(),
            default_amount: "20000".to_string(),
            content_type: "application/json;charset=UTF-8".to_string(),
            max_response_time_ms: 3000,
            max_value_digits: 49,
            unsupported_currencies: vec!["XXX".to_string(), "ZZZ".to_string(), "X".to_string()],
            invalid_values: vec!["X".to_string(), "abc".to_string(), "twenty".to_string()],
            both_invalid_currency: "X".to_string(),
            both_invalid_value: "X".to_string(),
            missing_currency_value: "500".to_string(),
        }
    }
}

/// Literal error bodies returned by the conversion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorMessages {
    pub unsupported_symbol: String,
    pub invalid_value: String,
    pub missing_value: String,
    pub missing_currency: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            unsupported_symbol: "Parameter <currency> with unsupported symbol".to_string(),
            invalid_value: "Parameter <value> with invalid numerical value".to_string(),
            missing_value: "Parameter <value> is missing".to_string(),
            missing_currency: "Parameter <currency> is missing".to_string(),
        }
    }
}

impl ErrorMessages {
    pub fn text_for(&self, error: ExpectedError) -> &str {
        match error {
            ExpectedError::MissingCurrency => &self.missing_currency,
            ExpectedError::UnsupportedSymbol => &self.unsupported_symbol,
            ExpectedError::MissingValue => &self.missing_value,
            ExpectedError::InvalidValue => &self.invalid_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub conversion: Tolerance,
    pub near_overflow: Tolerance,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            conversion: Tolerance::Absolute(0.01),
            near_overflow: Tolerance::Relative(0.01),
        }
    }
}

impl Config {
    /// Loads the configuration once for the whole run.
    ///
    /// An explicit path must exist. Without one, `TOBTC_CONFIG` or the
    /// crate's `config.toml` is used when present, otherwise the built-in
    /// defaults. `TOBTC_BASE_URL` overrides the API base URL.
    pub fn load(explicit: Option<&Path>) -> Result<Arc<Config>> {
        let mut config = match explicit {
            Some(path) => load_config_from(path)?,
            None => {
                let path = get_config_path();
                if path.exists() {
                    load_config_from(&path)?
                } else {
                    tracing::debug!("no config at {}, using defaults", path.display());
                    Config::default()
                }
            }
        };
        config.apply_overrides(env::var(BASE_URL_ENV).ok());
        config.validate()?;
        Ok(Arc::new(config))
    }

    pub fn apply_overrides(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            tracing::info!("using base url {} from {}", url, BASE_URL_ENV);
            self.api.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let contract = &self.contract;
        if contract.currencies.is_empty() {
            anyhow::bail!("contract.currencies must not be empty");
        }
        if !contract.currencies.contains(&contract.default_currency) {
            anyhow::bail!(
                "default currency {} is not in contract.currencies",
                contract.default_currency
            );
        }
        if contract.max_value_digits == 0 {
            anyhow::bail!("contract.max_value_digits must be positive");
        }
        if contract.unsupported_currencies.is_empty() {
            anyhow::bail!("contract.unsupported_currencies must not be empty");
        }
        if contract.invalid_values.is_empty() {
            anyhow::bail!("contract.invalid_values must not be empty");
        }
        if let Some(code) = contract
            .unsupported_currencies
            .iter()
            .chain(Some(&contract.both_invalid_currency))
            .find(|c| contract.currencies.contains(c))
        {
            anyhow::bail!("unsupported sample {} is a supported currency", code);
        }
        let non_numeric =
            |v: &str| classify_value(v, contract.max_value_digits) == ValueClass::NonNumeric;
        if let Some(value) = contract
            .invalid_values
            .iter()
            .chain(Some(&contract.both_invalid_value))
            .find(|v| !non_numeric(v.as_str()))
        {
            anyhow::bail!("invalid sample {:?} is not a non-numeric value", value);
        }
        for (name, tolerance) in [
            ("conversion", self.tolerance.conversion),
            ("near_overflow", self.tolerance.near_overflow),
        ] {
            if !tolerance.is_valid() {
                anyhow::bail!("tolerance.{} must be a positive number, got {:?}", name, tolerance);
            }
        }
        Ok(())
    }
}

pub fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("config.toml");
    path
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: Config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let config_str = toml::to_string_pretty(config)?;
    fs::write(path, config_str)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    Ok(())
}
