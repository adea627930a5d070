// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::checks::CheckFailure;

/// One entry of the ticker, keyed by currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    #[serde(rename = "15m", default)]
    pub fifteen_min: Option<f64>,
    #[serde(default)]
    pub last: Option<f64>,
    #[serde(default)]
    pub buy: Option<f64>,
    pub sell: f64,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker {
    rates: BTreeMap<String, RateRecord>,
}

impl Ticker {
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).context("Failed to parse ticker response")
    }

    pub fn get(&self, currency: &str) -> Option<&RateRecord> {
        self.rates.get(currency)
    }

    /// Sell price of one BTC in `currency`.
    pub fn sell(&self, currency: &str) -> Result<f64, CheckFailure> {
        self.get(currency)
            .map(|r| r.sell)
            .ok_or_else(|| CheckFailure::MissingRate(currency.to_string()))
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RateRecord)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// BTC amount the conversion endpoint should answer for `amount`.
pub fn expected_btc(amount: f64, sell: f64) -> f64 {
    amount / sell
}
