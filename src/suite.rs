// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use clap::ValueEnum;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::api::ExchangeApi;
use crate::checks::{self, expect_digit_count};
use crate::config::Config;
use crate::models::{ConversionRequest, ExpectedError};
use crate::tolerance::Tolerance;
use crate::utils::repeat_digit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Group {
    Smoke,
    Currencies,
    Converting,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Group::Smoke => "Smoke",
            Group::Currencies => "Currencies",
            Group::Converting => "Converting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    TickerSmoke,
    CurrencySet,
    TickerIdempotence,
    DefaultConversion,
    AllCurrencyConversion,
    UnsupportedCurrency,
    InvalidValue,
    BothInvalid,
    OutOfRangeValue,
    NearOutOfRangeValue,
    MissingValue,
    MissingCurrency,
}

impl Scenario {
    pub const ALL: [Scenario; 12] = [
        Scenario::TickerSmoke,
        Scenario::CurrencySet,
        Scenario::TickerIdempotence,
        Scenario::DefaultConversion,
        Scenario::AllCurrencyConversion,
        Scenario::UnsupportedCurrency,
        Scenario::InvalidValue,
        Scenario::BothInvalid,
        Scenario::OutOfRangeValue,
        Scenario::NearOutOfRangeValue,
        Scenario::MissingValue,
        Scenario::MissingCurrency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::TickerSmoke => "ticker_smoke",
            Scenario::CurrencySet => "currency_set",
            Scenario::TickerIdempotence => "ticker_idempotence",
            Scenario::DefaultConversion => "default_conversion",
            Scenario::AllCurrencyConversion => "all_currency_conversion",
            Scenario::UnsupportedCurrency => "unsupported_currency",
            Scenario::InvalidValue => "invalid_value",
            Scenario::BothInvalid => "both_invalid",
            Scenario::OutOfRangeValue => "out_of_range_value",
            Scenario::NearOutOfRangeValue => "near_out_of_range_value",
            Scenario::MissingValue => "missing_value",
            Scenario::MissingCurrency => "missing_currency",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::TickerSmoke => "Verify HTTP status 200",
            Scenario::CurrencySet => "Verify if all available currencies are present",
            Scenario::TickerIdempotence => "Verify repeated ticker fetches list the same currencies",
            Scenario::DefaultConversion => "Verify default currency converting",
            Scenario::AllCurrencyConversion => "Verify all currency converting",
            Scenario::UnsupportedCurrency => "Verify error message for unsupported currency parameter",
            Scenario::InvalidValue => "Verify error message for unsupported amount parameter",
            Scenario::BothInvalid => "Verify error message for both unsupported parameters",
            Scenario::OutOfRangeValue => "Verify error message for out of range value parameter",
            Scenario::NearOutOfRangeValue => "Verify result for almost out of range value parameter",
            Scenario::MissingValue => "Verify error message for missing value parameter",
            Scenario::MissingCurrency => "Verify error message for missing currency parameter",
        }
    }

    pub fn group(&self) -> Group {
        match self {
            Scenario::TickerSmoke => Group::Smoke,
            Scenario::CurrencySet | Scenario::TickerIdempotence => Group::Currencies,
            _ => Group::Converting,
        }
    }

    pub async fn run(
        &self,
        api: &dyn ExchangeApi,
        config: &Config,
        options: &RunOptions,
    ) -> Result<()> {
        let contract = &config.contract;
        let tolerance = options.tolerance.unwrap_or(config.tolerance.conversion);

        match self {
            Scenario::TickerSmoke => checks::check_ticker_smoke(api, config).await,
            Scenario::CurrencySet => checks::check_currency_set(api, config).await,
            Scenario::TickerIdempotence => checks::check_ticker_idempotence(api, config).await,
            Scenario::DefaultConversion => {
                let request =
                    ConversionRequest::new(contract.default_currency.as_str(), &contract.default_amount);
                checks::check_request(api, config, &request, tolerance).await
            }
            Scenario::AllCurrencyConversion => {
                checks::check_all_conversions(api, config, &contract.default_amount, tolerance).await
            }
            Scenario::UnsupportedCurrency => {
                let requests: Vec<ConversionRequest> = contract
                    .unsupported_currencies
                    .iter()
                    .map(|c| ConversionRequest::new(c.as_str(), 1))
                    .collect();
                checks::check_rejections(api, config, &requests, ExpectedError::UnsupportedSymbol)
                    .await
            }
            Scenario::InvalidValue => {
                let requests: Vec<ConversionRequest> = contract
                    .invalid_values
                    .iter()
                    .map(|v| ConversionRequest::new(contract.default_currency.as_str(), v))
                    .collect();
                checks::check_rejections(api, config, &requests, ExpectedError::InvalidValue).await
            }
            Scenario::BothInvalid => {
                let request = ConversionRequest::new(
                    contract.both_invalid_currency.as_str(),
                    &contract.both_invalid_value,
                );
                checks::check_rejections(api, config, &[request], ExpectedError::UnsupportedSymbol)
                    .await
            }
            Scenario::OutOfRangeValue => {
                let digits = contract.max_value_digits + 1;
                let amount = repeat_digit('9', digits);
                expect_digit_count(&amount, digits)?;
                let request = ConversionRequest::new(contract.default_currency.as_str(), amount);
                checks::check_rejections(api, config, &[request], ExpectedError::InvalidValue).await
            }
            Scenario::NearOutOfRangeValue => {
                let digits = contract.max_value_digits;
                let amount = repeat_digit('9', digits);
                expect_digit_count(&amount, digits)?;
                let request = ConversionRequest::new(contract.default_currency.as_str(), amount);
                checks::check_request(api, config, &request, config.tolerance.near_overflow).await
            }
            Scenario::MissingValue => {
                let request = ConversionRequest::without_value(contract.default_currency.as_str());
                checks::check_rejections(api, config, &[request], ExpectedError::MissingValue).await
            }
            Scenario::MissingCurrency => {
                let request = ConversionRequest::without_currency(&contract.missing_currency_value);
                checks::check_rejections(api, config, &[request], ExpectedError::MissingCurrency)
                    .await
            }
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Empty means every group.
    pub groups: Vec<Group>,
    /// Replaces the configured conversion tolerance.
    pub tolerance: Option<Tolerance>,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn selected(&self) -> Vec<Scenario> {
        Scenario::ALL
            .iter()
            .copied()
            .filter(|s| self.groups.is_empty() || self.groups.contains(&s.group()))
            .collect()
    }
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub elapsed: Duration,
    pub outcome: Result<()>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn detail(&self) -> String {
        match &self.outcome {
            Ok(()) => String::new(),
            Err(e) => format!("{:#}", e),
        }
    }
}

/// Runs the selected scenarios and returns every result in catalogue order.
///
/// Smoke scenarios run first and on their own, so their response-time limit
/// is measured against an otherwise idle service. The rest run concurrently.
pub async fn run_suite(
    api: &dyn ExchangeApi,
    config: &Config,
    options: &RunOptions,
) -> Vec<ScenarioResult> {
    let scenarios = options.selected();

    let progress = if options.show_progress {
        let progress = ProgressBar::new(scenarios.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        {
            progress.set_style(style.progress_chars("=>-"));
        }
        progress
    } else {
        ProgressBar::hidden()
    };

    let run_one = |scenario: Scenario| {
        let progress = progress.clone();
        async move {
            let started = Instant::now();
            let outcome = scenario.run(api, config, options).await;
            let elapsed = started.elapsed();

            match &outcome {
                Ok(()) => info!(scenario = scenario.name(), elapsed_ms = elapsed.as_millis() as u64, "passed"),
                Err(e) => warn!(scenario = scenario.name(), "failed: {:#}", e),
            }
            progress.set_message(scenario.name());
            progress.inc(1);

            ScenarioResult {
                scenario,
                elapsed,
                outcome,
            }
        }
    };

    let (smoke, rest): (Vec<Scenario>, Vec<Scenario>) =
        scenarios.into_iter().partition(|s| s.group() == Group::Smoke);
    let mut results = join_all(smoke.into_iter().map(run_one)).await;
    results.extend(join_all(rest.into_iter().map(run_one)).await);
    results.sort_by_key(|r| Scenario::ALL.iter().position(|s| *s == r.scenario));
    progress.finish_and_clear();
    results
}
