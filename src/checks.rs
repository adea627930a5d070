// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

//! Contract assertions against the ticker and conversion endpoints.
//!
//! Every check awaits all of its requests before asserting anything, so a
//! failed or timed-out request always fails the check.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::api::{ApiResponse, ExchangeApi};
use crate::config::Config;
use crate::models::{
    diff_currency_sets, expected_btc, ConversionRequest, ExpectedError, ExpectedOutcome, Ticker,
};
use crate::tolerance::Tolerance;
use crate::utils::parse_btc_amount;

#[derive(Debug, Error)]
pub enum CheckFailure {
    #[error("expected HTTP status {expected}, got {actual}")]
    Status { expected: u16, actual: u16 },

    #[error("expected content-type {expected:?}, got {actual:?}")]
    ContentType {
        expected: String,
        actual: Option<String>,
    },

    #[error("response took {elapsed_ms}ms, limit is {limit_ms}ms")]
    Slow { elapsed_ms: u128, limit_ms: u128 },

    #[error("currency set mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    CurrencySet {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("received body mismatch: expected {expected:?}, got {actual:?}")]
    Body { expected: String, actual: String },

    #[error("received and calculated values mismatch: received {received}, calculated {calculated}, delta {delta} outside {tolerance}")]
    Tolerance {
        received: f64,
        calculated: f64,
        delta: f64,
        tolerance: Tolerance,
    },

    #[error("body {body:?} is not a number")]
    NotNumeric { body: String },

    #[error("no rate for currency {0} in ticker")]
    MissingRate(String),

    #[error("value {value:?} has {actual} digits, expected {expected}")]
    ValueLength {
        value: String,
        expected: usize,
        actual: usize,
    },

    #[error("request {request} is not rejected with {expected:?}, the contract predicts {predicted:?}")]
    WrongPrediction {
        request: String,
        expected: ExpectedError,
        predicted: ExpectedOutcome,
    },

    #[error("no sample requests to check")]
    NoRequests,

    #[error("{} of {} checks failed: {}", .failures.len(), .total, .failures.join("; "))]
    Several { total: usize, failures: Vec<String> },
}

pub fn expect_status(response: &ApiResponse, expected: u16) -> Result<(), CheckFailure> {
    if response.status == expected {
        return Ok(());
    }
    Err(CheckFailure::Status {
        expected,
        actual: response.status,
    })
}

pub fn expect_content_type(response: &ApiResponse, expected: &str) -> Result<(), CheckFailure> {
    if response.content_type.as_deref() == Some(expected) {
        return Ok(());
    }
    Err(CheckFailure::ContentType {
        expected: expected.to_string(),
        actual: response.content_type.clone(),
    })
}

pub fn expect_response_time(response: &ApiResponse, limit: Duration) -> Result<(), CheckFailure> {
    if response.elapsed <= limit {
        return Ok(());
    }
    Err(CheckFailure::Slow {
        elapsed_ms: response.elapsed.as_millis(),
        limit_ms: limit.as_millis(),
    })
}

pub fn expect_body(response: &ApiResponse, expected: &str) -> Result<(), CheckFailure> {
    if response.body == expected {
        return Ok(());
    }
    Err(CheckFailure::Body {
        expected: expected.to_string(),
        actual: response.body.clone(),
    })
}

/// Status first, then the exact error body.
pub fn expect_error(response: &ApiResponse, status: u16, message: &str) -> Result<(), CheckFailure> {
    expect_status(response, status)?;
    expect_body(response, message)
}

pub fn expect_digit_count(value: &str, expected: usize) -> Result<(), CheckFailure> {
    let actual = value.chars().filter(char::is_ascii_digit).count();
    if actual == expected {
        return Ok(());
    }
    Err(CheckFailure::ValueLength {
        value: value.to_string(),
        expected,
        actual,
    })
}

/// Folds the results of a fan-out into a single outcome.
fn collect_failures<I>(results: I) -> Result<()>
where
    I: IntoIterator<Item = (String, Result<()>)>,
{
    let mut total = 0;
    let mut failures = Vec::new();
    for (label, result) in results {
        total += 1;
        if let Err(e) = result {
            failures.push(format!("{}: {:#}", label, e));
        }
    }
    if failures.is_empty() {
        return Ok(());
    }
    Err(CheckFailure::Several { total, failures }.into())
}

async fn fetch_ticker(api: &dyn ExchangeApi) -> Result<Ticker> {
    let response = api.get_ticker().await?;
    expect_status(&response, 200)?;
    Ticker::from_json(&response.body)
}

/// Status, content-type and response time of the ticker endpoint.
pub async fn check_ticker_smoke(api: &dyn ExchangeApi, config: &Config) -> Result<()> {
    let response = api.get_ticker().await?;
    expect_header_contract(&response, config)
}

fn expect_header_contract(response: &ApiResponse, config: &Config) -> Result<()> {
    let contract = &config.contract;
    expect_content_type(response, &contract.content_type)?;
    expect_response_time(response, Duration::from_millis(contract.max_response_time_ms))?;
    expect_status(response, 200)?;
    Ok(())
}

fn ticker_keys(response: &ApiResponse) -> Result<Vec<String>> {
    let body: serde_json::Map<String, serde_json::Value> = response
        .json()
        .context("Ticker body is not a JSON object")?;
    Ok(body.keys().cloned().collect())
}

/// The ticker's top-level keys equal the configured currency set.
pub async fn check_currency_set(api: &dyn ExchangeApi, config: &Config) -> Result<()> {
    let response = api.get_ticker().await?;
    expect_status(&response, 200)?;
    let keys = ticker_keys(&response)?;
    expect_currency_set(&config.contract.currencies, &keys)
}

fn expect_currency_set(expected: &[String], actual: &[String]) -> Result<()> {
    let diff = diff_currency_sets(expected, actual);
    if diff.is_empty() {
        return Ok(());
    }
    Err(CheckFailure::CurrencySet {
        missing: diff.missing,
        unexpected: diff.unexpected,
    }
    .into())
}

/// Two ticker fetches advertise the same currency set; rates may differ.
pub async fn check_ticker_idempotence(api: &dyn ExchangeApi, _config: &Config) -> Result<()> {
    let (first, second) = tokio::join!(api.get_ticker(), api.get_ticker());
    let (first, second) = (first?, second?);
    expect_status(&first, 200)?;
    expect_status(&second, 200)?;
    expect_currency_set(&ticker_keys(&first)?, &ticker_keys(&second)?)
}

/// Sends `request` and asserts the answer the contract predicts for it:
/// a conversion within `tolerance` of `amount / sell`, or the literal
/// error message with HTTP 500.
pub async fn check_request(
    api: &dyn ExchangeApi,
    config: &Config,
    request: &ConversionRequest,
    tolerance: Tolerance,
) -> Result<()> {
    let outcome = request.expected_outcome(
        &config.contract.currencies,
        config.contract.max_value_digits,
    );
    debug!(%request, ?outcome, "checking conversion");
    match outcome {
        ExpectedOutcome::Converted { amount } => {
            let (ticker, response) = tokio::join!(fetch_ticker(api), api.to_btc(request));
            let (ticker, response) = (ticker?, response?);
            // Converted implies a currency is present
            let currency = request.currency.as_deref().unwrap_or_default();
            expect_conversion(&response, &ticker, currency, amount, tolerance)
        }
        ExpectedOutcome::Rejected(error) => {
            let response = api.to_btc(request).await?;
            expect_rejection(&response, config, error)
        }
    }
}

fn expect_conversion(
    response: &ApiResponse,
    ticker: &Ticker,
    currency: &str,
    amount: f64,
    tolerance: Tolerance,
) -> Result<()> {
    expect_status(response, 200)?;
    let received = parse_btc_amount(&response.body)?;
    let calculated = expected_btc(amount, ticker.sell(currency)?);
    tolerance.check(received, calculated)?;
    Ok(())
}

fn expect_rejection(response: &ApiResponse, config: &Config, error: ExpectedError) -> Result<()> {
    expect_error(response, 500, config.messages.text_for(error))?;
    Ok(())
}

/// Converts `amount` into every configured currency against a single
/// ticker snapshot. All requests are joined before any result is judged.
pub async fn check_all_conversions(
    api: &dyn ExchangeApi,
    config: &Config,
    amount: &str,
    tolerance: Tolerance,
) -> Result<()> {
    let requests: Vec<ConversionRequest> = config
        .contract
        .currencies
        .iter()
        .map(|c| ConversionRequest::new(c.as_str(), amount))
        .collect();

    let (ticker, responses) = tokio::join!(
        fetch_ticker(api),
        join_all(requests.iter().map(|r| api.to_btc(r)))
    );
    let ticker = ticker?;

    let results = requests.iter().zip(responses).map(|(request, response)| {
        let label = request.currency.clone().unwrap_or_default();
        let result = response.and_then(|response| {
            match request.expected_outcome(
                &config.contract.currencies,
                config.contract.max_value_digits,
            ) {
                ExpectedOutcome::Converted { amount } => {
                    expect_conversion(&response, &ticker, &label, amount, tolerance)
                }
                ExpectedOutcome::Rejected(error) => expect_rejection(&response, config, error),
            }
        });
        (label, result)
    });
    collect_failures(results)
}

/// Runs several independent requests concurrently and reports every
/// failure, not just the first.
pub async fn check_requests(
    api: &dyn ExchangeApi,
    config: &Config,
    requests: &[ConversionRequest],
    tolerance: Tolerance,
) -> Result<()> {
    let results = join_all(
        requests
            .iter()
            .map(|r| check_request(api, config, r, tolerance)),
    )
    .await;
    collect_failures(
        requests
            .iter()
            .map(|r| r.to_string())
            .zip(results),
    )
}

/// Asserts that every request is one the contract rejects with `error`,
/// then that the service answers each with that literal error.
pub async fn check_rejections(
    api: &dyn ExchangeApi,
    config: &Config,
    requests: &[ConversionRequest],
    error: ExpectedError,
) -> Result<()> {
    if requests.is_empty() {
        return Err(CheckFailure::NoRequests.into());
    }
    for request in requests {
        let predicted = request.expected_outcome(
            &config.contract.currencies,
            config.contract.max_value_digits,
        );
        if predicted != ExpectedOutcome::Rejected(error) {
            return Err(CheckFailure::WrongPrediction {
                request: request.to_string(),
                expected: error,
                predicted,
            }
            .into());
        }
    }

    let responses = join_all(requests.iter().map(|r| api.to_btc(r))).await;
    collect_failures(requests.iter().zip(responses).map(|(request, response)| {
        let result = response.and_then(|response| expect_rejection(&response, config, error));
        (request.to_string(), result)
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory stand-in for the remote API, answering like the real
    /// service would for a fixed set of sell rates.
    pub(crate) struct FakeApi {
        pub rates: Vec<(&'static str, f64)>,
        pub content_type: Option<String>,
        pub elapsed: Duration,
        /// Multiplies every conversion answer, to simulate rate drift.
        pub drift: f64,
        pub unreachable: bool,
        pub overrides: Mutex<HashMap<String, (u16, String)>>,
        /// Every endpoint call in the order it started and finished.
        pub calls: Mutex<Vec<&'static str>>,
    }

    impl FakeApi {
        pub(crate) fn new() -> Self {
            Self {
                rates: crate::models::SUPPORTED_CURRENCIES
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (*c, 1000.0 * (i as f64 + 1.0)))
                    .collect(),
                content_type: Some("application/json;charset=UTF-8".to_string()),
                elapsed: Duration::from_millis(120),
                drift: 1.0,
                unreachable: false,
                overrides: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn override_query(&self, query: &str, status: u16, body: &str) {
            self.overrides
                .lock()
                .unwrap()
                .insert(query.to_string(), (status, body.to_string()));
        }

        fn respond(&self, url: &str, status: u16, body: String) -> ApiResponse {
            ApiResponse {
                url: url.to_string(),
                status,
                content_type: self.content_type.clone(),
                elapsed: self.elapsed,
                body,
            }
        }
    }

    #[async_trait::async_trait]
    impl ExchangeApi for FakeApi {
        async fn get_ticker(&self) -> Result<ApiResponse> {
            if self.unreachable {
                return Err(anyhow!("connection refused"));
            }
            self.calls.lock().unwrap().push("ticker start");
            tokio::task::yield_now().await;
            self.calls.lock().unwrap().push("ticker end");
            let body: serde_json::Map<String, serde_json::Value> = self
                .rates
                .iter()
                .map(|(c, sell)| {
                    (
                        c.to_string(),
                        serde_json::json!({"15m": sell, "last": sell, "buy": sell, "sell": sell, "symbol": c}),
                    )
                })
                .collect();
            Ok(self.respond("fake://ticker", 200, serde_json::to_string(&body)?))
        }

        async fn to_btc(&self, request: &ConversionRequest) -> Result<ApiResponse> {
            if self.unreachable {
                return Err(anyhow!("connection refused"));
            }
            self.calls.lock().unwrap().push("tobtc");
            let url = format!("fake://tobtc{}", request);
            if let Some((status, body)) = self.overrides.lock().unwrap().get(&request.to_string()) {
                return Ok(self.respond(&url, *status, body.clone()));
            }
            let config = Config::default();
            let supported: Vec<String> = self.rates.iter().map(|(c, _)| c.to_string()).collect();
            let response = match request.expected_outcome(&supported, 49) {
                ExpectedOutcome::Converted { amount } => {
                    let currency = request.currency.as_deref().unwrap_or_default();
                    let sell = self
                        .rates
                        .iter()
                        .find(|(c, _)| *c == currency)
                        .map(|(_, s)| *s)
                        .unwrap_or(1.0);
                    self.respond(&url, 200, (amount / sell * self.drift).to_string())
                }
                ExpectedOutcome::Rejected(error) => {
                    self.respond(&url, 500, config.messages.text_for(error).to_string())
                }
            };
            Ok(response)
        }
    }

    fn failure(err: &anyhow::Error) -> &CheckFailure {
        err.downcast_ref::<CheckFailure>()
            .unwrap_or_else(|| panic!("not a CheckFailure: {err:#}"))
    }

    #[tokio::test]
    async fn test_smoke_passes_against_conforming_api() -> Result<()> {
        check_ticker_smoke(&FakeApi::new(), &Config::default()).await
    }

    #[tokio::test]
    async fn test_smoke_rejects_wrong_content_type() {
        let mut api = FakeApi::new();
        api.content_type = Some("application/json".to_string());
        let err = check_ticker_smoke(&api, &Config::default()).await.unwrap_err();
        assert!(matches!(failure(&err), CheckFailure::ContentType { .. }));
    }

    #[tokio::test]
    async fn test_smoke_rejects_slow_response() {
        let mut api = FakeApi::new();
        api.elapsed = Duration::from_millis(3001);
        let err = check_ticker_smoke(&api, &Config::default()).await.unwrap_err();
        match failure(&err) {
            CheckFailure::Slow { elapsed_ms, limit_ms } => {
                assert_eq!(*elapsed_ms, 3001);
                assert_eq!(*limit_ms, 3000);
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[tokio::test]
    async fn test_currency_set_reports_difference() -> Result<()> {
        let config = Config::default();
        check_currency_set(&FakeApi::new(), &config).await?;

        let mut api = FakeApi::new();
        api.rates.retain(|(c, _)| *c != "INR");
        api.rates.push(("NOK", 900.0));
        let err = check_currency_set(&api, &config).await.unwrap_err();
        match failure(&err) {
            CheckFailure::CurrencySet { missing, unexpected } => {
                assert_eq!(missing, &vec!["INR".to_string()]);
                assert_eq!(unexpected, &vec!["NOK".to_string()]);
            }
            other => panic!("unexpected failure: {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_idempotence() -> Result<()> {
        check_ticker_idempotence(&FakeApi::new(), &Config::default()).await
    }

    #[tokio::test]
    async fn test_conversion_within_tolerance() -> Result<()> {
        let config = Config::default();
        let mut api = FakeApi::new();
        api.rates = crate::models::SUPPORTED_CURRENCIES
            .iter()
            .map(|c| (*c, 10_000.0))
            .collect();
        api.override_query("?currency=AUD&value=20000", 200, "2");

        check_request(&api, &config, &ConversionRequest::new("AUD", 20000), Tolerance::Absolute(0.01)).await
    }

    #[tokio::test]
    async fn test_conversion_outside_tolerance_reports_delta() {
        let config = Config::default();
        let mut api = FakeApi::new();
        api.drift = 1.5;
        let request = ConversionRequest::new("USD", 20000);

        let err = check_request(&api, &config, &request, Tolerance::Absolute(0.01))
            .await
            .unwrap_err();
        match failure(&err) {
            CheckFailure::Tolerance { received, calculated, delta, .. } => {
                approx::assert_relative_eq!(*calculated, 20.0);
                approx::assert_relative_eq!(*received, 30.0);
                approx::assert_relative_eq!(*delta, 10.0);
            }
            other => panic!("unexpected failure: {other}"),
        }

        // the looser historical tolerance still rejects a 50% drift at this size
        assert!(check_request(&api, &config, &request, Tolerance::Absolute(2.0)).await.is_err());
        assert!(check_request(&api, &config, &request, Tolerance::Absolute(10.5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejections_match_literal_messages() -> Result<()> {
        let config = Config::default();
        let api = FakeApi::new();
        let tolerance = config.tolerance.conversion;
        let requests = [
            ConversionRequest::new("XXX", 1),
            ConversionRequest::new("AUD", "X"),
            ConversionRequest::new("X", "X"),
            ConversionRequest::without_value("AUD"),
            ConversionRequest::without_currency(500),
        ];
        check_requests(&api, &config, &requests, tolerance).await
    }

    #[tokio::test]
    async fn test_wrong_error_message_fails() {
        let config = Config::default();
        let api = FakeApi::new();
        api.override_query("?currency=XXX&value=1", 500, "Parameter <value> with invalid numerical value");

        let err = check_request(&api, &config, &ConversionRequest::new("XXX", 1), config.tolerance.conversion)
            .await
            .unwrap_err();
        match failure(&err) {
            CheckFailure::Body { expected, actual } => {
                assert_eq!(expected, "Parameter <currency> with unsupported symbol");
                assert_eq!(actual, "Parameter <value> with invalid numerical value");
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[tokio::test]
    async fn test_error_with_wrong_status_fails_on_status() {
        let config = Config::default();
        let api = FakeApi::new();
        api.override_query("?currency=XXX&value=1", 200, "Parameter <currency> with unsupported symbol");

        let err = check_request(&api, &config, &ConversionRequest::new("XXX", 1), config.tolerance.conversion)
            .await
            .unwrap_err();
        assert!(matches!(failure(&err), CheckFailure::Status { expected: 500, actual: 200 }));
    }

    #[tokio::test]
    async fn test_non_numeric_success_body_fails() {
        let config = Config::default();
        let api = FakeApi::new();
        api.override_query("?currency=AUD&value=20000", 200, "oops");

        let err = check_request(&api, &config, &ConversionRequest::new("AUD", 20000), config.tolerance.conversion)
            .await
            .unwrap_err();
        assert!(matches!(failure(&err), CheckFailure::NotNumeric { .. }));
    }

    #[tokio::test]
    async fn test_all_conversions_collects_every_failure() -> Result<()> {
        let config = Config::default();
        let api = FakeApi::new();
        check_all_conversions(&api, &config, "20000", config.tolerance.conversion).await?;

        api.override_query("?currency=JPY&value=20000", 500, "boom");
        api.override_query("?currency=INR&value=20000", 200, "0");
        let err = check_all_conversions(&api, &config, "20000", config.tolerance.conversion)
            .await
            .unwrap_err();
        match failure(&err) {
            CheckFailure::Several { total, failures } => {
                assert_eq!(*total, 22);
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().any(|f| f.starts_with("JPY:")));
                assert!(failures.iter().any(|f| f.starts_with("INR:")));
            }
            other => panic!("unexpected failure: {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_error_fails_check() {
        let mut api = FakeApi::new();
        api.unreachable = true;
        let config = Config::default();
        assert!(check_ticker_smoke(&api, &config).await.is_err());
        assert!(check_all_conversions(&api, &config, "1", config.tolerance.conversion)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_rejections_require_the_named_error() -> Result<()> {
        let config = Config::default();
        let api = FakeApi::new();
        let unsupported = [ConversionRequest::new("XXX", 1), ConversionRequest::new("X", "X")];
        check_rejections(&api, &config, &unsupported, ExpectedError::UnsupportedSymbol).await?;

        let sent = api.calls.lock().unwrap().len();

        // a numeric sample would be converted, not rejected
        let numeric = [ConversionRequest::new("AUD", "abc"), ConversionRequest::new("AUD", "5")];
        let err = check_rejections(&api, &config, &numeric, ExpectedError::InvalidValue)
            .await
            .unwrap_err();
        match failure(&err) {
            CheckFailure::WrongPrediction { request, expected, predicted } => {
                assert_eq!(request, "?currency=AUD&value=5");
                assert_eq!(*expected, ExpectedError::InvalidValue);
                assert!(matches!(predicted, ExpectedOutcome::Converted { .. }));
            }
            other => panic!("unexpected failure: {other}"),
        }
        assert_eq!(api.calls.lock().unwrap().len(), sent);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejections_without_samples_fail() {
        let config = Config::default();
        let err = check_rejections(&FakeApi::new(), &config, &[], ExpectedError::UnsupportedSymbol)
            .await
            .unwrap_err();
        assert!(matches!(failure(&err), CheckFailure::NoRequests));
    }

    #[tokio::test]
    async fn test_rejections_report_wrong_message() {
        let config = Config::default();
        let api = FakeApi::new();
        api.override_query("?currency=AUD&value=twenty", 500, "Parameter <value> is missing");
        let requests = [
            ConversionRequest::new("AUD", "abc"),
            ConversionRequest::new("AUD", "twenty"),
        ];

        let err = check_rejections(&api, &config, &requests, ExpectedError::InvalidValue)
            .await
            .unwrap_err();
        match failure(&err) {
            CheckFailure::Several { total, failures } => {
                assert_eq!(*total, 2);
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("?currency=AUD&value=twenty:"));
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[test]
    fn test_digit_count() {
        assert!(expect_digit_count("99999", 5).is_ok());
        assert!(matches!(
            expect_digit_count("9999", 5),
            Err(CheckFailure::ValueLength { expected: 5, actual: 4, .. })
        ));
    }
}
