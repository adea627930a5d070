// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ApiResponse, ExchangeApi};
use crate::config::ApiConfig;
use crate::models::ConversionRequest;

/// Client for the blockchain.info `/ticker` and `/tobtc` endpoints.
#[derive(Clone)]
pub struct BlockchainClient {
    client: Client,
    ticker_url: String,
    tobtc_url: String,
}

impl BlockchainClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            ticker_url: config.ticker_url(),
            tobtc_url: config.tobtc_url(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<ApiResponse> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text from {}", final_url))?;
        let elapsed = started.elapsed();

        debug!(
            url = %final_url,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "received response"
        );

        Ok(ApiResponse {
            url: final_url,
            status: status.as_u16(),
            content_type,
            elapsed,
            body,
        })
    }
}

#[async_trait::async_trait]
impl ExchangeApi for BlockchainClient {
    async fn get_ticker(&self) -> Result<ApiResponse> {
        self.get(&self.ticker_url, &[]).await
    }

    async fn to_btc(&self, request: &ConversionRequest) -> Result<ApiResponse> {
        self.get(&self.tobtc_url, &request.query()).await
    }
}
