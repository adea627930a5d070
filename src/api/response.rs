use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Everything a contract check looks at, captured once the body is read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Time from sending the request until the body was fully received.
    pub elapsed: Duration,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .with_context(|| format!("Failed to parse JSON body from {}", self.url))
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}
