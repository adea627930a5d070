pub mod blockchain_client;
pub mod response;

pub use blockchain_client::BlockchainClient;
pub use response::ApiResponse;

use anyhow::Result;

use crate::models::ConversionRequest;

/// The two endpoints under contract.
#[async_trait::async_trait]
pub trait ExchangeApi: Send + Sync {
    /// `GET <ticker-endpoint>`
    async fn get_ticker(&self) -> Result<ApiResponse>;

    /// `GET <conversion-endpoint>?currency=..&value=..`
    async fn to_btc(&self, request: &ConversionRequest) -> Result<ApiResponse>;
}
