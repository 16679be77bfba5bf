//! CSFloat market listings.
//!
//! Base URL: https://csfloat.com/api/v1/
//! Auth: raw API key in the `Authorization` header.
//!
//! Only the first page of the cheapest 50 listings is requested. The
//! median over that page is the price basis for the item.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{build_http_client, normalize_base_url, PriceSource};
use crate::types::Listing;

const PAGE_LIMIT: u32 = 50;
const SORT_BY: &str = "lowest_price";

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    data: Vec<Listing>,
}

pub struct CsFloatClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl CsFloatClient {
    pub fn new(base_url: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            bail!("CSFloat api key cannot be empty");
        }
        Ok(Self {
            http: build_http_client(timeout, "CSFloat")?,
            base_url: normalize_base_url(base_url),
            api_key,
        })
    }

    fn listings_url(&self, market_hash_name: &str) -> String {
        format!(
            "{}/api/v1/listings?limit={PAGE_LIMIT}&page=0&sort_by={SORT_BY}&market_hash_name={}",
            self.base_url,
            urlencoding::encode(market_hash_name),
        )
    }
}

#[async_trait]
impl PriceSource for CsFloatClient {
    async fn fetch_listings(&self, market_hash_name: &str) -> Result<Vec<Listing>> {
        if market_hash_name.is_empty() {
            bail!("market hash name cannot be empty");
        }

        let url = self.listings_url(market_hash_name);
        debug!(url = %url, "Fetching CSFloat listings");

        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.api_key.expose_secret().as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .context("CSFloat API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("CSFloat API error {status}: {body}");
        }

        let body: ListingsResponse = resp
            .json()
            .await
            .context("Failed to parse CSFloat listings response")?;

        debug!(item = market_hash_name, listings = body.data.len(), "CSFloat listings received");
        Ok(body.data)
    }
}
