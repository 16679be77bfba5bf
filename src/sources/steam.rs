//! Steam integrations.
//!
//! Two clients live here:
//! - [`SteamInventoryClient`] reads the public community inventory
//!   endpoint (`/inventory/{account}/730/2`). No key needed.
//! - [`SteamWebApiClient`] calls the Web API for the optional pre-run
//!   checks (game service status, player summary). Requires a 32 character
//!   hex API key.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    build_http_client, normalize_base_url, AccountStatusSource, CommunityVisibility,
    InventorySource, ServiceStatus, UserSummary,
};
use crate::config::is_valid_account_id;
use crate::types::{Inventory, InventoryItem, ItemMetadata};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const APP_ID: u32 = 730;
const CONTEXT_ID: u32 = 2;
const ICON_URL_BASE: &str = "https://community.fastly.steamstatic.com/economy/image/";
const INSPECT_ACTION: &str = "Inspect in Game...";
const API_KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct InventoryResponse {
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    descriptions: Vec<Description>,
    #[serde(default)]
    total_inventory_count: u64,
    #[serde(default)]
    success: i64,
}

/// One held stack. Stackable items report `amount > 1`.
#[derive(Debug, Deserialize)]
struct Asset {
    classid: String,
    #[serde(default = "default_instance_id")]
    instanceid: String,
    #[serde(default = "default_amount")]
    amount: String,
}

fn default_instance_id() -> String {
    "0".to_string()
}

fn default_amount() -> String {
    "1".to_string()
}

#[derive(Debug, Deserialize)]
struct Description {
    classid: String,
    #[serde(default = "default_instance_id")]
    instanceid: String,
    #[serde(default)]
    icon_url: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_color: String,
    #[serde(default)]
    market_name: String,
    market_hash_name: String,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    market_actions: Vec<Action>,
    #[serde(default)]
    marketable: i64,
    #[serde(default)]
    tradable: i64,
}

#[derive(Debug, Deserialize)]
struct Action {
    #[serde(default)]
    link: String,
    #[serde(default)]
    name: String,
}

fn inspect_link(actions: &[Action]) -> String {
    actions
        .iter()
        .find(|a| a.name == INSPECT_ACTION)
        .map(|a| a.link.clone())
        .unwrap_or_default()
}

impl From<&Description> for InventoryItem {
    fn from(d: &Description) -> Self {
        InventoryItem {
            metadata: ItemMetadata {
                name: d.name.clone(),
                name_color: d.name_color.clone(),
                market_name: d.market_name.clone(),
                icon_url: format!("{ICON_URL_BASE}{}", d.icon_url),
                action_inspect_link: inspect_link(&d.actions),
                market_inspect_link: inspect_link(&d.market_actions),
            },
            market_hash_name: d.market_hash_name.clone(),
            marketable: d.marketable == 1,
            tradable: d.tradable == 1,
        }
    }
}

/// One item per physical copy: every asset is joined to its description
/// by `(classid, instanceid)` and repeated `amount` times.
fn parse_inventory(resp: InventoryResponse) -> Result<Inventory> {
    if resp.success != 1 {
        bail!("inventory request unsuccessful: success code {}", resp.success);
    }

    let descriptions: HashMap<(&str, &str), &Description> = resp
        .descriptions
        .iter()
        .map(|d| ((d.classid.as_str(), d.instanceid.as_str()), d))
        .collect();

    let mut items = Vec::with_capacity(resp.assets.len());
    for asset in &resp.assets {
        let Some(description) = descriptions.get(&(asset.classid.as_str(), asset.instanceid.as_str()))
        else {
            warn!(
                classid = %asset.classid,
                instanceid = %asset.instanceid,
                "Asset without description, skipping"
            );
            continue;
        };
        let amount: usize = asset.amount.parse().with_context(|| {
            format!("Invalid amount '{}' for asset class {}", asset.amount, asset.classid)
        })?;
        let item = InventoryItem::from(*description);
        items.extend(std::iter::repeat(item).take(amount));
    }

    Ok(Inventory::from_items(items))
}

#[derive(Debug, Deserialize)]
struct ServerStatusResponse {
    result: ServerStatusResult,
}

#[derive(Debug, Deserialize)]
struct ServerStatusResult {
    services: Services,
}

#[derive(Debug, Deserialize)]
struct Services {
    #[serde(rename = "SessionsLogon", default)]
    sessions_logon: String,
    #[serde(rename = "SteamCommunity", default)]
    steam_community: String,
}

#[derive(Debug, Deserialize)]
struct PlayerSummariesResponse {
    response: PlayerList,
}

#[derive(Debug, Deserialize)]
struct PlayerList {
    #[serde(default)]
    players: Vec<Player>,
}

#[derive(Debug, Deserialize)]
struct Player {
    steamid: String,
    #[serde(default)]
    communityvisibilitystate: i64,
    #[serde(default)]
    profilestate: i64,
    #[serde(default)]
    personaname: String,
}

impl TryFrom<Player> for UserSummary {
    type Error = anyhow::Error;

    fn try_from(p: Player) -> Result<Self> {
        let account_id = p
            .steamid
            .parse()
            .with_context(|| format!("Invalid steamid in player summary: {}", p.steamid))?;
        Ok(UserSummary {
            account_id,
            persona_name: p.personaname,
            visibility: CommunityVisibility::from(p.communityvisibilitystate),
            profile_created: p.profilestate == 1,
        })
    }
}

fn ensure_account_id(account_id: u64) -> Result<()> {
    if !is_valid_account_id(account_id) {
        bail!("invalid account id {account_id}");
    }
    Ok(())
}

/// Web API keys are 32 hex characters.
pub fn validate_api_key(key: &str) -> Result<()> {
    if key.is_empty() {
        bail!("api key cannot be empty");
    }
    if key.len() != API_KEY_LEN {
        bail!("api key must be exactly {API_KEY_LEN} characters long");
    }
    if !key.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("api key must be a hexadecimal string");
    }
    Ok(())
}

async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("{what} error {status}: {body}");
    }
    Ok(resp)
}

// ---------------------------------------------------------------------------
// Inventory client
// ---------------------------------------------------------------------------

pub struct SteamInventoryClient {
    http: Client,
    base_url: String,
}

impl SteamInventoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout, "Steam Community")?,
            base_url: normalize_base_url(base_url),
        })
    }
}

#[async_trait]
impl InventorySource for SteamInventoryClient {
    async fn fetch_inventory(&self, account_id: u64) -> Result<Inventory> {
        ensure_account_id(account_id)?;

        let url = format!("{}/inventory/{account_id}/{APP_ID}/{CONTEXT_ID}", self.base_url);
        debug!(url = %url, "Fetching inventory");

        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Inventory request failed")?;
        let resp = check_status(resp, "Inventory endpoint").await?;

        let body: InventoryResponse = resp
            .json()
            .await
            .context("Failed to parse inventory response")?;
        let reported = body.total_inventory_count;
        let assets = body.assets.len();
        let inventory = parse_inventory(body)?;

        info!(
            account_id,
            reported,
            assets,
            all = inventory.all_items.len(),
            marketable = inventory.marketable_items.len(),
            marketable_and_tradable = inventory.marketable_and_tradable_items.len(),
            "Inventory fetched"
        );
        Ok(inventory)
    }
}

// ---------------------------------------------------------------------------
// Web API client
// ---------------------------------------------------------------------------

pub struct SteamWebApiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl SteamWebApiClient {
    pub fn new(base_url: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        validate_api_key(api_key.expose_secret()).context("Invalid Steam Web API key")?;
        Ok(Self {
            http: build_http_client(timeout, "Steam Web API")?,
            base_url: normalize_base_url(base_url),
            api_key,
        })
    }
}

#[async_trait]
impl AccountStatusSource for SteamWebApiClient {
    async fn service_status(&self) -> Result<ServiceStatus> {
        let url = format!("{}/ICSGOServers_{APP_ID}/GetGameServersStatus/v1/", self.base_url);
        debug!(url = %url, "Fetching game service status");

        let resp = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .send()
            .await
            .context("Service status request failed")?;
        let resp = check_status(resp, "Service status endpoint").await?;

        let body: ServerStatusResponse = resp
            .json()
            .await
            .context("Failed to parse service status response")?;

        Ok(ServiceStatus {
            sessions_logon: body.result.services.sessions_logon,
            community: body.result.services.steam_community,
        })
    }

    async fn user_summary(&self, account_id: u64) -> Result<UserSummary> {
        ensure_account_id(account_id)?;

        let url = format!("{}/ISteamUser/GetPlayerSummaries/v2/", self.base_url);
        debug!(url = %url, account_id, "Fetching player summary");

        let steamids = account_id.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.expose_secret().as_str()),
                ("steamids", steamids.as_str()),
            ])
            .send()
            .await
            .context("Player summary request failed")?;
        let resp = check_status(resp, "Player summary endpoint").await?;

        let body: PlayerSummariesResponse = resp
            .json()
            .await
            .context("Failed to parse player summary response")?;

        let player = body
            .response
            .players
            .into_iter()
            .next()
            .with_context(|| format!("No player data found for account {account_id}"))?;
        UserSummary::try_from(player)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
