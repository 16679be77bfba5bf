//! External data sources.
//!
//! Defines the traits the engine consumes and provides HTTP implementations
//! for:
//! - Steam Community inventory endpoint (item listing for an account)
//! - Steam Web API (service status and profile summary prechecks)
//! - CSFloat listings (per-item market offers)

pub mod csfloat;
pub mod steam;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::types::{Inventory, Listing};

pub use csfloat::CsFloatClient;
pub use steam::{SteamInventoryClient, SteamWebApiClient};

const USER_AGENT: &str = concat!("inventory-valuer/", env!("CARGO_PKG_VERSION"));

/// Market offers for one identity key.
///
/// Implementations return every listing the source reports; filtering by
/// state and computing the median happen in the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_listings(&self, market_hash_name: &str) -> Result<Vec<Listing>>;
}

/// Items held by an account.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch_inventory(&self, account_id: u64) -> Result<Inventory>;
}

/// Optional pre-run checks against the platform.
#[async_trait]
pub trait AccountStatusSource: Send + Sync {
    async fn service_status(&self) -> Result<ServiceStatus>;

    async fn user_summary(&self, account_id: u64) -> Result<UserSummary>;
}

// ---------------------------------------------------------------------------
// Precheck types
// ---------------------------------------------------------------------------

const OFFLINE: &str = "offline";

/// Platform service availability as reported by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub sessions_logon: String,
    pub community: String,
}

impl ServiceStatus {
    /// Names of the required services that report offline.
    pub fn offline_services(&self) -> Vec<&'static str> {
        let mut offline = Vec::new();
        if self.sessions_logon.eq_ignore_ascii_case(OFFLINE) {
            offline.push("sessions logon");
        }
        if self.community.eq_ignore_ascii_case(OFFLINE) {
            offline.push("community");
        }
        offline
    }

    pub fn is_available(&self) -> bool {
        self.offline_services().is_empty()
    }
}

/// Profile visibility. Only public profiles expose their inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunityVisibility {
    Private,
    FriendsOnly,
    Public,
    Unknown(i64),
}

impl From<i64> for CommunityVisibility {
    fn from(v: i64) -> Self {
        match v {
            1 => CommunityVisibility::Private,
            2 => CommunityVisibility::FriendsOnly,
            3 => CommunityVisibility::Public,
            other => CommunityVisibility::Unknown(other),
        }
    }
}

impl std::fmt::Display for CommunityVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunityVisibility::Private => f.write_str("private"),
            CommunityVisibility::FriendsOnly => f.write_str("friends only"),
            CommunityVisibility::Public => f.write_str("public"),
            CommunityVisibility::Unknown(v) => write!(f, "unknown ({v})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub account_id: u64,
    pub persona_name: String,
    pub visibility: CommunityVisibility,
    /// Whether the community profile has been set up.
    pub profile_created: bool,
}

impl UserSummary {
    /// Why this account cannot be valued, if anything.
    pub fn problem(&self) -> Option<String> {
        if self.visibility != CommunityVisibility::Public {
            return Some(format!(
                "account {} profile is not public ({})",
                self.account_id, self.visibility
            ));
        }
        if !self.profile_created {
            return Some(format!("account {} has not set up a community profile", self.account_id));
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

pub(crate) fn build_http_client(timeout: Duration, who: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| format!("Failed to build HTTP client for {who}"))
}

/// Strip a trailing slash so paths can be appended with `format!`.
pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
