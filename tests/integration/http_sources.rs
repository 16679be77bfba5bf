//! HTTP contract tests for the remote sources against a local mock server.

use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use inventory_valuer::sources::{
    AccountStatusSource, CommunityVisibility, CsFloatClient, InventorySource, PriceSource,
    SteamInventoryClient, SteamWebApiClient,
};
use inventory_valuer::types::ListingState;

use crate::mock_sources::ACCOUNT_ID;

const TIMEOUT: Duration = Duration::from_secs(5);
const STEAM_KEY: &str = "0123456789abcdef0123456789ABCDEF";

fn secret(s: &str) -> SecretString {
    SecretString::new(s.to_string())
}

// -- Inventory --

#[tokio::test]
async fn test_inventory_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/inventory/{ACCOUNT_ID}/730/2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": [
                {"assetid": "1", "classid": "1", "instanceid": "0", "amount": "1"},
                {"assetid": "2", "classid": "2", "instanceid": "0", "amount": "1"}
            ],
            "descriptions": [
                {
                    "classid": "1",
                    "instanceid": "0",
                    "icon_url": "icon-a",
                    "name": "Snakebite Case",
                    "market_hash_name": "Snakebite Case",
                    "marketable": 1,
                    "tradable": 1
                },
                {
                    "classid": "2",
                    "instanceid": "0",
                    "icon_url": "icon-b",
                    "name": "AK-47 | Slate",
                    "market_hash_name": "AK-47 | Slate (Field-Tested)",
                    "actions": [{"link": "steam://inspect/1", "name": "Inspect in Game..."}],
                    "marketable": 1,
                    "tradable": 0
                }
            ],
            "total_inventory_count": 2,
            "success": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SteamInventoryClient::new(&server.uri(), TIMEOUT).unwrap();
    let inventory = client.fetch_inventory(ACCOUNT_ID).await.unwrap();

    assert_eq!(inventory.all_items.len(), 2);
    assert_eq!(inventory.marketable_items.len(), 2);
    assert_eq!(inventory.marketable_and_tradable_items.len(), 1);
    assert_eq!(
        inventory.marketable_items[1].metadata.action_inspect_link,
        "steam://inspect/1"
    );
    assert!(inventory.all_items[0].metadata.icon_url.ends_with("/economy/image/icon-a"));
}

#[tokio::test]
async fn test_inventory_counts_every_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/inventory/{ACCOUNT_ID}/730/2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": [
                {"assetid": "11", "classid": "5", "instanceid": "0", "amount": "1"},
                {"assetid": "12", "classid": "5", "instanceid": "0", "amount": "1"},
                {"assetid": "13", "classid": "5", "instanceid": "0", "amount": "1"},
                {"assetid": "14", "classid": "6", "instanceid": "0", "amount": "4"}
            ],
            "descriptions": [
                {"classid": "5", "instanceid": "0", "market_hash_name": "Snakebite Case", "marketable": 1, "tradable": 1},
                {"classid": "6", "instanceid": "0", "market_hash_name": "Sealed Graffiti | Recoil", "marketable": 1, "tradable": 1}
            ],
            "total_inventory_count": 4,
            "success": 1
        })))
        .mount(&server)
        .await;

    let client = SteamInventoryClient::new(&server.uri(), TIMEOUT).unwrap();
    let inventory = client.fetch_inventory(ACCOUNT_ID).await.unwrap();

    assert_eq!(inventory.marketable_and_tradable_items.len(), 7);
    let cases = inventory
        .marketable_and_tradable_items
        .iter()
        .filter(|i| i.market_hash_name == "Snakebite Case")
        .count();
    assert_eq!(cases, 3);
}

#[tokio::test]
async fn test_inventory_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("private"))
        .mount(&server)
        .await;

    let client = SteamInventoryClient::new(&server.uri(), TIMEOUT).unwrap();
    let err = client.fetch_inventory(ACCOUNT_ID).await.unwrap_err();
    assert!(err.to_string().contains("403"), "{err:#}");
}

#[tokio::test]
async fn test_inventory_success_flag_checked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 2})))
        .mount(&server)
        .await;

    let client = SteamInventoryClient::new(&server.uri(), TIMEOUT).unwrap();
    assert!(client.fetch_inventory(ACCOUNT_ID).await.is_err());
}

// -- Web API --

#[tokio::test]
async fn test_service_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ICSGOServers_730/GetGameServersStatus/v1/"))
        .and(query_param("key", STEAM_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "app": {"version": 1, "timestamp": 1700000000, "time": "12:00:00"},
                "services": {
                    "SessionsLogon": "normal",
                    "SteamCommunity": "offline",
                    "IEconItems": "normal",
                    "Leaderboards": "normal"
                },
                "datacenters": {},
                "matchmaking": {"scheduler": "normal"}
            }
        })))
        .mount(&server)
        .await;

    let client = SteamWebApiClient::new(&server.uri(), secret(STEAM_KEY), TIMEOUT).unwrap();
    let status = client.service_status().await.unwrap();
    assert_eq!(status.sessions_logon, "normal");
    assert_eq!(status.offline_services(), vec!["community"]);
}

#[tokio::test]
async fn test_user_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISteamUser/GetPlayerSummaries/v2/"))
        .and(query_param("key", STEAM_KEY))
        .and(query_param("steamids", ACCOUNT_ID.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"players": [{
                "steamid": ACCOUNT_ID.to_string(),
                "communityvisibilitystate": 2,
                "profilestate": 1,
                "personaname": "trader"
            }]}
        })))
        .mount(&server)
        .await;

    let client = SteamWebApiClient::new(&server.uri(), secret(STEAM_KEY), TIMEOUT).unwrap();
    let user = client.user_summary(ACCOUNT_ID).await.unwrap();
    assert_eq!(user.visibility, CommunityVisibility::FriendsOnly);
    assert!(user.problem().is_some());
}

#[tokio::test]
async fn test_user_summary_no_players() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {"players": []}})))
        .mount(&server)
        .await;

    let client = SteamWebApiClient::new(&server.uri(), secret(STEAM_KEY), TIMEOUT).unwrap();
    let err = client.user_summary(ACCOUNT_ID).await.unwrap_err();
    assert!(err.to_string().contains("No player data"));
}

// -- Listings --

#[tokio::test]
async fn test_listings_request_contract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/listings"))
        .and(query_param("limit", "50"))
        .and(query_param("page", "0"))
        .and(query_param("sort_by", "lowest_price"))
        .and(query_param("market_hash_name", "AK-47 | Slate (Field-Tested)"))
        .and(header("Authorization", "float-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "1", "created_at": "2026-05-01T10:00:00Z", "price": 410, "state": "listed"},
                {"id": "2", "created_at": "2026-05-01T11:00:00Z", "price": 395, "state": "buffered"},
                {"id": "3", "created_at": "2026-05-01T09:00:00Z", "price": 100, "state": "sold"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = CsFloatClient::new(&server.uri(), secret("float-key"), TIMEOUT).unwrap();
    let listings = client
        .fetch_listings("AK-47 | Slate (Field-Tested)")
        .await
        .unwrap();

    assert_eq!(listings.len(), 3);
    assert_eq!(listings[1].state, ListingState::Buffered);
    assert_eq!(listings[2].state, ListingState::Other);
    assert_eq!(inventory_valuer::engine::median_price(&listings).unwrap(), 402);
}

#[tokio::test]
async fn test_listings_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = CsFloatClient::new(&server.uri(), secret("float-key"), TIMEOUT).unwrap();
    let err = client.fetch_listings("Snakebite Case").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("429") && msg.contains("slow down"), "{msg}");
}
