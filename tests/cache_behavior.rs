//! Behavior tests for the local cache of expensive fetches.

use std::sync::Arc;
use std::time::Duration;

use pantry_core::{
    CacheKey, FileStore, Freshness, KeyValueStore, LocalCache, ManualClock, Screen, ViewState,
};
use serde_json::{json, Value};
use tempfile::tempdir;

use pantry_tests::{Harness, START};

const MINUTE: Duration = Duration::from_secs(60);

fn ready_view(screen: &Screen) -> (&Value, Freshness) {
    match screen.state() {
        ViewState::Ready(view) => (&view.data, view.freshness),
        other => panic!("expected ready view, got {other:?}"),
    }
}

#[tokio::test]
async fn when_dashboard_was_fetched_thirty_minutes_ago_system_serves_cache_without_network() {
    // Given: a dashboard cached half an hour ago
    let harness = Harness::new().signed_in();
    harness
        .client
        .cache()
        .write(CacheKey::Dashboard, &json!({"totalItems": 12}))
        .await
        .expect("write");
    harness.clock.advance(30 * MINUTE);

    // When: the dashboard is opened
    let mut screen = Screen::new();
    harness
        .client
        .dashboard(&mut screen, false)
        .await
        .expect("flow runs");

    // Then: the cached value is shown and nothing was requested
    let (data, freshness) = ready_view(&screen);
    assert_eq!(data, &json!({"totalItems": 12}));
    assert_eq!(freshness, Freshness::Cached);
    assert!(harness.http.requests().is_empty());
}

#[tokio::test]
async fn when_dashboard_was_fetched_ninety_minutes_ago_system_fetches_again() {
    // Given: a dashboard cached an hour and a half ago
    let harness = Harness::new().signed_in();
    harness
        .client
        .cache()
        .write(CacheKey::Dashboard, &json!({"totalItems": 12}))
        .await
        .expect("write");
    harness.clock.advance(90 * MINUTE);
    harness
        .http
        .reply("GET /users/data-fetch-status", 200, json!({"status": "completed"}))
        .reply("GET /dashboard", 200, json!({"totalItems": 15}));

    // When: the dashboard is opened
    let mut screen = Screen::new();
    harness
        .client
        .dashboard(&mut screen, false)
        .await
        .expect("flow runs");

    // Then: the new value is shown and replaces the cache entry
    let (data, freshness) = ready_view(&screen);
    assert_eq!(data, &json!({"totalItems": 15}));
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(harness.http.count("GET /dashboard"), 1);

    let entry = harness
        .client
        .cache()
        .read(CacheKey::Dashboard)
        .await
        .expect("read")
        .expect("present");
    assert_eq!(entry.value, json!({"totalItems": 15}));
    assert!(harness
        .client
        .cache()
        .is_fresh(&entry, Duration::from_millis(1)));
}

#[tokio::test]
async fn when_user_asks_for_refresh_system_ignores_fresh_cache() {
    // Given: a dashboard cached a minute ago
    let harness = Harness::new().signed_in();
    harness
        .client
        .cache()
        .write(CacheKey::Dashboard, &json!({"totalItems": 1}))
        .await
        .expect("write");
    harness.clock.advance(MINUTE);
    harness
        .http
        .reply("GET /users/data-fetch-status", 200, json!({"status": "completed"}))
        .reply("GET /dashboard", 200, json!({"totalItems": 2}));

    // When: the user forces a refresh
    let mut screen = Screen::new();
    harness
        .client
        .dashboard(&mut screen, true)
        .await
        .expect("flow runs");

    // Then: the network result wins
    let (data, freshness) = ready_view(&screen);
    assert_eq!(data, &json!({"totalItems": 2}));
    assert_eq!(freshness, Freshness::Live);
}

#[tokio::test]
async fn when_only_filtered_trends_are_requested_system_does_not_cache_them() {
    // Given: a signed-in user asking for one product's trend
    let harness = Harness::new().signed_in();
    harness.http.reply(
        "GET /dashboard/price-trends?productId=milk-1l&days=30",
        200,
        json!({"points": [1.99, 2.09]}),
    );

    // When: the filtered trend is shown
    let mut screen = Screen::new();
    let query = pantry_core::PriceTrendQuery {
        product_id: Some(String::from("milk-1l")),
        days: Some(30),
    };
    harness
        .client
        .price_trends(&mut screen, &query, false)
        .await
        .expect("flow runs");

    // Then: it is displayed but the cache stays empty
    assert_eq!(ready_view(&screen).1, Freshness::Live);
    assert_eq!(
        harness
            .client
            .cache()
            .read(CacheKey::PriceTrends)
            .await
            .expect("read"),
        None
    );
}

#[tokio::test]
async fn when_user_logs_out_system_forgets_session_and_cached_data() {
    // Given: a signed-in user with cached data
    let harness = Harness::new().signed_in();
    harness
        .client
        .cache()
        .write(CacheKey::PriceTrends, &json!({"points": []}))
        .await
        .expect("write");
    harness.store.set("myList", "[]").expect("set");

    // When: they log out
    harness.client.logout().await.expect("logout");

    // Then: nothing from the session survives
    assert!(harness.store.is_empty());
    assert!(!harness
        .client
        .session()
        .is_authenticated()
        .expect("read session"));
}

#[tokio::test]
async fn when_state_file_is_reopened_system_keeps_cache_entries() {
    // Given: a cache entry written through a file-backed store
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("pantry").join("state.json");
    let clock = ManualClock::new(START);

    let written = {
        let store = Arc::new(FileStore::open(&path).expect("open"));
        let cache = LocalCache::new(store, Arc::new(clock.clone()));
        cache
            .write(CacheKey::Dashboard, &json!({"stores": ["North", "South"]}))
            .await
            .expect("write")
    };

    // When: the store is opened again
    let store = Arc::new(FileStore::open(&path).expect("reopen"));
    let cache = LocalCache::new(store.clone(), Arc::new(clock));

    // Then: value and timestamp come back under their persisted keys
    let read = cache
        .read(CacheKey::Dashboard)
        .await
        .expect("read")
        .expect("present");
    assert_eq!(read, written);
    assert_eq!(
        store.get("lastFetchTime").expect("get"),
        Some(START.to_string())
    );
}

#[tokio::test]
async fn when_cache_cannot_be_written_system_still_shows_fetched_dashboard() {
    // Given: a signed-in user whose storage rejects writes
    let harness = Harness::with_full_disk().signed_in();
    harness
        .http
        .reply("GET /users/data-fetch-status", 200, json!({"status": "completed"}))
        .reply("GET /dashboard", 200, json!({"totalItems": 15}));

    // When: the dashboard is opened
    let mut screen = Screen::new();
    harness
        .client
        .dashboard(&mut screen, false)
        .await
        .expect("flow runs");

    // Then: the fetched value is shown even though it was not cached
    let (data, freshness) = ready_view(&screen);
    assert_eq!(data, &json!({"totalItems": 15}));
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(
        harness
            .client
            .cache()
            .read(CacheKey::Dashboard)
            .await
            .expect("read"),
        None
    );
}
