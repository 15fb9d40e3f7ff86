//! Integration tests for sessionkit-core

use sessionkit_core::*;
use sessionkit_securecookie::{CodecSet, KeyPair};
use std::sync::Arc;

fn keys() -> Vec<KeyPair> {
    vec![KeyPair::new(vec![11u8; 32]).with_block_key(vec![12u8; 16])]
}

async fn cache_store(cache: Arc<MemoryCache>) -> CacheStore {
    let config = CacheStoreConfig::single("memory", keys());
    CacheStore::with_backend(cache, config).await.unwrap()
}

fn next_request(ctx: &RequestContext) -> RequestContext {
    let cookies: Vec<(String, String)> = ctx
        .response_cookies()
        .into_iter()
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect();
    RequestContext::from_cookies(cookies)
}

#[tokio::test]
async fn test_cluster_config_rejected_before_connecting() {
    let config = CacheStoreConfig::cluster(["a:7000", "b:7000", "c:7000"], keys());
    match CacheStore::connect(config).await {
        Err(SessionError::Config(message)) => assert!(message.contains("at least 6")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("connected with an invalid cluster configuration"),
    }
}

#[tokio::test]
async fn test_single_config_rejects_many_addresses() {
    let mut config = CacheStoreConfig::single("a:6379", keys());
    config.addresses.push("b:6379".to_string());
    assert!(matches!(
        CacheStore::connect(config).await,
        Err(SessionError::Config(_))
    ));
}

#[tokio::test]
async fn test_missing_keys_rejected() {
    let config = CacheStoreConfig::single("memory", Vec::new());
    let result = CacheStore::with_backend(Arc::new(MemoryCache::new()), config).await;
    assert!(matches!(result, Err(SessionError::Config(_))));
}

#[tokio::test]
async fn test_two_named_sessions_in_one_request() {
    let store = cache_store(Arc::new(MemoryCache::new())).await;
    let ctx = RequestContext::new();

    for (name, value) in [("cart", "apples"), ("prefs", "dark")] {
        let record = store.get(&ctx, name).await.unwrap();
        let mut record = record.lock().await;
        record.set("v", value).unwrap();
        store.save(&ctx, &mut record).await.unwrap();
    }
    assert_eq!(ctx.response_cookies().len(), 2);

    let next = next_request(&ctx);
    let cart = store.new_session(&next, "cart").await.unwrap();
    let prefs = store.new_session(&next, "prefs").await.unwrap();
    assert_eq!(cart.get::<String>("v"), Some("apples".to_string()));
    assert_eq!(prefs.get::<String>("v"), Some("dark".to_string()));
    assert_ne!(cart.id, prefs.id);
}

#[tokio::test]
async fn test_cookie_for_one_name_rejected_under_another() {
    let store = cache_store(Arc::new(MemoryCache::new())).await;
    let ctx = RequestContext::new();
    let mut record = store.new_session(&ctx, "sid").await.unwrap();
    store.save(&ctx, &mut record).await.unwrap();

    let value = ctx.response_cookies()[0].value().to_string();
    let swapped = RequestContext::from_cookies([("other", value)]);
    let loaded = store.new_session(&swapped, "other").await.unwrap();
    assert!(loaded.is_new);
}

#[tokio::test]
async fn test_key_rotation_keeps_sessions() {
    let cache = Arc::new(MemoryCache::new());
    let old = cache_store(cache.clone()).await;
    let ctx = RequestContext::new();
    let mut record = old.new_session(&ctx, "sid").await.unwrap();
    record.set("user", 5).unwrap();
    old.save(&ctx, &mut record).await.unwrap();

    let rotated_keys = vec![KeyPair::new(vec![99u8; 32])]
        .into_iter()
        .chain(keys())
        .collect();
    let config = CacheStoreConfig::single("memory", rotated_keys);
    let rotated = CacheStore::with_backend(cache, config).await.unwrap();

    let loaded = rotated.new_session(&next_request(&ctx), "sid").await.unwrap();
    assert!(!loaded.is_new);
    assert_eq!(loaded.get::<i32>("user"), Some(5));
}

#[tokio::test]
async fn test_stored_payload_is_encrypted() {
    let cache = Arc::new(MemoryCache::new());
    let store = cache_store(cache.clone()).await;
    let ctx = RequestContext::new();
    let mut record = store.new_session(&ctx, "sid").await.unwrap();
    record.set("secret", "hunter2").unwrap();
    store.save(&ctx, &mut record).await.unwrap();

    let raw = cache
        .get(&format!("{}{}", DEFAULT_KEY_PREFIX, record.id))
        .await
        .unwrap()
        .unwrap();
    assert!(!raw.contains("hunter2"));

    let codecs = CodecSet::from_pairs(&keys()).unwrap();
    let id: String = codecs
        .decode("sid", ctx.response_cookies()[0].value())
        .unwrap();
    assert_eq!(id, record.id);
}

#[tokio::test]
async fn test_document_store_lifecycle() {
    let documents = Arc::new(MemoryDocuments::new());
    let config = DocumentStoreConfig::new(600, false, keys());
    let store = DocumentStore::with_backend(documents.clone(), config).await.unwrap();
    assert!(documents.ttl_index().is_none());

    let ctx = RequestContext::new();
    let mut record = store.new_session(&ctx, "sid").await.unwrap();
    record.add_flash("welcome", None).unwrap();
    store.save(&ctx, &mut record).await.unwrap();
    assert_eq!(documents.len(), 1);

    let next = next_request(&ctx);
    let mut loaded = store.new_session(&next, "sid").await.unwrap();
    assert_eq!(loaded.flashes(None), vec![serde_json::json!("welcome")]);

    loaded.options = loaded.options.clone().with_max_age(-1);
    store.save(&next, &mut loaded).await.unwrap();
    assert!(documents.is_empty());
}

#[tokio::test]
async fn test_set_options_changes_new_sessions() {
    let store = cache_store(Arc::new(MemoryCache::new())).await;
    store.set_options(CookieOptions::new().with_path("/app").with_secure(true));

    let ctx = RequestContext::new();
    let mut record = store.new_session(&ctx, "sid").await.unwrap();
    store.save(&ctx, &mut record).await.unwrap();

    let cookie = &ctx.response_cookies()[0];
    assert_eq!(cookie.path(), Some("/app"));
    assert_eq!(cookie.secure(), Some(true));
}

#[test]
fn test_error_display() {
    let err = SessionError::PayloadTooLarge {
        length: 5000,
        max: 4096,
    };
    assert!(err.to_string().contains("5000"));

    let err = SessionError::Config("bad".to_string());
    assert_eq!(err.to_string(), "Configuration error: bad");
}

// These tests require live servers.
// Run with: cargo test -- --ignored

#[tokio::test]
#[ignore]
async fn test_redis_store_round_trip() {
    let store = CacheStore::connect(CacheStoreConfig::single("localhost:6379", keys()))
        .await
        .unwrap();
    let ctx = RequestContext::new();
    let mut record = store.new_session(&ctx, "sid").await.unwrap();
    record.set("n", 1).unwrap();
    store.save(&ctx, &mut record).await.unwrap();

    let loaded = store.new_session(&next_request(&ctx), "sid").await.unwrap();
    assert_eq!(loaded.get::<i32>("n"), Some(1));
    store.close().await.unwrap();
}
