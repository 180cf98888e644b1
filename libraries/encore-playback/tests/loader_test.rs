//! Loader timing and coalescing tests
//!
//! Timing tests run on a paused clock so the 10s timeout and 2s retry delay
//! are checked exactly without waiting for them.

mod common;

use common::{url, wait_until, Behavior, Gate, ScriptedBackend};
use encore_core::TrackId;
use encore_playback::{LoadError, LoadPolicy, Loader, PreloadCache};
use std::sync::Arc;
use std::time::Duration;

fn loader(backend: &ScriptedBackend, cache: &Arc<PreloadCache>) -> Loader {
    Loader::new(backend.factory(), Arc::clone(cache), LoadPolicy::default())
}

#[tokio::test]
async fn test_concurrent_requests_share_one_load() {
    let backend = ScriptedBackend::new();
    let (gate, gated) = Gate::new();
    backend.script(&url("a"), gated);
    let cache = Arc::new(PreloadCache::new(5));
    let loader = loader(&backend, &cache);
    let id = TrackId::new("a");

    let first = {
        let (loader, id) = (loader.clone(), id.clone());
        tokio::spawn(async move { loader.acquire(&id, &url("a")).await })
    };
    wait_until("load to start", || loader.is_loading(&id)).await;

    let second = {
        let (loader, id) = (loader.clone(), id.clone());
        tokio::spawn(async move { loader.acquire(&id, &url("a")).await })
    };
    tokio::task::yield_now().await;
    gate.open();

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(backend.attempts(&url("a")), 1);
    assert_eq!(backend.created(), 1);
    assert_eq!(cache.len(), 1);
    assert!(!loader.is_loading(&id));
}

#[tokio::test]
async fn test_coalesced_callers_share_failure() {
    let backend = ScriptedBackend::new();
    backend.script(&url("a"), Behavior::Fail("gone".into()));
    let cache = Arc::new(PreloadCache::new(5));
    let policy = LoadPolicy {
        timeout: Duration::from_millis(200),
        max_attempts: 3,
        retry_delay: Duration::from_millis(20),
    };
    let loader = Loader::new(backend.factory(), Arc::clone(&cache), policy);
    let id = TrackId::new("a");

    let u = url("a");
    let (a, b) = tokio::join!(loader.acquire(&id, &u), loader.acquire(&id, &u));

    assert_eq!(a.unwrap_err(), LoadError::ResourceUnavailable("gone".into()));
    assert_eq!(b.unwrap_err(), LoadError::ResourceUnavailable("gone".into()));
    assert_eq!(backend.attempts(&url("a")), 3);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_source_times_out_three_times() {
    let backend = ScriptedBackend::new();
    backend.script(&url("slow"), Behavior::Hang);
    let cache = Arc::new(PreloadCache::new(5));
    let loader = loader(&backend, &cache);

    let started = tokio::time::Instant::now();
    let err = loader
        .acquire(&TrackId::new("slow"), &url("slow"))
        .await
        .unwrap_err();

    assert_eq!(err, LoadError::Timeout(Duration::from_secs(10)));

    let times = backend.attempt_times(&url("slow"));
    assert_eq!(times.len(), 3);
    // 10s timeout + 2s delay between attempts
    assert_eq!(times[0] - started, Duration::ZERO);
    assert_eq!(times[1] - times[0], Duration::from_secs(12));
    assert_eq!(times[2] - times[1], Duration::from_secs(12));
    assert_eq!(started.elapsed(), Duration::from_secs(34));

    // Every abandoned attempt was released
    assert_eq!(backend.released(), 3);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_retried_after_fixed_delay() {
    let backend = ScriptedBackend::new();
    backend.script(&url("flaky"), Behavior::FailFirst(2));
    let cache = Arc::new(PreloadCache::new(5));
    let loader = loader(&backend, &cache);
    let id = TrackId::new("flaky");

    let handle = loader.acquire(&id, &url("flaky")).await.unwrap();

    let times = backend.attempt_times(&url("flaky"));
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], Duration::from_secs(2));
    assert_eq!(times[2] - times[1], Duration::from_secs(2));

    assert!(handle.is_usable_for(&url("flaky")));
    assert!(cache.contains(&id));
    assert_eq!(backend.released(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy_does_not_retry() {
    let backend = ScriptedBackend::new();
    backend.script(&url("bad"), Behavior::Fail("404".into()));
    let cache = Arc::new(PreloadCache::new(5));
    let policy = LoadPolicy {
        max_attempts: 1,
        ..LoadPolicy::default()
    };
    let loader = Loader::new(backend.factory(), cache, policy);

    let err = loader
        .acquire(&TrackId::new("bad"), &url("bad"))
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::ResourceUnavailable(_)));
    assert_eq!(backend.attempts(&url("bad")), 1);
}

#[tokio::test]
async fn test_preload_warms_cache_in_background() {
    let backend = ScriptedBackend::new();
    let cache = Arc::new(PreloadCache::new(5));
    let loader = loader(&backend, &cache);
    let id = TrackId::new("next");

    loader.preload(id.clone(), url("next"));
    wait_until("preload to land", || cache.contains(&id)).await;

    let handle = loader.acquire(&id, &url("next")).await.unwrap();
    assert!(handle.is_usable_for(&url("next")));
    assert_eq!(backend.attempts(&url("next")), 1);
}

#[tokio::test]
async fn test_released_cache_entry_is_reloaded() {
    let backend = ScriptedBackend::new();
    let cache = Arc::new(PreloadCache::new(1));
    let loader = loader(&backend, &cache);
    let (a, b) = (TrackId::new("a"), TrackId::new("b"));

    loader.acquire(&a, &url("a")).await.unwrap();
    loader.acquire(&b, &url("b")).await.unwrap();
    assert!(!cache.contains(&a));

    let handle = loader.acquire(&a, &url("a")).await.unwrap();
    assert!(handle.is_usable_for(&url("a")));
    assert_eq!(backend.attempts(&url("a")), 2);
}
