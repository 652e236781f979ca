//! Resource client behaviour against a scripted transport.

mod common;

use common::{resource, ScriptedTransport};
use lexifetch::telemetry::{shared, CacheEvent, FetchEvent, MemorySink, RetryEvent};
use lexifetch::{
    ClientConfig, ErrorKind, Failure, FetchError, ManualClock, Method, ResourceClient, ResourceId,
    TrackingSleeper,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const BASE: &str = "http://upstream.test/api";

fn client_with(
    config: ClientConfig,
    transport: &ScriptedTransport,
    sleeper: &TrackingSleeper,
) -> ResourceClient {
    ResourceClient::builder(config)
        .transport(transport.clone())
        .sleeper(sleeper.clone())
        .build()
        .unwrap()
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"hello": "Hello", "bye": "Goodbye"}));
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    let first = client.get_resource("en", "common").await;
    let second = client.get_resource("en", "common").await;

    assert_eq!(first, resource(json!({"hello": "Hello", "bye": "Goodbye"})));
    assert_eq!(first, second);
    assert_eq!(transport.calls(), 1);
    assert_eq!(transport.requests()[0].url, "http://upstream.test/api/resources/en/common");
}

#[tokio::test]
async fn mutating_a_returned_payload_does_not_touch_the_cache() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"hello": "Hello"}));
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    let mut first = client.get_resource("en", "common").await;
    first.insert("hello".into(), json!("mutated"));

    let second = client.get_resource("en", "common").await;
    assert_eq!(second["hello"], json!("Hello"));
}

#[tokio::test]
async fn server_errors_retry_then_degrade_to_empty() {
    let transport = ScriptedTransport::with_fallback(lexifetch::HttpResponse::new(503, "busy"));
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    let result = client.get_resource("en", "common").await;

    assert!(result.is_empty());
    assert_eq!(transport.calls(), 4);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(300), Duration::from_millis(600), Duration::from_millis(1200)]
    );
    // failures are not cached
    client.get_resource("en", "common").await;
    assert_eq!(transport.calls(), 8);
}

#[tokio::test]
async fn fixed_backoff_keeps_the_delay_constant() {
    let transport = ScriptedTransport::with_fallback(lexifetch::HttpResponse::new(500, ""));
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE)
        .use_exponential_backoff(false)
        .retry_delay(Duration::from_millis(100))
        .max_retries(2)
        .build()
        .unwrap();
    let client = client_with(config, &transport, &sleeper);

    client.get_resource("fr", "common").await;

    assert_eq!(transport.calls(), 3);
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(100); 2]);
}

#[tokio::test]
async fn max_retry_delay_caps_exponential_growth() {
    let transport = ScriptedTransport::with_fallback(lexifetch::HttpResponse::new(500, ""));
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE)
        .max_retries(4)
        .retry_delay(Duration::from_millis(300))
        .max_retry_delay(Duration::from_millis(1000))
        .build()
        .unwrap();
    let client = client_with(config, &transport, &sleeper);

    client.get_resource("fr", "common").await;

    let millis: Vec<u128> = sleeper.delays().iter().map(Duration::as_millis).collect();
    assert_eq!(millis, vec![300, 600, 1000, 1000]);
}

#[tokio::test]
async fn network_failures_recover_on_a_later_attempt() {
    let transport = ScriptedTransport::new();
    let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    transport
        .push(Err(Failure::network(refused)))
        .push(Err(Failure::Timeout { limit: Some(Duration::from_millis(5000)) }))
        .push_json(200, json!({"ok": true}));
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    let result = client.get_resource("de", "common").await;

    assert_eq!(result, resource(json!({"ok": true})));
    assert_eq!(transport.calls(), 3);
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let transport = ScriptedTransport::new();
    transport.push_json(404, json!({"error": "missing"}));
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    let result = client.get_resource("fr", "missing").await;

    assert!(result.is_empty());
    assert_eq!(transport.calls(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn malformed_body_degrades_without_retry() {
    let transport = ScriptedTransport::new();
    transport.push(Ok(lexifetch::HttpResponse::new(200, "<html>oops</html>")));
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    assert!(client.get_resource("en", "common").await.is_empty());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn saving_disabled_fails_without_network() {
    let transport = ScriptedTransport::new();
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    let err = client
        .save_resource("en", "common", &resource(json!({"k": "v"})))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!err.is_retryable());
    assert_eq!(transport.calls(), 0);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn save_writes_through_to_the_cache() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({}));
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE).allow_saving(true).build().unwrap();
    let client = client_with(config, &transport, &sleeper);
    let payload = resource(json!({"greeting": "Bonjour"}));

    client.save_resource("fr", "common", &payload).await.unwrap();
    let read = client.get_resource("fr", "common").await;

    assert_eq!(read, payload);
    assert_eq!(transport.calls(), 1);
    let requests = transport.requests();
    let put = &requests[0];
    assert_eq!(put.method, Method::Put);
    assert_eq!(put.headers.get("Content-Type").map(String::as_str), Some("application/json"));
    let sent: serde_json::Value = serde_json::from_slice(put.body.as_deref().unwrap()).unwrap();
    assert_eq!(sent, json!({"greeting": "Bonjour"}));
}

#[tokio::test]
async fn failed_save_surfaces_the_error_and_leaves_the_cache_alone() {
    let transport = ScriptedTransport::new();
    transport.push_json(403, json!({"error": "forbidden"}));
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE).allow_saving(true).build().unwrap();
    let client = client_with(config, &transport, &sleeper);

    let err = client
        .save_resource("fr", "common", &resource(json!({"a": "b"})))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.attempts(), 1);
    assert!(!client.cache().contains(&ResourceId::new("fr", "common")));
}

#[tokio::test]
async fn save_retries_transient_failures_and_reports_attempts() {
    let transport = ScriptedTransport::with_fallback(lexifetch::HttpResponse::new(502, ""));
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE).allow_saving(true).max_retries(2).build().unwrap();
    let client = client_with(config, &transport, &sleeper);

    let err = client
        .save_resource("fr", "common", &resource(json!({"a": "b"})))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.attempts(), 3);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn disabled_cache_always_fetches() {
    let transport = ScriptedTransport::new();
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE).cache_enabled(false).build().unwrap();
    let client = client_with(config, &transport, &sleeper);

    client.get_resource("en", "common").await;
    client.get_resource("en", "common").await;

    assert_eq!(transport.calls(), 2);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn cache_ttl_expires_entries() {
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let config = ClientConfig::builder(BASE).cache_ttl(Duration::from_millis(1000)).build().unwrap();
    let client = ResourceClient::builder(config)
        .transport(transport.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    client.get_resource("en", "common").await;
    clock.advance(Duration::from_millis(999));
    client.get_resource("en", "common").await;
    assert_eq!(transport.calls(), 1);

    clock.advance(Duration::from_millis(1));
    client.get_resource("en", "common").await;
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn invalidation_forces_refetch_at_each_granularity() {
    let transport = ScriptedTransport::new();
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    for (lang, ns) in [("en", "common"), ("en", "errors"), ("fr", "common")] {
        client.get_resource(lang, ns).await;
    }
    assert_eq!(transport.calls(), 3);

    assert!(client.invalidate("en", "common"));
    assert!(!client.invalidate("en", "common"));
    client.get_resource("en", "errors").await;
    client.get_resource("en", "common").await;
    assert_eq!(transport.calls(), 4);

    assert_eq!(client.invalidate_language("en"), 2);
    client.get_resource("fr", "common").await;
    assert_eq!(transport.calls(), 4);

    client.clear_cache();
    assert!(client.cache().is_empty());
    client.get_resource("fr", "common").await;
    assert_eq!(transport.calls(), 5);
}

#[tokio::test]
async fn error_handler_fallback_is_served_but_not_cached() {
    let transport = ScriptedTransport::with_fallback(lexifetch::HttpResponse::new(404, ""));
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let client = ResourceClient::builder(ClientConfig::new(BASE))
        .transport(transport.clone())
        .error_handler(move |err: &FetchError, id: Option<&ResourceId>| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(err.kind(), ErrorKind::NotFound);
            id.map(|id| resource(json!({"fallback": id.to_string()})))
        })
        .build()
        .unwrap();

    let first = client.get_resource("en", "common").await;
    let second = client.get_resource("en", "common").await;

    assert_eq!(first, resource(json!({"fallback": "en/common"})));
    assert_eq!(first, second);
    assert_eq!(transport.calls(), 2);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn custom_url_builder_and_parser_are_used() {
    let transport = ScriptedTransport::new();
    transport.push(Ok(lexifetch::HttpResponse::new(200, "greeting=Hallo")));
    let client = ResourceClient::builder(ClientConfig::new(BASE))
        .transport(transport.clone())
        .url_builder(|base: &str, id: &ResourceId| {
            format!("{}bundles/{}.{}.json", base, id.namespace(), id.language())
        })
        .parser(|body: &[u8]| {
            let text = String::from_utf8_lossy(body);
            let mut out = lexifetch::Resource::new();
            for pair in text.split('&') {
                if let Some((k, v)) = pair.split_once('=') {
                    out.insert(k.to_string(), json!(v));
                }
            }
            Ok::<_, Failure>(out)
        })
        .build()
        .unwrap();

    let result = client.get_resource("de", "common").await;

    assert_eq!(result, resource(json!({"greeting": "Hallo"})));
    assert_eq!(transport.requests()[0].url, "http://upstream.test/api/bundles/common.de.json");
}

#[tokio::test]
async fn list_endpoints_accept_both_shapes_and_degrade_to_empty() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(200, json!(["en", "fr", "de"]))
        .push_json(200, json!({"namespaces": ["common", "errors"]}))
        .push_json(404, json!({}))
        .push_json(200, json!({"unexpected": true}));
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    assert_eq!(client.get_languages().await, vec!["en", "fr", "de"]);
    assert_eq!(client.get_namespaces().await, vec!["common", "errors"]);
    assert!(client.get_languages().await.is_empty());
    assert!(client.get_namespaces().await.is_empty());

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls[0], "http://upstream.test/api/languages");
    assert_eq!(urls[1], "http://upstream.test/api/namespaces");
}

#[tokio::test]
async fn get_resources_fetches_each_namespace() {
    let transport = ScriptedTransport::new();
    let sleeper = TrackingSleeper::new();
    let client = client_with(ClientConfig::new(BASE), &transport, &sleeper);

    let bundles = client.get_resources("en", &["common", "errors"]).await;

    assert_eq!(bundles.len(), 2);
    assert!(bundles.contains_key("common"));
    assert!(bundles.contains_key("errors"));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn events_describe_cache_and_retry_activity() {
    let transport = ScriptedTransport::new();
    transport.push_json(500, json!({})).push_json(200, json!({"k": "v"}));
    let sink = MemorySink::new();
    let client = ResourceClient::builder(ClientConfig::new(BASE))
        .transport(transport.clone())
        .sleeper(TrackingSleeper::new())
        .sink(shared(sink.clone()))
        .build()
        .unwrap();

    client.get_resource("en", "common").await;
    client.get_resource("en", "common").await;

    let events = sink.events();
    let id = ResourceId::new("en", "common");
    let cache: Vec<&CacheEvent> = events
        .iter()
        .filter_map(|e| match e {
            FetchEvent::Cache(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(
        cache,
        vec![&CacheEvent::miss(&id), &CacheEvent::stored(&id), &CacheEvent::hit(&id)]
    );
    assert!(events.contains(&FetchEvent::Retry(RetryEvent::Scheduled {
        attempt: 1,
        delay: Duration::from_millis(300),
        kind: ErrorKind::Server,
    })));
}

#[tokio::test]
async fn degraded_reads_emit_an_event() {
    let transport = ScriptedTransport::with_fallback(lexifetch::HttpResponse::new(401, ""));
    let sink = MemorySink::new();
    let client = ResourceClient::builder(ClientConfig::new(BASE))
        .transport(transport)
        .sink(shared(sink.clone()))
        .build()
        .unwrap();

    client.get_resource("en", "secret").await;

    assert!(sink.events().contains(&FetchEvent::Degraded {
        url: "http://upstream.test/api/resources/en/secret".into(),
        kind: ErrorKind::Auth,
    }));
}

#[tokio::test]
async fn auto_handle_status_off_parses_any_response() {
    let transport = ScriptedTransport::new();
    transport.push_json(404, json!({"served": "anyway"}));
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE).auto_handle_status(false).build().unwrap();
    let client = client_with(config, &transport, &sleeper);

    let result = client.get_resource("en", "common").await;

    assert_eq!(result, resource(json!({"served": "anyway"})));
}

#[tokio::test]
async fn headers_and_query_params_reach_every_request() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({})).push_json(200, json!(["en"]));
    let sleeper = TrackingSleeper::new();
    let config = ClientConfig::builder(BASE)
        .header("Authorization", "Bearer token")
        .query_param("v", "2")
        .build()
        .unwrap();
    let client = client_with(config, &transport, &sleeper);

    client.get_resource("en", "common").await;
    client.get_languages().await;

    let requests = transport.requests();
    assert_eq!(requests[0].url, "http://upstream.test/api/resources/en/common?v=2");
    assert_eq!(requests[1].url, "http://upstream.test/api/languages?v=2");
    for request in &requests {
        assert_eq!(request.headers["Authorization"], "Bearer token");
        assert_eq!(request.headers["Accept"], "application/json");
    }
    assert_eq!(client.resource_url("en", "common"), requests[0].url);
}

/// Never answers; holds `marker` so tests can tell when the transport is released.
#[derive(Debug)]
struct Stalled {
    _marker: Arc<()>,
}

#[async_trait::async_trait]
impl lexifetch::Transport for Stalled {
    async fn send(
        &self,
        _request: &lexifetch::HttpRequest,
    ) -> Result<lexifetch::HttpResponse, Failure> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn abandoned_coalesced_fetch_releases_the_client() {
    let marker = Arc::new(());
    let config = ClientConfig::builder(BASE).dedupe_requests(true).build().unwrap();
    let client = ResourceClient::builder(config)
        .transport(Stalled { _marker: marker.clone() })
        .build()
        .unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), client.get_resource("en", "common")).await;
    assert!(abandoned.is_err());
    assert_eq!(Arc::strong_count(&marker), 2);

    drop(client);
    assert_eq!(Arc::strong_count(&marker), 1);
}

/// Stalls on the first request, answers every later one.
#[derive(Debug, Default)]
struct StallFirst {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl lexifetch::Transport for StallFirst {
    async fn send(
        &self,
        _request: &lexifetch::HttpRequest,
    ) -> Result<lexifetch::HttpResponse, Failure> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::future::pending::<()>().await;
        }
        Ok(lexifetch::HttpResponse::new(200, r#"{"k":"v"}"#))
    }
}

#[tokio::test]
async fn abandoned_coalesced_fetch_is_not_joined_later() {
    let transport = Arc::new(StallFirst::default());
    let config = ClientConfig::builder(BASE).dedupe_requests(true).build().unwrap();
    let client = ResourceClient::builder(config)
        .shared_transport(transport.clone())
        .build()
        .unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), client.get_resource("en", "common")).await;
    assert!(abandoned.is_err());

    assert_eq!(client.get_resource("en", "common").await, resource(json!({"k": "v"})));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

/// Holds GET responses until released; answers PUTs immediately.
#[derive(Debug, Default)]
struct GatedReads {
    read_started: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[async_trait::async_trait]
impl lexifetch::Transport for GatedReads {
    async fn send(
        &self,
        request: &lexifetch::HttpRequest,
    ) -> Result<lexifetch::HttpResponse, Failure> {
        if request.method == Method::Get {
            self.read_started.notify_one();
            self.release.notified().await;
            return Ok(lexifetch::HttpResponse::new(200, r#"{"greeting":"Hello"}"#));
        }
        Ok(lexifetch::HttpResponse::new(204, ""))
    }
}

#[tokio::test]
async fn read_in_flight_during_save_keeps_the_saved_entry() {
    let gate = Arc::new(GatedReads::default());
    let config = ClientConfig::builder(BASE).allow_saving(true).build().unwrap();
    let client = ResourceClient::builder(config)
        .shared_transport(gate.clone())
        .build()
        .unwrap();
    let saved = resource(json!({"greeting": "Bonjour"}));

    let reader = {
        let client = client.clone();
        tokio::spawn(async move { client.get_resource("fr", "common").await })
    };
    gate.read_started.notified().await;
    client.save_resource("fr", "common", &saved).await.unwrap();
    gate.release.notify_one();

    assert_eq!(reader.await.unwrap(), resource(json!({"greeting": "Hello"})));
    assert_eq!(client.get_resource("fr", "common").await, saved);
}
