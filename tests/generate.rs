//! Facade behavior over real HTTP: wire contract, response caching, retry
//! exhaustion, circuit-breaker fail-fast and warm-up, all against a mockito
//! server standing in for the model runner.

use std::sync::Arc;
use std::time::Duration;

use genguard::{BreakerConfig, Error, GenClient, GenerationRequest, RetryConfig};
use mockito::{Matcher, Server, ServerGuard};

const OK_BODY: &str = r#"{"response":"Paris, obviously.","done":true}"#;

fn fast_retry() -> RetryConfig {
    RetryConfig::new().with_base_delay(Duration::from_millis(10))
}

fn client_for(server: &ServerGuard) -> GenClient {
    GenClient::builder()
        .base_url(server.url())
        .default_model("llama3")
        .default_temperature(0.5)
        .default_max_tokens(64)
        .timeout(Duration::from_secs(2))
        .retry(fast_retry())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_generate_round_trip_matches_wire_contract() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_header("content-type", "application/json")
        .match_header(
            "x-genguard-request-id",
            Matcher::Regex("^[0-9a-f-]{36}$".to_string()),
        )
        .match_body(Matcher::Json(serde_json::json!({
            "model": "llama3",
            "prompt": "### Task:\nCapital of France?\n\n### Role:\nAnswer in one word",
            "stream": false,
            "options": {"temperature": 0.5, "num_predict": 64}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(OK_BODY)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let response = client
        .generate(GenerationRequest::new("Capital of France?").system_prompt("Answer in one word"))
        .await
        .unwrap();

    assert_eq!(response.text, "Paris, obviously.");
    assert!(response.done);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(r#"{"response":"Summary of the notes.","done":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let request = GenerationRequest::new("Summarize: patient presented with mild symptoms")
        .model("m1")
        .temperature(0.2);

    let first = client.generate(request.clone()).await.unwrap();
    let second = client.generate(request).await.unwrap();

    assert_eq!(first.text, "Summary of the notes.");
    assert_eq!(second.text, first.text);
    assert!(second.done);
    // Exactly one network call; the repeat was answered from memory.
    mock.assert_async().await;

    let signals = client.signals();
    assert_eq!(signals.cache.hits, 1);
    assert_eq!(signals.cache.misses, 1);
    assert_eq!(signals.cache.entries, 1);
}

#[tokio::test]
async fn test_non_2xx_body_reaches_the_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(500)
        .with_body("model exploded: out of VRAM")
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .generate(GenerationRequest::new("hi"))
        .await
        .unwrap_err();

    match &err {
        Error::RetryExhausted {
            attempts, source, ..
        } => {
            assert_eq!(*attempts, 3);
            match source.as_ref() {
                Error::UpstreamStatus { status, body, .. } => {
                    assert_eq!(*status, 500);
                    assert!(body.contains("out of VRAM"));
                }
                other => panic!("expected UpstreamStatus, got {other:?}"),
            }
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(err.upstream_status(), Some(500));
    assert!(err.to_string().contains("3 attempts"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_recovers_once_upstream_heals() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("POST", "/api/generate")
        .with_status(503)
        .with_body("loading model")
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .generate(GenerationRequest::new("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
    failing.assert_async().await;
    failing.remove_async().await;

    // Upstream heals. The identical request goes out fresh (failures are
    // never cached) and succeeds; three failures stay under the default
    // threshold of five, so the breaker never opened.
    let ok = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(OK_BODY)
        .expect(1)
        .create_async()
        .await;
    let response = client.generate(GenerationRequest::new("hi")).await.unwrap();
    assert_eq!(response.text, "Paris, obviously.");
    ok.assert_async().await;

    assert_eq!(client.signals().breaker.failure_count, 0);
}

#[tokio::test]
async fn test_open_circuit_fails_fast_but_serves_cache_hits() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(r#"{"response":"cached answer","done":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = GenClient::builder()
        .base_url(server.url())
        .timeout(Duration::from_secs(2))
        .retry(fast_retry().with_max_attempts(2))
        .breaker(BreakerConfig::new().with_failure_threshold(2))
        .build()
        .unwrap();

    // Seed the cache while the upstream is healthy.
    let seeded = GenerationRequest::new("seeded prompt");
    client.generate(seeded.clone()).await.unwrap();
    ok.assert_async().await;
    ok.remove_async().await;

    // Upstream dies: one call burns two attempts, tripping the breaker.
    let failing = server
        .mock("POST", "/api/generate")
        .with_status(503)
        .with_body("down")
        .expect(2)
        .create_async()
        .await;
    let err = client
        .generate(GenerationRequest::new("fresh prompt"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { .. }));
    failing.assert_async().await;

    // Open breaker refuses new prompts without touching the network.
    let refused = client
        .generate(GenerationRequest::new("another prompt"))
        .await
        .unwrap_err();
    match refused {
        Error::CircuitOpen { base_url, retry_in } => {
            assert_eq!(base_url, server.url());
            assert!(retry_in > Duration::ZERO);
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }

    // The seeded prompt still answers from cache while the breaker is open.
    let cached = client.generate(seeded).await.unwrap();
    assert_eq!(cached.text, "cached answer");
    assert!(cached.done);

    // Still exactly two hits on the failing mock.
    failing.assert_async().await;
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    use std::io::Write;

    let mut server = Server::new_async().await;
    let _slow = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_chunked_body(|writer| {
            std::thread::sleep(Duration::from_millis(500));
            writer.write_all(b"{\"response\":\"too late\",\"done\":true}")
        })
        .create_async()
        .await;

    let client = GenClient::builder()
        .base_url(server.url())
        .timeout(Duration::from_millis(100))
        .retry(RetryConfig::new().with_max_attempts(1))
        .build()
        .unwrap();

    let err = client
        .generate(GenerationRequest::new("hi"))
        .await
        .unwrap_err();
    match err {
        Error::RetryExhausted {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*source, Error::Timeout { .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transport_class() {
    // Grab a loopback port with nothing listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = GenClient::builder()
        .base_url(&base_url)
        .timeout(Duration::from_millis(500))
        .retry(fast_retry().with_max_attempts(2))
        .build()
        .unwrap();

    let err = client
        .generate(GenerationRequest::new("hi"))
        .await
        .unwrap_err();
    match err {
        Error::RetryExhausted {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 2);
            assert!(source.is_transport_class());
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_warmup_issues_one_low_token_call() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "stream": false,
            "options": {"num_predict": 8}
        })))
        .with_status(200)
        .with_body(r#"{"response":"ready","done":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    client.warmup().await;
    mock.assert_async().await;

    // The warm-up completion is cached like any other.
    assert_eq!(client.signals().cache.insertions, 1);
}

#[tokio::test]
async fn test_warmup_never_raises() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("POST", "/api/generate")
        .with_status(500)
        .with_body("no model loaded")
        .expect(3)
        .create_async()
        .await;

    let client = Arc::new(client_for(&server));
    // Must complete quietly even though every attempt fails.
    client.spawn_warmup().await.unwrap();
    failing.assert_async().await;
    failing.remove_async().await;

    // The client is still fully usable afterwards.
    let ok = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(OK_BODY)
        .expect(1)
        .create_async()
        .await;
    client
        .generate(GenerationRequest::new("real work"))
        .await
        .unwrap();
    ok.assert_async().await;
}

#[tokio::test]
async fn test_list_models_parses_tags() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(
            r#"{"models":[{"name":"llama3:8b","size":4661224676},{"name":"mistral:latest"}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let models = client.list_models().await.unwrap();
    assert_eq!(models, vec!["llama3:8b", "mistral:latest"]);
    mock.assert_async().await;
}
