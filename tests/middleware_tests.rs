//! Tests of the axum payment gate against a mock facilitator

#![cfg(feature = "axum")]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    response::Response,
    routing::get,
    Router,
};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use x402_lite::{
    middleware::{payment_middleware, PaymentGate},
    server::{INVALID_PAYMENT_ERROR, PAYMENT_REQUIRED_ERROR},
    FacilitatorConfig, Network, PaymentEnvelope, PaymentHandler, PaymentPayload,
    PaymentRequirements, PaymentScheme, ServerConfig,
};

const TREASURY: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

struct Harness {
    app: Router,
    hits: Arc<AtomicUsize>,
    verified: Arc<AtomicUsize>,
}

fn harness(facilitator_url: String) -> Harness {
    let handler = Arc::new(
        PaymentHandler::new(
            ServerConfig::new(Network::BaseSepolia, TREASURY)
                .with_facilitator(FacilitatorConfig::new(facilitator_url)),
        )
        .unwrap(),
    );

    let hits = Arc::new(AtomicUsize::new(0));
    let verified = Arc::new(AtomicUsize::new(0));

    let gate = PaymentGate::new(handler, "1000").on_payment_verified({
        let verified = verified.clone();
        move |_envelope| {
            verified.fetch_add(1, Ordering::SeqCst);
        }
    });

    let app = Router::new()
        .route(
            "/premium",
            get({
                let hits = hits.clone();
                move || async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "premium content"
                }
            }),
        )
        .layer(from_fn_with_state(gate, payment_middleware));

    Harness {
        app,
        hits,
        verified,
    }
}

fn payment_header() -> String {
    payment_header_for(PaymentRequirements::new(
        PaymentScheme::Exact,
        Network::BaseSepolia,
        "1000",
        TREASURY,
        "/premium",
    ))
}

fn payment_header_for(requirements: PaymentRequirements) -> String {
    let mut payload = Map::new();
    payload.insert("signature".to_string(), json!("0x00"));
    let payload = PaymentPayload::new(PaymentScheme::Exact, Network::BaseSepolia, payload);
    PaymentEnvelope::new(payload, requirements)
        .to_header_value()
        .unwrap()
}

fn request(payment: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().uri("/premium");
    if let Some(payment) = payment {
        builder = builder.header("X-Payment", payment);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mock_verify(server: &mut ServerGuard, status: usize, body: serde_json::Value) -> Mock {
    server
        .mock("POST", "/verify")
        .match_body(Matcher::PartialJson(json!({
            "x402Version": 1,
            "paymentRequirements": {
                "scheme": "exact",
                "network": "base-sepolia",
                "maxAmountRequired": "1000",
                "payTo": TREASURY,
                "resource": "/premium"
            }
        })))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

/// Settlement runs on a detached task, so give it a moment to arrive
async fn wait_for(mock: &Mock) {
    for _ in 0..100 {
        if mock.matched_async().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_missing_payment_gets_challenge() {
    let mut server = Server::new_async().await;
    let verify = server
        .mock("POST", "/verify")
        .expect(0)
        .create_async()
        .await;
    let h = harness(server.url());

    let response = h.app.oneshot(request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["error"], PAYMENT_REQUIRED_ERROR);
    assert_eq!(body["x402Version"], 1);
    assert_eq!(body["paymentRequirements"]["scheme"], "exact");
    assert_eq!(body["paymentRequirements"]["maxAmountRequired"], "1000");
    assert_eq!(body["paymentRequirements"]["payTo"], TREASURY);
    assert_eq!(body["paymentRequirements"]["resource"], "/premium");

    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
    verify.assert_async().await;
}

#[tokio::test]
async fn test_malformed_payment_gets_challenge() {
    let server = Server::new_async().await;
    let h = harness(server.url());

    let response = h
        .app
        .oneshot(request(Some("garbage".to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["error"], PAYMENT_REQUIRED_ERROR);
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_payment_gets_invalid_402() {
    let mut server = Server::new_async().await;
    let verify = mock_verify(
        &mut server,
        200,
        json!({ "isValid": false, "error": "insufficient_funds" }),
    )
    .await;
    let settle = server
        .mock("POST", "/settle")
        .expect(0)
        .create_async()
        .await;
    let h = harness(server.url());

    let response = h.app.oneshot(request(Some(payment_header()))).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["error"], INVALID_PAYMENT_ERROR);
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
    assert_eq!(h.verified.load(Ordering::SeqCst), 0);
    verify.assert_async().await;
    settle.assert_async().await;
}

#[tokio::test]
async fn test_verify_outage_fails_closed() {
    let mut server = Server::new_async().await;
    let _verify = mock_verify(&mut server, 503, json!({ "isValid": true })).await;
    let h = harness(server.url());

    let response = h.app.oneshot(request(Some(payment_header()))).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["error"], INVALID_PAYMENT_ERROR);
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_is_valid_fails_closed() {
    let mut server = Server::new_async().await;
    let _verify = mock_verify(&mut server, 200, json!({ "payer": "0xabc" })).await;
    let h = harness(server.url());

    let response = h.app.oneshot(request(Some(payment_header()))).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_valid_payment_serves_and_settles_once() {
    let mut server = Server::new_async().await;
    let verify = mock_verify(&mut server, 200, json!({ "isValid": true, "payer": "0xabc" })).await;
    let settle = server
        .mock("POST", "/settle")
        .match_body(Matcher::PartialJson(json!({
            "x402Version": 1,
            "paymentPayload": { "scheme": "exact", "network": "base-sepolia" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "isValid": true, "transactionHash": "0xfeed" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let h = harness(server.url());

    let response = h.app.oneshot(request(Some(payment_header()))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"premium content");
    assert_eq!(h.hits.load(Ordering::SeqCst), 1);
    assert_eq!(h.verified.load(Ordering::SeqCst), 1);
    verify.assert_async().await;

    wait_for(&settle).await;
    settle.assert_async().await;
}

#[tokio::test]
async fn test_non_ascii_payment_is_served() {
    let mut server = Server::new_async().await;
    let verify = mock_verify(&mut server, 200, json!({ "isValid": true })).await;
    let _settle = server
        .mock("POST", "/settle")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "isValid": true }).to_string())
        .create_async()
        .await;
    let h = harness(server.url());

    let header = payment_header_for(
        PaymentRequirements::new(
            PaymentScheme::Exact,
            Network::BaseSepolia,
            "1000",
            TREASURY,
            "/premium",
        )
        .with_description("Données météo"),
    );
    let response = h.app.oneshot(request(Some(header))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.hits.load(Ordering::SeqCst), 1);
    verify.assert_async().await;
}

#[tokio::test]
async fn test_settlement_failure_does_not_reach_requester() {
    let mut server = Server::new_async().await;
    let _verify = mock_verify(&mut server, 200, json!({ "isValid": true })).await;
    let settle = server
        .mock("POST", "/settle")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let h = harness(server.url());

    let response = h.app.oneshot(request(Some(payment_header()))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.hits.load(Ordering::SeqCst), 1);

    wait_for(&settle).await;
    settle.assert_async().await;
}

#[tokio::test]
async fn test_fixed_resource_overrides_path() {
    let mut server = Server::new_async().await;
    let verify = server
        .mock("POST", "/verify")
        .expect(0)
        .create_async()
        .await;

    let handler = Arc::new(
        PaymentHandler::new(
            ServerConfig::new(Network::BaseSepolia, TREASURY)
                .with_facilitator(FacilitatorConfig::new(server.url())),
        )
        .unwrap(),
    );
    let gate = handler.middleware("77", Some("urn:report:weekly".to_string()), None);
    let app = Router::new()
        .route("/premium", get(|| async { "report" }))
        .layer(from_fn_with_state(gate, payment_middleware));

    let response = app.oneshot(request(None)).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["paymentRequirements"]["resource"], "urn:report:weekly");
    assert_eq!(body["paymentRequirements"]["maxAmountRequired"], "77");
    verify.assert_async().await;
}
