use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

mod common;
use common::{gateway, seeded_store};
use erp_gateway::CredentialStore;

fn auth_header(req: &Request) -> String {
    req.headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn retried_request_carries_new_token() {
    let server = MockServer::start().await;
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();

    Mock::given(method("GET"))
        .and(path("/invoices/"))
        .respond_with(move |req: &Request| {
            let auth = auth_header(req);
            recorded.lock().unwrap().push(auth.clone());
            if auth == "Bearer fresh" {
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "results": [{ "id": 7 }] }))
            } else {
                ResponseTemplate::new(401)
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access": "fresh" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = seeded_store("stale");
    let gw = gateway(&server.uri(), store.clone());

    let resp = gw.get("/invoices/").await.expect("request recovers");
    assert_eq!(resp.status(), 200);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec!["Bearer stale".to_string(), "Bearer fresh".to_string()],
        "original goes out stale, the single retry carries the new token"
    );
    assert_eq!(store.access_token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn five_concurrent_401s_make_exactly_one_refresh_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/purchase-orders/"))
        .respond_with(move |req: &Request| {
            if auth_header(req) == "Bearer fresh" {
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] }))
            } else {
                ResponseTemplate::new(401)
            }
        })
        .expect(10)
        .mount(&server)
        .await;

    // Long enough for every 401 to join the flight as a waiter.
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access": "fresh" }))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = seeded_store("stale");
    let gw = gateway(&server.uri(), store);

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let gw = gw.clone();
            tokio::spawn(async move { gw.get("/purchase-orders/").await })
        })
        .collect();

    for handle in handles {
        let resp = handle
            .await
            .expect("task completes")
            .expect("request recovers");
        assert_eq!(resp.status(), 200);
    }
}
