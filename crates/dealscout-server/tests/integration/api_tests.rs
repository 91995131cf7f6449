use std::time::Duration;

use axum::http::StatusCode;

use dealscout_core::testutil::{MockProvider, raw};

use crate::common::{body_json, body_text, get, ps5_app, setup_test_app};

#[tokio::test]
async fn health_returns_200() {
    let response = get(ps5_app(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["uptime_sec"].is_u64());
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let response = get(ps5_app(), "/health").await;
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["cross-origin-resource-policy"], "same-site");
}

#[tokio::test]
async fn robots_disallows_search() {
    let response = get(ps5_app(), "/robots.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.starts_with("User-agent: *"));
    assert!(text.contains("Disallow: /v1/search\n"));
    assert!(text.contains("Disallow: /v1/search/stream"));
}

#[tokio::test]
async fn providers_are_listed() {
    let response = get(ps5_app(), "/v1/providers").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["providers"][0]["id"], "a");
    assert_eq!(json["providers"][0]["name"], "Alpha");
    assert_eq!(json["providers"][0]["weight"], 90);
}

#[tokio::test]
async fn search_returns_ranked_results_and_summary() {
    let response = get(ps5_app(), "/v1/search?q=PS5").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let titles: Vec<_> = json["results"]["listings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["PlayStation 5 Console", "PS5 Controller"]);
    assert_eq!(json["results"]["sort"], "relevance");

    let summary = &json["summary"];
    assert_eq!(summary["query"], "PS5");
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["failed"], 1);
    let failed = summary["providers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["provider_id"] == "c")
        .unwrap();
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error_kind"], "network");
}

#[tokio::test]
async fn search_honours_sort_param() {
    let response = get(ps5_app(), "/v1/search?q=PS5&sort=price_low").await;
    let json = body_json(response).await;
    assert_eq!(json["results"]["sort"], "price_low");
    assert_eq!(json["results"]["listings"][0]["title"], "PS5 Controller");
}

#[tokio::test]
async fn missing_query_returns_400() {
    let response = get(ps5_app(), "/v1/search").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_query");
}

#[tokio::test]
async fn blank_query_returns_400_for_stream() {
    let response = get(ps5_app(), "/v1/search/stream?q=%20%20").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stream_sends_ordered_events_and_ends_after_close() {
    let response = get(ps5_app(), "/v1/search/stream?q=PS5").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );
    assert_eq!(response.headers()["cache-control"], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let text = body_text(response).await;
    let events: Vec<serde_json::Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();

    let seqs: Vec<u64> = events.iter().map(|e| e["seq"].as_u64().unwrap()).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]), "{seqs:?}");

    let kinds: Vec<&str> = events.iter().map(|e| e["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds.iter().filter(|k| **k == "provider-done").count(), 3);
    assert_eq!(&kinds[kinds.len() - 2..], ["final-results", "session-closed"]);
    assert_eq!(events.last().unwrap()["payload"]["reason"], "completed");
}

#[tokio::test]
async fn search_with_no_providers_still_answers() {
    let response = get(setup_test_app(Vec::new()), "/v1/search?q=switch").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["results"]["total"], 0);
    assert_eq!(json["summary"]["providers"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn limit_param_caps_listings_per_provider() {
    let listings = (0..10)
        .map(|i| raw(&format!("Switch Lite {i}"), 199.0 + f64::from(i)))
        .collect();
    let app = setup_test_app(vec![
        MockProvider::delayed("a", Duration::from_millis(5), listings),
    ]);

    let response = get(app, "/v1/search?q=switch&limit=2").await;
    let json = body_json(response).await;
    // Below the minimum, so the cap is raised to 5.
    assert_eq!(json["results"]["total"], 5);
}

#[tokio::test]
async fn openapi_document_lists_search_paths() {
    let response = get(ps5_app(), "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/v1/search"].is_object());
    assert!(json["paths"]["/v1/search/stream"].is_object());
    assert!(json["paths"]["/v1/providers"].is_object());
}
