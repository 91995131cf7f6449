use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use tower::ServiceExt;

use dealscout_core::testutil::{MockProvider, raw, test_config};
use dealscout_core::{AnyProvider, ProviderError, SearchEngine};
use dealscout_server::routes;
use dealscout_server::state::AppState;

/// Router over the given mock providers; no network is touched.
pub fn setup_test_app(providers: Vec<MockProvider>) -> Router {
    let providers = providers.into_iter().map(AnyProvider::new).collect();
    let engine = SearchEngine::new(providers, test_config());
    routes::router(Arc::new(AppState::new(engine)))
}

/// Two retailers with results and one that always fails.
pub fn ps5_app() -> Router {
    setup_test_app(vec![
        MockProvider::responding("a", vec![raw("PlayStation 5 Console", 499.0)])
            .with_name("Alpha")
            .with_weight(90),
        MockProvider::responding("b", vec![raw("PS5 Controller", 59.0)])
            .with_name("Beta")
            .with_weight(80),
        MockProvider::failing("c", ProviderError::Network("connection reset".into()))
            .with_name("Gamma"),
    ])
}

pub async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
