use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, header};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures::StreamExt;
use tower_http::set_header::SetResponseHeaderLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dealscout_core::SessionEvent;

use crate::dto::{
    HealthResponse, ProviderListResponse, ProviderResponse, SearchParams, SearchResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /v1/search\nDisallow: /v1/search/stream";

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/search", get(search))
        .route("/v1/search/stream", get(search_stream))
        .route("/v1/providers", get(list_providers));

    let public = Router::new()
        .route("/health", get(health))
        .route("/robots.txt", get(robots))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public
        .merge(api)
        .with_state(state)
        .layer(security_header(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(security_header(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(security_header(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(security_header(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-site"),
        ))
}

fn security_header(name: HeaderName, value: HeaderValue) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, value)
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Ranked listings and session summary", body = SearchResponse),
        (status = 400, description = "Missing or blank query", body = crate::dto::ErrorResponse),
    ),
    tag = "search"
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state
        .engine
        .start_session(params.query_text(), params.options())?;
    tracing::info!(session_id = %handle.id(), query = handle.query().text(), "Search requested");

    let outcome = handle.collect().await?;
    Ok(axum::Json(SearchResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/v1/search/stream",
    params(SearchParams),
    responses(
        (status = 200, description = "Server-sent session events, ending after `session-closed`", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing or blank query", body = crate::dto::ErrorResponse),
    ),
    tag = "search"
)]
pub async fn search_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state
        .engine
        .start_session(params.query_text(), params.options())?;
    tracing::info!(session_id = %handle.id(), query = handle.query().text(), "Stream requested");

    // The handle moves into the stream; a client disconnect drops it and
    // cancels the session.
    let events = handle.into_stream().map(sse_event);

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    ))
}

fn sse_event(event: SessionEvent) -> Result<Event, axum::Error> {
    Event::default().json_data(&event)
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/providers",
    responses(
        (status = 200, description = "Registered providers", body = ProviderListResponse),
    ),
    tag = "search"
)]
pub async fn list_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let providers: Vec<ProviderResponse> =
        state.engine.providers().map(ProviderResponse::from).collect();
    let total = providers.len();
    axum::Json(ProviderListResponse { providers, total })
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok",
        uptime_sec: state.started_at.elapsed().as_secs(),
    })
}

pub async fn robots() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], ROBOTS_TXT)
}
