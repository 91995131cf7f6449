use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dealscout API",
        version = "0.1.0",
        description = "Multi-retailer electronics deal search with streamed progress."
    ),
    paths(
        crate::routes::search,
        crate::routes::search_stream,
        crate::routes::list_providers,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::SearchResponse,
        crate::dto::ProviderResponse,
        crate::dto::ProviderListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "search", description = "Deal search across retailers"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
