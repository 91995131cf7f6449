//! REST API server: search routes, SSE event stream, DTOs and OpenAPI documentation.

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
