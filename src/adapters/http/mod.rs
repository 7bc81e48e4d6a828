//! HTTP surface for the session engine.

pub mod sessions_http;

pub use sessions_http::{error_response, ErrorResponse, SessionsHttpConfig, SessionsHttpServer};
