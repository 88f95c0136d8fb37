//! Gateway namespace: HTTP entrypoint.

mod http;

pub use http::{
    ErrorResponse, GatewayError, GatewayHealthResponse, GatewayState, StartResponse,
    StatusResponse, router, run_http, status_for,
};
