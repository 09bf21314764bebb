//! HTTP API surface: routes, shared state, and error translation.

mod error;
mod routes;

pub use error::{ApiError, ErrorOutcome, Fault, Route, translate};
pub use routes::{AppState, InvalidOrigin, cors_layer, router};
