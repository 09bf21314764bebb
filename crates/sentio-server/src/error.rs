//! Error translation: every failure on a route becomes one `{"detail": ...}`
//! response with a client- or server-fault status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sentio_ai::DispatchError;
use sentio_core::ValidationError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

/// The route a failure happened on; selects the server-fault message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Process,
    Generate,
    Sentiment,
}

impl Route {
    fn failure_prefix(&self) -> &'static str {
        match self {
            Self::Process => "Failed to process request",
            Self::Generate => "Failed to generate text",
            Self::Sentiment => "Failed to analyze sentiment",
        }
    }

    /// Log message for server faults on this route.
    fn failure_log(&self) -> &'static str {
        match self {
            Self::Process => "error processing request",
            Self::Generate => "error generating text",
            Self::Sentiment => "error analyzing sentiment",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            Self::Process => "/api/process",
            Self::Generate => "/api/generate",
            Self::Sentiment => "/api/sentiment",
        }
    }
}

/// Anything that can go wrong while handling an API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A failure outside the known taxonomy, e.g. a panicking capability.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Who is at fault for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Client,
    Server,
}

/// Wire-level outcome of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOutcome {
    pub fault: Fault,
    pub message: String,
}

impl ErrorOutcome {
    pub fn status(&self) -> StatusCode {
        match self.fault {
            Fault::Client => StatusCode::UNPROCESSABLE_ENTITY,
            Fault::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl IntoResponse for ErrorOutcome {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorBody {
                detail: &self.message,
            }),
        )
            .into_response()
    }
}

/// Classify `err` and build the message shown to the caller.
pub fn translate(route: Route, err: ApiError) -> ErrorOutcome {
    let outcome = match &err {
        ApiError::Validation(e) => ErrorOutcome {
            fault: Fault::Client,
            message: e.to_string(),
        },
        ApiError::Dispatch(DispatchError::UnknownTask(e)) => ErrorOutcome {
            fault: Fault::Client,
            message: e.to_string(),
        },
        ApiError::Dispatch(DispatchError::Inference(e)) => ErrorOutcome {
            fault: Fault::Server,
            message: format!("{}: {}", route.failure_prefix(), e.message()),
        },
        ApiError::Internal(_) => ErrorOutcome {
            fault: Fault::Server,
            message: "Internal server error".to_string(),
        },
    };

    match outcome.fault {
        Fault::Client => debug!(route = route.path(), error = %err, "rejected request"),
        Fault::Server => error!(route = route.path(), error = %err, "{}", route.failure_log()),
    }
    outcome
}
