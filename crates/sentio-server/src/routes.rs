//! Route handlers.
//!
//! Each POST handler parses the body leniently, validates it, then runs the
//! dispatcher on the blocking pool. Any failure is translated once, at the
//! end of the handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use sentio_ai::{CapabilityRegistry, DispatchError, Dispatcher};
use sentio_core::{
    GenerationResult, HealthStatus, RawGenerateRequest, RawProcessRequest, RawSentimentRequest,
    SentimentResult, ServiceStatus, TaskResult, ValidationError,
};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ErrorOutcome, Route, translate};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<CapabilityRegistry>,
}

/// Build the API router over an initialized registry.
pub fn router(registry: Arc<CapabilityRegistry>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/process", post(process))
        .route("/api/generate", post(generate))
        .route("/api/sentiment", post(sentiment))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry })
}

#[derive(Debug, Error)]
#[error("invalid CORS origin '{0}'")]
pub struct InvalidOrigin(pub String);

/// Cross-origin policy allowing `origins` with credentials.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, InvalidOrigin> {
    let origins = origins
        .iter()
        .map(|origin| {
            if origin == "*" {
                return Err(InvalidOrigin(origin.clone()));
            }
            HeaderValue::from_str(origin).map_err(|_| InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

async fn root(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus::new(state.registry.models()))
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::healthy())
}

async fn process(
    State(state): State<AppState>,
    body: Result<Json<RawProcessRequest>, JsonRejection>,
) -> Result<Json<TaskResult>, ErrorOutcome> {
    let route = Route::Process;
    let request = accept(body)
        .and_then(|raw| Ok(raw.validate()?))
        .map_err(|e| translate(route, e))?;

    run_dispatch(&state, move |d| d.dispatch(&request))
        .await
        .map(Json)
        .map_err(|e| translate(route, e))
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<RawGenerateRequest>, JsonRejection>,
) -> Result<Json<GenerationResult>, ErrorOutcome> {
    let route = Route::Generate;
    let request = accept(body)
        .and_then(|raw| Ok(raw.validate()?))
        .map_err(|e| translate(route, e))?;

    run_dispatch(&state, move |d| d.generate(&request))
        .await
        .map(Json)
        .map_err(|e| translate(route, e))
}

async fn sentiment(
    State(state): State<AppState>,
    body: Result<Json<RawSentimentRequest>, JsonRejection>,
) -> Result<Json<SentimentResult>, ErrorOutcome> {
    let route = Route::Sentiment;
    let request = accept(body)
        .and_then(|raw| Ok(raw.validate()?))
        .map_err(|e| translate(route, e))?;

    run_dispatch(&state, move |d| d.analyze(&request))
        .await
        .map(Json)
        .map_err(|e| translate(route, e))
}

/// Unwrap a JSON body; a body that does not parse is a validation failure.
fn accept<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(raw)) => Ok(raw),
        Err(rejection) => Err(ValidationError::new("body", rejection.body_text()).into()),
    }
}

/// Run a dispatch call on the blocking pool; inference holds the thread for
/// its whole duration.
async fn run_dispatch<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Dispatcher<'_>) -> Result<T, DispatchError> + Send + 'static,
{
    let registry = Arc::clone(&state.registry);
    tokio::task::spawn_blocking(move || call(&Dispatcher::new(&registry)))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use sentio_ai::{
        Capability, GeneratedSequence, GenerationInput, InferenceError, LabelScore, ModelBindings,
        SentimentAnalyzer, TextGenerator,
    };
    use sentio_core::Task;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Appends one word per call; fails on "explode", panics on "panic".
    #[derive(Default)]
    struct StubGenerator {
        calls: AtomicUsize,
    }

    impl TextGenerator for StubGenerator {
        fn eos_token_id(&self) -> u32 {
            50256
        }

        fn invoke(
            &self,
            input: &GenerationInput<'_>,
        ) -> Result<Vec<GeneratedSequence>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match input.prompt {
                "explode" => Err(InferenceError::new("model exploded")),
                "panic" => panic!("generator crashed"),
                prompt => Ok((0..input.num_return_sequences)
                    .map(|i| GeneratedSequence {
                        generated_text: format!("{prompt} sunny{i}"),
                    })
                    .collect()),
            }
        }
    }

    #[derive(Default)]
    struct StubAnalyzer {
        calls: AtomicUsize,
        labels: Vec<String>,
    }

    impl SentimentAnalyzer for StubAnalyzer {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn invoke(&self, text: &str) -> Result<Vec<LabelScore>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == "explode" {
                return Err(InferenceError::new("tokenizer failed"));
            }
            let positive = if text.contains("love") { 0.97 } else { 0.2 };
            Ok(vec![
                LabelScore {
                    label: "POSITIVE".into(),
                    score: positive,
                },
                LabelScore {
                    label: "NEGATIVE".into(),
                    score: 1.0 - positive,
                },
            ])
        }
    }

    struct Harness {
        app: Router,
        generator: Arc<StubGenerator>,
        analyzer: Arc<StubAnalyzer>,
    }

    impl Harness {
        fn new() -> Self {
            let generator = Arc::new(StubGenerator::default());
            let analyzer = Arc::new(StubAnalyzer {
                labels: vec!["NEGATIVE".into(), "POSITIVE".into()],
                ..Default::default()
            });
            let (g, a) = (generator.clone(), analyzer.clone());
            let loader = move |task: Task, _model: &str| -> anyhow::Result<Capability> {
                Ok(match task {
                    Task::TextGeneration => Capability::TextGeneration(g.clone()),
                    Task::SentimentAnalysis => Capability::SentimentAnalysis(a.clone()),
                })
            };
            let registry = CapabilityRegistry::initialize(&ModelBindings::default(), &loader)
                .expect("stub registry");
            Self {
                app: router(Arc::new(registry)),
                generator,
                analyzer,
            }
        }

        fn inference_calls(&self) -> usize {
            self.generator.calls.load(Ordering::SeqCst) + self.analyzer.calls.load(Ordering::SeqCst)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.post_raw(uri, body.to_string()).await
        }

        async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap();
            self.send(request).await
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }
    }

    // ── Status routes ──

    #[tokio::test]
    async fn root_lists_tasks_and_models() {
        let h = Harness::new();
        let (status, body) = h.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "AI Model API is running");
        assert_eq!(
            body["available_tasks"],
            json!(["text-generation", "sentiment-analysis"])
        );
        assert_eq!(body["models"]["text-generation"], "distilgpt2");
        assert_eq!(
            body["models"]["sentiment-analysis"],
            "distilbert-base-uncased-finetuned-sst-2-english"
        );
    }

    #[tokio::test]
    async fn health_is_healthy() {
        let h = Harness::new();
        let (status, body) = h.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "healthy"}));
    }

    // ── Unified route ──

    #[tokio::test]
    async fn process_text_generation() {
        let h = Harness::new();
        let (status, body) = h
            .post(
                "/api/process",
                json!({
                    "task": "text-generation",
                    "text": "The weather today is",
                    "max_length": 50,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"], "text-generation");
        assert_eq!(body["prompt"], "The weather today is");
        assert_eq!(body["model"], "distilgpt2");
        let text = body["generated_text"].as_str().unwrap();
        assert!(text.starts_with("The weather today is"));
    }

    #[tokio::test]
    async fn process_sentiment_analysis() {
        let h = Harness::new();
        let (status, body) = h
            .post(
                "/api/process",
                json!({"task": "sentiment-analysis", "text": "I love this product!"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"], "sentiment-analysis");
        assert_eq!(body["text"], "I love this product!");
        assert_eq!(body["sentiment"], "POSITIVE");
        let confidence = body["confidence"].as_f64().unwrap();
        assert!(confidence > 0.5 && confidence <= 1.0);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn process_sentiment_ignores_generation_fields() {
        let h = Harness::new();
        let (status, body) = h
            .post(
                "/api/process",
                json!({
                    "task": "sentiment-analysis",
                    "text": "meh",
                    "max_length": 1,
                    "temperature": 99.0,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sentiment"], "NEGATIVE");
    }

    #[tokio::test]
    async fn process_sentiment_ignores_wrongly_typed_generation_fields() {
        let h = Harness::new();
        let (status, body) = h
            .post(
                "/api/process",
                json!({"task": "sentiment-analysis", "text": "I love it", "max_length": "long"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"], "sentiment-analysis");
        assert_eq!(body["sentiment"], "POSITIVE");
    }

    #[tokio::test]
    async fn process_unknown_task_is_client_fault() {
        let h = Harness::new();
        let (status, body) = h
            .post("/api/process", json!({"task": "translation", "text": "hola"}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().starts_with("task: "));
        assert_eq!(h.inference_calls(), 0);
    }

    #[tokio::test]
    async fn process_inference_failure_prefix() {
        let h = Harness::new();
        let (status, body) = h
            .post(
                "/api/process",
                json!({"task": "text-generation", "text": "explode"}),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Failed to process request: model exploded");
    }

    // ── Generate route ──

    #[tokio::test]
    async fn generate_returns_first_sequence() {
        let h = Harness::new();
        let (status, body) = h
            .post(
                "/api/generate",
                json!({"prompt": "Hello", "num_return_sequences": 3}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"generated_text": "Hello sunny0", "prompt": "Hello", "model": "distilgpt2"})
        );
    }

    #[tokio::test]
    async fn generate_empty_prompt_rejected_without_inference() {
        let h = Harness::new();
        let (status, body) = h
            .post("/api/generate", json!({"prompt": "", "max_length": 100}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "prompt: must be at least 1 character");
        assert_eq!(h.inference_calls(), 0);
    }

    #[tokio::test]
    async fn generate_out_of_range_numbers_rejected_without_inference() {
        let h = Harness::new();
        let cases = [
            (json!({"prompt": "x", "max_length": 9}), "max_length"),
            (json!({"prompt": "x", "max_length": 501}), "max_length"),
            (json!({"prompt": "x", "temperature": 0.05}), "temperature"),
            (json!({"prompt": "x", "temperature": 2.5}), "temperature"),
            (json!({"prompt": "x", "num_return_sequences": 0}), "num_return_sequences"),
            (json!({"prompt": "x", "num_return_sequences": 6}), "num_return_sequences"),
        ];
        for (body, field) in cases {
            let (status, resp) = h.post("/api/generate", body).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert!(resp["detail"].as_str().unwrap().starts_with(field));
        }
        assert_eq!(h.inference_calls(), 0);
    }

    #[tokio::test]
    async fn generate_failure_then_recovers() {
        let h = Harness::new();
        let (status, body) = h.post("/api/generate", json!({"prompt": "explode"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Failed to generate text: model exploded");

        let (status, body) = h.post("/api/generate", json!({"prompt": "Again"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generated_text"], "Again sunny0");
    }

    #[tokio::test]
    async fn panicking_capability_is_generic_server_fault() {
        let h = Harness::new();
        let (status, body) = h.post("/api/generate", json!({"prompt": "panic"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal server error");

        let (status, _) = h.get("/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn generate_wrong_field_type_names_field() {
        let h = Harness::new();
        let (status, body) = h
            .post("/api/generate", json!({"prompt": "x", "max_length": "long"}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "max_length: must be an integer");
        assert_eq!(h.inference_calls(), 0);
    }

    #[tokio::test]
    async fn generate_accepts_integral_float_length() {
        let h = Harness::new();
        let (status, body) = h
            .post("/api/generate", json!({"prompt": "Hi", "max_length": 50.0}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generated_text"], "Hi sunny0");
    }

    #[tokio::test]
    async fn body_that_is_not_an_object_is_client_fault() {
        let h = Harness::new();
        let (status, body) = h.post("/api/generate", json!("write me a poem")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().starts_with("body: "));
    }

    #[tokio::test]
    async fn malformed_json_is_client_fault() {
        let h = Harness::new();
        let (status, body) = h.post_raw("/api/generate", "{not json".into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().starts_with("body: "));
        assert_eq!(h.inference_calls(), 0);
    }

    // ── Sentiment route ──

    #[tokio::test]
    async fn sentiment_shape() {
        let h = Harness::new();
        let (status, body) = h
            .post("/api/sentiment", json!({"text": "I love this product!"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "I love this product!");
        assert_eq!(body["sentiment"], "POSITIVE");
        assert_eq!(
            body["model"],
            "distilbert-base-uncased-finetuned-sst-2-english"
        );
        assert!(body.get("task").is_none());
    }

    #[tokio::test]
    async fn sentiment_too_long_rejected() {
        let h = Harness::new();
        let (status, body) = h
            .post("/api/sentiment", json!({"text": "a".repeat(1001)}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().starts_with("text: "));
        assert_eq!(h.inference_calls(), 0);
    }

    #[tokio::test]
    async fn sentiment_failure_prefix() {
        let h = Harness::new();
        let (status, body) = h.post("/api/sentiment", json!({"text": "explode"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Failed to analyze sentiment: tokenizer failed");
    }

    // ── CORS ──

    #[test]
    fn cors_rejects_wildcard_and_garbage() {
        assert!(cors_layer(&["http://localhost:5173".into()]).is_ok());
        assert!(cors_layer(&["*".into()]).is_err());
        assert!(cors_layer(&["bad\norigin".into()]).is_err());
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let h = Harness::new();
        let app = h
            .app
            .clone()
            .layer(cors_layer(&["http://localhost:5173".into()]).unwrap());
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/process")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }
}
