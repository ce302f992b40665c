use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use string_analyzer_api::{NaturalLanguageResult, StringAnalyzerApi, StringList, StringRecord};
use string_analyzer_core::{AnalyzerError, FilterSet};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct ServiceState {
    api: StringAnalyzerApi,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    status: u16,
    error: String,
    message: String,
}

/// Boundary error: a status code plus a human-readable message, rendered as
/// a JSON error body.
#[derive(Debug, Clone)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        let status = match err {
            AnalyzerError::AlreadyExists(_) => StatusCode::CONFLICT,
            AnalyzerError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalyzerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            timestamp: OffsetDateTime::now_utc(),
            status: self.status.as_u16(),
            error: self.status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Structured filter parameters of `GET /strings`.
#[derive(Debug, Clone, Deserialize)]
struct ListParams {
    is_palindrome: Option<bool>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    word_count: Option<usize>,
    contains_character: Option<String>,
}

impl From<ListParams> for FilterSet {
    fn from(params: ListParams) -> Self {
        Self {
            is_palindrome: params.is_palindrome,
            min_length: params.min_length,
            max_length: params.max_length,
            word_count: params.word_count,
            contains_character: params.contains_character,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct NaturalLanguageParams {
    query: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "string-analyzer-service")]
#[command(about = "HTTP service for string analysis and retrieval")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/strings", get(list_strings).post(create_string))
        .route("/strings/filter-by-natural-language", get(filter_by_natural_language))
        .route("/strings/:value", get(get_string).delete(delete_string))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let state = ServiceState { api: StringAnalyzerApi::new() };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, "string analyzer service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Strict `value` extraction: the body must be a JSON object carrying a
/// string `value`. A missing or null field is a 400; any other JSON type in
/// the field is a 422.
fn extract_value_field(payload: &Value) -> Result<&str, ApiError> {
    let Some(object) = payload.as_object() else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "request body must be a JSON object",
        ));
    };
    let Some(field) = object.get("value") else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "missing 'value' field"));
    };
    if field.is_null() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "'value' field is required"));
    }
    field.as_str().ok_or_else(|| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid data type for 'value' (must be string)",
        )
    })
}

async fn create_string(
    State(state): State<ServiceState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<StringRecord>), ApiError> {
    let Json(payload) = body.map_err(|err| {
        ApiError::new(StatusCode::BAD_REQUEST, format!("invalid request body: {err}"))
    })?;
    let value = extract_value_field(&payload)?;
    let record = state.api.create(value)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_string(
    State(state): State<ServiceState>,
    Path(value): Path<String>,
) -> Result<Json<StringRecord>, ApiError> {
    let record = state.api.get(&value)?;
    Ok(Json(record))
}

async fn list_strings(
    State(state): State<ServiceState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<StringList>, ApiError> {
    let Query(params) = params.map_err(|_| {
        ApiError::new(StatusCode::BAD_REQUEST, "invalid query parameter values or types")
    })?;
    Ok(Json(state.api.list(params.into())))
}

async fn filter_by_natural_language(
    State(state): State<ServiceState>,
    params: Result<Query<NaturalLanguageParams>, QueryRejection>,
) -> Result<Json<NaturalLanguageResult>, ApiError> {
    let Query(params) = params.map_err(|_| {
        ApiError::new(StatusCode::BAD_REQUEST, "invalid query parameter values or types")
    })?;
    // A missing query parameter fails the same emptiness check as a blank one.
    let query = params.query.unwrap_or_default();
    let result = state.api.query_natural_language(&query)?;
    Ok(Json(result))
}

async fn delete_string(
    State(state): State<ServiceState>,
    Path(value): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.api.delete(&value)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use http::Request;
    use tower::ServiceExt;

    use super::*;

    fn test_router() -> Router {
        app(ServiceState { api: StringAnalyzerApi::new() })
    }

    async fn send(router: Router, request: Request<Body>) -> Response {
        match router.oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        }
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    fn post_json(uri: &str, payload: &Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    fn delete_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("DELETE")
            .body(Body::empty())
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    async fn response_json(response: Response) -> Value {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    async fn seed(router: &Router, value: &str) {
        let response = send(
            router.clone(),
            post_json("/strings", &serde_json::json!({ "value": value })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED, "seed create failed for `{value}`");
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let response = send(test_router(), get_request("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(value.get("status").and_then(Value::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn create_returns_created_with_derived_properties() {
        let response = send(
            test_router(),
            post_json("/strings", &serde_json::json!({ "value": "A man a plan a canal Panama" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let value = response_json(response).await;
        let properties = match value.get("properties") {
            Some(properties) => properties,
            None => panic!("response should carry a `properties` object"),
        };
        assert_eq!(properties.get("isPalindrome").and_then(Value::as_bool), Some(true));
        assert_eq!(properties.get("wordCount").and_then(Value::as_u64), Some(7));
        assert_eq!(
            value.get("id").and_then(Value::as_str),
            properties.get("sha256Hash").and_then(Value::as_str)
        );
    }

    #[tokio::test]
    async fn duplicate_create_is_conflict() {
        let router = test_router();
        seed(&router, "hello").await;

        let response =
            send(router, post_json("/strings", &serde_json::json!({ "value": "hello" }))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let value = response_json(response).await;
        assert_eq!(value.get("status").and_then(Value::as_u64), Some(409));
        assert_eq!(value.get("error").and_then(Value::as_str), Some("Conflict"));
    }

    #[tokio::test]
    async fn create_without_value_field_is_bad_request() {
        let response =
            send(test_router(), post_json("/strings", &serde_json::json!({ "text": "hi" }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_with_non_string_value_is_unprocessable() {
        let response =
            send(test_router(), post_json("/strings", &serde_json::json!({ "value": 42 }))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let value = response_json(response).await;
        assert_eq!(value.get("status").and_then(Value::as_u64), Some(422));
    }

    #[tokio::test]
    async fn create_with_malformed_body_is_bad_request() {
        let request = Request::builder()
            .uri("/strings")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap_or_else(|err| panic!("failed to build request: {err}"));
        let response = send(test_router(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_reports_not_found_for_absent_value() {
        let response = send(test_router(), get_request("/strings/absent")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let value = response_json(response).await;
        assert_eq!(value.get("status").and_then(Value::as_u64), Some(404));
        assert_eq!(value.get("error").and_then(Value::as_str), Some("Not Found"));
    }

    #[tokio::test]
    async fn list_applies_filters_and_echoes_them() {
        let router = test_router();
        seed(&router, "racecar").await;
        seed(&router, "noon").await;
        seed(&router, "hello world").await;

        let response = send(
            router,
            get_request("/strings?is_palindrome=true&min_length=5&contains_character=R"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(value.get("count").and_then(Value::as_u64), Some(1));
        let data = match value.get("data").and_then(Value::as_array) {
            Some(data) => data,
            None => panic!("response should carry a `data` array"),
        };
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].get("value").and_then(Value::as_str), Some("racecar"));
        assert_eq!(
            value.get("filtersApplied"),
            Some(&serde_json::json!({
                "is_palindrome": true,
                "min_length": 5,
                "contains_character": "R"
            }))
        );
    }

    #[tokio::test]
    async fn list_with_malformed_numeric_filter_is_bad_request() {
        let response = send(test_router(), get_request("/strings?min_length=abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn natural_language_query_returns_interpretation() {
        let router = test_router();
        seed(&router, "racecar").await;
        seed(&router, "hello world").await;

        let response = send(
            router,
            get_request(
                "/strings/filter-by-natural-language?query=single%20word%20palindrome%20strings",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(value.get("count").and_then(Value::as_u64), Some(1));
        let interpreted = match value.get("interpretedQuery") {
            Some(interpreted) => interpreted,
            None => panic!("response should carry an `interpretedQuery` object"),
        };
        assert_eq!(
            interpreted.get("original").and_then(Value::as_str),
            Some("single word palindrome strings")
        );
        assert_eq!(
            interpreted.get("parsedFilters"),
            Some(&serde_json::json!({ "is_palindrome": true, "word_count": 1 }))
        );
    }

    #[tokio::test]
    async fn natural_language_query_requires_text() {
        let empty =
            send(test_router(), get_request("/strings/filter-by-natural-language?query=%20%20"))
                .await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let missing = send(test_router(), get_request("/strings/filter-by-natural-language")).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_round_trip_removes_the_record() {
        let router = test_router();
        seed(&router, "ephemeral").await;

        let deleted = send(router.clone(), delete_request("/strings/ephemeral")).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let absent = send(router.clone(), get_request("/strings/ephemeral")).await;
        assert_eq!(absent.status(), StatusCode::NOT_FOUND);

        let again = send(router, delete_request("/strings/ephemeral")).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }
}
