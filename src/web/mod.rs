// HTTP surface: an HTML search page plus a JSON API over the same engine

pub mod page;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::corpus::DifficultyLevel;
use crate::search::{
    NO_RESULTS_MESSAGE, QueryError, SearchEngine, SearchRequest, SearchResponse,
    parse_difficulty_filter,
};
use page::{FormValues, PageBody, render_page};

/// Error returned by the JSON endpoints as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    #[inline]
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<QueryError>() {
            Some(query_error) => Self::BadRequest(query_error.to_string()),
            None => {
                error!("Search failed: {:#}", error);
                Self::Internal(format!("Search failed: {}", error))
            }
        }
    }
}

/// Body of `POST /api/search`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSearchRequest {
    pub query: String,
    /// "all", "1".."5" or a number
    #[serde(default)]
    pub difficulty_filter: Option<serde_json::Value>,
    #[serde(default)]
    pub num_results: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub documents: usize,
    pub model: String,
}

/// Query string of `GET /`
///
/// Form fields arrive as text; a cleared field is sent as an empty value.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub q: Option<String>,
    pub difficulty: Option<String>,
    pub results: Option<String>,
}

impl PageQuery {
    /// Requested result count, or `None` when the field is blank or not a number
    #[inline]
    pub fn results(&self) -> Option<usize> {
        non_blank(self.results.as_deref()).and_then(|value| value.parse().ok())
    }

    #[inline]
    pub fn difficulty(&self) -> Option<&str> {
        non_blank(self.difficulty.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[inline]
pub fn router(engine: SearchEngine) -> Router {
    Router::new()
        .route("/", get(search_page))
        .route("/api/search", post(api_search))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Bind and serve until the process is stopped
#[inline]
pub async fn serve(engine: SearchEngine, address: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Serving search UI on http://{}", address);
    axum::serve(listener, router(engine))
        .await
        .context("Web server stopped unexpectedly")
}

/// Run a search on the blocking pool; the embedding client is synchronous
async fn run_search(engine: SearchEngine, request: SearchRequest) -> Result<SearchResponse, ApiError> {
    tokio::task::spawn_blocking(move || engine.search(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("Search task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn difficulty_from_json(
    value: Option<&serde_json::Value>,
) -> Result<Option<DifficultyLevel>, QueryError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => parse_difficulty_filter(text),
        Some(other) => parse_difficulty_filter(&other.to_string()),
    }
}

async fn api_search(
    State(engine): State<SearchEngine>,
    Json(body): Json<ApiSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::BadRequest(QueryError::EmptyQuery.to_string()));
    }
    let difficulty = difficulty_from_json(body.difficulty_filter.as_ref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let num_results = engine
        .config()
        .clamp_results(body.num_results.unwrap_or(engine.config().default_results));

    let request = SearchRequest::new(body.query, num_results).with_difficulty(difficulty);
    Ok(Json(run_search(engine, request).await?))
}

async fn search_page(State(engine): State<SearchEngine>, Query(params): Query<PageQuery>) -> Html<String> {
    let config = engine.config().clone();
    let num_results = config.clamp_results(params.results().unwrap_or(config.default_results));
    let query = params.q.clone().unwrap_or_default();
    let difficulty = params.difficulty().map(parse_difficulty_filter);

    let form = FormValues {
        query: &query,
        difficulty: difficulty
            .as_ref()
            .and_then(|parsed| parsed.as_ref().ok().copied().flatten()),
        num_results,
        min_results: config.min_results,
        max_results: config.max_results,
    };

    if params.q.is_none() {
        return Html(render_page(&form, PageBody::Empty));
    }
    if query.trim().is_empty() {
        let message = QueryError::EmptyQuery.to_string();
        return Html(render_page(&form, PageBody::Message(&message)));
    }
    let difficulty = match difficulty.transpose() {
        Ok(level) => level.flatten(),
        Err(e) => {
            let message = e.to_string();
            return Html(render_page(&form, PageBody::Message(&message)));
        }
    };

    let request = SearchRequest::new(query.clone(), num_results).with_difficulty(difficulty);
    match run_search(engine, request).await {
        Ok(response) if response.results.is_empty() => {
            Html(render_page(&form, PageBody::Message(NO_RESULTS_MESSAGE)))
        }
        Ok(response) => Html(render_page(
            &form,
            PageBody::Results {
                results: &response.results,
                query_difficulty: response.query_difficulty,
            },
        )),
        Err(ApiError::BadRequest(message) | ApiError::Internal(message)) => {
            Html(render_page(&form, PageBody::Message(&message)))
        }
    }
}

async fn health(State(engine): State<SearchEngine>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        documents: engine.index().len(),
        model: engine.model_name().to_string(),
    })
}
