use axum::{
	Json, Router,
	extract::{Path, State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use poi_domain::PlaceResult;
use poi_service::{Error, JobPoll, SearchOutcome, SearchRequest, SearchResponse};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/search", post(search))
		.route("/faiss_result/{query_id}", get(faiss_result))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
	let Json(payload) = payload.map_err(|err| {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
	})?;

	match state.service.search(payload).await? {
		SearchOutcome::Found(response) => Ok(Json(response)),
		SearchOutcome::NoResults { .. } =>
			Err(json_error(StatusCode::NOT_FOUND, "no_results", "No place matched the query.")),
	}
}

#[derive(Debug, Serialize)]
struct JobResultBody {
	query_id: String,
	status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	faiss_results: Option<Vec<PlaceResult>>,
}

async fn faiss_result(State(state): State<AppState>, Path(query_id): Path<String>) -> Response {
	let (status, body) = match state.service.await_job(&query_id).await {
		JobPoll::Done(results) => (
			StatusCode::OK,
			JobResultBody { query_id, status: "done", faiss_results: Some(results.to_vec()) },
		),
		JobPoll::Failed => (
			StatusCode::OK,
			JobResultBody { query_id, status: "failed", faiss_results: Some(Vec::new()) },
		),
		JobPoll::Pending | JobPoll::NotFound => (
			StatusCode::NOT_FOUND,
			JobResultBody { query_id, status: "not_found", faiss_results: None },
		),
	};

	(status, Json(body)).into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::QueryParse { message } => {
				tracing::error!(error = %message, "Query parsing failed.");

				json_error(StatusCode::BAD_GATEWAY, "query_parse_failed", message)
			},
			Error::Backend { message } => {
				tracing::error!(error = %message, "Search backend failed.");

				json_error(StatusCode::BAD_GATEWAY, "search_backend_failed", message)
			},
			other => {
				tracing::error!(error = %other, "Search request failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", other.to_string())
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
