use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use forage_service::{CorpusStatus, Error as ServiceError, QueryRequest, QueryResponse};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ObjectiveView {
	pub key: String,
	pub display: String,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/corpora", get(corpora))
		.route("/v1/objectives", get(objectives))
		.route("/v1/query", post(query))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn corpora(State(state): State<AppState>) -> Json<Vec<CorpusStatus>> {
	Json(state.service.corpora())
}

async fn objectives(State(state): State<AppState>) -> Json<Vec<ObjectiveView>> {
	let objectives = state
		.service
		.cfg
		.objectives
		.iter()
		.map(|objective| ObjectiveView {
			key: objective.key.clone(),
			display: objective.display.clone(),
		})
		.collect();

	Json(objectives)
}

async fn query(
	State(state): State<AppState>,
	payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
	let Json(payload) = payload.map_err(|err| {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text(), None)
	})?;
	let response = state.service.query(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::InvalidRequest { .. } => {
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None)
			},
			ServiceError::UnknownCorpus { .. } => json_error(
				StatusCode::NOT_FOUND,
				"unknown_corpus",
				message,
				Some(vec!["corpus".to_string()]),
			),
			ServiceError::CorpusUnavailable { .. } => {
				json_error(StatusCode::SERVICE_UNAVAILABLE, "corpus_unavailable", message, None)
			},
			ServiceError::PromptTooLong { .. } => {
				json_error(StatusCode::UNPROCESSABLE_ENTITY, "prompt_too_long", message, None)
			},
			ServiceError::Provider { .. } => {
				tracing::error!(error = %message, "Provider call failed.");

				json_error(StatusCode::BAD_GATEWAY, "provider_error", message, None)
			},
			ServiceError::DimensionMismatch { .. } => json_error(
				StatusCode::INTERNAL_SERVER_ERROR,
				"dimension_mismatch",
				message,
				None,
			),
			ServiceError::Storage { .. } => {
				tracing::error!(error = %message, "Storage failure while serving a query.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message, None)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
