use axum::{
	extract::rejection::JsonRejection,
	http::StatusCode,
	response::{IntoResponse, Response},
	Json
};
use serde::Serialize;
use thiserror::Error;

/// An error returned by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
	/// A request parameter is outside the bounds offered by the UI.
	#[error("invalid parameter: {0}")]
	InvalidParameter(String),
	/// The request body is not valid JSON or does not match the expected fields & types.
	#[error("invalid request body: {}", .0.body_text())]
	InvalidBody(#[from] JsonRejection),
	/// Too many requests are already waiting for the generation worker.
	#[error("the generation queue is full, try again later")]
	QueueFull,
	/// The generation worker has exited.
	#[error("the generation worker is not running")]
	WorkerGone,
	/// The pipeline or the output manager failed.
	#[error("generation failed: {0:#}")]
	Generation(#[from] anyhow::Error)
}

impl ApiError {
	/// The HTTP status code this error is reported with.
	pub fn status(&self) -> StatusCode {
		match self {
			ApiError::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
			ApiError::InvalidBody(rejection) => rejection.status(),
			ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
			ApiError::WorkerGone | ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR
		}
	}
}

#[derive(Serialize)]
struct ErrorBody {
	error: String
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
	}
}
