//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It
//! implements `axum::response::IntoResponse` to produce structured JSON
//! error responses with appropriate HTTP status codes, and carries
//! machine-readable details: validation issues get the field list plus a
//! correction block, permission errors get the exact grant call to issue.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use llmos_protocol::{CorrectionFeedback, ProtocolError, ValidationIssue};
use llmos_security::SecurityError;
use llmos_state::StateError;

use crate::capability::CapabilityError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details (e.g. validation errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The plan payload could not be parsed (400); details carry a
    /// correction block the caller can append to an LLM prompt.
    #[error("parse failed: {message}")]
    ParseFailed { message: String, correction: String },

    /// Plan failed protocol validation (422).
    #[error("validation failed")]
    ValidationFailed(Vec<ValidationIssue>),

    /// The security pipeline or permission model rejected the request (403).
    #[error("security rejected: {message}")]
    SecurityRejected {
        message: String,
        details: serde_json::Value,
    },

    /// Resource conflict (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Admission rate exceeded (429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Synchronous execution exceeded its timeout (504).
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ApiErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorDetail {
                    code: "BAD_REQUEST".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::ParseFailed {
                message,
                correction,
            } => (
                StatusCode::BAD_REQUEST,
                ApiErrorDetail {
                    code: "PARSE_FAILED".to_string(),
                    message: message.clone(),
                    details: Some(json!({"correction": correction})),
                },
            ),
            ApiError::ValidationFailed(issues) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorDetail {
                    code: "VALIDATION_FAILED".to_string(),
                    message: format!("{} validation error(s)", issues.len()),
                    details: Some(json!({
                        "issues": issues,
                        "correction": CorrectionFeedback::format_validation_error(issues),
                    })),
                },
            ),
            ApiError::SecurityRejected { message, details } => (
                StatusCode::FORBIDDEN,
                ApiErrorDetail {
                    code: "SECURITY_REJECTED".to_string(),
                    message: message.clone(),
                    details: Some(details.clone()),
                },
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ApiErrorDetail {
                    code: "CONFLICT".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::RateLimited(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorDetail {
                    code: "RATE_LIMITED".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::GatewayTimeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                ApiErrorDetail {
                    code: "GATEWAY_TIMEOUT".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
        };

        let body = json!({
            "success": false,
            "error": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Parse { ref detail } => ApiError::ParseFailed {
                correction: CorrectionFeedback::format_parse_error(detail),
                message: err.to_string(),
            },
            ProtocolError::Validation { issues } => ApiError::ValidationFailed(issues),
            ProtocolError::TemplateResolution { .. }
            | ProtocolError::MigrationPathMissing { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        if let SecurityError::RateLimitExceeded { .. } = &err {
            return ApiError::RateLimited(err.to_string());
        }
        let details = match &err {
            SecurityError::PermissionNotGranted {
                permission,
                module_id,
                action,
                risk_level,
                suggestion,
            } => json!({
                "permission": permission,
                "module": module_id,
                "action": action,
                "risk_level": risk_level,
                "suggestion": suggestion,
            }),
            SecurityError::InputScanRejected {
                risk_score, labels, ..
            } => json!({
                "source": "scanner_pipeline",
                "risk_score": risk_score,
                "categories": labels,
            }),
            SecurityError::SuspiciousIntent {
                threats,
                risk_level,
                reasoning,
                ..
            } => json!({
                "source": "intent_verifier",
                "threats": threats,
                "risk_level": risk_level,
                "reasoning": reasoning,
            }),
            _ => serde_json::Value::Null,
        };
        ApiError::SecurityRejected {
            message: err.to_string(),
            details,
        }
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::PlanNotFound(id) => ApiError::NotFound(format!("plan '{id}' not found")),
            StateError::ActionNotFound { plan_id, action_id } => ApiError::NotFound(format!(
                "action '{action_id}' not found in plan '{plan_id}'"
            )),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<CapabilityError> for ApiError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::ModuleNotFound(_) | CapabilityError::ActionNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            CapabilityError::InvalidParams { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}
