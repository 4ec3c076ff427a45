pub mod admin;
pub mod events;
pub mod public;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::contact::ContactError;
use crate::store::StoreError;
use crate::wizard::WizardError;

/// Domain errors mapped onto the HTTP surface. Validation is 400, absent
/// identities 404, lost slot races and bad lifecycle moves 409, storage 500.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        if self.status.is_server_error() {
            log::error!("request failed: {}", self.message);
        }
        HttpResponse::build(self.status).json(json!({ "error": self.message }))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::SlotTaken { .. } | StoreError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::Store(inner) => inner.into(),
            other => Self {
                status: StatusCode::BAD_REQUEST,
                message: other.to_string(),
            },
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(err: ContactError) -> Self {
        let status = match &err {
            ContactError::Invalid(_) => StatusCode::BAD_REQUEST,
            ContactError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}
