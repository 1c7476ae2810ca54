//! Error types for the translation API

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pdf_translate_core::EngineError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Request-level failures, one per error code on the wire
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Rate limit exceeded; retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload exceeds {max_bytes} bytes")]
    FileTooLarge { max_bytes: usize },

    #[error("Unsupported file type")]
    UnsupportedFileType,

    #[error("Invalid language token")]
    InvalidLanguageToken,

    #[error("Invalid language pair")]
    InvalidLanguagePair,

    #[error("Empty file")]
    EmptyFile,

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedFileType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::InvalidLanguageToken
            | ApiError::InvalidLanguagePair
            | ApiError::EmptyFile => StatusCode::BAD_REQUEST,
            ApiError::TranslationFailed(_) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ApiError::UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            ApiError::InvalidLanguageToken => "INVALID_LANGUAGE_TOKEN",
            ApiError::InvalidLanguagePair => "INVALID_LANGUAGE_PAIR",
            ApiError::EmptyFile => "EMPTY_FILE",
            ApiError::TranslationFailed(_) => "TRANSLATION_FAILED",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ApiError::RateLimited {
                retry_after_seconds,
            } => Some(format!("Retry after {} seconds.", retry_after_seconds)),
            ApiError::InvalidRequest(msg) | ApiError::TranslationFailed(msg) => Some(msg.clone()),
            ApiError::FileTooLarge { max_bytes } => {
                Some(format!("Max allowed bytes: {}.", max_bytes))
            }
            ApiError::InvalidLanguagePair => Some(
                "source_lang and target_lang must differ unless source_lang=auto.".to_string(),
            ),
            ApiError::UnsupportedFileType
            | ApiError::InvalidLanguageToken
            | ApiError::EmptyFile
            | ApiError::Internal => None,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: &'static str,
    detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            ok: false,
            error: self.code(),
            detail: self.detail(),
        };
        let mut response = (self.status(), Json(body)).into_response();

        if let ApiError::RateLimited {
            retry_after_seconds,
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }

        response
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::EmptyInput => ApiError::EmptyFile,
            EngineError::InvalidLanguageToken => ApiError::InvalidLanguageToken,
            EngineError::BinaryNotFound(_)
            | EngineError::TimedOut(_)
            | EngineError::NonZeroExit(_)
            | EngineError::NoOutput => ApiError::TranslationFailed(err.to_string()),
            EngineError::InvalidConfig(_) | EngineError::Io(_) => {
                error!("Translation job failed: {}", err);
                ApiError::Internal
            }
        }
    }
}
