//! API handlers for the translation service
//!
//! Provides REST endpoints for:
//! - Health checks
//! - Single-PDF translation (multipart upload in, PDF out)

use axum::{
    extract::{multipart::{MultipartError, MultipartRejection}, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pdf_translate_core::{identify, is_valid_language_token, OutputMode, TranslationJob};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::ApiError;
use crate::AppState;

/// Filename assumed when the upload carries none
pub const DEFAULT_UPLOAD_NAME: &str = "document.pdf";

/// Leading bytes of every PDF file
const PDF_MAGIC: &[u8] = b"%PDF";

const DEFAULT_SOURCE_LANG: &str = "auto";
const DEFAULT_TARGET_LANG: &str = "en";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "pdf-translate-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Uploaded file part
struct Upload {
    filename: Option<String>,
    bytes: Vec<u8>,
}

/// Raw form fields as received
#[derive(Default)]
struct TranslateForm {
    file: Option<Upload>,
    source_lang: Option<String>,
    target_lang: Option<String>,
    output_mode: Option<String>,
}

/// Handler: POST /translate/pdf
///
/// The rate limiter is consulted before any of the body is read.
pub async fn handle_translate_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let client = identify(&headers);
    let decision = state.limiter.check(&client);
    if !decision.allowed {
        info!(
            "Rate limit exceeded for {} (retry after {}s)",
            client, decision.retry_after_seconds
        );
        return Err(ApiError::RateLimited {
            retry_after_seconds: decision.retry_after_seconds,
        });
    }

    let mut multipart = multipart.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let form = read_form(&mut multipart, state.limits.max_upload_bytes).await?;

    let upload = form
        .file
        .ok_or_else(|| ApiError::InvalidRequest("Missing form field: file".to_string()))?;
    let mode = match form.output_mode.as_deref() {
        Some(raw) => raw
            .parse::<OutputMode>()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
        None => OutputMode::default(),
    };

    let filename = upload
        .filename
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(ApiError::UnsupportedFileType);
    }

    let max_token_len = state.limits.language_token_max_length;
    let source_lang = normalize_language(
        form.source_lang.as_deref().unwrap_or(DEFAULT_SOURCE_LANG),
        max_token_len,
    )?;
    let target_lang = normalize_language(
        form.target_lang.as_deref().unwrap_or(DEFAULT_TARGET_LANG),
        max_token_len,
    )?;
    if source_lang == target_lang && source_lang != DEFAULT_SOURCE_LANG {
        return Err(ApiError::InvalidLanguagePair);
    }

    let bytes = upload.bytes;
    if bytes.is_empty() {
        return Err(ApiError::EmptyFile);
    }
    if bytes.len() > state.limits.max_upload_bytes {
        return Err(ApiError::FileTooLarge {
            max_bytes: state.limits.max_upload_bytes,
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ApiError::UnsupportedFileType);
    }

    debug!(
        "Accepted {} ({} bytes) from {}: {} -> {}, mode={}",
        filename,
        bytes.len(),
        client,
        source_lang,
        target_lang,
        mode
    );

    let job = TranslationJob {
        source_bytes: bytes,
        source_filename: filename,
        source_lang,
        target_lang,
        mode,
    };

    // Detached so the workspace is cleaned up even if the client goes away
    let orchestrator = state.orchestrator.clone();
    let output = tokio::spawn(async move { orchestrator.translate(job).await })
        .await
        .map_err(|e| {
            error!("Translation task aborted: {}", e);
            ApiError::Internal
        })??;

    info!("Translated {} ({} bytes)", output.filename, output.bytes.len());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&output.filename)),
        ],
        output.bytes,
    )
        .into_response())
}

async fn read_form(multipart: &mut Multipart, max_bytes: usize) -> Result<TranslateForm, ApiError> {
    let mut form = TranslateForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?
                {
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(ApiError::FileTooLarge { max_bytes });
                    }
                    bytes.extend_from_slice(&chunk);
                }
                form.file = Some(Upload { filename, bytes });
            }
            "source_lang" | "target_lang" | "output_mode" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                let slot = match name.as_str() {
                    "source_lang" => &mut form.source_lang,
                    "target_lang" => &mut form.target_lang,
                    _ => &mut form.output_mode,
                };
                *slot = Some(value);
            }
            other => debug!("Ignoring unknown form field {:?}", other),
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::FileTooLarge { max_bytes }
    } else {
        ApiError::InvalidRequest(err.body_text())
    }
}

/// Trim and lowercase a language token, rejecting anything the engine should not see
fn normalize_language(raw: &str, max_len: usize) -> Result<String, ApiError> {
    let token = raw.trim().to_lowercase();
    if token.is_empty() || token.len() > max_len || !is_valid_language_token(&token) {
        return Err(ApiError::InvalidLanguageToken);
    }
    Ok(token)
}

/// `attachment` disposition with characters that would break the quoted filename replaced
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
