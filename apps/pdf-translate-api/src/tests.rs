//! HTTP endpoint integration tests using axum-test
//!
//! The engine is replaced by a runner that writes files into the job
//! workspace, so the full request path runs without BabelDOC installed.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use pdf_translate_core::{
    EngineConfig, EngineInvocation, EngineRunner, Orchestrator, ProcessOutcome, RateLimitConfig,
    RateLimiter,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::{build_router, AppState, UploadLimits};

const PDF: &[u8] = b"%PDF-1.7\nsource body";

type Script = dyn Fn(&EngineInvocation) -> io::Result<ProcessOutcome> + Send + Sync;

/// Stands in for BabelDOC and records how it was invoked
struct FakeRunner {
    calls: AtomicUsize,
    seen_args: Mutex<Vec<Vec<String>>>,
    script: Box<Script>,
}

impl FakeRunner {
    fn last_args(&self) -> Vec<String> {
        self.seen_args.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl EngineRunner for FakeRunner {
    async fn run(&self, invocation: &EngineInvocation) -> io::Result<ProcessOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_args.lock().unwrap().push(invocation.args_lossy());
        (self.script)(invocation)
    }
}

fn success() -> io::Result<ProcessOutcome> {
    Ok(ProcessOutcome::Success {
        stdout: String::new(),
        stderr: String::new(),
    })
}

/// Writes both engine artifacts, the way BabelDOC names them
fn write_both_artifacts(inv: &EngineInvocation) -> io::Result<ProcessOutcome> {
    std::fs::write(inv.current_dir.join("paper.no_watermark.de.mono.pdf"), b"%PDF mono")?;
    std::fs::write(inv.current_dir.join("paper.no_watermark.de.dual.pdf"), b"%PDF dual")?;
    success()
}

struct Harness {
    server: TestServer,
    runner: Arc<FakeRunner>,
    work_root: TempDir,
}

impl Harness {
    fn calls(&self) -> usize {
        self.runner.calls.load(Ordering::SeqCst)
    }
}

fn create_harness_with(
    max_requests: u32,
    max_upload_bytes: usize,
    script: impl Fn(&EngineInvocation) -> io::Result<ProcessOutcome> + Send + Sync + 'static,
) -> Harness {
    let work_root = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner {
        calls: AtomicUsize::new(0),
        seen_args: Default::default(),
        script: Box::new(script),
    });

    let config = EngineConfig {
        work_root: work_root.path().to_path_buf(),
        ..EngineConfig::default()
    };
    let state = AppState {
        orchestrator: Orchestrator::with_runner(config, runner.clone()),
        limiter: Arc::new(RateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(600),
            max_requests,
        })),
        limits: UploadLimits {
            max_upload_bytes,
            language_token_max_length: 16,
        },
    };

    Harness {
        server: TestServer::new(build_router(state)).unwrap(),
        runner,
        work_root,
    }
}

/// Create a test server with a generous quota and the default upload ceiling
fn create_harness() -> Harness {
    create_harness_with(100, 25 * 1024 * 1024, write_both_artifacts)
}

fn pdf_form(filename: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes.to_vec())
            .file_name(filename)
            .mime_type("application/pdf"),
    )
}

fn client_ip(ip: &'static str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("x-real-ip"), HeaderValue::from_static(ip))
}

async fn post_form(harness: &Harness, form: MultipartForm) -> axum_test::TestResponse {
    let (name, value) = client_ip("203.0.113.10");
    harness
        .server
        .post("/translate/pdf")
        .add_header(name, value)
        .multipart(form)
        .await
}

fn error_body(response: &axum_test::TestResponse) -> Value {
    response.json::<Value>()
}

#[tokio::test]
async fn test_health_returns_200() {
    let harness = create_harness();
    let response = harness.server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "pdf-translate-api");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_bilingual_translation_by_default() {
    let harness = create_harness();
    let form = pdf_form("paper.pdf", PDF).add_text("target_lang", "de");

    let response = post_form(&harness, form).await;
    response.assert_status_ok();

    assert_eq!(response.header("content-type"), "application/pdf");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"paper.bilingual.pdf\""
    );
    assert_eq!(response.as_bytes().to_vec(), b"%PDF dual".to_vec());
    assert_eq!(harness.calls(), 1);
}

#[tokio::test]
async fn test_translated_mode_returns_mono_artifact() {
    let harness = create_harness();
    let form = pdf_form("paper.pdf", PDF)
        .add_text("source_lang", "en")
        .add_text("target_lang", "de")
        .add_text("output_mode", "translated");

    let response = post_form(&harness, form).await;
    response.assert_status_ok();

    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"paper.translated.pdf\""
    );
    assert_eq!(response.as_bytes().to_vec(), b"%PDF mono".to_vec());

    let args = harness.runner.last_args();
    assert_eq!(&args[1..5], &["--lang-in", "en", "--lang-out", "de"]);
    assert!(args.contains(&"--no-dual".to_string()));
}

#[tokio::test]
async fn test_language_tokens_are_normalized() {
    let harness = create_harness();
    let form = pdf_form("paper.pdf", PDF)
        .add_text("source_lang", "  EN ")
        .add_text("target_lang", "ZH-CN");

    post_form(&harness, form).await.assert_status_ok();

    let args = harness.runner.last_args();
    assert_eq!(&args[1..5], &["--lang-in", "en", "--lang-out", "zh-cn"]);
}

#[tokio::test]
async fn test_rate_limit_denies_after_quota() {
    let harness = create_harness_with(2, 1024, write_both_artifacts);

    for _ in 0..2 {
        post_form(&harness, pdf_form("paper.pdf", PDF)).await.assert_status_ok();
    }

    let response = post_form(&harness, pdf_form("paper.pdf", PDF)).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response
        .header("retry-after")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=600).contains(&retry_after));

    let body = error_body(&response);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "RATE_LIMITED");
    assert_eq!(body["detail"], format!("Retry after {} seconds.", retry_after));
    assert_eq!(harness.calls(), 2);
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let harness = create_harness_with(1, 1024, write_both_artifacts);

    post_form(&harness, pdf_form("paper.pdf", PDF)).await.assert_status_ok();
    post_form(&harness, pdf_form("paper.pdf", PDF))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    let (name, value) = client_ip("198.51.100.20");
    harness
        .server
        .post("/translate/pdf")
        .add_header(name, value)
        .multipart(pdf_form("paper.pdf", PDF))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_counts_rejected_requests() {
    let harness = create_harness_with(1, 1024, write_both_artifacts);

    let response = post_form(&harness, MultipartForm::new().add_text("target_lang", "de")).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    post_form(&harness, pdf_form("paper.pdf", PDF))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(harness.calls(), 0);
}

#[tokio::test]
async fn test_missing_file_is_invalid_request() {
    let harness = create_harness();
    let response = post_form(&harness, MultipartForm::new().add_text("source_lang", "en")).await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_body(&response)["error"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_unknown_output_mode_is_invalid_request() {
    let harness = create_harness();
    let form = pdf_form("paper.pdf", PDF).add_text("output_mode", "side-by-side");

    let response = post_form(&harness, form).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_body(&response)["error"], "INVALID_REQUEST");
    assert_eq!(harness.calls(), 0);
}

#[tokio::test]
async fn test_non_pdf_filename_is_unsupported() {
    let harness = create_harness();
    let response = post_form(&harness, pdf_form("notes.docx", PDF)).await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        error_body(&response),
        json!({"ok": false, "error": "UNSUPPORTED_FILE_TYPE", "detail": null})
    );
}

#[tokio::test]
async fn test_uppercase_pdf_extension_is_accepted() {
    let harness = create_harness();
    let response = post_form(&harness, pdf_form("SCAN.PDF", PDF)).await;

    response.assert_status_ok();
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"SCAN.bilingual.pdf\""
    );
}

#[tokio::test]
async fn test_invalid_language_tokens_are_rejected() {
    let harness = create_harness();

    for (field, value) in [
        ("source_lang", "   "),
        ("target_lang", "en us"),
        ("target_lang", "zh;rm"),
        ("source_lang", "--help"),
        ("target_lang", "abcdefghijklmnopq"),
    ] {
        let form = pdf_form("paper.pdf", PDF).add_text(field, value);
        let response = post_form(&harness, form).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(error_body(&response)["error"], "INVALID_LANGUAGE_TOKEN", "{field}={value:?}");
    }
    assert_eq!(harness.calls(), 0);
}

#[tokio::test]
async fn test_identical_languages_are_rejected_unless_auto() {
    let harness = create_harness();

    let form = pdf_form("paper.pdf", PDF)
        .add_text("source_lang", "en")
        .add_text("target_lang", "EN");
    let response = post_form(&harness, form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = error_body(&response);
    assert_eq!(body["error"], "INVALID_LANGUAGE_PAIR");
    assert_eq!(
        body["detail"],
        "source_lang and target_lang must differ unless source_lang=auto."
    );

    let form = pdf_form("paper.pdf", PDF)
        .add_text("source_lang", "auto")
        .add_text("target_lang", "auto");
    post_form(&harness, form).await.assert_status_ok();
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let harness = create_harness();
    let response = post_form(&harness, pdf_form("paper.pdf", b"")).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&response)["error"], "EMPTY_FILE");
    assert_eq!(harness.calls(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let harness = create_harness_with(100, 16, write_both_artifacts);
    let response = post_form(&harness, pdf_form("paper.pdf", b"%PDF-1.7 seventeen")).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body = error_body(&response);
    assert_eq!(body["error"], "FILE_TOO_LARGE");
    assert_eq!(body["detail"], "Max allowed bytes: 16.");
    assert_eq!(harness.calls(), 0);
}

#[tokio::test]
async fn test_upload_at_ceiling_is_accepted() {
    let harness = create_harness_with(100, PDF.len(), write_both_artifacts);
    post_form(&harness, pdf_form("paper.pdf", PDF)).await.assert_status_ok();
}

#[tokio::test]
async fn test_missing_pdf_magic_is_unsupported() {
    let harness = create_harness();
    let response = post_form(&harness, pdf_form("paper.pdf", b"PK\x03\x04 zip")).await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(error_body(&response)["error"], "UNSUPPORTED_FILE_TYPE");
}

#[tokio::test]
async fn test_engine_failure_reports_diagnostic() {
    let harness = create_harness_with(100, 1024, |_| {
        Ok(ProcessOutcome::NonZeroExit {
            code: Some(1),
            stdout: "progress 40%".to_string(),
            stderr: "upstream model rejected the request\n".to_string(),
        })
    });

    let response = post_form(&harness, pdf_form("paper.pdf", PDF)).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_body(&response),
        json!({
            "ok": false,
            "error": "TRANSLATION_FAILED",
            "detail": "upstream model rejected the request"
        })
    );
}

#[tokio::test]
async fn test_engine_timeout_reports_diagnostic() {
    let harness = create_harness_with(100, 1024, |_| Ok(ProcessOutcome::TimedOut));

    let response = post_form(&harness, pdf_form("paper.pdf", PDF)).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(&response);
    assert_eq!(body["error"], "TRANSLATION_FAILED");
    assert_eq!(body["detail"], "BabelDOC translation timed out.");
}

#[tokio::test]
async fn test_unexpected_fault_is_opaque() {
    let harness = create_harness_with(100, 1024, |_| {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "/srv/secret denied"))
    });

    let response = post_form(&harness, pdf_form("paper.pdf", PDF)).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_body(&response),
        json!({"ok": false, "error": "INTERNAL_ERROR", "detail": null})
    );
}

#[tokio::test]
async fn test_workspaces_are_removed_after_requests() {
    let harness = create_harness();
    post_form(&harness, pdf_form("paper.pdf", PDF)).await.assert_status_ok();
    post_form(&harness, pdf_form("paper.pdf", b"%PDF"))
        .await
        .assert_status_ok();

    let left = std::fs::read_dir(harness.work_root.path()).unwrap().count();
    assert_eq!(left, 0);
}
