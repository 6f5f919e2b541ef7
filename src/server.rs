//! HTTP API for the document Q&A service.
//!
//! Endpoints:
//! - POST /upload - multipart PDF upload; extracts and stores the text
//! - POST /ask    - answer a question about the stored text via Gemini
//! - GET  /health - liveness and document status
//!
//! CORS is open to any origin. Upload bodies are not size-limited.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::document::DocumentStore;
use crate::gemini::{self, GeminiClient, GeminiError};
use crate::pdf_text::{self, PdfError};
use crate::settings::Settings;

// ============================================================================
// AppState
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<DocumentStore>,
    pub gemini: Arc<GeminiClient>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        let gemini = GeminiClient::new(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            store: Arc::new(DocumentStore::new()),
            gemini: Arc::new(gemini),
            start_time: Instant::now(),
        })
    }
}

// ============================================================================
// Error types
// ============================================================================

// /upload reports errors as {"error": ...}, /ask as {"answer": ...}.
// Client-input errors (400) are not logged; fault paths log before mapping.

struct UploadError(StatusCode, String);

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"error": self.1}))).into_response()
    }
}

struct AskError(StatusCode, String);

impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"answer": self.1}))).into_response()
    }
}

fn no_file_uploaded() -> UploadError {
    UploadError(StatusCode::BAD_REQUEST, "No PDF file uploaded".to_string())
}

fn failed_to_process() -> UploadError {
    UploadError(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to process PDF".to_string(),
    )
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

#[derive(Serialize)]
struct UploadResponse {
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    document_loaded: bool,
    uptime_secs: u64,
}

// ============================================================================
// Handlers
// ============================================================================

// POST /upload
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    // First field carrying a filename is the document; field name is not
    // checked, and neither are MIME type or size.
    let mut file_bytes = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.file_name().is_some() {
                    let data = field.bytes().await.map_err(|e| {
                        eprintln!("[Upload] Failed to read file part: {}", e);
                        no_file_uploaded()
                    })?;
                    file_bytes = Some(data);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("[Upload] Malformed multipart body: {}", e);
                return Err(no_file_uploaded());
            }
        }
    }
    let data = file_bytes.ok_or_else(no_file_uploaded)?;
    let byte_len = data.len();

    // Extraction is CPU-bound, so it runs off the reactor.
    let upload_dir = state.settings.upload_dir.clone();
    let text = tokio::task::spawn_blocking(move || extract_via_temp_file(&upload_dir, &data))
        .await
        .map_err(|e| {
            eprintln!("[Upload] Extraction task failed: {}", e);
            failed_to_process()
        })?
        .map_err(|e| {
            eprintln!("[Upload] PDF parsing error: {}", e);
            failed_to_process()
        })?;

    println!(
        "[Upload] Extracted {} chars from {} byte PDF",
        text.chars().count(),
        byte_len
    );
    state.store.replace(text).await;

    Ok(Json(UploadResponse {
        message: "PDF uploaded and processed successfully".to_string(),
    }))
}

/// Stage the upload in a named temp file, read it back, extract its text.
///
/// `NamedTempFile` deletes the file when it goes out of scope, so cleanup
/// happens on every exit path, including extraction failure and unwind.
fn extract_via_temp_file(upload_dir: &Path, data: &[u8]) -> Result<String, PdfError> {
    use std::io::Write;

    let mut tmp = tempfile::NamedTempFile::new_in(upload_dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    let bytes = std::fs::read(tmp.path())?;
    pdf_text::extract_text(&bytes)
}

// POST /ask
async fn ask_handler(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AskError> {
    let question = match req.question {
        Some(q) if !q.is_empty() => q,
        _ => {
            return Err(AskError(
                StatusCode::BAD_REQUEST,
                "Question missing.".to_string(),
            ))
        }
    };

    let Some(document) = state.store.current().await else {
        return Err(AskError(
            StatusCode::BAD_REQUEST,
            "No PDF uploaded yet. Please upload a PDF first.".to_string(),
        ));
    };

    let prompt = gemini::build_prompt(&document, &question, state.settings.max_context_chars);

    match state.gemini.generate_answer(&prompt).await {
        Ok(answer) => Ok(Json(AskResponse { answer })),
        Err(GeminiError::Api { status, message }) => {
            eprintln!("[Ask] Gemini API error {}: {}", status, message);
            // Relay the upstream status to the caller.
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Err(AskError(status, format!("Gemini API error: {}", message)))
        }
        Err(e) => {
            eprintln!("[Ask] Error fetching answer: {}", e);
            Err(AskError(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error fetching answer from AI.".to_string(),
            ))
        }
    }
}

// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        document_loaded: state.store.is_loaded().await,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/ask", post(ask_handler))
        .route("/health", get(health_handler))
        // Uploads have no size constraint; drop axum's default body cap.
        .layer(DefaultBodyLimit::disable())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_text::minimal_pdf;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    // The Gemini upstream is a scripted mock router that records every
    // prompt it receives.
    #[derive(Clone)]
    struct MockGemini {
        prompts: Arc<Mutex<Vec<String>>>,
        status: StatusCode,
        body: serde_json::Value,
    }

    async fn mock_generate(
        State(mock): State<MockGemini>,
        Json(req): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let prompt = req["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        mock.prompts.lock().unwrap().push(prompt);
        (mock.status, Json(mock.body.clone()))
    }

    async fn spawn(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    struct TestApp {
        addr: SocketAddr,
        prompts: Arc<Mutex<Vec<String>>>,
        upload_dir: tempfile::TempDir,
        client: reqwest::Client,
    }

    impl TestApp {
        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        async fn upload_bytes(&self, bytes: Vec<u8>) -> reqwest::Response {
            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name("doc.pdf")
                .mime_str("application/pdf")
                .unwrap();
            let form = reqwest::multipart::Form::new().part("pdf", part);
            self.client
                .post(self.url("/upload"))
                .multipart(form)
                .send()
                .await
                .unwrap()
        }

        async fn ask(&self, body: serde_json::Value) -> reqwest::Response {
            self.client
                .post(self.url("/ask"))
                .json(&body)
                .send()
                .await
                .unwrap()
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }

        fn upload_dir_entries(&self) -> usize {
            std::fs::read_dir(self.upload_dir.path()).unwrap().count()
        }
    }

    async fn spawn_app_with(status: StatusCode, body: serde_json::Value) -> TestApp {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let mock = MockGemini {
            prompts: prompts.clone(),
            status,
            body,
        };
        let mock_router = Router::new()
            .route("/v1beta/models/{call}", post(mock_generate))
            .with_state(mock);
        let gemini_addr = spawn(mock_router).await;

        let upload_dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            bind_addr: "127.0.0.1:0".to_string(),
            api_key: "test-key".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_base_url: format!("http://{}", gemini_addr),
            max_context_chars: 8000,
            max_output_tokens: 500,
            temperature: 0.2,
            request_timeout_secs: 10,
            upload_dir: upload_dir.path().to_path_buf(),
        };
        let state = AppState::new(settings).unwrap();
        let addr = spawn(router(state)).await;

        TestApp {
            addr,
            prompts,
            upload_dir,
            client: reqwest::Client::new(),
        }
    }

    async fn spawn_app_answering(answer: &str) -> TestApp {
        spawn_app_with(
            StatusCode::OK,
            serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": answer}]}}]
            }),
        )
        .await
    }

    #[tokio::test]
    async fn test_upload_then_ask_returns_answer() {
        let app = spawn_app_answering("The secret code is KUMQUAT.").await;

        let resp = app
            .upload_bytes(minimal_pdf("the secret code is KUMQUAT"))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "PDF uploaded and processed successfully");

        let resp = app
            .ask(serde_json::json!({"question": "What is the secret code?"}))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "The secret code is KUMQUAT.");

        // The prompt embeds the extracted document text and the question.
        let prompt = app.last_prompt();
        assert!(prompt.contains("the secret code is KUMQUAT"));
        assert!(prompt.contains("What is the secret code?"));
    }

    #[tokio::test]
    async fn test_ask_without_upload_returns_400() {
        let app = spawn_app_answering("unused").await;

        let resp = app.ask(serde_json::json!({"question": "anything?"})).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(
            body["answer"],
            "No PDF uploaded yet. Please upload a PDF first."
        );
    }

    #[tokio::test]
    async fn test_ask_with_missing_question_returns_400() {
        let app = spawn_app_answering("unused").await;

        let resp = app.ask(serde_json::json!({})).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "Question missing.");
    }

    #[tokio::test]
    async fn test_ask_with_empty_question_returns_400() {
        let app = spawn_app_answering("unused").await;

        let resp = app.ask(serde_json::json!({"question": ""})).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "Question missing.");
    }

    #[tokio::test]
    async fn test_upload_without_file_part_returns_400() {
        let app = spawn_app_answering("unused").await;

        let form = reqwest::multipart::Form::new().text("note", "no file here");
        let resp = app
            .client
            .post(app.url("/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "No PDF file uploaded");
    }

    #[tokio::test]
    async fn test_second_upload_replaces_first() {
        let app = spawn_app_answering("ok").await;

        app.upload_bytes(minimal_pdf("the code is BANANA")).await;
        app.upload_bytes(minimal_pdf("the code is KUMQUAT")).await;
        app.ask(serde_json::json!({"question": "code?"})).await;

        let prompt = app.last_prompt();
        assert!(prompt.contains("KUMQUAT"));
        assert!(!prompt.contains("BANANA"));
    }

    #[tokio::test]
    async fn test_prompt_is_truncated_to_context_limit() {
        let app = spawn_app_answering("ok").await;

        // 9000 chars of padding, then a needle that must be cut off.
        let long_text = format!("{}NEEDLE", "x".repeat(9000));
        let resp = app.upload_bytes(minimal_pdf(&long_text)).await;
        assert_eq!(resp.status(), 200);

        app.ask(serde_json::json!({"question": "what?"})).await;
        let prompt = app.last_prompt();
        assert!(!prompt.contains("NEEDLE"));
        assert!(prompt.contains(&"x".repeat(1000)));
    }

    #[tokio::test]
    async fn test_upload_leaves_no_temp_files_on_success() {
        let app = spawn_app_answering("ok").await;

        let resp = app.upload_bytes(minimal_pdf("clean me up")).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(app.upload_dir_entries(), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_returns_500_and_leaves_no_temp_files() {
        let app = spawn_app_answering("ok").await;

        let resp = app.upload_bytes(b"definitely not a pdf".to_vec()).await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Failed to process PDF");
        assert_eq!(app.upload_dir_entries(), 0);
    }

    #[tokio::test]
    async fn test_upstream_429_is_relayed_with_message() {
        let app = spawn_app_with(
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({"error": {"message": "Quota exceeded"}}),
        )
        .await;

        app.upload_bytes(minimal_pdf("some document")).await;
        let resp = app.ask(serde_json::json!({"question": "q?"})).await;
        assert_eq!(resp.status(), 429);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "Gemini API error: Quota exceeded");
    }

    #[tokio::test]
    async fn test_upstream_500_falls_back_to_status_text() {
        let app = spawn_app_with(StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({})).await;

        app.upload_bytes(minimal_pdf("some document")).await;
        let resp = app.ask(serde_json::json!({"question": "q?"})).await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "Gemini API error: Internal Server Error");
    }

    #[tokio::test]
    async fn test_empty_candidates_yield_fallback_answer() {
        let app = spawn_app_with(StatusCode::OK, serde_json::json!({"candidates": []})).await;

        app.upload_bytes(minimal_pdf("some document")).await;
        let resp = app.ask(serde_json::json!({"question": "q?"})).await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answer"], "No answer found in document.");
    }

    #[tokio::test]
    async fn test_health_reports_document_state() {
        let app = spawn_app_answering("ok").await;

        let resp = app.client.get(app.url("/health")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["document_loaded"], false);

        app.upload_bytes(minimal_pdf("now loaded")).await;
        let resp = app.client.get(app.url("/health")).send().await.unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["document_loaded"], true);
    }
}
