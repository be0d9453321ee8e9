//! Axum route handlers for the interview API.

use std::collections::BTreeMap;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::answers::generate_answers;
use crate::interview::extract::extract_resume_text;
use crate::interview::models::StarAnswer;
use crate::interview::questions::generate_questions;
use crate::rate_limit::{Admission, Bucket, ClientIdentity};
use crate::session::{session_cookie, session_id_from_headers};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<String>,
    pub job_title: String,
    pub total_questions: usize,
}

#[derive(Debug, Serialize)]
pub struct DeliveredAnswer {
    #[serde(flatten)]
    pub answer: StarAnswer,
    pub formatted: String,
}

#[derive(Debug, Serialize)]
pub struct AnswersResponse {
    pub success: bool,
    pub structured_answers: BTreeMap<usize, DeliveredAnswer>,
    pub total_questions: usize,
    pub method_used: &'static str,
}

/// Form fields of a question-generation upload.
struct Upload {
    file: Bytes,
    job_title: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /generate_questions
///
/// Multipart form: `pdf_file` + `job_title`. On success the questions are
/// stored under a freshly issued session id.
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    identity: ClientIdentity,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let admitted_at = admit(&state, &identity, Bucket::Questions)?;

    let upload = read_upload(multipart, state.config.pipeline.max_upload_bytes).await?;

    let resume_text = extract_resume_text(
        state.extractor.clone(),
        upload.file,
        state.config.pipeline.pdf_max_pages,
    )
    .await?;

    let session = match generate_questions(
        &state.upstream,
        &state.config.pipeline,
        &resume_text,
        &upload.job_title,
    )
    .await
    {
        Ok(session) => session,
        Err(err @ AppError::ResumeRejected(_)) => {
            if !state.config.rate_limit.count_rejected {
                state
                    .rate_limiter
                    .refund(&identity, Bucket::Questions, admitted_at);
            }
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let session_id = Uuid::new_v4();
    state.sessions.set(session_id, &session).await?;
    info!(
        "Stored {} questions in session {session_id}",
        session.questions.len()
    );

    let body = QuestionsResponse {
        total_questions: session.questions.len(),
        questions: session.questions,
        job_title: session.job_title,
    };
    Ok((
        [(header::SET_COOKIE, session_cookie(session_id))],
        Json(body),
    )
        .into_response())
}

/// POST /generate_answers
///
/// Reads the questions stored by the previous call; always succeeds once
/// questions exist.
pub async fn handle_generate_answers(
    State(state): State<AppState>,
    identity: ClientIdentity,
    headers: HeaderMap,
) -> Result<Json<AnswersResponse>, AppError> {
    admit(&state, &identity, Bucket::Answers)?;

    let no_session =
        || AppError::Validation("No questions found. Please generate questions first.".to_string());

    let session_id = session_id_from_headers(&headers).ok_or_else(no_session)?;
    let session = state
        .sessions
        .get(session_id)
        .await?
        .filter(|s| !s.questions.is_empty())
        .ok_or_else(no_session)?;

    let answers = generate_answers(&state.upstream, &state.config.pipeline, &session).await;

    let structured_answers = answers
        .into_iter()
        .map(|(ordinal, answer)| {
            let formatted = answer.formatted();
            (ordinal, DeliveredAnswer { answer, formatted })
        })
        .collect();

    Ok(Json(AnswersResponse {
        success: true,
        structured_answers,
        total_questions: session.questions.len(),
        method_used: "STAR Method",
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn admit(
    state: &AppState,
    identity: &ClientIdentity,
    bucket: Bucket,
) -> Result<tokio::time::Instant, AppError> {
    match state.rate_limiter.admit(identity, bucket) {
        Admission::Allowed { at } => Ok(at),
        Admission::Denied { retry_after } => {
            info!("Rate limited {identity} on {bucket} for {retry_after:?}");
            Err(AppError::RateLimited {
                retry_after_secs: Admission::retry_after_secs(retry_after),
            })
        }
    }
}

async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut job_title = String::new();

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("pdf_file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(upload_error)?;
                file = Some((filename, bytes));
            }
            Some("job_title") => {
                job_title = field.text().await.map_err(upload_error)?;
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    let job_title = job_title.trim().to_string();

    if filename.trim().is_empty() || job_title.is_empty() {
        return Err(AppError::Validation(
            "Please select file and job title".to_string(),
        ));
    }
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation(
            "Only PDF files are supported".to_string(),
        ));
    }
    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    Ok(Upload {
        file: bytes,
        job_title,
    })
}

fn upload_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge("Upload exceeds the request size limit".to_string())
    } else {
        AppError::Validation(format!("Invalid upload: {}", e.body_text()))
    }
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::FileTooLarge(format!(
        "File too large. Please upload a file smaller than {}MB.",
        max_bytes / (1024 * 1024)
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use std::net::SocketAddr;

    use axum::body::{to_bytes, Body};
    use axum::extract::ConnectInfo;
    use axum::http::{HeaderValue, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{AnswerMode, Config, PipelineConfig, RateLimitConfig, SessionBackend};
    use crate::interview::answers::fixtures::STAR_REPLY;
    use crate::interview::extract::testing::StubExtractor;
    use crate::interview::fallback::fallback_answer;
    use crate::interview::questions::fixtures::TEN_QUESTIONS;
    use crate::llm_client::testing::{upstream, ScriptedCompletion};
    use crate::llm_client::UpstreamError;
    use crate::rate_limit::RateLimiter;
    use crate::routes::build_router;
    use crate::session::{InMemorySessionStore, SessionStore, SESSION_COOKIE};

    const BOUNDARY: &str = "starcoach-test-boundary";
    const RESUME_PAGE: &str = "Experience: Software Engineer at X; Skills: Python, SQL";

    struct Harness {
        state: AppState,
        provider: Arc<ScriptedCompletion>,
        sessions: Arc<InMemorySessionStore>,
    }

    fn test_config(pipeline: PipelineConfig) -> Config {
        Config {
            anthropic_api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(3600),
                max_requests: 10,
                count_rejected: true,
                trust_forwarded_for: false,
            },
            retry_max_attempts: 0,
            retry_initial_delay: Duration::ZERO,
            pipeline,
            session_backend: SessionBackend::Memory,
            session_ttl: Duration::from_secs(3600),
        }
    }

    fn harness(script: Vec<Result<String, UpstreamError>>, config: Config) -> Harness {
        let provider = Arc::new(ScriptedCompletion::new(script));
        let sessions = Arc::new(InMemorySessionStore::new(config.session_ttl));
        let state = AppState {
            upstream: upstream(provider.clone()),
            extractor: Arc::new(StubExtractor(vec![RESUME_PAGE.to_string()])),
            sessions: sessions.clone(),
            rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            config,
        };
        Harness {
            state,
            provider,
            sessions,
        }
    }

    fn ok(texts: &[&str]) -> Vec<Result<String, UpstreamError>> {
        texts.iter().map(|t| Ok(t.to_string())).collect()
    }

    fn upload_request(filename: &str, job_title: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"job_title\"\r\n\r\n\
             {job_title}\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"pdf_file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.4 stub\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/generate_questions")
            .header("x-forwarded-for", "198.51.100.4")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn answers_request(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/generate_answers")
            .header("x-forwarded-for", "198.51.100.4");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    /// An upload arriving from `peer` that claims to be forwarded for `forwarded_for`.
    fn upload_via(peer: &str, forwarded_for: &str) -> Request<Body> {
        let mut request = upload_request("resume.pdf", "SRE");
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_str(forwarded_for).unwrap(),
        );
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    fn cookie_from(headers: &HeaderMap) -> String {
        let set_cookie = headers[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_scenario_a_questions_populate_session() {
        let h = harness(
            ok(&["VALID_RESUME", TEN_QUESTIONS]),
            test_config(PipelineConfig::default()),
        );

        let (status, headers, body) =
            send(&h.state, upload_request("resume.pdf", "Backend Engineer")).await;

        assert_eq!(status, StatusCode::OK);
        let questions = body["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 10);
        assert!(questions.iter().all(|q| !q.as_str().unwrap().is_empty()));
        assert_eq!(body["total_questions"], 10);

        let cookie = cookie_from(&headers);
        assert!(cookie.starts_with(SESSION_COOKIE));
        let id = Uuid::parse_str(cookie.split('=').nth(1).unwrap()).unwrap();
        let session = h.sessions.get(id).await.unwrap().unwrap();
        assert_eq!(session.job_title, "Backend Engineer");
        assert_eq!(session.resume_text, RESUME_PAGE);
        assert_eq!(session.questions.len(), 10);
        assert!(h.provider.prompts()[0].contains(RESUME_PAGE));
    }

    #[tokio::test]
    async fn test_scenario_b_non_resume_is_rejected_without_session() {
        let h = harness(
            ok(&["NOT_RESUME: this is an invoice"]),
            test_config(PipelineConfig::default()),
        );

        let (status, headers, body) =
            send(&h.state, upload_request("invoice.pdf", "Backend Engineer")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("doesn't appear to be a resume"));
        assert!(message.contains("this is an invoice"));
        assert!(headers.get(header::SET_COOKIE).is_none());
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_scenario_c_eleventh_call_is_denied() {
        let h = harness(Vec::new(), test_config(PipelineConfig::default()));

        // Upstream script is empty, so every admitted call fails at the LLM;
        // each still consumes a credit.
        for _ in 0..10 {
            let (status, _, _) = send(&h.state, upload_request("resume.pdf", "SRE")).await;
            assert_ne!(status, StatusCode::TOO_MANY_REQUESTS);
        }

        let (status, headers, body) = send(&h.state, upload_request("resume.pdf", "SRE")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        let retry_after = body["retry_after"].as_u64().unwrap();
        assert!((3599..=3600).contains(&retry_after), "retry_after={retry_after}");
        assert!(body["error"].as_str().unwrap().contains("seconds"));
        assert!(headers.get(header::RETRY_AFTER).is_some());
        assert_eq!(h.provider.calls(), 10);
    }

    #[tokio::test]
    async fn test_scenario_d_per_question_failure_gets_fallback() {
        let mut script = ok(&["VALID_RESUME", TEN_QUESTIONS]);
        for i in 1..=10 {
            if i == 3 {
                script.push(Err(UpstreamError::Fatal("bad request".into())));
            } else {
                script.push(Ok(STAR_REPLY.to_string()));
            }
        }
        let pipeline = PipelineConfig {
            answer_mode: AnswerMode::PerQuestion,
            answer_pacing: Duration::ZERO,
            ..PipelineConfig::default()
        };
        let h = harness(script, test_config(pipeline));

        let (_, headers, questions) =
            send(&h.state, upload_request("resume.pdf", "Backend Engineer")).await;
        let cookie = cookie_from(&headers);

        let (status, _, body) = send(&h.state, answers_request(Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["total_questions"], 10);
        assert_eq!(body["method_used"], "STAR Method");

        let answers = body["structured_answers"].as_object().unwrap();
        let keys: Vec<usize> = answers.keys().map(|k| k.parse().unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=10).collect::<Vec<_>>());

        let third_question = questions["questions"][2].as_str().unwrap();
        let expected = fallback_answer(third_question, "Backend Engineer");
        assert_eq!(answers["3"]["situation"], expected.situation.as_str());
        assert_eq!(answers["3"]["result"], expected.result.as_str());
        assert_eq!(answers["4"]["task"], "I was asked to bring it under two hours.");
        assert!(answers["4"]["formatted"]
            .as_str()
            .unwrap()
            .starts_with("<strong>Situation:</strong>"));
    }

    #[tokio::test]
    async fn test_answers_without_session_is_an_error() {
        let h = harness(Vec::new(), test_config(PipelineConfig::default()));
        let (status, _, body) = send(&h.state, answers_request(None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "No questions found. Please generate questions first."
        );
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_rejected_before_upstream() {
        let h = harness(Vec::new(), test_config(PipelineConfig::default()));
        let (status, _, body) = send(&h.state, upload_request("resume.docx", "SRE")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only PDF files are supported");
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_job_title_is_rejected() {
        let h = harness(Vec::new(), test_config(PipelineConfig::default()));
        let (status, _, body) = send(&h.state, upload_request("resume.pdf", "   ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please select file and job title");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let pipeline = PipelineConfig {
            max_upload_bytes: 4,
            ..PipelineConfig::default()
        };
        let h = harness(Vec::new(), test_config(pipeline));
        let (status, _, body) = send(&h.state, upload_request("resume.pdf", "SRE")).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "FILE_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_rejection_refunds_credit_when_configured() {
        let mut config = test_config(PipelineConfig::default());
        config.rate_limit.max_requests = 1;
        config.rate_limit.count_rejected = false;
        let h = harness(
            ok(&["NOT_RESUME: a recipe", "VALID_RESUME", TEN_QUESTIONS]),
            config,
        );

        let (first, _, _) = send(&h.state, upload_request("recipe.pdf", "Chef")).await;
        assert_eq!(first, StatusCode::UNPROCESSABLE_ENTITY);
        let (second, _, _) = send(&h.state, upload_request("resume.pdf", "Chef")).await;
        assert_eq!(second, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_reports_try_later() {
        let h = harness(
            vec![Err(UpstreamError::QuotaExceeded("429".into()))],
            test_config(PipelineConfig::default()),
        );
        let (status, _, body) = send(&h.state, upload_request("resume.pdf", "SRE")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "API quota exceeded. Please try again later.");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_not_found() {
        let h = harness(Vec::new(), test_config(PipelineConfig::default()));
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let (status, _, body) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_health_reports_modes() {
        let h = harness(Vec::new(), test_config(PipelineConfig::default()));
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let (status, _, body) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["answer_mode"], "Batch");
        assert_eq!(body["model"], "test-model");
    }

    #[tokio::test]
    async fn test_rotating_forwarded_header_is_still_limited() {
        let mut config = test_config(PipelineConfig::default());
        config.rate_limit.max_requests = 2;
        let h = harness(Vec::new(), config);

        let mut denied = 0;
        for i in 0..6 {
            let request = upload_via("192.0.2.10:40000", &format!("10.0.0.{i}"));
            let (status, _, _) = send(&h.state, request).await;
            if status == StatusCode::TOO_MANY_REQUESTS {
                denied += 1;
            }
        }
        assert_eq!(denied, 4);
        assert_eq!(h.provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_forwarded_header_keys_clients_when_trusted() {
        let mut config = test_config(PipelineConfig::default());
        config.rate_limit.max_requests = 1;
        config.rate_limit.trust_forwarded_for = true;
        let h = harness(Vec::new(), config);

        for i in 0..3 {
            let request = upload_via("192.0.2.10:40000", &format!("10.0.0.{i}"));
            let (status, _, _) = send(&h.state, request).await;
            assert_ne!(status, StatusCode::TOO_MANY_REQUESTS);
        }
        let (status, _, _) = send(&h.state, upload_via("192.0.2.10:40000", "10.0.0.0")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unreadable_document_halts_before_upstream() {
        let mut h = harness(
            ok(&["VALID_RESUME", TEN_QUESTIONS]),
            test_config(PipelineConfig::default()),
        );
        h.state.extractor = Arc::new(StubExtractor(vec!["  ".to_string(), "\n".to_string()]));

        let (status, headers, body) = send(&h.state, upload_request("scan.pdf", "SRE")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "EXTRACTION_ERROR");
        assert_eq!(body["error"], "Could not extract text from PDF");
        assert!(headers.get(header::SET_COOKIE).is_none());
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_client_supplied_session_id_is_not_adopted() {
        let h = harness(
            ok(&["VALID_RESUME", TEN_QUESTIONS]),
            test_config(PipelineConfig::default()),
        );
        let planted = Uuid::new_v4();
        let mut request = upload_request("resume.pdf", "Backend Engineer");
        request.headers_mut().insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={planted}")).unwrap(),
        );

        let (status, headers, _) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::OK);

        let cookie = cookie_from(&headers);
        let issued = Uuid::parse_str(cookie.split('=').nth(1).unwrap()).unwrap();
        assert_ne!(issued, planted);
        assert!(h.sessions.get(planted).await.unwrap().is_none());
        assert!(h.sessions.get(issued).await.unwrap().is_some());
    }
}
