use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use audio_core::AudioSegment;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use exam_core::exam::{
    Interview, ListeningAnnouncements, ListeningExam, ReadingAdverts, ReadingComprehension,
    ReadingMatchTitles, WritingExam, WritingReview, WritingReviewRequest,
};
use exam_core::Direction;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::audio::{announcement_segments, interview_segments, listening_segments};
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::state::{AppState, CacheStatus};
use crate::validation::{validate_translation_text, validate_writing_review};

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub caches: Vec<CacheStatus>,
    pub all_ready: bool,
    pub request_count: u64,
    pub uptime_seconds: u64,
}

/// Every route is served both at the root and under `/api`.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = &state.config;

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(60_000 / u64::from(config.rate_limit_per_minute.max(1)))
            .burst_size(config.rate_limit_per_minute.max(1))
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .context("invalid rate limit configuration")?,
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config))
        .into_inner();

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/status", get(status))
        .route("/listening-exam", get(listening_exam))
        .route("/listening-exam/audio", get(listening_exam_audio))
        .route("/interview", get(interview))
        .route("/interview/audio", get(interview_audio))
        .route("/reading/comprehension", get(reading_comprehension))
        .route("/reading/match-titles", get(reading_match_titles))
        .route("/reading/adverts", get(reading_adverts))
        .route("/listening-announcements", get(listening_announcements))
        .route("/listening-announcements/audio", get(listening_announcements_audio))
        .route("/writing/exam", get(writing_exam))
        .route("/writing/review", post(review_writing))
        .route("/translate/en-to-de", post(translate_en_to_de))
        .route("/translate/de-to-en", post(translate_de_to_en));

    Ok(Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .fallback(not_found)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let Some(allowed_origins) = &config.cors_allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        return base.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        base.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(AllowOrigin::list(origins))
    }
}

async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(request).await;
    };
    request.headers_mut().insert("x-request-id", value.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", value);
    response
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let caches = state.caches.statuses();
    Json(StatusResponse {
        all_ready: caches.iter().all(|c| c.ready),
        caches,
        request_count: state.request_count.load(Ordering::Relaxed),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

pub async fn listening_exam(State(state): State<AppState>) -> Result<Json<Arc<ListeningExam>>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.caches.listening.get().await?))
}

pub async fn interview(State(state): State<AppState>) -> Result<Json<Arc<Interview>>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.caches.interview.get().await?))
}

pub async fn reading_comprehension(
    State(state): State<AppState>,
) -> Result<Json<Arc<ReadingComprehension>>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.caches.comprehension.get().await?))
}

pub async fn reading_match_titles(
    State(state): State<AppState>,
) -> Result<Json<Arc<ReadingMatchTitles>>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.caches.match_titles.get().await?))
}

pub async fn reading_adverts(State(state): State<AppState>) -> Result<Json<Arc<ReadingAdverts>>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.caches.adverts.get().await?))
}

pub async fn listening_announcements(
    State(state): State<AppState>,
) -> Result<Json<Arc<ListeningAnnouncements>>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.caches.announcements.get().await?))
}

pub async fn writing_exam(State(state): State<AppState>) -> Result<Json<Arc<WritingExam>>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.caches.writing.get().await?))
}

/// Corrections for a written answer. Not cached: every answer is different.
pub async fn review_writing(
    State(state): State<AppState>,
    Json(req): Json<WritingReviewRequest>,
) -> Result<Json<WritingReview>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    validate_writing_review(&req)?;

    let timeout = state.config.llm_timeout();
    let review = tokio::time::timeout(timeout, state.reviewer.review(&req))
        .await
        .map_err(|_| ApiError::Llm(format!("Review timed out after {} seconds", timeout.as_secs())))?
        .map_err(|e| ApiError::Llm(format!("Review failed: {e:#}")))?;

    Ok(Json(review))
}

pub async fn interview_audio(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let interview = state.caches.interview.get().await?;
    stream_audio(&state, interview_segments(&interview)).await
}

pub async fn listening_exam_audio(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let exam = state.caches.listening.get().await?;
    stream_audio(&state, listening_segments(&exam)).await
}

pub async fn listening_announcements_audio(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let exam = state.caches.announcements.get().await?;
    stream_audio(&state, announcement_segments(&exam)).await
}

/// Assemble `segments` and stream the result back from a spooled temp file.
/// The body is always a 16-bit PCM `audio/wav` file, never MP3. Nothing
/// synthesized is still a success, with an empty body.
async fn stream_audio(state: &AppState, segments: Vec<AudioSegment>) -> Result<Response, ApiError> {
    let audio = state
        .assembler
        .assemble(segments, Some(state.config.silence_range()))
        .await
        .map_err(ApiError::Audio)?;

    if audio.is_empty() {
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "audio/wav"), (header::CONTENT_LENGTH, "0")],
            Body::empty(),
        )
            .into_response());
    }

    let spooled = audio
        .spool_to(&state.config.audio_spool_dir)
        .await
        .map_err(ApiError::Audio)?;
    let len = spooled.len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(spooled.into_stream()))
        .map_err(|e| ApiError::Internal(format!("Failed to build audio response: {e}")))
}

pub async fn translate_en_to_de(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    translate(&state, req, Direction::EnToDe).await
}

pub async fn translate_de_to_en(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    translate(&state, req, Direction::DeToEn).await
}

async fn translate(
    state: &AppState,
    req: TranslateRequest,
    direction: Direction,
) -> Result<Json<TranslateResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    validate_translation_text(&req.text)?;

    let timeout = state.config.llm_timeout();
    let translation = tokio::time::timeout(timeout, state.translator.translate(&req.text, direction))
        .await
        .map_err(|_| {
            ApiError::Llm(format!(
                "Translation timed out after {} seconds",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| ApiError::Llm(format!("Translation failed: {e:#}")))?;

    Ok(Json(TranslateResponse { translation }))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
