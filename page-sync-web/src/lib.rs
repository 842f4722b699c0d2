//! HTTP surface of page-sync
//!
//! Webhooks from the issue tracker and the translation service, plus the
//! per-page actions editors trigger from the CMS toolbar. Every endpoint
//! answers as soon as its work is scheduled; job failures only show up in
//! the logs.

use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use page_sync::{DispatchError, Dispatcher, DuplicationReport, Scheduled, TranslationCallback};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job: String,
    pub slug: String,
    pub delay_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledResponse {
    pub scheduled: Vec<ScheduledJob>,
}

impl From<&Scheduled> for ScheduledResponse {
    fn from(scheduled: &Scheduled) -> Self {
        Self {
            scheduled: scheduled
                .jobs
                .iter()
                .map(|(job, delay)| ScheduledJob {
                    job: job.name().to_string(),
                    slug: job.slug().to_string(),
                    delay_secs: delay.as_secs(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguageFailure {
    pub language: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CopyResponse {
    pub copied_plugins: usize,
    pub failures: Vec<LanguageFailure>,
}

impl From<&DuplicationReport> for CopyResponse {
    fn from(report: &DuplicationReport) -> Self {
        Self {
            copied_plugins: report.copied_plugins,
            failures: report
                .failures()
                .filter_map(|outcome| {
                    outcome.result.as_ref().err().map(|e| LanguageFailure {
                        language: outcome.language.clone(),
                        error: e.to_string(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `DispatchError` mapped onto a status code
pub struct AppError(DispatchError);

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("{}: {}", status, self.0);
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Acting user, passed by the CMS as `?user=`
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
}

pub fn build_router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/hooks/validate", post(validate_page))
        .route("/hooks/complete", post(complete_page))
        .route("/hooks/translation", post(receive_translation))
        .route("/pages/{slug}/export", get(push_to_translation))
        .route("/pages/{slug}/import/{language}", get(pull_from_translation))
        .route("/pages/{slug}/copy-from-production", get(copy_from_production))
        .route("/pages/{slug}/promote", get(promote_to_production))
        .route("/pages/{slug}/document", get(render_blank))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

async fn validate_page(
    State(dispatcher): State<Dispatcher>,
    body: Bytes,
) -> Result<Json<ScheduledResponse>, AppError> {
    let scheduled = dispatcher.validate_page(&body).await?;
    Ok(Json(ScheduledResponse::from(&scheduled)))
}

async fn complete_page(
    State(dispatcher): State<Dispatcher>,
    body: Bytes,
) -> Result<Json<ScheduledResponse>, AppError> {
    let scheduled = dispatcher.complete_page(&body).await?;
    Ok(Json(ScheduledResponse::from(&scheduled)))
}

async fn receive_translation(
    State(dispatcher): State<Dispatcher>,
    Form(callback): Form<TranslationCallback>,
) -> Json<ScheduledResponse> {
    let scheduled = dispatcher.receive_translation(&callback);
    Json(ScheduledResponse::from(&scheduled))
}

async fn push_to_translation(
    State(dispatcher): State<Dispatcher>,
    Path(slug): Path<String>,
) -> Result<Json<ScheduledResponse>, AppError> {
    let scheduled = dispatcher.push_to_translation(&slug).await?;
    Ok(Json(ScheduledResponse::from(&scheduled)))
}

async fn pull_from_translation(
    State(dispatcher): State<Dispatcher>,
    Path((slug, language)): Path<(String, String)>,
) -> Result<Json<ScheduledResponse>, AppError> {
    let scheduled = dispatcher.pull_from_translation(&slug, &language).await?;
    Ok(Json(ScheduledResponse::from(&scheduled)))
}

async fn copy_from_production(
    State(dispatcher): State<Dispatcher>,
    Path(slug): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<CopyResponse>, AppError> {
    let report = dispatcher
        .copy_from_production(&slug, query.user.as_deref())
        .await?;
    info!("Copied production '{}' back to staging", slug);
    Ok(Json(CopyResponse::from(&report)))
}

async fn promote_to_production(
    State(dispatcher): State<Dispatcher>,
    Path(slug): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ScheduledResponse>, AppError> {
    let scheduled = dispatcher
        .promote_to_production(&slug, query.user.as_deref())
        .await?;
    Ok(Json(ScheduledResponse::from(&scheduled)))
}

async fn render_blank(
    State(dispatcher): State<Dispatcher>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let blank = dispatcher.render_blank(&slug).await?;
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        blank.html,
    )
        .into_response();
    if let Some(value) = blank
        .last_modified
        .and_then(|date| header::HeaderValue::from_str(&date).ok())
    {
        response.headers_mut().insert(header::LAST_MODIFIED, value);
    }
    Ok(response)
}
