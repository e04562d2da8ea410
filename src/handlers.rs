use crate::conversation_state::SessionSnapshot;
use crate::db_types::{CandidateRecord, JobDescriptionRecord, NewCandidate, NewJobDescription};
use crate::error::AppError;
use crate::intake::{notify_candidates, process_resumes, IntakeReport, NotifySummary, Upload};
use crate::lifecycle::{
    dial_candidates, error_response, handle_status, handle_turn, start_call, PrescreenSummary,
};
use crate::report::{candidates_csv, CandidateFilter, DashboardStats};
use crate::resume::{parse_job_description, parse_resume};
use crate::twilio_types::{Response, TwilioConnectPayload, TwilioGatherPayload, TwilioStatusPayload};
use crate::types::AppState;
use crate::utils::twiml_response;

use axum::{
    extract::{rejection::PathRejection, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

pub fn app_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/twilio/outgoing-call/:candidate_id",
            post(twilio_outgoing_call),
        )
        .route("/twilio/gather/:candidate_id/:turn", post(twilio_gather))
        .route("/twilio/status/:candidate_id", post(twilio_status))
        .route("/resumes/parse", post(resumes_parse))
        .route("/resumes/score", post(resumes_score))
        .route(
            "/job-descriptions",
            get(job_descriptions_list).post(job_descriptions_create),
        )
        .route("/candidates", get(candidates_list))
        .route("/candidates/export", get(candidates_export))
        .route("/candidates/notify", post(candidates_notify))
        .route("/analytics/dashboard", get(analytics_dashboard))
        .route("/prescreening", post(prescreening))
        .route("/conversations", get(conversations))
        .route("/", get(|| async { "HR prescreen service" }))
        .with_state(app_state)
}

type TwimlReply = (StatusCode, HeaderMap, String);

fn bad_webhook(what: &str, e: impl std::fmt::Display) -> TwimlReply {
    error!(error=%e, "failed to read twilio {what}");
    twiml_response(error_response())
}

pub async fn twilio_outgoing_call(
    path: Result<Path<i64>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> TwimlReply {
    trace!(body=%body, "outgoing call request body");
    let Path(candidate_id) = match path {
        Ok(path) => path,
        Err(e) => return bad_webhook("outgoing call path", e),
    };
    let payload = match serde_urlencoded::from_str::<TwilioConnectPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => return bad_webhook("connect payload", e),
    };
    debug!(call_sid=%payload.call_sid, status=?payload.call_status, to=?payload.to, from=?payload.from, "call connected");

    twiml_response(start_call(&app_state, candidate_id, &payload.call_sid).await)
}

pub async fn twilio_gather(
    path: Result<Path<(i64, usize)>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> TwimlReply {
    trace!(body=%body, "gather request body");
    let Path((candidate_id, turn)) = match path {
        Ok(path) => path,
        Err(e) => return bad_webhook("gather path", e),
    };
    let payload = match serde_urlencoded::from_str::<TwilioGatherPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => return bad_webhook("gather payload", e),
    };
    debug!(call_sid=%payload.call_sid, turn, confidence=?payload.confidence, "speech gathered");

    let response = handle_turn(
        &app_state,
        candidate_id,
        turn,
        &payload.call_sid,
        payload.speech_result.as_deref(),
    )
    .await;
    twiml_response(response)
}

pub async fn twilio_status(
    path: Result<Path<i64>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
    body: String,
) -> TwimlReply {
    trace!(body=%body, "status callback body");
    let Path(candidate_id) = match path {
        Ok(path) => path,
        Err(e) => return bad_webhook("status path", e),
    };
    match serde_urlencoded::from_str::<TwilioStatusPayload>(&body) {
        Ok(payload) => {
            debug!(call_sid=%payload.call_sid, status=?payload.call_status, duration=?payload.call_duration, "call status");
            handle_status(&app_state, candidate_id, &payload).await;
        }
        Err(e) => error!(error=%e, "failed to read twilio status payload"),
    }
    twiml_response(Response { actions: vec![] })
}

/// Files and plain fields of a multipart upload.
struct UploadForm {
    files: Vec<Upload>,
    fields: HashMap<String, String>,
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("invalid multipart body: {e}"))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut files = vec![];
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                files.push(Upload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let text = field.text().await.map_err(bad_multipart)?;
                fields.insert(name, text);
            }
        }
    }
    Ok(UploadForm { files, fields })
}

fn single_file(form: UploadForm) -> Result<Upload, AppError> {
    form.files
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest("no file uploaded".to_string()))
}

#[derive(Serialize)]
pub struct Created<T> {
    pub id: i64,
    #[serde(flatten)]
    pub record: T,
}

pub async fn resumes_parse(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Created<NewCandidate>>, AppError> {
    let upload = single_file(read_upload_form(multipart).await?)?;
    let text = upload.text().await?;
    let parsed = parse_resume(app_state.generator.as_ref(), &text).await?;
    let row = parsed.to_unscored_candidate();
    let id = app_state.repository.insert_candidate(&row).await?;
    info!(id, name=%row.name, "resume parsed");
    Ok(Json(Created { id, record: row }))
}

pub async fn resumes_score(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<IntakeReport>, AppError> {
    let form = read_upload_form(multipart).await?;
    if form.files.is_empty() {
        return Err(AppError::BadRequest("no resumes uploaded".to_string()));
    }

    let job_id = form.fields.get("job_id").map(|s| s.trim()).filter(|s| !s.is_empty());
    let job_description = match job_id {
        Some(raw) => {
            let id = raw
                .parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("invalid job_id '{raw}'")))?;
            app_state
                .repository
                .get_job_description(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("job description {id}")))?
                .as_prompt_text()
        }
        None => form
            .fields
            .get("job_description")
            .cloned()
            .unwrap_or_default(),
    };

    let report = process_resumes(&app_state, form.files, &job_description).await;
    info!(
        processed = report.processed,
        stored = report.stored,
        failed = report.failed,
        "resume batch scored"
    );
    Ok(Json(report))
}

pub async fn job_descriptions_create(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Created<NewJobDescription>>, AppError> {
    let upload = single_file(read_upload_form(multipart).await?)?;
    let text = upload.text().await?;
    let jd = parse_job_description(app_state.generator.as_ref(), &text).await?;
    let id = app_state.repository.insert_job_description(&jd).await?;
    info!(id, title=%jd.title, "job description stored");
    Ok(Json(Created { id, record: jd }))
}

pub async fn job_descriptions_list(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<JobDescriptionRecord>>, AppError> {
    Ok(Json(app_state.repository.list_job_descriptions().await?))
}

pub async fn candidates_list(
    State(app_state): State<Arc<AppState>>,
    Query(filter): Query<CandidateFilter>,
) -> Result<Json<Vec<CandidateRecord>>, AppError> {
    let candidates = app_state.repository.list_candidates().await?;
    Ok(Json(filter.apply(candidates)))
}

/// Filtered candidate listing as a csv download.
pub async fn candidates_export(
    State(app_state): State<Arc<AppState>>,
    Query(filter): Query<CandidateFilter>,
) -> Result<(HeaderMap, Vec<u8>), AppError> {
    let candidates = filter.apply(app_state.repository.list_candidates().await?);
    let csv = candidates_csv(&candidates)?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"candidates.csv\""),
    );
    Ok((headers, csv))
}

pub async fn candidates_notify(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<NotifySummary>, AppError> {
    let candidates = app_state.repository.list_candidates().await?;
    Ok(Json(notify_candidates(&app_state, &candidates).await))
}

pub async fn analytics_dashboard(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, AppError> {
    let candidates = app_state.repository.list_candidates().await?;
    let job_descriptions = app_state.repository.list_job_descriptions().await?;
    Ok(Json(DashboardStats::compute(&candidates, job_descriptions.len())))
}

#[derive(Debug, Deserialize)]
pub struct PrescreenRequest {
    pub candidate_ids: Vec<i64>,
}

pub async fn prescreening(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<PrescreenRequest>,
) -> Result<Json<PrescreenSummary>, AppError> {
    if request.candidate_ids.is_empty() {
        return Err(AppError::BadRequest("candidate_ids is empty".to_string()));
    }
    let summary = dial_candidates(&app_state, &request.candidate_ids).await;
    info!(
        placed = summary.placed,
        skipped = summary.skipped,
        failed = summary.failed,
        "prescreening batch dialed"
    );
    Ok(Json(summary))
}

pub async fn conversations(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot: Vec<SessionSnapshot> = app_state.conversations.snapshot().await;
    Json(snapshot)
}
