//! Resume intake: extract, score, store and notify.

use crate::db_types::CandidateRecord;
use crate::extract::{extract_text, DocumentFormat, ExtractError};
use crate::notify::{is_deliverable, templates};
use crate::report::{candidates_xlsx, qualified_count};
use crate::resume::{score_resume, ParseError, ScoredCandidate};
use crate::scoring::resume_status;
use crate::types::AppState;

use serde::Serialize;
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{error, info, warn};

/// One uploaded document.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub async fn text(&self) -> Result<String, ExtractError> {
        let format =
            DocumentFormat::detect(self.content_type.as_deref(), Some(self.filename.as_str()))?;
        extract_text(self.bytes.clone(), format).await
    }
}

#[derive(Debug, Error)]
enum FileError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("could not store candidate: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Stored,
    Duplicate,
    Error,
}

#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntakeReport {
    pub processed: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub emails_sent: usize,
    pub report_sent: bool,
    pub results: Vec<FileOutcome>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct NotifySummary {
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub skipped: usize,
    pub report_sent: bool,
}

enum Stored {
    New(CandidateRecord),
    Duplicate(ScoredCandidate),
}

async fn score_and_store(
    state: &AppState,
    upload: &Upload,
    job_description: &str,
) -> Result<Stored, FileError> {
    let text = upload.text().await?;
    let scored = score_resume(state.generator.as_ref(), job_description, &text).await?;
    let row = scored.to_new_candidate();
    if state
        .repository
        .candidate_exists(&row.email, &row.phone_number)
        .await?
    {
        info!(name=%row.name, "candidate already stored; skipping");
        return Ok(Stored::Duplicate(scored));
    }
    let id = state.repository.insert_candidate(&row).await?;
    Ok(Stored::New(CandidateRecord {
        id,
        name: row.name,
        skills: row.skills,
        education: row.education,
        certifications: row.certifications,
        experience: row.experience,
        email: row.email,
        phone_number: row.phone_number,
        linkedin: row.linkedin,
        score: row.score,
        status: row.status,
    }))
}

/// Score every upload against `job_description`, store new candidates, email each stored
/// candidate their status and send HR one report. A failing file is reported and skipped.
pub async fn process_resumes(
    state: &AppState,
    uploads: Vec<Upload>,
    job_description: &str,
) -> IntakeReport {
    let mut results = Vec::with_capacity(uploads.len());
    let mut stored = vec![];
    let mut duplicates = 0;

    for upload in &uploads {
        let outcome = match score_and_store(state, upload, job_description).await {
            Ok(Stored::New(record)) => {
                let outcome = FileOutcome {
                    filename: upload.filename.clone(),
                    status: FileStatus::Stored,
                    candidate_id: Some(record.id),
                    name: Some(record.name.clone()),
                    score: u8::try_from(record.score).ok(),
                    candidate_status: Some(resume_status(record.score)),
                    error: None,
                };
                stored.push(record);
                outcome
            }
            Ok(Stored::Duplicate(scored)) => {
                duplicates += 1;
                FileOutcome {
                    filename: upload.filename.clone(),
                    status: FileStatus::Duplicate,
                    candidate_id: None,
                    name: Some(scored.candidate.name.clone()),
                    score: Some(scored.score.value()),
                    candidate_status: Some(scored.status()),
                    error: None,
                }
            }
            Err(e) => {
                warn!(error=%e, filename=%upload.filename, "failed to process resume");
                FileOutcome {
                    filename: upload.filename.clone(),
                    status: FileStatus::Error,
                    candidate_id: None,
                    name: None,
                    score: None,
                    candidate_status: None,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(outcome);
    }

    let summary = notify_candidates(state, &stored).await;
    let failed = results
        .iter()
        .filter(|r| r.status == FileStatus::Error)
        .count();
    IntakeReport {
        processed: uploads.len(),
        stored: stored.len(),
        duplicates,
        failed,
        emails_sent: summary.emails_sent,
        report_sent: summary.report_sent,
        results,
    }
}

/// Email each candidate with a usable address their resume status, then send HR a CSV report
/// of all of `candidates`. Nothing is sent for an empty list.
pub async fn notify_candidates(state: &AppState, candidates: &[CandidateRecord]) -> NotifySummary {
    let mut summary = NotifySummary::default();
    if candidates.is_empty() {
        return summary;
    }

    for candidate in candidates {
        if !is_deliverable(&candidate.email) {
            summary.skipped += 1;
            continue;
        }
        let email = templates::resume_status(
            &candidate.email,
            &candidate.name,
            candidate.score,
            &candidate.status,
        );
        match state.notifier.send(email).await {
            Ok(()) => summary.emails_sent += 1,
            Err(e) => {
                error!(error=%e, id=candidate.id, "failed to send status email");
                summary.emails_failed += 1;
            }
        }
    }

    summary.report_sent = send_hr_report(state, candidates).await;
    summary
}

fn report_timestamp() -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_else(|_| "now".to_string())
}

pub async fn send_hr_report(state: &AppState, candidates: &[CandidateRecord]) -> bool {
    let workbook = match candidates_xlsx(candidates) {
        Ok(workbook) => workbook,
        Err(e) => {
            error!(error=%e, "failed to render candidate report");
            return false;
        }
    };
    let email = templates::hr_report(
        &state.config.hr_email,
        &report_timestamp(),
        candidates.len(),
        qualified_count(candidates),
        workbook,
    );
    match state.notifier.send(email).await {
        Ok(()) => true,
        Err(e) => {
            error!(error=%e, "failed to send hr report");
            false
        }
    }
}
