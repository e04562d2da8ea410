//! Resume and job description extraction through the text generation service.
//!
//! Generated JSON is decoded strictly: anything that does not fit the expected shape becomes a
//! [`ParseError`] instead of a half-filled record.

use crate::db_types::{NewCandidate, NewJobDescription};
use crate::llm::{GenerationRequest, LlmError, TextGenerator};
use crate::prompts::{
    JOB_DESCRIPTION_SYSTEM, JOB_DESCRIPTION_TEMPLATE, RESUME_PARSE_TEMPLATE,
    RESUME_SCORE_TEMPLATE, RESUME_SYSTEM,
};
use crate::scoring::{ResumeScore, STATUS_NEW};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const RESUME_MODEL: &str = "gpt-4o";
const JOB_DESCRIPTION_MODEL: &str = "gpt-4o-mini";
/// Document extraction is off the phone path and may take much longer than an interview turn.
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error("generated output is not the expected json: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("generated output has no {0}")]
    MissingField(&'static str),
    #[error("generated score {0} is outside 0-100")]
    ScoreOutOfRange(i64),
}

/// A json value the model may send as one string or as a list of strings.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    fn joined(self) -> String {
        match self {
            TextOrList::Text(text) => text.trim().to_string(),
            TextOrList::List(items) => clean_items(items).join(", "),
        }
    }

    fn items(self) -> Vec<String> {
        match self {
            TextOrList::Text(text) => clean_items(text.split(',').map(str::to_string).collect()),
            TextOrList::List(items) => clean_items(items),
        }
    }
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn joined(field: Option<TextOrList>) -> String {
    field.map(TextOrList::joined).unwrap_or_default()
}

fn items(field: Option<TextOrList>) -> Vec<String> {
    field.map(TextOrList::items).unwrap_or_default()
}

#[derive(Deserialize, Debug)]
struct RawCandidate {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "phone number", alias = "phone_number")]
    phone: Option<String>,
    #[serde(default)]
    skills: Option<TextOrList>,
    #[serde(default)]
    certifications: Option<TextOrList>,
    #[serde(default)]
    education: Option<TextOrList>,
    #[serde(default)]
    experience: Option<TextOrList>,
    #[serde(default)]
    linkedin: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCandidate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub education: String,
    pub experience: String,
    pub linkedin: String,
}

impl ParsedCandidate {
    fn from_raw(raw: RawCandidate) -> Result<Self, ParseError> {
        let name = raw.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(ParseError::MissingField("name"));
        }
        let text = |v: Option<String>| v.unwrap_or_default().trim().to_string();
        Ok(Self {
            name,
            email: text(raw.email),
            phone: text(raw.phone),
            skills: items(raw.skills),
            certifications: items(raw.certifications),
            education: joined(raw.education),
            experience: joined(raw.experience),
            linkedin: text(raw.linkedin),
        })
    }

    /// Row to store for this candidate.
    pub fn to_new_candidate(&self, score: i32, status: &str) -> NewCandidate {
        NewCandidate {
            name: self.name.clone(),
            skills: self.skills.join(", "),
            education: self.education.clone(),
            certifications: self.certifications.join(", "),
            experience: self.experience.clone(),
            email: self.email.clone(),
            phone_number: self.phone.clone(),
            linkedin: self.linkedin.clone(),
            score,
            status: status.to_string(),
        }
    }

    /// Row for a resume that has been parsed but not scored.
    pub fn to_unscored_candidate(&self) -> NewCandidate {
        self.to_new_candidate(0, STATUS_NEW)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: ParsedCandidate,
    pub score: ResumeScore,
}

impl ScoredCandidate {
    pub fn status(&self) -> &'static str {
        self.score.status()
    }

    pub fn to_new_candidate(&self) -> NewCandidate {
        self.candidate
            .to_new_candidate(self.score.value() as i32, self.status())
    }
}

pub fn decode_candidate(json: &str) -> Result<ParsedCandidate, ParseError> {
    let raw = serde_json::from_str::<RawCandidate>(json)?;
    ParsedCandidate::from_raw(raw)
}

/// Decode a candidate plus its 0-100 score. The status is derived here from the score; any
/// status the model volunteers is ignored.
pub fn decode_scored_candidate(json: &str) -> Result<ScoredCandidate, ParseError> {
    let mut raw = serde_json::from_str::<RawCandidate>(json)?;
    let score = raw.score.take().ok_or(ParseError::MissingField("score"))?;
    if !score.is_finite() {
        return Err(ParseError::MissingField("score"));
    }
    let rounded = score.round() as i64;
    let score = ResumeScore::new(rounded).ok_or(ParseError::ScoreOutOfRange(rounded))?;
    Ok(ScoredCandidate {
        candidate: ParsedCandidate::from_raw(raw)?,
        score,
    })
}

#[derive(Deserialize, Debug)]
struct RawJobDescription {
    #[serde(default)]
    title: Option<TextOrList>,
    #[serde(default)]
    company: Option<TextOrList>,
    #[serde(default)]
    location: Option<TextOrList>,
    #[serde(default, rename = "type", alias = "employment_type")]
    employment_type: Option<TextOrList>,
    #[serde(default)]
    salary: Option<TextOrList>,
    #[serde(default)]
    experience: Option<TextOrList>,
    #[serde(default)]
    description: Option<TextOrList>,
    #[serde(default)]
    requirements: Option<TextOrList>,
    #[serde(default)]
    responsibilities: Option<TextOrList>,
    #[serde(default)]
    skills: Option<TextOrList>,
    #[serde(default)]
    benefits: Option<TextOrList>,
}

pub fn decode_job_description(json: &str) -> Result<NewJobDescription, ParseError> {
    let raw = serde_json::from_str::<RawJobDescription>(json)?;
    let title = joined(raw.title);
    if title.is_empty() {
        return Err(ParseError::MissingField("title"));
    }
    Ok(NewJobDescription {
        title,
        company: joined(raw.company),
        location: joined(raw.location),
        employment_type: joined(raw.employment_type),
        salary: joined(raw.salary),
        experience: joined(raw.experience),
        description: joined(raw.description),
        requirements: joined(raw.requirements),
        responsibilities: joined(raw.responsibilities),
        skills: joined(raw.skills),
        benefits: joined(raw.benefits),
    })
}

fn extraction_request(
    model: &'static str,
    system: &str,
    prompt: String,
    temperature: f32,
) -> GenerationRequest {
    GenerationRequest {
        model,
        system: Some(system.to_string()),
        prompt,
        max_tokens: 600,
        temperature,
        json_mode: true,
        timeout: EXTRACTION_TIMEOUT,
    }
}

pub async fn parse_resume(
    generator: &dyn TextGenerator,
    resume_text: &str,
) -> Result<ParsedCandidate, ParseError> {
    let prompt = RESUME_PARSE_TEMPLATE.replace("{resume}", resume_text);
    let json = generator
        .generate(extraction_request(RESUME_MODEL, RESUME_SYSTEM, prompt, 0.0))
        .await?;
    decode_candidate(&json).map_err(|e| {
        warn!(error=%e, "could not decode parsed resume");
        e
    })
}

pub async fn score_resume(
    generator: &dyn TextGenerator,
    job_description: &str,
    resume_text: &str,
) -> Result<ScoredCandidate, ParseError> {
    let prompt = RESUME_SCORE_TEMPLATE
        .replace("{job_description}", job_description)
        .replace("{resume}", resume_text);
    let json = generator
        .generate(extraction_request(RESUME_MODEL, RESUME_SYSTEM, prompt, 0.0))
        .await?;
    let scored = decode_scored_candidate(&json).map_err(|e| {
        warn!(error=%e, "could not decode scored resume");
        e
    })?;
    debug!(name=%scored.candidate.name, score=scored.score.value(), "scored resume");
    Ok(scored)
}

pub async fn parse_job_description(
    generator: &dyn TextGenerator,
    text: &str,
) -> Result<NewJobDescription, ParseError> {
    let prompt = JOB_DESCRIPTION_TEMPLATE.replace("{job_description}", text);
    let json = generator
        .generate(extraction_request(
            JOB_DESCRIPTION_MODEL,
            JOB_DESCRIPTION_SYSTEM,
            prompt,
            0.7,
        ))
        .await?;
    decode_job_description(&json).map_err(|e| {
        warn!(error=%e, "could not decode parsed job description");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{STATUS_INTERVIEW_SCHEDULED, STATUS_NOT_SCHEDULED};
    use crate::test_support::ScriptedGenerator;

    const JANE: &str = r#"{
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": "+1 555 010 2030",
        "skills": ["Rust", " SQL ", ""],
        "certifications": "AWS Certified, CKA",
        "education": "BSc Computer Science",
        "experience": "6 years backend",
        "linkedin": null,
        "score": 82
    }"#;

    #[test]
    fn decodes_lists_and_strings() {
        let candidate = decode_candidate(JANE).unwrap();
        assert_eq!(candidate.name, "Jane Doe");
        assert_eq!(candidate.skills, vec!["Rust", "SQL"]);
        assert_eq!(candidate.certifications, vec!["AWS Certified", "CKA"]);
        assert_eq!(candidate.linkedin, "");
        let row = candidate.to_unscored_candidate();
        assert_eq!(row.skills, "Rust, SQL");
        assert_eq!(row.score, 0);
        assert_eq!(row.status, STATUS_NEW);
    }

    #[test]
    fn scored_candidate_status_comes_from_score() {
        let scored = decode_scored_candidate(JANE).unwrap();
        assert_eq!(scored.score.value(), 82);
        assert_eq!(scored.status(), STATUS_INTERVIEW_SCHEDULED);

        let json = r#"{"name": "Sam", "score": 69.6, "status": "Not Scheduled"}"#;
        assert_eq!(decode_scored_candidate(json).unwrap().score.value(), 70);
        let json = r#"{"name": "Sam", "score": 12, "status": "Interview Scheduled"}"#;
        assert_eq!(decode_scored_candidate(json).unwrap().status(), STATUS_NOT_SCHEDULED);
    }

    #[test]
    fn strict_decode_reports_reason() {
        assert!(matches!(
            decode_candidate("```json {} ```"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            decode_candidate(r#"{"email": "a@b.c"}"#),
            Err(ParseError::MissingField("name"))
        ));
        assert!(matches!(
            decode_scored_candidate(r#"{"name": "Sam"}"#),
            Err(ParseError::MissingField("score"))
        ));
        assert!(matches!(
            decode_scored_candidate(r#"{"name": "Sam", "score": 140}"#),
            Err(ParseError::ScoreOutOfRange(140))
        ));
        assert!(matches!(
            decode_scored_candidate(r#"{"name": "Sam", "score": "high"}"#),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn job_description_lists_are_joined() {
        let json = r#"{
            "title": "Backend Engineer",
            "company": "Acme",
            "type": "full-time",
            "skills": ["Rust", "Postgres"],
            "requirements": "3+ years"
        }"#;
        let jd = decode_job_description(json).unwrap();
        assert_eq!(jd.title, "Backend Engineer");
        assert_eq!(jd.employment_type, "full-time");
        assert_eq!(jd.skills, "Rust, Postgres");
        assert_eq!(jd.benefits, "");
        assert!(matches!(
            decode_job_description(r#"{"company": "Acme"}"#),
            Err(ParseError::MissingField("title"))
        ));
    }

    #[tokio::test]
    async fn score_resume_sends_both_documents_in_json_mode() {
        let generator = ScriptedGenerator::new(vec![Ok(JANE.to_string())]);
        let scored = score_resume(&generator, "Rust engineer wanted", "Jane Doe, Rust")
            .await
            .unwrap();
        assert_eq!(scored.candidate.email, "jane@example.com");
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("Rust engineer wanted"));
        assert!(prompt.contains("Jane Doe, Rust"));
        assert!(generator.requests()[0].json_mode);
        assert_eq!(generator.requests()[0].timeout, EXTRACTION_TIMEOUT);
    }

    #[tokio::test]
    async fn generation_failure_is_a_parse_error() {
        let generator = ScriptedGenerator::failing();
        assert!(matches!(
            parse_resume(&generator, "text").await,
            Err(ParseError::Generation(_))
        ));
    }
}
