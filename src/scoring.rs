use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts::CALL_SCORE_TEMPLATE;

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const STATUS_INTERVIEW_SCHEDULED: &str = "Interview Scheduled";
pub const STATUS_NOT_SCHEDULED: &str = "Not Scheduled";
pub const STATUS_NEW: &str = "New";
pub const STATUS_CALL_SKIPPED: &str = "Call Skipped";
pub const STATUS_CALL_FAILED: &str = "Call Failed";

const CALL_SCORING_MODEL: &str = "gpt-4o-mini";

/// Prescreening call score on a 1-10 scale. Gate: 7.
///
/// Deliberately a different type from [`ResumeScore`]: the two scales are independent gates and
/// are never converted into one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CallScore(u8);

impl CallScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const PASS: u8 = 7;
    /// Score given to a call that produced no responses at all.
    pub const NO_RESPONSES: CallScore = CallScore(3);
    /// Score given when the generated score cannot be used.
    pub const UNPARSEABLE: CallScore = CallScore(5);

    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn status(&self) -> &'static str {
        if self.0 >= Self::PASS {
            STATUS_INTERVIEW_SCHEDULED
        } else {
            STATUS_NOT_SCHEDULED
        }
    }
}

/// Resume fit score on a 0-100 scale. Gate: 70.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ResumeScore(u8);

impl ResumeScore {
    pub const MAX: u8 = 100;
    pub const PASS: u8 = 70;

    pub fn new(raw: i64) -> Option<Self> {
        (0..=Self::MAX as i64).contains(&raw).then(|| Self(raw as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn status(&self) -> &'static str {
        resume_status(self.0 as i32)
    }
}

/// Status label for a stored resume score.
pub fn resume_status(score: i32) -> &'static str {
    if score >= ResumeScore::PASS as i32 {
        STATUS_INTERVIEW_SCHEDULED
    } else {
        STATUS_NOT_SCHEDULED
    }
}

/// Final outcome of a prescreening call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Disposition {
    pub score: CallScore,
    pub status: &'static str,
}

impl Disposition {
    pub fn from_score(score: CallScore) -> Self {
        Self {
            score,
            status: score.status(),
        }
    }
}

/// Read a call score out of generated text. Accepts a bare integer, optionally followed by
/// `/10` or punctuation; anything else yields [`CallScore::UNPARSEABLE`].
pub fn parse_call_score(text: &str) -> CallScore {
    let token = text
        .trim()
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(|c: char| c == '.' || c == ',' || c == '!');
    match token.parse::<i64>() {
        Ok(raw) => CallScore::clamped(raw),
        Err(_) => {
            warn!(text, "could not parse call score; using default");
            CallScore::UNPARSEABLE
        }
    }
}

/// Score a finished interview from its responses. Never fails.
pub async fn score_call(
    generator: &dyn TextGenerator,
    timeout: Duration,
    responses: &[String],
) -> Disposition {
    if responses.is_empty() {
        debug!("no responses recorded; using default call score");
        return Disposition::from_score(CallScore::NO_RESPONSES);
    }

    let numbered = responses
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Response {}: {}", i + 1, r))
        .collect::<Vec<String>>()
        .join("\n");
    let request = GenerationRequest {
        model: CALL_SCORING_MODEL,
        system: None,
        prompt: CALL_SCORE_TEMPLATE.replace("{responses}", &numbered),
        max_tokens: 10,
        temperature: 0.3,
        json_mode: false,
        timeout,
    };

    let score = match generator.generate(request).await {
        Ok(text) => parse_call_score(&text),
        Err(e) => {
            warn!(error=%e, "call scoring failed; using default");
            CallScore::UNPARSEABLE
        }
    };
    Disposition::from_score(score)
}
