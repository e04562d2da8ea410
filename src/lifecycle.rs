//! Drives one prescreening call from dialing to disposition.
//!
//! Twilio talks to us through a chain of webhooks: one when the call connects, one per gathered
//! answer and a status callback when the call ends. Every webhook url carries the candidate id,
//! and every gather url also carries the turn it answers, so a callback can be matched to its
//! session and replays can be spotted.

use crate::conversation_state::{CallPhase, CallSession};
use crate::db_types::CandidateRecord;
use crate::interview::{
    greeting, is_final_turn, next_prompt, CLOSING_STATEMENT, ERROR_CLOSING_STATEMENT,
    FALLBACK_PROMPT, NO_INPUT_NOTICE,
};
use crate::notify::{is_deliverable, templates};
use crate::scoring::{
    score_call, CallScore, Disposition, STATUS_CALL_FAILED, STATUS_CALL_SKIPPED,
};
use crate::telephony::{normalize_phone, OutboundCall};
use crate::twilio_types::{
    GatherAction, GatherInput, HangupAction, HttpMethod, RedirectAction, Response,
    ResponseAction, SayAction, TwilioStatusPayload,
};
use crate::types::AppState;

use serde::Serialize;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Seconds Twilio waits for the candidate to start speaking.
const GATHER_TIMEOUT_SECS: u16 = 7;
/// Subject name used when a callback arrives for a call we hold no session for.
const UNKNOWN_SUBJECT: &str = "there";
/// Time a gather callback may spend before replying. Twilio drops the call with an application
/// error once a webhook takes 15 s.
pub const WEBHOOK_BUDGET: Duration = Duration::from_secs(12);

pub fn outgoing_call_path(candidate_id: i64) -> String {
    format!("/twilio/outgoing-call/{candidate_id}")
}

pub fn gather_path(candidate_id: i64, turn: usize) -> String {
    format!("/twilio/gather/{candidate_id}/{turn}")
}

pub fn status_path(candidate_id: i64) -> String {
    format!("/twilio/status/{candidate_id}")
}

fn say(text: &str) -> ResponseAction {
    ResponseAction::Say(SayAction {
        text: text.to_string(),
        ..Default::default()
    })
}

/// Speak `prompt`, listen for the answer to `turn`, and come back to the same url with no
/// speech if the candidate stays silent.
fn ask(state: &AppState, prompt: &str, candidate_id: i64, turn: usize) -> Response {
    let url = state.public_url(&gather_path(candidate_id, turn));
    Response {
        actions: vec![
            say(prompt),
            ResponseAction::Gather(GatherAction {
                input: Some(GatherInput::Speech),
                timeout: Some(GATHER_TIMEOUT_SECS),
                speech_timeout: Some("auto".to_string()),
                action: Some(url.clone()),
                method: Some(HttpMethod::Post),
            }),
            say(NO_INPUT_NOTICE),
            ResponseAction::Redirect(RedirectAction {
                url,
                method: Some(HttpMethod::Post),
            }),
        ],
    }
}

fn close(prompt: Option<&str>, closing: &str) -> Response {
    let mut actions = vec![];
    if let Some(prompt) = prompt {
        actions.push(say(prompt));
    }
    actions.push(say(closing));
    actions.push(ResponseAction::Hangup(HangupAction {}));
    Response { actions }
}

/// What to send back after the answer to `turn` has been handled.
fn reply_for_turn(state: &AppState, prompt: &str, candidate_id: i64, turn: usize) -> Response {
    if is_final_turn(turn) {
        close(Some(prompt), CLOSING_STATEMENT)
    } else {
        ask(state, prompt, candidate_id, turn + 1)
    }
}

/// Graceful goodbye for callbacks we cannot make sense of.
pub fn error_response() -> Response {
    close(None, ERROR_CLOSING_STATEMENT)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DialOutcome {
    Placed { call_id: String },
    Skipped { reason: String },
    Failed { error: String },
    NotFound,
}

#[derive(Debug, Serialize)]
pub struct DialResult {
    pub candidate_id: i64,
    #[serde(flatten)]
    pub outcome: DialOutcome,
}

#[derive(Debug, Default, Serialize)]
pub struct PrescreenSummary {
    pub placed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_found: usize,
    pub results: Vec<DialResult>,
}

async fn record_status(state: &AppState, candidate_id: i64, status: &str) {
    match state.repository.update_status(candidate_id, status).await {
        Ok(true) => debug!(candidate_id, status, "candidate status updated"),
        Ok(false) => warn!(candidate_id, status, "no candidate row to update"),
        Err(e) => error!(error=%e, candidate_id, status, "failed to update candidate status"),
    }
}

/// Place the prescreening call for one candidate. Numbers that cannot be dialed are skipped
/// and never retried.
pub async fn dial_candidate(state: &AppState, candidate: &CandidateRecord) -> DialOutcome {
    let to = match normalize_phone(&candidate.phone_number, &state.config.default_country_code) {
        Some(to) => to,
        None => {
            info!(candidate_id = candidate.id, phone=%candidate.phone_number, "no dialable phone number; skipping call");
            record_status(state, candidate.id, STATUS_CALL_SKIPPED).await;
            return DialOutcome::Skipped {
                reason: format!("invalid phone number '{}'", candidate.phone_number),
            };
        }
    };

    let call = OutboundCall {
        to,
        answer_url: state.public_url(&outgoing_call_path(candidate.id)),
        status_callback_url: state.public_url(&status_path(candidate.id)),
    };
    match state.telephony.place_call(call).await {
        Ok(call_id) => {
            info!(candidate_id = candidate.id, call_id=%call_id, "prescreening call placed");
            // the first webhook may already have opened the session
            state
                .conversations
                .get_or_create(&call_id, candidate.id, &candidate.name);
            DialOutcome::Placed { call_id }
        }
        Err(e) => {
            error!(error=%e, candidate_id = candidate.id, "failed to place call");
            record_status(state, candidate.id, STATUS_CALL_FAILED).await;
            DialOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Dial each candidate in turn.
pub async fn dial_candidates(state: &AppState, candidate_ids: &[i64]) -> PrescreenSummary {
    let mut summary = PrescreenSummary::default();
    for &candidate_id in candidate_ids {
        let outcome = match state.repository.get_candidate(candidate_id).await {
            Ok(Some(candidate)) => dial_candidate(state, &candidate).await,
            Ok(None) => DialOutcome::NotFound,
            Err(e) => {
                error!(error=%e, candidate_id, "failed to load candidate");
                DialOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        match &outcome {
            DialOutcome::Placed { .. } => summary.placed += 1,
            DialOutcome::Skipped { .. } => summary.skipped += 1,
            DialOutcome::Failed { .. } => summary.failed += 1,
            DialOutcome::NotFound => summary.not_found += 1,
        }
        summary.results.push(DialResult {
            candidate_id,
            outcome,
        });
    }
    summary
}

async fn candidate_name(state: &AppState, candidate_id: i64) -> String {
    match state.repository.get_candidate(candidate_id).await {
        Ok(Some(candidate)) if !candidate.name.trim().is_empty() => candidate.name,
        Ok(_) => UNKNOWN_SUBJECT.to_string(),
        Err(e) => {
            error!(error=%e, candidate_id, "failed to load candidate");
            UNKNOWN_SUBJECT.to_string()
        }
    }
}

/// First webhook of a call: greet the candidate and listen for the answer to turn 0.
pub async fn start_call(state: &AppState, candidate_id: i64, call_id: &str) -> Response {
    let handle = match state.conversations.get(call_id) {
        Some(handle) => handle,
        None => {
            // dialed from elsewhere, or the session did not survive a restart
            let name = candidate_name(state, candidate_id).await;
            state.conversations.create(call_id, candidate_id, &name)
        }
    };

    let mut session = handle.lock().await;
    if session.phase.is_terminal() {
        return close(None, CLOSING_STATEMENT);
    }
    if session.phase == CallPhase::Dialing {
        session.phase = CallPhase::AwaitingSpeech { turn: 0 };
    }
    info!(call_id, candidate_id, name=%session.subject_name, "call connected");
    ask(state, &greeting(&session.subject_name), candidate_id, 0)
}

/// Gather webhook for `turn`: record the answer, decide the next prompt and either keep
/// listening or close the call.
pub async fn handle_turn(
    state: &AppState,
    candidate_id: i64,
    turn: usize,
    call_id: &str,
    speech: Option<&str>,
) -> Response {
    let deadline = Instant::now() + WEBHOOK_BUDGET;
    let speech = speech.unwrap_or_default().trim();
    let handle = match state.conversations.get(call_id) {
        Some(handle) => handle,
        None => return degraded_turn(state, candidate_id, turn, call_id, speech, deadline).await,
    };

    let mut session = handle.lock().await;
    if session.phase.is_terminal() || session.phase == CallPhase::Closing {
        debug!(call_id, turn, phase=?session.phase, "callback after the interview ended");
        return close(None, CLOSING_STATEMENT);
    }

    if turn < session.turn_index() {
        if let Some(prompt) = session.prompt_for(turn) {
            debug!(call_id, turn, "replayed callback; answering from the recorded prompt");
            return reply_for_turn(state, prompt, candidate_id, turn);
        }
    }

    let turn_index = session.turn_index();
    if turn != turn_index {
        warn!(call_id, turn, turn_index, "callback turn does not match session; using session turn");
    }
    session.phase = CallPhase::Processing { turn: turn_index };
    let prompt = prompt_within(
        state,
        deadline,
        &session.subject_name,
        session.turn_responses(),
        speech,
        turn_index,
    )
    .await;
    session.append_response(speech);
    session.record_prompt(turn_index, prompt.clone());
    debug!(call_id, turn = turn_index, "turn recorded");

    if is_final_turn(turn_index) {
        session.phase = CallPhase::Closing;
        complete_interview(state, &mut session, deadline).await;
    } else {
        session.phase = CallPhase::AwaitingSpeech {
            turn: turn_index + 1,
        };
    }
    reply_for_turn(state, &prompt, candidate_id, turn_index)
}

/// Next prompt, or the fallback once the callback has used up its budget.
async fn prompt_within(
    state: &AppState,
    deadline: Instant,
    subject_name: &str,
    prior: &[String],
    speech: &str,
    turn: usize,
) -> String {
    let generation = next_prompt(
        state.generator.as_ref(),
        state.config.llm_timeout,
        subject_name,
        prior,
        speech,
        turn,
    );
    match timeout_at(deadline, generation).await {
        Ok(prompt) => prompt,
        Err(_) => {
            warn!(turn, "prompt generation outlived the webhook budget; using fallback");
            FALLBACK_PROMPT.to_string()
        }
    }
}

/// Keep the call going for a call id we hold no session for: no history, no scoring.
async fn degraded_turn(
    state: &AppState,
    candidate_id: i64,
    turn: usize,
    call_id: &str,
    speech: &str,
    deadline: Instant,
) -> Response {
    warn!(call_id, candidate_id, turn, "no session for call; continuing without memory");
    let prompt = prompt_within(state, deadline, UNKNOWN_SUBJECT, &[], speech, turn).await;
    reply_for_turn(state, &prompt, candidate_id, turn)
}

/// Score the finished interview, record the outcome and tell the candidate and HR.
///
/// Mail failures are logged and leave the recorded status in place. Scoring and mail share what
/// is left of the callback's budget; a late score falls back to the default.
async fn complete_interview(state: &AppState, session: &mut CallSession, deadline: Instant) {
    let scoring = score_call(
        state.generator.as_ref(),
        state.config.llm_timeout,
        session.turn_responses(),
    );
    let disposition = match timeout_at(deadline, scoring).await {
        Ok(disposition) => disposition,
        Err(_) => {
            warn!(call_id=%session.call_id, "call scoring outlived the webhook budget; using default");
            Disposition::from_score(CallScore::UNPARSEABLE)
        }
    };
    session.disposition = Some(disposition);
    info!(
        call_id=%session.call_id,
        candidate_id=session.candidate_id,
        score=disposition.score.value(),
        status=disposition.status,
        "interview scored"
    );
    record_status(state, session.candidate_id, disposition.status).await;

    if timeout_at(deadline, notify_outcome(state, session, disposition))
        .await
        .is_err()
    {
        warn!(call_id=%session.call_id, "outcome emails outlived the webhook budget; abandoned");
    }
    session.phase = CallPhase::Completed;
}

async fn notify_outcome(state: &AppState, session: &CallSession, disposition: Disposition) {
    let candidate_email = match state.repository.get_candidate(session.candidate_id).await {
        Ok(Some(candidate)) => candidate.email,
        Ok(None) => String::new(),
        Err(e) => {
            error!(error=%e, candidate_id=session.candidate_id, "failed to load candidate");
            String::new()
        }
    };

    if is_deliverable(&candidate_email) {
        let email = templates::call_status(
            &candidate_email,
            &session.subject_name,
            disposition.status,
        );
        if let Err(e) = state.notifier.send(email).await {
            error!(error=%e, candidate_id=session.candidate_id, "failed to email candidate");
        }
    } else {
        warn!(candidate_id=session.candidate_id, "candidate has no usable email; not notified");
    }

    let summary = templates::call_summary(
        &state.config.hr_email,
        &session.subject_name,
        &candidate_email,
        disposition.score,
        disposition.status,
        session.turn_responses(),
    );
    if let Err(e) = state.notifier.send(summary).await {
        error!(error=%e, candidate_id=session.candidate_id, "failed to email call summary to hr");
    }
}

/// Status callback: a call that never reached the candidate is marked failed.
pub async fn handle_status(state: &AppState, candidate_id: i64, payload: &TwilioStatusPayload) {
    let call_id = payload.call_sid.as_str();
    if !payload.call_status.is_failure() {
        debug!(call_id, status=?payload.call_status, "call status update");
        return;
    }

    if let Some(handle) = state.conversations.get(call_id) {
        let mut session = handle.lock().await;
        if session.phase.is_terminal() {
            return;
        }
        session.phase = CallPhase::Failed;
    }
    warn!(call_id, candidate_id, status=?payload.call_status, "call did not reach candidate");
    record_status(state, candidate_id, STATUS_CALL_FAILED).await;

    match state.repository.get_candidate(candidate_id).await {
        Ok(Some(candidate)) if is_deliverable(&candidate.email) => {
            let email = templates::missed_call(&candidate.email, &candidate.name);
            if let Err(e) = state.notifier.send(email).await {
                error!(error=%e, candidate_id, "failed to send missed call email");
            }
        }
        Ok(_) => debug!(candidate_id, "no address for missed call email"),
        Err(e) => error!(error=%e, candidate_id, "failed to load candidate"),
    }
}
