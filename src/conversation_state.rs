use crate::scoring::Disposition;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Where a call is in its lifecycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallPhase {
    Dialing,
    AwaitingSpeech { turn: usize },
    Processing { turn: usize },
    Closing,
    Completed,
    Failed,
}

impl CallPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallPhase::Completed | CallPhase::Failed)
    }
}

/// Turn state of a single phone interview.
#[derive(Debug)]
pub struct CallSession {
    pub call_id: String,
    pub candidate_id: i64,
    pub subject_name: String,
    pub phase: CallPhase,
    pub disposition: Option<Disposition>,
    turn_responses: Vec<String>,
    /// Prompt spoken after each recorded turn, indexed like `turn_responses`.
    prompts: Vec<String>,
}

impl CallSession {
    pub fn new(call_id: String, candidate_id: i64, subject_name: String) -> Self {
        Self {
            call_id,
            candidate_id,
            subject_name,
            phase: CallPhase::Dialing,
            disposition: None,
            turn_responses: vec![],
            prompts: vec![],
        }
    }

    /// Number of completed turns. Always equal to `turn_responses().len()`.
    pub fn turn_index(&self) -> usize {
        self.turn_responses.len()
    }

    pub fn turn_responses(&self) -> &[String] {
        &self.turn_responses
    }

    pub fn append_response(&mut self, text: impl Into<String>) {
        self.turn_responses.push(text.into());
    }

    pub fn record_prompt(&mut self, turn: usize, prompt: String) {
        if self.prompts.len() <= turn {
            self.prompts.resize(turn + 1, String::new());
        }
        self.prompts[turn] = prompt;
    }

    pub fn prompt_for(&self, turn: usize) -> Option<&str> {
        self.prompts
            .get(turn)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            call_id: self.call_id.clone(),
            candidate_id: self.candidate_id,
            subject_name: self.subject_name.clone(),
            turn_index: self.turn_index(),
            turn_responses: self.turn_responses.clone(),
            phase: self.phase,
            call_score: self.disposition.as_ref().map(|d| d.score.value()),
            status: self.disposition.as_ref().map(|d| d.status),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub call_id: String,
    pub candidate_id: i64,
    pub subject_name: String,
    pub turn_index: usize,
    pub turn_responses: Vec<String>,
    pub phase: CallPhase,
    pub call_score: Option<u8>,
    pub status: Option<&'static str>,
}

/// A session is locked for the whole handling of one callback, so callbacks for the same call
/// never interleave.
pub type SessionHandle = Arc<tokio::sync::Mutex<CallSession>>;

struct SessionEntry {
    session: SessionHandle,
    last_seen: Instant,
}

/// In-memory call id => session map shared by all webhook handlers.
#[derive(Default)]
pub struct ConversationStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fresh session, replacing any existing one for `call_id`.
    pub fn create(&self, call_id: &str, candidate_id: i64, subject_name: &str) -> SessionHandle {
        let session = Arc::new(tokio::sync::Mutex::new(CallSession::new(
            call_id.to_string(),
            candidate_id,
            subject_name.to_string(),
        )));
        let entry = SessionEntry {
            session: session.clone(),
            last_seen: Instant::now(),
        };
        if self.sessions().insert(call_id.to_string(), entry).is_some() {
            debug!(call_id, "replaced existing call session");
        }
        session
    }

    /// Session for `call_id`, created only if none exists yet. The first webhook of a call can
    /// beat the REST response that announced it, and its session must survive.
    pub fn get_or_create(
        &self,
        call_id: &str,
        candidate_id: i64,
        subject_name: &str,
    ) -> SessionHandle {
        let mut sessions = self.sessions();
        let entry = sessions.entry(call_id.to_string()).or_insert_with(|| SessionEntry {
            session: Arc::new(tokio::sync::Mutex::new(CallSession::new(
                call_id.to_string(),
                candidate_id,
                subject_name.to_string(),
            ))),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        entry.session.clone()
    }

    pub fn get(&self, call_id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions();
        sessions.get_mut(call_id).map(|entry| {
            entry.last_seen = Instant::now();
            entry.session.clone()
        })
    }

    /// Append a response to a known session. Returns `false` when the call id is unknown, in
    /// which case nothing is recorded.
    ///
    /// Webhook handling appends through the session handle it already holds locked.
    #[cfg(test)]
    pub async fn append_response(&self, call_id: &str, text: &str) -> bool {
        match self.get(call_id) {
            Some(session) => {
                session.lock().await.append_response(text);
                true
            }
            None => false,
        }
    }

    /// Drop sessions that have not been touched for at least `ttl`.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let handles: Vec<SessionHandle> = self
            .sessions()
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshots.push(handle.lock().await.snapshot());
        }
        snapshots.sort_by(|a, b| a.call_id.cmp(&b.call_id));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_increments_turn_index() {
        let store = ConversationStore::new();
        store.create("CA123", 7, "Jane Doe");
        for i in 0..4 {
            let before = store.get("CA123").unwrap().lock().await.turn_index();
            assert!(store.append_response("CA123", &format!("answer {i}")).await);
            let session = store.get("CA123").unwrap();
            let session = session.lock().await;
            assert_eq!(session.turn_index(), before + 1);
            assert_eq!(session.turn_index(), session.turn_responses().len());
        }
    }

    #[tokio::test]
    async fn append_to_unknown_call_is_a_noop() {
        let store = ConversationStore::new();
        assert!(!store.append_response("CA-missing", "hello").await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn create_overwrites_existing_session() {
        let store = ConversationStore::new();
        store.create("CA1", 1, "First");
        store.append_response("CA1", "something").await;
        store.create("CA1", 2, "Second");
        let session = store.get("CA1").unwrap();
        let session = session.lock().await;
        assert_eq!(session.candidate_id, 2);
        assert_eq!(session.subject_name, "Second");
        assert_eq!(session.turn_index(), 0);
        assert_eq!(session.phase, CallPhase::Dialing);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_or_create_keeps_an_existing_session() {
        let store = ConversationStore::new();
        let handle = store.create("CA1", 1, "Jane");
        handle.lock().await.phase = CallPhase::AwaitingSpeech { turn: 0 };
        handle.lock().await.append_response("hello");

        let again = store.get_or_create("CA1", 1, "Jane");
        let session = again.lock().await;
        assert_eq!(session.phase, CallPhase::AwaitingSpeech { turn: 0 });
        assert_eq!(session.turn_index(), 1);
        drop(session);

        store.get_or_create("CA2", 2, "John");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("CA2").unwrap().lock().await.phase, CallPhase::Dialing);
    }

    #[test]
    fn evict_idle_respects_ttl() {
        let store = ConversationStore::new();
        store.create("CA1", 1, "A");
        store.create("CA2", 2, "B");
        assert_eq!(store.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.evict_idle(Duration::ZERO), 2);
        assert!(store.get("CA1").is_none());
    }

    #[test]
    fn prompts_are_recorded_per_turn() {
        let mut session = CallSession::new("CA1".into(), 1, "A".into());
        session.record_prompt(1, "second".into());
        assert_eq!(session.prompt_for(0), None);
        assert_eq!(session.prompt_for(1), Some("second"));
        session.record_prompt(0, "first".into());
        assert_eq!(session.prompt_for(0), Some("first"));
    }

    #[tokio::test]
    async fn snapshot_reports_sessions_in_call_id_order() {
        let store = ConversationStore::new();
        store.create("CB2", 2, "B");
        store.create("CA1", 1, "A");
        store.append_response("CA1", "yes").await;
        let snapshots = store.snapshot().await;
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].call_id, "CA1");
        assert_eq!(snapshots[0].turn_index, 1);
        assert_eq!(snapshots[0].turn_responses, vec!["yes".to_string()]);
        assert_eq!(snapshots[1].phase, CallPhase::Dialing);
    }
}
