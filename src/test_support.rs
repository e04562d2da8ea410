//! In-memory fakes for the service seams, shared by unit tests across modules.

use crate::config::test_config;
use crate::conversation_state::ConversationStore;
use crate::db_types::{CandidateRecord, JobDescriptionRecord, NewCandidate, NewJobDescription};
use crate::llm::{GenerationRequest, LlmError, TextGenerator};
use crate::notify::{Email, NotifyError, Notifier};
use crate::repository::{CandidateRepository, DbResult};
use crate::telephony::{CallPlacer, OutboundCall, TelephonyError};
use crate::types::AppState;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays queued generations in order; errors once the queue runs dry.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    always_fail: bool,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(vec![]),
            always_fail: false,
            delay: None,
        }
    }

    /// Each generation takes `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.always_fail {
            return Err(LlmError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

#[derive(Default)]
pub struct FakeRepository {
    candidates: Mutex<Vec<CandidateRecord>>,
    job_descriptions: Mutex<Vec<JobDescriptionRecord>>,
    status_updates: Mutex<Vec<(i64, String)>>,
}

impl FakeRepository {
    pub fn with_candidates(candidates: Vec<NewCandidate>) -> Self {
        let repository = Self::default();
        for candidate in candidates {
            repository.add(&candidate);
        }
        repository
    }

    fn add(&self, candidate: &NewCandidate) -> i64 {
        let mut candidates = self.candidates.lock().unwrap();
        let id = candidates.len() as i64 + 1;
        candidates.push(CandidateRecord {
            id,
            name: candidate.name.clone(),
            skills: candidate.skills.clone(),
            education: candidate.education.clone(),
            certifications: candidate.certifications.clone(),
            experience: candidate.experience.clone(),
            email: candidate.email.clone(),
            phone_number: candidate.phone_number.clone(),
            linkedin: candidate.linkedin.clone(),
            score: candidate.score,
            status: candidate.status.clone(),
        });
        id
    }

    pub fn candidate(&self, id: i64) -> Option<CandidateRecord> {
        self.candidates
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn candidates(&self) -> Vec<CandidateRecord> {
        self.candidates.lock().unwrap().clone()
    }

    pub fn status_updates(&self) -> Vec<(i64, String)> {
        self.status_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateRepository for FakeRepository {
    async fn insert_candidate(&self, candidate: &NewCandidate) -> DbResult<i64> {
        Ok(self.add(candidate))
    }

    async fn candidate_exists(&self, email: &str, phone_number: &str) -> DbResult<bool> {
        Ok(self.candidates.lock().unwrap().iter().any(|c| {
            (!email.is_empty() && c.email == email)
                || (!phone_number.is_empty() && c.phone_number == phone_number)
        }))
    }

    async fn get_candidate(&self, id: i64) -> DbResult<Option<CandidateRecord>> {
        Ok(self.candidate(id))
    }

    async fn list_candidates(&self) -> DbResult<Vec<CandidateRecord>> {
        Ok(self.candidates())
    }

    async fn update_status(&self, id: i64, status: &str) -> DbResult<bool> {
        self.status_updates
            .lock()
            .unwrap()
            .push((id, status.to_string()));
        let mut candidates = self.candidates.lock().unwrap();
        match candidates.iter_mut().find(|c| c.id == id) {
            Some(candidate) => {
                candidate.status = status.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_job_description(&self, jd: &NewJobDescription) -> DbResult<i64> {
        let mut job_descriptions = self.job_descriptions.lock().unwrap();
        let id = job_descriptions.len() as i64 + 1;
        job_descriptions.push(JobDescriptionRecord {
            id,
            title: jd.title.clone(),
            company: jd.company.clone(),
            location: jd.location.clone(),
            employment_type: jd.employment_type.clone(),
            salary: jd.salary.clone(),
            experience: jd.experience.clone(),
            description: jd.description.clone(),
            requirements: jd.requirements.clone(),
            responsibilities: jd.responsibilities.clone(),
            skills: jd.skills.clone(),
            benefits: jd.benefits.clone(),
        });
        Ok(id)
    }

    async fn get_job_description(&self, id: i64) -> DbResult<Option<JobDescriptionRecord>> {
        Ok(self
            .job_descriptions
            .lock()
            .unwrap()
            .iter()
            .find(|jd| jd.id == id)
            .cloned())
    }

    async fn list_job_descriptions(&self) -> DbResult<Vec<JobDescriptionRecord>> {
        Ok(self.job_descriptions.lock().unwrap().clone())
    }
}

/// Records every email; optionally rejects them all after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<Email> {
        self.sent().into_iter().filter(|e| e.to == address).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(email);
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 503,
                message: "mail service down".to_string(),
            });
        }
        Ok(())
    }
}

pub struct FakeTelephony {
    call_sid: Option<String>,
    placed: Mutex<Vec<OutboundCall>>,
}

impl FakeTelephony {
    pub fn answering(call_sid: &str) -> Self {
        Self {
            call_sid: Some(call_sid.to_string()),
            placed: Mutex::new(vec![]),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            call_sid: None,
            placed: Mutex::new(vec![]),
        }
    }

    pub fn placed(&self) -> Vec<OutboundCall> {
        self.placed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallPlacer for FakeTelephony {
    async fn place_call(&self, call: OutboundCall) -> Result<String, TelephonyError> {
        self.placed.lock().unwrap().push(call);
        self.call_sid.clone().ok_or(TelephonyError::Rejected {
            status: 400,
            message: "invalid To number".to_string(),
        })
    }
}

/// Application state wired to fakes, with handles kept for assertions.
pub struct Harness {
    pub state: Arc<AppState>,
    pub generator: Arc<ScriptedGenerator>,
    pub repository: Arc<FakeRepository>,
    pub notifier: Arc<RecordingNotifier>,
    pub telephony: Arc<FakeTelephony>,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator, repository: FakeRepository) -> Self {
        Self::with(
            generator,
            repository,
            RecordingNotifier::default(),
            FakeTelephony::answering("CA123"),
        )
    }

    pub fn with(
        generator: ScriptedGenerator,
        repository: FakeRepository,
        notifier: RecordingNotifier,
        telephony: FakeTelephony,
    ) -> Self {
        let generator = Arc::new(generator);
        let repository = Arc::new(repository);
        let notifier = Arc::new(notifier);
        let telephony = Arc::new(telephony);
        let state = Arc::new(AppState {
            config: test_config(),
            conversations: ConversationStore::new(),
            generator: generator.clone(),
            repository: repository.clone(),
            notifier: notifier.clone(),
            telephony: telephony.clone(),
        });
        Self {
            state,
            generator,
            repository,
            notifier,
            telephony,
        }
    }

    pub fn with_public_base_url(mut self, url: &str) -> Self {
        Arc::get_mut(&mut self.state)
            .expect("state is not shared yet")
            .config
            .public_base_url = url.to_string();
        self
    }
}

pub fn jane_doe() -> NewCandidate {
    NewCandidate {
        name: "Jane Doe".to_string(),
        skills: "Rust, SQL".to_string(),
        education: "BSc Computer Science".to_string(),
        experience: "6 years backend".to_string(),
        email: "jane@example.com".to_string(),
        phone_number: "+1 555 010 2030".to_string(),
        score: 82,
        status: "Interview Scheduled".to_string(),
        ..Default::default()
    }
}
