use async_trait::async_trait;
use base64::{engine, Engine};
use thiserror::Error;
use tracing::{debug, error};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail service rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("'{0}' is not a deliverable address")]
    Undeliverable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), NotifyError>;
}

/// Cheap sanity check run before handing an address to the mail service.
pub fn is_deliverable(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

mod sendgrid {
    use serde::Serialize;

    #[derive(Serialize, Debug)]
    pub struct MailSend<'a> {
        pub personalizations: Vec<Personalization<'a>>,
        pub from: Address<'a>,
        pub subject: &'a str,
        pub content: Vec<Content<'a>>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub attachments: Vec<MailAttachment<'a>>,
    }

    #[derive(Serialize, Debug)]
    pub struct Personalization<'a> {
        pub to: Vec<Address<'a>>,
    }

    #[derive(Serialize, Debug)]
    pub struct Address<'a> {
        pub email: &'a str,
    }

    #[derive(Serialize, Debug)]
    pub struct Content<'a> {
        #[serde(rename = "type")]
        pub kind: &'a str,
        pub value: &'a str,
    }

    #[derive(Serialize, Debug)]
    pub struct MailAttachment<'a> {
        /// base64 encoded file body
        pub content: String,
        pub filename: &'a str,
        #[serde(rename = "type")]
        pub kind: &'a str,
        pub disposition: &'a str,
    }
}

fn build_mail_send<'a>(from: &'a str, email: &'a Email) -> sendgrid::MailSend<'a> {
    let attachments = email
        .attachment
        .iter()
        .map(|a| sendgrid::MailAttachment {
            content: engine::general_purpose::STANDARD.encode(&a.bytes),
            filename: &a.filename,
            kind: a.content_type,
            disposition: "attachment",
        })
        .collect();
    sendgrid::MailSend {
        personalizations: vec![sendgrid::Personalization {
            to: vec![sendgrid::Address { email: &email.to }],
        }],
        from: sendgrid::Address { email: from },
        subject: &email.subject,
        content: vec![sendgrid::Content {
            kind: "text/plain",
            value: &email.body,
        }],
        attachments,
    }
}

pub struct SendGridMailer {
    http_client: reqwest::Client,
    api_key: String,
    from: String,
}

impl SendGridMailer {
    pub fn new(http_client: reqwest::Client, api_key: String, from: String) -> Self {
        Self {
            http_client,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Notifier for SendGridMailer {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        if !is_deliverable(&email.to) {
            return Err(NotifyError::Undeliverable(email.to));
        }
        let payload = build_mail_send(&self.from, &email);
        let key = self.api_key.as_str();
        let resp = self
            .http_client
            .post(SENDGRID_SEND_URL)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send mail request");
                e
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        debug!(to=%email.to, subject=%email.subject, "email accepted");
        Ok(())
    }
}

pub mod templates {
    use super::{Attachment, Email};
    use crate::scoring::{CallScore, STATUS_INTERVIEW_SCHEDULED};

    pub const XLSX_CONTENT_TYPE: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

    /// Outcome of a phone interview, sent to the candidate.
    pub fn call_status(to: &str, name: &str, status: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "Your Interview Status Update".to_string(),
            body: format!(
                "Dear {name},\n\nThank you for speaking with us. Your interview status is: {status}.\n\nThank you for your interest.\n\nBest regards,\nHR Team"
            ),
            attachment: None,
        }
    }

    /// Transcript and score of a phone interview, sent to HR.
    pub fn call_summary(
        to: &str,
        name: &str,
        candidate_email: &str,
        score: CallScore,
        status: &str,
        responses: &[String],
    ) -> Email {
        let transcript = if responses.is_empty() {
            "(no responses recorded)".to_string()
        } else {
            responses
                .iter()
                .enumerate()
                .map(|(i, r)| format!("Q{}: {}", i + 1, r))
                .collect::<Vec<String>>()
                .join("\n")
        };
        let recommendation = if score.value() >= CallScore::PASS {
            "Proceed to next round"
        } else {
            "Not suitable for this position"
        };
        let score = score.value();
        Email {
            to: to.to_string(),
            subject: format!("Call Summary: {name} - Score: {score}/10"),
            body: format!(
                "Dear HR Team,\n\nCall Summary for {name}:\n\nScore: {score}/10\nStatus: {status}\nCandidate Email: {candidate_email}\n\nInterview Responses:\n{transcript}\n\nRecommendation: {recommendation}\n\nBest regards,\nHR Management System"
            ),
            attachment: None,
        }
    }

    /// Result of resume screening, sent to the candidate.
    pub fn resume_status(to: &str, name: &str, score: i32, status: &str) -> Email {
        let opening = if status == STATUS_INTERVIEW_SCHEDULED {
            "Congratulations! Your application has been reviewed and you have been selected for an interview."
        } else {
            "Thank you for your interest in our position. After careful review of your application, we have decided to move forward with other candidates at this time."
        };
        let closing = if status == STATUS_INTERVIEW_SCHEDULED {
            "We will be in touch soon to schedule your interview."
        } else {
            "We encourage you to apply for future opportunities that match your qualifications."
        };
        Email {
            to: to.to_string(),
            subject: format!("Application Status Update - {name}"),
            body: format!(
                "Dear {name},\n\n{opening}\n\nYour Score: {score}/100\nStatus: {status}\n\n{closing}\n\nBest regards,\nHR Team"
            ),
            attachment: None,
        }
    }

    /// Candidate workbook, sent to HR.
    pub fn hr_report(
        to: &str,
        generated_at: &str,
        total: usize,
        qualified: usize,
        workbook: Vec<u8>,
    ) -> Email {
        Email {
            to: to.to_string(),
            subject: format!("HR Candidate Report - {generated_at}"),
            body: format!(
                "Dear HR Team,\n\nPlease find attached the candidate report.\n\nTotal Candidates: {total}\nQualified Candidates (Score >= 70): {qualified}\n\nBest regards,\nHR Management System"
            ),
            attachment: Some(Attachment {
                filename: "candidates.xlsx".to_string(),
                content_type: XLSX_CONTENT_TYPE,
                bytes: workbook,
            }),
        }
    }

    /// Sent to a candidate the prescreening call could not reach.
    pub fn missed_call(to: &str, name: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "We tried to reach you".to_string(),
            body: format!(
                "Dear {name},\n\nWe tried to call you for a brief prescreening interview but could not get through. We will try again or contact you by email.\n\nBest regards,\nHR Team"
            ),
            attachment: None,
        }
    }
}
