mod config;
mod conversation_state;
mod db_types;
mod error;
mod extract;
mod handlers;
mod intake;
mod interview;
mod lifecycle;
mod llm;
mod notify;
mod openai_types;
mod prompts;
mod report;
mod repository;
mod resume;
mod scoring;
mod telephony;
#[cfg(test)]
mod test_support;
mod twilio_types;
mod types;
mod utils;

use crate::config::Config;
use crate::conversation_state::ConversationStore;
use crate::llm::OpenAiClient;
use crate::notify::SendGridMailer;
use crate::repository::PgCandidateRepository;
use crate::telephony::TwilioClient;
use crate::types::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);
/// Bounds every Twilio and SendGrid request.
const OUTBOUND_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::DEBUG);
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", LevelFilter::OFF),
            ("hr_prescreen", level),
        ]));
    tracing::subscriber::set_global_default(subscriber)?;

    let pool = repository::connect(&config.database_url).await?;
    let http_client = reqwest::Client::builder()
        .timeout(OUTBOUND_HTTP_TIMEOUT)
        .build()?;
    let generator = OpenAiClient::new(config.openai_api_key.clone())?;
    let telephony = TwilioClient::new(
        http_client.clone(),
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    );
    let notifier = SendGridMailer::new(
        http_client,
        config.sendgrid_api_key.clone(),
        config.mail_from.clone(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let session_ttl = config.session_ttl;
    let app_state = Arc::new(AppState {
        config,
        conversations: ConversationStore::new(),
        generator: Arc::new(generator),
        repository: Arc::new(PgCandidateRepository::new(pool)),
        notifier: Arc::new(notifier),
        telephony: Arc::new(telephony),
    });

    let evict_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = evict_state.conversations.evict_idle(session_ttl);
            if evicted > 0 {
                let remaining = evict_state.conversations.len();
                info!(evicted, remaining, "evicted idle call sessions");
            }
        }
    });

    let app = handlers::app_router(app_state);
    info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
