use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set!")]
    Missing(&'static str),
    #[error("{0} has an invalid value")]
    Invalid(&'static str),
}

/// Service configuration, read from the process environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    /// Externally reachable base url every Twilio webhook of a call is addressed to.
    pub public_base_url: String,
    pub database_url: String,
    pub sendgrid_api_key: String,
    pub mail_from: String,
    pub hr_email: String,
    pub port: u16,
    pub log_level: String,
    pub session_ttl: Duration,
    /// Per-request limit for generation on the phone path.
    pub llm_timeout: Duration,
    pub default_country_code: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid("PORT"))?;
        let session_ttl_secs = or_default("SESSION_TTL_SECS", "3600")
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid("SESSION_TTL_SECS"))?;
        let llm_timeout_secs = or_default("LLM_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid("LLM_TIMEOUT_SECS"))?;

        Ok(Self {
            openai_api_key: require("OPENAI_API_KEY")?,
            twilio_account_sid: require("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: require("TWILIO_AUTH_TOKEN")?,
            twilio_phone_number: require("TWILIO_PHONE_NUMBER")?,
            public_base_url: require("PUBLIC_BASE_URL")?.trim_end_matches('/').to_string(),
            database_url: require("DATABASE_URL")?,
            sendgrid_api_key: require("SENDGRID_API_KEY")?,
            mail_from: require("MAIL_FROM")?,
            hr_email: require("HR_EMAIL")?,
            port,
            log_level: or_default("LOG_LEVEL", "debug"),
            session_ttl: Duration::from_secs(session_ttl_secs),
            llm_timeout: Duration::from_secs(llm_timeout_secs),
            default_country_code: or_default("DEFAULT_COUNTRY_CODE", "+91"),
        })
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        openai_api_key: "sk-test".to_string(),
        twilio_account_sid: "AC0000".to_string(),
        twilio_auth_token: "token".to_string(),
        twilio_phone_number: "+15550001111".to_string(),
        public_base_url: "https://hr.example.com".to_string(),
        database_url: "postgres://localhost/hr".to_string(),
        sendgrid_api_key: "SG.test".to_string(),
        mail_from: "hr-bot@example.com".to_string(),
        hr_email: "hr@example.com".to_string(),
        port: 3000,
        log_level: "debug".to_string(),
        session_ttl: Duration::from_secs(3600),
        llm_timeout: Duration::from_secs(10),
        default_country_code: "+91".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("OPENAI_API_KEY", "sk"),
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_PHONE_NUMBER", "+15550001111"),
            ("PUBLIC_BASE_URL", "https://abc.ngrok.app/"),
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("SENDGRID_API_KEY", "SG.x"),
            ("MAIL_FROM", "bot@example.com"),
            ("HR_EMAIL", "hr@example.com"),
        ])
    }

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let vars = required();
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.llm_timeout, Duration::from_secs(10));
        assert_eq!(config.default_country_code, "+91");
        assert_eq!(config.public_base_url, "https://abc.ngrok.app");
    }

    #[test]
    fn missing_required_key_is_reported() {
        let mut vars = required();
        vars.remove("HR_EMAIL");
        let err = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert_eq!(err, ConfigError::Missing("HR_EMAIL"));
    }

    #[test]
    fn bad_port_is_invalid() {
        let mut vars = required();
        vars.insert("PORT", "eighty");
        let err = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert_eq!(err, ConfigError::Invalid("PORT"));
    }
}
