use crate::twilio_types::{TwilioCallResource, TwilioRestError};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("twilio request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("twilio rejected the call ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Everything needed to place one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub to: String,
    /// Webhook Twilio requests once the call connects.
    pub answer_url: String,
    /// Webhook Twilio notifies when the call ends.
    pub status_callback_url: String,
}

#[async_trait]
pub trait CallPlacer: Send + Sync {
    /// Place the call and return the provider-assigned call id.
    async fn place_call(&self, call: OutboundCall) -> Result<String, TelephonyError>;
}

pub struct TwilioClient {
    http_client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    pub fn new(
        http_client: reqwest::Client,
        account_sid: String,
        auth_token: String,
        from_number: String,
    ) -> Self {
        Self {
            http_client,
            account_sid,
            auth_token,
            from_number,
        }
    }
}

#[async_trait]
impl CallPlacer for TwilioClient {
    async fn place_call(&self, call: OutboundCall) -> Result<String, TelephonyError> {
        let account_sid = &self.account_sid;
        let url = format!("https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Calls.json");
        let form = [
            ("To", call.to.as_str()),
            ("From", self.from_number.as_str()),
            ("Url", call.answer_url.as_str()),
            ("Method", "POST"),
            ("StatusCallback", call.status_callback_url.as_str()),
            ("StatusCallbackMethod", "POST"),
        ];
        let resp = self
            .http_client
            .post(url)
            .basic_auth(account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send call request to twilio");
                e
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioRestError>(&body)
                .map(|e| match e.code {
                    Some(code) => format!("{} (code {code})", e.message),
                    None => e.message,
                })
                .unwrap_or(body);
            return Err(TelephonyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let call_resource = resp.json::<TwilioCallResource>().await?;
        debug!(call_sid=%call_resource.sid, status=?call_resource.status, "twilio call created");
        Ok(call_resource.sid)
    }
}

/// Clean a stored phone number into E.164-ish form for dialing, or `None` if it cannot be
/// dialed.
///
/// `+`-prefixed numbers keep their country code and a bare 10 digit number gets
/// `default_country_code`, so `919871820623` and `+91 98718 20623` dial the same line.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("null") {
        return None;
    }
    let has_plus = raw.starts_with('+');
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 8 || digits.len() > 15 {
        return None;
    }

    // anything else that is long enough already carries its country code
    let number = if !has_plus && digits.len() == 10 {
        let code = default_country_code.trim_start_matches('+');
        format!("+{code}{digits}")
    } else {
        format!("+{digits}")
    };
    Some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plus_prefixed_numbers() {
        assert_eq!(
            normalize_phone("+1 (555) 010-2030", "+91").as_deref(),
            Some("+15550102030")
        );
    }

    #[test]
    fn bare_ten_digits_get_default_country_code() {
        assert_eq!(
            normalize_phone("98718 20623", "+91").as_deref(),
            Some("+919871820623")
        );
        assert_eq!(
            normalize_phone("5550102030", "+1").as_deref(),
            Some("+15550102030")
        );
    }

    #[test]
    fn twelve_digits_with_91_prefix() {
        assert_eq!(
            normalize_phone("919871820623", "+1").as_deref(),
            Some("+919871820623")
        );
    }

    #[test]
    fn rejects_missing_or_short_numbers() {
        assert_eq!(normalize_phone("", "+91"), None);
        assert_eq!(normalize_phone("None", "+91"), None);
        assert_eq!(normalize_phone("N/A", "+91"), None);
        assert_eq!(normalize_phone("12345", "+91"), None);
    }
}
