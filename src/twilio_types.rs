pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

mod twiml {
    use xmlserde::xml_serde_enum;
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Gather")]
        Gather(GatherAction),
        #[xmlserde(name = b"Redirect")]
        Redirect(RedirectAction),
        #[xmlserde(name = b"Hangup")]
        Hangup(HangupAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
        #[xmlserde(name = b"voice", ty = "attr")]
        pub voice: Option<String>,
        #[xmlserde(name = b"language", ty = "attr")]
        pub language: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct GatherAction {
        #[xmlserde(name = b"input", ty = "attr")]
        pub input: Option<GatherInput>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
        #[xmlserde(name = b"speechTimeout", ty = "attr")]
        pub speech_timeout: Option<String>,
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: Option<String>,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<HttpMethod>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RedirectAction {
        #[xmlserde(ty = "text")]
        pub url: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<HttpMethod>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct HangupAction {}

    xml_serde_enum! {
        #[derive(PartialEq, Eq, Debug)]
        GatherInput {
            Speech => "speech",
            Dtmf => "dtmf",
            SpeechAndDtmf => "dtmf speech",
        }
    }

    xml_serde_enum! {
        #[derive(PartialEq, Eq, Debug)]
        HttpMethod {
            Get => "GET",
            Post => "POST",
        }
    }
}
pub use twiml::*;

mod webhook {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum CallStatus {
        Queued,
        Initiated,
        Ringing,
        InProgress,
        Completed,
        Busy,
        Failed,
        NoAnswer,
        Canceled,
    }

    impl CallStatus {
        /// Statuses meaning the candidate was never reached.
        pub fn is_failure(&self) -> bool {
            matches!(
                self,
                CallStatus::Busy | CallStatus::Failed | CallStatus::NoAnswer | CallStatus::Canceled
            )
        }
    }

    /// Form body of the first webhook Twilio sends once the outbound call connects.
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioConnectPayload {
        pub call_sid: String,
        #[serde(default)]
        pub call_status: Option<CallStatus>,
        #[serde(default)]
        pub to: Option<String>,
        #[serde(default)]
        pub from: Option<String>,
    }

    /// Form body of a `<Gather>` action callback (or of a `<Redirect>` after silence, in which
    /// case there is no speech result).
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioGatherPayload {
        pub call_sid: String,
        #[serde(default)]
        pub speech_result: Option<String>,
        #[serde(default)]
        pub confidence: Option<String>,
    }

    /// Form body of a status callback.
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioStatusPayload {
        pub call_sid: String,
        pub call_status: CallStatus,
        #[serde(default)]
        pub call_duration: Option<String>,
    }
}
pub use webhook::*;

mod rest {
    use serde::Deserialize;

    /// Subset of the call resource returned by `POST /Calls.json`.
    #[derive(Deserialize, Debug)]
    pub struct TwilioCallResource {
        pub sid: String,
        #[serde(default)]
        pub status: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub struct TwilioRestError {
        #[serde(default)]
        pub code: Option<u32>,
        pub message: String,
    }
}
pub use rest::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_payload_decodes_form_body() {
        let body = "CallSid=CA123&SpeechResult=I+have+five+years&Confidence=0.92&AccountSid=AC1";
        let payload = serde_urlencoded::from_str::<TwilioGatherPayload>(body).unwrap();
        assert_eq!(payload.call_sid, "CA123");
        assert_eq!(payload.speech_result.as_deref(), Some("I have five years"));
    }

    #[test]
    fn redirect_payload_has_no_speech() {
        let body = "CallSid=CA123&CallStatus=in-progress";
        let payload = serde_urlencoded::from_str::<TwilioGatherPayload>(body).unwrap();
        assert!(payload.speech_result.is_none());
    }

    #[test]
    fn status_payload_flags_failures() {
        let body = "CallSid=CA9&CallStatus=no-answer";
        let payload = serde_urlencoded::from_str::<TwilioStatusPayload>(body).unwrap();
        assert_eq!(payload.call_status, CallStatus::NoAnswer);
        assert!(payload.call_status.is_failure());
        assert!(!CallStatus::Completed.is_failure());
    }

    #[test]
    fn say_and_hangup_render() {
        let response = Response {
            actions: vec![
                ResponseAction::Say(SayAction {
                    text: "Thanks for your time".to_string(),
                    ..Default::default()
                }),
                ResponseAction::Hangup(HangupAction {}),
            ],
        };
        let twiml = wrap_twiml(xmlserde::xml_serialize(response));
        assert!(twiml.starts_with("<?xml"));
        assert!(twiml.contains("<Response>"));
        assert!(twiml.contains("Thanks for your time"));
        assert!(twiml.contains("<Hangup"));
        assert!(!twiml.contains("<Gather"));
    }

    #[test]
    fn gather_renders_attributes() {
        let response = Response {
            actions: vec![ResponseAction::Gather(GatherAction {
                input: Some(GatherInput::Speech),
                timeout: Some(7),
                action: Some("https://hr.example.com/twilio/gather/1/0".to_string()),
                method: Some(HttpMethod::Post),
                ..Default::default()
            })],
        };
        let twiml = xmlserde::xml_serialize(response);
        assert!(twiml.contains("<Gather"));
        assert!(twiml.contains("input=\"speech\""));
        assert!(twiml.contains("timeout=\"7\""));
        assert!(twiml.contains("method=\"POST\""));
        assert!(twiml.contains("action=\"https://hr.example.com/twilio/gather/1/0\""));
    }
}
