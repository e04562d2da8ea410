use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts::{
    INTERVIEWER_SYSTEM, INTERVIEW_TURN_TEMPLATE, NEXT_STEP_ASK, NEXT_STEP_WRAP_UP,
};

use std::time::Duration;
use tracing::{debug, warn};

/// Interviews are capped at this many turns (indices `0..MAX_TURNS`).
pub const MAX_TURNS: usize = 4;
/// Turn index at which the interviewer stops gathering and closes the call.
pub const FINAL_TURN: usize = MAX_TURNS - 1;

pub const FALLBACK_PROMPT: &str = "That's interesting, tell me more about your experience.";
pub const CLOSING_STATEMENT: &str = "Thank you for your time. We will review your responses and get back to you soon. Have a great day!";
pub const ERROR_CLOSING_STATEMENT: &str = "Thank you for your time. We will get back to you soon.";
pub const NO_INPUT_NOTICE: &str = "I didn't hear a response. Let me continue.";

const TURN_MODEL: &str = "gpt-4o-mini";

pub fn greeting(subject_name: &str) -> String {
    format!("Hi {subject_name}, this is Sasha from HR. I'm calling to conduct a brief prescreening interview. Is this a good time to talk?")
}

pub fn is_final_turn(turn_index: usize) -> bool {
    turn_index >= FINAL_TURN
}

fn conversation_context(subject_name: &str, prior: &[String]) -> String {
    let mut context = format!("Interview with {subject_name}.");
    for (i, response) in prior.iter().enumerate() {
        context.push_str(&format!(" Response {}: {}.", i + 1, response));
    }
    context
}

/// Pull something speakable out of generated text, or nothing if it is unusable.
fn usable_prompt(text: &str) -> Option<String> {
    let text = text.trim().trim_matches('"').trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Decide what the interviewer says after the candidate's response at `turn_index`.
///
/// Silence, generation errors and empty generations all fall back to [`FALLBACK_PROMPT`]; the
/// call is never aborted because of this step.
pub async fn next_prompt(
    generator: &dyn TextGenerator,
    timeout: Duration,
    subject_name: &str,
    prior: &[String],
    current: &str,
    turn_index: usize,
) -> String {
    let current = current.trim();
    if current.is_empty() {
        debug!(turn_index, "no speech detected; using fallback prompt");
        return FALLBACK_PROMPT.to_string();
    }

    let next_step = if is_final_turn(turn_index) {
        NEXT_STEP_WRAP_UP
    } else {
        NEXT_STEP_ASK
    };
    let prompt = INTERVIEW_TURN_TEMPLATE
        .replace("{name}", subject_name)
        .replace("{context}", &conversation_context(subject_name, prior))
        .replace("{response}", current)
        .replace("{next_step}", next_step);
    let request = GenerationRequest {
        model: TURN_MODEL,
        system: Some(INTERVIEWER_SYSTEM.to_string()),
        prompt,
        max_tokens: 100,
        temperature: 0.7,
        json_mode: false,
        timeout,
    };

    match generator.generate(request).await {
        Ok(text) => usable_prompt(&text).unwrap_or_else(|| {
            warn!(turn_index, "generated prompt unusable; using fallback");
            FALLBACK_PROMPT.to_string()
        }),
        Err(e) => {
            warn!(error=%e, turn_index, "prompt generation failed; using fallback");
            FALLBACK_PROMPT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedGenerator;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn final_turn_is_index_three() {
        assert!(!is_final_turn(0));
        assert!(!is_final_turn(2));
        assert!(is_final_turn(3));
        assert!(is_final_turn(7));
    }

    #[tokio::test]
    async fn empty_speech_uses_fallback_without_generation() {
        let generator = ScriptedGenerator::new(vec![Ok("Tell me more!".to_string())]);
        let prompt = next_prompt(&generator, TIMEOUT, "Jane Doe", &[], "   ", 0).await;
        assert_eq!(prompt, FALLBACK_PROMPT);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn generated_prompt_is_trimmed_and_unquoted() {
        let generator =
            ScriptedGenerator::new(vec![Ok("\"Great, Jane! What drew you to Rust?\"".into())]);
        let prior = vec!["Yes, now is fine.".to_string()];
        let prompt = next_prompt(&generator, TIMEOUT, "Jane", &prior, "I build compilers", 1).await;
        assert_eq!(prompt, "Great, Jane! What drew you to Rust?");
        let sent = &generator.prompts()[0];
        assert!(sent.contains("Response 1: Yes, now is fine."));
        assert!(sent.contains("Current candidate response: I build compilers"));
        assert!(sent.contains(NEXT_STEP_ASK));
    }

    #[tokio::test]
    async fn final_turn_asks_model_to_wrap_up() {
        let generator = ScriptedGenerator::new(vec![Ok("Thanks Jane.".into())]);
        next_prompt(&generator, TIMEOUT, "Jane", &[], "That's all from me", FINAL_TURN).await;
        assert!(generator.prompts()[0].contains(NEXT_STEP_WRAP_UP));
        assert_eq!(generator.requests()[0].timeout, TIMEOUT);
    }

    #[tokio::test]
    async fn generation_error_or_blank_output_falls_back() {
        let failing = ScriptedGenerator::failing();
        assert_eq!(
            next_prompt(&failing, TIMEOUT, "Jane", &[], "hello", 0).await,
            FALLBACK_PROMPT
        );
        let blank = ScriptedGenerator::new(vec![Ok("  \"\" ".into())]);
        assert_eq!(
            next_prompt(&blank, TIMEOUT, "Jane", &[], "hello", 0).await,
            FALLBACK_PROMPT
        );
    }
}
