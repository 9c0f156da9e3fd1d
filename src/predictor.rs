use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::{config::AppConfig, models::NodeAccessibility};

/// PredictionError
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion API answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion API returned no content")]
    EmptyResponse,

    #[error("unexpected accessibility answer {0:?}")]
    UnexpectedAnswer(String),

    #[error("{0}")]
    Simulated(String),
}

// 1. Predictor Contract
/// AccessibilityPredictor
///
/// Turns a free-text description of a place into an accessibility verdict. The real
/// implementation calls an external LLM; tests use `MockPredictor`.
#[async_trait]
pub trait AccessibilityPredictor: Send + Sync {
    async fn predict(&self, text: &str) -> Result<NodeAccessibility, PredictionError>;
}

/// PredictorState
///
/// The concrete type used to share the predictor across the application state.
pub type PredictorState = Arc<dyn AccessibilityPredictor>;

/// Builds the prompt sent for one description. The model is told to answer with a
/// single bare label so `parse_accessibility` can read it.
pub fn build_prompt(text: &str) -> String {
    format!(
        r#"You are an accessibility auditor who knows the accessibility standards for public and private buildings. Read the description of a place below and classify how accessible it is:

- FULL: everyone can use the place, including people with disabilities. Step-free entrances or ramps, lifts to every floor, accessible toilets, clear signage and wide doors are all present.
- PARTIAL: some accessible features exist, but obstacles remain that keep some people with disabilities from using the place fully.
- NONE: the place is not accessible; the required facilities or adaptations are missing.

Answer with exactly one of FULL, PARTIAL or NONE. Do not add explanations and do not wrap the answer in quotes.

Example description:
"There is a ramp at the entrance and a lift to every floor, but the only toilet is upstairs behind a narrow door."

Example answer:
PARTIAL

Description:
```{text}```
"#
    )
}

/// Reads a model answer such as `FULL`, `"Partial"` or ` none\n` into the enum.
pub fn parse_accessibility(answer: &str) -> Result<NodeAccessibility, PredictionError> {
    let normalized = answer
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_lowercase();

    match normalized.as_str() {
        "full" => Ok(NodeAccessibility::Full),
        "partial" => Ok(NodeAccessibility::Partial),
        "none" => Ok(NodeAccessibility::None),
        _ => Err(PredictionError::UnexpectedAnswer(answer.to_string())),
    }
}

// --- Wire types of the chat-completion API ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

// 2. The Real Implementation (OpenAI-compatible chat completions)
/// OpenAiPredictor
///
/// Sends one chat-completion request per prediction. No retries: any transport or
/// API failure is reported to the caller as-is.
#[derive(Clone)]
pub struct OpenAiPredictor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiPredictor {
    pub fn new(config: &AppConfig) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .timeout(config.prediction_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        })
    }
}

#[async_trait]
impl AccessibilityPredictor for OpenAiPredictor {
    async fn predict(&self, text: &str) -> Result<NodeAccessibility, PredictionError> {
        let prompt = build_prompt(text);
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let answer = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(PredictionError::EmptyResponse)?;

        tracing::debug!(answer = %answer, model = %self.model, "accessibility prediction received");
        parse_accessibility(&answer)
    }
}

// 3. The Mock Implementation (For Tests)
/// MockPredictor
///
/// Returns a fixed verdict and records every text it was asked about, so tests can
/// assert how often and with what input the prediction ran.
#[derive(Clone)]
pub struct MockPredictor {
    /// `None` makes every call fail.
    pub answer: Option<NodeAccessibility>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockPredictor {
    pub fn new(answer: NodeAccessibility) -> Self {
        Self {
            answer: Some(answer),
            calls: Arc::default(),
        }
    }

    pub fn new_failing() -> Self {
        Self {
            answer: None,
            calls: Arc::default(),
        }
    }

    /// Texts received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AccessibilityPredictor for MockPredictor {
    async fn predict(&self, text: &str) -> Result<NodeAccessibility, PredictionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }
        self.answer
            .ok_or_else(|| PredictionError::Simulated("Mock Predictor Error".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_decorated_answers() {
        assert_eq!(parse_accessibility("FULL").unwrap(), NodeAccessibility::Full);
        assert_eq!(parse_accessibility("\"Partial\"").unwrap(), NodeAccessibility::Partial);
        assert_eq!(parse_accessibility(" none\n").unwrap(), NodeAccessibility::None);
        assert_eq!(parse_accessibility("'full'").unwrap(), NodeAccessibility::Full);
    }

    #[test]
    fn rejects_answers_outside_the_three_labels() {
        for answer in ["", "mostly", "FULL because of the ramp", "n/a"] {
            assert!(matches!(
                parse_accessibility(answer),
                Err(PredictionError::UnexpectedAnswer(_))
            ));
        }
    }

    #[test]
    fn prompt_embeds_the_description() {
        let prompt = build_prompt("Lift is out of order.");
        assert!(prompt.contains("```Lift is out of order.```"));
        assert!(prompt.contains("FULL, PARTIAL or NONE"));
    }

    #[tokio::test]
    async fn mock_records_calls() {
        let mock = MockPredictor::new(NodeAccessibility::Partial);
        assert_eq!(mock.predict("a").await.unwrap(), NodeAccessibility::Partial);
        assert_eq!(mock.predict("b").await.unwrap(), NodeAccessibility::Partial);
        assert_eq!(mock.calls(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn failing_mock_still_records_the_call() {
        let mock = MockPredictor::new_failing();
        assert!(mock.predict("x").await.is_err());
        assert_eq!(mock.calls().len(), 1);
    }
}
