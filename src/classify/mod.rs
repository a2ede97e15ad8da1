//! Remote classification of observations.
//!
//! [Classifier::classify] is deliberately infallible: every failure mode of
//! the remote call degrades into a well-formed `unknown` [Verdict] so the
//! monitor loop never has to care whether the model cooperated.

pub mod prompt;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    store::entities::{Observation, Verdict},
    utils::time::epoch_seconds,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl ClassifierConfig {
    /// Reads the credential from the environment. Monitor mode calls this
    /// before entering its loop so a missing key fails at startup instead of
    /// on every classification.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .with_context(|| format!("{API_KEY_VAR} must be set to classify activity"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

pub struct Classifier {
    client: Client,
    config: ClassifierConfig,
    base_url: String,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        Self::with_base_url(config, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(config: ClassifierConfig, base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Classifies one observation. Blank observations short-circuit without a
    /// remote call; remote and parse failures degrade to `unknown` verdicts.
    /// The verdict timestamp is always the classification moment.
    pub async fn classify(&self, observation: &Observation) -> Verdict {
        let mut verdict = self.classify_inner(observation).await;
        verdict.timestamp = epoch_seconds(chrono::Utc::now());
        verdict
    }

    async fn classify_inner(&self, observation: &Observation) -> Verdict {
        if observation.is_blank() {
            return Verdict::unknown("No meaningful text data available");
        }

        let reply = match self.generate(observation).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Classification call failed: {e:?}");
                let mut verdict = Verdict::unknown(format!("Error analyzing user data: {e}"));
                verdict.data_sources = "Error occurred during analysis".into();
                return verdict;
            }
        };

        let stripped = prompt::strip_code_fence(&reply);
        match serde_json::from_str::<Verdict>(stripped) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Model reply was not valid json: {e}");
                let mut verdict = Verdict::unknown("Failed to parse model response");
                verdict.details = stripped.to_string();
                verdict.data_sources = "Model response parsing failed".into();
                verdict
            }
        }
    }

    /// One `generateContent` request. A single attempt, by design: a failed
    /// call yields a degraded verdict rather than a retry storm.
    async fn generate(&self, observation: &Observation) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: prompt::SYSTEM_INSTRUCTION.into(),
                }],
            },
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: format!(
                        "Here's the user activity data to analyze:\n\n{}\n\nPlease analyze this data and determine what the user is doing.",
                        prompt::prompt_body(observation)
                    ),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        debug!("Requesting classification from {}", self.config.model);
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);
            let (code, message) = detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));
            return Err(anyhow!("model API error ({code}): {message}"));
        }

        let reply: GenerateResponse = response.json().await?;
        reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .context("model reply contained no candidates")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: u16,
    message: String,
}

#[cfg(test)]
mod classifier_tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::store::entities::Activity;

    fn test_classifier(base_url: String) -> Classifier {
        Classifier::with_base_url(ClassifierConfig::new("test-api-key".into()), base_url).unwrap()
    }

    fn observation() -> Observation {
        Observation {
            timestamp: "2025-03-15_10-00-00".into(),
            active_window: "nvim".into(),
            focused_text: "impl Display for Activity".into(),
            clipboard: String::new(),
            ocr_text: "cargo build --release".into(),
        }
    }

    fn reply_with(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": text }] } }
            ]
        })
    }

    const CODING_REPLY: &str = r#"{
        "activity": "coding",
        "confidence": 0.85,
        "description": "Editing Rust code in nvim",
        "details": "Rust trait impl and cargo invocation on screen",
        "data_sources": "Focused text and screen OCR",
        "timestamp": 1.0
    }"#;

    #[tokio::test]
    async fn blank_observation_skips_the_remote_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_with(CODING_REPLY)))
            .expect(0)
            .mount(&server)
            .await;
        let classifier = test_classifier(server.uri());

        let blank = Observation {
            timestamp: "2025-03-15_10-00-00".into(),
            focused_text: "   ".into(),
            ..Default::default()
        };
        let verdict = classifier.classify(&blank).await;

        assert_eq!(verdict.activity, Activity::Unknown);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.description, "No meaningful text data available");
    }

    #[tokio::test]
    async fn bare_json_reply_parses_into_a_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_with(CODING_REPLY)))
            .expect(1)
            .mount(&server)
            .await;
        let classifier = test_classifier(server.uri());

        let verdict = classifier.classify(&observation()).await;

        assert_eq!(verdict.activity, Activity::Coding);
        assert_eq!(verdict.confidence, 0.85);
        assert_eq!(verdict.description, "Editing Rust code in nvim");
    }

    #[tokio::test]
    async fn fenced_replies_parse_like_bare_ones() {
        for fenced in [
            format!("```json\n{CODING_REPLY}\n```"),
            format!("```\n{CODING_REPLY}\n```"),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(reply_with(&fenced)))
                .mount(&server)
                .await;
            let classifier = test_classifier(server.uri());

            let verdict = classifier.classify(&observation()).await;

            assert_eq!(verdict.activity, Activity::Coding, "reply: {fenced}");
            assert_eq!(verdict.confidence, 0.85);
        }
    }

    #[tokio::test]
    async fn unparseable_reply_degrades_with_raw_text_in_details() {
        let server = MockServer::start().await;
        let reply = "```\nThe user seems to be coding.\n```";
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_with(reply)))
            .mount(&server)
            .await;
        let classifier = test_classifier(server.uri());

        let verdict = classifier.classify(&observation()).await;

        assert_eq!(verdict.activity, Activity::Unknown);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.details, "The user seems to be coding.");
    }

    #[tokio::test]
    async fn remote_failure_degrades_with_error_in_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Quota exceeded" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let classifier = test_classifier(server.uri());

        let verdict = classifier.classify(&observation()).await;

        assert_eq!(verdict.activity, Activity::Unknown);
        assert!(
            verdict.description.contains("Quota exceeded"),
            "description was: {}",
            verdict.description
        );
        assert_eq!(verdict.data_sources, "Error occurred during analysis");
    }

    #[tokio::test]
    async fn verdict_timestamp_is_the_classification_moment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_with(CODING_REPLY)))
            .mount(&server)
            .await;
        let classifier = test_classifier(server.uri());
        let before = epoch_seconds(chrono::Utc::now());

        let verdict = classifier.classify(&observation()).await;

        // The model answered timestamp 1.0; it must be overwritten.
        assert!(verdict.timestamp >= before);
    }

    #[test]
    fn config_from_env_requires_the_key() {
        // Runs in-process, so scope the variable carefully.
        std::env::remove_var(API_KEY_VAR);
        assert!(ClassifierConfig::from_env().is_err());
        std::env::set_var(API_KEY_VAR, "k");
        assert!(ClassifierConfig::from_env().is_ok());
        std::env::remove_var(API_KEY_VAR);
    }
}
