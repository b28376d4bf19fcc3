use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

use careplan_core::drafting::{build_prompt, SYSTEM_PROMPT};
use careplan_core::{CarePlanDrafter, ClinicalInput, DraftError};

use crate::app_config::DraftingConfig;

/// Care-plan drafter backed by an OpenAI-compatible chat-completions API.
pub struct HttpCarePlanDrafter {
    client: reqwest::Client,
    config: DraftingConfig,
    api_key: String,
}

impl HttpCarePlanDrafter {
    pub fn new(config: DraftingConfig) -> Result<Self, DraftError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DraftError::Configuration(
                    "no API key configured (set CAREPLAN__DRAFTING__API_KEY or OPENAI_API_KEY)"
                        .to_string(),
                )
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DraftError::Http(e.to_string()))?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn request_body(&self, input: &ClinicalInput) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(input),
                },
            ],
            temperature: self.config.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Pulls the first choice's text out of a chat-completions body.
fn parse_completion(body: &str) -> Result<String, DraftError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| DraftError::Serialization(e.to_string()))?;

    if let Some(usage) = &parsed.usage {
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Drafting usage"
        );
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| DraftError::Response("empty completion".to_string()))
}

#[async_trait]
impl CarePlanDrafter for HttpCarePlanDrafter {
    async fn draft(&self, input: &ClinicalInput) -> Result<String, DraftError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| DraftError::Configuration(e.to_string()))?,
        );

        tracing::info!(
            model = %self.config.model,
            mrn = %input.patient_mrn,
            medication = %input.medication_name,
            "Requesting care plan draft"
        );

        let body = self.request_body(input);
        let prompt_chars: usize = body.messages.iter().map(|m| m.content.chars().count()).sum();
        tracing::debug!(prompt_chars, "Care plan prompt built");

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| DraftError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DraftError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DraftError::Http(e.to_string()))?;
        parse_completion(&text)
    }
}

/// Builds the HTTP drafter on first use, so the service can start
/// without an API key and only care-plan generation fails.
pub struct LazyCarePlanDrafter {
    config: DraftingConfig,
    inner: OnceCell<HttpCarePlanDrafter>,
}

impl LazyCarePlanDrafter {
    pub fn new(config: DraftingConfig) -> Self {
        Self {
            config,
            inner: OnceCell::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

#[async_trait]
impl CarePlanDrafter for LazyCarePlanDrafter {
    async fn draft(&self, input: &ClinicalInput) -> Result<String, DraftError> {
        let drafter = self
            .inner
            .get_or_try_init(|| async { HttpCarePlanDrafter::new(self.config.clone()) })
            .await?;
        drafter.draft(input).await
    }
}
