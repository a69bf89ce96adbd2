//! Coaching message collaborator
//!
//! Calls an OpenAI-compatible chat-completions endpoint with the score and
//! optional trend in the system prompt and the user's own words as the user
//! message.

use pulse_common::config::CoachConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("Coaching service is not configured")]
    NotConfigured,

    #[error("Coaching service unreachable: {0}")]
    Network(String),

    #[error("Coaching service returned {0}: {1}")]
    Api(u16, String),

    #[error("Unexpected coaching response: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Build the system prompt for one check-in
pub fn system_prompt(coherence: f64, trend: Option<&str>) -> String {
    let mut prompt = String::from("You are a supportive breath-aware assistant.\n\n");
    prompt.push_str(&format!("Coherence score: {}\n", coherence));
    if let Some(trend) = trend {
        prompt.push_str(&format!("Trend: {}\n", trend));
    }
    prompt.push_str(
        "\nReply with a short, emotionally-aware message as a gentle coach. \
         If the breath rate has been rising for 3 check-ins, suggest a more \
         proactive step such as a guided reset or more frequent check-ins.",
    );
    prompt
}

#[derive(Debug, Clone)]
pub struct CoachClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CoachClient {
    /// `Ok(None)` when no API key is configured
    pub fn from_config(config: &CoachConfig, timeout: Duration) -> Result<Option<Self>, CoachError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoachError::Network(e.to_string()))?;

        Ok(Some(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        }))
    }

    /// Generate a coaching reply
    pub async fn generate(
        &self,
        text: &str,
        coherence: f64,
        trend: Option<&str>,
    ) -> Result<String, CoachError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(coherence, trend),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.trim().to_string(),
                },
            ],
        };

        debug!(model = %self.model, "Requesting coaching message");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoachError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoachError::Api(status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoachError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CoachError::Parse("no choices returned".to_string()))
    }
}
