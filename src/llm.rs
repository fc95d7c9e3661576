//! OpenAI Disambiguator
//!
//! `Disambiguator` backed by an OpenAI-compatible chat completions endpoint.
//! Native builds only (feature `cli`).

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::LlmConfig;
use crate::error::{LinkError, Result};
use crate::linker::gateway::{DisambiguationRequest, Disambiguator, ABSTAIN_TOKEN};

const SYSTEM_PROMPT: &str = "You link terms in personal knowledge-base notes. \
Given a term as it appears in a passage and a list of candidate notes, reply with \
the one candidate the term refers to, copied exactly. If none fits, or the passage \
is not clear enough, reply NONE. Reply with nothing else.";

/// Chat-completions client answering disambiguation requests
#[derive(Clone)]
pub struct OpenAiDisambiguator {
    api_key: String,
    client: reqwest::Client,
    model: String,
    endpoint: String,
}

impl OpenAiDisambiguator {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LinkError::GatewayUnavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            client,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    /// Read the key from the configured environment variable (`.env` honoured)
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LinkError::GatewayUnavailable(format!("{} environment variable not set", config.api_key_env))
            })?;
        Self::new(api_key, config)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// User message for one request
pub fn user_prompt(request: &DisambiguationRequest) -> String {
    let mut prompt = format!("Term: {}\n\nCandidates:\n", request.alias);
    for candidate in &request.candidates {
        prompt.push_str("- ");
        prompt.push_str(candidate);
        prompt.push('\n');
    }
    if !request.source_terms.is_empty() {
        prompt.push_str("\nVocabulary lines: ");
        prompt.push_str(&request.source_terms.join("; "));
        prompt.push('\n');
    }
    prompt.push_str("\nPassage (the term is marked \u{27E6}like this\u{27E7}):\n");
    prompt.push_str(&request.context);
    prompt.push_str(&format!("\n\nAnswer with one candidate or {}.", ABSTAIN_TOKEN));
    prompt
}

#[async_trait]
impl Disambiguator for OpenAiDisambiguator {
    async fn choose(&self, request: &DisambiguationRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(request)}
            ],
            "temperature": 0.0
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LinkError::gateway(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LinkError::gateway(format!("API error {}: {}", status, body)));
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LinkError::gateway(format!("Failed to parse response: {}", e)))?;
        let answer = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LinkError::gateway("response had no choices"))?;

        tracing::debug!(alias = %request.alias, answer = %answer.trim(), "model answer");
        Ok(answer)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
