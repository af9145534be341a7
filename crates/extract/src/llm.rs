use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::{CompletionModel, CompletionOptions};
use crate::error::{ExtractError, ExtractResult};
use crate::prompt::SYSTEM_PROMPT;

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub async fn generate(&self, prompt: &str, options: &CompletionOptions) -> ExtractResult<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            system: SYSTEM_PROMPT,
            stream: false,
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
                top_p: 0.9,
                repeat_penalty: 1.1,
            },
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractError::Completion(format!("Failed to send request to Ollama: {e}")))?;

        if !response.status().is_success() {
            return Err(ExtractError::Completion(format!(
                "Ollama request failed: {}",
                response.status()
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Completion(format!("Failed to parse Ollama response: {e}")))?;

        Ok(ollama_response.response.trim().to_string())
    }
}

#[async_trait]
impl CompletionModel for OllamaClient {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> ExtractResult<String> {
        self.generate(prompt, options).await
    }
}
