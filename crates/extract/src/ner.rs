use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::SpanExtractor;
use crate::error::{ExtractError, ExtractResult};
use crate::schema::Span;

/// Client for an HTTP NER service (`POST /ner`).
#[derive(Clone)]
pub struct NerClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct NerRequest<'a> {
    text: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct NerResponse {
    #[serde(default)]
    spans: Vec<Span>,
}

impl NerClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub async fn extract(&self, text: &str) -> ExtractResult<Vec<Span>> {
        let url = format!("{}/ner", self.base_url);

        let response = self.client
            .post(&url)
            .json(&NerRequest { text, model: &self.model })
            .send()
            .await
            .map_err(|e| ExtractError::Recognition(format!("Failed to send request to NER service: {e}")))?;

        if !response.status().is_success() {
            return Err(ExtractError::Recognition(format!(
                "NER request failed: {}",
                response.status()
            )));
        }

        let ner_response: NerResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Recognition(format!("Failed to parse NER response: {e}")))?;

        tracing::debug!(spans = ner_response.spans.len(), "Extracted raw spans");
        Ok(ner_response.spans)
    }
}

#[async_trait]
impl SpanExtractor for NerClient {
    async fn extract_spans(&self, text: &str) -> ExtractResult<Vec<Span>> {
        self.extract(text).await
    }
}
