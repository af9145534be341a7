use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ExtractResult;
use crate::schema::Span;

/// Statistical NER: turns text into labelled spans.
#[async_trait]
pub trait SpanExtractor: Send + Sync {
    async fn extract_spans(&self, text: &str) -> ExtractResult<Vec<Span>>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Generative model used as a structured-extraction oracle.
/// Output is untrusted text; callers parse it defensively.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> ExtractResult<String>;
}

/// Model handles loaded once per process and shared read-only by every job.
#[derive(Clone)]
pub struct Capabilities {
    pub recognizer: Arc<dyn SpanExtractor>,
    pub completion: Arc<dyn CompletionModel>,
}

impl Capabilities {
    pub fn new(
        recognizer: impl SpanExtractor + 'static,
        completion: impl CompletionModel + 'static,
    ) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            completion: Arc::new(completion),
        }
    }
}
