//! Deterministic capabilities for tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::capability::{CompletionModel, CompletionOptions, SpanExtractor};
use crate::error::{ExtractError, ExtractResult};
use crate::schema::Span;

/// A span with dummy offsets.
pub fn span(text: &str, label: &str) -> Span {
    Span::new(text, label, 0, text.len())
}

/// Returns the same spans (or the same failure) for every call.
pub struct ScriptedRecognizer {
    spans: Vec<Span>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(spans: Vec<Span>) -> Self {
        Self {
            spans,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            spans: Vec::new(),
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpanExtractor for ScriptedRecognizer {
    async fn extract_spans(&self, _text: &str) -> ExtractResult<Vec<Span>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(ExtractError::Recognition(message.clone())),
            None => Ok(self.spans.clone()),
        }
    }
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Error(String),
}

/// Answers by the first rule whose needle occurs in the prompt.
/// Without a matching rule or fallback the call fails.
pub struct ScriptedCompletion {
    rules: Vec<(String, Reply)>,
    fallback: Option<Reply>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn when(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Text(reply.to_string())));
        self
    }

    pub fn fail_when(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Error(message.to_string())));
        self
    }

    pub fn otherwise(mut self, reply: &str) -> Self {
        self.fallback = Some(Reply::Text(reply.to_string()));
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletion {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> ExtractResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.fallback.clone());

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(message)) => Err(ExtractError::Completion(message)),
            None => Err(ExtractError::Completion("no scripted reply".to_string())),
        }
    }
}
