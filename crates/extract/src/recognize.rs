use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::capability::SpanExtractor;
use crate::error::ExtractResult;
use crate::schema::{Entity, Span};

/// Output of the recognition stage.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// Spans returned by the recognizer, before any grouping or filtering.
    pub span_count: usize,
    pub entities: Vec<Entity>,
}

pub struct EntityRecognizer {
    extractor: Arc<dyn SpanExtractor>,
}

impl EntityRecognizer {
    pub fn new(extractor: Arc<dyn SpanExtractor>) -> Self {
        Self { extractor }
    }

    pub async fn recognize(&self, scene_text: &str) -> ExtractResult<Recognition> {
        let spans = self.extractor.extract_spans(scene_text).await?;
        let span_count = spans.len();
        info!(spans = span_count, "Found raw spans");

        let entities = group_spans(spans);
        for entity in &entities {
            debug!(name = entity.name(), entity_type = %entity.entity_type(), "Recognized entity");
        }
        info!(entities = entities.len(), "Recognition complete");

        Ok(Recognition { span_count, entities })
    }
}

/// Group spans by exact `(text, label)`, in first-seen order.
pub fn group_spans(spans: Vec<Span>) -> Vec<Entity> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut entities: Vec<Entity> = Vec::new();

    for span in spans {
        let key = (span.text, span.label);
        match index.get(&key) {
            Some(&slot) => entities[slot].add_mention(key.0.clone()),
            None => {
                let entity = Entity::new(key.0.clone(), key.1.as_str()).with_mention(key.0.clone());
                index.insert(key, entities.len());
                entities.push(entity);
            }
        }
    }

    entities
}
