use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capability::{CompletionModel, CompletionOptions};
use crate::json::parse_model_json;
use crate::prompt::build_enrichment_prompt;
use crate::schema::Entity;

/// What happened to one entity during enrichment.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Enriched,
    /// Attributes were left as they were.
    Unchanged { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub enriched: usize,
    pub unchanged: usize,
}

pub struct EntityEnricher {
    completion: Arc<dyn CompletionModel>,
    options: CompletionOptions,
    concurrency: usize,
}

impl EntityEnricher {
    pub fn new(completion: Arc<dyn CompletionModel>, options: CompletionOptions, concurrency: usize) -> Self {
        Self {
            completion,
            options,
            concurrency: concurrency.max(1),
        }
    }

    /// Enrich every entity in place. Output order equals input order.
    pub async fn enrich_entities(&self, entities: &mut [Entity], scene_text: &str) -> EnrichmentReport {
        let total = entities.len();
        info!(entities = total, concurrency = self.concurrency, "Enriching entities");

        let described: Vec<Result<Map<String, Value>, String>> = stream::iter(entities.iter().enumerate())
            .map(|(i, entity)| async move {
                info!(progress = %format!("{}/{}", i + 1, total), name = entity.name(), "Enriching entity");
                self.describe(entity, scene_text).await
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = EnrichmentReport::default();
        for (entity, description) in entities.iter_mut().zip(described) {
            match apply(entity, description) {
                EnrichmentOutcome::Enriched => {
                    debug!(name = entity.name(), role = ?entity.attribute_str("role"), "Enriched entity");
                    report.enriched += 1;
                }
                EnrichmentOutcome::Unchanged { reason } => {
                    warn!(name = entity.name(), reason = %reason, "Enrichment failed, attributes unchanged");
                    report.unchanged += 1;
                }
            }
        }

        info!(enriched = report.enriched, unchanged = report.unchanged, "Enrichment complete");
        report
    }

    /// Ask the model for `{description, role, attributes}` and build the new attribute map.
    pub async fn describe(&self, entity: &Entity, scene_text: &str) -> Result<Map<String, Value>, String> {
        let prompt = build_enrichment_prompt(entity, scene_text);

        let response = self
            .completion
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| e.to_string())?;
        debug!(name = entity.name(), response = %preview(&response), "Enrichment response");

        let data = parse_model_json(&response).into_object()?;
        build_attributes(data)
    }
}

fn apply(entity: &mut Entity, description: Result<Map<String, Value>, String>) -> EnrichmentOutcome {
    match description {
        Ok(attributes) => {
            entity.replace_attributes(attributes);
            EnrichmentOutcome::Enriched
        }
        Err(reason) => EnrichmentOutcome::Unchanged { reason },
    }
}

/// `{description, role, ...attributes}`; nested keys win on collision.
pub fn build_attributes(mut data: Map<String, Value>) -> Result<Map<String, Value>, String> {
    let mut attributes = Map::new();
    attributes.insert(
        "description".to_string(),
        data.remove("description").unwrap_or_else(|| Value::String(String::new())),
    );
    attributes.insert(
        "role".to_string(),
        data.remove("role").unwrap_or_else(|| Value::String(String::new())),
    );

    match data.remove("attributes") {
        None => {}
        Some(Value::Object(nested)) => attributes.extend(nested),
        Some(_) => return Err("\"attributes\" is not a JSON object".to_string()),
    }

    Ok(attributes)
}

pub(crate) fn preview(text: &str) -> String {
    text.chars().take(150).collect()
}
