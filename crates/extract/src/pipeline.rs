use tracing::info;

use crate::capability::{Capabilities, CompletionOptions};
use crate::enrich::EntityEnricher;
use crate::error::ExtractResult;
use crate::recognize::EntityRecognizer;
use crate::relations::RelationshipExtractor;
use crate::resolver::EntityResolver;
use crate::schema::{PipelineMetadata, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub enrichment_max_tokens: u32,
    pub relationship_max_tokens: u32,
    pub temperature: f32,
    /// 1 keeps every completion call sequential.
    pub max_concurrent_llm_calls: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enrichment_max_tokens: 400,
            relationship_max_tokens: 400,
            temperature: 0.1,
            max_concurrent_llm_calls: 1,
        }
    }
}

/// Runs recognition, resolution, enrichment and relationship inference in order.
pub struct Pipeline {
    recognizer: EntityRecognizer,
    resolver: EntityResolver,
    enricher: EntityEnricher,
    relations: RelationshipExtractor,
}

impl Pipeline {
    pub fn new(capabilities: &Capabilities, config: PipelineConfig) -> Self {
        let enrichment = CompletionOptions {
            max_tokens: config.enrichment_max_tokens,
            temperature: config.temperature,
        };
        let relationship = CompletionOptions {
            max_tokens: config.relationship_max_tokens,
            temperature: config.temperature,
        };

        Self {
            recognizer: EntityRecognizer::new(capabilities.recognizer.clone()),
            resolver: EntityResolver::new(),
            enricher: EntityEnricher::new(
                capabilities.completion.clone(),
                enrichment,
                config.max_concurrent_llm_calls,
            ),
            relations: RelationshipExtractor::new(
                capabilities.completion.clone(),
                relationship,
                config.max_concurrent_llm_calls,
            ),
        }
    }

    /// Full pipeline for one scene. Only a recognizer failure is an error;
    /// model failures are absorbed per entity and per pair.
    pub async fn process_scene(&self, scene_text: &str) -> ExtractResult<PipelineResult> {
        info!(scene_chars = scene_text.chars().count(), "Processing scene");

        // Step 1: Recognize entities
        info!(stage = "1/4", "Extracting entities");
        let recognition = self.recognizer.recognize(scene_text).await?;

        // Step 2: Filter, merge and flag
        info!(stage = "2/4", "Resolving entities");
        let mut entities = self.resolver.resolve(recognition.entities);

        // Step 3: Describe each entity in scene context
        info!(stage = "3/4", "Enriching entities");
        let enrichment = self.enricher.enrich_entities(&mut entities, scene_text).await;

        // Step 4: Pairwise relationships
        info!(stage = "4/4", "Extracting relationships");
        let (relationships, pairs) = self.relations.extract_relationships(&entities, scene_text).await;

        let metadata = PipelineMetadata {
            raw_entity_count: recognition.span_count,
            final_entity_count: entities.len(),
            relationship_count: relationships.len(),
        };
        info!(
            raw_entities = metadata.raw_entity_count,
            final_entities = metadata.final_entity_count,
            relationships = metadata.relationship_count,
            enriched = enrichment.enriched,
            enrichment_failures = enrichment.unchanged,
            pairs_total = pairs.pairs_total,
            pairs_skipped = pairs.pairs_skipped,
            pairs_failed = pairs.pairs_failed,
            rejected_candidates = pairs.rejected_candidates,
            "Pipeline complete"
        );

        Ok(PipelineResult {
            entities,
            relationships,
            metadata,
        })
    }
}
