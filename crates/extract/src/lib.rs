pub mod capability;
pub mod enrich;
pub mod error;
pub mod json;
pub mod llm;
pub mod ner;
pub mod pipeline;
pub mod prompt;
pub mod recognize;
pub mod relations;
pub mod resolver;
pub mod schema;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use capability::{Capabilities, CompletionModel, CompletionOptions, SpanExtractor};
pub use enrich::{EnrichmentOutcome, EnrichmentReport, EntityEnricher};
pub use error::{ExtractError, ExtractResult};
pub use json::{JsonExtraction, parse_model_json};
pub use llm::OllamaClient;
pub use ner::NerClient;
pub use pipeline::{Pipeline, PipelineConfig};
pub use recognize::{EntityRecognizer, Recognition};
pub use relations::{PairOutcome, RELATIONSHIP_CONFIDENCE, RelationshipExtractor, RelationshipReport};
pub use resolver::EntityResolver;
pub use schema::{Entity, EntityType, PipelineMetadata, PipelineResult, Relationship, Span, TypeClass};
