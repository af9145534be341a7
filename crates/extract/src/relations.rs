use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capability::{CompletionModel, CompletionOptions};
use crate::enrich::preview;
use crate::json::parse_model_json;
use crate::prompt::build_relationship_prompt;
use crate::resolver::normalize_name;
use crate::schema::{Entity, EntityType, Relationship};

/// Fixed confidence for accepted relationships; the model is not asked for a score.
pub const RELATIONSHIP_CONFIDENCE: f64 = 0.9;

/// Result of querying one entity pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Related {
        relationships: Vec<Relationship>,
        rejected: usize,
    },
    NoRelationship {
        rejected: usize,
    },
    /// Same low-signal co-location type; the model was not asked.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipReport {
    pub pairs_total: usize,
    pub pairs_skipped: usize,
    pub pairs_failed: usize,
    /// Candidates dropped by validation across all pairs.
    pub rejected_candidates: usize,
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    #[serde(default)]
    reasoning: Value,
    #[serde(default)]
    relationships: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    source: String,
    target: String,
    #[serde(rename = "type", default = "unknown_type")]
    relation_type: String,
    #[serde(default)]
    evidence: String,
}

fn unknown_type() -> String {
    "unknown".to_string()
}

/// Two facilities, two locations or two geopolitical entities rarely carry a
/// relationship worth a model call. Mixed pairs among the three are still asked.
pub fn is_low_signal_pair(a: &EntityType, b: &EntityType) -> bool {
    a == b
        && matches!(
            a,
            EntityType::Facility | EntityType::Location | EntityType::GeopoliticalEntity
        )
}

pub struct RelationshipExtractor {
    completion: Arc<dyn CompletionModel>,
    options: CompletionOptions,
    concurrency: usize,
}

impl RelationshipExtractor {
    pub fn new(completion: Arc<dyn CompletionModel>, options: CompletionOptions, concurrency: usize) -> Self {
        Self {
            completion,
            options,
            concurrency: concurrency.max(1),
        }
    }

    /// Query every unordered pair. Relationships come back in pair-enumeration order.
    pub async fn extract_relationships(
        &self,
        entities: &[Entity],
        scene_text: &str,
    ) -> (Vec<Relationship>, RelationshipReport) {
        let pairs: Vec<(&Entity, &Entity)> = entities
            .iter()
            .enumerate()
            .flat_map(move |(i, a)| entities[i + 1..].iter().map(move |b| (a, b)))
            .collect();
        let total = pairs.len();
        info!(pairs = total, concurrency = self.concurrency, "Extracting relationships from entity pairs");

        let outcomes: Vec<PairOutcome> = stream::iter(pairs.into_iter().enumerate())
            .map(|(i, (a, b))| async move {
                info!(progress = %format!("{}/{}", i + 1, total), a = a.name(), b = b.name(), "Analyzing pair");
                if is_low_signal_pair(a.entity_type(), b.entity_type()) {
                    debug!(entity_type = %a.entity_type(), "Skipping same-type co-location pair");
                    return PairOutcome::Skipped;
                }
                self.relate(a, b, scene_text).await
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = RelationshipReport {
            pairs_total: total,
            ..Default::default()
        };
        let mut relationships = Vec::new();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Related {
                    relationships: found,
                    rejected,
                } => {
                    relationships.extend(found);
                    report.rejected_candidates += rejected;
                }
                PairOutcome::NoRelationship { rejected } => report.rejected_candidates += rejected,
                PairOutcome::Skipped => report.pairs_skipped += 1,
                PairOutcome::Failed { reason } => {
                    warn!(reason = %reason, "Relationship extraction failed for pair");
                    report.pairs_failed += 1;
                }
            }
        }

        info!(
            relationships = relationships.len(),
            skipped = report.pairs_skipped,
            failed = report.pairs_failed,
            "Relationship extraction complete"
        );
        for rel in &relationships {
            debug!(source = %rel.source, relation = %rel.relation_type, target = %rel.target, "Relationship");
        }
        (relationships, report)
    }

    /// Ask the model about one pair and validate its answer.
    pub async fn relate(&self, a: &Entity, b: &Entity, scene_text: &str) -> PairOutcome {
        let prompt = build_relationship_prompt(a, b, scene_text);

        let response = match self.completion.complete(&prompt, &self.options).await {
            Ok(response) => response,
            Err(e) => return PairOutcome::Failed { reason: e.to_string() },
        };
        debug!(a = a.name(), b = b.name(), response = %preview(&response), "Relationship response");

        let data = match parse_model_json(&response).into_object() {
            Ok(data) => data,
            Err(reason) => return PairOutcome::Failed { reason },
        };

        match validate_candidates(a, b, data) {
            Ok((found, rejected)) if found.is_empty() => PairOutcome::NoRelationship { rejected },
            Ok((found, rejected)) => PairOutcome::Related {
                relationships: found,
                rejected,
            },
            Err(reason) => PairOutcome::Failed { reason },
        }
    }
}

/// Keep candidates whose endpoints are the two queried names, in either
/// direction, and differ from each other. Returns accepted relationships and
/// the number rejected.
pub fn validate_candidates(
    a: &Entity,
    b: &Entity,
    data: Map<String, Value>,
) -> Result<(Vec<Relationship>, usize), String> {
    let response: PairResponse = serde_json::from_value(Value::Object(data))
        .map_err(|e| format!("unexpected relationship response shape: {e}"))?;
    if let Some(reasoning) = response.reasoning.as_str() {
        debug!(reasoning = %preview(reasoning), "Model reasoning");
    }

    let names = [normalize_name(a.name()), normalize_name(b.name())];
    let mut accepted = Vec::new();
    let mut rejected = 0;

    for raw in response.relationships {
        let Ok(candidate) = serde_json::from_value::<Candidate>(raw) else {
            rejected += 1;
            continue;
        };

        let source = normalize_name(&candidate.source);
        let target = normalize_name(&candidate.target);
        if !names.contains(&source) || !names.contains(&target) || source == target {
            debug!(source = %candidate.source, target = %candidate.target, "Rejected relationship candidate");
            rejected += 1;
            continue;
        }

        accepted.push(Relationship {
            source: candidate.source.trim().to_string(),
            target: candidate.target.trim().to_string(),
            relation_type: candidate.relation_type,
            description: candidate.evidence,
            confidence: RELATIONSHIP_CONFIDENCE,
        });
    }

    Ok((accepted, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCompletion;
    use serde_json::json;

    fn options() -> CompletionOptions {
        CompletionOptions { max_tokens: 400, temperature: 0.1 }
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_low_signal_pairs() {
        assert!(is_low_signal_pair(&EntityType::Facility, &EntityType::Facility));
        assert!(is_low_signal_pair(&EntityType::Location, &EntityType::Location));
        assert!(is_low_signal_pair(&EntityType::GeopoliticalEntity, &EntityType::GeopoliticalEntity));
        assert!(!is_low_signal_pair(&EntityType::Facility, &EntityType::Location));
        assert!(!is_low_signal_pair(&EntityType::GeopoliticalEntity, &EntityType::Location));
        assert!(!is_low_signal_pair(&EntityType::Person, &EntityType::Person));
    }

    #[test]
    fn test_validation_rules() {
        let hale = Entity::new("Inspector Hale", "PERSON");
        let ashby = Entity::new("Lord Ashby", "PERSON");

        let (accepted, rejected) = validate_candidates(
            &hale,
            &ashby,
            object(json!({
                "reasoning": "Hale questions Ashby.",
                "relationships": [
                    {"source": " inspector hale ", "target": "Lord Ashby", "type": "interrogated", "evidence": "Hale pressed him"},
                    {"source": "Lord Ashby", "target": "Inspector Hale"},
                    {"source": "Inspector Hale", "target": "inspector hale", "type": "self"},
                    {"source": "Inspector Hale", "target": "the butler", "type": "suspects"},
                    {"target": "Lord Ashby"},
                    "not an object"
                ]
            })),
        )
        .unwrap();

        assert_eq!(accepted.len(), 2);
        assert_eq!(rejected, 4);
        assert_eq!(accepted[0].source, "inspector hale");
        assert_eq!(accepted[0].relation_type, "interrogated");
        assert_eq!(accepted[0].description, "Hale pressed him");
        assert_eq!(accepted[1].relation_type, "unknown");
        assert_eq!(accepted[1].description, "");
        assert!(accepted.iter().all(|r| r.confidence == RELATIONSHIP_CONFIDENCE));
    }

    #[test]
    fn test_non_list_relationships_is_failure() {
        let a = Entity::new("A", "PERSON");
        let b = Entity::new("B", "PERSON");
        assert!(validate_candidates(&a, &b, object(json!({"relationships": "none"}))).is_err());
        let (accepted, rejected) = validate_candidates(&a, &b, object(json!({"reasoning": "nothing"}))).unwrap();
        assert!(accepted.is_empty());
        assert_eq!(rejected, 0);
    }

    #[tokio::test]
    async fn test_pairs_are_isolated_and_skipped() {
        let completion = ScriptedCompletion::new()
            .when(
                "Entity A: Inspector Hale (PERSON)\nEntity B: Lord Ashby (PERSON)",
                r#"{"reasoning": "x", "relationships": [{"source": "Inspector Hale", "target": "Lord Ashby", "type": "suspects", "evidence": "He suspected Ashby"}]}"#,
            )
            .fail_when("Entity A: Inspector Hale (PERSON)\nEntity B: London", "timeout")
            .otherwise("no idea");
        let completion = Arc::new(completion);
        let extractor = RelationshipExtractor::new(completion.clone(), options(), 1);

        let entities = vec![
            Entity::new("Inspector Hale", "PERSON"),
            Entity::new("Lord Ashby", "PERSON"),
            Entity::new("London", "GPE"),
            Entity::new("Paris", "GPE"),
        ];
        let (relationships, report) = extractor.extract_relationships(&entities, "scene").await;

        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].source, "Inspector Hale");
        assert_eq!(relationships[0].target, "Lord Ashby");
        assert_eq!(
            report,
            RelationshipReport {
                pairs_total: 6,
                pairs_skipped: 1,
                pairs_failed: 4,
                rejected_candidates: 0,
            }
        );
        // London/Paris never reached the model
        assert_eq!(completion.prompts().len(), 5);
        assert!(!completion.prompts().iter().any(|p| p.contains("Entity A: London (GPE)\nEntity B: Paris")));
    }

    #[tokio::test]
    async fn test_concurrent_pairs_keep_enumeration_order() {
        let reply = |a: &str, b: &str| {
            format!(r#"{{"relationships": [{{"source": "{a}", "target": "{b}", "type": "knows"}}]}}"#)
        };
        let completion = ScriptedCompletion::new()
            .when("Entity A: A (PERSON)\nEntity B: B", &reply("A", "B"))
            .when("Entity A: A (PERSON)\nEntity B: C", &reply("A", "C"))
            .when("Entity A: B (PERSON)\nEntity B: C", &reply("C", "B"));
        let extractor = RelationshipExtractor::new(Arc::new(completion), options(), 4);

        let entities = vec![
            Entity::new("A", "PERSON"),
            Entity::new("B", "PERSON"),
            Entity::new("C", "PERSON"),
        ];
        let (relationships, _) = extractor.extract_relationships(&entities, "scene").await;

        let edges: Vec<(&str, &str)> = relationships
            .iter()
            .map(|r| (r.source.as_str(), r.target.as_str()))
            .collect();
        assert_eq!(edges, vec![("A", "B"), ("A", "C"), ("C", "B")]);
    }
}
