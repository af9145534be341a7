use serde_json::Value;
use std::cmp::Reverse;
use tracing::{debug, info};

use crate::schema::{Entity, EntityType, TypeClass};

/// Normalize entity name for comparison: trim and lowercase
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// True when `short` equals `long`, or equals one whitespace token of it,
/// after normalization ("Marcus" in "Marcus Chen").
pub fn is_alias_of(short: &str, long: &str) -> bool {
    let short = normalize_name(short);
    let long = normalize_name(long);
    short == long || long.split_whitespace().any(|token| token == short)
}

/// Filters, deduplicates and flags recognized entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityResolver;

impl EntityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, entities: Vec<Entity>) -> Vec<Entity> {
        info!(entities = entities.len(), "Resolution input");

        let entities = self.filter_types(entities);
        info!(entities = entities.len(), "After type filtering");

        let entities = self.merge_duplicates(entities);
        info!(entities = entities.len(), "After deduplication");

        let entities = self.flag_uncertain(entities);
        for entity in &entities {
            debug!(
                name = entity.name(),
                entity_type = %entity.entity_type(),
                mentions = entity.mentions().len(),
                "Resolved entity"
            );
        }
        entities
    }

    /// Drop skip-listed types. Keep-listed and unlisted types pass through.
    pub fn filter_types(&self, entities: Vec<Entity>) -> Vec<Entity> {
        entities
            .into_iter()
            .filter(|e| e.entity_type().class() != TypeClass::Skip)
            .collect()
    }

    /// Greedy one-pass merge, longest names first.
    ///
    /// Each surviving entity absorbs every later, unconsumed entity whose
    /// normalized name is an alias of its own. Absorption is one hop only:
    /// two short aliases never merge with each other, only into the longer
    /// name being scanned.
    pub fn merge_duplicates(&self, mut entities: Vec<Entity>) -> Vec<Entity> {
        // stable: equal lengths keep their prior order
        entities.sort_by_key(|e| Reverse(e.name().chars().count()));

        // `None` marks a consumed slot; indices stay fixed during the scan
        let mut slots: Vec<Option<Entity>> = entities.into_iter().map(Some).collect();
        let mut merged = Vec::with_capacity(slots.len());

        for i in 0..slots.len() {
            let Some(mut primary) = slots[i].take() else {
                continue;
            };

            for slot in slots.iter_mut().skip(i + 1) {
                let matches = slot
                    .as_ref()
                    .is_some_and(|other| is_alias_of(other.name(), primary.name()));
                if !matches {
                    continue;
                }
                if let Some(other) = slot.take() {
                    debug!(primary = primary.name(), absorbed = other.name(), "Merging duplicate");
                    primary.absorb(other);
                }
            }

            merged.push(primary);
        }

        merged
    }

    /// Short geopolitical names are often mis-tagged common nouns.
    pub fn flag_uncertain(&self, mut entities: Vec<Entity>) -> Vec<Entity> {
        for entity in &mut entities {
            match entity.entity_type() {
                EntityType::GeopoliticalEntity => {
                    if entity.name().split_whitespace().count() <= 2 {
                        entity.set_attribute("uncertain_type", Value::Bool(true));
                    }
                }
                // no resolution rules for other types yet
                _ => {}
            }
        }
        entities
    }
}
