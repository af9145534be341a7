use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// A raw recognizer hit: a substring of the scene tagged with a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub label: String,
    #[serde(rename = "start")]
    pub start_offset: usize,
    #[serde(rename = "end")]
    pub end_offset: usize,
}

impl Span {
    pub fn new(text: impl Into<String>, label: impl Into<String>, start_offset: usize, end_offset: usize) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            start_offset,
            end_offset,
        }
    }
}

/// How the resolution stage treats a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Keep,
    Skip,
    Unlisted,
}

/// Recognizer label. Unknown labels are carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Person,
    Organization,
    GeopoliticalEntity,
    Location,
    Facility,
    Product,
    Event,
    WorkOfArt,
    Law,
    Nationality,
    Language,
    Time,
    Date,
    Cardinal,
    Ordinal,
    Quantity,
    Percent,
    Money,
    Other(String),
}

impl EntityType {
    pub fn label(&self) -> &str {
        match self {
            EntityType::Person => "PERSON",
            EntityType::Organization => "ORG",
            EntityType::GeopoliticalEntity => "GPE",
            EntityType::Location => "LOC",
            EntityType::Facility => "FAC",
            EntityType::Product => "PRODUCT",
            EntityType::Event => "EVENT",
            EntityType::WorkOfArt => "WORK_OF_ART",
            EntityType::Law => "LAW",
            EntityType::Nationality => "NORP",
            EntityType::Language => "LANGUAGE",
            EntityType::Time => "TIME",
            EntityType::Date => "DATE",
            EntityType::Cardinal => "CARDINAL",
            EntityType::Ordinal => "ORDINAL",
            EntityType::Quantity => "QUANTITY",
            EntityType::Percent => "PERCENT",
            EntityType::Money => "MONEY",
            EntityType::Other(label) => label.as_str(),
        }
    }

    pub fn class(&self) -> TypeClass {
        match self {
            EntityType::Person
            | EntityType::Organization
            | EntityType::GeopoliticalEntity
            | EntityType::Location
            | EntityType::Facility
            | EntityType::Product
            | EntityType::Event
            | EntityType::WorkOfArt
            | EntityType::Law => TypeClass::Keep,
            EntityType::Time
            | EntityType::Date
            | EntityType::Cardinal
            | EntityType::Ordinal
            | EntityType::Quantity
            | EntityType::Percent
            | EntityType::Money => TypeClass::Skip,
            EntityType::Nationality | EntityType::Language | EntityType::Other(_) => {
                TypeClass::Unlisted
            }
        }
    }
}

impl From<&str> for EntityType {
    fn from(label: &str) -> Self {
        match label {
            "PERSON" => EntityType::Person,
            "ORG" => EntityType::Organization,
            "GPE" => EntityType::GeopoliticalEntity,
            "LOC" => EntityType::Location,
            "FAC" => EntityType::Facility,
            "PRODUCT" => EntityType::Product,
            "EVENT" => EntityType::Event,
            "WORK_OF_ART" => EntityType::WorkOfArt,
            "LAW" => EntityType::Law,
            "NORP" => EntityType::Nationality,
            "LANGUAGE" => EntityType::Language,
            "TIME" => EntityType::Time,
            "DATE" => EntityType::Date,
            "CARDINAL" => EntityType::Cardinal,
            "ORDINAL" => EntityType::Ordinal,
            "QUANTITY" => EntityType::Quantity,
            "PERCENT" => EntityType::Percent,
            "MONEY" => EntityType::Money,
            other => EntityType::Other(other.to_string()),
        }
    }
}

impl From<String> for EntityType {
    fn from(label: String) -> Self {
        EntityType::from(label.as_str())
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        entity_type.label().to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A canonical entity. The name/type pair is fixed at creation; mentions only grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    name: String,
    #[serde(rename = "type")]
    entity_type: EntityType,
    mentions: BTreeSet<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<EntityType>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            mentions: BTreeSet::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_mention(mut self, mention: impl Into<String>) -> Self {
        self.mentions.insert(mention.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn mentions(&self) -> &BTreeSet<String> {
        &self.mentions
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Look up a string attribute, ignoring empty values.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn add_mention(&mut self, mention: impl Into<String>) {
        self.mentions.insert(mention.into());
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn replace_attributes(&mut self, attributes: Map<String, Value>) {
        self.attributes = attributes;
    }

    /// Take over another entity's mentions. The absorbed entity is consumed.
    pub fn absorb(&mut self, other: Entity) {
        self.mentions.extend(other.mentions);
    }
}

/// A directed relationship between two entity names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub description: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub raw_entity_count: usize,
    pub final_entity_count: usize,
    pub relationship_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub metadata: PipelineMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_labels() {
        assert_eq!(EntityType::from("GPE"), EntityType::GeopoliticalEntity);
        assert_eq!(EntityType::from("WORK_OF_ART").label(), "WORK_OF_ART");
        assert_eq!(
            EntityType::from("MYSTERY"),
            EntityType::Other("MYSTERY".to_string())
        );
        assert_eq!(EntityType::from("MYSTERY").class(), TypeClass::Unlisted);
        assert_eq!(EntityType::Date.class(), TypeClass::Skip);
        assert_eq!(EntityType::Law.class(), TypeClass::Keep);
    }

    #[test]
    fn test_entity_serializes_type_as_label() {
        let entity = Entity::new("Scotland Yard", "ORG").with_mention("Scotland Yard");
        let json = serde_json::to_value(&entity).unwrap();

        assert_eq!(json["name"], "Scotland Yard");
        assert_eq!(json["type"], "ORG");
        assert_eq!(json["mentions"], serde_json::json!(["Scotland Yard"]));
        assert!(json["attributes"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_absorb_unions_mentions() {
        let mut primary = Entity::new("Marcus Chen", "PERSON").with_mention("Marcus Chen");
        let alias = Entity::new("Marcus", "PERSON").with_mention("Marcus");

        primary.absorb(alias);

        assert_eq!(primary.name(), "Marcus Chen");
        assert_eq!(primary.mentions().len(), 2);
        assert!(primary.mentions().contains("Marcus"));
    }

    #[test]
    fn test_span_wire_names() {
        let span: Span = serde_json::from_str(
            r#"{"text": "Marcus", "label": "PERSON", "start": 4, "end": 10}"#,
        )
        .unwrap();
        assert_eq!(span, Span::new("Marcus", "PERSON", 4, 10));
    }
}
