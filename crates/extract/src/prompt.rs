use crate::schema::Entity;

pub const SYSTEM_PROMPT: &str = "You are an expert literary analyst. Extract structured information in valid JSON format only. No markdown, no explanation.";

pub fn build_enrichment_prompt(entity: &Entity, scene_text: &str) -> String {
    let mentions: Vec<&str> = entity.mentions().iter().map(String::as_str).collect();

    format!(
        r#"Given this detective fiction scene, provide rich contextual information for the entity "{name}".

SCENE:
{scene}

ENTITY TO ANALYZE:
- Name: {name}
- Type: {entity_type}
- Mentions in text: {mentions}

Extract relevant attributes for this entity based on the context. Output ONLY a JSON object with exactly these keys:
{{
  "description": "brief description from context",
  "role": "detective/suspect/victim/witness/location/object/etc",
  "attributes": {{
    "key": "value"
  }}
}}

Examples of attributes you might include:
- For people: occupation, motive, alibi, behavior, emotional_state
- For locations: significance, atmosphere, accessibility
- For objects: type (weapon/evidence/clue), owner, condition

Output ONLY the JSON object, no markdown, no explanations.

Only output valid JSON for "{name}":"#,
        name = entity.name(),
        scene = scene_text,
        entity_type = entity.entity_type(),
        mentions = mentions.join(", "),
    )
}

/// "Name (TYPE) - Role: r - description", omitting missing parts.
pub fn entity_context(entity: &Entity) -> String {
    let mut context = format!("{} ({})", entity.name(), entity.entity_type());
    if let Some(role) = entity.attribute_str("role") {
        context.push_str(&format!(" - Role: {}", role));
    }
    if let Some(description) = entity.attribute_str("description") {
        context.push_str(&format!(" - {}", description));
    }
    context
}

pub fn build_relationship_prompt(entity_a: &Entity, entity_b: &Entity, scene_text: &str) -> String {
    format!(
        r#"Analyze if these two entities have any relationships in this scene. Use careful reasoning.

SCENE:
{scene}

Entity A: {context_a}
Entity B: {context_b}

Think step-by-step:
1. What does the text say about how A and B interact?
2. Based on their roles, what relationships are possible?
3. Who is the ACTOR (does the action) and who is ACTED UPON (receives the action)?
4. Does the evidence clearly support this relationship direction?

KEY REASONING RULES:
- Victims (dead) cannot perform actions after death (can't investigate, kill, interrogate)
- Detectives investigate/interrogate others (detective -> suspect/victim)
- Witnesses observe events (witness -> event/person)
- "killed" means: killer -> victim (NOT victim -> anyone)
- "investigated" means: investigator -> subject (NOT subject -> investigator)
- "suspected" means: detective -> suspect (NOT suspect -> detective)

Output ONLY relationships you are confident about. Output valid JSON:
{{
  "reasoning": "brief explanation of what the text shows",
  "relationships": [
    {{"source": "{name_a}", "target": "{name_b}", "type": "relationship_type", "evidence": "quote from text"}}
  ]
}}

If NO clear relationship exists between A and B, return an empty relationships list.
Use exact names: "{name_a}" and "{name_b}"

Only output valid JSON:"#,
        scene = scene_text,
        context_a = entity_context(entity_a),
        context_b = entity_context(entity_b),
        name_a = entity_a.name(),
        name_b = entity_b.name(),
    )
}
