//! Prompt rule sets and deterministic prompt construction.
//!
//! Rules are plain strings loaded from configuration. Base rules always come
//! first, then the engine's own rules; earlier rules win when the backend sees
//! conflicting instructions, so order is preserved byte for byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine a rule list or default prompt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Chat,
    Route,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Chat => f.write_str("chat"),
            EngineKind::Route => f.write_str("route"),
        }
    }
}

/// Rule lists keyed by engine, layered on shared base rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptRuleSet {
    #[serde(default)]
    pub base: Vec<String>,
    #[serde(default)]
    pub chat: Vec<String>,
    #[serde(default)]
    pub route: Vec<String>,
}

impl PromptRuleSet {
    /// Base rules followed by the engine's rules
    pub fn rules_for(&self, kind: EngineKind) -> Vec<String> {
        let engine = match kind {
            EngineKind::Chat => &self.chat,
            EngineKind::Route => &self.route,
        };
        self.base.iter().chain(engine.iter()).cloned().collect()
    }
}

/// Fallback user request per engine, used when the caller sends a blank prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultUserPrompts {
    #[serde(default)]
    pub chat: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
}

impl DefaultUserPrompts {
    pub fn for_engine(&self, kind: EngineKind) -> Option<&str> {
        match kind {
            EngineKind::Chat => self.chat.as_deref(),
            EngineKind::Route => self.route.as_deref(),
        }
    }

    /// Caller's prompt if it has content, otherwise this engine's default.
    /// None when both are blank.
    pub fn resolve(&self, kind: EngineKind, user_prompt: Option<&str>) -> Option<String> {
        user_prompt
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.for_engine(kind).filter(|p| !p.trim().is_empty()))
            .map(str::to_string)
    }
}

/// Keys the backend must return in schema mode
pub const NARRATIVE_KEYS: [&str; 4] = ["summary", "highlights", "practical", "border_notes"];

const SCHEMA_INSTRUCTIONS: &str = "OUTPUT FORMAT:
Return STRICT JSON with exactly these keys: summary, highlights, practical, border_notes.
- summary: 1-2 sentences.
- highlights: list of {name, why, approx_km_from_start?}.
- practical: list of short tips.
- border_notes: null or short string.
Never copy the FACTS JSON or any other raw structured data into the answer text.";

/// Builds the single prompt string sent to the generation backend
#[derive(Debug, Clone, PartialEq)]
pub struct PromptBuilder {
    rules: Vec<String>,
    schema_mode: bool,
}

impl PromptBuilder {
    pub fn new(rules: Vec<String>, schema_mode: bool) -> Self {
        Self { rules, schema_mode }
    }

    /// Builder for one engine, composed from the configured rule set
    pub fn for_engine(rule_set: &PromptRuleSet, kind: EngineKind, schema_mode: bool) -> Self {
        Self::new(rule_set.rules_for(kind), schema_mode)
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    pub fn schema_mode(&self) -> bool {
        self.schema_mode
    }

    /// Render rules, optional user request and facts into one prompt.
    /// Facts are serialized as-is; a blank user request renders no section.
    pub fn build<F: Serialize>(
        &self,
        user_request: Option<&str>,
        facts: &F,
    ) -> Result<String, serde_json::Error> {
        let facts_json = serde_json::to_string(facts)?;
        let mut sections: Vec<String> = Vec::new();

        if !self.rules.is_empty() {
            let block = self
                .rules
                .iter()
                .map(|r| format!("- {}", r))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Follow ALL these rules:\n{}", block));
        }

        if let Some(request) = user_request.map(str::trim).filter(|r| !r.is_empty()) {
            sections.push(format!("USER REQUEST:\n{}", request));
        }

        sections.push(format!(
            "FACTS (machine-provided, authoritative):\n{}",
            facts_json
        ));

        if self.schema_mode {
            sections.push(SCHEMA_INSTRUCTIONS.to_string());
            sections.push("Return ONLY the JSON object.".to_string());
        } else {
            sections.push("Write the final answer now.".to_string());
        }

        Ok(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule_set() -> PromptRuleSet {
        PromptRuleSet {
            base: vec!["Use only FACTS.".to_string(), "English only.".to_string()],
            chat: vec!["Describe the area.".to_string()],
            route: vec![
                "Mention the via places.".to_string(),
                "Do not invent distances.".to_string(),
            ],
        }
    }

    #[test]
    fn test_rules_for_orders_base_first() {
        let rules = rule_set().rules_for(EngineKind::Route);
        assert_eq!(
            rules,
            vec![
                "Use only FACTS.",
                "English only.",
                "Mention the via places.",
                "Do not invent distances."
            ]
        );
    }

    #[test]
    fn test_rule_block_verbatim() {
        let builder = PromptBuilder::for_engine(&rule_set(), EngineKind::Chat, false);
        let prompt = builder.build(None, &json!({"a": 1})).unwrap();
        assert!(prompt.starts_with(
            "Follow ALL these rules:\n- Use only FACTS.\n- English only.\n- Describe the area.\n\n"
        ));
        assert!(prompt.ends_with("Write the final answer now."));
    }

    #[test]
    fn test_blank_user_request_renders_nothing() {
        let builder = PromptBuilder::new(vec![], false);
        let prompt = builder.build(Some("   "), &json!({})).unwrap();
        assert!(!prompt.contains("USER REQUEST"));
        assert!(!prompt.contains("Follow ALL"));

        let prompt = builder.build(Some("  find coffee "), &json!({})).unwrap();
        assert!(prompt.contains("USER REQUEST:\nfind coffee\n\n"));
    }

    #[test]
    fn test_facts_embedded_unchanged() {
        let builder = PromptBuilder::new(vec![], false);
        let facts = json!({"radius_m": 3000, "name": "Caffè \"Roma\""});
        let prompt = builder.build(None, &facts).unwrap();
        assert!(prompt.contains(&serde_json::to_string(&facts).unwrap()));
    }

    #[test]
    fn test_schema_mode_instructions() {
        let builder = PromptBuilder::new(vec!["r".to_string()], true);
        let prompt = builder.build(None, &json!({})).unwrap();
        for key in NARRATIVE_KEYS {
            assert!(prompt.contains(key));
        }
        assert!(prompt.contains("Never copy the FACTS JSON"));
        assert!(prompt.ends_with("Return ONLY the JSON object."));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::for_engine(&rule_set(), EngineKind::Route, true);
        let facts = json!({"via_summary": ["Lyon", "Turin"]});
        assert_eq!(
            builder.build(Some("scenic"), &facts).unwrap(),
            builder.build(Some("scenic"), &facts).unwrap()
        );
    }

    #[test]
    fn test_default_user_prompt_resolution() {
        let defaults = DefaultUserPrompts {
            chat: Some("What is worth seeing here?".to_string()),
            route: None,
        };
        assert_eq!(
            defaults.resolve(EngineKind::Chat, Some(" ")),
            Some("What is worth seeing here?".to_string())
        );
        assert_eq!(
            defaults.resolve(EngineKind::Chat, Some("museums")),
            Some("museums".to_string())
        );
        assert_eq!(defaults.resolve(EngineKind::Route, None), None);
    }
}
