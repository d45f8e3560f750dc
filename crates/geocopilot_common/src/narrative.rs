//! Structured narrative returned by the generation backend in schema mode.
//!
//! Parsing never fails: a reply that cannot be read as the four-field
//! structure becomes `NarrativeReply::Degraded` and still renders to prose.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Characters of raw reply kept as the summary of a degraded narrative
pub const DEGRADED_SUMMARY_CHARS: usize = 400;

/// Maximum bullets rendered per section
pub const MAX_SECTION_ITEMS: usize = 6;

/// Text used when the backend produced nothing usable
pub const EMPTY_SUMMARY: &str = "No summary.";

/// One highlighted place in the narrative
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub why: Option<String>,
    /// Kept as raw JSON; only numbers are rendered
    #[serde(default, alias = "approx_km_from_start")]
    pub approx_km: Option<Value>,
}

/// Four-field structure the backend is asked to return
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedNarrative {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default)]
    pub practical: Vec<String>,
    #[serde(default)]
    pub border_notes: Option<String>,
}

/// Outcome of reading a schema-mode reply
#[derive(Debug, Clone, PartialEq)]
pub enum NarrativeReply {
    Parsed(GeneratedNarrative),
    Degraded(String),
}

impl NarrativeReply {
    /// Read a raw backend reply: strict parse, then JSON embedded in prose, then degrade
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();

        if let Ok(narrative) = serde_json::from_str::<GeneratedNarrative>(text) {
            return NarrativeReply::Parsed(narrative);
        }

        if let Some(json_text) = extract_json(text) {
            match serde_json::from_str::<Value>(json_text) {
                Ok(v) if v.is_object() => {
                    debug!("Parsed narrative via lenient field extraction");
                    return NarrativeReply::Parsed(value_to_narrative(&v));
                }
                Ok(_) => {}
                Err(e) => debug!("Embedded JSON did not parse: {}", e),
            }
        }

        warn!(
            "Generation reply is not a narrative object ({} chars), degrading to raw text",
            text.chars().count()
        );
        NarrativeReply::Degraded(text.to_string())
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, NarrativeReply::Degraded(_))
    }

    /// Collapse into a renderable narrative
    pub fn into_narrative(self) -> GeneratedNarrative {
        match self {
            NarrativeReply::Parsed(n) => n,
            NarrativeReply::Degraded(raw) => {
                let summary: String = raw.chars().take(DEGRADED_SUMMARY_CHARS).collect();
                GeneratedNarrative {
                    summary: if summary.is_empty() {
                        EMPTY_SUMMARY.to_string()
                    } else {
                        summary
                    },
                    highlights: Vec::new(),
                    practical: Vec::new(),
                    border_notes: None,
                }
            }
        }
    }

    pub fn render(self) -> String {
        self.into_narrative().render()
    }
}

impl GeneratedNarrative {
    /// Prose for the caller: summary, then Highlights, Practical tips and
    /// Border notes, each omitted when it has no data.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let summary = self.summary.trim();
        if !summary.is_empty() {
            parts.push(summary.to_string());
        }

        if !self.highlights.is_empty() {
            parts.push("\nHighlights:".to_string());
            for h in self.highlights.iter().take(MAX_SECTION_ITEMS) {
                parts.push(render_highlight(h));
            }
        }

        let tips: Vec<&str> = self
            .practical
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !tips.is_empty() {
            parts.push("\nPractical tips:".to_string());
            for tip in tips.into_iter().take(MAX_SECTION_ITEMS) {
                parts.push(format!("• {}", tip));
            }
        }

        if let Some(notes) = self.border_notes.as_deref().map(str::trim) {
            if !notes.is_empty() {
                parts.push(format!("\nBorder notes: {}", notes));
            }
        }

        let text = parts.join("\n").trim().to_string();
        if text.is_empty() {
            EMPTY_SUMMARY.to_string()
        } else {
            text
        }
    }
}

fn render_highlight(h: &Highlight) -> String {
    let name = h
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("Point of interest");
    let why = h.why.as_deref().map(str::trim).unwrap_or("");
    let tail = match &h.approx_km {
        Some(Value::Number(km)) => format!(" (~{} km from start)", km),
        _ => String::new(),
    };
    format!("• {}: {}{}", name, why, tail)
        .trim()
        .trim_end_matches(':')
        .to_string()
}

/// Outermost `{...}` span when the model wrapped JSON in prose
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn non_null_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

/// Field-by-field conversion that tolerates nulls and wrong item types
fn value_to_narrative(v: &Value) -> GeneratedNarrative {
    let summary = non_null_str(v.get("summary")).unwrap_or_default();

    let highlights = v
        .get("highlights")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|h| match h {
                    Value::Object(_) => Some(Highlight {
                        name: non_null_str(h.get("name")),
                        why: non_null_str(h.get("why")),
                        approx_km: h
                            .get("approx_km_from_start")
                            .or_else(|| h.get("approx_km"))
                            .filter(|km| !km.is_null())
                            .cloned(),
                    }),
                    Value::String(s) => Some(Highlight {
                        name: Some(s.clone()),
                        ..Highlight::default()
                    }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let practical = v
        .get("practical")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|x| x.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    GeneratedNarrative {
        summary,
        highlights,
        practical,
        border_notes: non_null_str(v.get("border_notes")),
    }
}
