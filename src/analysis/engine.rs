use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{
    MIRROR_ANALYSIS_INTRO, MIRROR_ANALYSIS_OUTRO, MIRROR_SYSTEM_PROMPT, ORIGINAL_ANALYSIS_PROMPT,
    ORIGINAL_SYSTEM_PROMPT,
};
use crate::db::models::AnalysisPerspective;
use crate::llm::media::image_mime_for_bytes;
use crate::llm::{perspective_schema, InlineImage, StructuredRequest, VisionModel};

pub const MAX_ELEMENTS: usize = 4;
pub const ORIGINAL_FALLBACK_DESCRIPTION: &str = "Unable to analyze image";
pub const MIRROR_FALLBACK_DESCRIPTION: &str = "Unable to generate mirror analysis";
pub const FALLBACK_MOOD: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPhase {
    Original,
    Mirror,
}

impl AnalysisPhase {
    pub fn label(self) -> &'static str {
        match self {
            AnalysisPhase::Original => "original",
            AnalysisPhase::Mirror => "mirror",
        }
    }
}

/// The model could not be reached or answered with an error. The display
/// text is safe to return to clients; the cause is for server logs only.
#[derive(Debug, thiserror::Error)]
#[error("Failed to analyze image. Please check your Gemini API key and try again.")]
pub struct AnalysisError {
    phase: AnalysisPhase,
    #[source]
    source: anyhow::Error,
}

impl AnalysisError {
    pub fn new(phase: AnalysisPhase, source: anyhow::Error) -> Self {
        Self { phase, source }
    }

    pub fn phase(&self) -> AnalysisPhase {
        self.phase
    }

    pub fn detail(&self) -> String {
        format!("{:#}", self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub original: AnalysisPerspective,
    pub mirror: AnalysisPerspective,
}

/// Runs the literal analysis and then the mirror analysis derived from it.
pub struct AnalysisEngine<M> {
    model: M,
}

impl<M: VisionModel> AnalysisEngine<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    #[cfg(test)]
    pub(crate) fn model(&self) -> &M {
        &self.model
    }

    pub async fn analyze(&self, image: &[u8]) -> Result<AnalysisResult, AnalysisError> {
        let original_raw = self
            .model
            .generate_json(original_request(image))
            .await
            .map_err(|source| AnalysisError::new(AnalysisPhase::Original, source))?;
        let original = parse_perspective(&original_raw, ORIGINAL_FALLBACK_DESCRIPTION);
        if original.description == ORIGINAL_FALLBACK_DESCRIPTION {
            warn!("Original analysis response was unusable; continuing with defaults");
        }

        let mirror_raw = self
            .model
            .generate_json(mirror_request(&original))
            .await
            .map_err(|source| AnalysisError::new(AnalysisPhase::Mirror, source))?;
        let mirror = parse_perspective(&mirror_raw, MIRROR_FALLBACK_DESCRIPTION);

        Ok(AnalysisResult { original, mirror })
    }
}

fn original_request(image: &[u8]) -> StructuredRequest {
    StructuredRequest {
        operation: "original_analysis",
        system_instruction: ORIGINAL_SYSTEM_PROMPT.to_string(),
        prompt: ORIGINAL_ANALYSIS_PROMPT.to_string(),
        image: Some(InlineImage {
            mime_type: image_mime_for_bytes(image),
            data: general_purpose::STANDARD.encode(image),
        }),
        response_schema: perspective_schema(MAX_ELEMENTS),
    }
}

fn mirror_request(original: &AnalysisPerspective) -> StructuredRequest {
    StructuredRequest {
        operation: "mirror_analysis",
        system_instruction: MIRROR_SYSTEM_PROMPT.to_string(),
        prompt: build_mirror_prompt(original),
        image: None,
        response_schema: perspective_schema(MAX_ELEMENTS),
    }
}

pub fn build_mirror_prompt(original: &AnalysisPerspective) -> String {
    format!(
        "{MIRROR_ANALYSIS_INTRO}\n\nOriginal Analysis:\n- Description: {}\n- Elements: {}\n- Mood: {}\n\n{MIRROR_ANALYSIS_OUTRO}",
        original.description,
        original.elements.join(", "),
        original.mood
    )
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Reads `{description, elements, mood}` out of model text. Anything
/// missing, blank or malformed is replaced field by field. Strings are
/// trimmed and non-string elements are skipped.
pub fn parse_perspective(raw: &str, fallback_description: &str) -> AnalysisPerspective {
    let parsed = match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(err) => {
            debug!("Model response is not JSON ({err}); using defaults");
            Value::Null
        }
    };
    // Some responses wrap the object in a single-element array.
    let object = match parsed {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };

    let elements = object
        .get("elements")
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .take(MAX_ELEMENTS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    AnalysisPerspective {
        description: non_empty_string(object.get("description"))
            .unwrap_or_else(|| fallback_description.to_string()),
        elements,
        mood: non_empty_string(object.get("mood")).unwrap_or_else(|| FALLBACK_MOOD.to_string()),
    }
}
