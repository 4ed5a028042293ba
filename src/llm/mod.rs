pub mod gemini;
pub mod media;

use std::future::Future;

use serde_json::{json, Value};

pub use gemini::{GeminiClient, GeminiSettings};

#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64, standard alphabet.
    pub data: String,
}

/// One structured-output call to a multimodal model.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub operation: &'static str,
    pub system_instruction: String,
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub response_schema: Value,
}

/// The external model the analysis engine talks to.
///
/// `generate_json` returns the raw text the model produced. Transport
/// failures (unreachable service, timeout, error status) are errors; a body
/// that is not the requested JSON is not.
pub trait VisionModel: Send + Sync + 'static {
    fn generate_json(
        &self,
        request: StructuredRequest,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
}

pub fn perspective_schema(max_elements: usize) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "description": { "type": "STRING" },
            "elements": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "maxItems": max_elements.to_string()
            },
            "mood": { "type": "STRING" }
        },
        "required": ["description", "elements", "mood"]
    })
}
