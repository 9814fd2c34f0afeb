use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::form::form_model::{FormField, MappedField};
use crate::mapping::mapper::{BackendAnalysis, MappingBackend, MappingError};

// ============================================================================
// LLM backend (Ollama-compatible /api/generate endpoint)
// ============================================================================

const MAPPING_SYSTEM: &str = "\
You map job application form fields to values from a user profile.
Return ONLY valid JSON matching this schema, no markdown, no explanation:
{
  \"fields\": [
    {
      \"selector\": \"<selector from input, unchanged>\",
      \"mapped_value\": \"<value to fill from the profile>\",
      \"confidence\": <0.0-1.0>,
      \"source_attribute\": \"<dotted profile path, e.g. personal_info.email>\"
    }
  ],
  \"unmapped_labels\": [\"<labels of fields you could not map>\"]
}

Rules:
- For each field, find the best matching value from the user profile.
- Confidence 1.0 for exact matches, 0.8-0.9 for strong semantic matches,
  0.5-0.7 for uncertain ones. The user reviews everything before filling.
- Omit fields you cannot map and list their labels in unmapped_labels.
- For select/radio fields, pick the option text that best matches the profile.
- For combobox fields with an empty options list, give the plain profile text;
  it is fuzzy-matched against the live options when the dropdown opens.
- For file upload fields, use mapped_value \"resume\" and source_attribute \"resume\".";

pub struct LlmMapper {
    pub endpoint: String,
    pub model: String,
    client: reqwest::Client,
}

impl LlmMapper {
    pub fn new(endpoint: &str, model: &str) -> LlmMapper {
        LlmMapper {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_prompt(&self, fields: &[FormField], context: &str) -> String {
        let fields_json =
            serde_json::to_string_pretty(fields).unwrap_or_else(|_| "[]".to_string());
        format!(
            "{system}\n\n=== EXTRACTED FORM FIELDS ===\n{fields_json}\n\n{context}\n\n\
             Map the form fields above to profile values. Return the JSON response.",
            system = MAPPING_SYSTEM,
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize, Default)]
struct LlmAnalysis {
    #[serde(default)]
    fields: Vec<LlmFieldProposal>,
    #[serde(default)]
    unmapped_labels: Vec<String>,
}

#[derive(Deserialize)]
struct LlmFieldProposal {
    selector: String,
    #[serde(default)]
    mapped_value: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    source_attribute: String,
}

#[async_trait]
impl MappingBackend for LlmMapper {
    async fn map_fields(
        &self,
        fields: &[FormField],
        context: &str,
    ) -> Result<BackendAnalysis, MappingError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: self.build_prompt(fields, context),
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| MappingError::Unreachable(e.to_string()))?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MappingError::Unreachable(e.to_string()))?;

        let analysis = match parse_analysis(&body.response) {
            Some(parsed) => parsed,
            None => {
                // A garbled response is not fatal: degrade to an all-unmapped
                // analysis and let the user fill by hand.
                error!(
                    "failed to parse mapping response as JSON: {}",
                    &body.response.chars().take(200).collect::<String>()
                );
                return Ok(BackendAnalysis {
                    fields: Vec::new(),
                    unmapped_labels: fields.iter().map(|f| f.label.clone()).collect(),
                });
            }
        };

        let mut result = BackendAnalysis {
            fields: Vec::new(),
            unmapped_labels: analysis.unmapped_labels,
        };
        for proposal in analysis.fields {
            let Some(field) = fields.iter().find(|f| f.selector == proposal.selector) else {
                warn!(selector = %proposal.selector, "mapping for unknown selector dropped");
                continue;
            };
            result.fields.push(MappedField {
                mapped_value: proposal.mapped_value,
                confidence: proposal.confidence,
                source_attribute: proposal.source_attribute,
                ..MappedField::unmapped(field)
            });
        }
        Ok(result)
    }
}

/// Parse the model output, tolerating a fenced ```json block around the
/// payload.
fn parse_analysis(text: &str) -> Option<LlmAnalysis> {
    if let Ok(parsed) = serde_json::from_str(text) {
        return Some(parsed);
    }
    let inner = fenced_json(text)?;
    serde_json::from_str(inner).ok()
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = body.find("```")?;
    Some(body[..end].trim())
}
