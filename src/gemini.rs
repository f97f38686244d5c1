//! Gemini REST client used to draft project phases.

use serde_json::{Value, json};
use std::time::Duration;

use crate::drafting::{DraftRequest, PhaseDraft, PhaseDrafter, parse_phase_drafts, response_schema};
use crate::error::{TrackerError, TrackerResult};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const SERVICE: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct GeminiDrafter {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl GeminiDrafter {
    pub fn new(config: GeminiConfig) -> TrackerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TrackerError::Validation("Gemini API key is missing".to_string()));
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            agent,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// JSON body for a `generateContent` call.
pub fn request_body(request: &DraftRequest) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction() }] },
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt() }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        }
    })
}

/// Text of the first candidate, all parts joined.
pub fn response_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

impl PhaseDrafter for GeminiDrafter {
    fn name(&self) -> &str {
        SERVICE
    }

    fn draft(&self, request: &DraftRequest) -> TrackerResult<Vec<PhaseDraft>> {
        tracing::debug!(
            endpoint = %self.endpoint,
            first_phase = request.is_first_phase(),
            members = request.members.len(),
            "requesting phase draft"
        );
        let response = self
            .agent
            .post(&self.endpoint)
            .set("x-goog-api-key", &self.api_key)
            .send_json(request_body(request))
            .map_err(|e| TrackerError::from_http(SERVICE, e))?;
        let payload: Value = response
            .into_json()
            .map_err(|e| TrackerError::upstream(SERVICE, format!("failed to read response: {e}")))?;
        let text = response_text(&payload)
            .ok_or_else(|| TrackerError::upstream(SERVICE, "no response from AI"))?;
        let drafts = parse_phase_drafts(&text)?;
        tracing::info!(phases = drafts.len(), "received phase draft");
        Ok(drafts)
    }
}
