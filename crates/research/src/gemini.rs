//! Plain-language summaries and trial match reports from Gemini.
//!
//! Each operation makes at most one `generateContent` call. The plain
//! methods never fail: without an API key, or when the call fails, they
//! return a fixed fallback.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use curalink_config::GeminiConfig;

use crate::{endpoint, http_client, read_json, ResearchError, ResearchResult};

const SERVICE: &str = "Gemini";

pub const SUMMARY_FALLBACK: &str = "Sorry, we were unable to generate a summary at this time.";
pub const MATCH_REPORT_FALLBACK: &str = "Could not generate a match report at this time.";

const SUMMARY_INSTRUCTION: &str = "You are a helpful assistant who explains complex medical \
     topics to patients in a clear and concise way.";

const MATCH_REPORT_INSTRUCTION: &str = "You are an AI assistant helping patients understand \
     clinical trials. Your tone should be informative and encouraging, but you must include a \
     disclaimer that this is not medical advice and they should consult their doctor.";

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionList {
    #[serde(default)]
    conditions: Vec<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> ResearchResult<Self> {
        Ok(Self {
            http: http_client(config.request_timeout_seconds)?,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn try_summarize(&self, text: &str) -> ResearchResult<String> {
        let prompt = format!(
            "Summarize the following medical text in simple, easy-to-understand language for a patient. Text: \"{text}\""
        );
        let body = json!({
            "contents": [user_turn(&prompt)],
            "system_instruction": { "parts": [{ "text": SUMMARY_INSTRUCTION }] },
        });

        self.generate(body).await
    }

    /// A patient-friendly summary of `text`, or [`SUMMARY_FALLBACK`].
    pub async fn summarize(&self, text: &str) -> String {
        self.try_summarize(text).await.unwrap_or_else(|error| {
            warn!(%error, "failed to generate summary");
            SUMMARY_FALLBACK.to_string()
        })
    }

    pub async fn try_parse_conditions(&self, text: &str) -> ResearchResult<Vec<String>> {
        let prompt = format!(
            "Extract the key medical conditions from the following text. List only the names of the conditions. Text: \"{text}\""
        );
        let body = json!({
            "contents": [user_turn(&prompt)],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "conditions": {
                            "type": "ARRAY",
                            "items": {
                                "type": "STRING",
                                "description": "A medical condition identified from the text."
                            }
                        }
                    },
                    "required": ["conditions"]
                }
            },
        });

        let raw = self.generate(body).await?;
        let parsed: ConditionList = serde_json::from_str(strip_code_fence(&raw))?;

        Ok(parsed
            .conditions
            .into_iter()
            .map(|condition| condition.trim().to_string())
            .filter(|condition| !condition.is_empty())
            .collect())
    }

    /// Condition names mentioned in free text; empty on failure.
    pub async fn parse_conditions(&self, text: &str) -> Vec<String> {
        self.try_parse_conditions(text).await.unwrap_or_else(|error| {
            warn!(%error, "failed to parse conditions");
            Vec::new()
        })
    }

    pub async fn try_trial_match_report(
        &self,
        patient_info: &str,
        trial_info: &str,
    ) -> ResearchResult<String> {
        let prompt = format!(
            "A patient has the following medical profile:\n\n{patient_info}\n\n\
             Analyze the following clinical trial and explain why it might be a good match for \
             this patient. Focus on the condition, key eligibility criteria, and treatment type. \
             Present the explanation clearly in markdown.\n\nClinical Trial:\n{trial_info}"
        );
        let body = json!({
            "contents": [user_turn(&prompt)],
            "system_instruction": { "parts": [{ "text": MATCH_REPORT_INSTRUCTION }] },
        });

        self.generate(body).await
    }

    /// A markdown explanation of how a trial fits a patient, or [`MATCH_REPORT_FALLBACK`].
    pub async fn trial_match_report(&self, patient_info: &str, trial_info: &str) -> String {
        self.try_trial_match_report(patient_info, trial_info)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "failed to generate trial match report");
                MATCH_REPORT_FALLBACK.to_string()
            })
    }

    async fn generate(&self, body: Value) -> ResearchResult<String> {
        let api_key = self.api_key.as_deref().ok_or(ResearchError::MissingApiKey)?;
        let url = endpoint(
            &self.base_url,
            &format!("models/{}:generateContent", self.model),
        );

        debug!(model = %self.model, "requesting generateContent");
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: GenerateContentResponse = read_json(SERVICE, response).await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ResearchError::EmptyResponse);
        }
        Ok(text)
    }
}

fn user_turn(text: &str) -> Value {
    json!({ "role": "user", "parts": [{ "text": text }] })
}

/// Models occasionally wrap JSON output in a markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
