//! ClinicalTrials.gov v2 study search.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use curalink_config::ClinicalTrialsConfig;
use curalink_storage::ClinicalTrial;

use crate::{endpoint, http_client, read_json, ResearchResult};

const SERVICE: &str = "ClinicalTrials.gov";
const PAGE_SIZE: &str = "20";

#[derive(Debug, Default, Deserialize)]
struct StudiesResponse {
    #[serde(default)]
    studies: Vec<Value>,
}

#[derive(Clone)]
pub struct ClinicalTrialsClient {
    http: Client,
    base_url: String,
}

impl ClinicalTrialsClient {
    pub fn new(config: &ClinicalTrialsConfig) -> ResearchResult<Self> {
        Ok(Self {
            http: http_client(config.request_timeout_seconds)?,
            base_url: config.base_url.clone(),
        })
    }

    pub async fn try_search_trials(&self, query: &str) -> ResearchResult<Vec<ClinicalTrial>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .get(endpoint(&self.base_url, "studies"))
            .query(&[
                ("query.term", query),
                ("pageSize", PAGE_SIZE),
                ("format", "json"),
            ])
            .send()
            .await?;

        let parsed: StudiesResponse = read_json(SERVICE, response).await?;
        debug!(query, studies = parsed.studies.len(), "study search complete");

        Ok(parsed.studies.iter().map(trial_from_study).collect())
    }

    /// Trials matching `query`; empty on any failure.
    pub async fn search_trials(&self, query: &str) -> Vec<ClinicalTrial> {
        self.try_search_trials(query)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "failed to fetch clinical trials");
                Vec::new()
            })
    }
}

fn trial_from_study(study: &Value) -> ClinicalTrial {
    let read = |pointer: &str| {
        study
            .pointer(&format!("/protocolSection{pointer}"))
            .and_then(Value::as_str)
    };
    let field = |pointer: &str, default: &str| {
        read(pointer).map_or_else(|| default.to_string(), str::to_string)
    };

    ClinicalTrial {
        id: read("/identificationModule/nctId")
            .map_or_else(|| format!("id_{}", Uuid::new_v4()), str::to_string),
        title: field("/identificationModule/officialTitle", "No title available"),
        summary: field("/descriptionModule/briefSummary", "No summary available."),
        status: field("/statusModule/overallStatus", "Unknown"),
        location: field("/contactsLocationsModule/locations/0/city", "N/A"),
        eligibility: field("/eligibilityModule/eligibilityCriteria", "N/A"),
        contact: field("/contactsLocationsModule/centralContacts/0/email", "N/A"),
    }
}
