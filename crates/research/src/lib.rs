//! Clients for the public research services CuraLink searches.
//!
//! Every search has two forms. `try_*` returns a [`ResearchResult`] so a
//! confirmed empty result (`Ok(vec![])`) can be told apart from a failure.
//! The plain form logs the failure and degrades to an empty list or a fixed
//! message, which is what the interactive surfaces use.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use curalink_config::AppConfig;

pub mod error;
pub mod experts;
pub mod gemini;
pub mod pubmed;
pub mod trials;

pub use error::{ResearchError, ResearchResult};
pub use experts::{aggregate_experts, ExpertClient, MAX_EXPERTS};
pub use gemini::{GeminiClient, MATCH_REPORT_FALLBACK, SUMMARY_FALLBACK};
pub use pubmed::{ArticleAuthor, ArticleSummary, PubMedClient};
pub use trials::ClinicalTrialsClient;

/// One handle per upstream service, built from the loaded configuration.
#[derive(Clone)]
pub struct ResearchClients {
    pub publications: PubMedClient,
    pub experts: ExpertClient,
    pub trials: ClinicalTrialsClient,
    pub gemini: GeminiClient,
}

impl ResearchClients {
    pub fn from_config(config: &AppConfig) -> ResearchResult<Self> {
        let publications = PubMedClient::new(&config.pubmed)?;
        Ok(Self {
            experts: ExpertClient::new(publications.clone()),
            publications,
            trials: ClinicalTrialsClient::new(&config.clinical_trials)?,
            gemini: GeminiClient::new(&config.gemini)?,
        })
    }
}

pub(crate) fn http_client(timeout_seconds: u64) -> ResearchResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> ResearchResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ResearchError::Status { service, status });
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
