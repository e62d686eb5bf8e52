use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },
    #[error("invalid response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing Gemini API key")]
    MissingApiKey,
    #[error("model response contained no text")]
    EmptyResponse,
}

pub type ResearchResult<T> = Result<T, ResearchError>;
