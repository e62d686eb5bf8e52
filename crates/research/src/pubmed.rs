//! PubMed search through the NCBI E-utilities.
//!
//! A search is two calls: `esearch` resolves the term to article ids, then a
//! single batched `esummary` fetches the metadata for all of them.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use curalink_config::PubMedConfig;
use curalink_storage::Publication;

use crate::{endpoint, http_client, read_json, ResearchResult};

const SERVICE: &str = "PubMed";
const PUBLICATION_LIMIT: u32 = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleAuthor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// The subset of an `esummary` document CuraLink reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<ArticleAuthor>,
    /// Journal name.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub pubdate: Option<String>,
}

// esummary sends `null` for absent lists and names.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryResponse {
    // Keyed by article id, plus a `uids` array we ignore.
    #[serde(default)]
    result: HashMap<String, Value>,
}

#[derive(Clone)]
pub struct PubMedClient {
    http: Client,
    base_url: String,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig) -> ResearchResult<Self> {
        Ok(Self {
            http: http_client(config.request_timeout_seconds)?,
            base_url: config.base_url.clone(),
        })
    }

    pub async fn try_search_publications(&self, query: &str) -> ResearchResult<Vec<Publication>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.search_ids(query, PUBLICATION_LIMIT).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let articles = self.summaries(&ids).await?;
        let current_year = Utc::now().year();
        Ok(articles
            .into_iter()
            .map(|article| publication_from_summary(article, current_year))
            .collect())
    }

    /// Publications matching `query`; empty on any failure.
    pub async fn search_publications(&self, query: &str) -> Vec<Publication> {
        self.try_search_publications(query)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "failed to fetch publications from PubMed");
                Vec::new()
            })
    }

    pub(crate) async fn search_ids(&self, term: &str, limit: u32) -> ResearchResult<Vec<String>> {
        let retmax = limit.to_string();
        let response = self
            .http
            .get(endpoint(&self.base_url, "esearch.fcgi"))
            .query(&[
                ("db", "pubmed"),
                ("term", term),
                ("retmode", "json"),
                ("retmax", retmax.as_str()),
            ])
            .send()
            .await?;

        let parsed: SearchResponse = read_json(SERVICE, response).await?;
        debug!(term, hits = parsed.esearchresult.idlist.len(), "esearch complete");
        Ok(parsed.esearchresult.idlist)
    }

    /// Summaries for `ids`, in the same order. Ids the service has no
    /// document for are skipped.
    pub(crate) async fn summaries(&self, ids: &[String]) -> ResearchResult<Vec<ArticleSummary>> {
        let joined = ids.join(",");
        let response = self
            .http
            .get(endpoint(&self.base_url, "esummary.fcgi"))
            .query(&[("db", "pubmed"), ("id", joined.as_str()), ("retmode", "json")])
            .send()
            .await?;

        let mut parsed: SummaryResponse = read_json(SERVICE, response).await?;

        let mut articles = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(document) = parsed.result.remove(id) else {
                debug!(id, "no summary returned for article");
                continue;
            };

            match serde_json::from_value::<ArticleSummary>(document) {
                Ok(mut article) => {
                    if article.uid.is_empty() {
                        article.uid = id.clone();
                    }
                    articles.push(article);
                }
                Err(error) => debug!(id, %error, "skipping malformed article summary"),
            }
        }

        Ok(articles)
    }
}

fn publication_from_summary(article: ArticleSummary, current_year: i32) -> Publication {
    let authors: Vec<String> = article
        .authors
        .into_iter()
        .map(|author| author.name)
        .filter(|name| !name.trim().is_empty())
        .collect();

    Publication {
        url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", article.uid),
        id: article.uid,
        title: non_empty(article.title).unwrap_or_else(|| "No title found".to_string()),
        authors: if authors.is_empty() {
            vec!["Unknown Author".to_string()]
        } else {
            authors
        },
        journal: non_empty(article.source).unwrap_or_else(|| "Unknown Journal".to_string()),
        year: article
            .pubdate
            .as_deref()
            .and_then(publication_year)
            .unwrap_or(current_year),
    }
}

/// Year from the leading four characters of a PubMed date such as `2023 Mar 15`.
fn publication_year(pubdate: &str) -> Option<i32> {
    let prefix: String = pubdate.chars().take(4).collect();
    prefix.trim().parse().ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
