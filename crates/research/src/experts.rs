//! Expert discovery by counting authorship across PubMed search results.

use std::collections::HashMap;

use tracing::warn;

use curalink_storage::Expert;

use crate::pubmed::{ArticleSummary, PubMedClient};
use crate::ResearchResult;

pub const MAX_EXPERTS: usize = 21;

const ARTICLE_SAMPLE: u32 = 50;
const SPECIALTY_LIMIT: usize = 2;

#[derive(Clone)]
pub struct ExpertClient {
    pubmed: PubMedClient,
}

impl ExpertClient {
    pub fn new(pubmed: PubMedClient) -> Self {
        Self { pubmed }
    }

    pub async fn try_search_experts(&self, query: &str) -> ResearchResult<Vec<Expert>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.pubmed.search_ids(query, ARTICLE_SAMPLE).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let articles = self.pubmed.summaries(&ids).await?;
        Ok(aggregate_experts(&articles))
    }

    /// Experts for `query`; empty on any failure.
    pub async fn search_experts(&self, query: &str) -> Vec<Expert> {
        self.try_search_experts(query)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "failed to search for experts via PubMed");
                Vec::new()
            })
    }
}

#[derive(Default)]
struct Tally {
    count: u32,
    venues: Vec<String>,
}

/// Rank the authors of `articles` by how many of them they appear on.
///
/// Authors keep the order they were first seen in, so ties rank by first
/// appearance. Each author's specialties are the first two distinct journals
/// they published in. At most [`MAX_EXPERTS`] are returned.
pub fn aggregate_experts(articles: &[ArticleSummary]) -> Vec<Expert> {
    let mut order: Vec<&str> = Vec::new();
    let mut tallies: HashMap<&str, Tally> = HashMap::new();

    for article in articles {
        let venue = article
            .source
            .as_deref()
            .filter(|source| !source.trim().is_empty());

        for author in &article.authors {
            let name = author.name.as_str();
            if name.trim().is_empty() {
                continue;
            }

            let tally = tallies.entry(name).or_insert_with(|| {
                order.push(name);
                Tally::default()
            });
            tally.count += 1;
            if let Some(venue) = venue {
                if !tally.venues.iter().any(|known| known == venue) {
                    tally.venues.push(venue.to_owned());
                }
            }
        }
    }

    let mut experts: Vec<Expert> = order
        .into_iter()
        .filter_map(|name| {
            let tally = tallies.remove(name)?;
            Some(Expert {
                id: expert_id(name),
                name: name.to_owned(),
                title: "Researcher".to_string(),
                specialties: tally.venues.into_iter().take(SPECIALTY_LIMIT).collect(),
                location: None,
                publications: tally.count,
                avatar_url: format!(
                    "https://api.dicebear.com/8.x/avataaars/svg?seed={}",
                    urlencoding::encode(name)
                ),
            })
        })
        .collect();

    // `sort_by` is stable, which preserves first-seen order among ties.
    experts.sort_by(|a, b| b.publications.cmp(&a.publications));
    experts.truncate(MAX_EXPERTS);
    experts
}

fn expert_id(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("expert_{slug}")
}
