//! Favorite entity definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::research::{ClinicalTrial, Expert, Publication};

/// A bookmarked trial, publication or expert.
///
/// The variant is stored as an explicit `kind` tag and is never inferred
/// from which fields happen to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FavoriteItem {
    Trial(ClinicalTrial),
    Publication(Publication),
    Expert(Expert),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteKind {
    Trial,
    Publication,
    Expert,
}

impl FavoriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteKind::Trial => "trial",
            FavoriteKind::Publication => "publication",
            FavoriteKind::Expert => "expert",
        }
    }
}

impl fmt::Display for FavoriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FavoriteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trial" | "trials" => Ok(FavoriteKind::Trial),
            "publication" | "publications" => Ok(FavoriteKind::Publication),
            "expert" | "experts" => Ok(FavoriteKind::Expert),
            other => Err(format!("unknown favorite kind '{other}'")),
        }
    }
}

impl FavoriteItem {
    /// Identity used for membership checks.
    pub fn id(&self) -> &str {
        match self {
            FavoriteItem::Trial(trial) => &trial.id,
            FavoriteItem::Publication(publication) => &publication.id,
            FavoriteItem::Expert(expert) => &expert.id,
        }
    }

    pub fn kind(&self) -> FavoriteKind {
        match self {
            FavoriteItem::Trial(_) => FavoriteKind::Trial,
            FavoriteItem::Publication(_) => FavoriteKind::Publication,
            FavoriteItem::Expert(_) => FavoriteKind::Expert,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FavoriteItem::Trial(trial) => &trial.title,
            FavoriteItem::Publication(publication) => &publication.title,
            FavoriteItem::Expert(expert) => &expert.name,
        }
    }
}

impl From<ClinicalTrial> for FavoriteItem {
    fn from(trial: ClinicalTrial) -> Self {
        FavoriteItem::Trial(trial)
    }
}

impl From<Publication> for FavoriteItem {
    fn from(publication: Publication) -> Self {
        FavoriteItem::Publication(publication)
    }
}

impl From<Expert> for FavoriteItem {
    fn from(expert: Expert) -> Self {
        FavoriteItem::Expert(expert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial_with_journal_like_fields() -> ClinicalTrial {
        ClinicalTrial {
            id: "NCT0001".into(),
            title: "Trial".into(),
            summary: "Summary".into(),
            status: "Recruiting".into(),
            location: "Boston".into(),
            eligibility: "18+".into(),
            contact: "trial@example.com".into(),
        }
    }

    #[test]
    fn favorite_round_trips_through_kind_tag() {
        let item = FavoriteItem::from(trial_with_journal_like_fields());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "trial");

        let restored: FavoriteItem = serde_json::from_value(json).unwrap();
        assert_eq!(restored.kind(), FavoriteKind::Trial);
        assert_eq!(restored.id(), "NCT0001");
    }

    #[test]
    fn kind_tag_wins_over_field_shape() {
        let json = serde_json::json!({
            "kind": "publication",
            "id": "123",
            "title": "Paper",
            "authors": ["A"],
            "journal": "Journal",
            "year": 2020,
            "url": "https://example.org/123",
            "status": "ignored"
        });

        let item: FavoriteItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.kind(), FavoriteKind::Publication);
    }

    #[test]
    fn untagged_payload_is_rejected() {
        let json = serde_json::json!({
            "id": "NCT0001",
            "title": "Trial",
            "summary": "Summary",
            "status": "Recruiting",
            "location": "Boston",
            "eligibility": "18+",
            "contact": "trial@example.com"
        });

        assert!(serde_json::from_value::<FavoriteItem>(json).is_err());
    }
}
