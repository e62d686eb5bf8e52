//! Records returned by the research clients and bookmarked as favorites.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalTrial {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub status: String,
    pub location: String,
    pub eligibility: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub journal: String,
    pub year: i32,
    pub url: String,
}

/// An author surfaced through publication co-authorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expert {
    pub id: String,
    pub name: String,
    pub title: String,
    pub specialties: Vec<String>,
    /// `None` when the source has no location data for this person.
    pub location: Option<String>,
    pub publications: u32,
    pub avatar_url: String,
}

impl Expert {
    pub fn location_label(&self) -> &str {
        self.location.as_deref().unwrap_or("Unknown")
    }
}
