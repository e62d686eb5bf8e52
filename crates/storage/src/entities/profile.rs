//! Profile entity definitions

use serde::{Deserialize, Serialize};

use super::user::UserType;

/// Per-user profile. Exactly one per user, replaced wholesale on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Patient(PatientProfile),
    Researcher(ResearcherProfile),
}

impl Profile {
    pub fn user_type(&self) -> UserType {
        match self {
            Profile::Patient(_) => UserType::Patient,
            Profile::Researcher(_) => UserType::Researcher,
        }
    }

    pub fn as_patient(&self) -> Option<&PatientProfile> {
        match self {
            Profile::Patient(profile) => Some(profile),
            Profile::Researcher(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[serde(default)]
    pub additional_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearcherProfile {
    pub specialty: String,
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

impl From<PatientProfile> for Profile {
    fn from(profile: PatientProfile) -> Self {
        Profile::Patient(profile)
    }
}

impl From<ResearcherProfile> for Profile {
    fn from(profile: ResearcherProfile) -> Self {
        Profile::Researcher(profile)
    }
}
