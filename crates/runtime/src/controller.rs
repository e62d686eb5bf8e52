//! Application state: who is signed in, what they have saved, and which
//! page they are on.
//!
//! The controller owns no storage of its own. Every change goes through the
//! persistence store first and is mirrored into memory only once it has been
//! saved.

use curalink_auth::{AuthError, NewUser};
use curalink_storage::{
    ClinicalTrial, CreateForumPostRequest, CreateForumReplyRequest, DatabaseError, FavoriteItem,
    ForumPost, PatientProfile, Profile, StorageError, User, UserType,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::AppServices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Landing,
    Login,
    PatientOnboarding,
    ResearcherOnboarding,
    PatientDashboard,
    ResearcherDashboard,
}

impl Page {
    pub fn dashboard_for(user_type: UserType) -> Self {
        match user_type {
            UserType::Patient => Page::PatientDashboard,
            UserType::Researcher => Page::ResearcherDashboard,
        }
    }

    pub fn onboarding_for(user_type: UserType) -> Self {
        match user_type {
            UserType::Patient => Page::PatientOnboarding,
            UserType::Researcher => Page::ResearcherOnboarding,
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no user is signed in")]
    NotAuthenticated,
    #[error("this action needs a patient profile")]
    PatientProfileRequired,
    #[error("only researchers can reply to forum posts")]
    ResearcherRequired,
    #[error("a {profile} profile cannot be saved for a {account} account")]
    ProfileMismatch {
        account: UserType,
        profile: UserType,
    },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The signed-in user and the records loaded for them.
#[derive(Debug, Clone)]
pub struct ActiveUser {
    pub user: User,
    pub profile: Option<Profile>,
    pub favorites: Vec<FavoriteItem>,
    profile_revision: u64,
}

pub struct AppController {
    services: AppServices,
    active: Option<ActiveUser>,
    selected_user_type: Option<UserType>,
    current_page: Page,
    auth_error: Option<String>,
}

impl AppController {
    pub fn new(services: AppServices) -> Self {
        Self {
            services,
            active: None,
            selected_user_type: None,
            current_page: Page::Landing,
            auth_error: None,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.services
    }

    pub fn is_authenticated(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_user(&self) -> Option<&ActiveUser> {
        self.active.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.active.as_ref().map(|active| &active.user)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.active.as_ref().and_then(|active| active.profile.as_ref())
    }

    /// The signed-in user's role, or the role picked before signing up.
    pub fn user_type(&self) -> Option<UserType> {
        self.active
            .as_ref()
            .map(|active| active.user.user_type)
            .or(self.selected_user_type)
    }

    pub fn set_user_type(&mut self, user_type: UserType) {
        self.selected_user_type = Some(user_type);
    }

    pub fn current_page(&self) -> Page {
        self.current_page
    }

    pub fn set_current_page(&mut self, page: Page) {
        self.current_page = page;
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    /// Sign back in from a saved session. Returns whether a user was restored.
    ///
    /// A session pointing at a user the store no longer knows is cleared.
    pub async fn restore(&mut self) -> Result<bool, ControllerError> {
        let Some(user_id) = self.services.sessions.get_session().await? else {
            return Ok(false);
        };

        let Some(user) = self.services.database.find_user_by_id(&user_id).await else {
            warn!(user = %user_id, "saved session refers to an unknown user, clearing it");
            self.services.sessions.clear_session().await?;
            return Ok(false);
        };

        self.activate(user).await;
        info!("session restored");
        Ok(true)
    }

    /// Create an account and sign in. On a rejected signup the reason is
    /// left in [`AppController::auth_error`] and `Ok(false)` is returned.
    pub async fn signup(
        &mut self,
        new_user: NewUser,
        profile: Profile,
    ) -> Result<bool, ControllerError> {
        self.auth_error = None;

        match self.services.authenticator.signup(new_user, profile).await {
            Ok(user) => {
                self.services.sessions.save_session(&user.id).await?;
                self.activate(user).await;
                Ok(true)
            }
            Err(error) => self.reject(error),
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<bool, ControllerError> {
        self.auth_error = None;

        match self.services.authenticator.login(email, password).await {
            Ok(user) => {
                self.services.sessions.save_session(&user.id).await?;
                self.activate(user).await;
                Ok(true)
            }
            Err(error) => self.reject(error),
        }
    }

    pub async fn logout(&mut self) -> Result<(), ControllerError> {
        if let Some(active) = self.active.take() {
            debug!(user = %active.user.id, "signing out");
        }
        self.selected_user_type = None;
        self.auth_error = None;
        self.current_page = Page::Landing;

        self.services.sessions.clear_session().await?;
        Ok(())
    }

    pub fn favorites(&self) -> &[FavoriteItem] {
        self.active
            .as_ref()
            .map(|active| active.favorites.as_slice())
            .unwrap_or_default()
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites().iter().any(|favorite| favorite.id() == id)
    }

    /// Add or remove `item` from the signed-in user's favorites. Returns
    /// whether it is a favorite afterwards.
    pub async fn toggle_favorite(&mut self, item: FavoriteItem) -> Result<bool, ControllerError> {
        let active = self.active.as_mut().ok_or(ControllerError::NotAuthenticated)?;
        let id = item.id().to_owned();

        let favorites = self
            .services
            .database
            .toggle_favorite(&active.user.id, item)
            .await?;

        active.favorites = favorites;
        Ok(active.favorites.iter().any(|favorite| favorite.id() == id))
    }

    /// Replace the signed-in user's profile.
    ///
    /// Fails with a revision conflict if the stored profile changed since it
    /// was loaded here.
    pub async fn save_profile(&mut self, profile: Profile) -> Result<(), ControllerError> {
        let active = self.active.as_mut().ok_or(ControllerError::NotAuthenticated)?;
        if profile.user_type() != active.user.user_type {
            return Err(ControllerError::ProfileMismatch {
                account: active.user.user_type,
                profile: profile.user_type(),
            });
        }

        let revision = self
            .services
            .database
            .save_profile_if(&active.user.id, profile.clone(), active.profile_revision)
            .await?;

        active.profile = Some(profile);
        active.profile_revision = revision;
        Ok(())
    }

    /// Trials for any of the signed-in patient's conditions.
    pub async fn matching_trials(&self) -> Result<Vec<ClinicalTrial>, ControllerError> {
        let patient = self.patient_profile()?;
        if patient.medical_conditions.is_empty() {
            return Ok(Vec::new());
        }

        let query = patient.medical_conditions.join(" OR ");
        Ok(self.services.research.trials.search_trials(&query).await)
    }

    /// A generated explanation of how `trial` fits the signed-in patient.
    pub async fn trial_match_report(&self, trial: &ClinicalTrial) -> Result<String, ControllerError> {
        let patient = self.patient_profile()?;

        Ok(self
            .services
            .research
            .gemini
            .trial_match_report(&describe_patient(patient), &describe_trial(trial))
            .await)
    }

    pub async fn forum_posts(&self, category: Option<&str>) -> Vec<ForumPost> {
        self.services.database.list_forum_posts(category).await
    }

    pub async fn create_forum_post(
        &self,
        title: &str,
        content: &str,
        category: &str,
    ) -> Result<ForumPost, ControllerError> {
        let user = self.user().ok_or(ControllerError::NotAuthenticated)?;

        let post = self
            .services
            .database
            .create_forum_post(CreateForumPostRequest {
                author: user.name.clone(),
                user_type: user.user_type,
                title: title.trim().to_owned(),
                content: content.trim().to_owned(),
                category: category.trim().to_owned(),
            })
            .await?;
        Ok(post)
    }

    /// Answer a forum post. Replies are reserved for researchers.
    pub async fn reply_to_post(
        &self,
        post_id: &str,
        content: &str,
    ) -> Result<ForumPost, ControllerError> {
        let user = self.user().ok_or(ControllerError::NotAuthenticated)?;
        if user.user_type != UserType::Researcher {
            return Err(ControllerError::ResearcherRequired);
        }

        let post = self
            .services
            .database
            .add_forum_reply(
                post_id,
                CreateForumReplyRequest {
                    author: user.name.clone(),
                    content: content.trim().to_owned(),
                },
            )
            .await?;
        Ok(post)
    }

    async fn activate(&mut self, user: User) {
        let database = &self.services.database;
        let profile = database.get_profile_versioned(&user.id).await;
        let favorites = database.get_favorites(&user.id).await;

        self.current_page = Page::dashboard_for(user.user_type);
        self.selected_user_type = Some(user.user_type);
        self.auth_error = None;
        self.active = Some(ActiveUser {
            profile_revision: profile.as_ref().map_or(0, |entry| entry.revision),
            profile: profile.map(|entry| entry.value),
            favorites,
            user,
        });
    }

    fn reject(&mut self, error: AuthError) -> Result<bool, ControllerError> {
        if error.is_user_facing() {
            debug!(%error, "authentication rejected");
            self.auth_error = Some(error.to_string());
            Ok(false)
        } else {
            Err(error.into())
        }
    }

    fn patient_profile(&self) -> Result<&PatientProfile, ControllerError> {
        let active = self.active.as_ref().ok_or(ControllerError::NotAuthenticated)?;
        active
            .profile
            .as_ref()
            .and_then(Profile::as_patient)
            .ok_or(ControllerError::PatientProfileRequired)
    }
}

fn describe_patient(patient: &PatientProfile) -> String {
    format!(
        "Conditions: {}. Additional Info: {}",
        patient.medical_conditions.join(", "),
        patient.additional_info
    )
}

fn describe_trial(trial: &ClinicalTrial) -> String {
    format!(
        "Title: {}\nStatus: {}\nSummary: {}\nEligibility: {}",
        trial.title, trial.status, trial.summary, trial.eligibility
    )
}
