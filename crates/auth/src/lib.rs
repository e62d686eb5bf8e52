use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use curalink_storage::{CreateUserRequest, Database, DatabaseError, Profile, User, UserType};
use thiserror::Error;
use tracing::{debug, info};

/// Signs users up and checks their passwords against the persistence store.
#[derive(Clone)]
pub struct Authenticator {
    database: Database,
}

/// Failures a user can act on display the message shown to them.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("An account with this email already exists.")]
    EmailAlreadyExists,
    #[error("User not found. Please check your email or sign up.")]
    UserNotFound,
    #[error("Incorrect password. Please try again.")]
    IncorrectPassword,
    #[error("Please enter your {0}.")]
    MissingField(&'static str),
    #[error("A {profile} profile cannot be attached to a {account} account.")]
    ProfileMismatch {
        account: UserType,
        profile: UserType,
    },
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("database error: {0}")]
    Database(#[source] DatabaseError),
}

impl AuthError {
    /// Whether the message is meant for the person at the keyboard rather
    /// than the logs.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, AuthError::PasswordHash(_) | AuthError::Database(_))
    }
}

impl From<DatabaseError> for AuthError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::EmailAlreadyExists => AuthError::EmailAlreadyExists,
            other => AuthError::Database(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub user_type: UserType,
}

impl Authenticator {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Create an account together with its onboarding profile.
    pub async fn signup(&self, new_user: NewUser, profile: Profile) -> Result<User, AuthError> {
        let name = new_user.name.trim();
        let email = new_user.email.trim();
        if name.is_empty() {
            return Err(AuthError::MissingField("name"));
        }
        if email.is_empty() {
            return Err(AuthError::MissingField("email"));
        }
        if new_user.password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }
        if profile.user_type() != new_user.user_type {
            return Err(AuthError::ProfileMismatch {
                account: new_user.user_type,
                profile: profile.user_type(),
            });
        }

        if self.database.find_user_by_email(email).await.is_some() {
            debug!(email, "signup rejected, email taken");
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(&new_user.password)?;

        // The store repeats the email check under its lock, so a concurrent
        // signup for the same address still fails with EmailAlreadyExists.
        let user = self
            .database
            .add_user_with_profile(
                CreateUserRequest {
                    name: name.to_owned(),
                    email: email.to_owned(),
                    password_hash,
                    user_type: new_user.user_type,
                },
                profile,
            )
            .await?;

        info!(user = %user.id, "account created");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.database.find_user_by_email(email).await else {
            return Err(AuthError::UserNotFound);
        };

        verify_password(password, &user.password_hash)?;

        debug!(user = %user.id, "password accepted");
        Ok(user)
    }
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> Result<(), AuthError> {
    let stored_hash = PasswordHash::new(stored)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &stored_hash)
        .map_err(|_| AuthError::IncorrectPassword)
}
