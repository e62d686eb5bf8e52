use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use curalink_auth::{AuthError, Authenticator, NewUser};
use curalink_storage::{
    Database, LocalStorage, MemoryStorage, PatientProfile, Profile, ResearcherProfile,
    StorageError, StorageResult, UserType,
};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestContext {
    storage: Arc<dyn LocalStorage>,
    authenticator: Authenticator,
}

impl TestContext {
    async fn new() -> Self {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let authenticator = Authenticator::new(Database::load(storage.clone()).await);
        Self {
            storage,
            authenticator,
        }
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

fn patient(email: &str, password: &str) -> NewUser {
    NewUser {
        name: "Pat Patient".into(),
        email: email.into(),
        password: password.into(),
        user_type: UserType::Patient,
    }
}

fn patient_profile() -> Profile {
    Profile::Patient(PatientProfile {
        medical_conditions: vec!["Asthma".into()],
        additional_info: String::new(),
    })
}

fn researcher_profile() -> Profile {
    Profile::Researcher(ResearcherProfile {
        specialty: "Pulmonology".into(),
        institution: "General Hospital".into(),
        orcid: None,
    })
}

#[tokio::test]
async fn signup_stores_user_profile_and_hashed_password() -> TestResult {
    let ctx = TestContext::new().await;

    let user = ctx
        .authenticator()
        .signup(patient("pat@example.com", "s3cret"), patient_profile())
        .await?;

    assert_eq!(user.user_type, UserType::Patient);
    assert_ne!(user.password_hash, "s3cret");
    assert!(user.password_hash.starts_with("$argon2"));

    let database = ctx.authenticator().database();
    assert_eq!(database.get_profile(&user.id).await, Some(patient_profile()));
    Ok(())
}

#[tokio::test]
async fn signup_rejects_duplicate_email_with_user_message() -> TestResult {
    let ctx = TestContext::new().await;
    ctx.authenticator()
        .signup(patient("dup@example.com", "pw"), patient_profile())
        .await?;

    let err = ctx
        .authenticator()
        .signup(patient("DUP@example.com", "other"), patient_profile())
        .await
        .expect_err("duplicate should fail");

    assert!(matches!(err, AuthError::EmailAlreadyExists));
    assert_eq!(err.to_string(), "An account with this email already exists.");
    assert_eq!(ctx.authenticator().database().user_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn signup_rejects_profile_for_the_other_role() -> TestResult {
    let ctx = TestContext::new().await;

    let err = ctx
        .authenticator()
        .signup(patient("mix@example.com", "pw"), researcher_profile())
        .await
        .expect_err("mismatched profile should fail");

    assert!(matches!(
        err,
        AuthError::ProfileMismatch {
            account: UserType::Patient,
            profile: UserType::Researcher
        }
    ));
    assert_eq!(ctx.authenticator().database().user_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn signup_requires_credentials() -> TestResult {
    let ctx = TestContext::new().await;

    let err = ctx
        .authenticator()
        .signup(patient("  ", "pw"), patient_profile())
        .await
        .expect_err("blank email should fail");
    assert!(matches!(err, AuthError::MissingField("email")));

    let err = ctx
        .authenticator()
        .signup(patient("a@example.com", ""), patient_profile())
        .await
        .expect_err("blank password should fail");
    assert_eq!(err.to_string(), "Please enter your password.");
    Ok(())
}

#[tokio::test]
async fn login_accepts_correct_password_ignoring_email_case() -> TestResult {
    let ctx = TestContext::new().await;
    let created = ctx
        .authenticator()
        .signup(patient("Login@Example.com", "correct horse"), patient_profile())
        .await?;

    let user = ctx
        .authenticator()
        .login("login@example.com", "correct horse")
        .await?;
    assert_eq!(user.id, created.id);
    Ok(())
}

#[tokio::test]
async fn login_reports_unknown_user_and_wrong_password() -> TestResult {
    let ctx = TestContext::new().await;
    ctx.authenticator()
        .signup(patient("known@example.com", "right"), patient_profile())
        .await?;

    let unknown = ctx
        .authenticator()
        .login("nobody@example.com", "right")
        .await
        .expect_err("unknown user");
    assert_eq!(
        unknown.to_string(),
        "User not found. Please check your email or sign up."
    );

    let wrong = ctx
        .authenticator()
        .login("known@example.com", "wrong")
        .await
        .expect_err("wrong password");
    assert!(matches!(wrong, AuthError::IncorrectPassword));
    assert_eq!(wrong.to_string(), "Incorrect password. Please try again.");
    Ok(())
}

#[tokio::test]
async fn accounts_survive_a_fresh_load() -> TestResult {
    let ctx = TestContext::new().await;
    ctx.authenticator()
        .signup(patient("persist@example.com", "pw"), patient_profile())
        .await?;

    let reloaded = Authenticator::new(Database::load(ctx.storage.clone()).await);
    assert!(reloaded.login("persist@example.com", "pw").await.is_ok());
    Ok(())
}

#[derive(Default)]
struct ReadOnlyToggle {
    inner: MemoryStorage,
    read_only: AtomicBool,
}

#[async_trait]
impl LocalStorage for ReadOnlyToggle {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionError("read-only".into()));
        }
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.inner.remove_item(key).await
    }
}

#[tokio::test]
async fn signup_can_be_retried_after_a_failed_write() -> TestResult {
    let storage = Arc::new(ReadOnlyToggle::default());
    let authenticator = Authenticator::new(Database::load(storage.clone()).await);

    storage.read_only.store(true, Ordering::SeqCst);
    let err = authenticator
        .signup(patient("retry@example.com", "pw"), patient_profile())
        .await
        .expect_err("write should fail");
    assert!(matches!(err, AuthError::Database(_)));
    assert!(!err.is_user_facing());
    assert!(authenticator
        .database()
        .find_user_by_email("retry@example.com")
        .await
        .is_none());

    storage.read_only.store(false, Ordering::SeqCst);
    let user = authenticator
        .signup(patient("retry@example.com", "pw"), patient_profile())
        .await?;
    assert_eq!(
        authenticator.database().get_profile(&user.id).await,
        Some(patient_profile())
    );
    assert!(authenticator.login("retry@example.com", "pw").await.is_ok());
    Ok(())
}
