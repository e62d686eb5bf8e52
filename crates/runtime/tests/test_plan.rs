use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use curalink_auth::NewUser;
use curalink_config::AppConfig;
use curalink_runtime::{AppController, AppServices, ControllerError, Page};
use curalink_storage::{
    ClinicalTrial, FavoriteItem, PatientProfile, Profile, ResearcherProfile, UserType,
};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(storage_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.url = storage_url;
    config.storage.max_connections = 2;
    config.gemini.api_key = None;
    // Nothing listens here; any accidental network call fails fast.
    config.pubmed.base_url = "http://127.0.0.1:9".into();
    config.clinical_trials.base_url = "http://127.0.0.1:9".into();
    config.gemini.base_url = "http://127.0.0.1:9".into();
    config
}

fn config_with_server(server: &MockServer) -> AppConfig {
    let mut config = build_config("memory://".into());
    config.clinical_trials.base_url = server.base_url();
    config.gemini.base_url = server.base_url();
    config.gemini.api_key = Some("runtime-test-key".into());
    config
}

async fn initialise(config: &AppConfig) -> Result<AppServices> {
    AppServices::initialise(config)
        .await
        .context("failed to initialise services")
}

fn patient(email: &str) -> NewUser {
    NewUser {
        name: "Jane Patient".into(),
        email: email.into(),
        password: "pa55word".into(),
        user_type: UserType::Patient,
    }
}

fn patient_profile(conditions: &[&str]) -> Profile {
    Profile::Patient(PatientProfile {
        medical_conditions: conditions.iter().map(|c| (*c).to_string()).collect(),
        additional_info: "Non-smoker".into(),
    })
}

fn trial(id: &str) -> ClinicalTrial {
    ClinicalTrial {
        id: id.into(),
        title: "Inhaled therapy study".into(),
        summary: "Evaluates a new inhaler.".into(),
        status: "RECRUITING".into(),
        location: "Boston".into(),
        eligibility: "Adults with asthma".into(),
        contact: "N/A".into(),
    }
}

async fn signed_in(
    services: &AppServices,
    email: &str,
    conditions: &[&str],
) -> Result<AppController> {
    let mut controller = services.controller();
    let accepted = controller
        .signup(patient(email), patient_profile(conditions))
        .await?;
    assert!(accepted, "signup should succeed: {:?}", controller.auth_error());
    Ok(controller)
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_creates_sqlite_storage() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("nested/curalink.db");
    let config = build_config(sqlite_url(&db_path));

    let services = initialise(&config).await?;
    assert!(db_path.exists(), "sqlite file should be created");
    assert_eq!(services.database.user_count().await, 0);
    assert!(!services.research.gemini.has_api_key());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_rejects_unknown_storage_scheme() -> Result<()> {
    let config = build_config("postgres://localhost/curalink".into());

    let error = match AppServices::initialise(&config).await {
        Ok(_) => panic!("expected unsupported storage url to fail"),
        Err(error) => error,
    };
    assert!(
        error.to_string().contains("failed to open local storage"),
        "expected storage context, got {error:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn signup_lands_on_dashboard_and_restores_after_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("app.db")));

    {
        let services = initialise(&config).await?;
        let mut controller = signed_in(&services, "jane@example.com", &["Asthma"]).await?;
        assert_eq!(controller.current_page(), Page::PatientDashboard);
        assert!(controller.is_authenticated());

        controller.toggle_favorite(FavoriteItem::Trial(trial("NCT9"))).await?;
    }

    let services = initialise(&config).await?;
    let mut controller = services.controller();
    assert_eq!(controller.current_page(), Page::Landing);

    assert!(controller.restore().await?);
    assert_eq!(controller.current_page(), Page::PatientDashboard);
    assert_eq!(controller.user().map(|u| u.email.as_str()), Some("jane@example.com"));
    assert_eq!(controller.profile(), Some(&patient_profile(&["Asthma"])));
    assert!(controller.is_favorite("NCT9"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn restore_clears_session_for_unknown_user() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;
    services.sessions.save_session("ghost").await?;

    let mut controller = services.controller();
    assert!(!controller.restore().await?);
    assert!(!controller.is_authenticated());
    assert_eq!(services.sessions.get_session().await?, None);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_login_sets_message_and_keeps_state() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;
    signed_in(&services, "known@example.com", &[]).await?.logout().await?;

    let mut controller = services.controller();
    controller.set_current_page(Page::Login);

    assert!(!controller.login("known@example.com", "wrong").await?);
    assert_eq!(
        controller.auth_error(),
        Some("Incorrect password. Please try again.")
    );
    assert!(!controller.is_authenticated());
    assert_eq!(controller.current_page(), Page::Login);

    assert!(!controller.login("missing@example.com", "pa55word").await?);
    assert_eq!(
        controller.auth_error(),
        Some("User not found. Please check your email or sign up.")
    );

    assert!(controller.login("KNOWN@example.com", "pa55word").await?);
    assert_eq!(controller.auth_error(), None);
    assert_eq!(controller.current_page(), Page::PatientDashboard);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_signup_reports_existing_account() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;
    signed_in(&services, "taken@example.com", &[]).await?;

    let mut controller = services.controller();
    let accepted = controller
        .signup(patient("Taken@Example.com"), patient_profile(&[]))
        .await?;

    assert!(!accepted);
    assert_eq!(
        controller.auth_error(),
        Some("An account with this email already exists.")
    );
    assert_eq!(controller.current_page(), Page::Landing);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn logout_clears_state_and_session() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;
    let mut controller = signed_in(&services, "bye@example.com", &["Migraine"]).await?;
    assert!(services.sessions.get_session().await?.is_some());

    controller.logout().await?;

    assert!(!controller.is_authenticated());
    assert!(controller.favorites().is_empty());
    assert_eq!(controller.user_type(), None);
    assert_eq!(controller.current_page(), Page::Landing);
    assert_eq!(services.sessions.get_session().await?, None);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn favorites_require_sign_in_and_toggle_back() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;

    let mut anonymous = services.controller();
    let err = anonymous
        .toggle_favorite(FavoriteItem::Trial(trial("NCT1")))
        .await
        .expect_err("anonymous toggle should fail");
    assert!(matches!(err, ControllerError::NotAuthenticated));

    let mut controller = signed_in(&services, "fav@example.com", &[]).await?;
    assert!(controller.toggle_favorite(FavoriteItem::Trial(trial("NCT1"))).await?);
    assert!(controller.is_favorite("NCT1"));
    assert!(!controller.toggle_favorite(FavoriteItem::Trial(trial("NCT1"))).await?);
    assert!(controller.favorites().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn save_profile_checks_role_and_revision() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;
    let mut controller = signed_in(&services, "edit@example.com", &["Asthma"]).await?;

    controller
        .save_profile(patient_profile(&["Asthma", "Eczema"]))
        .await?;
    assert_eq!(controller.profile(), Some(&patient_profile(&["Asthma", "Eczema"])));

    let mismatch = controller
        .save_profile(Profile::Researcher(ResearcherProfile::default()))
        .await
        .expect_err("role mismatch");
    assert!(matches!(mismatch, ControllerError::ProfileMismatch { .. }));

    // Another writer updates the profile behind this controller's back.
    let user_id = controller.user().map(|u| u.id.clone()).unwrap();
    services
        .database
        .save_profile(&user_id, patient_profile(&["Other"]))
        .await?;

    let stale = controller
        .save_profile(patient_profile(&["Mine"]))
        .await
        .expect_err("stale revision");
    assert!(matches!(stale, ControllerError::Database(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn matching_trials_queries_any_condition() -> Result<()> {
    let server = MockServer::start_async().await;
    let studies = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/studies")
                .query_param("query.term", "Asthma OR Eczema");
            then.status(200).json_body(json!({
                "studies": [{
                    "protocolSection": {
                        "identificationModule": { "nctId": "NCT42", "officialTitle": "Atopy study" }
                    }
                }]
            }));
        })
        .await;

    let services = initialise(&config_with_server(&server)).await?;
    let controller = signed_in(&services, "match@example.com", &["Asthma", "Eczema"]).await?;

    let trials = controller.matching_trials().await?;
    studies.assert_async().await;
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].id, "NCT42");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn matching_trials_without_conditions_skips_the_search() -> Result<()> {
    let server = MockServer::start_async().await;
    let studies = server
        .mock_async(|when, then| {
            when.method(GET).path("/studies");
            then.status(200).json_body(json!({ "studies": [] }));
        })
        .await;

    let services = initialise(&config_with_server(&server)).await?;
    let controller = signed_in(&services, "none@example.com", &[]).await?;

    assert!(controller.matching_trials().await?.is_empty());
    studies.assert_hits_async(0).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn trial_match_report_describes_patient_and_trial() -> Result<()> {
    let server = MockServer::start_async().await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.5-flash:generateContent")
                .header("x-goog-api-key", "runtime-test-key")
                .body_contains("Conditions: Asthma. Additional Info: Non-smoker")
                .body_contains("Eligibility: Adults with asthma");
            then.status(200).json_body(json!({
                "candidates": [{ "content": { "parts": [{ "text": "**Good match.** Not medical advice." }] } }]
            }));
        })
        .await;

    let services = initialise(&config_with_server(&server)).await?;
    let controller = signed_in(&services, "report@example.com", &["Asthma"]).await?;

    let report = controller.trial_match_report(&trial("NCT7")).await?;
    generate.assert_async().await;
    assert_eq!(report, "**Good match.** Not medical advice.");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn trial_tools_need_a_patient() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;
    let mut controller = services.controller();

    let accepted = controller
        .signup(
            NewUser {
                name: "Dr. Rivera".into(),
                email: "rivera@example.com".into(),
                password: "pw".into(),
                user_type: UserType::Researcher,
            },
            Profile::Researcher(ResearcherProfile {
                specialty: "Oncology".into(),
                institution: "Cancer Center".into(),
                orcid: None,
            }),
        )
        .await?;
    assert!(accepted);
    assert_eq!(controller.current_page(), Page::ResearcherDashboard);

    let err = controller.matching_trials().await.expect_err("researcher");
    assert!(matches!(err, ControllerError::PatientProfileRequired));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn forum_posts_are_authored_by_the_active_user() -> Result<()> {
    let services = initialise(&build_config("memory://".into())).await?;

    let anonymous = services.controller();
    assert!(matches!(
        anonymous.create_forum_post("t", "c", "General").await,
        Err(ControllerError::NotAuthenticated)
    ));

    let controller = signed_in(&services, "forum@example.com", &[]).await?;
    let post = controller
        .create_forum_post("Coping tips?", "What helps you?", "General")
        .await?;
    assert_eq!(post.author, "Jane Patient");
    assert_eq!(post.user_type, UserType::Patient);

    assert!(matches!(
        controller.reply_to_post(&post.id, "Walking daily.").await,
        Err(ControllerError::ResearcherRequired)
    ));
    assert!(controller.forum_posts(None).await[0].replies.is_empty());

    let mut researcher = services.controller();
    let accepted = researcher
        .signup(
            NewUser {
                name: "Dr. Rivera".into(),
                email: "rivera@example.com".into(),
                password: "pw".into(),
                user_type: UserType::Researcher,
            },
            Profile::Researcher(ResearcherProfile {
                specialty: "Pulmonology".into(),
                institution: "General Hospital".into(),
                orcid: None,
            }),
        )
        .await?;
    assert!(accepted);

    let updated = researcher.reply_to_post(&post.id, "Walking daily.").await?;
    assert_eq!(updated.replies.len(), 1);
    assert_eq!(updated.replies[0].author, "Dr. Rivera");

    assert_eq!(controller.forum_posts(Some("general")).await.len(), 1);
    assert!(controller.forum_posts(Some("Research")).await.is_empty());
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    curalink_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = curalink_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { curalink_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
