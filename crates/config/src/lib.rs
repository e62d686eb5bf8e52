use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "curalink.toml",
    "config/curalink.toml",
    "crates/config/curalink.toml",
    "../curalink.toml",
    "../config/curalink.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub pubmed: PubMedConfig,
    pub clinical_trials: ClinicalTrialsConfig,
    pub gemini: GeminiConfig,
}

/// Where the local key/value store lives.
///
/// `sqlite://path/to/file.db` persists to disk, `memory://` keeps everything
/// in process and is lost on exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://curalink.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a saved session. Zero disables expiry.
    #[serde(default = "SessionConfig::default_ttl")]
    pub ttl_seconds: u64,
}

impl SessionConfig {
    const fn default_ttl() -> u64 {
        2_592_000
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: Self::default_ttl(),
        }
    }
}

/// Configuration for the NCBI E-utilities endpoints used for publications and experts.
///
/// ```
/// use curalink_config::PubMedConfig;
///
/// let pubmed = PubMedConfig::default();
/// assert_eq!(pubmed.base_url, "https://eutils.ncbi.nlm.nih.gov/entrez/eutils");
/// assert_eq!(pubmed.request_timeout_seconds, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubMedConfig {
    #[serde(default = "PubMedConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl PubMedConfig {
    fn default_base_url() -> String {
        "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
    }
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalTrialsConfig {
    #[serde(default = "ClinicalTrialsConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl ClinicalTrialsConfig {
    fn default_base_url() -> String {
        "https://clinicaltrials.gov/api/v2".to_string()
    }
}

impl Default for ClinicalTrialsConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Configuration options for the Gemini generative-text integration.
///
/// ```
/// use curalink_config::GeminiConfig;
///
/// let gemini = GeminiConfig::default();
/// assert_eq!(gemini.model, "gemini-2.5-flash");
/// assert!(gemini.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "GeminiConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "GeminiConfig::default_model")]
    pub model: String,
    #[serde(default = "GeminiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GeminiConfig {
    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }

    fn default_model() -> String {
        "gemini-2.5-flash".to_string()
    }

    const fn default_request_timeout() -> u64 {
        60
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

const fn default_request_timeout() -> u64 {
    30
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use curalink_config::load;
///
/// std::env::remove_var("CURALINK_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.storage.url.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let session_ttl = i64::try_from(defaults.session.ttl_seconds).unwrap_or(i64::MAX);

    let builder = config::Config::builder()
        .set_default("storage.url", defaults.storage.url.clone())?
        .set_default(
            "storage.max_connections",
            i64::from(defaults.storage.max_connections),
        )?
        .set_default("session.ttl_seconds", session_ttl)?
        .set_default("pubmed.base_url", defaults.pubmed.base_url.clone())?
        .set_default(
            "pubmed.request_timeout_seconds",
            i64::try_from(defaults.pubmed.request_timeout_seconds).unwrap_or(i64::MAX),
        )?
        .set_default(
            "clinical_trials.base_url",
            defaults.clinical_trials.base_url.clone(),
        )?
        .set_default(
            "clinical_trials.request_timeout_seconds",
            i64::try_from(defaults.clinical_trials.request_timeout_seconds).unwrap_or(i64::MAX),
        )?
        .set_default("gemini.base_url", defaults.gemini.base_url.clone())?
        .set_default("gemini.model", defaults.gemini.model.clone())?
        .set_default(
            "gemini.request_timeout_seconds",
            i64::try_from(defaults.gemini.request_timeout_seconds).unwrap_or(i64::MAX),
        )?;

    let mut builder = builder;
    let environment_overrides = config::Environment::with_prefix("CURALINK").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CURALINK_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CURALINK_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.session.ttl_seconds > i64::MAX as u64 {
        config.session.ttl_seconds = i64::MAX as u64;
    }

    if config.gemini.api_key.is_none() {
        config.gemini.api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
    }

    debug!(
        storage = %config.storage.url,
        gemini_key_present = config.gemini.api_key.is_some(),
        "loaded configuration"
    );
    Ok(config)
}
