//! Runtime settings: built-in defaults, then an optional YAML file, then
//! environment variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::cache::{RefreshPolicy, DEFAULT_METADATA_PATH, DEFAULT_MISSING_PATH};
use crate::data::license::default_allow_list;
use crate::data::registry::DEFAULT_REGISTRY_PATH;
use crate::fetch::boundary::{BoundaryFetcher, DEFAULT_BASE_URL, DEFAULT_REQUEST_DELAY_MS};
use crate::fetch::retry::{RetryPolicy, DEFAULT_BACKOFF_BASE_MS, DEFAULT_MAX_RETRIES};
use crate::fetch::transport::{HttpTransport, DEFAULT_TIMEOUT_SECS};
use crate::github::client::{GithubClient, DEFAULT_GITHUB_API, DEFAULT_PER_PAGE};

pub const DEFAULT_ISO_PATH: &str = "data/iso_codes.csv";
pub const DEFAULT_CONFIG_FILE: &str = "geoguardian.yaml";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

pub const ENV_CONFIG: &str = "GEOGUARDIAN_CONFIG";
pub const ENV_BASE_URL: &str = "GEOGUARDIAN_BASE_URL";
pub const ENV_ISO_PATH: &str = "GEOGUARDIAN_ISO_PATH";
pub const ENV_METADATA_PATH: &str = "GEOGUARDIAN_METADATA_PATH";
pub const ENV_MISSING_PATH: &str = "GEOGUARDIAN_MISSING_PATH";
pub const ENV_REGISTRY_PATH: &str = "GEOGUARDIAN_REGISTRY_PATH";
pub const ENV_REFRESH_DAYS: &str = "GEOGUARDIAN_REFRESH_DAYS";
pub const ENV_GITHUB_API: &str = "GEOGUARDIAN_GITHUB_API";
pub const ENV_BIND: &str = "GEOGUARDIAN_BIND";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid {name}='{value}': expected {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetPaths {
    pub iso: PathBuf,
    pub metadata: PathBuf,
    pub missing: PathBuf,
    pub registry: PathBuf,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            iso: PathBuf::from(DEFAULT_ISO_PATH),
            metadata: PathBuf::from(DEFAULT_METADATA_PATH),
            missing: PathBuf::from(DEFAULT_MISSING_PATH),
            registry: PathBuf::from(DEFAULT_REGISTRY_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub request_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubSettings {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub per_page: u32,
    /// Only ever read from `GITHUB_TOKEN`.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API.to_string(),
            owner: "wmgeolab".to_string(),
            repo: "geoBoundaries".to_string(),
            per_page: DEFAULT_PER_PAGE,
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub base_url: String,
    pub paths: DatasetPaths,
    pub refresh: RefreshPolicy,
    pub http: HttpSettings,
    pub github: GithubSettings,
    pub acceptable_licenses: Vec<String>,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            paths: DatasetPaths::default(),
            refresh: RefreshPolicy::default(),
            http: HttpSettings::default(),
            github: GithubSettings::default(),
            acceptable_licenses: default_allow_list(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// `refresh_days` in YAML: a day count, or `never` / `always`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RefreshSetting {
    Days(u32),
    Keyword(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    base_url: Option<String>,
    iso_path: Option<PathBuf>,
    metadata_path: Option<PathBuf>,
    missing_path: Option<PathBuf>,
    registry_path: Option<PathBuf>,
    refresh_days: Option<RefreshSetting>,
    http: Option<HttpSettings>,
    github: Option<GithubSettings>,
    acceptable_licenses: Option<Vec<String>>,
    bind_addr: Option<String>,
}

impl Settings {
    /// Reads `GEOGUARDIAN_CONFIG` (or `geoguardian.yaml` when present) and the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = |name: &str| std::env::var(name).ok();
        let config_path = env(ENV_CONFIG).map(PathBuf::from).or_else(|| {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            default.exists().then(|| default.to_path_buf())
        });
        let file = match config_path {
            Some(path) => {
                let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Some((path.display().to_string(), raw))
            }
            None => None,
        };
        Self::from_sources(
            file.as_ref().map(|(path, raw)| (path.as_str(), raw.as_str())),
            env,
        )
    }

    /// `file` is `(path, contents)` of the YAML config, if any.
    pub fn from_sources(
        file: Option<(&str, &str)>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        if let Some((path, raw)) = file {
            let parsed: SettingsFile =
                serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
                    path: path.to_string(),
                    source,
                })?;
            settings.apply_file(parsed)?;
        }
        settings.apply_env(env)?;
        Ok(settings)
    }

    fn apply_file(&mut self, file: SettingsFile) -> Result<(), ConfigError> {
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(path) = file.iso_path {
            self.paths.iso = path;
        }
        if let Some(path) = file.metadata_path {
            self.paths.metadata = path;
        }
        if let Some(path) = file.missing_path {
            self.paths.missing = path;
        }
        if let Some(path) = file.registry_path {
            self.paths.registry = path;
        }
        match file.refresh_days {
            Some(RefreshSetting::Days(days)) => self.refresh = RefreshPolicy::from_days(Some(days)),
            Some(RefreshSetting::Keyword(keyword)) => {
                self.refresh = parse_refresh("refresh_days", &keyword)?;
            }
            None => {}
        }
        if let Some(http) = file.http {
            self.http = http;
        }
        if let Some(github) = file.github {
            self.github = github;
        }
        if let Some(licenses) = file.acceptable_licenses {
            self.acceptable_licenses = licenses;
        }
        if let Some(bind_addr) = file.bind_addr {
            self.bind_addr = bind_addr;
        }
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let set = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = set(ENV_BASE_URL) {
            self.base_url = value;
        }
        if let Some(value) = set(ENV_ISO_PATH) {
            self.paths.iso = PathBuf::from(value);
        }
        if let Some(value) = set(ENV_METADATA_PATH) {
            self.paths.metadata = PathBuf::from(value);
        }
        if let Some(value) = set(ENV_MISSING_PATH) {
            self.paths.missing = PathBuf::from(value);
        }
        if let Some(value) = set(ENV_REGISTRY_PATH) {
            self.paths.registry = PathBuf::from(value);
        }
        if let Some(value) = set(ENV_REFRESH_DAYS) {
            self.refresh = parse_refresh(ENV_REFRESH_DAYS, &value)?;
        }
        if let Some(value) = set(ENV_GITHUB_API) {
            self.github.api_base = value;
        }
        if let Some(value) = set(ENV_BIND) {
            self.bind_addr = value;
        }
        self.github.token = set(ENV_GITHUB_TOKEN).map(|token| token.trim().to_string());
        Ok(())
    }

    pub fn boundary_fetcher(&self, transport: Arc<dyn HttpTransport>) -> BoundaryFetcher {
        BoundaryFetcher::new(transport, self.base_url.clone())
            .with_retry(self.http.retry_policy())
            .with_request_delay(self.http.request_delay())
    }

    pub fn github_client(&self, transport: Arc<dyn HttpTransport>) -> GithubClient {
        GithubClient::new(
            transport,
            &self.github.api_base,
            &self.github.owner,
            &self.github.repo,
        )
        .with_token(self.github.token.clone())
        .with_per_page(self.github.per_page)
        .with_retry(self.http.retry_policy())
    }
}

fn parse_refresh(name: &'static str, value: &str) -> Result<RefreshPolicy, ConfigError> {
    RefreshPolicy::parse(value).ok_or_else(|| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        expected: "'never', 'always' or a number of days",
    })
}
