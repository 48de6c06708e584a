//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - `$PAGEDROP_CONFIG` when set
//! - Linux/macOS: `~/.config/pagedrop/pagedrop.toml`
//! - Windows: `%APPDATA%/pagedrop/pagedrop.toml`
//!
//! `CLOUDFLARE_ACCOUNT_ID` and `CLOUDFLARE_API_TOKEN` override the stored
//! credentials.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pagedrop_deploy::{Backoff, CallPolicy, DeployConfig, PollConfig, ResolverOptions, RetryPolicy, UploadOptions};
use pagedrop_manifest::ManifestOptions;
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "PAGEDROP_CONFIG";
const ACCOUNT_ENV: &str = "CLOUDFLARE_ACCOUNT_ID";
const TOKEN_ENV: &str = "CLOUDFLARE_API_TOKEN";

/// CLI configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cloudflare account id.
    #[serde(default)]
    pub account_id: String,

    /// API token with Pages edit permission.
    #[serde(default)]
    pub api_token: String,

    /// Default project deployed to.
    #[serde(default)]
    pub project: String,

    /// Default folder deployed.
    #[serde(default = "default_directory")]
    pub directory: String,

    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub deploy: DeploySettings,
}

/// `[deploy]` table: pipeline knobs in human units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploySettings {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Names skipped in addition to the built-in ignore list.
    #[serde(default)]
    pub extra_ignore: Vec<String>,

    #[serde(default = "default_missing_batch_size")]
    pub missing_batch_size: usize,

    #[serde(default = "default_upload_batch_items")]
    pub upload_batch_items: usize,

    #[serde(default = "default_upload_batch_mb")]
    pub upload_batch_mb: usize,

    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Attempts per platform call and per upload key.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    #[serde(default = "default_max_upload_rounds")]
    pub max_upload_rounds: u32,

    #[serde(default = "default_poll_initial_delay_secs")]
    pub poll_initial_delay_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Zero polls until the deployment finishes.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub create_project_if_missing: bool,

    #[serde(default = "default_production_branch")]
    pub production_branch: String,

    #[serde(default = "default_true")]
    pub upsert_hashes: bool,

    #[serde(default = "default_true")]
    pub follow: bool,
}

fn default_directory() -> String {
    ".".into()
}

fn default_max_file_size_mb() -> u64 {
    25
}

fn default_missing_batch_size() -> usize {
    5000
}

fn default_upload_batch_items() -> usize {
    2000
}

fn default_upload_batch_mb() -> usize {
    40
}

fn default_upload_concurrency() -> usize {
    3
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_initial_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    8000
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_max_upload_rounds() -> u32 {
    3
}

fn default_poll_initial_delay_secs() -> u64 {
    2
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_poll_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_production_branch() -> String {
    "main".into()
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            extra_ignore: Vec::new(),
            missing_batch_size: default_missing_batch_size(),
            upload_batch_items: default_upload_batch_items(),
            upload_batch_mb: default_upload_batch_mb(),
            upload_concurrency: default_upload_concurrency(),
            max_attempts: default_max_attempts(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            max_upload_rounds: default_max_upload_rounds(),
            poll_initial_delay_secs: default_poll_initial_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            create_project_if_missing: true,
            production_branch: default_production_branch(),
            upsert_hashes: true,
            follow: true,
        }
    }
}

impl DeploySettings {
    /// Maps the settings onto the library configuration.
    pub fn to_deploy_config(&self) -> DeployConfig {
        let retry = RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(self.retry_initial_ms),
                factor: 2.0,
                max: Duration::from_millis(self.retry_max_ms),
            },
        };

        let mut manifest = ManifestOptions {
            max_file_size: self.max_file_size_mb * 1024 * 1024,
            ..ManifestOptions::default()
        };
        manifest.ignore.extend(self.extra_ignore.iter().cloned());

        DeployConfig {
            manifest,
            resolver: ResolverOptions {
                batch_size: self.missing_batch_size,
            },
            upload: UploadOptions {
                max_batch_items: self.upload_batch_items,
                max_batch_bytes: self.upload_batch_mb * 1024 * 1024,
                concurrency: self.upload_concurrency,
                retry: retry.clone(),
            },
            calls: CallPolicy {
                timeout: Duration::from_secs(self.call_timeout_secs),
                retry,
            },
            poll: PollConfig {
                initial_delay: Duration::from_secs(self.poll_initial_delay_secs),
                interval: Duration::from_secs(self.poll_interval_secs),
                timeout: (self.poll_timeout_secs > 0)
                    .then(|| Duration::from_secs(self.poll_timeout_secs)),
            },
            max_upload_rounds: self.max_upload_rounds,
            create_project_if_missing: self.create_project_if_missing,
            production_branch: self.production_branch.clone(),
            upsert_hashes: self.upsert_hashes,
            follow_deployment: self.follow,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: String::new(),
            project: String::new(),
            directory: default_directory(),
            base_url: None,
            deploy: DeploySettings::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("account_id", &self.account_id)
            .field("api_token", &"<redacted>")
            .field("project", &self.project)
            .field("directory", &self.directory)
            .field("base_url", &self.base_url)
            .field("deploy", &self.deploy)
            .finish()
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    /// Environment credentials are applied afterwards.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds an API token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(account) = var(ACCOUNT_ENV).filter(|v| !v.is_empty()) {
            self.account_id = account;
        }
        if let Some(token) = var(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.api_token = token;
        }
    }

    /// Fails when credentials are missing.
    pub fn require_credentials(&self) -> anyhow::Result<()> {
        if self.account_id.is_empty() {
            anyhow::bail!("account_id is not set (config file or {ACCOUNT_ENV})");
        }
        if self.api_token.is_empty() {
            anyhow::bail!("api_token is not set (config file or {TOKEN_ENV})");
        }
        Ok(())
    }
}

/// Returns the configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("pagedrop").join("pagedrop.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("pagedrop")
            .join("pagedrop.toml"))
    }
}
