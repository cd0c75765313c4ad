//! Application configuration for pagebot.
//!
//! User config lives at `~/.pagebot/pagebot.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PageBotError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagebot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagebot";

// ---------------------------------------------------------------------------
// Config structs (matching pagebot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Wiki endpoint and credentials.
    #[serde(default)]
    pub wiki: WikiConfig,

    /// Pipeline sizing.
    #[serde(default)]
    pub run: RunSection,

    /// Producer-page bot settings.
    #[serde(default)]
    pub producer_pages: ProducerPagesConfig,
}

/// `[wiki]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    /// MediaWiki `api.php` endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Name of the env var holding the bot username (never store it here).
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Name of the env var holding the bot password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for transient failures (network, maxlag).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_api_url() -> String {
    "https://vocaloidlyrics.fandom.com/api.php".into()
}
fn default_user_agent() -> String {
    concat!("pagebot/", env!("CARGO_PKG_VERSION")).into()
}
fn default_username_env() -> String {
    "PAGEBOT_USERNAME".into()
}
fn default_password_env() -> String {
    "PAGEBOT_PASSWORD".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// Number of concurrent workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum number of queued, unacknowledged pages.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-page time budget in seconds; 0 disables it.
    #[serde(default)]
    pub item_timeout_secs: u64,

    /// Log edits instead of sending them.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            item_timeout_secs: 0,
            dry_run: false,
        }
    }
}

fn default_concurrency() -> usize {
    100
}
fn default_queue_capacity() -> usize {
    500
}

/// `[producer_pages]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerPagesConfig {
    /// Category listing every producer page.
    #[serde(default = "default_category")]
    pub category: String,

    /// Page the end-of-run report is written to.
    #[serde(default = "default_report_page")]
    pub report_page: String,

    /// Edit summary for producer page edits.
    #[serde(default = "default_edit_summary")]
    pub edit_summary: String,

    /// Edit summary for the report page.
    #[serde(default = "default_report_summary")]
    pub report_summary: String,

    /// Category marking compilation albums.
    #[serde(default = "default_compilation_category")]
    pub compilation_category: String,
}

impl Default for ProducerPagesConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            report_page: default_report_page(),
            edit_summary: default_edit_summary(),
            report_summary: default_report_summary(),
            compilation_category: default_compilation_category(),
        }
    }
}

fn default_category() -> String {
    "Category:Producers".into()
}
fn default_report_page() -> String {
    "User:CcxBot/Missing PWT Entries".into()
}
fn default_edit_summary() -> String {
    "Bot: Auto-adding songs and albums to the producer page tables".into()
}
fn default_report_summary() -> String {
    "PWT Report".into()
}
fn default_compilation_category() -> String {
    "Category:Compilation_albums".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Worker pool size.
    pub concurrency: usize,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Optional per-page time budget.
    pub item_timeout: Option<Duration>,
    /// Whether edits are only logged.
    pub dry_run: bool,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.run.concurrency,
            queue_capacity: config.run.queue_capacity,
            item_timeout: match config.run.item_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            dry_run: config.run.dry_run,
        }
    }
}

/// Bot login resolved from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagebot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PageBotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pagebot/pagebot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PageBotError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PageBotError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PageBotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PageBotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PageBotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values the bot cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    Url::parse(&config.wiki.api_url).map_err(|e| {
        PageBotError::config(format!("invalid wiki.api_url '{}': {e}", config.wiki.api_url))
    })?;
    if config.run.concurrency == 0 {
        return Err(PageBotError::config("run.concurrency must be at least 1"));
    }
    if config.run.queue_capacity == 0 {
        return Err(PageBotError::config("run.queue_capacity must be at least 1"));
    }
    Ok(())
}

/// Read the bot credentials from the env vars named in the config.
pub fn validate_credentials(config: &AppConfig) -> Result<Credentials> {
    let read = |var_name: &str| match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(PageBotError::config(format!(
            "bot credentials not found. Set the {var_name} environment variable \
             (a bot password from Special:BotPasswords)."
        ))),
    };
    Ok(Credentials {
        username: read(&config.wiki.username_env)?,
        password: read(&config.wiki.password_env)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("api_url"));
        assert!(toml_str.contains("PAGEBOT_USERNAME"));
        assert!(toml_str.contains("Category:Producers"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.run.concurrency, 100);
        assert_eq!(parsed.run.queue_capacity, 500);
        assert_eq!(parsed.producer_pages.report_summary, "PWT Report");
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[run]
concurrency = 8
item_timeout_secs = 45

[producer_pages]
report_page = "User:Example/Report"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.run.concurrency, 8);
        assert_eq!(config.run.queue_capacity, 500);
        assert_eq!(config.producer_pages.report_page, "User:Example/Report");
        assert_eq!(config.producer_pages.category, "Category:Producers");

        let run = RunConfig::from(&config);
        assert_eq!(run.item_timeout, Some(Duration::from_secs(45)));
        assert!(!run.dry_run);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let run = RunConfig::from(&AppConfig::default());
        assert_eq!(run.item_timeout, None);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(validate_config(&config).is_ok());

        config.run.concurrency = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.wiki.api_url = "not a url".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("wiki.api_url"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("pagebot-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pagebot.toml");
        std::fs::write(&path, "[run]\nqueue_capacity = 0\n").unwrap();
        assert!(load_config_from(&path).is_err());

        std::fs::write(&path, "[run]\nqueue_capacity = 20\n").unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.run.queue_capacity, 20);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn credentials_validation() {
        let mut config = AppConfig::default();
        // Use unique env var names to avoid interfering with other tests
        config.wiki.username_env = "PB_TEST_NONEXISTENT_USER_12345".into();
        config.wiki.password_env = "PB_TEST_NONEXISTENT_PASS_12345".into();
        let result = validate_credentials(&config);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("PB_TEST_NONEXISTENT_USER_12345")
        );
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "Bot@tool".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("Bot@tool"));
        assert!(!shown.contains("hunter2"));
    }
}
