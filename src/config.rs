use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::error::Error;
use crate::request::Technician;
use crate::role::Role;
use crate::role_gate::SubjectId;

/// Env var naming the config file
pub const CONFIG_ENV: &str = "DESK_BOT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Settings of the bot.
///
/// Every field has a default, so an empty json object or no file at all is
/// a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File with the bot token, used when `TELOXIDE_TOKEN` is not set
    pub token_file: String,

    /// Token from the environment, never read from the file
    #[serde(skip)]
    pub token: Option<String>,

    /// Keep conversations in redis instead of memory
    pub redis_url: Option<String>,

    pub role_ttl_secs: u64,
    pub role_recheck_ms: u64,

    /// Conversations quiet for this long are dropped
    pub idle_timeout_secs: u64,
    pub reaper_interval_secs: u64,

    pub page_size: usize,

    /// Telegram user id -> role, everybody else is a client
    pub staff: HashMap<SubjectId, Role>,

    pub technicians: Vec<Technician>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            token_file: "key".to_string(),
            token: None,
            redis_url: None,
            role_ttl_secs: 300,
            role_recheck_ms: 500,
            idle_timeout_secs: 1800,
            reaper_interval_secs: 60,
            page_size: 1,
            staff: HashMap::new(),
            technicians: Vec::new(),
        }
    }
}

impl Config {
    /// Reads the file named by `DESK_BOT_CONFIG` and applies env overrides
    pub fn load() -> Result<Config, Error> {
        let path = std::env::var(CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = Config::from_file(Path::new(&path))?;
        Ok(config.with_overrides(
            std::env::var("REDIS_URL").ok(),
            std::env::var("TELOXIDE_TOKEN").ok()))
    }

    /// Missing file is the default config, a broken one is an error
    pub fn from_file(path: &Path) -> Result<Config, Error> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Config::default())
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("reading {}: {e}", path.display()))?;
        Config::from_json(&json)
            .map_err(|e| format!("parsing {}: {e}", path.display()).into())
    }

    pub fn from_json(json: &str) -> Result<Config, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Non-empty values replace what the file says
    pub fn with_overrides(mut self, redis_url: Option<String>, token: Option<String>) -> Config {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        if let Some(url) = non_empty(redis_url) {
            self.redis_url = Some(url);
        }
        if let Some(token) = non_empty(token) {
            self.token = Some(token);
        }
        self
    }

    /// Token from the env or else from `token_file`
    pub fn bot_token(&self) -> Result<String, Error> {
        if let Some(token) = &self.token {
            return Ok(token.clone())
        }
        let key = std::fs::read_to_string(&self.token_file)
            .map_err(|e| format!("reading token from {}: {e}", self.token_file))?;
        Ok(key.trim().to_string())
    }

    pub fn role_ttl(&self) -> Duration {
        Duration::from_secs(self.role_ttl_secs)
    }

    pub fn role_recheck(&self) -> Duration {
        Duration::from_millis(self.role_recheck_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        // Zero would make tokio's interval panic
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }
}
