use std::time::Duration;

use chrono_tz::Tz;
use engine::SyncConfig;
use serde::Deserialize;

use crate::{
    cli::GlobalArgs,
    error::{AppError, Result},
};

const DEFAULT_CONFIG_PATH: &str = "config/duit.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file holding the replica and the mutation queue.
    pub database: String,
    pub base_url: String,
    pub token: Option<String>,
    pub timezone: String,
    pub transaction_limit: u32,
    pub debounce_ms: u64,
    /// How often `watch` asks the remote for changes.
    pub poll_secs: u64,
    pub level: String,
    /// JSON file remembering who is acting.
    pub session: String,
    pub offline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: "duit.db".to_string(),
            base_url: "http://127.0.0.1:3000".to_string(),
            token: None,
            timezone: "Asia/Jakarta".to_string(),
            transaction_limit: 500,
            debounce_ms: 2_000,
            poll_secs: 60,
            level: "info".to_string(),
            session: "config/duit_session.json".to_string(),
            offline: false,
        }
    }
}

impl Settings {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| AppError::Input(format!("invalid timezone {}: {err}", self.timezone)))
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            transaction_limit: self.transaction_limit,
            debounce: Duration::from_millis(self.debounce_ms),
            // One-shot commands await their push instead.
            push_after_write: false,
        }
    }
}

/// File, then `DUIT_*` environment, then command-line flags.
pub fn load(args: &GlobalArgs) -> Result<Settings> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("DUIT"));
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(database) = &args.database {
        settings.database = database.clone();
    }
    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(timezone) = &args.timezone {
        settings.timezone = timezone.clone();
    }
    if let Some(level) = &args.level {
        settings.level = level.clone();
    }
    if args.offline {
        settings.offline = true;
    }

    Ok(settings)
}
