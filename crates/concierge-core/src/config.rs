use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded once at startup and injected everywhere.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub search_endpoint: String,

    // Storage
    pub database_path: PathBuf,
    pub temp_dir: PathBuf,

    // Runtime constants
    pub query_timeout: Duration,
    pub max_concurrent_events: usize,
    pub max_file_size: u64,

    /// Enabled command set; the dispatcher treats anything else as unknown.
    pub commands: HashSet<String>,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let gemini_api_key = env_str("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.trim().is_empty() {
            return Err(Error::Config(
                "GEMINI_API_KEY environment variable is required".to_string(),
            ));
        }

        let gemini_model = env_str("GEMINI_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let search_endpoint = env_str("SEARCH_ENDPOINT")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://api.duckduckgo.com".to_string());

        let database_path =
            PathBuf::from(env_str("DATABASE_PATH").unwrap_or("concierge.db".to_string()));
        let temp_dir = PathBuf::from(env_str("TEMP_DIR").unwrap_or("/tmp/concierge".to_string()));
        fs::create_dir_all(&temp_dir)?;

        // Timeouts and limits
        let query_timeout = Duration::from_millis(env_u64("QUERY_TIMEOUT_MS").unwrap_or(30_000));
        let max_concurrent_events = env_usize("MAX_CONCURRENT_EVENTS").unwrap_or(16).max(1);
        let max_file_size = env_u64("MAX_FILE_SIZE").unwrap_or(10 * 1024 * 1024);

        // Enabled commands (the handler wiring is data, not forked source)
        let commands = parse_csv_lower(
            env_str("COMMANDS").or_else(|| Some("start,websearch,referral".to_string())),
        )
        .into_iter()
        .collect();

        // Rate limiting
        let rate_limit_enabled = env_bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env_u32("RATE_LIMIT_REQUESTS").unwrap_or(20);
        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW").unwrap_or(60));

        // Audit logging
        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/concierge-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            gemini_model,
            search_endpoint,
            database_path,
            temp_dir,
            query_timeout,
            max_concurrent_events,
            max_file_size,
            commands,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
