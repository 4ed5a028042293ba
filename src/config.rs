use std::env;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl StorageBackend {
    pub fn label(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub app_env: String,
    pub host: String,
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub database_url: String,
    pub database_create_if_missing: bool,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout_seconds: u64,
    pub max_upload_bytes: usize,
    pub recent_analyses_limit: usize,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_database_url(value: String) -> String {
    if value.starts_with("sqlite+aiosqlite://") {
        return value.replacen("sqlite+aiosqlite://", "sqlite://", 1);
    }
    value
}

/// Explicit `STORAGE_BACKEND` wins; otherwise production deployments with a
/// database URL get SQLite and everything else runs in memory.
fn resolve_storage_backend(
    explicit: &str,
    app_env: &str,
    database_url_set: bool,
) -> StorageBackend {
    match explicit.trim().to_lowercase().as_str() {
        "memory" | "mem" => return StorageBackend::Memory,
        "sqlite" | "database" | "db" => return StorageBackend::Sqlite,
        "" => {}
        other => {
            warn!(
                "Unknown STORAGE_BACKEND value '{}'; falling back to environment defaults.",
                other
            );
        }
    }

    if app_env.eq_ignore_ascii_case("production") && database_url_set {
        StorageBackend::Sqlite
    } else {
        StorageBackend::Memory
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("GOOGLE_API_KEY"))
            .unwrap_or_default();
        if gemini_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("GEMINI_API_KEY is required"));
        }

        let app_env = env_string("APP_ENV", "development").to_lowercase();
        let database_url_env = env::var("DATABASE_URL").ok();
        let database_url_set = database_url_env
            .as_deref()
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);
        let storage_backend = resolve_storage_backend(
            &env_string("STORAGE_BACKEND", ""),
            &app_env,
            database_url_set,
        );

        let recent_analyses_limit = match env_usize("RECENT_ANALYSES_LIMIT", 10) {
            0 => 10,
            limit => limit,
        };

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            app_env,
            host: env_string("HOST", "0.0.0.0"),
            port: env_u16("PORT", 5000),
            storage_backend,
            database_url: normalize_database_url(
                database_url_env
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "sqlite://inverse_lens.db".to_string()),
            ),
            database_create_if_missing: env_bool("DATABASE_CREATE_IF_MISSING", true),
            gemini_api_key,
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-pro"),
            gemini_base_url: env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            gemini_timeout_seconds: env_u64("GEMINI_TIMEOUT_SECONDS", 90).max(1),
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            recent_analyses_limit,
        })
    }

    pub fn gemini_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini_timeout_seconds)
    }
}

pub const ORIGINAL_SYSTEM_PROMPT: &str = "You are an expert image analyst. Analyze the image and provide a detailed description, key elements, and mood.";

pub const ORIGINAL_ANALYSIS_PROMPT: &str = "Analyze this image in detail. Describe what you see, identify key visual elements (limit to 4 most important), and describe the overall mood or atmosphere.\n\nRespond with JSON in this exact format: { \"description\": \"detailed description\", \"elements\": [\"element1\", \"element2\", \"element3\", \"element4\"], \"mood\": \"mood description\" }";

pub const MIRROR_SYSTEM_PROMPT: &str = "You are a creative AI that generates 'mirror universe' interpretations. Given an original image analysis, create a completely opposite, alternative reality version that inverts the key concepts, mood, and elements while maintaining the same structural format. Be creative and imaginative.";

pub const MIRROR_ANALYSIS_INTRO: &str = "Create a mirror universe interpretation of this image analysis. Invert and reverse all concepts to create an opposite reality version:";

pub const MIRROR_ANALYSIS_OUTRO: &str = "Generate the complete opposite interpretation as if this image existed in a parallel universe where everything is inverted.";
