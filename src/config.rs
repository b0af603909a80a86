use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use axum::http::HeaderValue;
use clap::Parser;
use clap::builder::BoolishValueParser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::rate_limit::RateLimitRule;

/// Deployment environment the service runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Prod,
}

impl Environment {
    /// Whether this environment is exposed beyond the developer's machine
    pub fn is_deployed(self) -> bool {
        matches!(self, Environment::Dev | Environment::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        };
        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Errors raised while loading or validating the configuration
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("ENV must be one of [dev, local, prod], got '{0}'")]
    InvalidEnvironment(String),
    #[error("CORS_ORIGINS must be set when ENV={0}")]
    MissingCorsOrigins(Environment),
    #[error("invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
    #[error("DB_URL must be set when USE_DB is enabled")]
    MissingDatabaseUrl,
    #[error("invalid {name} '{value}': {reason}")]
    InvalidRateLimit {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("AUTH_REQUIRED is set but neither API_KEY nor HMAC_SECRET is configured")]
    MissingAuthSecret,
    #[error("failed to read config file: {0}")]
    FileRead(String),
    #[error("failed to parse config file: {0}")]
    FileParse(String),
}

/// Configuration for the Tarot API server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub env: Environment,
    pub log_level: String,
    pub log_format: LogFormat,
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty means permissive (local only)
    pub cors_origins: Vec<String>,
    /// Path of the card dataset JSON file
    pub data_path: PathBuf,
    /// Optional single-file meanings overlay merged into the dataset
    pub meanings_path: Option<PathBuf>,
    /// Root directory served under `/static`
    pub static_dir: PathBuf,
    pub prefer_local_images: bool,
    pub use_db: bool,
    pub db_url: Option<String>,
    pub rate_limit_default: String,
    pub rate_limit_health: String,
    pub rate_limit_cards: String,
    pub rate_limit_reading_post: String,
    pub max_body_bytes: usize,
    pub auth_required: bool,
    pub api_key: Option<String>,
    pub hmac_secret: Option<String>,
    pub google_api_key: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_output_tokens: u32,
}

/// Update structure for Config with all fields optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ConfigUpdate {
    pub env: Option<Environment>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
    pub data_path: Option<PathBuf>,
    pub meanings_path: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub prefer_local_images: Option<bool>,
    pub use_db: Option<bool>,
    pub db_url: Option<String>,
    pub rate_limit_default: Option<String>,
    pub rate_limit_health: Option<String>,
    pub rate_limit_cards: Option<String>,
    pub rate_limit_reading_post: Option<String>,
    pub max_body_bytes: Option<usize>,
    pub auth_required: Option<bool>,
    pub api_key: Option<String>,
    pub hmac_secret: Option<String>,
    pub google_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_temperature: Option<f32>,
    pub llm_max_output_tokens: Option<u32>,
}

/// Command line arguments for the server
///
/// Every flag can also be supplied through the environment variable of the
/// same name, which is how the container image is configured.
#[derive(Parser, Debug, Default)]
#[clap(name = "tarot-api", about = "Tarot card and reading API")]
pub struct CliArgs {
    /// Path to a TOML config file
    #[clap(long, env = "TAROT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deployment environment: local, dev or prod
    #[clap(long = "env", env = "ENV", value_parser = parse_environment)]
    pub env: Option<Environment>,

    #[clap(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    #[clap(long, env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    #[clap(long, env = "HOST")]
    pub host: Option<String>,

    #[clap(long, env = "PORT")]
    pub port: Option<u16>,

    /// Comma-separated list of allowed origins
    #[clap(long, env = "CORS_ORIGINS")]
    pub cors_origins: Option<String>,

    #[clap(long, env = "DATA_PATH")]
    pub data_path: Option<PathBuf>,

    #[clap(long, env = "MEANINGS_PATH")]
    pub meanings_path: Option<PathBuf>,

    #[clap(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    #[clap(long, env = "PREFER_LOCAL_IMAGES", value_parser = BoolishValueParser::new())]
    pub prefer_local_images: Option<bool>,

    /// Store readings and cards in Postgres instead of memory
    #[clap(long, env = "USE_DB", value_parser = BoolishValueParser::new())]
    pub use_db: Option<bool>,

    /// Postgres connection string
    #[clap(long, env = "DB_URL")]
    pub db_url: Option<String>,

    #[clap(long, env = "RATE_LIMIT_DEFAULT")]
    pub rate_limit_default: Option<String>,

    #[clap(long, env = "RATE_LIMIT_HEALTH")]
    pub rate_limit_health: Option<String>,

    #[clap(long, env = "RATE_LIMIT_CARDS")]
    pub rate_limit_cards: Option<String>,

    #[clap(long, env = "RATE_LIMIT_READING_POST")]
    pub rate_limit_reading_post: Option<String>,

    #[clap(long, env = "MAX_BODY_BYTES")]
    pub max_body_bytes: Option<usize>,

    #[clap(long, env = "AUTH_REQUIRED", value_parser = BoolishValueParser::new())]
    pub auth_required: Option<bool>,

    #[clap(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[clap(long, env = "HMAC_SECRET", hide_env_values = true)]
    pub hmac_secret: Option<String>,

    #[clap(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[clap(long, env = "LLM_MODEL")]
    pub llm_model: Option<String>,

    #[clap(long, env = "LLM_TEMPERATURE")]
    pub llm_temperature: Option<f32>,

    #[clap(long, env = "LLM_MAX_OUTPUT_TOKENS")]
    pub llm_max_output_tokens: Option<u32>,
}

fn parse_environment(s: &str) -> Result<Environment, String> {
    s.parse::<Environment>().map_err(|e| e.to_string())
}

/// Splits a comma-separated origin list, dropping blanks
pub fn parse_cors_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parsed per-route rate limit rules
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimits {
    pub default: RateLimitRule,
    pub health: RateLimitRule,
    pub cards: RateLimitRule,
    pub reading_post: RateLimitRule,
}

impl Config {
    /// Applies a config update to the current configuration
    pub fn apply_update(self, update: ConfigUpdate) -> Self {
        Self {
            env: update.env.unwrap_or(self.env),
            log_level: update.log_level.unwrap_or(self.log_level),
            log_format: update.log_format.unwrap_or(self.log_format),
            host: update.host.unwrap_or(self.host),
            port: update.port.unwrap_or(self.port),
            cors_origins: update.cors_origins.unwrap_or(self.cors_origins),
            data_path: update.data_path.unwrap_or(self.data_path),
            meanings_path: update.meanings_path.or(self.meanings_path),
            static_dir: update.static_dir.unwrap_or(self.static_dir),
            prefer_local_images: update.prefer_local_images.unwrap_or(self.prefer_local_images),
            use_db: update.use_db.unwrap_or(self.use_db),
            db_url: update.db_url.or(self.db_url),
            rate_limit_default: update.rate_limit_default.unwrap_or(self.rate_limit_default),
            rate_limit_health: update.rate_limit_health.unwrap_or(self.rate_limit_health),
            rate_limit_cards: update.rate_limit_cards.unwrap_or(self.rate_limit_cards),
            rate_limit_reading_post: update.rate_limit_reading_post.unwrap_or(self.rate_limit_reading_post),
            max_body_bytes: update.max_body_bytes.unwrap_or(self.max_body_bytes),
            auth_required: update.auth_required.unwrap_or(self.auth_required),
            api_key: update.api_key.or(self.api_key),
            hmac_secret: update.hmac_secret.or(self.hmac_secret),
            google_api_key: update.google_api_key.or(self.google_api_key),
            llm_model: update.llm_model.unwrap_or(self.llm_model),
            llm_temperature: update.llm_temperature.unwrap_or(self.llm_temperature),
            llm_max_output_tokens: update.llm_max_output_tokens.unwrap_or(self.llm_max_output_tokens),
        }
    }

    /// Parses the `RATE_LIMIT_*` strings into rules
    pub fn rate_limits(&self) -> Result<RateLimits, ConfigError> {
        fn parse(name: &'static str, value: &str) -> Result<RateLimitRule, ConfigError> {
            value.parse::<RateLimitRule>().map_err(|e| ConfigError::InvalidRateLimit {
                name,
                value: value.to_string(),
                reason: e.to_string(),
            })
        }

        Ok(RateLimits {
            default: parse("RATE_LIMIT_DEFAULT", &self.rate_limit_default)?,
            health: parse("RATE_LIMIT_HEALTH", &self.rate_limit_health)?,
            cards: parse("RATE_LIMIT_CARDS", &self.rate_limit_cards)?,
            reading_post: parse("RATE_LIMIT_READING_POST", &self.rate_limit_reading_post)?,
        })
    }

    /// Checks the configuration for combinations the server refuses to start with
    ///
    /// ### Errors
    ///
    /// Returns an error if:
    /// - the environment is `dev` or `prod` and no CORS origin is configured
    /// - a CORS origin is not a valid header value
    /// - `use_db` is enabled without a database URL
    /// - a rate limit string cannot be parsed
    /// - authentication is required but no secret is configured
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env.is_deployed() && self.cors_origins.is_empty() {
            return Err(ConfigError::MissingCorsOrigins(self.env));
        }

        for origin in &self.cors_origins {
            if origin != "*" && HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::InvalidCorsOrigin(origin.clone()));
            }
        }

        if self.use_db && self.db_url.as_deref().map_or(true, |url| url.trim().is_empty()) {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        self.rate_limits()?;

        if self.auth_required && self.api_key.is_none() && self.hmac_secret.is_none() {
            return Err(ConfigError::MissingAuthSecret);
        }

        Ok(())
    }

    /// Directory holding the dataset, also searched for `meanings.{lang}.json`
    pub fn data_dir(&self) -> PathBuf {
        self.data_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Returns the base (default) configuration
pub fn base_config() -> Config {
    Config {
        env: Environment::Local,
        log_level: "INFO".to_string(),
        log_format: LogFormat::Text,
        host: "0.0.0.0".to_string(),
        port: 8008,
        cors_origins: Vec::new(),
        data_path: PathBuf::from("data/tarot-images.json"),
        meanings_path: None,
        static_dir: PathBuf::from("static"),
        prefer_local_images: true,
        use_db: false,
        db_url: None,
        rate_limit_default: "60/minute".to_string(),
        rate_limit_health: "5/second".to_string(),
        rate_limit_cards: "120/minute".to_string(),
        rate_limit_reading_post: "10/minute".to_string(),
        max_body_bytes: 65536,
        auth_required: false,
        api_key: None,
        hmac_secret: None,
        google_api_key: None,
        llm_model: "gemini-1.5-flash".to_string(),
        llm_temperature: 0.6,
        llm_max_output_tokens: 512,
    }
}

/// Returns the platform config directory, e.g. `~/.config/tarot-api`
pub fn get_config_dir_path() -> Option<PathBuf> {
    match ProjectDirs::from("com", "tarot", "tarot-api") {
        Some(proj_dirs) => Some(proj_dirs.config_dir().to_path_buf()),
        None => {
            warn!("Could not determine XDG config directory, skipping config file");
            None
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ConfigUpdate {
    /// Treats blank secrets and URLs as unset
    pub fn without_blank_values(self) -> Self {
        Self {
            db_url: non_blank(self.db_url),
            api_key: non_blank(self.api_key),
            hmac_secret: non_blank(self.hmac_secret),
            google_api_key: non_blank(self.google_api_key),
            ..self
        }
    }
}

/// Loads configuration from a TOML file
///
/// A missing path or file yields an empty update.
pub fn config_from_file(config_path: Option<PathBuf>) -> Result<ConfigUpdate, ConfigError> {
    let Some(config_path) = config_path else {
        return Ok(ConfigUpdate::default());
    };

    if !config_path.exists() {
        info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(ConfigUpdate::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        warn!("Failed to read config file: {}", e);
        ConfigError::FileRead(e.to_string())
    })?;

    let update = toml::from_str::<ConfigUpdate>(&content).map_err(|e| {
        warn!("Failed to parse config file: {}", e);
        ConfigError::FileParse(e.to_string())
    })?;

    info!("Loaded configuration from {:?}", config_path);
    Ok(update.without_blank_values())
}

/// Loads configuration from command line arguments and environment variables
pub fn config_from_args(args: CliArgs) -> ConfigUpdate {
    ConfigUpdate {
        env: args.env,
        log_level: args.log_level,
        log_format: args.log_format,
        host: args.host,
        port: args.port,
        cors_origins: args.cors_origins.as_deref().map(parse_cors_origins),
        data_path: args.data_path,
        meanings_path: args.meanings_path,
        static_dir: args.static_dir,
        prefer_local_images: args.prefer_local_images,
        use_db: args.use_db,
        db_url: args.db_url,
        rate_limit_default: args.rate_limit_default,
        rate_limit_health: args.rate_limit_health,
        rate_limit_cards: args.rate_limit_cards,
        rate_limit_reading_post: args.rate_limit_reading_post,
        max_body_bytes: args.max_body_bytes,
        auth_required: args.auth_required,
        api_key: args.api_key,
        hmac_secret: args.hmac_secret,
        google_api_key: args.google_api_key,
        llm_model: args.llm_model,
        llm_temperature: args.llm_temperature,
        llm_max_output_tokens: args.llm_max_output_tokens,
    }
    .without_blank_values()
}

/// Gets the complete, validated configuration
///
/// Combines defaults with values from the config file, environment variables
/// and command line arguments in order of increasing precedence.
pub fn get_config(args: CliArgs) -> Result<Config, ConfigError> {
    let config_path = args.config.clone().or_else(|| {
        get_config_dir_path()
            .map(|dir| dir.join("config.toml"))
            .filter(|path| path.exists())
    });

    let config = base_config()
        .apply_update(config_from_file(config_path)?)
        .apply_update(config_from_args(args));

    config.validate()?;

    info!(
        "Final configuration: env={}, port={}, data_path={:?}, use_db={}, cors_origins={}",
        config.env,
        config.port,
        config.data_path,
        config.use_db,
        config.cors_origins.len()
    );

    Ok(config)
}
