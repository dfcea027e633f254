use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration, built once at startup and handed to every component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let jwt_secret = var_or("JWT_SECRET", DEFAULT_JWT_SECRET);
        if environment == AppEnvironment::Production && jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::InsecureSecret("JWT_SECRET"));
        }

        let auth = AuthConfig {
            jwt_secret,
            token_ttl_days: parse_number("TOKEN_TTL_DAYS", 7)?,
        };

        let stripe = StripeConfig {
            secret_key: var_or("STRIPE_SECRET_KEY", ""),
            webhook_secret: var_or("STRIPE_WEBHOOK_SECRET", ""),
            connect_client_id: var_or("STRIPE_CONNECT_CLIENT_ID", ""),
            redirect_uri: var_or(
                "STRIPE_REDIRECT_URI",
                "http://localhost:3000/api/v1/integrations/stripe/callback",
            ),
            dashboard_url: var_or("DASHBOARD_URL", "http://localhost:4321/dashboard"),
            timeout: Duration::from_secs(parse_number("PROVIDER_TIMEOUT_SECS", 30)?),
        };

        let llm = LlmConfig {
            provider: LlmProvider::from_str(&var_or("LLM_PROVIDER", "openai")),
            openai_api_key: var_or("OPENAI_API_KEY", ""),
            openai_model: var_or("OPENAI_MODEL", "gpt-4o"),
            ollama_base_url: var_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: var_or("OLLAMA_MODEL", "llama3.1:8b"),
            timeout: Duration::from_secs(parse_number("LLM_TIMEOUT_SECS", 60)?),
        };

        let pipeline = PipelineConfig {
            window_days: parse_number("METRICS_WINDOW_DAYS", 30)?,
            payout_grace_days: parse_number("PAYOUT_GRACE_DAYS", 1)?,
            scheduler_enabled: parse_flag("SCHEDULER_ENABLED", true)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_targets: environment != AppEnvironment::Production,
            },
            auth,
            stripe,
            llm,
            pipeline,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_targets: bool,
}

/// Bearer session signing.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_days", &self.token_ttl_days)
            .finish()
    }
}

/// Payment provider (Stripe Connect) credentials and endpoints.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub connect_client_id: String,
    pub redirect_uri: String,
    pub dashboard_url: String,
    pub timeout: Duration,
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &redact(&self.secret_key))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("connect_client_id", &self.connect_client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("dashboard_url", &self.dashboard_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

impl LlmProvider {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Self::Ollama,
            _ => Self::OpenAi,
        }
    }
}

/// Text-generation backend used by the assistant.
#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub openai_api_key: String,
    pub openai_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub timeout: Duration,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("ollama_model", &self.ollama_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Batch pipeline knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Trailing window, in days, each metric snapshot covers.
    pub window_days: i64,
    /// Days a payout may land after its expected arrival and still count as on time.
    pub payout_grace_days: i64,
    pub scheduler_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            payout_grace_days: 1,
            scheduler_enabled: true,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFlag { key: &'static str, value: String },
    InsecureSecret(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (got '{value}')")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true/false (got '{value}')")
            }
            ConfigError::InsecureSecret(key) => {
                write!(f, "{key} must be overridden in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_number<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .filter(|value| *value >= T::default())
            .ok_or(ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "JWT_SECRET",
            "TOKEN_TTL_DAYS",
            "LLM_PROVIDER",
            "LLM_TIMEOUT_SECS",
            "METRICS_WINDOW_DAYS",
            "PAYOUT_GRACE_DAYS",
            "SCHEDULER_ENABLED",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.auth.token_ttl_days, 7);
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.timeout, Duration::from_secs(60));
        assert_eq!(config.pipeline.window_days, 30);
        assert!(config.pipeline.scheduler_enabled);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        env::remove_var("APP_HOST");
    }

    #[test]
    fn production_rejects_default_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        match AppConfig::load() {
            Err(ConfigError::InsecureSecret("JWT_SECRET")) => {}
            other => panic!("expected insecure secret error, got {other:?}"),
        }
        env::remove_var("APP_ENV");
    }

    #[test]
    fn rejects_negative_window() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("METRICS_WINDOW_DAYS", "-3");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                key: "METRICS_WINDOW_DAYS",
                ..
            })
        ));
        env::remove_var("METRICS_WINDOW_DAYS");
    }

    #[test]
    fn parses_scheduler_flag_and_ollama_provider() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCHEDULER_ENABLED", "off");
        env::set_var("LLM_PROVIDER", "Ollama");
        let config = AppConfig::load().expect("config loads");
        assert!(!config.pipeline.scheduler_enabled);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        reset_env();
    }
}
