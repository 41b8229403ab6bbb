use anyhow::Result;

/// Application configuration loaded from environment variables.
/// Secrets and env-specific values only; the watchlist lives in the
/// TOML file loaded by `watchlist`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // LLM (Groq-compatible chat completions)
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,

    // Data sources
    pub alpha_vantage_key: Option<String>,
    pub openweather_key: Option<String>,

    // Runtime flags
    pub offline: bool,
    pub status_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://chainwatch.db?mode=rwc".to_string()),
            llm_api_key: std::env::var("LLM_API_KEY").ok(),
            llm_base_url: std::env::var("LLM_BASE_URL").ok(),
            alpha_vantage_key: std::env::var("ALPHA_VANTAGE_KEY").ok(),
            openweather_key: std::env::var("OPENWEATHER_KEY").ok(),
            offline: std::env::var("OFFLINE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            status_file: std::env::var("STATUS_FILE").ok(),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.len().min(5);
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", self.database_url);
        tracing::info!("  LLM_API_KEY: {}", preview_opt(&self.llm_api_key));
        tracing::info!("  ALPHA_VANTAGE_KEY: {}", preview_opt(&self.alpha_vantage_key));
        tracing::info!("  OPENWEATHER_KEY: {}", preview_opt(&self.openweather_key));
        tracing::info!("  OFFLINE: {}", self.offline);
    }
}
