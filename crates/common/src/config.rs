use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Public base URL used for call-to-action links in mail bodies
    pub app_base_url: String,

    /// Resend API key for mail delivery; mail channel is disabled when absent
    pub resend_api_key: Option<String>,

    /// Mail sender address
    pub mail_from: Option<String>,

    /// Maximum delivery tries per failure chain (default: 3)
    pub retry_max_tries: u32,

    /// Base retry backoff delay in seconds (default: 60)
    pub retry_base_delay_secs: u64,

    /// Wall-clock retry window in seconds from first failure (default: 7200)
    pub retry_window_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("JWT_EXPIRY_HOURS must be a valid u64"))?,
            app_base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            mail_from: std::env::var("MAIL_FROM").ok(),
            retry_max_tries: std::env::var("RETRY_MAX_TRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_MAX_TRIES must be a valid u32"))?,
            retry_base_delay_secs: std::env::var("RETRY_BASE_DELAY_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_BASE_DELAY_SECS must be a valid u64"))?,
            retry_window_secs: std::env::var("RETRY_WINDOW_SECS")
                .unwrap_or_else(|_| "7200".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_WINDOW_SECS must be a valid u64"))?,
        })
    }
}
