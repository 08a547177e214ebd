use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_seconds: u64,
    pub currency: String,
    pub cors_origins: Vec<String>,
    pub review_cache_ttl_seconds: u64,
    pub review_cache_max_entries: u64,
    pub cache_warmer_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Rentbill API"),
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8080),
            database_url: env_or("DATABASE_URL", "postgres://localhost/rentbill"),
            db_max_connections: env_parse_or("DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout_seconds: env_parse_or("DB_ACQUIRE_TIMEOUT_SECONDS", 5),
            currency: env_or("BILLING_CURRENCY", "PHP").to_ascii_uppercase(),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            review_cache_ttl_seconds: env_parse_or("REVIEW_CACHE_TTL_SECONDS", 300),
            review_cache_max_entries: env_parse_or("REVIEW_CACHE_MAX_ENTRIES", 1_000),
            cache_warmer_enabled: env_parse_bool_or("CACHE_WARMER_ENABLED", true),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Rentbill API".to_string(),
            environment: "development".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/rentbill".to_string(),
            db_max_connections: 10,
            db_acquire_timeout_seconds: 5,
            currency: "PHP".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            review_cache_ttl_seconds: 300,
            review_cache_max_entries: 1_000,
            cache_warmer_enabled: true,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    env_opt(key).map_or(default, |v| parse_bool(&v, default))
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
