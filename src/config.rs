use crate::model::site_config::SiteConfig;
use dotenvy::dotenv;
use std::{env, fmt::Debug, str::FromStr};

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

fn parsed<T>(key: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: Debug,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|e| panic!("{key} is not valid: {e:?}"))
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // GPS fence defaults, used when the config store has no row or is down
    pub site_latitude: f64,
    pub site_longitude: f64,
    pub site_radius_m: u32,
    pub site_config_ttl_secs: u64,
    /// Whether clock-in demands a passing fence check even for MANUAL events.
    pub clock_in_requires_gps: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: required("SERVER_ADDR"),
            database_url: required("DATABASE_URL"),
            jwt_secret: required("JWT_SECRET"),
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", "900"), // 15 min
            refresh_token_ttl: parsed("REFRESH_TOKEN_TTL", "604800"), // 7 days

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", "60"),
            rate_register_per_min: parsed("RATE_REGISTER_PER_MIN", "30"),
            rate_refresh_per_min: parsed("RATE_REFRESH_PER_MIN", "30"),
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", "1000"),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            site_latitude: parsed("SITE_LATITUDE", "0"),
            site_longitude: parsed("SITE_LONGITUDE", "0"),
            site_radius_m: parsed("SITE_RADIUS_M", "500"),
            site_config_ttl_secs: parsed("SITE_CONFIG_TTL_SECS", "60"),
            clock_in_requires_gps: parsed("CLOCK_IN_REQUIRES_GPS", "true"),
        }
    }

    pub fn default_site_config(&self) -> SiteConfig {
        SiteConfig::new(self.site_latitude, self.site_longitude, self.site_radius_m)
    }
}
