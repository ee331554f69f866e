use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum connections in the PostgreSQL pool
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // ChirpStack configuration
    /// Base URL of the ChirpStack REST bridge
    #[serde(default = "default_chirpstack_api_url")]
    pub chirpstack_api_url: String,

    /// API token presented to the ChirpStack REST bridge
    #[serde(default = "default_chirpstack_api_token")]
    pub chirpstack_api_token: String,

    /// Request timeout for ChirpStack calls in seconds
    #[serde(default = "default_chirpstack_request_timeout_secs")]
    pub chirpstack_request_timeout_secs: u64,

    /// Tenant that gateways are registered under when none is given
    #[serde(default = "default_chirpstack_tenant_id")]
    pub chirpstack_tenant_id: String,

    // Mail configuration
    /// HTTP relay endpoint that alarm mails are posted to
    #[serde(default = "default_mail_relay_url")]
    pub mail_relay_url: String,

    /// From address on outgoing alarm mails
    #[serde(default = "default_mail_from_address")]
    pub mail_from_address: String,

    /// Request timeout for mail relay calls in seconds
    #[serde(default = "default_mail_request_timeout_secs")]
    pub mail_request_timeout_secs: u64,

    // Alarm configuration
    /// Base URL of the frontend, used to build gateway links in alarm mails
    #[serde(default = "default_frontend_base_url")]
    pub frontend_base_url: String,

    /// Seconds between alarm evaluation passes
    #[serde(default = "default_alarm_check_interval_secs")]
    pub alarm_check_interval_secs: u64,

    // Stats refresh configuration
    /// Seconds between stats refresh sweeps
    #[serde(default = "default_stats_refresh_interval_secs")]
    pub stats_refresh_interval_secs: u64,

    /// Page size when listing gateways from ChirpStack during a sweep
    #[serde(default = "default_stats_page_size")]
    pub stats_page_size: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "lorafleet".to_string()
}

fn default_postgres_username() -> String {
    "lorafleet".to_string()
}

fn default_postgres_password() -> String {
    "lorafleet".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

// ChirpStack defaults
fn default_chirpstack_api_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_chirpstack_api_token() -> String {
    String::new()
}

fn default_chirpstack_request_timeout_secs() -> u64 {
    30
}

fn default_chirpstack_tenant_id() -> String {
    "52f14cd4-c6f1-4fbd-8f87-4025e1d49242".to_string()
}

// Mail defaults
fn default_mail_relay_url() -> String {
    "http://localhost:8025/api/send".to_string()
}

fn default_mail_from_address() -> String {
    "noreply@lorafleet.local".to_string()
}

fn default_mail_request_timeout_secs() -> u64 {
    30
}

// Alarm defaults
fn default_frontend_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_alarm_check_interval_secs() -> u64 {
    60
}

// Stats refresh defaults
fn default_stats_refresh_interval_secs() -> u64 {
    300
}

fn default_stats_page_size() -> i64 {
    1000
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("LORAFLEET"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        // Clear any existing LORAFLEET_ environment variables
        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var("LORAFLEET_LOG_LEVEL");
            std::env::remove_var("LORAFLEET_ALARM_CHECK_INTERVAL_SECS");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.postgres_port, 5432);
        assert_eq!(config.alarm_check_interval_secs, 60);
        assert_eq!(config.stats_refresh_interval_secs, 300);
        assert_eq!(config.stats_page_size, 1000);
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("LORAFLEET_LOG_LEVEL", "debug");
            std::env::set_var("LORAFLEET_ALARM_CHECK_INTERVAL_SECS", "15");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.alarm_check_interval_secs, 15);

        // Clean up
        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var("LORAFLEET_LOG_LEVEL");
            std::env::remove_var("LORAFLEET_ALARM_CHECK_INTERVAL_SECS");
        }
    }

    #[test]
    fn test_chirpstack_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("LORAFLEET_CHIRPSTACK_API_URL", "http://chirpstack:8090");
            std::env::set_var("LORAFLEET_CHIRPSTACK_API_TOKEN", "secret-token");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.chirpstack_api_url, "http://chirpstack:8090");
        assert_eq!(config.chirpstack_api_token, "secret-token");

        // Clean up
        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var("LORAFLEET_CHIRPSTACK_API_URL");
            std::env::remove_var("LORAFLEET_CHIRPSTACK_API_TOKEN");
        }
    }
}
