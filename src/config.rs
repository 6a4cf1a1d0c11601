// src/config.rs

use std::{env, net::SocketAddr};

use dotenvy::dotenv;
use url::Url;

/// Multiplier applied to every weight when a survey does not carry its own (200 / 39).
pub const DEFAULT_POINT_MULTIPLIER: f64 = 200.0 / 39.0;

/// Inclusive lower bound of the point budget.
pub const MIN_VALID_POINTS: f64 = 102.0;

/// Inclusive upper bound of the point budget.
pub const MAX_VALID_POINTS: f64 = 103.0;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SENDER_EMAIL: &str = "noreply@localhost";
const DEFAULT_SENDER_NAME: &str = "Echo Sondages";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// Origin used for invitation links and CORS.
    pub public_base_url: Url,
    /// Static bearer token for `/api/admin`. `None` leaves the admin routes unguarded.
    pub admin_token: Option<String>,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Brevo API key. Mail dispatch is disabled when absent.
    pub brevo_api_key: Option<String>,
    pub sender_email: String,
    pub sender_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_raw = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let base_raw =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string());
        let public_base_url = Url::parse(&base_raw).map_err(|_| ConfigError::Invalid {
            name: "PUBLIC_BASE_URL",
            value: base_raw.clone(),
        })?;

        let admin_token = non_empty_var("ADMIN_API_TOKEN");

        let mail = MailConfig {
            brevo_api_key: non_empty_var("BREVO_API_KEY"),
            sender_email: non_empty_var("MAIL_SENDER_EMAIL")
                .unwrap_or_else(|| DEFAULT_SENDER_EMAIL.to_string()),
            sender_name: non_empty_var("MAIL_SENDER_NAME")
                .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
        };

        Ok(Self {
            database_url,
            rust_log,
            bind_addr,
            public_base_url,
            admin_token,
            mail,
        })
    }

    /// Configuration for tests and local runs that never touch Postgres.
    #[doc(hidden)]
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            rust_log: "error".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            public_base_url: Url::parse(DEFAULT_PUBLIC_BASE_URL).expect("default base url is valid"),
            admin_token: None,
            mail: MailConfig {
                brevo_api_key: None,
                sender_email: DEFAULT_SENDER_EMAIL.to_string(),
                sender_name: DEFAULT_SENDER_NAME.to_string(),
            },
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
