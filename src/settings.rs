//! Process settings from the environment (a `.env` file is honoured by the server binary).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/legacy";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_RESOURCES_DIR: &str = "resources";
const DEFAULT_AUTH_MODEL: &str = "userAccount";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `APP_ENV=development` exposes error stacks in responses.
    pub development: bool,
    pub resources_dir: PathBuf,
    /// Model whose rows hold `login` / `password` for `POST /auth`.
    pub auth_model: String,
    pub max_body_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Setting {
            name: "JWT_SECRET",
            reason: "must be set".into(),
        })?;
        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.into())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Setting {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;
        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(v) => v.parse::<usize>().map_err(|e| ConfigError::Setting {
                name: "MAX_BODY_BYTES",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            bind_addr,
            jwt_secret,
            development: get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("development")),
            resources_dir: PathBuf::from(get("RESOURCES_DIR").unwrap_or_else(|| DEFAULT_RESOURCES_DIR.into())),
            auth_model: get("AUTH_MODEL").unwrap_or_else(|| DEFAULT_AUTH_MODEL.into()),
            max_body_bytes,
        })
    }
}
