//! Configuration lue depuis l'environnement (et le fichier .env).

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Durée de vie d'une session: 14 jours depuis la dernière écriture.
pub const DEFAULT_SESSION_COOKIE_AGE: i64 = 1_209_600;
pub const SESSION_COOKIE_NAME: &str = "sessionid";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_age_secs: i64,
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            cookie_age_secs: DEFAULT_SESSION_COOKIE_AGE,
            cookie_secure: false,
        }
    }
}

/// Compte admin créé au démarrage s'il n'existe pas encore.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub log_level: String,
    pub session: SessionConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Construit la configuration à partir d'une fonction de lecture
    /// (l'environnement en production, une table en test).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let port = match lookup("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => 8080,
        };

        let cookie_age_secs = match lookup("SESSION_COOKIE_AGE") {
            Some(value) => match value.parse::<i64>() {
                Ok(age) if age > 0 => age,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SESSION_COOKIE_AGE",
                        value,
                    });
                }
            },
            None => DEFAULT_SESSION_COOKIE_AGE,
        };

        let cookie_secure = match lookup("SESSION_COOKIE_SECURE") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                name: "SESSION_COOKIE_SECURE",
                value,
            })?,
            None => false,
        };

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_EMAIL"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_EMAIL")),
        };

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            media_root: PathBuf::from(lookup("MEDIA_ROOT").unwrap_or_else(|| "media".to_string())),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            session: SessionConfig {
                cookie_name: SESSION_COOKIE_NAME.to_string(),
                cookie_age_secs,
                cookie_secure,
            },
            bootstrap_admin,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
