use std::time::Duration;

use anyhow::Context;

use crate::mail::SmtpConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    Smtp,
    Log,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub token_ttl_minutes: i64,
    pub mail_transport: MailTransport,
    pub smtp: SmtpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the process env.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = match var("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        };
        let database_url = var("DATABASE_URL");
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }

        let mail_transport = match var("MAIL_TRANSPORT").as_deref() {
            None | Some("smtp") => MailTransport::Smtp,
            Some("log") => MailTransport::Log,
            Some(other) => anyhow::bail!("unknown MAIL_TRANSPORT {other:?}"),
        };

        let smtp = SmtpConfig {
            host: var("SMTP_HOST").unwrap_or_else(|| "mail".into()),
            port: parse_or(&var, "SMTP_PORT", 1025)?,
            username: var("SMTP_USERNAME"),
            password: var("SMTP_PASSWORD"),
            from: var("SMTP_FROM").unwrap_or_else(|| "info@activation.local".into()),
            timeout: Duration::from_secs(parse_or(&var, "SMTP_TIMEOUT_SECS", 10)?),
        };

        let token_ttl_minutes = parse_or(&var, "ACTIVATION_TOKEN_TTL_MINUTES", 30)?;
        if token_ttl_minutes <= 0 {
            anyhow::bail!("ACTIVATION_TOKEN_TTL_MINUTES must be positive");
        }

        Ok(Self {
            store,
            database_url,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "APP_PORT", 8080)?,
            token_ttl_minutes,
            mail_transport,
            smtp,
        })
    }

    pub fn token_ttl(&self) -> time::Duration {
        time::Duration::minutes(self.token_ttl_minutes)
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(v) => v.parse::<T>().with_context(|| format!("invalid {key}={v:?}")),
        None => Ok(default),
    }
}
