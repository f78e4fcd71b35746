use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::auth::memory::MemoryUserStore;
use crate::auth::repo::{PgUserStore, UserStore};
use crate::auth::services::RegistrationService;
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, MailTransport, StoreBackend};
use crate::mail::{LogNotifier, Notifier, SmtpNotifier};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let users: Arc<dyn UserStore> = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("postgres user store ready");
                Arc::new(PgUserStore::new(db))
            }
            StoreBackend::Memory => {
                info!("in-memory user store; data is lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };

        let notifier: Arc<dyn Notifier> = match config.mail_transport {
            MailTransport::Smtp => Arc::new(SmtpNotifier::new(config.smtp.clone())),
            MailTransport::Log => Arc::new(LogNotifier),
        };

        Ok(Self {
            config,
            users,
            notifier,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            users,
            notifier,
            clock,
        }
    }

    pub fn registration(&self) -> RegistrationService {
        RegistrationService::new(self.users.clone(), self.notifier.clone(), self.clock.clone())
            .with_token_ttl(self.config.token_ttl())
    }
}
