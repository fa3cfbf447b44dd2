use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::store::{MemoryUserStore, SqliteUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Build the production state: one store, one service, for the process
    /// lifetime.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = Arc::new(SqliteUserStore::connect(&config.database_url).await?);
        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        Self {
            config,
            auth: Arc::new(AuthService::new(store)),
        }
    }

    /// State over an in-memory store, for tests.
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "sqlite::memory:".into(),
        });
        Self::from_parts(config, Arc::new(MemoryUserStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_state_serves_the_auth_service() {
        let state = AppState::in_memory();
        let user = state
            .auth
            .register_user("state@example.com", "pw")
            .await
            .expect("register through state");
        assert_eq!(user.email, "state@example.com");
    }
}
