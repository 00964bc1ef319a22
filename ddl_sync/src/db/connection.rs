//! Database connection handling
//!
//! This module provides functionality to establish and manage the pooled
//! connection used for schema introspection.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Puts the owner schema, matched case-insensitively, first on the search path
const SET_OWNER_SEARCH_PATH: &str = r#"
    SELECT set_config(
        'search_path',
        COALESCE(string_agg(quote_ident(nspname), ', ') || ', ', '') || 'public',
        false
    )
    FROM pg_namespace
    WHERE lower(nspname) = lower($1)
"#;

/// Pooled connection to the owner schema's database
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
    max_connections: u32,
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::open(config, None).await
    }

    /// Connect with `search_path` set to the owner schema, so the server's
    /// deparsers leave owner objects unqualified
    pub async fn connect_as_owner(config: &DatabaseConfig, owner_schema: &str) -> Result<Self> {
        Self::open(config, Some(owner_schema.to_string())).await
    }

    async fn open(config: &DatabaseConfig, owner_schema: Option<String>) -> Result<Self> {
        let pool_size = config.pool_size();
        let timeout_seconds = config.timeout_seconds.unwrap_or(30);
        let url = config.connection_url()?;

        match config.driver.as_str() {
            "postgres" | "postgresql" => {
                let mut options = PgPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(Duration::from_secs(timeout_seconds));

                if let Some(schema) = owner_schema {
                    options = options.after_connect(move |conn, _meta| {
                        let schema = schema.clone();
                        Box::pin(async move {
                            sqlx::query(SET_OWNER_SEARCH_PATH)
                                .bind(schema)
                                .execute(conn)
                                .await?;
                            Ok(())
                        })
                    });
                }

                let pool = options.connect(&url).await?;

                tracing::debug!(pool_size, "Connected to database");
                Ok(Self {
                    pool,
                    max_connections: pool_size,
                })
            }
            _ => Err(Error::DatabaseError(format!(
                "Unsupported database driver: {}",
                config.driver
            ))),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upper bound for concurrent extraction work
    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
