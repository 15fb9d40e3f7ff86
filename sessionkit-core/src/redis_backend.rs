//! Redis implementation of [`CacheBackend`].

use crate::cache_store::CacheBackend;
use crate::config::CacheStoreConfig;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::FromRedisValue;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Timeout for establishing a connection.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// A pooled single-node connection or a cluster connection.
pub enum RedisBackend {
    Single(Pool<RedisConnectionManager>),
    Cluster(ClusterConnection),
}

impl RedisBackend {
    /// Connect according to `config`. The caller validates it first.
    pub async fn connect(config: &CacheStoreConfig) -> SessionResult<Self> {
        if config.cluster {
            let nodes: Vec<String> = config
                .addresses
                .iter()
                .map(|addr| node_url(addr, None))
                .collect();

            let mut builder = ClusterClientBuilder::new(nodes).connection_timeout(DIAL_TIMEOUT);
            if let Some(password) = &config.password {
                builder = builder.password(password.clone());
            }
            let client = builder.build()?;
            let conn = client.get_async_connection().await?;

            info!(
                nodes = config.addresses.len(),
                "Redis cluster connection established"
            );
            return Ok(Self::Cluster(conn));
        }

        let address = config
            .addresses
            .first()
            .ok_or_else(|| SessionError::Config("no Redis address configured".to_string()))?;
        let manager = RedisConnectionManager::new(node_url(address, config.password.as_deref()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(DIAL_TIMEOUT)
            .build(manager)
            .await?;

        info!(
            pool_size = config.pool_size,
            address = %address,
            "Redis connection pool created"
        );
        Ok(Self::Single(pool))
    }

    async fn query<T: FromRedisValue + Send>(&self, cmd: &redis::Cmd) -> SessionResult<T> {
        match self {
            Self::Single(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|e| SessionError::Connection(e.to_string()))?;
                Ok(cmd.query_async(&mut *conn).await?)
            }
            Self::Cluster(conn) => {
                let mut conn = conn.clone();
                Ok(cmd.query_async(&mut conn).await?)
            }
        }
    }
}

/// Build a `redis://` URL for `host:port`, embedding the password.
fn node_url(address: &str, password: Option<&str>) -> String {
    if address.starts_with("redis://") || address.starts_with("rediss://") {
        return address.to_string();
    }
    match password {
        Some(password) => format!("redis://:{}@{}", password, address),
        None => format!("redis://{}", address),
    }
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(pool) => f
                .debug_struct("RedisBackend::Single")
                .field("connections", &pool.state().connections)
                .finish(),
            Self::Cluster(_) => f.debug_struct("RedisBackend::Cluster").finish(),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn ping(&self) -> SessionResult<String> {
        self.query(&redis::cmd("PING")).await
    }

    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query(&cmd).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> SessionResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        self.query(&cmd).await
    }

    async fn del(&self, key: &str) -> SessionResult<()> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let _: i64 = self.query(&cmd).await?;
        Ok(())
    }
}
