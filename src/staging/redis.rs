use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, ConnectionAddr, RedisError};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::staging::backend::{StagingBackend, Staged};
use crate::staging::errors::StorageError;

// a failed connection attempt is not retried before this elapses
const RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Default)]
struct ConnectionState {
    connection: Option<MultiplexedConnection>,
    last_failure: Option<Instant>,
}

/// Redis backend that connects on first use.
///
/// Until a connection succeeds writes are skipped and reads return nothing.
/// Every connect and command is bounded by `timeout`.
pub struct RedisBackend {
    client: Client,
    address: String,
    timeout: Duration,
    state: Mutex<ConnectionState>,
}

impl RedisBackend {
    pub fn new(url: &str, timeout: Duration) -> Result<RedisBackend, RedisError> {
        let client = Client::open(url)?;
        let address = match &client.get_connection_info().addr {
            ConnectionAddr::Tcp(host, port) => format!("{}:{}", host, port),
            other => format!("{:?}", other),
        };
        Ok(RedisBackend { client, address, timeout, state: Default::default() })
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        let mut state = self.state.lock().await;
        if let Some(connection) = &state.connection {
            return Some(connection.clone());
        }
        if let Some(last_failure) = state.last_failure {
            if last_failure.elapsed() < RECONNECT_BACKOFF {
                return None;
            }
        }
        match timeout(self.timeout, self.client.get_multiplexed_async_connection()).await {
            Ok(Ok(connection)) => {
                info!("Staging store connected at {}", self.address);
                state.last_failure = None;
                state.connection = Some(connection.clone());
                Some(connection)
            },
            Ok(Err(e)) => {
                warn!("Staging store connection error: {}", e);
                state.last_failure = Some(Instant::now());
                None
            },
            Err(_) => {
                warn!("Staging store connection timed out after {:?}", self.timeout);
                state.last_failure = Some(Instant::now());
                None
            },
        }
    }

    // a dropped connection is re-established lazily on the next call
    async fn forget_connection(&self, e: &RedisError) {
        if e.is_io_error() || e.is_connection_dropped() {
            let mut state = self.state.lock().await;
            state.connection = None;
        }
    }
}

impl Debug for RedisBackend {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        write!(f, "RedisBackend({})", &self.address)
    }
}

#[async_trait]
impl StagingBackend for RedisBackend {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<Staged, StorageError> {
        if ttl_seconds == 0 {
            return Err(StorageError::InvalidTtl);
        }
        let mut connection = match self.connection().await {
            Some(connection) => connection,
            None => return Ok(Staged::Unavailable),
        };
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value).arg("EX").arg(ttl_seconds);
        match timeout(self.timeout, command.query_async::<_, ()>(&mut connection)).await {
            Ok(Ok(())) => Ok(Staged::Stored),
            Ok(Err(e)) => {
                error!("Staging store write error: {}", e);
                self.forget_connection(&e).await;
                Err(StorageError::Command)
            },
            Err(_) => Err(StorageError::Timeout),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut connection = match self.connection().await {
            Some(connection) => connection,
            None => return Ok(None),
        };
        let mut command = redis::cmd("GET");
        command.arg(key);
        match timeout(self.timeout, command.query_async::<_, Option<String>>(&mut connection)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Staging store read error: {}", e);
                self.forget_connection(&e).await;
                Err(StorageError::Command)
            },
            Err(_) => Err(StorageError::Timeout),
        }
    }
}
