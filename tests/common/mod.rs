//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keyspace_pool::config::{EffectiveConfig, GlobalConfig, HostEndpoint, Settings, StoreKind};
use keyspace_pool::pool::{BoxError, Connection, ConnectionFactory, PoolError, PoolKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Error type for test callbacks.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("application error")]
    App,
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Connection handed out by [`MockFactory`].
#[derive(Debug)]
pub struct MockConnection {
    pub id: usize,
    pub healthy: bool,
    closes: Arc<AtomicUsize>,
}

impl Connection for MockConnection {
    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct MockState {
    attempts: AtomicUsize,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    hosts: Mutex<Vec<(PoolKey, Vec<HostEndpoint>)>>,
}

/// Connection factory with counters, failure injection and latency.
///
/// Clones share state, so a test can keep one while the manager owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    state: Arc<MockState>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Connect calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Connections successfully opened.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Connections closed by a pool.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Hosts passed to the most recent successful connect for `key`.
    pub fn last_hosts(&self, key: &PoolKey) -> Option<Vec<HostEndpoint>> {
        self.state
            .hosts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, hosts)| hosts.clone())
    }
}

impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn connect(&self, key: &PoolKey, config: &EffectiveConfig) -> Result<MockConnection, BoxError> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = self.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.state.failing.load(Ordering::SeqCst) {
            return Err("store unreachable".into());
        }

        let id = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .hosts
            .lock()
            .unwrap()
            .push((key.clone(), config.hosts_for(key.role).to_vec()));

        Ok(MockConnection {
            id,
            healthy: true,
            closes: Arc::clone(&self.state.closes),
        })
    }
}

/// Settings with fast timeouts and no connect retries.
pub fn test_settings(store: StoreKind) -> Settings {
    let mut global = GlobalConfig::for_store(store);
    global.max_retries = 0;
    global.pool.acquire_timeout = Duration::from_millis(200);
    Settings::new(global)
}

/// Same as [`test_settings`] with a custom pool size.
pub fn sized_settings(max_connections: usize, acquire_timeout: Duration) -> Settings {
    let mut settings = test_settings(StoreKind::Aerospike);
    settings.global.pool.max_connections = max_connections;
    settings.global.pool.acquire_timeout = acquire_timeout;
    settings
}

/// Write `content` to `name` under `dir` and return the path.
pub fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Start a mock store that echoes whatever it receives.
pub async fn start_mock_store() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Connection to a [`start_mock_store`] server.
#[derive(Debug)]
pub struct TcpConnection {
    pub stream: TcpStream,
}

impl Connection for TcpConnection {}

/// Factory that dials the first host of the pool's role.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpFactory;

impl ConnectionFactory for TcpFactory {
    type Connection = TcpConnection;

    async fn connect(&self, key: &PoolKey, config: &EffectiveConfig) -> Result<TcpConnection, BoxError> {
        let host = config
            .hosts_for(key.role)
            .first()
            .ok_or("no hosts configured")?;
        let stream = TcpStream::connect((host.host.as_str(), host.port)).await?;
        Ok(TcpConnection { stream })
    }
}
