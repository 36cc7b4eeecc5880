use crate::{
  connection::{ConnectionKind, ConnectionProvider},
  driver::{self, DriverConnection},
  error::RedisError,
  protocol::command::{RedisCommand, RedisCommandKind},
};
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::Mutex as AsyncMutex;

/// The long-lived driver connection shared by every connection a factory creates.
///
/// The connection is created on first use and replaced when it is found closed. With validation enabled, each logical
/// connection checks it once with `PING` before its first command. Replacing and resetting are serialized under one
/// async lock.
pub struct SharedConnection {
  provider:   Arc<dyn ConnectionProvider>,
  kind:       ConnectionKind,
  validate:   bool,
  timeout:    Duration,
  connection: AsyncMutex<Option<Arc<dyn DriverConnection>>>,
}

impl fmt::Debug for SharedConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedConnection")
      .field("kind", &self.kind)
      .field("validate", &self.validate)
      .finish()
  }
}

impl SharedConnection {
  pub fn new(provider: Arc<dyn ConnectionProvider>, kind: ConnectionKind, validate: bool, timeout: Duration) -> Self {
    SharedConnection {
      provider,
      kind,
      validate,
      timeout,
      connection: AsyncMutex::new(None),
    }
  }

  async fn ping(&self, connection: &dyn DriverConnection) -> Result<(), RedisError> {
    let command = RedisCommand::new(RedisCommandKind::Ping, vec![]);
    driver::request_response(connection, command, self.timeout).await.map(|_| ())
  }

  async fn is_valid(&self, connection: &dyn DriverConnection, validate: bool) -> bool {
    if !connection.is_open() {
      return false;
    }
    if validate {
      if let Err(e) = self.ping(connection).await {
        debug!("Shared connection {} failed validation: {:?}", connection.id(), e);
        return false;
      }
    }

    true
  }

  async fn read(&self, validate: bool) -> Result<Arc<dyn DriverConnection>, RedisError> {
    let mut guard = self.connection.lock().await;

    if let Some(connection) = guard.as_ref() {
      if self.is_valid(connection.as_ref(), validate).await {
        return Ok(connection.clone());
      }
    }
    if let Some(old) = guard.take() {
      debug!("Replacing shared connection {}", old.id());
      if let Err(e) = self.provider.release(old).await {
        warn!("Failed to release shared connection: {:?}", e);
      }
    }

    let connection = self.provider.acquire(self.kind.clone()).await?;
    *guard = Some(connection.clone());
    Ok(connection)
  }

  /// Read the shared connection, creating it or replacing a closed one if needed.
  pub async fn get(&self) -> Result<Arc<dyn DriverConnection>, RedisError> {
    self.read(false).await
  }

  /// Read the shared connection, checking it with `PING` first when validation is enabled.
  pub async fn get_validated(&self) -> Result<Arc<dyn DriverConnection>, RedisError> {
    self.read(self.validate).await
  }

  /// Create the shared connection if it does not exist.
  pub async fn init(&self) -> Result<(), RedisError> {
    self.read(false).await.map(|_| ())
  }

  /// Check the shared connection with `PING`, replacing it if the check fails.
  pub async fn validate(&self) -> Result<(), RedisError> {
    self.read(true).await.map(|_| ())
  }

  /// Whether a shared connection currently exists.
  pub async fn is_initialized(&self) -> bool {
    self.connection.lock().await.is_some()
  }

  /// Close and release the shared connection. The next `get` creates a new one.
  pub async fn reset(&self) {
    let mut guard = self.connection.lock().await;

    if let Some(connection) = guard.take() {
      debug!("Resetting shared connection {}", connection.id());
      if let Err(e) = self.provider.release(connection).await {
        warn!("Failed to release shared connection: {:?}", e);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    connection::StandaloneConnectionProvider,
    driver::ConnectOptions,
    mocks::MockDriver,
    types::ClientConfig,
  };

  fn shared(driver: &MockDriver, validate: bool) -> SharedConnection {
    let options = ConnectOptions::from_config(&ClientConfig::default(), driver.servers()[0].clone());
    let provider = Arc::new(StandaloneConnectionProvider::new(Arc::new(driver.clone()), options));

    SharedConnection::new(provider, ConnectionKind::Plain, validate, Duration::from_secs(5))
  }

  #[tokio::test]
  async fn should_reuse_the_shared_connection() {
    let driver = MockDriver::standalone();
    let shared = shared(&driver, false);

    let first = shared.get().await.unwrap();
    let second = shared.get().await.unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(driver.connect_count(), 1);
  }

  #[tokio::test]
  async fn should_replace_closed_connections() {
    let driver = MockDriver::standalone();
    let shared = shared(&driver, false);

    let first = shared.get().await.unwrap();
    first.close().await;
    let second = shared.get().await.unwrap();

    assert_ne!(first.id(), second.id());
    assert!(second.is_open());
  }

  #[tokio::test]
  async fn should_validate_with_ping() {
    let driver = MockDriver::standalone();
    let shared = shared(&driver, true);

    shared.get().await.unwrap();
    shared.get_validated().await.unwrap();
    shared.get().await.unwrap();
    shared.get().await.unwrap();
    let pings = driver
      .commands_on(&driver.servers()[0])
      .into_iter()
      .filter(|name| name == "PING")
      .count();
    assert_eq!(pings, 1);
  }

  #[tokio::test]
  async fn should_reset_the_shared_connection() {
    let driver = MockDriver::standalone();
    let shared = shared(&driver, false);

    shared.init().await.unwrap();
    assert!(shared.is_initialized().await);
    shared.reset().await;
    assert!(!shared.is_initialized().await);
    assert_eq!(driver.open_connections(), 0);
  }
}
