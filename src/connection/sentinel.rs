use crate::{
  connection::{ConnectionKind, ConnectionProvider},
  driver::{request_response, ConnectOptions, Driver, DriverConnection},
  error::{RedisError, RedisErrorKind},
  protocol::command::{RedisCommand, RedisCommandKind},
  types::{ClientConfig, RedisValue, SentinelServer, Server, ServerConfig},
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::{fmt, sync::Arc, time::Duration};

fn sentinel_error(mut error: RedisError) -> RedisError {
  error.change_kind(RedisErrorKind::Sentinel);
  error
}

pub(crate) fn parse_primary_address(value: RedisValue) -> Result<Server, RedisError> {
  if value.is_null() {
    return Err(RedisError::new(
      RedisErrorKind::Sentinel,
      "Missing primary address in response from sentinel node.",
    ));
  }

  let parts = value.into_array();
  let host = parts.first().and_then(|host| host.as_str().map(|host| host.to_string()));
  let port = parts.get(1).and_then(|port| port.as_str().and_then(|port| port.parse::<u16>().ok()));
  match (host, port) {
    (Some(host), Some(port)) if parts.len() == 2 => Ok(Server::new(host, port)),
    _ => Err(RedisError::new(
      RedisErrorKind::Sentinel,
      "Invalid primary address in response from sentinel node.",
    )),
  }
}

/// A provider that connects to the primary of a service monitored by sentinel nodes.
///
/// Every plain or pubsub connection asks the sentinels for the current primary, so new connections follow a failover.
/// When no sentinel answers, the last primary they reported is used instead. Sentinels reported by `SENTINEL
/// SENTINELS` are added to the configured ones.
pub struct SentinelConnectionProvider {
  driver:       Arc<dyn Driver>,
  /// Options for the data nodes. The server is replaced with the primary before connecting.
  options:      ConnectOptions,
  /// Options for the sentinel nodes, with their own credentials and no database.
  sentinel:     ConnectOptions,
  service_name: String,
  timeout:      Duration,
  sentinels:    RwLock<Vec<Server>>,
  primary:      RwLock<Option<Server>>,
}

impl fmt::Debug for SentinelConnectionProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SentinelConnectionProvider")
      .field("service_name", &self.service_name)
      .field("sentinels", &*self.sentinels.read())
      .field("primary", &*self.primary.read())
      .finish()
  }
}

impl SentinelConnectionProvider {
  /// Create a provider from a config with a `ServerConfig::Sentinel` server.
  pub fn new(driver: Arc<dyn Driver>, config: &ClientConfig) -> Result<Self, RedisError> {
    let (hosts, service_name, username, password) = match config.server {
      ServerConfig::Sentinel {
        ref hosts,
        ref service_name,
        ref username,
        ref password,
      } => (hosts.clone(), service_name.clone(), username.clone(), password.clone()),
      _ => {
        return Err(RedisError::new(
          RedisErrorKind::Config,
          "Expected sentinel server configuration.",
        ))
      },
    };
    let seed = hosts
      .first()
      .cloned()
      .ok_or_else(|| RedisError::new(RedisErrorKind::Config, "At least one sentinel is required."))?;
    let options = ConnectOptions::from_config(config, seed);
    let sentinel = ConnectOptions {
      username,
      password,
      database: None,
      ..options.clone()
    };

    Ok(SentinelConnectionProvider {
      driver,
      options,
      sentinel,
      service_name,
      timeout: config.command_timeout,
      sentinels: RwLock::new(hosts),
      primary: RwLock::new(None),
    })
  }

  pub fn service_name(&self) -> &str {
    &self.service_name
  }

  /// Read the known sentinel nodes.
  pub fn sentinels(&self) -> Vec<Server> {
    self.sentinels.read().clone()
  }

  /// Read the last primary reported by the sentinels.
  pub fn cached_primary(&self) -> Option<Server> {
    self.primary.read().clone()
  }

  /// Connect to the first sentinel that accepts the connection and its credentials.
  pub async fn connect_to_sentinel(&self) -> Result<Arc<dyn DriverConnection>, RedisError> {
    for server in self.sentinels().into_iter() {
      debug!("Connecting to sentinel {}", server);

      match self.driver.connect(&self.sentinel.with_server(server.clone())).await {
        Ok(connection) => return Ok(connection),
        Err(e) => warn!("Failed to connect to sentinel {}: {:?}", server, e),
      }
    }

    Err(RedisError::new(
      RedisErrorKind::Sentinel,
      "Failed to connect to all sentinel nodes.",
    ))
  }

  fn merge_sentinels(&self, discovered: Vec<SentinelServer>) {
    let mut sentinels = self.sentinels.write();

    for sentinel in discovered.into_iter() {
      if !sentinels.contains(&sentinel.server) {
        debug!("Discovered sentinel {}", sentinel.server);
        sentinels.push(sentinel.server);
      }
    }
  }

  async fn read_sentinels(&self, sentinel: &dyn DriverConnection) -> Result<Vec<SentinelServer>, RedisError> {
    let command = RedisCommand::new(RedisCommandKind::SentinelSentinels, vec![
      self.service_name.clone().into(),
    ]);
    let response = request_response(sentinel, command, self.timeout)
      .await
      .map_err(sentinel_error)?;

    SentinelServer::from_array(response)
  }

  async fn read_primary(&self, sentinel: &dyn DriverConnection) -> Result<Server, RedisError> {
    let command = RedisCommand::new(RedisCommandKind::SentinelGetMasterAddrByName, vec![
      self.service_name.clone().into(),
    ]);
    let response = request_response(sentinel, command, self.timeout)
      .await
      .map_err(sentinel_error)?;
    let primary = parse_primary_address(response)?;

    match self.read_sentinels(sentinel).await {
      Ok(discovered) => self.merge_sentinels(discovered),
      Err(e) => warn!("Failed to read sentinels for {}: {:?}", self.service_name, e),
    };
    Ok(primary)
  }

  /// Ask the sentinels for the current primary of the service and cache the answer.
  pub async fn discover_primary(&self) -> Result<Server, RedisError> {
    let sentinel = self.connect_to_sentinel().await?;
    let result = self.read_primary(sentinel.as_ref()).await;
    sentinel.close().await;

    let primary = result?;
    debug!("Sentinel {} reported primary {} for {}", sentinel.server(), primary, self.service_name);
    *self.primary.write() = Some(primary.clone());
    Ok(primary)
  }

  async fn connect_to_primary(&self, pubsub: bool) -> Result<Arc<dyn DriverConnection>, RedisError> {
    let primary = match self.discover_primary().await {
      Ok(primary) => primary,
      Err(e) => match self.cached_primary() {
        Some(primary) => {
          warn!("Using cached primary {} after sentinel error: {:?}", primary, e);
          primary
        },
        None => return Err(e),
      },
    };
    let options = self.options.with_server(primary);

    trace!("Connecting to primary {}", options.server);
    if pubsub {
      self.driver.connect(&options.as_pubsub()).await
    } else {
      self.driver.connect(&options).await
    }
  }
}

#[async_trait]
impl ConnectionProvider for SentinelConnectionProvider {
  async fn acquire(&self, kind: ConnectionKind) -> Result<Arc<dyn DriverConnection>, RedisError> {
    match kind {
      ConnectionKind::Plain => self.connect_to_primary(false).await,
      ConnectionKind::PubSub => self.connect_to_primary(true).await,
      ConnectionKind::Node(server) => self.driver.connect(&self.options.with_server(server)).await,
      ConnectionKind::Cluster => Err(RedisError::new(
        RedisErrorKind::InvalidArgument,
        "Cluster connections are not supported by a sentinel connection provider.",
      )),
    }
  }

  async fn release(&self, connection: Arc<dyn DriverConnection>) -> Result<(), RedisError> {
    connection.close().await;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mocks::MockDriver;

  fn config(driver: &MockDriver) -> ClientConfig {
    let hosts = driver
      .sentinels()
      .into_iter()
      .take(1)
      .map(|server| (server.host.to_string(), server.port))
      .collect();

    ClientConfig {
      server: ServerConfig::new_sentinel(hosts, "mymaster"),
      ..ClientConfig::default()
    }
  }

  fn provider(driver: &MockDriver, config: &ClientConfig) -> SentinelConnectionProvider {
    SentinelConnectionProvider::new(Arc::new(driver.clone()), config).unwrap()
  }

  #[tokio::test]
  async fn should_connect_to_reported_primary() {
    let driver = MockDriver::sentinel("mymaster");
    let provider = provider(&driver, &config(&driver));

    let connection = provider.acquire(ConnectionKind::Plain).await.unwrap();
    assert_eq!(*connection.server(), Server::new("127.0.0.1", 6380));
    assert_eq!(provider.cached_primary(), Some(Server::new("127.0.0.1", 6380)));
    // the sentinel connection is closed after the primary is found
    assert_eq!(driver.open_connections(), 1);
    assert_eq!(provider.sentinels().len(), 3);

    let error = provider.acquire(ConnectionKind::Cluster).await.unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::InvalidArgument);
  }

  #[tokio::test]
  async fn should_follow_failover_on_new_connections() {
    let driver = MockDriver::sentinel("mymaster");
    let provider = provider(&driver, &config(&driver));
    let before = provider.acquire(ConnectionKind::Plain).await.unwrap();

    let sentinel = provider.connect_to_sentinel().await.unwrap();
    let command = RedisCommand::new(RedisCommandKind::SentinelFailover, vec!["mymaster".into()]);
    request_response(sentinel.as_ref(), command, Duration::from_secs(5))
      .await
      .unwrap();

    let after = provider.acquire(ConnectionKind::Plain).await.unwrap();
    assert_eq!(*before.server(), Server::new("127.0.0.1", 6380));
    assert_eq!(*after.server(), Server::new("127.0.0.1", 6381));
  }

  #[tokio::test]
  async fn should_try_the_next_sentinel() {
    let driver = MockDriver::sentinel("mymaster");
    let sentinels = driver.sentinels();
    driver.fail_server(&sentinels[0]);
    let config = ClientConfig {
      server: ServerConfig::new_sentinel(
        sentinels
          .iter()
          .map(|server| (server.host.to_string(), server.port))
          .collect(),
        "mymaster",
      ),
      ..ClientConfig::default()
    };
    let provider = provider(&driver, &config);

    let connection = provider.acquire(ConnectionKind::PubSub).await.unwrap();
    assert_eq!(*connection.server(), Server::new("127.0.0.1", 6380));
    assert!(driver.commands_on(&sentinels[0]).is_empty());
  }

  #[tokio::test]
  async fn should_use_cached_primary_when_sentinels_are_down() {
    let driver = MockDriver::sentinel("mymaster");
    let provider = provider(&driver, &config(&driver));
    provider.discover_primary().await.unwrap();

    for sentinel in driver.sentinels().iter() {
      driver.fail_server(sentinel);
    }
    let connection = provider.acquire(ConnectionKind::Plain).await.unwrap();
    assert_eq!(*connection.server(), Server::new("127.0.0.1", 6380));
  }

  #[tokio::test]
  async fn should_fail_for_unknown_services() {
    let driver = MockDriver::sentinel("mymaster");
    let mut config = config(&driver);
    if let ServerConfig::Sentinel { ref mut service_name, .. } = config.server {
      *service_name = "other".into();
    }
    let provider = provider(&driver, &config);

    let error = provider.acquire(ConnectionKind::Plain).await.unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::Sentinel);
  }

  #[tokio::test]
  async fn should_authenticate_with_sentinel_credentials() {
    let driver = MockDriver::sentinel("mymaster")
      .with_password("primary-secret")
      .with_sentinel_password("sentinel-secret");
    let mut config = config(&driver);
    config.password = Some("primary-secret".into());
    config.database = Some(2);
    if let ServerConfig::Sentinel { ref mut password, .. } = config.server {
      *password = Some("sentinel-secret".into());
    }
    let provider = provider(&driver, &config);

    let connection = provider.acquire(ConnectionKind::Plain).await.unwrap();
    assert_eq!(*connection.server(), Server::new("127.0.0.1", 6380));
    assert!(!driver.commands_on(&driver.sentinels()[0]).contains(&"SELECT".to_owned()));
  }
}
