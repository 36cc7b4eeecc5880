use crate::{
  cluster::topology::TopologyProvider,
  connection::{ConnectionKind, ConnectionProvider},
  driver::{ClusterDriverConnection, ConnectOptions, Driver, DriverConnection},
  error::{RedisError, RedisErrorKind},
};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::{fmt, sync::Arc};

/// A provider that dials a single server for every request.
pub struct StandaloneConnectionProvider {
  driver:  Arc<dyn Driver>,
  options: ConnectOptions,
}

impl fmt::Debug for StandaloneConnectionProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StandaloneConnectionProvider")
      .field("server", &self.options.server)
      .finish()
  }
}

impl StandaloneConnectionProvider {
  pub fn new(driver: Arc<dyn Driver>, options: ConnectOptions) -> Self {
    StandaloneConnectionProvider { driver, options }
  }
}

#[async_trait]
impl ConnectionProvider for StandaloneConnectionProvider {
  async fn acquire(&self, kind: ConnectionKind) -> Result<Arc<dyn DriverConnection>, RedisError> {
    let options = match kind {
      ConnectionKind::Plain => self.options.clone(),
      ConnectionKind::PubSub => self.options.as_pubsub(),
      ConnectionKind::Node(server) => self.options.with_server(server),
      ConnectionKind::Cluster => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidArgument,
          "Cluster connections are not supported by a standalone connection provider.",
        ))
      },
    };

    trace!("Connecting to {}", options.server);
    self.driver.connect(&options).await
  }

  async fn release(&self, connection: Arc<dyn DriverConnection>) -> Result<(), RedisError> {
    connection.close().await;
    Ok(())
  }
}

/// A provider that creates slot-routing connections to a cluster, or connections to individual nodes.
pub struct ClusterConnectionProvider {
  driver:        Arc<dyn Driver>,
  options:       ConnectOptions,
  topology:      Arc<dyn TopologyProvider>,
  max_redirects: usize,
}

impl fmt::Debug for ClusterConnectionProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClusterConnectionProvider")
      .field("max_redirects", &self.max_redirects)
      .finish()
  }
}

impl ClusterConnectionProvider {
  pub fn new(
    driver: Arc<dyn Driver>,
    options: ConnectOptions,
    topology: Arc<dyn TopologyProvider>,
    max_redirects: usize,
  ) -> Self {
    ClusterConnectionProvider {
      driver,
      options,
      topology,
      max_redirects,
    }
  }

  pub fn topology(&self) -> &Arc<dyn TopologyProvider> {
    &self.topology
  }
}

#[async_trait]
impl ConnectionProvider for ClusterConnectionProvider {
  async fn acquire(&self, kind: ConnectionKind) -> Result<Arc<dyn DriverConnection>, RedisError> {
    match kind {
      ConnectionKind::Plain | ConnectionKind::Cluster => {
        let connection = ClusterDriverConnection::connect(
          self.driver.clone(),
          self.options.clone(),
          self.topology.clone(),
          self.max_redirects,
        )
        .await?;

        Ok(Arc::new(connection))
      },
      ConnectionKind::PubSub => {
        let topology = self.topology.topology().await?;
        let server = topology
          .active_nodes()
          .choose(&mut rand::thread_rng())
          .map(|node| node.server.clone())
          .ok_or_else(|| RedisError::new(RedisErrorKind::Cluster, "No active cluster nodes."))?;

        trace!("Connecting to {} for pubsub", server);
        self.driver.connect(&self.options.with_server(server).as_pubsub()).await
      },
      ConnectionKind::Node(server) => self.driver.connect(&self.options.with_server(server)).await,
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
  use crate::{cluster::topology::CachingTopologyProvider, mocks::MockDriver, types::ClientConfig};
  use std::time::Duration;

  fn options(driver: &MockDriver) -> ConnectOptions {
    ConnectOptions::from_config(&ClientConfig::default(), driver.servers()[0].clone())
  }

  #[tokio::test]
  async fn should_reject_cluster_connections_in_standalone_mode() {
    let driver = MockDriver::standalone();
    let provider = StandaloneConnectionProvider::new(Arc::new(driver.clone()), options(&driver));

    let error = provider.acquire(ConnectionKind::Cluster).await.unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::InvalidArgument);

    let connection = provider.acquire(ConnectionKind::Plain).await.unwrap();
    assert_eq!(driver.open_connections(), 1);
    provider.release(connection).await.unwrap();
    assert_eq!(driver.open_connections(), 0);
  }

  #[tokio::test]
  async fn should_dial_every_primary_for_cluster_connections() {
    let driver = MockDriver::cluster(3);
    let shared: Arc<dyn Driver> = Arc::new(driver.clone());
    let topology = Arc::new(CachingTopologyProvider::new(
      shared.clone(),
      options(&driver),
      driver.servers(),
      Duration::from_secs(60),
    ));
    let provider = ClusterConnectionProvider::new(shared, options(&driver), topology, 5);

    let connection = provider.acquire(ConnectionKind::Cluster).await.unwrap();
    assert_eq!(driver.open_connections(), 3);

    let node = provider
      .acquire(ConnectionKind::Node(driver.servers()[2].clone()))
      .await
      .unwrap();
    assert_eq!(*node.server(), driver.servers()[2]);

    provider.release(connection).await.unwrap();
    provider.release(node).await.unwrap();
    assert_eq!(driver.open_connections(), 0);
  }
}
