use crate::{
  clients::{ClusterConnection, RedisConnection, SentinelConnection},
  cluster::{
    executor::{ClusterCommandExecutor, NodeResourceProvider, ProviderNodeResources},
    router::{ClusterRouter, SlotRouter, StandaloneRouter},
    topology::{CachingTopologyProvider, Topology, TopologyProvider},
  },
  connection::{
    ClusterConnectionProvider,
    ConnectionInner,
    ConnectionKind,
    ConnectionProvider,
    PoolingConnectionProvider,
    SentinelConnectionProvider,
    SharedConnection,
    StandaloneConnectionProvider,
  },
  driver::{ConnectOptions, Driver, TcpDriver},
  error::{DefaultErrorTranslator, ErrorTranslator, RedisError, RedisErrorKind},
  types::{ClientConfig, Server},
  utils,
};
use std::{
  fmt,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

/// The number of idle connections kept per cluster node when no pool is configured.
const IDLE_NODE_CONNECTIONS: usize = 2;

struct FactoryInner {
  id:         Arc<String>,
  config:     Arc<ClientConfig>,
  driver:     Arc<dyn Driver>,
  translator: Arc<dyn ErrorTranslator>,
  provider:   Arc<dyn ConnectionProvider>,
  shared:     Option<Arc<SharedConnection>>,
  router:     Arc<dyn SlotRouter>,
  topology:   Option<Arc<dyn TopologyProvider>>,
  nodes:      Option<Arc<dyn NodeResourceProvider>>,
  sentinel:   Option<Arc<SentinelConnectionProvider>>,
  destroyed:  AtomicBool,
}

impl_log_name!(FactoryInner);

/// Creates connections that share one driver, connection provider and, optionally, one native connection.
///
/// ```rust no_run
/// use conduit::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), RedisError> {
///   let config = ClientConfig::from_url("redis://127.0.0.1:6379/0")?;
///   let factory = ConnectionFactory::builder(config).build()?;
///   factory.init().await?;
///
///   let connection = factory.get_connection()?;
///   let _: () = connection.set("foo", "bar", None, None, false).await?;
///   connection.close().await;
///
///   factory.destroy().await;
///   Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionFactory {
  inner: Arc<FactoryInner>,
}

impl fmt::Debug for ConnectionFactory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectionFactory")
      .field("id", &self.inner.id)
      .field("clustered", &self.inner.router.is_clustered())
      .field("sentinel", &self.inner.sentinel.is_some())
      .field("shared", &self.inner.shared.is_some())
      .field("pooled", &self.inner.config.pool.is_some())
      .finish()
  }
}

/// A builder for a `ConnectionFactory`.
pub struct ConnectionFactoryBuilder {
  config:     ClientConfig,
  driver:     Option<Arc<dyn Driver>>,
  translator: Option<Arc<dyn ErrorTranslator>>,
  topology:   Option<Arc<dyn TopologyProvider>>,
}

impl fmt::Debug for ConnectionFactoryBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectionFactoryBuilder")
      .field("config", &self.config)
      .field("driver", &self.driver)
      .finish()
  }
}

impl ConnectionFactoryBuilder {
  /// Use the provided driver instead of the TCP driver.
  pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
    self.driver = Some(driver);
    self
  }

  /// Use the provided error translator instead of `DefaultErrorTranslator`.
  pub fn translator(mut self, translator: Arc<dyn ErrorTranslator>) -> Self {
    self.translator = Some(translator);
    self
  }

  /// Use the provided topology provider instead of one that caches `CLUSTER NODES` for `topology_cache_ttl`.
  pub fn topology_provider(mut self, topology: Arc<dyn TopologyProvider>) -> Self {
    self.topology = Some(topology);
    self
  }

  /// Validate the config and create the factory. No connections are created.
  pub fn build(self) -> Result<ConnectionFactory, RedisError> {
    self.config.validate()?;

    let config = Arc::new(self.config);
    let id = Arc::new(match config.client_name {
      Some(ref name) => name.clone(),
      None => format!("conduit-factory-{}", utils::random_string(10)),
    });
    let driver = self.driver.unwrap_or_else(|| Arc::new(TcpDriver::new()));
    let translator = self.translator.unwrap_or_else(|| Arc::new(DefaultErrorTranslator));
    let seeds: Vec<Server> = config.server.hosts().into_iter().cloned().collect();
    let seed = seeds
      .first()
      .cloned()
      .ok_or_else(|| RedisError::new(RedisErrorKind::Config, "At least one server is required."))?;
    let options = ConnectOptions::from_config(&config, seed);

    let sentinel = if config.server.is_sentinel() {
      Some(Arc::new(SentinelConnectionProvider::new(driver.clone(), &config)?))
    } else {
      None
    };

    let (native, topology): (Arc<dyn ConnectionProvider>, _) = if let Some(ref sentinel) = sentinel {
      (sentinel.clone(), None)
    } else if config.is_clustered() {
      let topology = self.topology.unwrap_or_else(|| {
        Arc::new(CachingTopologyProvider::new(
          driver.clone(),
          options.clone(),
          seeds,
          config.topology_cache_ttl,
        ))
      });
      let provider = ClusterConnectionProvider::new(driver.clone(), options, topology.clone(), config.max_redirects);

      (Arc::new(provider), Some(topology))
    } else {
      (Arc::new(StandaloneConnectionProvider::new(driver.clone(), options)), None)
    };
    let provider: Arc<dyn ConnectionProvider> = match config.pool {
      Some(ref pool) => Arc::new(PoolingConnectionProvider::new(
        native.clone(),
        pool.clone(),
        config.command_timeout,
      )),
      None => native.clone(),
    };

    // pooled node connections are already reused by the pool
    let nodes: Option<Arc<dyn NodeResourceProvider>> = topology.as_ref().map(|_| match config.pool {
      Some(_) => Arc::new(ProviderNodeResources::new(provider.clone())) as Arc<dyn NodeResourceProvider>,
      None => Arc::new(ProviderNodeResources::caching(provider.clone(), IDLE_NODE_CONNECTIONS)),
    });
    let router: Arc<dyn SlotRouter> = match (topology.as_ref(), nodes.as_ref()) {
      (Some(topology), Some(nodes)) => {
        let executor = ClusterCommandExecutor::new(
          id.clone(),
          topology.clone(),
          nodes.clone(),
          translator.clone(),
          config.max_redirects,
          config.command_timeout,
        );
        Arc::new(ClusterRouter::new(Arc::new(executor)))
      },
      _ => Arc::new(StandaloneRouter),
    };
    let shared = if config.share_native_connection {
      let kind = if topology.is_some() {
        ConnectionKind::Cluster
      } else {
        ConnectionKind::Plain
      };

      Some(Arc::new(SharedConnection::new(
        native,
        kind,
        config.validate_connection,
        config.command_timeout,
      )))
    } else {
      None
    };

    Ok(ConnectionFactory {
      inner: Arc::new(FactoryInner {
        id,
        config,
        driver,
        translator,
        provider,
        shared,
        router,
        topology,
        nodes,
        sentinel,
        destroyed: AtomicBool::new(false),
      }),
    })
  }
}

impl ConnectionFactory {
  /// Create a builder for a factory with the provided config.
  pub fn builder(config: ClientConfig) -> ConnectionFactoryBuilder {
    ConnectionFactoryBuilder {
      config,
      driver: None,
      translator: None,
      topology: None,
    }
  }

  /// Create a factory with the default driver, translator and topology provider.
  pub fn new(config: ClientConfig) -> Result<ConnectionFactory, RedisError> {
    ConnectionFactory::builder(config).build()
  }

  fn check_destroyed(&self) -> Result<(), RedisError> {
    if self.inner.destroyed.load(Ordering::Acquire) {
      Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "ConnectionFactory was destroyed and cannot be used anymore",
      ))
    } else {
      Ok(())
    }
  }

  fn new_inner(&self) -> Arc<ConnectionInner> {
    ConnectionInner::new(
      self.inner.config.clone(),
      self.inner.provider.clone(),
      self.inner.shared.clone(),
      self.inner.router.clone(),
      self.inner.translator.clone(),
    )
  }

  /// Read the config used by the factory.
  pub fn config(&self) -> &ClientConfig {
    &self.inner.config
  }

  pub fn is_clustered(&self) -> bool {
    self.inner.router.is_clustered()
  }

  pub fn is_destroyed(&self) -> bool {
    self.inner.destroyed.load(Ordering::Acquire)
  }

  /// Create the shared connection when eager initialization is enabled.
  pub async fn init(&self) -> Result<(), RedisError> {
    self.check_destroyed()?;

    match self.inner.shared {
      Some(ref shared) if self.inner.config.eager_initialization => {
        _debug!(self.inner, "Initializing shared connection.");
        shared.init().await.map_err(|e| self.translate(e))
      },
      _ => Ok(()),
    }
  }

  /// Create a connection. Against a cluster the connection routes commands by hash slot and emulates cross-slot
  /// commands.
  pub fn get_connection(&self) -> Result<RedisConnection, RedisError> {
    self.check_destroyed()?;
    Ok(RedisConnection::new(self.new_inner()))
  }

  /// Create a cluster connection, or fail if the factory does not run against a cluster.
  pub fn get_cluster_connection(&self) -> Result<ClusterConnection, RedisError> {
    self.check_destroyed()?;
    if !self.is_clustered() {
      return Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "Cluster is not configured!",
      ));
    }

    Ok(ClusterConnection::new(self.new_inner()))
  }

  /// Connect to the first reachable sentinel, or fail if the factory does not run against sentinels.
  ///
  /// The connection uses the sentinel credentials from the server config and is independent of every other connection
  /// created by the factory.
  pub async fn get_sentinel_connection(&self) -> Result<SentinelConnection, RedisError> {
    self.check_destroyed()?;

    let sentinel = match self.inner.sentinel {
      Some(ref sentinel) => sentinel,
      None => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Sentinel is not configured!",
        ))
      },
    };
    let connection = sentinel.connect_to_sentinel().await.map_err(|e| self.translate(e))?;
    _debug!(self.inner, "Created sentinel connection to {}", connection.server());

    Ok(SentinelConnection::new(
      connection,
      self.inner.translator.clone(),
      self.inner.config.command_timeout,
    ))
  }

  /// Read the primary most recently reported by the sentinels, or `None` before the first connection or when the
  /// factory does not run against sentinels.
  pub fn sentinel_primary(&self) -> Option<Server> {
    self.inner.sentinel.as_ref().and_then(|sentinel| sentinel.cached_primary())
  }

  /// Replace the shared connection with a new one.
  pub async fn init_connection(&self) -> Result<(), RedisError> {
    self.check_destroyed()?;

    if let Some(ref shared) = self.inner.shared {
      shared.reset().await;
      shared.init().await.map_err(|e| self.translate(e))?;
    }
    Ok(())
  }

  /// Close the shared connection. The next command that needs it creates a new one.
  pub async fn reset_connection(&self) -> Result<(), RedisError> {
    self.check_destroyed()?;

    if let Some(ref shared) = self.inner.shared {
      shared.reset().await;
    }
    Ok(())
  }

  /// Check the shared connection with `PING`, replacing it if it is closed or does not answer.
  pub async fn validate_connection(&self) -> Result<(), RedisError> {
    self.check_destroyed()?;

    match self.inner.shared {
      Some(ref shared) => shared.validate().await.map_err(|e| self.translate(e)),
      None => Ok(()),
    }
  }

  /// Read the cluster topology, or fail if the factory does not run against a cluster.
  pub async fn topology(&self) -> Result<Arc<Topology>, RedisError> {
    self.check_destroyed()?;

    match self.inner.topology {
      Some(ref topology) => topology.topology().await.map_err(|e| self.translate(e)),
      None => Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "Cluster is not configured!",
      )),
    }
  }

  /// Translate a raw driver or server error with the factory's error translator.
  pub fn translate(&self, error: RedisError) -> RedisError {
    self.inner.translator.translate(error)
  }

  /// Close the shared connection and every pooled connection, then shut down the driver.
  ///
  /// Destroying a factory twice has no effect. Every other function fails after the factory is destroyed.
  pub async fn destroy(&self) {
    if self.inner.destroyed.swap(true, Ordering::AcqRel) {
      return;
    }
    _debug!(self.inner, "Destroying connection factory.");

    if let Some(ref shared) = self.inner.shared {
      shared.reset().await;
    }
    if let Some(ref nodes) = self.inner.nodes {
      nodes.destroy().await;
    }
    self.inner.provider.destroy().await;

    let config = &self.inner.config;
    let shutdown = self
      .inner
      .driver
      .shutdown(config.shutdown_quiet_period, config.shutdown_timeout);
    if let Err(e) = utils::apply_timeout(shutdown, config.shutdown_timeout).await {
      _warn!(self.inner, "Failed to shut down driver: {:?}", e);
    }
  }
}
