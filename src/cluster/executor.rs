use crate::{
  cluster::topology::{Topology, TopologyProvider},
  connection::{ConnectionKind, ConnectionProvider},
  driver::DriverConnection,
  error::{ErrorTranslator, RedisError, RedisErrorKind},
  protocol::{
    command::{RedisCommand, RedisCommandKind},
    utils::{self as protocol_utils, Redirection},
  },
  types::*,
  utils,
};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::{
  collections::HashMap,
  fmt,
  future::Future,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

/// A source of connections to individual cluster nodes.
#[async_trait]
pub trait NodeResourceProvider: Send + Sync + fmt::Debug {
  /// Read a connection to the provided node.
  async fn acquire(&self, node: &ClusterNode) -> Result<Arc<dyn DriverConnection>, RedisError>;

  /// Return a connection previously read from `acquire`.
  async fn release(&self, node: &ClusterNode, connection: Arc<dyn DriverConnection>);

  /// Close any connections held by the provider.
  async fn destroy(&self) {}
}

/// A `NodeResourceProvider` that reads node connections from a connection provider.
///
/// With `max_idle > 0` released connections are kept per node and handed out again on the next `acquire`. Each
/// connection is used by one caller at a time, so blocking commands and `ASKING` never interleave with other callers.
#[derive(Debug)]
pub struct ProviderNodeResources {
  provider: Arc<dyn ConnectionProvider>,
  max_idle: usize,
  idle:     Mutex<HashMap<Server, Vec<Arc<dyn DriverConnection>>>>,
}

impl ProviderNodeResources {
  /// Dial a new connection for every `acquire` and release it to the provider afterwards.
  pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
    ProviderNodeResources::caching(provider, 0)
  }

  /// Keep up to `max_idle` released connections per node.
  pub fn caching(provider: Arc<dyn ConnectionProvider>, max_idle: usize) -> Self {
    ProviderNodeResources {
      provider,
      max_idle,
      idle: Mutex::new(HashMap::new()),
    }
  }

  /// The number of idle connections kept for `server`.
  pub fn idle_count(&self, server: &Server) -> usize {
    self.idle.lock().get(server).map(|c| c.len()).unwrap_or(0)
  }

  fn take_idle(&self, server: &Server) -> (Option<Arc<dyn DriverConnection>>, Vec<Arc<dyn DriverConnection>>) {
    let mut idle = self.idle.lock();
    let mut stale = Vec::new();

    if let Some(connections) = idle.get_mut(server) {
      while let Some(connection) = connections.pop() {
        if connection.is_open() {
          return (Some(connection), stale);
        } else {
          stale.push(connection);
        }
      }
    }
    (None, stale)
  }

  async fn close_all(&self, connections: Vec<Arc<dyn DriverConnection>>) {
    for connection in connections.into_iter() {
      if let Err(e) = self.provider.release(connection).await {
        warn!("Failed to release node connection: {:?}", e);
      }
    }
  }
}

#[async_trait]
impl NodeResourceProvider for ProviderNodeResources {
  async fn acquire(&self, node: &ClusterNode) -> Result<Arc<dyn DriverConnection>, RedisError> {
    let (cached, stale) = self.take_idle(&node.server);
    self.close_all(stale).await;

    match cached {
      Some(connection) => Ok(connection),
      None => self.provider.acquire(ConnectionKind::Node(node.server.clone())).await,
    }
  }

  async fn release(&self, node: &ClusterNode, connection: Arc<dyn DriverConnection>) {
    if self.max_idle > 0 && connection.is_open() && !connection.is_multi() {
      let mut idle = self.idle.lock();
      let connections = idle.entry(node.server.clone()).or_insert_with(Vec::new);

      if connections.len() < self.max_idle {
        connections.push(connection);
        return;
      }
    }

    if let Err(e) = self.provider.release(connection).await {
      warn!("Failed to release connection to {}: {:?}", node.server, e);
    }
  }

  async fn destroy(&self) {
    let connections: Vec<_> = self.idle.lock().drain().flat_map(|(_, c)| c.into_iter()).collect();
    self.close_all(connections).await;
  }
}

/// A connection to one cluster node, handed to executor callbacks.
pub struct NodeConnection {
  node:       ClusterNode,
  connection: Arc<dyn DriverConnection>,
  asking:     AtomicBool,
  timeout:    Duration,
}

impl fmt::Debug for NodeConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NodeConnection")
      .field("node", &self.node.server)
      .field("asking", &self.asking.load(Ordering::SeqCst))
      .finish()
  }
}

impl NodeConnection {
  /// Read the node on the other end of the connection.
  pub fn node(&self) -> &ClusterNode {
    &self.node
  }

  pub fn connection(&self) -> &Arc<dyn DriverConnection> {
    &self.connection
  }

  /// Send the command and wait for the raw reply frame.
  ///
  /// The first command after an `ASK` redirection is preceded by `ASKING`.
  pub async fn request_frame(&self, command: RedisCommand) -> Result<Resp2Frame, RedisError> {
    let timeout = utils::command_timeout(self.timeout, &command);

    if self.asking.swap(false, Ordering::SeqCst) {
      let asking = self
        .connection
        .dispatch(RedisCommand::new(RedisCommandKind::Asking, vec![]));
      let response = self.connection.dispatch(command);

      let _ = utils::apply_timeout(asking, timeout).await?;
      utils::apply_timeout(response, timeout).await
    } else {
      utils::apply_timeout(self.connection.dispatch(command), timeout).await
    }
  }

  /// Send the command and convert the reply with the command's reply shape.
  pub async fn request(&self, command: RedisCommand) -> Result<RedisValue, RedisError> {
    let shape = command.reply_shape();
    let frame = self.request_frame(command).await?;
    shape.convert(frame)
  }
}

/// Runs units of work against one node, every primary, or the nodes that own a set of keys.
///
/// Calls that span several nodes run in parallel and never abort each other. Every per-node error passes through the
/// translator before it is stored in the `MultiNodeResult`.
pub struct ClusterCommandExecutor {
  id:            Arc<String>,
  topology:      Arc<dyn TopologyProvider>,
  resources:     Arc<dyn NodeResourceProvider>,
  translator:    Arc<dyn ErrorTranslator>,
  max_redirects: usize,
  timeout:       Duration,
}

impl fmt::Debug for ClusterCommandExecutor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClusterCommandExecutor")
      .field("id", &self.id)
      .field("max_redirects", &self.max_redirects)
      .finish()
  }
}

impl_log_name!(ClusterCommandExecutor);

impl ClusterCommandExecutor {
  pub fn new(
    id: Arc<String>,
    topology: Arc<dyn TopologyProvider>,
    resources: Arc<dyn NodeResourceProvider>,
    translator: Arc<dyn ErrorTranslator>,
    max_redirects: usize,
    timeout: Duration,
  ) -> Self {
    ClusterCommandExecutor {
      id,
      topology,
      resources,
      translator,
      max_redirects,
      timeout,
    }
  }

  pub fn topology_provider(&self) -> &Arc<dyn TopologyProvider> {
    &self.topology
  }

  /// Read the current topology snapshot.
  pub async fn topology(&self) -> Result<Arc<Topology>, RedisError> {
    self.topology.topology().await.map_err(|e| self.translator.translate(e))
  }

  async fn run_once<T, F, Fut>(&self, node: &ClusterNode, asking: bool, callback: &F) -> Result<T, RedisError>
  where
    F: Fn(Arc<NodeConnection>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    let connection = self.resources.acquire(node).await?;
    let node_connection = Arc::new(NodeConnection {
      node: node.clone(),
      connection: connection.clone(),
      asking: AtomicBool::new(asking),
      timeout: self.timeout,
    });

    let result = callback(node_connection).await;
    self.resources.release(node, connection).await;
    result
  }

  async fn redirected_node(&self, server: &Server, refresh: bool) -> ClusterNode {
    let topology = if refresh {
      match self.topology.refresh().await {
        Ok(topology) => Some(topology),
        Err(e) => {
          _warn!(self, "Failed to refresh cluster topology: {:?}", e);
          None
        },
      }
    } else {
      self.topology.cached()
    };

    topology
      .and_then(|topology| topology.lookup_address(&server.host, server.port).cloned())
      .unwrap_or_else(|| ClusterNode::from_server(server.clone()))
  }

  async fn run_with_redirects<T, F, Fut>(&self, node: &ClusterNode, callback: &F) -> Result<T, RedisError>
  where
    F: Fn(Arc<NodeConnection>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    let topology = self.topology.topology().await?;
    let mut target = topology.lookup(node)?.clone();
    let mut asking = false;
    let mut redirections = 0;

    loop {
      let error = match self.run_once(&target, asking, callback).await {
        Ok(value) => return Ok(value),
        Err(e) => e,
      };
      let redirection = match protocol_utils::error_to_redirection(&error) {
        Some(redirection) => redirection,
        None => return Err(error),
      };

      redirections += 1;
      if redirections > self.max_redirects {
        return Err(RedisError::new(
          RedisErrorKind::Cluster,
          "Too many cluster redirections",
        ));
      }

      match redirection {
        Redirection::Moved { slot, server } => {
          _debug!(self, "Slot {} moved to {}", slot, server);
          target = self.redirected_node(&server, true).await;
          asking = false;
        },
        Redirection::Ask { slot, server } => {
          _debug!(self, "Asking {} for slot {}", server, slot);
          target = self.redirected_node(&server, false).await;
          asking = true;
        },
      }
    }
  }

  /// Run the callback on the provided node, following `MOVED` and `ASK` redirections.
  pub async fn execute_on_node<T, F, Fut>(&self, node: &ClusterNode, callback: F) -> Result<T, RedisError>
  where
    F: Fn(Arc<NodeConnection>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    self
      .run_with_redirects(node, &callback)
      .await
      .map_err(|e| self.translator.translate(e))
  }

  /// Run the callback on active nodes in random order until one of them answers.
  ///
  /// Nodes that cannot be reached are skipped. An error reply from a reachable node is returned as-is.
  pub async fn execute_on_arbitrary_node<T, F, Fut>(&self, callback: F) -> Result<T, RedisError>
  where
    F: Fn(Arc<NodeConnection>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    let topology = self.topology().await?;
    let mut nodes: Vec<ClusterNode> = topology.active_nodes().into_iter().cloned().collect();
    utils::shuffle(&mut nodes);

    let mut last_error = None;
    for node in nodes.iter() {
      match self.run_with_redirects(node, &callback).await {
        Ok(value) => return Ok(value),
        Err(e) if e.kind().is_connection_failure() => {
          _warn!(self, "Skipping unreachable node {}: {:?}", node.server, e);
          last_error = Some(e);
        },
        Err(e) => return Err(self.translator.translate(e)),
      }
    }

    let error = last_error.unwrap_or_else(|| RedisError::new(RedisErrorKind::Cluster, "No active cluster nodes."));
    Err(self.translator.translate(error))
  }

  /// Run the callback on each of the provided nodes in parallel.
  pub async fn execute_on_nodes<T, F, Fut>(&self, nodes: Vec<ClusterNode>, callback: F) -> MultiNodeResult<T>
  where
    F: Fn(Arc<NodeConnection>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    let callback = &callback;
    let calls = nodes.into_iter().map(|node| async move {
      let result = self
        .run_with_redirects(&node, callback)
        .await
        .map_err(|e| self.translator.translate(e));

      NodeResult::new(node, None, result)
    });

    join_all(calls).await.into_iter().collect()
  }

  /// Run the callback on every primary that owns at least one slot, in parallel.
  pub async fn execute_on_all_primaries<T, F, Fut>(&self, callback: F) -> Result<MultiNodeResult<T>, RedisError>
  where
    F: Fn(Arc<NodeConnection>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    let topology = self.topology().await?;
    let nodes: Vec<ClusterNode> = topology
      .primaries()
      .into_iter()
      .filter(|node| !node.slots.is_empty())
      .cloned()
      .collect();

    _trace!(self, "Running on {} primaries.", nodes.len());
    Ok(self.execute_on_nodes(nodes, callback).await)
  }

  /// Find the primary that owns the key's slot.
  pub async fn key_serving_primary(&self, key: &RedisKey) -> Result<ClusterNode, RedisError> {
    let topology = self.topology().await?;
    find_key_node(&topology, key)
  }

  /// Run the callback on the primary that owns the key's slot.
  pub async fn execute_for_key<T, F, Fut>(&self, key: &RedisKey, callback: F) -> Result<T, RedisError>
  where
    F: Fn(Arc<NodeConnection>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    let node = self.key_serving_primary(key).await?;
    self.execute_on_node(&node, callback).await
  }

  /// Run the callback once per key, in parallel, each on the primary that owns the key's slot.
  ///
  /// Every result carries its key so the values can be sorted back into key order.
  pub async fn execute_multi_key<T, F, Fut>(
    &self,
    keys: Vec<RedisKey>,
    callback: F,
  ) -> Result<MultiNodeResult<T>, RedisError>
  where
    F: Fn(Arc<NodeConnection>, RedisKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, RedisError>> + Send,
    T: Send,
  {
    let topology = self.topology().await?;
    let targets = keys
      .into_iter()
      .map(|key| find_key_node(&topology, &key).map(|node| (node, key)))
      .collect::<Result<Vec<_>, RedisError>>()?;

    let callback = &callback;
    let calls = targets.into_iter().map(|(node, key)| async move {
      let per_key = |connection: Arc<NodeConnection>| callback(connection, key.clone());
      let result = self
        .run_with_redirects(&node, &per_key)
        .await
        .map_err(|e| self.translator.translate(e));

      NodeResult::new(node, Some(key), result)
    });

    Ok(join_all(calls).await.into_iter().collect())
  }

  /// Send a command to the provided node.
  pub async fn run_on_node(&self, node: &ClusterNode, command: RedisCommand) -> Result<RedisValue, RedisError> {
    self
      .execute_on_node(node, |connection| {
        let command = command.clone();
        async move { connection.request(command).await }
      })
      .await
  }

  /// Send a command to an arbitrary active node.
  pub async fn run_on_arbitrary_node(&self, command: RedisCommand) -> Result<RedisValue, RedisError> {
    self
      .execute_on_arbitrary_node(|connection| {
        let command = command.clone();
        async move { connection.request(command).await }
      })
      .await
  }

  /// Send a command to every primary.
  pub async fn run_on_all_primaries(&self, command: RedisCommand) -> Result<MultiNodeResult<RedisValue>, RedisError> {
    self
      .execute_on_all_primaries(|connection| {
        let command = command.clone();
        async move { connection.request(command).await }
      })
      .await
  }

  /// Send a command to each of the provided nodes.
  pub async fn run_on_nodes(&self, nodes: Vec<ClusterNode>, command: RedisCommand) -> MultiNodeResult<RedisValue> {
    self
      .execute_on_nodes(nodes, |connection| {
        let command = command.clone();
        async move { connection.request(command).await }
      })
      .await
  }

  /// Send one command per key, built by `func`, to the key's primary.
  pub async fn run_for_keys<F>(&self, keys: Vec<RedisKey>, func: F) -> Result<MultiNodeResult<RedisValue>, RedisError>
  where
    F: Fn(RedisKey) -> RedisCommand + Send + Sync,
  {
    let func = &func;
    self
      .execute_multi_key(keys, move |connection, key| {
        let command = func(key);
        async move { connection.request(command).await }
      })
      .await
  }
}

fn find_key_node(topology: &Topology, key: &RedisKey) -> Result<ClusterNode, RedisError> {
  let slot = key.cluster_hash();

  topology.slot_serving_primary(slot).cloned().ok_or_else(|| {
    RedisError::new(
      RedisErrorKind::Cluster,
      format!("Could not find a cluster node for slot {}.", slot),
    )
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    cluster::topology::CachingTopologyProvider,
    connection::provider::StandaloneConnectionProvider,
    driver::{ConnectOptions, Driver},
    error::DefaultErrorTranslator,
    mocks::MockDriver,
  };

  fn executor(driver: &MockDriver, max_redirects: usize) -> ClusterCommandExecutor {
    executor_with(driver, max_redirects, 0)
  }

  fn executor_with(driver: &MockDriver, max_redirects: usize, max_idle: usize) -> ClusterCommandExecutor {
    let servers = driver.servers();
    let options = ConnectOptions::from_config(&ClientConfig::default(), servers[0].clone());
    let driver: Arc<dyn Driver> = Arc::new(driver.clone());
    let topology = Arc::new(CachingTopologyProvider::new(
      driver.clone(),
      options.clone(),
      servers,
      Duration::from_secs(60),
    ));
    let provider = Arc::new(StandaloneConnectionProvider::new(driver, options));

    ClusterCommandExecutor::new(
      Arc::new("test".to_owned()),
      topology,
      Arc::new(ProviderNodeResources::caching(provider, max_idle)),
      Arc::new(DefaultErrorTranslator),
      max_redirects,
      Duration::from_secs(5),
    )
  }

  fn set(key: &str, value: &str) -> RedisCommand {
    RedisCommand::new(RedisCommandKind::Set, vec![key.into(), value.into()])
  }

  #[tokio::test]
  async fn should_run_on_all_primaries() {
    let driver = MockDriver::cluster(3);
    let executor = executor(&driver, 5);

    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::DbSize, vec![]))
      .await
      .unwrap();

    assert_eq!(result.len(), 3);
    assert!(!result.has_errors());
    assert_eq!(result.into_values().unwrap(), vec![
      RedisValue::Integer(0),
      RedisValue::Integer(0),
      RedisValue::Integer(0)
    ]);
  }

  #[tokio::test]
  async fn should_dispatch_per_key_and_sort_results() {
    let driver = MockDriver::cluster(3);
    let executor = executor(&driver, 5);
    let keys: Vec<RedisKey> = vec!["a".into(), "b".into(), "c".into()];

    for key in keys.iter() {
      let key_str = key.as_str().unwrap().to_owned();
      executor.execute_for_key(key, |connection| {
        let command = set(&key_str, &key_str);
        async move { connection.request(command).await }
      })
      .await
      .unwrap();
    }

    let result = executor
      .run_for_keys(keys.clone(), |key| RedisCommand::new(RedisCommandKind::Get, vec![key.into()]))
      .await
      .unwrap();

    assert_eq!(result.values_sorted_by_keys(&keys).unwrap(), vec![
      RedisValue::from("a"),
      RedisValue::from("b"),
      RedisValue::from("c")
    ]);
  }

  #[tokio::test]
  async fn should_follow_moved_redirections() {
    let driver = MockDriver::cluster(3);
    let executor = executor(&driver, 5);
    let key = RedisKey::from("foo");

    executor.run_on_node(&executor.key_serving_primary(&key).await.unwrap(), set("foo", "bar"))
      .await
      .unwrap();

    let owner = driver.slot_owner(key.cluster_hash()).unwrap();
    let target = driver.servers().into_iter().find(|s| *s != owner).unwrap();
    driver.move_slot(key.cluster_hash(), &target).unwrap();

    let value = executor
      .execute_for_key(&key, |connection| async move {
        connection
          .request(RedisCommand::new(RedisCommandKind::Get, vec!["foo".into()]))
          .await
      })
      .await
      .unwrap();
    assert_eq!(value, RedisValue::from("bar"));
  }

  #[tokio::test]
  async fn should_stop_after_too_many_redirections() {
    let driver = MockDriver::cluster(3);
    let executor = executor(&driver, 0);
    let key = RedisKey::from("foo");
    let node = executor.key_serving_primary(&key).await.unwrap();

    let owner = driver.slot_owner(key.cluster_hash()).unwrap();
    let target = driver.servers().into_iter().find(|s| *s != owner).unwrap();
    driver.move_slot(key.cluster_hash(), &target).unwrap();

    let error = executor.run_on_node(&node, set("foo", "bar")).await.unwrap_err();
    assert_eq!(error.details(), "Too many cluster redirections");
    assert_eq!(*error.kind(), RedisErrorKind::Cluster);
  }

  #[tokio::test]
  async fn should_keep_failures_per_node() {
    let driver = MockDriver::cluster(3);
    let executor = executor(&driver, 5);
    let _ = executor.topology().await.unwrap();
    driver.fail_server(&driver.servers()[1]);

    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::Ping, vec![]))
      .await
      .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.values().len(), 2);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].0.server, driver.servers()[1]);

    let pong = executor
      .run_on_arbitrary_node(RedisCommand::new(RedisCommandKind::Ping, vec![]))
      .await
      .unwrap();
    assert_eq!(pong.as_str().unwrap(), "PONG");
  }

  #[tokio::test]
  async fn should_reuse_idle_node_connections() {
    let driver = MockDriver::cluster(3);
    let executor = executor_with(&driver, 5, 1);
    let _ = executor.topology().await.unwrap();
    let dbsize = || RedisCommand::new(RedisCommandKind::DbSize, vec![]);

    executor.run_on_all_primaries(dbsize()).await.unwrap();
    let connects = driver.connect_count();
    for _ in 0 .. 10 {
      executor.run_on_all_primaries(dbsize()).await.unwrap();
    }
    assert_eq!(driver.connect_count(), connects);

    executor.resources.destroy().await;
    assert_eq!(driver.open_connections(), 0);
  }
}
