use crate::{
  cluster::topology::TopologyProvider,
  driver::{ConnectOptions, Driver, DriverConnection, ResponseFuture},
  error::{RedisError, RedisErrorKind},
  protocol::{
    command::{RedisCommand, RedisCommandKind},
    utils::{parse_redirection, Redirection},
  },
  types::*,
};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{
  collections::HashMap,
  fmt,
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
  },
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1 << 48);

struct ClusterState {
  name:          Arc<String>,
  driver:        Arc<dyn Driver>,
  options:       ConnectOptions,
  topology:      Arc<dyn TopologyProvider>,
  connections:   Mutex<HashMap<Server, Arc<dyn DriverConnection>>>,
  max_redirects: usize,
  auto_flush:    AtomicBool,
  multi:         AtomicBool,
  open:          AtomicBool,
}

impl ClusterState {
  fn cached_connection(&self, server: &Server) -> Option<Arc<dyn DriverConnection>> {
    self
      .connections
      .lock()
      .get(server)
      .filter(|conn| conn.is_open())
      .cloned()
  }

  async fn connection_for(&self, server: &Server) -> Result<Arc<dyn DriverConnection>, RedisError> {
    if let Some(conn) = self.cached_connection(server) {
      return Ok(conn);
    }
    if !self.open.load(Ordering::SeqCst) {
      return Err(RedisError::new(RedisErrorKind::Canceled, "Connection closed."));
    }

    debug!("{}: Connecting to cluster node {}", self.name, server);
    let conn = self.driver.connect(&self.options.with_server(server.clone())).await?;
    conn.set_auto_flush(self.auto_flush.load(Ordering::SeqCst));

    let replaced = self.connections.lock().insert(server.clone(), conn.clone());
    if let Some(old) = replaced {
      old.close().await;
    }
    Ok(conn)
  }

  /// Find the node that should receive the command using only cached state.
  fn cached_route(&self, command: &RedisCommand) -> Option<Server> {
    let topology = self.topology.cached()?;

    match command.cluster_hash() {
      Some(slot) => topology.slot_serving_primary(slot).map(|node| node.server.clone()),
      None => topology
        .active_primaries()
        .choose(&mut rand::thread_rng())
        .map(|node| node.server.clone()),
    }
  }

  async fn route(&self, command: &RedisCommand) -> Result<Server, RedisError> {
    let topology = self.topology.topology().await?;

    let node = match command.cluster_hash() {
      Some(slot) => topology.slot_serving_primary(slot),
      None => topology.active_primaries().choose(&mut rand::thread_rng()).copied(),
    };
    node.map(|node| node.server.clone()).ok_or_else(|| {
      RedisError::new(
        RedisErrorKind::Cluster,
        format!("Could not find a cluster node for {}.", command.cmd_str()),
      )
    })
  }

  async fn send(&self, command: RedisCommand, response: Option<ResponseFuture>) -> Result<Resp2Frame, RedisError> {
    let mut response = match response {
      Some(response) => response,
      None => {
        let server = self.route(&command).await?;
        self.connection_for(&server).await?.dispatch(command.clone())
      },
    };
    let mut redirections = 0;

    loop {
      let frame = response.await?;
      let redirection = match frame {
        Resp2Frame::Error(ref details) => parse_redirection(details),
        _ => None,
      };
      let redirection = match redirection {
        Some(redirection) => redirection,
        None => return Ok(frame),
      };

      redirections += 1;
      if redirections > self.max_redirects {
        return Err(RedisError::new(
          RedisErrorKind::Cluster,
          "Too many cluster redirections",
        ));
      }

      response = match redirection {
        Redirection::Moved { slot, server } => {
          debug!("{}: Slot {} moved to {}", self.name, slot, server);
          if let Err(e) = self.topology.refresh().await {
            warn!("{}: Failed to refresh cluster topology: {:?}", self.name, e);
          }
          self.connection_for(&server).await?.dispatch(command.clone())
        },
        Redirection::Ask { slot, server } => {
          debug!("{}: Asking {} for slot {}", self.name, server, slot);
          let conn = self.connection_for(&server).await?;
          let asking = conn.dispatch(RedisCommand::new(RedisCommandKind::Asking, vec![]));
          let response = conn.dispatch(command.clone());
          if !self.auto_flush.load(Ordering::SeqCst) {
            conn.flush();
          }
          let _ = asking.await?;
          response
        },
      };
    }
  }
}

/// A driver connection that routes every command to the primary that owns its hash slot.
///
/// Commands without keys go to a random primary. `MOVED` replies refresh the topology and retry on the new owner, and
/// `ASK` replies retry once on the importing node after `ASKING`, up to the configured number of redirections.
pub struct ClusterDriverConnection {
  id:     u64,
  server: Server,
  state:  Arc<ClusterState>,
}

impl fmt::Debug for ClusterDriverConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClusterDriverConnection")
      .field("id", &self.id)
      .field("nodes", &self.state.connections.lock().len())
      .finish()
  }
}

impl ClusterDriverConnection {
  /// Read the topology and connect to every active primary.
  pub async fn connect(
    driver: Arc<dyn Driver>,
    options: ConnectOptions,
    topology: Arc<dyn TopologyProvider>,
    max_redirects: usize,
  ) -> Result<Self, RedisError> {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let snapshot = topology.topology().await?;
    let primaries: Vec<Server> = snapshot
      .active_primaries()
      .into_iter()
      .map(|node| node.server.clone())
      .collect();
    let server = primaries.first().cloned().unwrap_or_else(|| options.server.clone());

    let state = Arc::new(ClusterState {
      name: Arc::new(format!("cluster-{}", id)),
      driver,
      options,
      topology,
      max_redirects,
      connections: Mutex::new(HashMap::new()),
      auto_flush: AtomicBool::new(true),
      multi: AtomicBool::new(false),
      open: AtomicBool::new(true),
    });

    let results = join_all(primaries.iter().map(|server| state.connection_for(server))).await;
    let mut connected = 0;
    for (server, result) in primaries.iter().zip(results.into_iter()) {
      match result {
        Ok(_) => connected += 1,
        Err(e) => warn!("{}: Failed to connect to {}: {:?}", state.name, server, e),
      }
    }
    if connected == 0 && !primaries.is_empty() {
      return Err(RedisError::new(
        RedisErrorKind::IO,
        "Failed to connect to any cluster node.",
      ));
    }

    Ok(ClusterDriverConnection { id, server, state })
  }

  /// Read the servers with an open node connection.
  pub fn connected_servers(&self) -> Vec<Server> {
    let mut servers: Vec<Server> = self
      .state
      .connections
      .lock()
      .iter()
      .filter(|(_, conn)| conn.is_open())
      .map(|(server, _)| server.clone())
      .collect();
    servers.sort();
    servers
  }
}

#[async_trait]
impl DriverConnection for ClusterDriverConnection {
  fn id(&self) -> u64 {
    self.id
  }

  fn server(&self) -> &Server {
    &self.server
  }

  fn dispatch(&self, command: RedisCommand) -> ResponseFuture {
    if command.kind.is_multi() {
      self.state.multi.store(true, Ordering::SeqCst);
    } else if command.kind.ends_transaction() {
      self.state.multi.store(false, Ordering::SeqCst);
    }

    // write now when the route is known so commands reach each node in the order they were issued
    let response = self
      .state
      .cached_route(&command)
      .and_then(|server| self.state.cached_connection(&server))
      .map(|conn| conn.dispatch(command.clone()));

    let state = self.state.clone();
    Box::pin(async move { state.send(command, response).await })
  }

  fn set_auto_flush(&self, enabled: bool) {
    self.state.auto_flush.store(enabled, Ordering::SeqCst);
    for conn in self.state.connections.lock().values() {
      conn.set_auto_flush(enabled);
    }
  }

  fn flush(&self) {
    for conn in self.state.connections.lock().values() {
      conn.flush();
    }
  }

  fn is_open(&self) -> bool {
    self.state.open.load(Ordering::SeqCst)
  }

  fn is_multi(&self) -> bool {
    self.state.multi.load(Ordering::SeqCst)
  }

  async fn close(&self) {
    self.state.open.store(false, Ordering::SeqCst);
    let connections: Vec<_> = self.state.connections.lock().drain().map(|(_, conn)| conn).collect();

    debug!("{}: Closing {} node connection(s).", self.state.name, connections.len());
    join_all(connections.iter().map(|conn| conn.close())).await;
  }
}
