//! An in-memory driver for tests.
//!
//! The mock driver simulates one server or a cluster of primaries inside the process. Commands are encoded to RESP
//! frames exactly as they would be written to a socket and then interpreted against shared in-memory state, so
//! everything above the driver layer runs unchanged:
//!
//! * Strings, keys, lists, hashes, sets, sorted sets, streams and geo indexes.
//! * `MULTI`/`EXEC` with `WATCH`, blocking pops, pubsub and script caching.
//! * Slot ownership with `MOVED`, `ASK` and `CROSSSLOT` errors in cluster mode.
//! * Cursor based `SCAN`, `HSCAN`, `SSCAN` and `ZSCAN` over keys sorted by name.
//! * Sentinel nodes that report, fail over and monitor primaries.
//!
//! Scripts are cached but never interpreted. `EVAL` and `EVALSHA` reply with their keys followed by their arguments.
//!
//! The driver also records every command it receives and exposes helpers to move slots and fail nodes.

use crate::{
  driver::{handshake, ConnectOptions, Driver, DriverConnection, ResponseFuture},
  error::{RedisError, RedisErrorKind},
  protocol::{command::RedisCommand, utils as protocol_utils},
  types::*,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::{
  collections::{BTreeMap, HashMap, HashSet},
  fmt,
  sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};
use tokio::{
  sync::{broadcast, oneshot},
  time::Instant,
};

mod collections;
pub mod db;
mod server;

use server::{MockData, MockNode, Monitored, Session};

/// How often a blocked command checks for new data.
const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MESSAGE_CAPACITY: usize = 1024;

/// A command received by the mock driver.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoggedCommand {
  pub server: Server,
  /// The command name, including the subcommand for container commands such as `CLUSTER NODES`.
  pub name:   String,
  pub args:   Vec<Bytes>,
}

#[derive(Debug)]
struct MockState {
  data:     Mutex<MockData>,
  log:      Mutex<Vec<LoggedCommand>>,
  failed:   Mutex<HashSet<Server>>,
  connects: AtomicUsize,
  open:     AtomicUsize,
  next_id:  AtomicU64,
}

/// A driver backed by in-memory servers.
///
/// Clones share the same servers.
#[derive(Clone, Debug)]
pub struct MockDriver {
  state: Arc<MockState>,
}

impl MockDriver {
  fn new(clustered: bool, nodes: Vec<MockNode>) -> Self {
    MockDriver {
      state: Arc::new(MockState {
        data:     Mutex::new(MockData {
          clustered,
          nodes,
          scripts: HashMap::new(),
          subscribers: HashMap::new(),
          password: None,
          sentinel_password: None,
          monitored: BTreeMap::new(),
          last_save: 0,
        }),
        log:      Mutex::new(Vec::new()),
        failed:   Mutex::new(HashSet::new()),
        connects: AtomicUsize::new(0),
        open:     AtomicUsize::new(0),
        next_id:  AtomicU64::new(1),
      }),
    }
  }

  /// Create a driver that simulates one server at `127.0.0.1:6379`.
  pub fn standalone() -> Self {
    let server = Server::new("127.0.0.1", 6379);
    MockDriver::new(false, vec![MockNode::new(0, server, vec![SlotRange::new(0, SLOT_COUNT - 1)])])
  }

  /// Create a driver that simulates a cluster of primaries listening on `127.0.0.1:30001` and up, with the slots
  /// split evenly between them.
  pub fn cluster(primaries: usize) -> Self {
    let primaries = primaries.max(1);
    let per_node = SLOT_COUNT as f64 / primaries as f64;
    let mut start = 0_u16;
    let nodes = (0 .. primaries)
      .map(|idx| {
        // same split as `redis-cli --cluster create`
        let end = if idx == primaries - 1 {
          SLOT_COUNT - 1
        } else {
          ((per_node * (idx + 1) as f64 - 1.0).round() as u16).max(start)
        };
        let node = MockNode::new(idx, Server::new("127.0.0.1", 30001 + idx as u16), vec![
          SlotRange::new(start, end),
        ]);
        start = end.saturating_add(1);
        node
      })
      .collect();

    MockDriver::new(true, nodes)
  }

  /// Create a driver that simulates a primary at `127.0.0.1:6380` with a replica at `127.0.0.1:6381`, monitored by
  /// sentinels at `127.0.0.1:26379`, `26380` and `26381` under the provided service name with a quorum of 2.
  ///
  /// Only the sentinels answer `SENTINEL` commands, and they answer nothing else besides the handshake.
  pub fn sentinel<S: Into<String>>(service_name: S) -> Self {
    let primary = Server::new("127.0.0.1", 6380);
    let replica = Server::new("127.0.0.1", 6381);
    let mut nodes = vec![
      MockNode::new(0, primary.clone(), vec![SlotRange::new(0, SLOT_COUNT - 1)]),
      MockNode::new(1, replica.clone(), vec![]),
    ];
    for (idx, port) in [26379, 26380, 26381].iter().enumerate() {
      let mut node = MockNode::new(idx + 2, Server::new("127.0.0.1", *port), vec![]);
      node.sentinel = true;
      nodes.push(node);
    }

    let driver = MockDriver::new(false, nodes);
    driver.state.data.lock().monitored.insert(service_name.into(), Monitored {
      primary,
      replicas: vec![replica],
      quorum: 2,
    });
    driver
  }

  /// Require `AUTH` with the provided password on every connection.
  pub fn with_password<S: Into<String>>(self, password: S) -> Self {
    self.state.data.lock().password = Some(password.into());
    self
  }

  /// Require `AUTH` with the provided password on connections to sentinel nodes.
  pub fn with_sentinel_password<S: Into<String>>(self, password: S) -> Self {
    self.state.data.lock().sentinel_password = Some(password.into());
    self
  }

  /// Read the address of every simulated sentinel.
  pub fn sentinels(&self) -> Vec<Server> {
    self
      .state
      .data
      .lock()
      .nodes
      .iter()
      .filter(|node| node.sentinel)
      .map(|node| node.server.clone())
      .collect()
  }

  /// Read the primary the sentinels currently report for the service.
  pub fn monitored_primary(&self, service_name: &str) -> Option<Server> {
    self
      .state
      .data
      .lock()
      .monitored
      .get(service_name)
      .map(|monitored| monitored.primary.clone())
  }

  /// Read the address of every simulated server.
  pub fn servers(&self) -> Vec<Server> {
    self.state.data.lock().nodes.iter().map(|n| n.server.clone()).collect()
  }

  /// Read the server that owns the slot.
  pub fn slot_owner(&self, slot: u16) -> Option<Server> {
    let data = self.state.data.lock();
    data.slot_owner(slot).map(|idx| data.nodes[idx].server.clone())
  }

  fn node_index(data: &MockData, server: &Server) -> Result<usize, RedisError> {
    data
      .nodes
      .iter()
      .position(|node| node.server == *server)
      .ok_or_else(|| RedisError::new(RedisErrorKind::InvalidArgument, format!("Unknown mock server {}", server)))
  }

  fn move_keys(data: &mut MockData, slot: u16, from: usize, to: usize) {
    for idx in 0 .. server::DATABASES {
      let keys: Vec<Bytes> = data.nodes[from].dbs[idx]
        .keys()
        .into_iter()
        .filter(|key| redis_protocol::redis_keyslot(key) == slot)
        .collect();

      for key in keys.into_iter() {
        if let Some(entry) = data.nodes[from].dbs[idx].remove(&key) {
          data.nodes[to].dbs[idx].insert(&key, entry);
        }
      }
    }
  }

  /// Move the slot and its keys to another server. Clients with a stale topology receive `MOVED` errors.
  pub fn move_slot(&self, slot: u16, target: &Server) -> Result<(), RedisError> {
    let mut data = self.state.data.lock();
    let target = MockDriver::node_index(&data, target)?;
    if let Some(owner) = data.slot_owner(slot) {
      MockDriver::move_keys(&mut data, slot, owner, target);
    }
    data.assign_slot(slot, target);
    Ok(())
  }

  /// Start migrating the slot to another server without moving any keys. Commands for keys that are not on the
  /// owner anymore receive `ASK` errors until the migration finishes.
  pub fn start_migration(&self, slot: u16, target: &Server) -> Result<(), RedisError> {
    let mut data = self.state.data.lock();
    let target = MockDriver::node_index(&data, target)?;
    let owner = data
      .slot_owner(slot)
      .ok_or_else(|| RedisError::new(RedisErrorKind::InvalidArgument, "Slot is not assigned."))?;
    data.nodes[owner].migrating.insert(slot, target);
    Ok(())
  }

  /// Move one key of a migrating slot to the importing server.
  pub fn migrate_key<K: Into<RedisKey>>(&self, key: K) -> Result<(), RedisError> {
    let key = key.into();
    let slot = key.cluster_hash();
    let mut data = self.state.data.lock();
    let owner = data
      .slot_owner(slot)
      .ok_or_else(|| RedisError::new(RedisErrorKind::InvalidArgument, "Slot is not assigned."))?;
    let target = data.nodes[owner]
      .migrating
      .get(&slot)
      .copied()
      .ok_or_else(|| RedisError::new(RedisErrorKind::InvalidArgument, "Slot is not migrating."))?;

    if let Some(entry) = data.nodes[owner].dbs[0].remove(key.as_bytes()) {
      data.nodes[target].dbs[0].insert(key.as_bytes(), entry);
    }
    Ok(())
  }

  /// Finish a migration, assigning the slot and its remaining keys to the importing server.
  pub fn finish_migration(&self, slot: u16) -> Result<(), RedisError> {
    let mut data = self.state.data.lock();
    let owner = data
      .slot_owner(slot)
      .ok_or_else(|| RedisError::new(RedisErrorKind::InvalidArgument, "Slot is not assigned."))?;
    let target = match data.nodes[owner].migrating.get(&slot).copied() {
      Some(target) => target,
      None => return Ok(()),
    };

    MockDriver::move_keys(&mut data, slot, owner, target);
    data.assign_slot(slot, target);
    Ok(())
  }

  /// Refuse new connections to the server and fail the commands sent on existing ones.
  pub fn fail_server(&self, server: &Server) {
    self.state.failed.lock().insert(server.clone());
  }

  pub fn recover_server(&self, server: &Server) {
    self.state.failed.lock().remove(server);
  }

  /// Read every command received since the driver was created or the log was cleared.
  pub fn command_log(&self) -> Vec<LoggedCommand> {
    self.state.log.lock().clone()
  }

  /// Read the names of the commands received by the provided server.
  pub fn commands_on(&self, server: &Server) -> Vec<String> {
    self
      .state
      .log
      .lock()
      .iter()
      .filter(|c| c.server == *server)
      .map(|c| c.name.clone())
      .collect()
  }

  pub fn clear_command_log(&self) {
    self.state.log.lock().clear();
  }

  /// The number of successful connections made by the driver.
  pub fn connect_count(&self) -> usize {
    self.state.connects.load(Ordering::SeqCst)
  }

  /// The number of connections that are currently open.
  pub fn open_connections(&self) -> usize {
    self.state.open.load(Ordering::SeqCst)
  }

  /// Read the keys in the first database across every server, sorted.
  pub fn keys(&self) -> Vec<Bytes> {
    let mut data = self.state.data.lock();
    let mut keys: Vec<Bytes> = data.nodes.iter_mut().flat_map(|node| node.dbs[0].keys()).collect();
    keys.sort();
    keys
  }
}

#[async_trait]
impl Driver for MockDriver {
  async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn DriverConnection>, RedisError> {
    if self.state.failed.lock().contains(&options.server) {
      return Err(RedisError::new(
        RedisErrorKind::IO,
        format!("Connection refused: {}", options.server),
      ));
    }

    let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
    let node = {
      let mut data = self.state.data.lock();
      let node = MockDriver::node_index(&data, &options.server)
        .map_err(|_| RedisError::new(RedisErrorKind::IO, format!("Connection refused: {}", options.server)))?;
      data.nodes[node].clients += 1;
      node
    };
    let messages = if options.pubsub {
      Some(broadcast::channel(MESSAGE_CAPACITY).0)
    } else {
      None
    };

    let connection = Arc::new(MockConnection {
      inner: Arc::new(MockConnectionInner {
        id,
        server: options.server.clone(),
        state: self.state.clone(),
        session: Mutex::new(Session::new(id, node, messages.clone())),
        auto_flush: AtomicBool::new(true),
        buffer: Mutex::new(Vec::new()),
        open: AtomicBool::new(true),
        multi: AtomicBool::new(false),
        messages,
      }),
    });
    self.state.connects.fetch_add(1, Ordering::SeqCst);
    self.state.open.fetch_add(1, Ordering::SeqCst);
    trace!("Opened mock connection {} to {}", id, options.server);

    if let Err(e) = handshake(connection.as_ref(), options).await {
      connection.close().await;
      return Err(e);
    }
    Ok(connection)
  }
}

enum Outcome {
  Ready(Result<Resp2Frame, RedisError>),
  Block {
    parts:    Vec<Bytes>,
    deadline: Option<Instant>,
  },
}

type Buffered = (RedisCommand, oneshot::Sender<Result<Resp2Frame, RedisError>>);

struct MockConnectionInner {
  id:         u64,
  server:     Server,
  state:      Arc<MockState>,
  session:    Mutex<Session>,
  auto_flush: AtomicBool,
  buffer:     Mutex<Vec<Buffered>>,
  open:       AtomicBool,
  multi:      AtomicBool,
  messages:   Option<broadcast::Sender<Message>>,
}

impl MockConnectionInner {
  fn closed_error() -> RedisError {
    RedisError::new(RedisErrorKind::Canceled, "Connection closed.")
  }

  fn is_failed(&self) -> bool {
    self.state.failed.lock().contains(&self.server)
  }

  /// Run the command against the shared state. Never waits.
  fn process(&self, command: &RedisCommand) -> Outcome {
    if !self.open.load(Ordering::SeqCst) {
      return Outcome::Ready(Err(MockConnectionInner::closed_error()));
    }
    if self.is_failed() {
      self.release();
      return Outcome::Ready(Err(RedisError::new(RedisErrorKind::IO, "Connection reset by peer.")));
    }
    let parts = match command.to_frame().map(|f| protocol_utils::frame_to_command_parts(&f)) {
      Ok(Some(parts)) => parts,
      Ok(None) => {
        return Outcome::Ready(Err(RedisError::new(
          RedisErrorKind::Protocol,
          "Invalid command frame.",
        )))
      },
      Err(e) => return Outcome::Ready(Err(e)),
    };
    let (name, args) = server::split_command(&parts);
    self.state.log.lock().push(LoggedCommand {
      server: self.server.clone(),
      name:   name.clone(),
      args:   args.to_vec(),
    });

    let mut data = self.state.data.lock();
    let mut session = self.session.lock();
    let keys = command.keys();
    if let Some(error) = server::check_slots(&mut data, &session, &keys) {
      if session.multi.is_some() {
        session.multi_failed = true;
      }
      session.asking = false;
      return Outcome::Ready(Ok(error));
    }

    let frame = server::execute(&mut data, &mut session, &parts);
    if name != "ASKING" {
      session.asking = false;
    }
    if command.kind.closes_connection() {
      drop(session);
      drop(data);
      self.release();
      return Outcome::Ready(Ok(frame));
    }

    if frame == Resp2Frame::Null && session.multi.is_none() {
      if let Some(timeout) = server::blocking_timeout(&name, args) {
        let mut parts = parts.clone();
        collections::pin_stream_ids(server::db(&mut data, &session), &mut parts);
        return Outcome::Block {
          parts,
          deadline: timeout.map(|t| Instant::now() + t),
        };
      }
    }
    Outcome::Ready(Ok(frame))
  }

  fn retry_blocked(&self, parts: &[Bytes]) -> Result<Resp2Frame, RedisError> {
    if !self.open.load(Ordering::SeqCst) {
      return Err(MockConnectionInner::closed_error());
    }
    let mut data = self.state.data.lock();
    let mut session = self.session.lock();
    Ok(server::execute(&mut data, &mut session, parts))
  }

  fn respond(self: &Arc<Self>, outcome: Outcome) -> ResponseFuture {
    match outcome {
      Outcome::Ready(result) => Box::pin(async move { result }),
      Outcome::Block { parts, deadline } => {
        let inner = self.clone();

        Box::pin(async move {
          loop {
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
              return Ok(Resp2Frame::Null);
            }
            tokio::time::sleep(BLOCK_POLL_INTERVAL).await;

            let frame = inner.retry_blocked(&parts)?;
            if frame != Resp2Frame::Null {
              return Ok(frame);
            }
          }
        })
      },
    }
  }

  /// Mark the connection closed and remove its server side state. Returns whether this call closed it.
  fn release(&self) -> bool {
    if !self.open.swap(false, Ordering::SeqCst) {
      return false;
    }
    self.state.open.fetch_sub(1, Ordering::SeqCst);

    let mut data = self.state.data.lock();
    data.subscribers.remove(&self.id);
    let node = self.session.lock().node;
    if let Some(node) = data.nodes.get_mut(node) {
      node.clients = node.clients.saturating_sub(1);
    }
    true
  }
}

/// A connection to a simulated server.
pub struct MockConnection {
  inner: Arc<MockConnectionInner>,
}

impl fmt::Debug for MockConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MockConnection")
      .field("id", &self.inner.id)
      .field("server", &self.inner.server)
      .finish()
  }
}

#[async_trait]
impl DriverConnection for MockConnection {
  fn id(&self) -> u64 {
    self.inner.id
  }

  fn server(&self) -> &Server {
    &self.inner.server
  }

  fn dispatch(&self, command: RedisCommand) -> ResponseFuture {
    if command.kind.is_multi() {
      self.inner.multi.store(true, Ordering::SeqCst);
    } else if command.kind.ends_transaction() {
      self.inner.multi.store(false, Ordering::SeqCst);
    }

    if self.inner.auto_flush.load(Ordering::SeqCst) {
      let outcome = self.inner.process(&command);
      self.inner.respond(outcome)
    } else {
      let (tx, rx) = oneshot::channel();
      self.inner.buffer.lock().push((command, tx));
      Box::pin(async move { rx.await? })
    }
  }

  fn set_auto_flush(&self, enabled: bool) {
    self.inner.auto_flush.store(enabled, Ordering::SeqCst);
  }

  fn flush(&self) {
    let buffered: Vec<Buffered> = self.inner.buffer.lock().drain(..).collect();

    for (command, tx) in buffered.into_iter() {
      match self.inner.process(&command) {
        Outcome::Ready(result) => {
          let _ = tx.send(result);
        },
        outcome => {
          let response = self.inner.respond(outcome);
          tokio::spawn(async move {
            let _ = tx.send(response.await);
          });
        },
      }
    }
  }

  fn is_open(&self) -> bool {
    self.inner.open.load(Ordering::SeqCst) && !self.inner.is_failed()
  }

  fn is_multi(&self) -> bool {
    self.inner.multi.load(Ordering::SeqCst)
  }

  fn messages(&self) -> Option<broadcast::Receiver<Message>> {
    self.inner.messages.as_ref().map(|tx| tx.subscribe())
  }

  async fn close(&self) {
    if self.inner.release() {
      trace!("Closed mock connection {} to {}", self.inner.id, self.inner.server);
    }
    // dropping the senders fails anything still buffered
    self.inner.buffer.lock().clear();
  }
}
