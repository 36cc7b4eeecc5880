use crate::{
  driver::{ConnectOptions, Driver},
  error::{RedisError, RedisErrorKind},
  types::{ClusterNode, NodeFlag, Server, SlotRange},
  utils,
};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::{collections::HashSet, fmt, sync::Arc, time::Duration};
use tokio::{sync::Mutex as AsyncMutex, time::Instant};

/// An immutable snapshot of the cluster's nodes and slot ownership.
///
/// Two topologies built from the same cluster state compare equal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Topology {
  /// Every node, sorted by address.
  nodes: Vec<ClusterNode>,
  /// Slot ranges owned by primaries, sorted by their first slot, with the index of the owning node.
  slots: Vec<(SlotRange, usize)>,
}

impl Topology {
  pub fn new(mut nodes: Vec<ClusterNode>) -> Self {
    // `myself` only names the node that answered
    for node in nodes.iter_mut() {
      node.flags.retain(|flag| *flag != NodeFlag::Myself);
    }
    nodes.sort();
    nodes.dedup();

    let mut slots: Vec<(SlotRange, usize)> = nodes
      .iter()
      .enumerate()
      .filter(|(_, node)| node.is_primary())
      .flat_map(|(idx, node)| node.slots.iter().map(move |range| (*range, idx)))
      .collect();
    slots.sort_by_key(|(range, _)| range.start);

    Topology { nodes, slots }
  }

  /// Read every known node.
  pub fn nodes(&self) -> &[ClusterNode] {
    &self.nodes
  }

  /// Read the nodes that are not flagged as failing or unreachable.
  pub fn active_nodes(&self) -> Vec<&ClusterNode> {
    self.nodes.iter().filter(|node| node.is_active()).collect()
  }

  pub fn primaries(&self) -> Vec<&ClusterNode> {
    self.nodes.iter().filter(|node| node.is_primary()).collect()
  }

  /// Read the active primaries that own at least one slot.
  pub fn active_primaries(&self) -> Vec<&ClusterNode> {
    self
      .nodes
      .iter()
      .filter(|node| node.is_primary() && node.is_active() && !node.slots.is_empty())
      .collect()
  }

  /// Read the replicas of the provided primary.
  pub fn replicas_of(&self, primary: &ClusterNode) -> Vec<&ClusterNode> {
    self
      .nodes
      .iter()
      .filter(|node| node.primary_id.as_ref().map(|id| *id == primary.id).unwrap_or(false))
      .collect()
  }

  /// Find the primary that owns the slot.
  pub fn slot_serving_primary(&self, slot: u16) -> Option<&ClusterNode> {
    let idx = self.slots.partition_point(|(range, _)| range.end < slot);

    self
      .slots
      .get(idx)
      .filter(|(range, _)| range.contains(slot))
      .and_then(|(_, node_idx)| self.nodes.get(*node_idx))
  }

  /// Read the primary that owns the slot, followed by its replicas.
  pub fn slot_serving_nodes(&self, slot: u16) -> Vec<&ClusterNode> {
    match self.slot_serving_primary(slot) {
      Some(primary) => {
        let mut out = vec![primary];
        out.extend(self.replicas_of(primary));
        out
      },
      None => Vec::new(),
    }
  }

  pub fn key_serving_primary(&self, key: &[u8]) -> Option<&ClusterNode> {
    self.slot_serving_primary(redis_protocol::redis_keyslot(key))
  }

  pub fn key_serving_nodes(&self, key: &[u8]) -> Vec<&ClusterNode> {
    self.slot_serving_nodes(redis_protocol::redis_keyslot(key))
  }

  pub fn lookup_id(&self, id: &str) -> Option<&ClusterNode> {
    self.nodes.iter().find(|node| &*node.id == id)
  }

  pub fn lookup_address(&self, host: &str, port: u16) -> Option<&ClusterNode> {
    self
      .nodes
      .iter()
      .find(|node| &*node.server.host == host && node.server.port == port)
  }

  /// Find the current version of a node, by ID first and then by address in case the ID is stale.
  pub fn lookup(&self, node: &ClusterNode) -> Result<&ClusterNode, RedisError> {
    let by_id = if node.has_id() {
      self.lookup_id(&node.id)
    } else {
      None
    };

    by_id
      .or_else(|| self.lookup_address(&node.server.host, node.server.port))
      .ok_or_else(|| {
        RedisError::new(
          RedisErrorKind::Cluster,
          format!(
            "Could not find node at {}. Is your cluster info up to date?",
            node.server
          ),
        )
      })
  }

  /// Read the number of slots that are owned by a primary.
  pub fn covered_slots(&self) -> usize {
    self.slots.iter().map(|(range, _)| range.len()).sum()
  }
}

/// A source of cluster topology snapshots.
#[async_trait]
pub trait TopologyProvider: Send + Sync + fmt::Debug {
  /// Read the current topology, fetching it if there is no cached snapshot or the snapshot expired.
  async fn topology(&self) -> Result<Arc<Topology>, RedisError>;

  /// Fetch a new topology, replacing any cached snapshot.
  async fn refresh(&self) -> Result<Arc<Topology>, RedisError>;

  /// Read the cached snapshot without fetching.
  fn cached(&self) -> Option<Arc<Topology>>;
}

#[derive(Debug)]
struct CachedTopology {
  topology: Arc<Topology>,
  fetched:  Instant,
}

/// A topology provider that reads `CLUSTER NODES` from any reachable node and caches the result for a short time.
///
/// Known active nodes are tried in random order before the seed nodes from the config.
pub struct CachingTopologyProvider {
  driver:  Arc<dyn Driver>,
  options: ConnectOptions,
  seeds:   Vec<Server>,
  ttl:     Duration,
  cache:   ArcSwapOption<CachedTopology>,
  refresh: AsyncMutex<()>,
}

impl fmt::Debug for CachingTopologyProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CachingTopologyProvider")
      .field("seeds", &self.seeds)
      .field("ttl", &self.ttl)
      .finish()
  }
}

impl CachingTopologyProvider {
  pub fn new(driver: Arc<dyn Driver>, options: ConnectOptions, seeds: Vec<Server>, ttl: Duration) -> Self {
    CachingTopologyProvider {
      driver,
      options,
      seeds,
      ttl,
      cache: ArcSwapOption::empty(),
      refresh: AsyncMutex::new(()),
    }
  }

  fn read_fresh(&self) -> Option<Arc<Topology>> {
    self
      .cache
      .load_full()
      .filter(|cached| cached.fetched.elapsed() < self.ttl)
      .map(|cached| cached.topology.clone())
  }

  fn candidates(&self) -> Vec<Server> {
    let mut known: Vec<Server> = match self.cache.load_full() {
      Some(cached) => cached
        .topology
        .active_nodes()
        .into_iter()
        .map(|node| node.server.clone())
        .collect(),
      None => Vec::new(),
    };
    utils::shuffle(&mut known);

    let mut seen = HashSet::new();
    known
      .into_iter()
      .chain(self.seeds.iter().cloned())
      .filter(|server| seen.insert(server.clone()))
      .collect()
  }

  async fn fetch(&self) -> Result<Arc<Topology>, RedisError> {
    let mut last_error = None;

    for server in self.candidates().into_iter() {
      debug!("Reading cluster topology from {}", server);

      match self.driver.fetch_topology(&self.options.with_server(server.clone())).await {
        Ok(nodes) => {
          let topology = Arc::new(Topology::new(nodes));
          self.cache.store(Some(Arc::new(CachedTopology {
            topology: topology.clone(),
            fetched:  Instant::now(),
          })));

          return Ok(topology);
        },
        Err(e) => {
          warn!("Failed to read cluster topology from {}: {:?}", server, e);
          last_error = Some(e);
        },
      }
    }

    Err(RedisError::new(
      RedisErrorKind::Cluster,
      match last_error {
        Some(e) => format!("Cannot obtain cluster topology: {}", e),
        None => "Cannot obtain cluster topology: no known nodes.".to_owned(),
      },
    ))
  }
}

#[async_trait]
impl TopologyProvider for CachingTopologyProvider {
  async fn topology(&self) -> Result<Arc<Topology>, RedisError> {
    if let Some(topology) = self.read_fresh() {
      return Ok(topology);
    }

    let _guard = self.refresh.lock().await;
    // another caller may have refreshed while this one waited
    if let Some(topology) = self.read_fresh() {
      return Ok(topology);
    }
    self.fetch().await
  }

  async fn refresh(&self) -> Result<Arc<Topology>, RedisError> {
    let _guard = self.refresh.lock().await;
    self.fetch().await
  }

  fn cached(&self) -> Option<Arc<Topology>> {
    self.cache.load_full().map(|cached| cached.topology.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    mocks::MockDriver,
    types::{ClientConfig, LinkState},
  };
  use bytes_utils::Str;

  fn primary(id: &str, port: u16, start: u16, end: u16) -> ClusterNode {
    ClusterNode {
      id: Str::from(id),
      slots: vec![SlotRange::new(start, end)],
      ..ClusterNode::from_server(Server::new("127.0.0.1", port))
    }
  }

  fn replica(id: &str, port: u16, primary_id: &str) -> ClusterNode {
    ClusterNode {
      id: Str::from(id),
      flags: vec![NodeFlag::Replica],
      primary_id: Some(Str::from(primary_id)),
      ..ClusterNode::from_server(Server::new("127.0.0.1", port))
    }
  }

  fn topology() -> Topology {
    Topology::new(vec![
      primary("b", 30002, 5461, 10922),
      primary("a", 30001, 0, 5460),
      primary("c", 30003, 10923, 16383),
      replica("d", 30004, "a"),
    ])
  }

  #[test]
  fn should_find_slot_owners() {
    let topology = topology();

    assert_eq!(topology.slot_serving_primary(0).unwrap().server.port, 30001);
    assert_eq!(topology.slot_serving_primary(5460).unwrap().server.port, 30001);
    assert_eq!(topology.slot_serving_primary(5461).unwrap().server.port, 30002);
    assert_eq!(topology.slot_serving_primary(16383).unwrap().server.port, 30003);
    assert_eq!(topology.covered_slots(), 16384);
  }

  #[test]
  fn should_not_find_uncovered_slots() {
    let topology = Topology::new(vec![primary("a", 30001, 0, 100)]);
    assert!(topology.slot_serving_primary(101).is_none());
  }

  #[test]
  fn should_read_replicas() {
    let topology = topology();
    let nodes = topology.slot_serving_nodes(1);

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1].server.port, 30004);
    assert_eq!(topology.primaries().len(), 3);
  }

  #[test]
  fn should_lookup_by_address_when_id_is_stale() {
    let topology = topology();
    let stale = primary("zzz", 30002, 0, 0);

    assert_eq!(&*topology.lookup(&stale).unwrap().id, "b");
  }

  #[test]
  fn should_fail_lookup_for_unknown_nodes() {
    let topology = topology();
    let error = topology
      .lookup(&ClusterNode::from_server(Server::new("127.0.0.1", 40000)))
      .unwrap_err();

    assert_eq!(
      error.details(),
      "Could not find node at 127.0.0.1:40000. Is your cluster info up to date?"
    );
  }

  #[test]
  fn should_compare_equal_regardless_of_input_order() {
    let mut nodes = topology().nodes().to_vec();
    nodes.reverse();

    assert_eq!(Topology::new(nodes), topology());
  }

  #[tokio::test]
  async fn should_refresh_to_equal_topologies() {
    let driver = MockDriver::cluster(3);
    let options = ConnectOptions::from_config(&ClientConfig::default(), driver.servers()[0].clone());
    let provider = CachingTopologyProvider::new(
      Arc::new(driver.clone()),
      options,
      driver.servers(),
      Duration::from_secs(60),
    );

    let first = provider.refresh().await.unwrap();
    let second = provider.refresh().await.unwrap();
    let third = provider.refresh().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(provider.cached(), Some(third));
    assert!(first.nodes().iter().all(|node| !node.has_flag(NodeFlag::Myself)));
  }

  #[test]
  fn should_exclude_failed_primaries() {
    let mut failed = primary("c", 30003, 10923, 16383);
    failed.link_state = LinkState::Disconnected;
    let topology = Topology::new(vec![primary("a", 30001, 0, 10922), failed]);

    assert_eq!(topology.active_primaries().len(), 1);
  }
}
