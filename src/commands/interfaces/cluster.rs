use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{ClusterNode, FromRedis, InfoKind, MultiNodeResult, RedisKey, RedisValue, ScanOptions, ScanPage, SlotState},
};
use std::{collections::HashMap, convert::TryInto};

/// Functions that implement the [cluster](https://redis.io/commands#cluster) interface, and functions that inspect
/// or target individual nodes of the cached cluster state.
#[async_trait]
pub trait ClusterInterface: ClientLike + Sized {
  /// Read every node in the cached cluster state.
  async fn cluster_nodes(&self) -> RedisResult<Vec<ClusterNode>> {
    commands::cluster::cluster_nodes(self).await
  }

  /// Read the primary nodes in the cached cluster state.
  async fn cluster_primaries(&self) -> RedisResult<Vec<ClusterNode>> {
    commands::cluster::cluster_primaries(self).await
  }

  /// Read the replicas of `primary`.
  async fn cluster_replicas(&self, primary: &ClusterNode) -> RedisResult<Vec<ClusterNode>> {
    commands::cluster::cluster_replicas(self, primary).await
  }

  /// Read a mapping of every primary to its replicas.
  async fn cluster_primary_replica_map(&self) -> RedisResult<HashMap<ClusterNode, Vec<ClusterNode>>> {
    commands::cluster::cluster_primary_replica_map(self).await
  }

  /// Compute the hash slot of a key, following hash tags.
  fn cluster_slot_for_key<K>(&self, key: K) -> u16
  where
    K: Into<RedisKey>,
  {
    commands::cluster::cluster_slot_for_key(&key.into())
  }

  /// Read the primary that serves `slot`.
  async fn cluster_node_for_slot(&self, slot: u16) -> RedisResult<ClusterNode> {
    commands::cluster::cluster_node_for_slot(self, slot).await
  }

  /// Read the primary that serves the slot of `key`.
  async fn cluster_node_for_key<K>(&self, key: K) -> RedisResult<ClusterNode>
  where
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::cluster::cluster_node_for_key(self, &key).await
  }

  /// Read the cluster state reported by an arbitrary node.
  ///
  /// <https://redis.io/commands/cluster-info>
  async fn cluster_info<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::cluster_info(self).await?.convert()
  }

  /// Assign new hash slots to `node`.
  ///
  /// <https://redis.io/commands/cluster-addslots>
  async fn cluster_add_slots(&self, node: &ClusterNode, slots: Vec<u16>) -> RedisResult<()> {
    commands::cluster::cluster_add_slots(self, node, slots).await
  }

  /// <https://redis.io/commands/cluster-delslots>
  async fn cluster_delete_slots(&self, node: &ClusterNode, slots: Vec<u16>) -> RedisResult<()> {
    commands::cluster::cluster_delete_slots(self, node, slots).await
  }

  /// Remove `node` from the node tables of every other node.
  ///
  /// <https://redis.io/commands/cluster-forget>
  async fn cluster_forget(&self, node: &ClusterNode) -> RedisResult<()> {
    commands::cluster::cluster_forget(self, node).await
  }

  /// Ask every node to connect to the node at `host:port`.
  ///
  /// <https://redis.io/commands/cluster-meet>
  async fn cluster_meet<H>(&self, host: H, port: u16) -> RedisResult<()>
  where
    H: TryInto<RedisValue> + Send,
    H::Error: Into<RedisError> + Send,
  {
    try_into!(host);
    commands::cluster::cluster_meet(self, host, port).await
  }

  /// Change the state of `slot` on `node`.
  ///
  /// <https://redis.io/commands/cluster-setslot>
  async fn cluster_set_slot(&self, node: &ClusterNode, slot: u16, state: SlotState) -> RedisResult<()> {
    commands::cluster::cluster_set_slot(self, node, slot, state).await
  }

  /// Reconfigure `replica` as a replica of `primary`.
  ///
  /// <https://redis.io/commands/cluster-replicate>
  async fn cluster_replicate(&self, primary: &ClusterNode, replica: &ClusterNode) -> RedisResult<()> {
    commands::cluster::cluster_replicate(self, primary, replica).await
  }

  /// Count the keys in `slot`, on the node that serves it.
  ///
  /// <https://redis.io/commands/cluster-countkeysinslot>
  async fn cluster_count_keys_in_slot<R>(&self, slot: u16) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::cluster_count_keys_in_slot(self, slot)
      .await?
      .convert()
  }

  /// Read up to `count` keys in `slot`, from the node that serves it.
  ///
  /// <https://redis.io/commands/cluster-getkeysinslot>
  async fn cluster_get_keys_in_slot<R>(&self, slot: u16, count: u64) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::cluster_get_keys_in_slot(self, slot, count)
      .await?
      .convert()
  }

  /// Ping a single node.
  async fn ping_node<R>(&self, node: &ClusterNode) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::ping_node(self, node).await?.convert()
  }

  /// Read the keys matching `pattern` on a single node.
  async fn keys_on_node<R, P>(&self, node: &ClusterNode, pattern: P) -> RedisResult<R>
  where
    R: FromRedis,
    P: TryInto<RedisValue> + Send,
    P::Error: Into<RedisError> + Send,
  {
    try_into!(pattern);
    commands::cluster::keys_on_node(self, node, pattern).await?.convert()
  }

  async fn randomkey_on_node<R>(&self, node: &ClusterNode) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::randomkey_on_node(self, node).await?.convert()
  }

  /// Read the number of keys on a single node.
  async fn dbsize_on_node<R>(&self, node: &ClusterNode) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::dbsize_on_node(self, node).await?.convert()
  }

  async fn flushdb_on_node(&self, node: &ClusterNode, r#async: bool) -> RedisResult<()> {
    commands::cluster::flushdb_on_node(self, node, r#async).await
  }

  async fn info_on_node<R>(&self, node: &ClusterNode, section: Option<InfoKind>) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::info_on_node(self, node, section)
      .await?
      .convert()
  }

  /// Run a command by name on a single node.
  ///
  /// Redirections are not followed. The number of arguments is checked against the command registry when the name
  /// is known.
  async fn execute_on_node<R>(&self, node: &ClusterNode, name: &str, args: Vec<RedisValue>) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::cluster::execute_on_node(self, node, name, args)
      .await?
      .convert()
  }

  /// Run a command by name on every node, primaries and replicas, returning the outcome of each node.
  async fn execute_on_all_nodes(&self, name: &str, args: Vec<RedisValue>) -> RedisResult<MultiNodeResult<RedisValue>> {
    commands::cluster::execute_on_all_nodes(self, name, args).await
  }

  /// Read one page of the keys stored on `node`. Cursors are only valid on the node that returned them.
  ///
  /// <https://redis.io/commands/scan>
  async fn scan_node(
    &self,
    node: &ClusterNode,
    cursor: u64,
    options: ScanOptions,
  ) -> RedisResult<ScanPage<Vec<RedisKey>>> {
    commands::scan::scan_node(self, node, cursor, options).await
  }
}
