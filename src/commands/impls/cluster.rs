use super::*;
use crate::{
  cluster::Topology,
  types::{ClusterNode, InfoKind, SlotState},
};
use std::collections::HashMap;

fn executor<C: ClientLike>(client: &C) -> Result<Arc<ClusterCommandExecutor>, RedisError> {
  client.inner().cluster_executor().map(|executor| executor.clone())
}

async fn topology<C: ClientLike>(client: &C) -> Result<Arc<Topology>, RedisError> {
  executor(client)?.topology().await
}

fn no_slot_owner(slot: u16) -> RedisError {
  RedisError::new(
    RedisErrorKind::Cluster,
    format!("No node serves slot {}. Is your cluster info up to date?", slot),
  )
}

pub async fn cluster_nodes<C: ClientLike>(client: &C) -> Result<Vec<ClusterNode>, RedisError> {
  Ok(topology(client).await?.nodes().to_vec())
}

pub async fn cluster_primaries<C: ClientLike>(client: &C) -> Result<Vec<ClusterNode>, RedisError> {
  Ok(topology(client).await?.primaries().into_iter().cloned().collect())
}

pub async fn cluster_replicas<C: ClientLike>(
  client: &C,
  primary: &ClusterNode,
) -> Result<Vec<ClusterNode>, RedisError> {
  let topology = topology(client).await?;
  let primary = topology.lookup(primary)?;

  Ok(topology.replicas_of(primary).into_iter().cloned().collect())
}

pub async fn cluster_primary_replica_map<C: ClientLike>(
  client: &C,
) -> Result<HashMap<ClusterNode, Vec<ClusterNode>>, RedisError> {
  let topology = topology(client).await?;

  Ok(
    topology
      .primaries()
      .into_iter()
      .map(|primary| {
        let replicas = topology.replicas_of(primary).into_iter().cloned().collect();
        (primary.clone(), replicas)
      })
      .collect(),
  )
}

pub fn cluster_slot_for_key(key: &RedisKey) -> u16 {
  key.cluster_hash()
}

pub async fn cluster_node_for_slot<C: ClientLike>(client: &C, slot: u16) -> Result<ClusterNode, RedisError> {
  topology(client)
    .await?
    .slot_serving_primary(slot)
    .cloned()
    .ok_or_else(|| no_slot_owner(slot))
}

pub async fn cluster_node_for_key<C: ClientLike>(client: &C, key: &RedisKey) -> Result<ClusterNode, RedisError> {
  cluster_node_for_slot(client, key.cluster_hash()).await
}

pub async fn cluster_info<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
  let executor = emulation_executor(client, "CLUSTER INFO")?;
  executor
    .run_on_arbitrary_node(RedisCommand::new(RedisCommandKind::ClusterInfo, vec![]))
    .await
}

/// Run a command on one node and expect `OK`.
async fn ok_on_node<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  kind: RedisCommandKind,
  args: Vec<RedisValue>,
) -> Result<(), RedisError> {
  let executor = emulation_executor(client, kind.cmd_str())?;
  let result = executor.run_on_node(node, RedisCommand::new(kind, args)).await?;
  protocol_utils::expect_ok(&result)
}

fn slot_args(slots: Vec<u16>) -> Result<Vec<RedisValue>, RedisError> {
  if slots.is_empty() {
    Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one slot is required.",
    ))
  } else {
    Ok(slots.into_iter().map(|slot| slot.into()).collect())
  }
}

pub async fn cluster_add_slots<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  slots: Vec<u16>,
) -> Result<(), RedisError> {
  ok_on_node(client, node, RedisCommandKind::ClusterAddSlots, slot_args(slots)?).await
}

pub async fn cluster_delete_slots<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  slots: Vec<u16>,
) -> Result<(), RedisError> {
  ok_on_node(client, node, RedisCommandKind::ClusterDelSlots, slot_args(slots)?).await
}

/// Run a command on each node and fail with the first error.
async fn ok_on_nodes<C: ClientLike>(
  client: &C,
  nodes: Vec<ClusterNode>,
  command: RedisCommand,
) -> Result<(), RedisError> {
  let executor = emulation_executor(client, command.kind.cmd_str())?;
  expect_all_ok(executor.run_on_nodes(nodes, command).await).map(|_| ())
}

/// Remove the node from the node table of every other node.
pub async fn cluster_forget<C: ClientLike>(client: &C, node: &ClusterNode) -> Result<(), RedisError> {
  let topology = topology(client).await?;
  let node = topology.lookup(node)?;
  let others = topology
    .nodes()
    .iter()
    .filter(|other| other.id != node.id)
    .cloned()
    .collect();

  let command = RedisCommand::new(RedisCommandKind::ClusterForget, vec![node.id.clone().into()]);
  ok_on_nodes(client, others, command).await
}

/// Introduce a new node to every node in the cluster.
pub async fn cluster_meet<C: ClientLike>(client: &C, host: RedisValue, port: u16) -> Result<(), RedisError> {
  let nodes = topology(client).await?.nodes().to_vec();
  let command = RedisCommand::new(RedisCommandKind::ClusterMeet, vec![host, port.into()]);
  ok_on_nodes(client, nodes, command).await
}

pub async fn cluster_set_slot<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  slot: u16,
  state: SlotState,
) -> Result<(), RedisError> {
  let mut args = vec![slot.into()];
  args.extend(state.into_args().into_iter().map(|arg| arg.into()));

  ok_on_node(client, node, RedisCommandKind::ClusterSetSlot, args).await
}

/// Make `replica` a replica of `primary`. The command runs on the replica.
pub async fn cluster_replicate<C: ClientLike>(
  client: &C,
  primary: &ClusterNode,
  replica: &ClusterNode,
) -> Result<(), RedisError> {
  let primary = topology(client).await?.lookup(primary)?.clone();
  ok_on_node(client, replica, RedisCommandKind::ClusterReplicate, vec![
    primary.id.into(),
  ])
  .await
}

pub async fn cluster_count_keys_in_slot<C: ClientLike>(client: &C, slot: u16) -> Result<RedisValue, RedisError> {
  let node = cluster_node_for_slot(client, slot).await?;
  let executor = emulation_executor(client, "CLUSTER COUNTKEYSINSLOT")?;

  executor
    .run_on_node(
      &node,
      RedisCommand::new(RedisCommandKind::ClusterCountKeysInSlot, vec![slot.into()]),
    )
    .await
}

pub async fn cluster_get_keys_in_slot<C: ClientLike>(
  client: &C,
  slot: u16,
  count: u64,
) -> Result<RedisValue, RedisError> {
  let node = cluster_node_for_slot(client, slot).await?;
  let executor = emulation_executor(client, "CLUSTER GETKEYSINSLOT")?;
  let args = vec![slot.into(), to!(count)?];

  executor
    .run_on_node(&node, RedisCommand::new(RedisCommandKind::ClusterGetKeysInSlot, args))
    .await
}

/// Run a command on one node.
async fn run_on_node<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  kind: RedisCommandKind,
  args: Vec<RedisValue>,
) -> Result<RedisValue, RedisError> {
  let executor = emulation_executor(client, kind.cmd_str())?;
  executor.run_on_node(node, RedisCommand::new(kind, args)).await
}

pub async fn ping_node<C: ClientLike>(client: &C, node: &ClusterNode) -> Result<RedisValue, RedisError> {
  run_on_node(client, node, RedisCommandKind::Ping, vec![]).await
}

pub async fn keys_on_node<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  pattern: RedisValue,
) -> Result<RedisValue, RedisError> {
  run_on_node(client, node, RedisCommandKind::Keys, vec![pattern]).await
}

pub async fn randomkey_on_node<C: ClientLike>(client: &C, node: &ClusterNode) -> Result<RedisValue, RedisError> {
  run_on_node(client, node, RedisCommandKind::RandomKey, vec![]).await
}

pub async fn dbsize_on_node<C: ClientLike>(client: &C, node: &ClusterNode) -> Result<RedisValue, RedisError> {
  run_on_node(client, node, RedisCommandKind::DbSize, vec![]).await
}

pub async fn flushdb_on_node<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  r#async: bool,
) -> Result<(), RedisError> {
  let args = if r#async { vec![static_val!(ASYNC)] } else { vec![] };
  ok_on_node(client, node, RedisCommandKind::FlushDb, args).await
}

pub async fn info_on_node<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  section: Option<InfoKind>,
) -> Result<RedisValue, RedisError> {
  let args = section.map(|s| vec![s.to_str().into()]).unwrap_or_default();
  run_on_node(client, node, RedisCommandKind::Info, args).await
}

fn custom_command(name: &str, args: Vec<RedisValue>) -> Result<RedisCommand, RedisError> {
  let command = RedisCommand::new_custom(name, args)?;
  command.check_arity()?;
  Ok(command)
}

pub async fn execute_on_node<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  name: &str,
  args: Vec<RedisValue>,
) -> Result<RedisValue, RedisError> {
  let command = custom_command(name, args)?;
  let executor = emulation_executor(client, command.cmd_str())?;

  executor.run_on_node(node, command).await
}

pub async fn execute_on_all_nodes<C: ClientLike>(
  client: &C,
  name: &str,
  args: Vec<RedisValue>,
) -> Result<MultiNodeResult<RedisValue>, RedisError> {
  let command = custom_command(name, args)?;
  let executor = emulation_executor(client, command.cmd_str())?;
  let nodes = executor.topology().await?.nodes().to_vec();

  Ok(executor.run_on_nodes(nodes, command).await)
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::cluster_connection;
  use crate::{interfaces::*, mocks::MockDriver, types::SlotState};

  #[tokio::test]
  async fn should_route_node_lookups_by_slot() {
    let driver = MockDriver::cluster(3);
    let connection = cluster_connection(&driver);

    let slot = connection.cluster_slot_for_key("foo");
    assert_eq!(slot, 12182);
    let node = connection.cluster_node_for_key("foo").await.unwrap();
    assert_eq!(Some(node.server.clone()), driver.slot_owner(slot));
    assert!(node.serves_slot(slot));
  }

  #[tokio::test]
  async fn should_target_single_nodes() {
    let driver = MockDriver::cluster(3);
    let connection = cluster_connection(&driver);
    let _: () = connection.set("foo", "bar", None, None, false).await.unwrap();

    let node = connection.cluster_node_for_key("foo").await.unwrap();
    let size: i64 = connection.dbsize_on_node(&node).await.unwrap();
    assert_eq!(size, 1);
    let keys: Vec<String> = connection.keys_on_node(&node, "*").await.unwrap();
    assert_eq!(keys, vec!["foo".to_owned()]);

    let primaries = connection.cluster_primaries().await.unwrap();
    let other = primaries.iter().find(|primary| primary.id != node.id).unwrap();
    let size: i64 = connection.dbsize_on_node(other).await.unwrap();
    assert_eq!(size, 0);
  }

  #[tokio::test]
  async fn should_execute_on_all_nodes() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    let result = connection.execute_on_all_nodes("PING", vec![]).await.unwrap();

    assert_eq!(result.len(), 3);
    assert!(!result.has_errors());
  }

  #[tokio::test]
  async fn should_move_slot_with_setslot() {
    let driver = MockDriver::cluster(3);
    let connection = cluster_connection(&driver);
    let primaries = connection.cluster_primaries().await.unwrap();
    let slot = connection.cluster_slot_for_key("foo");
    let owner = connection.cluster_node_for_slot(slot).await.unwrap();
    let target = primaries.iter().find(|primary| primary.id != owner.id).unwrap();

    connection
      .cluster_set_slot(&owner, slot, SlotState::Node(target.id.clone()))
      .await
      .unwrap();
    assert_eq!(driver.slot_owner(slot), Some(target.server.clone()));
  }
}
