use crate::utils::TestContext;
use conduit::{
  clients::ClusterConnection,
  error::{RedisError, RedisErrorKind},
  interfaces::*,
  types::{RedisValue, Server},
};
use std::time::Duration;
use tokio::time::sleep;

/// Find a primary that does not own the slot of `key`.
async fn other_primary(client: &ClusterConnection, key: &str) -> Result<Server, RedisError> {
  let owner = client.cluster_node_for_key(key).await?;
  let other = client
    .cluster_primaries()
    .await?
    .into_iter()
    .find(|node| node.server != owner.server)
    .expect("Missing other primary");

  Ok(other.server)
}

pub async fn should_read_cluster_state(client: ClusterConnection, context: TestContext) -> Result<(), RedisError> {
  let nodes = client.cluster_nodes().await?;
  assert_eq!(nodes.len(), context.driver.servers().len());
  let primaries = client.cluster_primaries().await?;
  assert_eq!(primaries.len(), nodes.len());

  for key in ["foo", "bar", "baz", "{foo}bar"].iter() {
    let slot = client.cluster_slot_for_key(*key);
    let node = client.cluster_node_for_key(*key).await?;
    assert_eq!(Some(node.server.clone()), context.driver.slot_owner(slot));
    assert_eq!(client.cluster_node_for_slot(slot).await?, node);
  }
  assert_eq!(client.cluster_slot_for_key("foo"), client.cluster_slot_for_key("{foo}bar"));

  let replicas = client.cluster_replicas(&primaries[0]).await?;
  assert!(replicas.is_empty());
  Ok(())
}

pub async fn should_follow_moved_after_slot_moves(
  client: ClusterConnection,
  context: TestContext,
) -> Result<(), RedisError> {
  let _: () = client.set("foo", "bar", None, None, false).await?;
  let slot = client.cluster_slot_for_key("foo");
  let target = other_primary(&client, "foo").await?;

  context.driver.move_slot(slot, &target)?;
  assert_eq!(client.get::<String, _>("foo").await?, "bar");
  let _: () = client.set("foo", "baz", None, None, false).await?;

  sleep(Duration::from_millis(150)).await;
  let topology = context.factory.topology().await?;
  let owner = topology.slot_serving_primary(slot).expect("Missing slot owner");
  assert_eq!(owner.server, target);
  assert_eq!(client.cluster_node_for_key("foo").await?.server, target);
  assert_eq!(client.get::<String, _>("foo").await?, "baz");
  Ok(())
}

pub async fn should_follow_ask_during_migration(
  client: ClusterConnection,
  context: TestContext,
) -> Result<(), RedisError> {
  let _: () = client.mset(vec![("{foo}a", 1), ("{foo}b", 2)]).await?;
  let slot = client.cluster_slot_for_key("foo");
  let target = other_primary(&client, "foo").await?;

  context.driver.start_migration(slot, &target)?;
  context.driver.migrate_key("{foo}a")?;
  assert_eq!(client.get::<i64, _>("{foo}a").await?, 1);
  assert_eq!(client.get::<i64, _>("{foo}b").await?, 2);
  assert!(context.driver.commands_on(&target).iter().any(|name| name == "ASKING"));

  context.driver.finish_migration(slot)?;
  let values: Vec<i64> = client.mget(vec!["{foo}a", "{foo}b"]).await?;
  assert_eq!(values, vec![1, 2]);
  Ok(())
}

pub async fn should_target_single_nodes(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  client.mset(vec![("a", 1), ("b", 2), ("c", 3), ("{a}d", 4)]).await?;

  let mut total = 0;
  for primary in client.cluster_primaries().await?.iter() {
    let size: i64 = client.dbsize_on_node(primary).await?;
    let keys: Vec<String> = client.keys_on_node(primary, "*").await?;
    assert_eq!(keys.len() as i64, size);
    for key in keys.iter() {
      assert_eq!(client.cluster_node_for_key(key.as_str()).await?.server, primary.server);
    }

    assert_eq!(client.ping_node::<String>(primary).await?, "PONG");
    total += size;
  }
  assert_eq!(total, 4);
  assert_eq!(client.dbsize::<i64>().await?, 4);

  let owner = client.cluster_node_for_key("a").await?;
  client.flushdb_on_node(&owner, false).await?;
  assert_eq!(client.dbsize::<i64>().await?, 2);
  Ok(())
}

pub async fn should_execute_on_nodes(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  let _: () = client.set("foo", "bar", None, None, false).await?;
  let owner = client.cluster_node_for_key("foo").await?;

  let value: String = client.execute_on_node(&owner, "GET", vec!["foo".into()]).await?;
  assert_eq!(value, "bar");

  let results = client.execute_on_all_nodes("DBSIZE", vec![]).await?;
  assert_eq!(results.len(), client.cluster_nodes().await?.len());
  assert!(!results.has_errors());
  let total: i64 = results.values().into_iter().filter_map(|value| value.as_i64()).sum();
  assert_eq!(total, 1);

  let error = client
    .execute_on_node::<RedisValue>(&owner, "GET", vec![])
    .await
    .unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::InvalidArgument);
  Ok(())
}

pub async fn should_fail_ping_when_a_node_is_down(
  client: ClusterConnection,
  context: TestContext,
) -> Result<(), RedisError> {
  let target = other_primary(&client, "foo").await?;

  context.driver.fail_server(&target);
  let error = client.ping::<String>().await.unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::Cluster);
  assert!(error.details().contains(&target.to_string()));

  context.driver.recover_server(&target);
  assert_eq!(client.ping::<String>().await?, "PONG");
  Ok(())
}

pub async fn should_emulate_commands_across_slots(
  client: ClusterConnection,
  _: TestContext,
) -> Result<(), RedisError> {
  assert_ne!(
    client.cluster_node_for_key("a").await?,
    client.cluster_node_for_key("b").await?
  );
  let _: () = client.sadd("a", vec![1, 2, 3]).await?;
  let _: () = client.sadd("b", vec![2, 3, 4]).await?;

  let mut union: Vec<i64> = client.sunion(vec!["a", "b"]).await?;
  union.sort();
  assert_eq!(union, vec![1, 2, 3, 4]);

  let count: i64 = client.del(vec!["a", "b", "missing"]).await?;
  assert_eq!(count, 2);

  let _: () = client.set("a", "value", None, None, false).await?;
  let _: () = client.rename("a", "b").await?;
  assert_eq!(client.get::<String, _>("b").await?, "value");
  check_null!(client, "a");
  Ok(())
}

pub async fn should_reject_watch_in_cluster(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  client.watch("foo").await
}

pub async fn should_reject_eval_across_slots(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  client
    .eval::<RedisValue, _, _, _>("return 1", vec!["a", "b"], Vec::<RedisValue>::new())
    .await
    .map(|_| ())
}
