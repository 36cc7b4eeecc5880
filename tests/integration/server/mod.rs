use crate::utils::TestContext;
use conduit::{
  clients::{ClusterConnection, RedisConnection},
  error::RedisError,
  interfaces::*,
  types::InfoKind,
};
use std::collections::HashMap;

pub async fn should_ping_and_echo<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ServerInterface,
{
  assert_eq!(client.ping::<String>().await?, "PONG");
  assert_eq!(client.echo::<String, _>("hello").await?, "hello");
  Ok(())
}

pub async fn should_flushall_and_count_keys<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ServerInterface + StringsInterface,
{
  client.mset(vec![("a", 1), ("b", 2), ("c", 3)]).await?;
  assert_eq!(client.dbsize::<i64>().await?, 3);

  let _: () = client.flushall(false).await?;
  assert_eq!(client.dbsize::<i64>().await?, 0);
  Ok(())
}

pub async fn should_read_time_and_lastsave<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ServerInterface,
{
  let time: Vec<i64> = client.time().await?;
  assert_eq!(time.len(), 2);
  assert!(time[0] > 0);

  client.save().await?;
  let lastsave: i64 = client.lastsave().await?;
  assert!(lastsave > 0);
  Ok(())
}

pub async fn should_set_and_get_client_name(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  let name: Option<String> = client.client_getname().await?;
  assert!(name.is_none());

  client.client_setname("conduit-test").await?;
  assert_eq!(client.client_getname::<String>().await?, "conduit-test");
  assert!(client.client_id::<i64>().await? > 0);
  Ok(())
}

pub async fn should_set_and_get_config(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  client.config_set("maxmemory-policy", "allkeys-lru").await?;

  let config: HashMap<String, String> = client.config_get("maxmemory-policy").await?;
  assert_eq!(config, maplit::hashmap! {
    "maxmemory-policy".to_owned() => "allkeys-lru".to_owned(),
  });
  Ok(())
}

pub async fn should_set_and_get_config_on_every_primary(
  client: ClusterConnection,
  _: TestContext,
) -> Result<(), RedisError> {
  client.config_set("maxmemory-policy", "allkeys-lru").await?;

  let config: HashMap<String, String> = client.config_get("maxmemory-policy").await?;
  assert_eq!(config.len(), client.cluster_primaries().await?.len());
  for primary in client.cluster_primaries().await?.into_iter() {
    let field = format!("{}:{}.maxmemory-policy", primary.server.host, primary.server.port);
    assert_eq!(config.get(&field).map(|s| s.as_str()), Some("allkeys-lru"));
  }
  Ok(())
}

pub async fn should_read_info(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  let info: String = client.info(Some(InfoKind::Server)).await?;
  assert!(info.contains("redis_version"));
  Ok(())
}

pub async fn should_merge_info_fields_across_primaries(
  client: ClusterConnection,
  _: TestContext,
) -> Result<(), RedisError> {
  let info: HashMap<String, String> = client.info(Some(InfoKind::Server)).await?;

  for primary in client.cluster_primaries().await?.into_iter() {
    let field = format!("{}:{}.redis_version", primary.server.host, primary.server.port);
    assert!(info.contains_key(&field));
  }
  Ok(())
}
