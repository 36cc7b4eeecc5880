use super::*;
use crate::{
  types::{ClusterNode, InfoKind, RedisMap},
  utils,
};

/// Prefix a field with the node's address, as used by the merged cluster replies of `INFO` and `CONFIG GET`.
fn node_field(node: &ClusterNode, field: &str) -> RedisKey {
  format!("{}:{}.{}", node.server.host, node.server.port, field).into()
}

pub async fn ping<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "PING")?;
    let nodes: Vec<ClusterNode> = executor.topology().await?.active_nodes().into_iter().cloned().collect();
    let result = executor
      .run_on_nodes(nodes, RedisCommand::new(RedisCommandKind::Ping, vec![]))
      .await;

    let mut failed = Vec::new();
    for node_result in result.into_iter() {
      match node_result.value {
        Ok(ref value) if value.as_str().as_deref() == Some("PONG") => {},
        Ok(value) => failed.push(format!("{} replied {:?}", node_result.node.server, value)),
        Err(error) => failed.push(format!("{} failed with {}", node_result.node.server, error)),
      }
    }

    if failed.is_empty() {
      Ok(RedisValue::from_static_str("PONG"))
    } else {
      Err(RedisError::new(
        RedisErrorKind::Cluster,
        format!("Not every node answered PING: {}", failed.join(", ")),
      ))
    }
  } else {
    args_value_cmd(client, RedisCommandKind::Ping, vec![]).await
  }
}

pub async fn echo<C: ClientLike>(client: &C, message: RedisValue) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Echo, message).await
}

fn info_args(section: Option<InfoKind>) -> Vec<RedisValue> {
  match section {
    Some(section) => vec![section.to_str().into()],
    None => vec![],
  }
}

pub async fn info<C: ClientLike>(client: &C, section: Option<InfoKind>) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "INFO")?;
    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::Info, info_args(section)))
      .await?;

    let mut merged = RedisMap::new();
    for node_result in result.into_iter() {
      let info = node_result.value?;
      let info = info.as_str().unwrap_or_default();
      for (field, value) in utils::parse_info_fields(&info).into_iter() {
        merged.insert(node_field(&node_result.node, &field), value.into());
      }
    }
    Ok(RedisValue::Map(merged))
  } else {
    args_value_cmd(client, RedisCommandKind::Info, info_args(section)).await
  }
}

pub async fn dbsize<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "DBSIZE")?;
    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::DbSize, vec![]))
      .await?;
    sum_integers(result)
  } else {
    args_value_cmd(client, RedisCommandKind::DbSize, vec![]).await
  }
}

/// Send a command to every primary in a cluster, or to the server otherwise, expecting `OK`.
async fn ok_on_primaries<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  args: Vec<RedisValue>,
) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, kind.cmd_str())?;
    expect_all_ok(executor.run_on_all_primaries(RedisCommand::new(kind, args)).await?)
  } else {
    args_value_cmd(client, kind, args).await
  }
}

fn async_args(r#async: bool) -> Vec<RedisValue> {
  if r#async {
    vec![static_val!(ASYNC)]
  } else {
    vec![]
  }
}

pub async fn flushdb<C: ClientLike>(client: &C, r#async: bool) -> Result<RedisValue, RedisError> {
  ok_on_primaries(client, RedisCommandKind::FlushDb, async_args(r#async)).await
}

pub async fn flushall<C: ClientLike>(client: &C, r#async: bool) -> Result<RedisValue, RedisError> {
  ok_on_primaries(client, RedisCommandKind::FlushAll, async_args(r#async)).await
}

pub async fn save<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
  ok_on_primaries(client, RedisCommandKind::Save, vec![]).await
}

pub async fn bgsave<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "BGSAVE")?;
    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::BgSave, vec![]))
      .await?;

    // the status reads "Background saving started" rather than OK
    Ok(result.into_values()?.into_iter().next().unwrap_or(RedisValue::Null))
  } else {
    args_value_cmd(client, RedisCommandKind::BgSave, vec![]).await
  }
}

value_cmd!(lastsave, LastSave);
value_cmd!(time, Time);

pub async fn config_get<C: ClientLike>(client: &C, parameter: RedisValue) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "CONFIG GET")?;
    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::ConfigGet, vec![parameter]))
      .await?;

    let mut merged = RedisMap::new();
    for node_result in result.into_iter() {
      for (field, value) in node_result.value?.into_map()?.inner().into_iter() {
        merged.insert(node_field(&node_result.node, &field.as_str_lossy()), value);
      }
    }
    Ok(RedisValue::Map(merged))
  } else {
    one_arg_value_cmd(client, RedisCommandKind::ConfigGet, parameter).await
  }
}

pub async fn config_set<C: ClientLike>(
  client: &C,
  parameter: RedisValue,
  value: RedisValue,
) -> Result<RedisValue, RedisError> {
  ok_on_primaries(client, RedisCommandKind::ConfigSet, vec![parameter, value]).await
}

pub async fn config_resetstat<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
  ok_on_primaries(client, RedisCommandKind::ConfigResetStat, vec![]).await
}

value_cmd!(client_getname, ClientGetName);
value_cmd!(client_id, ClientId);

pub async fn client_setname<C: ClientLike>(client: &C, name: RedisValue) -> Result<(), RedisError> {
  args_ok_cmd(client, RedisCommandKind::ClientSetName, vec![name]).await
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::cluster_connection;
  use crate::{interfaces::*, mocks::MockDriver, types::RedisValue};
  use std::collections::HashMap;

  #[tokio::test]
  async fn should_sum_dbsize_across_primaries() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    for key in ["a", "b", "c", "d"].iter() {
      let _: () = connection.set(*key, "1", None, None, false).await.unwrap();
    }

    let size: i64 = connection.dbsize().await.unwrap();
    assert_eq!(size, 4);
    let _: () = connection.flushall(false).await.unwrap();
    let size: i64 = connection.dbsize().await.unwrap();
    assert_eq!(size, 0);
  }

  #[tokio::test]
  async fn should_ping_every_node() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    let pong: String = connection.ping().await.unwrap();
    assert_eq!(pong, "PONG");
  }

  #[tokio::test]
  async fn should_fail_ping_when_a_node_is_down() {
    let driver = MockDriver::cluster(3);
    let connection = cluster_connection(&driver);
    let _: String = connection.ping().await.unwrap();

    driver.fail_server(&driver.servers()[1]);
    let error = connection.ping::<RedisValue>().await.unwrap_err();
    assert!(error.details().contains("127.0.0.1:30002"));
  }

  #[tokio::test]
  async fn should_prefix_cluster_info_fields() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    let info: HashMap<String, String> = connection.info(None).await.unwrap();

    assert!(info.keys().any(|field| field.starts_with("127.0.0.1:30001.")));
    assert!(info.keys().any(|field| field.starts_with("127.0.0.1:30003.")));
  }
}
