use crate::{
  cluster::ClusterCommandExecutor,
  error::{RedisError, RedisErrorKind},
  interfaces::ClientLike,
  protocol::{
    command::{RedisCommand, RedisCommandKind},
    utils as protocol_utils,
  },
  types::{MultiNodeResult, RedisKey, RedisValue},
};
use std::sync::Arc;

pub static LIMIT: &str = "LIMIT";
pub static WITH_SCORES: &str = "WITHSCORES";
pub static CHANGED: &str = "CH";
pub static INCR: &str = "INCR";
pub static AGGREGATE: &str = "AGGREGATE";
pub static WEIGHTS: &str = "WEIGHTS";
pub static GET: &str = "GET";
pub static DB: &str = "DB";
pub static REPLACE: &str = "REPLACE";
pub static ABSTTL: &str = "ABSTTL";
pub static STORE: &str = "STORE";
pub static ASYNC: &str = "ASYNC";
pub static COUNT: &str = "COUNT";
pub static RANK: &str = "RANK";
pub static MAXLEN: &str = "MAXLEN";
pub static NOMKSTREAM: &str = "NOMKSTREAM";
pub static BLOCK: &str = "BLOCK";
pub static STREAMS: &str = "STREAMS";
pub static MKSTREAM: &str = "MKSTREAM";
pub static GROUP: &str = "GROUP";
pub static NOACK: &str = "NOACK";
pub static BEFORE: &str = "BEFORE";
pub static AFTER: &str = "AFTER";

/// Macro to generate a command function that takes no arguments and expects an OK response - returning `()` to the
/// caller.
macro_rules! ok_cmd(
  ($name:ident, $cmd:tt) => {
    pub async fn $name<C: ClientLike>(client: &C) -> Result<(), RedisError> {
      args_ok_cmd(client, RedisCommandKind::$cmd, vec![]).await
    }
  }
);

/// Macro to generate a command function that takes no arguments and returns a single `RedisValue` to the caller.
macro_rules! value_cmd(
  ($name:ident, $cmd:tt) => {
    pub async fn $name<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
      args_value_cmd(client, RedisCommandKind::$cmd, vec![]).await
    }
  }
);

/// Send a command in the connection's current mode.
pub async fn request<C: ClientLike>(client: &C, command: RedisCommand) -> Result<RedisValue, RedisError> {
  client.inner().request(command).await
}

/// A function that issues a command that only takes one argument and returns a single `RedisValue`.
pub async fn one_arg_value_cmd<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  arg: RedisValue,
) -> Result<RedisValue, RedisError> {
  request(client, RedisCommand::new(kind, vec![arg])).await
}

/// A function that issues a command that takes any number of arguments and returns a single `RedisValue` to the
/// caller.
pub async fn args_value_cmd<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  args: Vec<RedisValue>,
) -> Result<RedisValue, RedisError> {
  request(client, RedisCommand::new(kind, args)).await
}

/// A function that issues a command that takes any number of arguments and expects an OK response - returning `()` to
/// the caller.
pub async fn args_ok_cmd<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  args: Vec<RedisValue>,
) -> Result<(), RedisError> {
  let response = args_value_cmd(client, kind, args).await?;
  protocol_utils::expect_ok(&response)
}

/// Whether the keys span several hash slots, in which case a multi-key command must be emulated across nodes.
pub fn spans_slots<C: ClientLike>(client: &C, keys: &[RedisKey]) -> bool {
  client.inner().is_clustered() && !client.inner().router().same_slot_keys(keys)
}

/// Read the executor used to emulate a command across cluster nodes.
///
/// Emulated commands need several round trips, so they cannot run while a pipeline or transaction is open.
pub fn emulation_executor<C: ClientLike>(
  client: &C,
  operation: &str,
) -> Result<Arc<ClusterCommandExecutor>, RedisError> {
  let inner = client.inner();
  inner.check_emulation(operation)?;
  inner.cluster_executor().map(|executor| executor.clone())
}

/// Fail if the keys span several hash slots, for commands that cannot be emulated.
pub fn check_same_slot<C: ClientLike>(client: &C, operation: &str, keys: &[RedisKey]) -> Result<(), RedisError> {
  if spans_slots(client, keys) {
    Err(RedisError::new(
      RedisErrorKind::InvalidCommand,
      format!("{} can only be executed when all keys map to the same slot", operation),
    ))
  } else {
    Ok(())
  }
}

/// Run a command on the primary that owns the key.
pub async fn run_for_key(
  executor: &ClusterCommandExecutor,
  key: &RedisKey,
  command: RedisCommand,
) -> Result<RedisValue, RedisError> {
  executor
    .execute_for_key(key, move |connection| {
      let command = command.clone();
      async move { connection.request(command).await }
    })
    .await
}

/// Add up the integer replies of every node.
pub fn sum_integers(result: MultiNodeResult<RedisValue>) -> Result<RedisValue, RedisError> {
  let total = result
    .into_values()?
    .into_iter()
    .map(|value| value.as_i64().unwrap_or(0))
    .sum();

  Ok(RedisValue::Integer(total))
}

/// Check that every node replied with `OK`.
pub fn expect_all_ok(result: MultiNodeResult<RedisValue>) -> Result<RedisValue, RedisError> {
  for value in result.into_values()?.iter() {
    protocol_utils::expect_ok(value)?;
  }

  Ok(RedisValue::new_ok())
}

pub mod cluster;
pub mod geo;
pub mod hashes;
pub mod keys;
pub mod lists;
pub mod lua;
pub mod pubsub;
pub mod scan;
pub mod server;
pub mod sets;
pub mod sorted_sets;
pub mod streams;
pub mod strings;
pub mod transactions;

#[cfg(test)]
pub(crate) mod test_utils {
  use crate::{
    clients::{ClusterConnection, ConnectionFactory, RedisConnection},
    mocks::MockDriver,
    types::{ClientConfig, ServerConfig},
  };
  use std::sync::Arc;

  /// Build a connection to the mock driver's standalone server.
  pub fn standalone_connection(driver: &MockDriver) -> RedisConnection {
    ConnectionFactory::builder(ClientConfig::default())
      .driver(Arc::new(driver.clone()))
      .build()
      .unwrap()
      .get_connection()
      .unwrap()
  }

  /// Build a cluster connection against the mock driver's servers.
  pub fn cluster_connection(driver: &MockDriver) -> ClusterConnection {
    let hosts = driver
      .servers()
      .into_iter()
      .map(|server| (server.host.to_string(), server.port))
      .collect();
    let config = ClientConfig {
      server: ServerConfig::new_clustered(hosts),
      ..ClientConfig::default()
    };

    ConnectionFactory::builder(config)
      .driver(Arc::new(driver.clone()))
      .build()
      .unwrap()
      .get_cluster_connection()
      .unwrap()
  }
}
