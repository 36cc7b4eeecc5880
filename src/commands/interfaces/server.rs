use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, InfoKind, RedisValue},
};
use std::convert::TryInto;

/// Functions that implement the [server](https://redis.io/commands#server) and [connection](https://redis.io/commands#connection) interfaces.
///
/// Against a cluster the commands that affect a whole server run on every primary. `INFO` and `CONFIG GET` then
/// return a map where every field is prefixed with the `host:port` of the node it came from.
#[async_trait]
pub trait ServerInterface: ClientLike + Sized {
  /// Ping the server, or every node in a cluster.
  ///
  /// Against a cluster the result is `PONG` only if every node answered. Otherwise the error lists the nodes that
  /// did not.
  ///
  /// <https://redis.io/commands/ping>
  async fn ping<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::ping(self).await?.convert()
  }

  /// <https://redis.io/commands/echo>
  async fn echo<R, M>(&self, message: M) -> RedisResult<R>
  where
    R: FromRedis,
    M: TryInto<RedisValue> + Send,
    M::Error: Into<RedisError> + Send,
  {
    try_into!(message);
    commands::server::echo(self, message).await?.convert()
  }

  /// Read information and statistics about the server.
  ///
  /// <https://redis.io/commands/info>
  async fn info<R>(&self, section: Option<InfoKind>) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::info(self, section).await?.convert()
  }

  /// Return the number of keys in the selected database, summed across every primary in a cluster.
  ///
  /// <https://redis.io/commands/dbsize>
  async fn dbsize<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::dbsize(self).await?.convert()
  }

  /// Delete all the keys of the currently selected database.
  ///
  /// <https://redis.io/commands/flushdb>
  async fn flushdb<R>(&self, r#async: bool) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::flushdb(self, r#async).await?.convert()
  }

  /// Delete the keys in all databases.
  ///
  /// <https://redis.io/commands/flushall>
  async fn flushall<R>(&self, r#async: bool) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::flushall(self, r#async).await?.convert()
  }

  /// <https://redis.io/commands/save>
  async fn save(&self) -> RedisResult<()> {
    commands::server::save(self).await?.convert()
  }

  /// Save the DB in background. In a cluster the reply of the first primary is returned.
  ///
  /// <https://redis.io/commands/bgsave>
  async fn bgsave<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::bgsave(self).await?.convert()
  }

  /// Return the UNIX timestamp of the last DB save executed with success.
  ///
  /// <https://redis.io/commands/lastsave>
  async fn lastsave<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::lastsave(self).await?.convert()
  }

  /// Returns the current server time as a `[seconds, microseconds]` pair.
  ///
  /// <https://redis.io/commands/time>
  async fn time<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::time(self).await?.convert()
  }

  /// Read the configuration parameters matching `parameter`.
  ///
  /// <https://redis.io/commands/config-get>
  async fn config_get<R, P>(&self, parameter: P) -> RedisResult<R>
  where
    R: FromRedis,
    P: TryInto<RedisValue> + Send,
    P::Error: Into<RedisError> + Send,
  {
    try_into!(parameter);
    commands::server::config_get(self, parameter).await?.convert()
  }

  /// Set a configuration parameter, on every primary in a cluster.
  ///
  /// <https://redis.io/commands/config-set>
  async fn config_set<P, V>(&self, parameter: P, value: V) -> RedisResult<()>
  where
    P: TryInto<RedisValue> + Send,
    P::Error: Into<RedisError> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    try_into!(parameter, value);
    commands::server::config_set(self, parameter, value).await?.convert()
  }

  /// Resets the statistics reported by Redis using the INFO command.
  ///
  /// <https://redis.io/commands/config-resetstat>
  async fn config_resetstat(&self) -> RedisResult<()> {
    commands::server::config_resetstat(self).await?.convert()
  }

  /// The command returns the name set with `CLIENT SETNAME`.
  ///
  /// <https://redis.io/commands/client-getname>
  async fn client_getname<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::client_getname(self).await?.convert()
  }

  /// Assigns a name to the current connection.
  ///
  /// <https://redis.io/commands/client-setname>
  async fn client_setname<S>(&self, name: S) -> RedisResult<()>
  where
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
  {
    try_into!(name);
    commands::server::client_setname(self, name).await
  }

  /// Returns the ID of the current connection.
  ///
  /// <https://redis.io/commands/client-id>
  async fn client_id<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::server::client_id(self).await?.convert()
  }
}
