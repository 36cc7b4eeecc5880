use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, MultipleKeys, MultipleStrings, MultipleValues, RedisValue},
};
use std::convert::TryInto;

/// Functions that implement the [lua](https://redis.io/commands#lua) interface.
#[async_trait]
pub trait LuaInterface: ClientLike + Sized {
  /// Load a script into the scripts cache, without executing it. In a cluster the script is loaded on every primary.
  ///
  /// Returns the SHA-1 hash of the script.
  ///
  /// <https://redis.io/commands/script-load>
  async fn script_load<R, S>(&self, script: S) -> RedisResult<R>
  where
    R: FromRedis,
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
  {
    try_into!(script);
    commands::lua::script_load(self, script).await?.convert()
  }

  /// Kills the currently executing Lua script, assuming no write operation was yet performed by the script.
  ///
  /// <https://redis.io/commands/script-kill>
  async fn script_kill(&self) -> RedisResult<()> {
    commands::lua::script_kill(self).await
  }

  /// Flush the Lua scripts cache, on every primary in a cluster.
  ///
  /// <https://redis.io/commands/script-flush>
  async fn script_flush(&self, r#async: bool) -> RedisResult<()> {
    commands::lua::script_flush(self, r#async).await?.convert()
  }

  /// Returns information about the existence of the scripts in the script cache.
  ///
  /// <https://redis.io/commands/script-exists>
  async fn script_exists<R, H>(&self, hashes: H) -> RedisResult<R>
  where
    R: FromRedis,
    H: Into<MultipleStrings> + Send,
  {
    into!(hashes);
    commands::lua::script_exists(self, hashes).await?.convert()
  }

  /// Evaluates a script cached on the server side by its SHA1 digest.
  ///
  /// Every key must map to the same cluster slot.
  ///
  /// <https://redis.io/commands/evalsha>
  async fn evalsha<R, S, K, V>(&self, hash: S, keys: K, args: V) -> RedisResult<R>
  where
    R: FromRedis,
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
    K: Into<MultipleKeys> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(keys);
    try_into!(hash, args);
    commands::lua::evalsha(self, hash, keys, args).await?.convert()
  }

  /// Evaluate a Lua script on the server.
  ///
  /// Every key must map to the same cluster slot.
  ///
  /// <https://redis.io/commands/eval>
  async fn eval<R, S, K, V>(&self, script: S, keys: K, args: V) -> RedisResult<R>
  where
    R: FromRedis,
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
    K: Into<MultipleKeys> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(keys);
    try_into!(script, args);
    commands::lua::eval(self, script, keys, args).await?.convert()
  }
}
