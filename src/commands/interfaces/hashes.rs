use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, MultipleKeys, RedisKey, RedisMap, RedisValue, ScanOptions, ScanPage},
};
use std::convert::TryInto;

/// Functions that implement the [hashes](https://redis.io/commands#hashes) interface.
#[async_trait]
pub trait HashesInterface: ClientLike + Sized {
  /// Sets fields in the hash stored at `key` to their provided values.
  ///
  /// <https://redis.io/commands/hset>
  async fn hset<R, K, V>(&self, key: K, values: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisMap> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(values);
    commands::hashes::hset(self, key, values).await?.convert()
  }

  /// Sets `field` in the hash stored at `key` to `value`, only if `field` does not yet exist.
  ///
  /// <https://redis.io/commands/hsetnx>
  async fn hsetnx<R, K, F, V>(&self, key: K, field: F, value: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key, field);
    try_into!(value);
    commands::hashes::hsetnx(self, key, field, value).await?.convert()
  }

  /// Returns the value associated with `field` in the hash stored at `key`.
  ///
  /// <https://redis.io/commands/hget>
  async fn hget<R, K, F>(&self, key: K, field: F) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<RedisKey> + Send,
  {
    into!(key, field);
    commands::hashes::hget(self, key, field).await?.convert()
  }

  /// <https://redis.io/commands/hmget>
  async fn hmget<R, K, F>(&self, key: K, fields: F) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<MultipleKeys> + Send,
  {
    into!(key, fields);
    commands::hashes::hmget(self, key, fields).await?.convert()
  }

  /// Returns all fields and values of the hash stored at `key`.
  ///
  /// <https://redis.io/commands/hgetall>
  async fn hgetall<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::hashes::hgetall(self, key).await?.convert()
  }

  /// Removes the specified fields from the hash stored at `key`.
  ///
  /// <https://redis.io/commands/hdel>
  async fn hdel<R, K, F>(&self, key: K, fields: F) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<MultipleKeys> + Send,
  {
    into!(key, fields);
    commands::hashes::hdel(self, key, fields).await?.convert()
  }

  /// <https://redis.io/commands/hexists>
  async fn hexists<R, K, F>(&self, key: K, field: F) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<RedisKey> + Send,
  {
    into!(key, field);
    commands::hashes::hexists(self, key, field).await?.convert()
  }

  /// Increments the number stored at `field` in the hash stored at `key` by `increment`.
  ///
  /// <https://redis.io/commands/hincrby>
  async fn hincrby<R, K, F>(&self, key: K, field: F, increment: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<RedisKey> + Send,
  {
    into!(key, field);
    commands::hashes::hincrby(self, key, field, increment).await?.convert()
  }

  /// <https://redis.io/commands/hincrbyfloat>
  async fn hincrbyfloat<R, K, F>(&self, key: K, field: F, increment: f64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<RedisKey> + Send,
  {
    into!(key, field);
    commands::hashes::hincrbyfloat(self, key, field, increment)
      .await?
      .convert()
  }

  /// <https://redis.io/commands/hkeys>
  async fn hkeys<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::hashes::hkeys(self, key).await?.convert()
  }

  /// <https://redis.io/commands/hvals>
  async fn hvals<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::hashes::hvals(self, key).await?.convert()
  }

  /// Returns the number of fields contained in the hash stored at `key`.
  ///
  /// <https://redis.io/commands/hlen>
  async fn hlen<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::hashes::hlen(self, key).await?.convert()
  }

  /// <https://redis.io/commands/hstrlen>
  async fn hstrlen<R, K, F>(&self, key: K, field: F) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    F: Into<RedisKey> + Send,
  {
    into!(key, field);
    commands::hashes::hstrlen(self, key, field).await?.convert()
  }

  /// Read one page of the fields and values in the hash stored at `key`.
  ///
  /// <https://redis.io/commands/hscan>
  async fn hscan_page<K>(
    &self,
    key: K,
    cursor: u64,
    options: ScanOptions,
  ) -> RedisResult<ScanPage<Vec<(RedisKey, RedisValue)>>>
  where
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::scan::hscan_page(self, key, cursor, options).await
  }
}
