use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, MultipleKeys, MultipleValues, RedisKey, RedisValue, ScanOptions, ScanPage},
};
use std::convert::TryInto;

/// Functions that implement the [sets](https://redis.io/commands#set) interface.
///
/// `SINTER`, `SUNION`, `SDIFF` and their `STORE` variants work on keys in different cluster slots by reading every
/// set and computing the result on the client. The stored variants then replace the destination. None of this is
/// atomic, and the emulated forms cannot be used inside a pipeline or a transaction.
#[async_trait]
pub trait SetsInterface: ClientLike + Sized {
  /// Add the specified members to the set stored at `key`.
  ///
  /// <https://redis.io/commands/sadd>
  async fn sadd<R, K, V>(&self, key: K, members: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(members);
    commands::sets::sadd(self, key, members).await?.convert()
  }

  /// <https://redis.io/commands/srem>
  async fn srem<R, K, V>(&self, key: K, members: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(members);
    commands::sets::srem(self, key, members).await?.convert()
  }

  /// Returns the set cardinality of the set stored at `key`.
  ///
  /// <https://redis.io/commands/scard>
  async fn scard<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::sets::scard(self, key).await?.convert()
  }

  /// <https://redis.io/commands/smembers>
  async fn smembers<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::sets::smembers(self, key).await?.convert()
  }

  /// <https://redis.io/commands/sismember>
  async fn sismember<R, K, V>(&self, key: K, member: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(member);
    commands::sets::sismember(self, key, member).await?.convert()
  }

  /// Removes and returns one or more random members from the set stored at `key`.
  ///
  /// <https://redis.io/commands/spop>
  async fn spop<R, K>(&self, key: K, count: Option<usize>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::sets::spop(self, key, count).await?.convert()
  }

  /// <https://redis.io/commands/srandmember>
  async fn srandmember<R, K>(&self, key: K, count: Option<i64>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::sets::srandmember(self, key, count).await?.convert()
  }

  /// Move `member` from the set at `source` to the set at `destination`.
  ///
  /// Across cluster slots this runs `SREM` on the source and then `SADD` on the destination if the member was
  /// removed.
  ///
  /// <https://redis.io/commands/smove>
  async fn smove<R, S, D, V>(&self, source: S, destination: D, member: V) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(source, destination);
    try_into!(member);
    commands::sets::smove(self, source, destination, member)
      .await?
      .convert()
  }

  /// Returns the members of the set resulting from the intersection of all the given sets.
  ///
  /// <https://redis.io/commands/sinter>
  async fn sinter<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::sets::sinter(self, keys).await?.convert()
  }

  /// Returns the members of the set resulting from the union of all the given sets.
  ///
  /// <https://redis.io/commands/sunion>
  async fn sunion<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::sets::sunion(self, keys).await?.convert()
  }

  /// Returns the members of the set resulting from the difference between the first set and all the successive sets.
  ///
  /// <https://redis.io/commands/sdiff>
  async fn sdiff<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::sets::sdiff(self, keys).await?.convert()
  }

  /// <https://redis.io/commands/sinterstore>
  async fn sinterstore<R, D, K>(&self, destination: D, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    D: Into<RedisKey> + Send,
    K: Into<MultipleKeys> + Send,
  {
    into!(destination, keys);
    commands::sets::sinterstore(self, destination, keys).await?.convert()
  }

  /// <https://redis.io/commands/sunionstore>
  async fn sunionstore<R, D, K>(&self, destination: D, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    D: Into<RedisKey> + Send,
    K: Into<MultipleKeys> + Send,
  {
    into!(destination, keys);
    commands::sets::sunionstore(self, destination, keys).await?.convert()
  }

  /// <https://redis.io/commands/sdiffstore>
  async fn sdiffstore<R, D, K>(&self, destination: D, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    D: Into<RedisKey> + Send,
    K: Into<MultipleKeys> + Send,
  {
    into!(destination, keys);
    commands::sets::sdiffstore(self, destination, keys).await?.convert()
  }

  /// Read one page of the members in the set stored at `key`.
  ///
  /// <https://redis.io/commands/sscan>
  async fn sscan_page<K>(&self, key: K, cursor: u64, options: ScanOptions) -> RedisResult<ScanPage<Vec<RedisValue>>>
  where
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::scan::sscan_page(self, key, cursor, options).await
  }
}
