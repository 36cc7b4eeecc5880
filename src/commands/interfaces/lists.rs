use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, LMoveDirection, MultipleKeys, MultipleValues, RedisKey, RedisValue},
};
use std::convert::TryInto;

/// Functions that implement the [lists](https://redis.io/commands#lists) interface.
///
/// Commands that move elements between two keys in different cluster slots are emulated with a pop on the source
/// followed by a push on the destination. The element is lost if the push fails.
#[async_trait]
pub trait ListInterface: ClientLike + Sized {
  /// Insert all the specified values at the head of the list stored at `key`.
  ///
  /// <https://redis.io/commands/lpush>
  async fn lpush<R, K, V>(&self, key: K, values: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(values);
    commands::lists::lpush(self, key, values).await?.convert()
  }

  /// Insert all the specified values at the tail of the list stored at `key`.
  ///
  /// <https://redis.io/commands/rpush>
  async fn rpush<R, K, V>(&self, key: K, values: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(values);
    commands::lists::rpush(self, key, values).await?.convert()
  }

  /// Inserts values at the head of the list stored at `key`, only if `key` already exists and holds a list.
  ///
  /// <https://redis.io/commands/lpushx>
  async fn lpushx<R, K, V>(&self, key: K, values: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(values);
    commands::lists::lpushx(self, key, values).await?.convert()
  }

  /// <https://redis.io/commands/rpushx>
  async fn rpushx<R, K, V>(&self, key: K, values: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(values);
    commands::lists::rpushx(self, key, values).await?.convert()
  }

  /// Removes and returns the first elements of the list stored at `key`.
  ///
  /// <https://redis.io/commands/lpop>
  async fn lpop<R, K>(&self, key: K, count: Option<usize>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::lists::lpop(self, key, count).await?.convert()
  }

  /// Removes and returns the last elements of the list stored at `key`.
  ///
  /// <https://redis.io/commands/rpop>
  async fn rpop<R, K>(&self, key: K, count: Option<usize>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::lists::rpop(self, key, count).await?.convert()
  }

  /// <https://redis.io/commands/llen>
  async fn llen<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::lists::llen(self, key).await?.convert()
  }

  /// Returns the specified elements of the list stored at `key`.
  ///
  /// <https://redis.io/commands/lrange>
  async fn lrange<R, K>(&self, key: K, start: i64, stop: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::lists::lrange(self, key, start, stop).await?.convert()
  }

  /// <https://redis.io/commands/lindex>
  async fn lindex<R, K>(&self, key: K, index: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::lists::lindex(self, key, index).await?.convert()
  }

  /// Inserts `element` in the list stored at `key` either before or after the reference value `pivot`.
  ///
  /// <https://redis.io/commands/linsert>
  async fn linsert<R, K, P, V>(&self, key: K, before: bool, pivot: P, element: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    P: TryInto<RedisValue> + Send,
    P::Error: Into<RedisError> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(pivot, element);
    commands::lists::linsert(self, key, before, pivot, element)
      .await?
      .convert()
  }

  /// Removes the first `count` occurrences of elements equal to `element` from the list stored at `key`.
  ///
  /// <https://redis.io/commands/lrem>
  async fn lrem<R, K, V>(&self, key: K, count: i64, element: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(element);
    commands::lists::lrem(self, key, count, element).await?.convert()
  }

  /// <https://redis.io/commands/lset>
  async fn lset<R, K, V>(&self, key: K, index: i64, element: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(element);
    commands::lists::lset(self, key, index, element).await?.convert()
  }

  /// Trim an existing list so that it will contain only the specified range of elements.
  ///
  /// <https://redis.io/commands/ltrim>
  async fn ltrim<R, K>(&self, key: K, start: i64, stop: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::lists::ltrim(self, key, start, stop).await?.convert()
  }

  /// Returns the index of matching elements inside a Redis list.
  ///
  /// <https://redis.io/commands/lpos>
  async fn lpos<R, K, V>(&self, key: K, element: V, rank: Option<i64>, count: Option<i64>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(element);
    commands::lists::lpos(self, key, element, rank, count).await?.convert()
  }

  /// Atomically returns and removes the last element of the list stored at `source`, and pushes the element at the
  /// first element of the list stored at `destination`.
  ///
  /// <https://redis.io/commands/rpoplpush>
  async fn rpoplpush<R, S, D>(&self, source: S, destination: D) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
  {
    into!(source, destination);
    commands::lists::rpoplpush(self, source, destination).await?.convert()
  }

  /// Atomically returns and removes the first/last element of the list stored at `source`, and pushes the element
  /// at the first/last element of the list stored at `destination`.
  ///
  /// <https://redis.io/commands/lmove>
  async fn lmove<R, S, D>(
    &self,
    source: S,
    destination: D,
    source_direction: LMoveDirection,
    destination_direction: LMoveDirection,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
  {
    into!(source, destination);
    commands::lists::lmove(self, source, destination, source_direction, destination_direction)
      .await?
      .convert()
  }

  /// Remove and return the first element of the first non-empty list, blocking for up to `timeout` seconds. A
  /// timeout of zero blocks indefinitely.
  ///
  /// Against keys in several cluster slots every key is popped concurrently and the first non-empty result, in the
  /// order of the keys, is returned. Elements popped from other keys are discarded.
  ///
  /// <https://redis.io/commands/blpop>
  async fn blpop<R, K>(&self, keys: K, timeout: f64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::lists::blpop(self, keys, timeout).await?.convert()
  }

  /// The blocking form of `RPOP`. See [blpop](Self::blpop) for the behavior across cluster slots.
  ///
  /// <https://redis.io/commands/brpop>
  async fn brpop<R, K>(&self, keys: K, timeout: f64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::lists::brpop(self, keys, timeout).await?.convert()
  }

  /// <https://redis.io/commands/brpoplpush>
  async fn brpoplpush<R, S, D>(&self, source: S, destination: D, timeout: f64) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
  {
    into!(source, destination);
    commands::lists::brpoplpush(self, source, destination, timeout)
      .await?
      .convert()
  }

  /// The blocking variant of [lmove](Self::lmove).
  ///
  /// <https://redis.io/commands/blmove>
  async fn blmove<R, S, D>(
    &self,
    source: S,
    destination: D,
    source_direction: LMoveDirection,
    destination_direction: LMoveDirection,
    timeout: f64,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
  {
    into!(source, destination);
    commands::lists::blmove(
      self,
      source,
      destination,
      source_direction,
      destination_direction,
      timeout,
    )
    .await?
    .convert()
  }
}
