use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{
    AggregateOptions,
    FromRedis,
    Limit,
    MultipleKeys,
    MultipleValues,
    Ordering,
    RedisKey,
    RedisValue,
    ScanOptions,
    ScanPage,
    SetOptions,
  },
};
use std::convert::TryInto;

/// Functions that implement the [sorted sets](https://redis.io/commands#sorted_set) interface.
///
/// Multi-key commands in this group are not emulated across cluster slots and fail with an `InvalidCommand` error
/// when their keys do not share a slot.
#[async_trait]
pub trait SortedSetsInterface: ClientLike + Sized {
  /// Adds all the specified members with the specified scores to the sorted set stored at `key`.
  ///
  /// <https://redis.io/commands/zadd>
  async fn zadd<R, K, V>(
    &self,
    key: K,
    options: Option<SetOptions>,
    ordering: Option<Ordering>,
    changed: bool,
    incr: bool,
    values: Vec<(f64, V)>,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    let mut scored = Vec::with_capacity(values.len());
    for (score, member) in values.into_iter() {
      try_into!(member);
      scored.push((score, member));
    }

    commands::sorted_sets::zadd(self, key, options, ordering, changed, incr, scored)
      .await?
      .convert()
  }

  /// <https://redis.io/commands/zcard>
  async fn zcard<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::sorted_sets::zcard(self, key).await?.convert()
  }

  /// Returns the number of elements in the sorted set at `key` with a score between `min` and `max`.
  ///
  /// <https://redis.io/commands/zcount>
  async fn zcount<R, K, M, N>(&self, key: K, min: M, max: N) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    M: TryInto<RedisValue> + Send,
    M::Error: Into<RedisError> + Send,
    N: TryInto<RedisValue> + Send,
    N::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(min, max);
    commands::sorted_sets::zcount(self, key, min, max).await?.convert()
  }

  /// Increments the score of `member` in the sorted set stored at `key` by `increment`.
  ///
  /// <https://redis.io/commands/zincrby>
  async fn zincrby<R, K, V>(&self, key: K, increment: f64, member: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(member);
    commands::sorted_sets::zincrby(self, key, increment, member)
      .await?
      .convert()
  }

  /// Returns the specified range of elements in the sorted set stored at `key`, ordered from the lowest to the highest
  /// score.
  ///
  /// <https://redis.io/commands/zrange>
  async fn zrange<R, K>(&self, key: K, start: i64, stop: i64, withscores: bool) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::sorted_sets::zrange(self, key, start, stop, withscores)
      .await?
      .convert()
  }

  /// <https://redis.io/commands/zrevrange>
  async fn zrevrange<R, K>(&self, key: K, start: i64, stop: i64, withscores: bool) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::sorted_sets::zrevrange(self, key, start, stop, withscores)
      .await?
      .convert()
  }

  /// Returns all the elements in the sorted set at `key` with a score between `min` and `max`.
  ///
  /// <https://redis.io/commands/zrangebyscore>
  async fn zrangebyscore<R, K, M, N>(
    &self,
    key: K,
    min: M,
    max: N,
    withscores: bool,
    limit: Option<Limit>,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    M: TryInto<RedisValue> + Send,
    M::Error: Into<RedisError> + Send,
    N: TryInto<RedisValue> + Send,
    N::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(min, max);
    commands::sorted_sets::zrangebyscore(self, key, min, max, withscores, limit)
      .await?
      .convert()
  }

  /// <https://redis.io/commands/zrank>
  async fn zrank<R, K, V>(&self, key: K, member: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(member);
    commands::sorted_sets::zrank(self, key, member).await?.convert()
  }

  /// Removes the specified members from the sorted set stored at `key`.
  ///
  /// <https://redis.io/commands/zrem>
  async fn zrem<R, K, V>(&self, key: K, members: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(members);
    commands::sorted_sets::zrem(self, key, members).await?.convert()
  }

  /// <https://redis.io/commands/zscore>
  async fn zscore<R, K, V>(&self, key: K, member: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(member);
    commands::sorted_sets::zscore(self, key, member).await?.convert()
  }

  /// Computes the union of the sorted sets given by the specified keys, and stores the result in `destination`.
  ///
  /// <https://redis.io/commands/zunionstore>
  async fn zunionstore<R, D, K>(
    &self,
    destination: D,
    keys: K,
    weights: Vec<f64>,
    aggregate: Option<AggregateOptions>,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    D: Into<RedisKey> + Send,
    K: Into<MultipleKeys> + Send,
  {
    into!(destination, keys);
    commands::sorted_sets::zunionstore(self, destination, keys, weights, aggregate)
      .await?
      .convert()
  }

  /// Computes the intersection of the sorted sets given by the specified keys, and stores the result in
  /// `destination`.
  ///
  /// <https://redis.io/commands/zinterstore>
  async fn zinterstore<R, D, K>(
    &self,
    destination: D,
    keys: K,
    weights: Vec<f64>,
    aggregate: Option<AggregateOptions>,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    D: Into<RedisKey> + Send,
    K: Into<MultipleKeys> + Send,
  {
    into!(destination, keys);
    commands::sorted_sets::zinterstore(self, destination, keys, weights, aggregate)
      .await?
      .convert()
  }

  /// The blocking variant of `ZPOPMIN`.
  ///
  /// <https://redis.io/commands/bzpopmin>
  async fn bzpopmin<R, K>(&self, keys: K, timeout: f64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::sorted_sets::bzpopmin(self, keys, timeout).await?.convert()
  }

  /// <https://redis.io/commands/bzpopmax>
  async fn bzpopmax<R, K>(&self, keys: K, timeout: f64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::sorted_sets::bzpopmax(self, keys, timeout).await?.convert()
  }

  /// Read one page of the members and scores in the sorted set stored at `key`.
  ///
  /// <https://redis.io/commands/zscan>
  async fn zscan_page<K>(
    &self,
    key: K,
    cursor: u64,
    options: ScanOptions,
  ) -> RedisResult<ScanPage<Vec<(RedisValue, f64)>>>
  where
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::scan::zscan_page(self, key, cursor, options).await
  }
}
