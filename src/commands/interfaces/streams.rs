use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, MultipleKeys, MultipleStrings, RedisKey, RedisMap, RedisValue, XID},
};
use std::convert::TryInto;

/// Functions that implement the [streams](https://redis.io/commands#stream) interface.
#[async_trait]
pub trait StreamsInterface: ClientLike + Sized {
  /// Appends the specified stream entry to the stream at the specified key, returning the ID of the new entry.
  ///
  /// <https://redis.io/commands/xadd>
  async fn xadd<R, K, I, F>(
    &self,
    key: K,
    nomkstream: bool,
    maxlen: Option<i64>,
    id: I,
    fields: F,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    I: Into<XID> + Send,
    F: TryInto<RedisMap> + Send,
    F::Error: Into<RedisError> + Send,
  {
    into!(key, id);
    try_into!(fields);
    commands::streams::xadd(self, key, nomkstream, maxlen, id, fields)
      .await?
      .convert()
  }

  /// Returns the number of entries inside a stream.
  ///
  /// <https://redis.io/commands/xlen>
  async fn xlen<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::streams::xlen(self, key).await?.convert()
  }

  /// Returns the stream entries with IDs between `start` and `end`. The special IDs `-` and `+` stand for the
  /// smallest and the greatest ID.
  ///
  /// <https://redis.io/commands/xrange>
  async fn xrange<R, K, S, E>(&self, key: K, start: S, end: E, count: Option<u64>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
    E: TryInto<RedisValue> + Send,
    E::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(start, end);
    commands::streams::xrange(self, key, start, end, count).await?.convert()
  }

  /// Like [xrange](Self::xrange), in reverse order.
  ///
  /// <https://redis.io/commands/xrevrange>
  async fn xrevrange<R, K, E, S>(&self, key: K, end: E, start: S, count: Option<u64>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    E: TryInto<RedisValue> + Send,
    E::Error: Into<RedisError> + Send,
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(end, start);
    commands::streams::xrevrange(self, key, end, start, count)
      .await?
      .convert()
  }

  /// <https://redis.io/commands/xdel>
  async fn xdel<R, K, S>(&self, key: K, ids: S) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    S: Into<MultipleStrings> + Send,
  {
    into!(key, ids);
    commands::streams::xdel(self, key, ids).await?.convert()
  }

  /// Trims the stream to at most `maxlen` entries.
  ///
  /// <https://redis.io/commands/xtrim>
  async fn xtrim<R, K>(&self, key: K, maxlen: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::streams::xtrim(self, key, maxlen).await?.convert()
  }

  /// Read data from one or multiple streams, only returning entries with an ID greater than the last received ID
  /// reported by the caller.
  ///
  /// `block` is in milliseconds. Every key must map to the same cluster slot.
  ///
  /// <https://redis.io/commands/xread>
  async fn xread<R, K>(&self, count: Option<u64>, block: Option<u64>, keys: K, ids: Vec<XID>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::streams::xread(self, count, block, keys, ids)
      .await?
      .convert()
  }

  /// A special version of `XREAD` with support for consumer groups.
  ///
  /// <https://redis.io/commands/xreadgroup>
  async fn xreadgroup<R, G, C, K>(
    &self,
    group: G,
    consumer: C,
    count: Option<u64>,
    block: Option<u64>,
    noack: bool,
    keys: K,
    ids: Vec<XID>,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    G: TryInto<RedisValue> + Send,
    G::Error: Into<RedisError> + Send,
    C: TryInto<RedisValue> + Send,
    C::Error: Into<RedisError> + Send,
    K: Into<MultipleKeys> + Send,
  {
    try_into!(group, consumer);
    into!(keys);
    commands::streams::xreadgroup(self, group, consumer, count, block, noack, keys, ids)
      .await?
      .convert()
  }

  /// Create a new consumer group associated with a stream.
  ///
  /// <https://redis.io/commands/xgroup-create>
  async fn xgroup_create<R, K, G, I>(&self, key: K, group: G, id: I, mkstream: bool) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    G: TryInto<RedisValue> + Send,
    G::Error: Into<RedisError> + Send,
    I: Into<XID> + Send,
  {
    into!(key, id);
    try_into!(group);
    commands::streams::xgroup_create(self, key, group, id, mkstream)
      .await?
      .convert()
  }

  /// <https://redis.io/commands/xgroup-destroy>
  async fn xgroup_destroy<R, K, G>(&self, key: K, group: G) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    G: TryInto<RedisValue> + Send,
    G::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(group);
    commands::streams::xgroup_destroy(self, key, group).await?.convert()
  }

  /// Remove one or more messages from the pending entries list of a stream consumer group.
  ///
  /// <https://redis.io/commands/xack>
  async fn xack<R, K, G>(&self, key: K, group: G, ids: Vec<XID>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    G: TryInto<RedisValue> + Send,
    G::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(group);
    commands::streams::xack(self, key, group, ids).await?.convert()
  }
}
