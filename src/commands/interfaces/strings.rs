use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{Expiration, FromRedis, MultipleKeys, RedisKey, RedisMap, RedisValue, SetOptions},
};
use std::convert::TryInto;

/// Functions that implement the [string](https://redis.io/commands#string) interface.
#[async_trait]
pub trait StringsInterface: ClientLike + Sized {
  /// Read a value from the server.
  ///
  /// <https://redis.io/commands/get>
  async fn get<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::get(self, key).await?.convert()
  }

  /// Set a value with optional NX|XX, EX|PX|EXAT|PXAT|KEEPTTL, and GET arguments.
  ///
  /// <https://redis.io/commands/set>
  async fn set<R, K, V>(
    &self,
    key: K,
    value: V,
    expire: Option<Expiration>,
    options: Option<SetOptions>,
    get: bool,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(value);
    commands::strings::set(self, key, value, expire, options, get)
      .await?
      .convert()
  }

  /// Set `key` to `value` if `key` does not exist.
  ///
  /// <https://redis.io/commands/setnx>
  async fn setnx<R, K, V>(&self, key: K, value: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(value);
    commands::strings::setnx(self, key, value).await?.convert()
  }

  /// Set `key` to hold the string `value` and set `key` to timeout after a given number of seconds.
  ///
  /// <https://redis.io/commands/setex>
  async fn setex<R, K, V>(&self, key: K, seconds: i64, value: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(value);
    commands::strings::setex(self, key, seconds, value).await?.convert()
  }

  /// <https://redis.io/commands/psetex>
  async fn psetex<R, K, V>(&self, key: K, milliseconds: i64, value: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(value);
    commands::strings::psetex(self, key, milliseconds, value)
      .await?
      .convert()
  }

  /// Atomically sets `key` to `value` and returns the old value stored at `key`.
  ///
  /// <https://redis.io/commands/getset>
  async fn getset<R, K, V>(&self, key: K, value: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(value);
    commands::strings::getset(self, key, value).await?.convert()
  }

  /// Get the value of key and delete the key.
  ///
  /// <https://redis.io/commands/getdel>
  async fn getdel<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::getdel(self, key).await?.convert()
  }

  /// Returns the substring of the string value stored at `key` with offsets `start` and `end` (both inclusive).
  ///
  /// <https://redis.io/commands/getrange>
  async fn getrange<R, K>(&self, key: K, start: i64, end: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::getrange(self, key, start, end).await?.convert()
  }

  /// Overwrites part of the string stored at `key`, starting at the specified `offset`, for the entire length of
  /// `value`.
  ///
  /// <https://redis.io/commands/setrange>
  async fn setrange<R, K, V>(&self, key: K, offset: u32, value: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(value);
    commands::strings::setrange(self, key, offset, value).await?.convert()
  }

  /// <https://redis.io/commands/append>
  async fn append<R, K, V>(&self, key: K, value: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(value);
    commands::strings::append(self, key, value).await?.convert()
  }

  /// Returns the length of the string value stored at key.
  ///
  /// <https://redis.io/commands/strlen>
  async fn strlen<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::strlen(self, key).await?.convert()
  }

  /// Increments the number stored at `key` by one. If the key does not exist, it is set to 0 before performing the
  /// operation.
  ///
  /// <https://redis.io/commands/incr>
  async fn incr<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::incr(self, key).await?.convert()
  }

  /// <https://redis.io/commands/incrby>
  async fn incr_by<R, K>(&self, key: K, val: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::incr_by(self, key, val).await?.convert()
  }

  /// Increment the string representing a floating point number stored at key by `val`.
  ///
  /// <https://redis.io/commands/incrbyfloat>
  async fn incr_by_float<R, K>(&self, key: K, val: f64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::incr_by_float(self, key, val).await?.convert()
  }

  /// <https://redis.io/commands/decr>
  async fn decr<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::decr(self, key).await?.convert()
  }

  /// <https://redis.io/commands/decrby>
  async fn decr_by<R, K>(&self, key: K, val: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::strings::decr_by(self, key, val).await?.convert()
  }

  /// Returns the values of all specified keys, in the order of the keys.
  ///
  /// Against a cluster the keys are read from every node that owns one of them and the results are put back in
  /// order.
  ///
  /// <https://redis.io/commands/mget>
  async fn mget<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::strings::mget(self, keys).await?.convert()
  }

  /// Sets the given keys to their respective values.
  ///
  /// <https://redis.io/commands/mset>
  async fn mset<V>(&self, values: V) -> RedisResult<()>
  where
    V: TryInto<RedisMap> + Send,
    V::Error: Into<RedisError> + Send,
  {
    try_into!(values);
    commands::strings::mset(self, values).await?.convert()
  }

  /// Sets the given keys to their respective values only if none of them exist.
  ///
  /// When the keys span several cluster slots each key is written with `SETNX`, so the result is only true if every
  /// key was written, but keys that did not exist are written either way.
  ///
  /// <https://redis.io/commands/msetnx>
  async fn msetnx<R, V>(&self, values: V) -> RedisResult<R>
  where
    R: FromRedis,
    V: TryInto<RedisMap> + Send,
    V::Error: Into<RedisError> + Send,
  {
    try_into!(values);
    commands::strings::msetnx(self, values).await?.convert()
  }
}
