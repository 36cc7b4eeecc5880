use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, MultipleKeys, RedisKey, RedisValue, ScanOptions, ScanPage, SortOptions},
};
use std::convert::TryInto;

/// Functions that implement the generic [keys](https://redis.io/commands#generic) interface.
///
/// Against a cluster `DEL`, `UNLINK`, `EXISTS` and `TOUCH` are split by slot and the counts are added up, `KEYS` and
/// `RANDOMKEY` visit every primary, and `RENAME` between slots is emulated with `DUMP` and `RESTORE`.
#[async_trait]
pub trait KeysInterface: ClientLike + Sized {
  /// Removes the specified keys. A key is ignored if it does not exist.
  ///
  /// Returns the number of keys removed.
  ///
  /// <https://redis.io/commands/del>
  async fn del<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::keys::del(self, keys).await?.convert()
  }

  /// Remove the specified keys, reclaiming their memory in a background thread.
  ///
  /// <https://redis.io/commands/unlink>
  async fn unlink<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::keys::unlink(self, keys).await?.convert()
  }

  /// Returns the number of the provided keys that exist.
  ///
  /// <https://redis.io/commands/exists>
  async fn exists<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::keys::exists(self, keys).await?.convert()
  }

  /// Alters the last access time of the provided keys.
  ///
  /// <https://redis.io/commands/touch>
  async fn touch<R, K>(&self, keys: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::keys::touch(self, keys).await?.convert()
  }

  /// Set a timeout on key. After the timeout has expired, the key will automatically be deleted.
  ///
  /// <https://redis.io/commands/expire>
  async fn expire<R, K>(&self, key: K, seconds: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::expire(self, key, seconds).await?.convert()
  }

  /// <https://redis.io/commands/pexpire>
  async fn pexpire<R, K>(&self, key: K, milliseconds: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::pexpire(self, key, milliseconds).await?.convert()
  }

  /// Set a timeout on a key based on a UNIX timestamp in seconds.
  ///
  /// <https://redis.io/commands/expireat>
  async fn expire_at<R, K>(&self, key: K, timestamp: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::expire_at(self, key, timestamp).await?.convert()
  }

  /// <https://redis.io/commands/pexpireat>
  async fn pexpire_at<R, K>(&self, key: K, timestamp: i64) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::pexpire_at(self, key, timestamp).await?.convert()
  }

  /// Remove the existing timeout on a key, turning the key from volatile to persistent.
  ///
  /// <https://redis.io/commands/persist>
  async fn persist<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::persist(self, key).await?.convert()
  }

  /// Returns the remaining time to live of a key that has a timeout, in seconds.
  ///
  /// <https://redis.io/commands/ttl>
  async fn ttl<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::ttl(self, key).await?.convert()
  }

  /// <https://redis.io/commands/pttl>
  async fn pttl<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::pttl(self, key).await?.convert()
  }

  /// Returns the string representation of the type of the value stored at `key`.
  ///
  /// <https://redis.io/commands/type>
  async fn key_type<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::key_type(self, key).await?.convert()
  }

  /// Serialize the value stored at `key` in a Redis-specific format and return it as bulk string.
  ///
  /// <https://redis.io/commands/dump>
  async fn dump<R, K>(&self, key: K) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::dump(self, key).await?.convert()
  }

  /// Create a key associated with a value that is obtained by deserializing the provided serialized value.
  ///
  /// <https://redis.io/commands/restore>
  async fn restore<R, K>(&self, key: K, ttl: i64, serialized: RedisValue, replace: bool, absttl: bool) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::restore(self, key, ttl, serialized, replace, absttl)
      .await?
      .convert()
  }

  /// Copy the value stored at the source key to the destination key.
  ///
  /// <https://redis.io/commands/copy>
  async fn copy<R, S, D>(&self, source: S, destination: D, db: Option<u8>, replace: bool) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
  {
    into!(source, destination);
    commands::keys::copy(self, source, destination, db, replace)
      .await?
      .convert()
  }

  /// Renames `source` to `destination`.
  ///
  /// When the keys map to different slots the value is moved with `DUMP`, `RESTORE` and `DEL`. This is not atomic.
  ///
  /// <https://redis.io/commands/rename>
  async fn rename<R, S, D>(&self, source: S, destination: D) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
  {
    into!(source, destination);
    commands::keys::rename(self, source, destination).await?.convert()
  }

  /// Renames `source` to `destination` if `destination` does not yet exist.
  ///
  /// <https://redis.io/commands/renamenx>
  async fn renamenx<R, S, D>(&self, source: S, destination: D) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<RedisKey> + Send,
    D: Into<RedisKey> + Send,
  {
    into!(source, destination);
    commands::keys::renamenx(self, source, destination).await?.convert()
  }

  /// Move a key from the currently selected database to the specified destination database.
  ///
  /// <https://redis.io/commands/move>
  async fn move_key<R, K>(&self, key: K, db: u8) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::move_key(self, key, db).await?.convert()
  }

  /// Returns all keys matching `pattern`, from every primary in a cluster.
  ///
  /// <https://redis.io/commands/keys>
  async fn keys<R, P>(&self, pattern: P) -> RedisResult<R>
  where
    R: FromRedis,
    P: TryInto<RedisValue> + Send,
    P::Error: Into<RedisError> + Send,
  {
    try_into!(pattern);
    commands::keys::keys(self, pattern).await?.convert()
  }

  /// Return a random key from the currently selected database.
  ///
  /// <https://redis.io/commands/randomkey>
  async fn randomkey<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::keys::randomkey(self).await?.convert()
  }

  /// Sort the elements in a list, set or sorted set, optionally storing the result at `store`.
  ///
  /// <https://redis.io/commands/sort>
  async fn sort<R, K>(&self, key: K, options: SortOptions, store: Option<RedisKey>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::keys::sort(self, key, options, store).await?.convert()
  }

  /// Read one page of keys starting at `cursor`, which is [STARTING_CURSOR](crate::types::STARTING_CURSOR) for the
  /// first page.
  ///
  /// Against a cluster the pattern must contain a hash tag so that the command can be routed to one node. Use
  /// `scan_node` or the `scan` stream on the connection to read every primary.
  ///
  /// <https://redis.io/commands/scan>
  async fn scan_page(&self, cursor: u64, options: ScanOptions) -> RedisResult<ScanPage<Vec<RedisKey>>> {
    commands::scan::scan_page(self, cursor, options).await
  }
}
