use crate::{
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, GeoUnit, GeoValue, MultipleValues, RedisKey, RedisValue, SetOptions},
};
use std::convert::TryInto;

/// Functions that implement the [GEO](https://redis.io/commands#geo) interface.
#[async_trait]
pub trait GeoInterface: ClientLike + Sized {
  /// Adds the specified geospatial items (longitude, latitude, name) to the specified key.
  ///
  /// <https://redis.io/commands/geoadd>
  async fn geoadd<R, K>(
    &self,
    key: K,
    options: Option<SetOptions>,
    changed: bool,
    values: Vec<GeoValue>,
  ) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
  {
    into!(key);
    commands::geo::geoadd(self, key, options, changed, values)
      .await?
      .convert()
  }

  /// Return valid Geohash strings representing the position of one or more elements in a sorted set value
  /// representing a geospatial index.
  ///
  /// <https://redis.io/commands/geohash>
  async fn geohash<R, K, V>(&self, key: K, members: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(members);
    commands::geo::geohash(self, key, members).await?.convert()
  }

  /// Return the positions (longitude, latitude) of all the specified members of the geospatial index represented by
  /// the sorted set at `key`.
  ///
  /// The result converts into `Vec<Option<GeoPosition>>`, with `None` for members that do not exist.
  ///
  /// <https://redis.io/commands/geopos>
  async fn geopos<R, K, V>(&self, key: K, members: V) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    V: TryInto<MultipleValues> + Send,
    V::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(members);
    commands::geo::geopos(self, key, members).await?.convert()
  }

  /// Return the distance between two members in the geospatial index represented by the sorted set.
  ///
  /// <https://redis.io/commands/geodist>
  async fn geodist<R, K, S, D>(&self, key: K, src: S, dest: D, unit: Option<GeoUnit>) -> RedisResult<R>
  where
    R: FromRedis,
    K: Into<RedisKey> + Send,
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
    D: TryInto<RedisValue> + Send,
    D::Error: Into<RedisError> + Send,
  {
    into!(key);
    try_into!(src, dest);
    commands::geo::geodist(self, key, src, dest, unit).await?.convert()
  }
}
