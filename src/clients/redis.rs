use crate::{
  clients::pubsub::Subscription,
  commands,
  connection::ConnectionInner,
  error::RedisError,
  interfaces::*,
  types::{RedisKey, RedisValue, ScanOptions, ScanPage},
};
use futures::Stream;
use std::{fmt, sync::Arc};

/// A connection to a standalone server, or a cluster when created by a clustered factory.
///
/// Commands run immediately by default. Use `open_pipeline`/`close_pipeline` to batch commands, or `multi`/`exec`
/// to run them in a transaction. Clones share the same underlying state.
///
/// ```rust no_run
/// use conduit::prelude::*;
///
/// async fn example(factory: &ConnectionFactory) -> Result<(), RedisError> {
///   let connection = factory.get_connection()?;
///   let _: () = connection.set("foo", "bar", None, None, false).await?;
///   let foo: Option<String> = connection.get("foo").await?;
///   assert_eq!(foo.as_deref(), Some("bar"));
///
///   connection.open_pipeline().await?;
///   let _: () = connection.incr("counter").await?;
///   let _: () = connection.incr("counter").await?;
///   let results = connection.close_pipeline().await?;
///   assert_eq!(results.len(), 2);
///
///   connection.close().await;
///   Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RedisConnection {
  inner: Arc<ConnectionInner>,
}

impl fmt::Debug for RedisConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RedisConnection")
      .field("id", &self.inner.id)
      .field("mode", &self.inner.mode())
      .finish()
  }
}

impl ClientLike for RedisConnection {
  #[doc(hidden)]
  fn inner(&self) -> &Arc<ConnectionInner> {
    &self.inner
  }
}

impl GeoInterface for RedisConnection {}
impl HashesInterface for RedisConnection {}
impl KeysInterface for RedisConnection {}
impl ListInterface for RedisConnection {}
impl LuaInterface for RedisConnection {}
impl PubsubInterface for RedisConnection {}
impl ServerInterface for RedisConnection {}
impl SetsInterface for RedisConnection {}
impl SortedSetsInterface for RedisConnection {}
impl StreamsInterface for RedisConnection {}
impl StringsInterface for RedisConnection {}
impl TransactionInterface for RedisConnection {}

impl RedisConnection {
  pub(crate) fn new(inner: Arc<ConnectionInner>) -> Self {
    RedisConnection { inner }
  }

  /// Read the database index selected on the connection.
  pub fn database(&self) -> u8 {
    self.inner.database()
  }

  /// Read the live subscription created by `subscribe` or `psubscribe`, if any.
  pub fn subscription(&self) -> Option<Subscription> {
    self.inner.subscription()
  }

  /// Scan every key, yielding one page per `SCAN` call.
  ///
  /// The stream ends after the server returns the starting cursor. Each call is a round trip, so the connection must
  /// not be in pipeline or transaction mode.
  pub fn scan(&self, options: ScanOptions) -> impl Stream<Item = Result<ScanPage<Vec<RedisKey>>, RedisError>> {
    commands::scan::scan(self, options)
  }

  /// Scan the fields and values in the hash stored at `key`.
  pub fn hscan<K>(
    &self,
    key: K,
    options: ScanOptions,
  ) -> impl Stream<Item = Result<ScanPage<Vec<(RedisKey, RedisValue)>>, RedisError>>
  where
    K: Into<RedisKey>,
  {
    commands::scan::hscan(self, key.into(), options)
  }

  /// Scan the members of the set stored at `key`.
  pub fn sscan<K>(
    &self,
    key: K,
    options: ScanOptions,
  ) -> impl Stream<Item = Result<ScanPage<Vec<RedisValue>>, RedisError>>
  where
    K: Into<RedisKey>,
  {
    commands::scan::sscan(self, key.into(), options)
  }

  /// Scan the members and scores in the sorted set stored at `key`.
  pub fn zscan<K>(
    &self,
    key: K,
    options: ScanOptions,
  ) -> impl Stream<Item = Result<ScanPage<Vec<(RedisValue, f64)>>, RedisError>>
  where
    K: Into<RedisKey>,
  {
    commands::scan::zscan(self, key.into(), options)
  }
}
