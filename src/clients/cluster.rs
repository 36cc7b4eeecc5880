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

/// A connection to a cluster.
///
/// Every command group works the same as on a `RedisConnection`. Multi-key commands whose keys span several hash slots
/// are emulated across the nodes that own them, and `ClusterInterface` adds commands that target specific nodes.
///
/// ```rust no_run
/// use conduit::prelude::*;
///
/// async fn example(factory: &ConnectionFactory) -> Result<(), RedisError> {
///   let connection = factory.get_cluster_connection()?;
///   let _: () = connection.sadd("a", vec![1, 2]).await?;
///   let _: () = connection.sadd("b", vec![2, 3]).await?;
///   // "a" and "b" live in different hash slots
///   let union: Vec<i64> = connection.sunion(vec!["a", "b"]).await?;
///   assert_eq!(union.len(), 3);
///
///   for primary in connection.cluster_primaries().await? {
///     let size: i64 = connection.dbsize_on_node(&primary).await?;
///     println!("{} has {} keys", primary.server, size);
///   }
///
///   connection.close().await;
///   Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ClusterConnection {
  inner: Arc<ConnectionInner>,
}

impl fmt::Debug for ClusterConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClusterConnection")
      .field("id", &self.inner.id)
      .field("mode", &self.inner.mode())
      .finish()
  }
}

impl ClientLike for ClusterConnection {
  #[doc(hidden)]
  fn inner(&self) -> &Arc<ConnectionInner> {
    &self.inner
  }
}

impl ClusterInterface for ClusterConnection {}
impl GeoInterface for ClusterConnection {}
impl HashesInterface for ClusterConnection {}
impl KeysInterface for ClusterConnection {}
impl ListInterface for ClusterConnection {}
impl LuaInterface for ClusterConnection {}
impl PubsubInterface for ClusterConnection {}
impl ServerInterface for ClusterConnection {}
impl SetsInterface for ClusterConnection {}
impl SortedSetsInterface for ClusterConnection {}
impl StreamsInterface for ClusterConnection {}
impl StringsInterface for ClusterConnection {}
impl TransactionInterface for ClusterConnection {}

impl ClusterConnection {
  pub(crate) fn new(inner: Arc<ConnectionInner>) -> Self {
    ClusterConnection { inner }
  }

  /// Read the live subscription created by `subscribe` or `psubscribe`, if any.
  pub fn subscription(&self) -> Option<Subscription> {
    self.inner.subscription()
  }

  /// Scan every key, yielding one page per `SCAN` call.
  ///
  /// Each primary is scanned in turn, or only the node serving the hash tag when the pattern contains one. The
  /// stream ends after the last node returns the starting cursor, and the connection must not be in pipeline or
  /// transaction mode.
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
