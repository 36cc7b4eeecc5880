use crate::{
  connection::{ConnectionInner, ConnectionMode},
  error::RedisError,
  types::{FromRedis, RedisValue},
};
use std::sync::Arc;

pub use crate::commands::interfaces::{
  cluster::ClusterInterface,
  geo::GeoInterface,
  hashes::HashesInterface,
  keys::KeysInterface,
  lists::ListInterface,
  lua::LuaInterface,
  pubsub::PubsubInterface,
  server::ServerInterface,
  sets::SetsInterface,
  sorted_sets::SortedSetsInterface,
  streams::StreamsInterface,
  strings::StringsInterface,
  transactions::TransactionInterface,
};

/// Type alias for `Result<T, RedisError>`.
pub type RedisResult<T> = Result<T, RedisError>;

/// Any connection that can send commands, and the functions shared by every connection type.
///
/// Command groups are implemented as separate traits on top of this one, so a connection type can pick the groups it
/// supports.
#[async_trait]
pub trait ClientLike: Send + Sync + Sized {
  #[doc(hidden)]
  fn inner(&self) -> &Arc<ConnectionInner>;

  /// The unique ID identifying this connection in log lines.
  fn id(&self) -> &str {
    self.inner().id.as_str()
  }

  /// Read the current execution mode.
  fn mode(&self) -> ConnectionMode {
    self.inner().mode()
  }

  /// Whether the connection is running against a cluster.
  fn is_clustered(&self) -> bool {
    self.inner().is_clustered()
  }

  /// Whether a pipeline is open.
  fn is_pipelined(&self) -> bool {
    self.inner().is_pipelined()
  }

  /// Whether a transaction is queueing commands.
  fn is_queueing(&self) -> bool {
    self.inner().is_queueing()
  }

  /// Whether the connection owns a live subscription.
  fn is_subscribed(&self) -> bool {
    self.inner().is_subscribed()
  }

  fn is_closed(&self) -> bool {
    self.inner().is_closed()
  }

  /// Start a pipeline. Every command returns `RedisValue::Queued` until `close_pipeline` is called.
  async fn open_pipeline(&self) -> RedisResult<()> {
    self.inner().open_pipeline().await
  }

  /// Flush the pipeline and return the results of every command that does not reply with a status, in the order the
  /// commands were issued.
  ///
  /// If any command failed the error is a `Pipeline` error carrying every result, including the failures.
  async fn close_pipeline(&self) -> RedisResult<Vec<RedisValue>> {
    self.inner().close_pipeline().await
  }

  /// Run a command by name.
  ///
  /// The name is resolved in the command registry and the number of arguments is checked before the command is
  /// sent. Unknown commands are sent as-is.
  async fn execute<R, A>(&self, name: &str, args: Vec<A>) -> RedisResult<R>
  where
    R: FromRedis,
    A: Into<RedisValue> + Send,
  {
    let args = args.into_iter().map(|arg| arg.into()).collect();
    self.inner().execute(name, args).await?.convert()
  }

  /// Select the database used by this connection.
  ///
  /// Not supported when the connection uses a shared native connection, or against a cluster for any index but 0.
  async fn select(&self, db: u8) -> RedisResult<()> {
    self.inner().select(db).await
  }

  /// Close the connection, releasing any dedicated driver connection and closing the subscription.
  async fn close(&self) {
    self.inner().close().await
  }
}
