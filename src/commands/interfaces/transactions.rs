use crate::{
  commands,
  interfaces::{ClientLike, RedisResult},
  types::{MultipleKeys, RedisValue},
};

/// Functions that implement the [transactions](https://redis.io/commands#transactions) interface.
///
/// While a transaction is open every command is queued and returns `RedisValue::Queued`. The results are returned
/// by [exec](Self::exec).
#[async_trait]
pub trait TransactionInterface: ClientLike + Sized {
  /// Start a transaction.
  ///
  /// Starting a transaction twice has no effect. Fails while a pipeline or a subscription is open, and against a
  /// cluster.
  ///
  /// <https://redis.io/commands/multi>
  async fn multi(&self) -> RedisResult<()> {
    commands::transactions::multi(self).await
  }

  /// Execute the queued commands.
  ///
  /// Returns `None` if the transaction was aborted because a watched key changed.
  ///
  /// <https://redis.io/commands/exec>
  async fn exec(&self) -> RedisResult<Option<Vec<RedisValue>>> {
    commands::transactions::exec(self).await
  }

  /// Discard the queued commands without sending them.
  ///
  /// <https://redis.io/commands/discard>
  async fn discard(&self) -> RedisResult<()> {
    commands::transactions::discard(self).await
  }

  /// Marks the given keys to be watched for conditional execution of a transaction.
  ///
  /// <https://redis.io/commands/watch>
  async fn watch<K>(&self, keys: K) -> RedisResult<()>
  where
    K: Into<MultipleKeys> + Send,
  {
    into!(keys);
    commands::transactions::watch(self, keys).await
  }

  /// Flushes all the previously watched keys for a transaction.
  ///
  /// <https://redis.io/commands/unwatch>
  async fn unwatch(&self) -> RedisResult<()> {
    commands::transactions::unwatch(self).await
  }
}
