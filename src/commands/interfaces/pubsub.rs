use crate::{
  clients::Subscription,
  commands,
  error::RedisError,
  interfaces::{ClientLike, RedisResult},
  types::{FromRedis, MultipleStrings, RedisValue},
};
use std::convert::TryInto;

/// Functions that implement the [publish-subscribe](https://redis.io/commands#pubsub) interface.
#[async_trait]
pub trait PubsubInterface: ClientLike + Sized {
  /// Subscribe to one or more channels, returning the subscription that receives their messages.
  ///
  /// The connection must not already own a subscription, and cannot send other commands until the subscription is
  /// closed. Use [Subscription::subscribe](crate::clients::Subscription::subscribe) to follow more channels.
  ///
  /// <https://redis.io/commands/subscribe>
  async fn subscribe<S>(&self, channels: S) -> RedisResult<Subscription>
  where
    S: Into<MultipleStrings> + Send,
  {
    into!(channels);
    commands::pubsub::subscribe(self, channels).await
  }

  /// Subscribe to one or more channel patterns.
  ///
  /// <https://redis.io/commands/psubscribe>
  async fn psubscribe<S>(&self, patterns: S) -> RedisResult<Subscription>
  where
    S: Into<MultipleStrings> + Send,
  {
    into!(patterns);
    commands::pubsub::psubscribe(self, patterns).await
  }

  /// Publish a message on the pubsub channel, returning the number of clients that received it.
  ///
  /// <https://redis.io/commands/publish>
  async fn publish<R, S, V>(&self, channel: S, message: V) -> RedisResult<R>
  where
    R: FromRedis,
    S: TryInto<RedisValue> + Send,
    S::Error: Into<RedisError> + Send,
    V: TryInto<RedisValue> + Send,
    V::Error: Into<RedisError> + Send,
  {
    try_into!(channel, message);
    commands::pubsub::publish(self, channel, message).await?.convert()
  }

  /// Lists the currently active channels, optionally filtered by `pattern`.
  ///
  /// <https://redis.io/commands/pubsub-channels>
  async fn pubsub_channels<R>(&self, pattern: Option<RedisValue>) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::pubsub::pubsub_channels(self, pattern).await?.convert()
  }

  /// <https://redis.io/commands/pubsub-numsub>
  async fn pubsub_numsub<R, S>(&self, channels: S) -> RedisResult<R>
  where
    R: FromRedis,
    S: Into<MultipleStrings> + Send,
  {
    into!(channels);
    commands::pubsub::pubsub_numsub(self, channels).await?.convert()
  }

  /// <https://redis.io/commands/pubsub-numpat>
  async fn pubsub_numpat<R>(&self) -> RedisResult<R>
  where
    R: FromRedis,
  {
    commands::pubsub::pubsub_numpat(self).await?.convert()
  }
}
