use crate::types::RedisValue;
use bytes_utils::Str;

/// A message received on a subscribed channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
  /// The channel on which the message was published.
  pub channel: Str,
  /// The pattern that matched the channel, for messages received via `PSUBSCRIBE`.
  pub pattern: Option<Str>,
  /// The message payload.
  pub value:   RedisValue,
}

impl Message {
  /// Whether the message was received via a pattern subscription.
  pub fn is_pattern(&self) -> bool {
    self.pattern.is_some()
  }
}
