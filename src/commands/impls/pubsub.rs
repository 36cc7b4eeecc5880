use super::*;
use crate::{clients::Subscription, types::MultipleStrings, utils};

pub async fn subscribe<C: ClientLike>(client: &C, channels: MultipleStrings) -> Result<Subscription, RedisError> {
  utils::check_empty_keys(&channels)?;
  client.inner().subscribe(channels).await
}

pub async fn psubscribe<C: ClientLike>(client: &C, patterns: MultipleStrings) -> Result<Subscription, RedisError> {
  utils::check_empty_keys(&patterns)?;
  client.inner().psubscribe(patterns).await
}

pub async fn publish<C: ClientLike>(
  client: &C,
  channel: RedisValue,
  message: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::Publish, vec![channel, message]).await
}

pub async fn pubsub_channels<C: ClientLike>(client: &C, pattern: Option<RedisValue>) -> Result<RedisValue, RedisError> {
  let args = pattern.into_iter().collect();
  args_value_cmd(client, RedisCommandKind::PubsubChannels, args).await
}

pub async fn pubsub_numsub<C: ClientLike>(client: &C, channels: MultipleStrings) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::PubsubNumSub, channels.into_values()).await
}

value_cmd!(pubsub_numpat, PubsubNumPat);
