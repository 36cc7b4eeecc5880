use super::*;
use crate::{types::MultipleKeys, utils};

pub async fn multi<C: ClientLike>(client: &C) -> Result<(), RedisError> {
  client.inner().multi().await
}

pub async fn exec<C: ClientLike>(client: &C) -> Result<Option<Vec<RedisValue>>, RedisError> {
  client.inner().exec().await
}

pub async fn discard<C: ClientLike>(client: &C) -> Result<(), RedisError> {
  client.inner().discard().await
}

pub async fn watch<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<(), RedisError> {
  utils::check_empty_keys(&keys)?;
  args_ok_cmd(client, RedisCommandKind::Watch, keys.into_values()).await
}

ok_cmd!(unwatch, Unwatch);
