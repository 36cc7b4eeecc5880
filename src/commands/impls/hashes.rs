use super::*;
use crate::{
  types::{MultipleKeys, RedisMap},
  utils,
};

pub async fn hset<C: ClientLike>(client: &C, key: RedisKey, values: RedisMap) -> Result<RedisValue, RedisError> {
  if values.is_empty() {
    return Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one field is required.",
    ));
  }

  let mut args = Vec::with_capacity(1 + values.len() * 2);
  args.push(key.into());
  for (field, value) in values.inner().into_iter() {
    args.push(field.into());
    args.push(value);
  }

  args_value_cmd(client, RedisCommandKind::HSet, args).await
}

pub async fn hsetnx<C: ClientLike>(
  client: &C,
  key: RedisKey,
  field: RedisKey,
  value: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::HSetNx, vec![key.into(), field.into(), value]).await
}

pub async fn hget<C: ClientLike>(client: &C, key: RedisKey, field: RedisKey) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::HGet, vec![key.into(), field.into()]).await
}

pub async fn hmget<C: ClientLike>(client: &C, key: RedisKey, fields: MultipleKeys) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&fields)?;

  let mut args = Vec::with_capacity(1 + fields.len());
  args.push(key.into());
  args.extend(fields.into_values());
  args_value_cmd(client, RedisCommandKind::HMGet, args).await
}

pub async fn hgetall<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::HGetAll, key.into()).await
}

pub async fn hdel<C: ClientLike>(client: &C, key: RedisKey, fields: MultipleKeys) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&fields)?;

  let mut args = Vec::with_capacity(1 + fields.len());
  args.push(key.into());
  args.extend(fields.into_values());
  args_value_cmd(client, RedisCommandKind::HDel, args).await
}

pub async fn hexists<C: ClientLike>(client: &C, key: RedisKey, field: RedisKey) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::HExists, vec![key.into(), field.into()]).await
}

pub async fn hincrby<C: ClientLike>(
  client: &C,
  key: RedisKey,
  field: RedisKey,
  increment: i64,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::HIncrBy, vec![
    key.into(),
    field.into(),
    increment.into(),
  ])
  .await
}

pub async fn hincrbyfloat<C: ClientLike>(
  client: &C,
  key: RedisKey,
  field: RedisKey,
  increment: f64,
) -> Result<RedisValue, RedisError> {
  let increment = utils::f64_to_redis_string(increment)?;
  args_value_cmd(client, RedisCommandKind::HIncrByFloat, vec![
    key.into(),
    field.into(),
    increment,
  ])
  .await
}

pub async fn hkeys<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::HKeys, key.into()).await
}

pub async fn hvals<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::HVals, key.into()).await
}

pub async fn hlen<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::HLen, key.into()).await
}

pub async fn hstrlen<C: ClientLike>(client: &C, key: RedisKey, field: RedisKey) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::HStrLen, vec![key.into(), field.into()]).await
}
