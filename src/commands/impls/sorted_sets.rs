use super::*;
use crate::{
  types::{AggregateOptions, Limit, MultipleKeys, MultipleValues, Ordering, SetOptions},
  utils,
};
use std::time::Duration;

pub async fn zadd<C: ClientLike>(
  client: &C,
  key: RedisKey,
  options: Option<SetOptions>,
  ordering: Option<Ordering>,
  changed: bool,
  incr: bool,
  values: Vec<(f64, RedisValue)>,
) -> Result<RedisValue, RedisError> {
  if values.is_empty() {
    return Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one score and member is required.",
    ));
  }

  let mut args = Vec::with_capacity(5 + values.len() * 2);
  args.push(key.into());
  if let Some(options) = options {
    args.push(options.to_str().into());
  }
  if let Some(ordering) = ordering {
    args.push(ordering.to_str().into());
  }
  if changed {
    args.push(static_val!(CHANGED));
  }
  if incr {
    args.push(static_val!(INCR));
  }
  for (score, member) in values.into_iter() {
    args.push(utils::f64_to_redis_string(score)?);
    args.push(member);
  }

  args_value_cmd(client, RedisCommandKind::ZAdd, args).await
}

pub async fn zcard<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::ZCard, key.into()).await
}

pub async fn zcount<C: ClientLike>(
  client: &C,
  key: RedisKey,
  min: RedisValue,
  max: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::ZCount, vec![key.into(), min, max]).await
}

pub async fn zincrby<C: ClientLike>(
  client: &C,
  key: RedisKey,
  increment: f64,
  member: RedisValue,
) -> Result<RedisValue, RedisError> {
  let increment = utils::f64_to_redis_string(increment)?;
  args_value_cmd(client, RedisCommandKind::ZIncrBy, vec![key.into(), increment, member]).await
}

fn range_args(key: RedisKey, start: RedisValue, stop: RedisValue, withscores: bool) -> Vec<RedisValue> {
  let mut args = Vec::with_capacity(4);
  args.push(key.into());
  args.push(start);
  args.push(stop);
  if withscores {
    args.push(static_val!(WITH_SCORES));
  }
  args
}

pub async fn zrange<C: ClientLike>(
  client: &C,
  key: RedisKey,
  start: i64,
  stop: i64,
  withscores: bool,
) -> Result<RedisValue, RedisError> {
  let args = range_args(key, start.into(), stop.into(), withscores);
  args_value_cmd(client, RedisCommandKind::ZRange, args).await
}

pub async fn zrevrange<C: ClientLike>(
  client: &C,
  key: RedisKey,
  start: i64,
  stop: i64,
  withscores: bool,
) -> Result<RedisValue, RedisError> {
  let args = range_args(key, start.into(), stop.into(), withscores);
  args_value_cmd(client, RedisCommandKind::ZRevRange, args).await
}

pub async fn zrangebyscore<C: ClientLike>(
  client: &C,
  key: RedisKey,
  min: RedisValue,
  max: RedisValue,
  withscores: bool,
  limit: Option<Limit>,
) -> Result<RedisValue, RedisError> {
  let mut args = range_args(key, min, max, withscores);
  if let Some((offset, count)) = limit {
    args.push(static_val!(LIMIT));
    args.push(offset.into());
    args.push(count.into());
  }

  args_value_cmd(client, RedisCommandKind::ZRangeByScore, args).await
}

pub async fn zrank<C: ClientLike>(client: &C, key: RedisKey, member: RedisValue) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::ZRank, vec![key.into(), member]).await
}

pub async fn zrem<C: ClientLike>(client: &C, key: RedisKey, members: MultipleValues) -> Result<RedisValue, RedisError> {
  if members.is_empty() {
    return Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one member is required.",
    ));
  }

  let mut args = Vec::with_capacity(1 + members.len());
  args.push(key.into());
  args.extend(members.inner());
  args_value_cmd(client, RedisCommandKind::ZRem, args).await
}

pub async fn zscore<C: ClientLike>(client: &C, key: RedisKey, member: RedisValue) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::ZScore, vec![key.into(), member]).await
}

async fn store_combined<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  destination: RedisKey,
  keys: MultipleKeys,
  weights: Vec<f64>,
  aggregate: Option<AggregateOptions>,
) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&keys)?;
  let keys = keys.inner();
  let mut all_keys = Vec::with_capacity(keys.len() + 1);
  all_keys.push(destination.clone());
  all_keys.extend(keys.iter().cloned());
  check_same_slot(client, kind.cmd_str(), &all_keys)?;

  let mut args = Vec::with_capacity(keys.len() * 2 + 5);
  args.push(destination.into());
  args.push(to!(keys.len())?);
  args.extend(keys.into_iter().map(|k| k.into()));
  if !weights.is_empty() {
    args.push(static_val!(WEIGHTS));
    for weight in weights.into_iter() {
      args.push(utils::f64_to_redis_string(weight)?);
    }
  }
  if let Some(aggregate) = aggregate {
    args.push(static_val!(AGGREGATE));
    args.push(aggregate.to_str().into());
  }

  args_value_cmd(client, kind, args).await
}

pub async fn zunionstore<C: ClientLike>(
  client: &C,
  destination: RedisKey,
  keys: MultipleKeys,
  weights: Vec<f64>,
  aggregate: Option<AggregateOptions>,
) -> Result<RedisValue, RedisError> {
  store_combined(client, RedisCommandKind::ZUnionStore, destination, keys, weights, aggregate).await
}

pub async fn zinterstore<C: ClientLike>(
  client: &C,
  destination: RedisKey,
  keys: MultipleKeys,
  weights: Vec<f64>,
  aggregate: Option<AggregateOptions>,
) -> Result<RedisValue, RedisError> {
  store_combined(client, RedisCommandKind::ZInterStore, destination, keys, weights, aggregate).await
}

async fn blocking_pop<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  keys: MultipleKeys,
  timeout: f64,
) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&keys)?;
  let keys = keys.inner();
  check_same_slot(client, kind.cmd_str(), &keys)?;

  let mut args: Vec<RedisValue> = keys.into_iter().map(|k| k.into()).collect();
  args.push(timeout.into());
  let block = if timeout > 0.0 {
    Duration::from_secs_f64(timeout)
  } else {
    Duration::from_secs(0)
  };

  request(client, RedisCommand::new(kind, args).with_block(block)).await
}

pub async fn bzpopmin<C: ClientLike>(client: &C, keys: MultipleKeys, timeout: f64) -> Result<RedisValue, RedisError> {
  blocking_pop(client, RedisCommandKind::BzPopMin, keys, timeout).await
}

pub async fn bzpopmax<C: ClientLike>(client: &C, keys: MultipleKeys, timeout: f64) -> Result<RedisValue, RedisError> {
  blocking_pop(client, RedisCommandKind::BzPopMax, keys, timeout).await
}
