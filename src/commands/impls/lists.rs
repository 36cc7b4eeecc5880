use super::*;
use crate::{
  types::{LMoveDirection, MultipleKeys, MultipleValues},
  utils,
};
use std::time::Duration;

fn check_empty_values(values: &MultipleValues) -> Result<(), RedisError> {
  if values.is_empty() {
    Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one value is required.",
    ))
  } else {
    Ok(())
  }
}

fn block_duration(timeout: f64) -> Duration {
  if timeout > 0.0 {
    Duration::from_secs_f64(timeout)
  } else {
    Duration::from_secs(0)
  }
}

async fn push<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  key: RedisKey,
  values: MultipleValues,
) -> Result<RedisValue, RedisError> {
  check_empty_values(&values)?;

  let mut args = Vec::with_capacity(1 + values.len());
  args.push(key.into());
  args.extend(values.inner());
  args_value_cmd(client, kind, args).await
}

pub async fn lpush<C: ClientLike>(client: &C, key: RedisKey, values: MultipleValues) -> Result<RedisValue, RedisError> {
  push(client, RedisCommandKind::LPush, key, values).await
}

pub async fn rpush<C: ClientLike>(client: &C, key: RedisKey, values: MultipleValues) -> Result<RedisValue, RedisError> {
  push(client, RedisCommandKind::RPush, key, values).await
}

pub async fn lpushx<C: ClientLike>(
  client: &C,
  key: RedisKey,
  values: MultipleValues,
) -> Result<RedisValue, RedisError> {
  push(client, RedisCommandKind::LPushX, key, values).await
}

pub async fn rpushx<C: ClientLike>(
  client: &C,
  key: RedisKey,
  values: MultipleValues,
) -> Result<RedisValue, RedisError> {
  push(client, RedisCommandKind::RPushX, key, values).await
}

pub async fn lpop<C: ClientLike>(client: &C, key: RedisKey, count: Option<usize>) -> Result<RedisValue, RedisError> {
  let mut args = vec![key.into()];
  if let Some(count) = count {
    args.push(to!(count)?);
  }

  args_value_cmd(client, RedisCommandKind::LPop, args).await
}

pub async fn rpop<C: ClientLike>(client: &C, key: RedisKey, count: Option<usize>) -> Result<RedisValue, RedisError> {
  let mut args = vec![key.into()];
  if let Some(count) = count {
    args.push(to!(count)?);
  }

  args_value_cmd(client, RedisCommandKind::RPop, args).await
}

pub async fn llen<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::LLen, key.into()).await
}

pub async fn lrange<C: ClientLike>(client: &C, key: RedisKey, start: i64, stop: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::LRange, vec![key.into(), start.into(), stop.into()]).await
}

pub async fn lindex<C: ClientLike>(client: &C, key: RedisKey, index: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::LIndex, vec![key.into(), index.into()]).await
}

pub async fn linsert<C: ClientLike>(
  client: &C,
  key: RedisKey,
  before: bool,
  pivot: RedisValue,
  element: RedisValue,
) -> Result<RedisValue, RedisError> {
  let location = if before { static_val!(BEFORE) } else { static_val!(AFTER) };
  args_value_cmd(client, RedisCommandKind::LInsert, vec![key.into(), location, pivot, element]).await
}

pub async fn lrem<C: ClientLike>(
  client: &C,
  key: RedisKey,
  count: i64,
  element: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::LRem, vec![key.into(), count.into(), element]).await
}

pub async fn lset<C: ClientLike>(
  client: &C,
  key: RedisKey,
  index: i64,
  element: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::LSet, vec![key.into(), index.into(), element]).await
}

pub async fn ltrim<C: ClientLike>(client: &C, key: RedisKey, start: i64, stop: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::LTrim, vec![key.into(), start.into(), stop.into()]).await
}

pub async fn lpos<C: ClientLike>(
  client: &C,
  key: RedisKey,
  element: RedisValue,
  rank: Option<i64>,
  count: Option<i64>,
) -> Result<RedisValue, RedisError> {
  let mut args = Vec::with_capacity(6);
  args.push(key.into());
  args.push(element);
  if let Some(rank) = rank {
    args.push(static_val!(RANK));
    args.push(rank.into());
  }
  if let Some(count) = count {
    args.push(static_val!(COUNT));
    args.push(count.into());
  }

  args_value_cmd(client, RedisCommandKind::LPos, args).await
}

fn pop_kind(direction: &LMoveDirection) -> RedisCommandKind {
  match *direction {
    LMoveDirection::Left => RedisCommandKind::LPop,
    LMoveDirection::Right => RedisCommandKind::RPop,
  }
}

fn push_kind(direction: &LMoveDirection) -> RedisCommandKind {
  match *direction {
    LMoveDirection::Left => RedisCommandKind::LPush,
    LMoveDirection::Right => RedisCommandKind::RPush,
  }
}

/// Push a popped element onto the destination list, unless nothing was popped.
async fn push_popped(
  executor: &ClusterCommandExecutor,
  destination: RedisKey,
  direction: &LMoveDirection,
  element: RedisValue,
) -> Result<RedisValue, RedisError> {
  if element.is_null() {
    return Ok(RedisValue::Null);
  }

  let command = RedisCommand::new(push_kind(direction), vec![destination.clone().into(), element.clone()]);
  run_for_key(executor, &destination, command).await?;
  Ok(element)
}

/// Pop from the source list and push onto the destination list when the lists live on different nodes.
async fn move_across_slots(
  executor: &ClusterCommandExecutor,
  source: RedisKey,
  destination: RedisKey,
  source_direction: LMoveDirection,
  destination_direction: LMoveDirection,
) -> Result<RedisValue, RedisError> {
  let command = RedisCommand::new(pop_kind(&source_direction), vec![source.clone().into()]);
  let element = run_for_key(executor, &source, command).await?;

  push_popped(executor, destination, &destination_direction, element).await
}

/// Block on the source list, then push the element onto the destination list.
async fn blocking_move_across_slots(
  executor: &ClusterCommandExecutor,
  source: RedisKey,
  destination: RedisKey,
  source_direction: LMoveDirection,
  destination_direction: LMoveDirection,
  timeout: f64,
) -> Result<RedisValue, RedisError> {
  let kind = match source_direction {
    LMoveDirection::Left => RedisCommandKind::BlPop,
    LMoveDirection::Right => RedisCommandKind::BrPop,
  };
  let command =
    RedisCommand::new(kind, vec![source.clone().into(), timeout.into()]).with_block(block_duration(timeout));

  // the reply is a [key, element] pair or nil after the timeout
  let element = match run_for_key(executor, &source, command).await? {
    RedisValue::Array(mut pair) if pair.len() == 2 => pair.pop().unwrap_or(RedisValue::Null),
    _ => RedisValue::Null,
  };
  push_popped(executor, destination, &destination_direction, element).await
}

pub async fn rpoplpush<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
) -> Result<RedisValue, RedisError> {
  if spans_slots(client, &[source.clone(), destination.clone()]) {
    let executor = emulation_executor(client, "RPOPLPUSH")?;
    move_across_slots(
      &executor,
      source,
      destination,
      LMoveDirection::Right,
      LMoveDirection::Left,
    )
    .await
  } else {
    args_value_cmd(client, RedisCommandKind::RPopLPush, vec![
      source.into(),
      destination.into(),
    ])
    .await
  }
}

pub async fn lmove<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
  source_direction: LMoveDirection,
  destination_direction: LMoveDirection,
) -> Result<RedisValue, RedisError> {
  if spans_slots(client, &[source.clone(), destination.clone()]) {
    let executor = emulation_executor(client, "LMOVE")?;
    move_across_slots(
      &executor,
      source,
      destination,
      source_direction,
      destination_direction,
    )
    .await
  } else {
    let args = vec![
      source.into(),
      destination.into(),
      source_direction.to_str().into(),
      destination_direction.to_str().into(),
    ];
    args_value_cmd(client, RedisCommandKind::LMove, args).await
  }
}

/// Pop from the first non-empty list, blocking up to `timeout` seconds.
///
/// Against a cluster with keys in several slots every list is popped in parallel with the same timeout, and the first
/// non-empty reply in key order wins. Elements popped from the other lists in the meantime are not pushed back.
async fn blocking_pop<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  keys: MultipleKeys,
  timeout: f64,
) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&keys)?;
  let keys = keys.inner();
  let block = block_duration(timeout);

  if spans_slots(client, &keys) {
    let executor = emulation_executor(client, kind.cmd_str())?;
    let results = executor
      .run_for_keys(keys.clone(), move |key| {
        RedisCommand::new(kind, vec![key.into(), timeout.into()]).with_block(block)
      })
      .await?
      .values_sorted_by_keys(&keys)?;

    Ok(
      results
        .into_iter()
        .find(|value| !value.is_null())
        .unwrap_or(RedisValue::Null),
    )
  } else {
    let mut args: Vec<RedisValue> = keys.into_iter().map(|k| k.into()).collect();
    args.push(timeout.into());

    request(client, RedisCommand::new(kind, args).with_block(block)).await
  }
}

pub async fn blpop<C: ClientLike>(client: &C, keys: MultipleKeys, timeout: f64) -> Result<RedisValue, RedisError> {
  blocking_pop(client, RedisCommandKind::BlPop, keys, timeout).await
}

pub async fn brpop<C: ClientLike>(client: &C, keys: MultipleKeys, timeout: f64) -> Result<RedisValue, RedisError> {
  blocking_pop(client, RedisCommandKind::BrPop, keys, timeout).await
}

pub async fn brpoplpush<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
  timeout: f64,
) -> Result<RedisValue, RedisError> {
  if spans_slots(client, &[source.clone(), destination.clone()]) {
    let executor = emulation_executor(client, "BRPOPLPUSH")?;
    blocking_move_across_slots(
      &executor,
      source,
      destination,
      LMoveDirection::Right,
      LMoveDirection::Left,
      timeout,
    )
    .await
  } else {
    let args = vec![source.into(), destination.into(), timeout.into()];
    let command = RedisCommand::new(RedisCommandKind::BrPopLPush, args).with_block(block_duration(timeout));
    request(client, command).await
  }
}

pub async fn blmove<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
  source_direction: LMoveDirection,
  destination_direction: LMoveDirection,
  timeout: f64,
) -> Result<RedisValue, RedisError> {
  if spans_slots(client, &[source.clone(), destination.clone()]) {
    let executor = emulation_executor(client, "BLMOVE")?;
    blocking_move_across_slots(
      &executor,
      source,
      destination,
      source_direction,
      destination_direction,
      timeout,
    )
    .await
  } else {
    let args = vec![
      source.into(),
      destination.into(),
      source_direction.to_str().into(),
      destination_direction.to_str().into(),
      timeout.into(),
    ];
    let command = RedisCommand::new(RedisCommandKind::BlMove, args).with_block(block_duration(timeout));
    request(client, command).await
  }
}
