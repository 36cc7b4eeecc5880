use super::*;
use crate::{
  types::{MultipleKeys, MultipleStrings, RedisMap, XID},
  utils,
};
use std::time::Duration;

pub async fn xadd<C: ClientLike>(
  client: &C,
  key: RedisKey,
  nomkstream: bool,
  maxlen: Option<i64>,
  id: XID,
  fields: RedisMap,
) -> Result<RedisValue, RedisError> {
  if fields.is_empty() {
    return Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one field is required.",
    ));
  }

  let mut args = Vec::with_capacity(5 + fields.len() * 2);
  args.push(key.into());
  if nomkstream {
    args.push(static_val!(NOMKSTREAM));
  }
  if let Some(maxlen) = maxlen {
    args.push(static_val!(MAXLEN));
    args.push(maxlen.into());
  }
  args.push(id.into_str().into());
  for (field, value) in fields.inner().into_iter() {
    args.push(field.into());
    args.push(value);
  }

  args_value_cmd(client, RedisCommandKind::XAdd, args).await
}

pub async fn xlen<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::XLen, key.into()).await
}

fn range_args(
  key: RedisKey,
  first: RedisValue,
  second: RedisValue,
  count: Option<u64>,
) -> Result<Vec<RedisValue>, RedisError> {
  let mut args = Vec::with_capacity(5);
  args.push(key.into());
  args.push(first);
  args.push(second);
  if let Some(count) = count {
    args.push(static_val!(COUNT));
    args.push(to!(count)?);
  }

  Ok(args)
}

pub async fn xrange<C: ClientLike>(
  client: &C,
  key: RedisKey,
  start: RedisValue,
  end: RedisValue,
  count: Option<u64>,
) -> Result<RedisValue, RedisError> {
  let args = range_args(key, start, end, count)?;
  args_value_cmd(client, RedisCommandKind::XRange, args).await
}

pub async fn xrevrange<C: ClientLike>(
  client: &C,
  key: RedisKey,
  end: RedisValue,
  start: RedisValue,
  count: Option<u64>,
) -> Result<RedisValue, RedisError> {
  let args = range_args(key, end, start, count)?;
  args_value_cmd(client, RedisCommandKind::XRevRange, args).await
}

pub async fn xdel<C: ClientLike>(client: &C, key: RedisKey, ids: MultipleStrings) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&ids)?;

  let mut args = Vec::with_capacity(1 + ids.len());
  args.push(key.into());
  args.extend(ids.into_values());
  args_value_cmd(client, RedisCommandKind::XDel, args).await
}

pub async fn xtrim<C: ClientLike>(client: &C, key: RedisKey, maxlen: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::XTrim, vec![
    key.into(),
    static_val!(MAXLEN),
    maxlen.into(),
  ])
  .await
}

/// Append the `STREAMS` section and check that every key has an ID.
fn push_streams(args: &mut Vec<RedisValue>, keys: Vec<RedisKey>, ids: Vec<XID>) -> Result<(), RedisError> {
  if keys.is_empty() || keys.len() != ids.len() {
    return Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "Every stream key requires one ID.",
    ));
  }

  args.push(static_val!(STREAMS));
  args.extend(keys.into_iter().map(|k| k.into()));
  args.extend(ids.into_iter().map(|id| id.into_str().into()));
  Ok(())
}

fn push_count_and_block(args: &mut Vec<RedisValue>, count: Option<u64>, block: Option<u64>) -> Result<(), RedisError> {
  if let Some(count) = count {
    args.push(static_val!(COUNT));
    args.push(to!(count)?);
  }
  if let Some(block) = block {
    args.push(static_val!(BLOCK));
    args.push(to!(block)?);
  }

  Ok(())
}

fn read_command(kind: RedisCommandKind, args: Vec<RedisValue>, block: Option<u64>) -> RedisCommand {
  let command = RedisCommand::new(kind, args);
  match block {
    Some(block) => command.with_block(Duration::from_millis(block)),
    None => command,
  }
}

pub async fn xread<C: ClientLike>(
  client: &C,
  count: Option<u64>,
  block: Option<u64>,
  keys: MultipleKeys,
  ids: Vec<XID>,
) -> Result<RedisValue, RedisError> {
  let keys = keys.inner();
  check_same_slot(client, "XREAD", &keys)?;

  let mut args = Vec::with_capacity(keys.len() * 2 + 5);
  push_count_and_block(&mut args, count, block)?;
  push_streams(&mut args, keys, ids)?;

  request(client, read_command(RedisCommandKind::XRead, args, block)).await
}

pub async fn xreadgroup<C: ClientLike>(
  client: &C,
  group: RedisValue,
  consumer: RedisValue,
  count: Option<u64>,
  block: Option<u64>,
  noack: bool,
  keys: MultipleKeys,
  ids: Vec<XID>,
) -> Result<RedisValue, RedisError> {
  let keys = keys.inner();
  check_same_slot(client, "XREADGROUP", &keys)?;

  let mut args = Vec::with_capacity(keys.len() * 2 + 9);
  args.push(static_val!(GROUP));
  args.push(group);
  args.push(consumer);
  push_count_and_block(&mut args, count, block)?;
  if noack {
    args.push(static_val!(NOACK));
  }
  push_streams(&mut args, keys, ids)?;

  request(client, read_command(RedisCommandKind::XReadGroup, args, block)).await
}

pub async fn xgroup_create<C: ClientLike>(
  client: &C,
  key: RedisKey,
  group: RedisValue,
  id: XID,
  mkstream: bool,
) -> Result<RedisValue, RedisError> {
  let mut args = vec![key.into(), group, id.into_str().into()];
  if mkstream {
    args.push(static_val!(MKSTREAM));
  }

  args_value_cmd(client, RedisCommandKind::XGroupCreate, args).await
}

pub async fn xgroup_destroy<C: ClientLike>(
  client: &C,
  key: RedisKey,
  group: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::XGroupDestroy, vec![key.into(), group]).await
}

pub async fn xack<C: ClientLike>(
  client: &C,
  key: RedisKey,
  group: RedisValue,
  ids: Vec<XID>,
) -> Result<RedisValue, RedisError> {
  if ids.is_empty() {
    return Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one ID is required.",
    ));
  }

  let mut args = Vec::with_capacity(2 + ids.len());
  args.push(key.into());
  args.push(group);
  args.extend(ids.into_iter().map(|id| id.into_str().into()));
  args_value_cmd(client, RedisCommandKind::XAck, args).await
}
