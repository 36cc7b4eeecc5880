use super::*;
use crate::{
  protocol::command::ReplyShape,
  types::{Expiration, MultipleKeys, RedisMap, SetOptions},
  utils,
};

pub async fn get<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Get, key.into()).await
}

pub async fn set<C: ClientLike>(
  client: &C,
  key: RedisKey,
  value: RedisValue,
  expire: Option<Expiration>,
  options: Option<SetOptions>,
  get: bool,
) -> Result<RedisValue, RedisError> {
  let conditional = get || options.is_some();
  let mut args = Vec::with_capacity(6);
  args.push(key.into());
  args.push(value);

  if let Some(expire) = expire {
    let (prefix, value) = expire.into_args();
    args.push(prefix.into());
    if let Some(value) = value {
      args.push(value.into());
    }
  }
  if let Some(options) = options {
    args.push(options.to_str().into());
  }
  if get {
    args.push(static_val!(GET));
  }

  let command = RedisCommand::new(RedisCommandKind::Set, args);
  // the reply is the old value or nil when GET or NX/XX are used
  let command = if conditional {
    command.with_shape(ReplyShape::Value)
  } else {
    command
  };
  request(client, command).await
}

pub async fn setnx<C: ClientLike>(client: &C, key: RedisKey, value: RedisValue) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::SetNx, vec![key.into(), value]).await
}

pub async fn setex<C: ClientLike>(
  client: &C,
  key: RedisKey,
  seconds: i64,
  value: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::SetEx, vec![key.into(), seconds.into(), value]).await
}

pub async fn psetex<C: ClientLike>(
  client: &C,
  key: RedisKey,
  millis: i64,
  value: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::PSetEx, vec![key.into(), millis.into(), value]).await
}

pub async fn getset<C: ClientLike>(client: &C, key: RedisKey, value: RedisValue) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::GetSet, vec![key.into(), value]).await
}

pub async fn getdel<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::GetDel, key.into()).await
}

pub async fn getrange<C: ClientLike>(
  client: &C,
  key: RedisKey,
  start: i64,
  end: i64,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::GetRange, vec![key.into(), start.into(), end.into()]).await
}

pub async fn setrange<C: ClientLike>(
  client: &C,
  key: RedisKey,
  offset: u32,
  value: RedisValue,
) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::SetRange, vec![key.into(), offset.into(), value]).await
}

pub async fn append<C: ClientLike>(client: &C, key: RedisKey, value: RedisValue) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::Append, vec![key.into(), value]).await
}

pub async fn strlen<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::StrLen, key.into()).await
}

pub async fn incr<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Incr, key.into()).await
}

pub async fn incr_by<C: ClientLike>(client: &C, key: RedisKey, value: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::IncrBy, vec![key.into(), value.into()]).await
}

pub async fn incr_by_float<C: ClientLike>(client: &C, key: RedisKey, value: f64) -> Result<RedisValue, RedisError> {
  let value = utils::f64_to_redis_string(value)?;
  args_value_cmd(client, RedisCommandKind::IncrByFloat, vec![key.into(), value]).await
}

pub async fn decr<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Decr, key.into()).await
}

pub async fn decr_by<C: ClientLike>(client: &C, key: RedisKey, value: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::DecrBy, vec![key.into(), value.into()]).await
}

pub async fn mget<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&keys)?;
  let keys = keys.inner();

  if spans_slots(client, &keys) {
    let executor = emulation_executor(client, "MGET")?;
    let result = executor
      .run_for_keys(keys.clone(), |key| {
        RedisCommand::new(RedisCommandKind::Get, vec![key.into()])
      })
      .await?;

    result.values_sorted_by_keys(&keys).map(RedisValue::Array)
  } else {
    let args = keys.into_iter().map(|k| k.into()).collect();
    args_value_cmd(client, RedisCommandKind::MGet, args).await
  }
}

fn check_empty_map(values: &RedisMap) -> Result<(), RedisError> {
  if values.is_empty() {
    Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "Values cannot be empty.",
    ))
  } else {
    Ok(())
  }
}

/// Run one write per key, each built from the key and its value.
async fn write_per_key<F>(
  executor: &ClusterCommandExecutor,
  values: RedisMap,
  func: F,
) -> Result<Vec<RedisValue>, RedisError>
where
  F: Fn(RedisKey, RedisValue) -> RedisCommand + Send + Sync,
{
  let keys: Vec<RedisKey> = values.keys().cloned().collect();
  let values = &values;
  let func = &func;

  executor
    .run_for_keys(keys, move |key| {
      let value = values.get(&key).cloned().unwrap_or(RedisValue::Null);
      func(key, value)
    })
    .await?
    .into_values()
}

fn flatten_map(values: RedisMap) -> Vec<RedisValue> {
  let mut args = Vec::with_capacity(values.len() * 2);
  for (key, value) in values.inner().into_iter() {
    args.push(key.into());
    args.push(value);
  }
  args
}

pub async fn mset<C: ClientLike>(client: &C, values: RedisMap) -> Result<RedisValue, RedisError> {
  check_empty_map(&values)?;
  let keys: Vec<RedisKey> = values.keys().cloned().collect();

  if spans_slots(client, &keys) {
    let executor = emulation_executor(client, "MSET")?;
    let results = write_per_key(&executor, values, |key, value| {
      RedisCommand::new(RedisCommandKind::Set, vec![key.into(), value])
    })
    .await?;

    for result in results.iter() {
      protocol_utils::expect_ok(result)?;
    }
    Ok(RedisValue::new_ok())
  } else {
    args_value_cmd(client, RedisCommandKind::MSet, flatten_map(values)).await
  }
}

/// Against a cluster with keys in several slots each key is written with `SETNX` and the result is true only if every
/// key was written. Unlike `MSETNX` this is not atomic: keys that did not exist are written even if others did.
pub async fn msetnx<C: ClientLike>(client: &C, values: RedisMap) -> Result<RedisValue, RedisError> {
  check_empty_map(&values)?;
  let keys: Vec<RedisKey> = values.keys().cloned().collect();

  if spans_slots(client, &keys) {
    let executor = emulation_executor(client, "MSETNX")?;
    let results = write_per_key(&executor, values, |key, value| {
      RedisCommand::new(RedisCommandKind::SetNx, vec![key.into(), value])
    })
    .await?;

    let all = results.iter().all(|value| value.as_bool().unwrap_or(false));
    Ok(RedisValue::Boolean(all))
  } else {
    args_value_cmd(client, RedisCommandKind::MSetNx, flatten_map(values)).await
  }
}
