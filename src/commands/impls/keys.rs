use super::*;
use crate::{
  types::{ClusterNode, MultipleKeys, SortOptions},
  utils,
};

/// Send a command that takes several keys and replies with a count, such as `DEL` or `EXISTS`.
///
/// Against a cluster the keys are grouped by node and the counts are summed.
async fn count_keys<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  keys: MultipleKeys,
) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&keys)?;
  let keys = keys.inner();

  if spans_slots(client, &keys) {
    let executor = emulation_executor(client, kind.cmd_str())?;
    let result = executor
      .run_for_keys(keys, move |key| RedisCommand::new(kind, vec![key.into()]))
      .await?;
    sum_integers(result)
  } else {
    let args = keys.into_iter().map(|k| k.into()).collect();
    args_value_cmd(client, kind, args).await
  }
}

pub async fn del<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  count_keys(client, RedisCommandKind::Del, keys).await
}

pub async fn unlink<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  count_keys(client, RedisCommandKind::Unlink, keys).await
}

pub async fn exists<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  count_keys(client, RedisCommandKind::Exists, keys).await
}

pub async fn touch<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  count_keys(client, RedisCommandKind::Touch, keys).await
}

pub async fn expire<C: ClientLike>(client: &C, key: RedisKey, seconds: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::Expire, vec![key.into(), seconds.into()]).await
}

pub async fn pexpire<C: ClientLike>(client: &C, key: RedisKey, millis: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::PExpire, vec![key.into(), millis.into()]).await
}

pub async fn expire_at<C: ClientLike>(client: &C, key: RedisKey, timestamp: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::ExpireAt, vec![key.into(), timestamp.into()]).await
}

pub async fn pexpire_at<C: ClientLike>(client: &C, key: RedisKey, timestamp: i64) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::PExpireAt, vec![key.into(), timestamp.into()]).await
}

pub async fn persist<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Persist, key.into()).await
}

pub async fn ttl<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Ttl, key.into()).await
}

pub async fn pttl<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::PTtl, key.into()).await
}

pub async fn key_type<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Type, key.into()).await
}

pub async fn dump<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::Dump, key.into()).await
}

pub async fn restore<C: ClientLike>(
  client: &C,
  key: RedisKey,
  ttl: i64,
  serialized: RedisValue,
  replace: bool,
  absttl: bool,
) -> Result<RedisValue, RedisError> {
  let mut args = Vec::with_capacity(5);
  args.push(key.into());
  args.push(ttl.into());
  args.push(serialized);
  if replace {
    args.push(static_val!(REPLACE));
  }
  if absttl {
    args.push(static_val!(ABSTTL));
  }

  args_value_cmd(client, RedisCommandKind::Restore, args).await
}

pub async fn copy<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
  db: Option<u8>,
  replace: bool,
) -> Result<RedisValue, RedisError> {
  let mut args = Vec::with_capacity(5);
  args.push(source.into());
  args.push(destination.into());
  if let Some(db) = db {
    args.push(static_val!(DB));
    args.push(db.into());
  }
  if replace {
    args.push(static_val!(REPLACE));
  }

  args_value_cmd(client, RedisCommandKind::Copy, args).await
}

/// Move a key to another node with `DUMP`, `RESTORE` and `DEL`, keeping its remaining TTL.
///
/// Returns false without writing anything when `nx` is set and the destination exists.
async fn move_key_across_slots(
  executor: &ClusterCommandExecutor,
  source: RedisKey,
  destination: RedisKey,
  nx: bool,
) -> Result<bool, RedisError> {
  if nx {
    let command = RedisCommand::new(RedisCommandKind::Exists, vec![destination.clone().into()]);
    if run_for_key(executor, &destination, command).await?.as_i64().unwrap_or(0) > 0 {
      return Ok(false);
    }
  }

  let key = source.clone();
  let (payload, ttl) = executor
    .execute_for_key(&source, move |connection| {
      let key = key.clone();

      async move {
        let payload = connection
          .request(RedisCommand::new(RedisCommandKind::Dump, vec![key.clone().into()]))
          .await?;
        let ttl = connection
          .request(RedisCommand::new(RedisCommandKind::PTtl, vec![key.into()]))
          .await?;
        Ok((payload, ttl))
      }
    })
    .await?;
  if payload.is_null() {
    return Err(RedisError::new(RedisErrorKind::InvalidArgument, "ERR no such key"));
  }
  let ttl = match ttl.as_i64() {
    Some(ttl) if ttl > 0 => ttl,
    _ => 0,
  };

  let args = vec![destination.clone().into(), ttl.into(), payload, static_val!(REPLACE)];
  run_for_key(executor, &destination, RedisCommand::new(RedisCommandKind::Restore, args)).await?;
  run_for_key(
    executor,
    &source,
    RedisCommand::new(RedisCommandKind::Del, vec![source.clone().into()]),
  )
  .await?;

  Ok(true)
}

pub async fn rename<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
) -> Result<RedisValue, RedisError> {
  if spans_slots(client, &[source.clone(), destination.clone()]) {
    let executor = emulation_executor(client, "RENAME")?;
    move_key_across_slots(&executor, source, destination, false).await?;
    Ok(RedisValue::new_ok())
  } else {
    args_value_cmd(client, RedisCommandKind::Rename, vec![source.into(), destination.into()]).await
  }
}

pub async fn renamenx<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
) -> Result<RedisValue, RedisError> {
  if spans_slots(client, &[source.clone(), destination.clone()]) {
    let executor = emulation_executor(client, "RENAMENX")?;
    move_key_across_slots(&executor, source, destination, true)
      .await
      .map(RedisValue::Boolean)
  } else {
    args_value_cmd(client, RedisCommandKind::RenameNx, vec![
      source.into(),
      destination.into(),
    ])
    .await
  }
}

pub async fn move_key<C: ClientLike>(client: &C, key: RedisKey, db: u8) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::Move, vec![key.into(), db.into()]).await
}

pub async fn keys<C: ClientLike>(client: &C, pattern: RedisValue) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "KEYS")?;
    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::Keys, vec![pattern]))
      .await?;

    let mut keys = Vec::new();
    for value in result.into_values()?.into_iter() {
      keys.extend(value.into_array());
    }
    Ok(RedisValue::Array(keys))
  } else {
    one_arg_value_cmd(client, RedisCommandKind::Keys, pattern).await
  }
}

pub async fn randomkey<C: ClientLike>(client: &C) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "RANDOMKEY")?;
    let topology = executor.topology().await?;
    let mut primaries: Vec<ClusterNode> = topology
      .primaries()
      .into_iter()
      .filter(|node| !node.slots.is_empty())
      .cloned()
      .collect();
    utils::shuffle(&mut primaries);

    for node in primaries.iter() {
      let key = executor
        .run_on_node(node, RedisCommand::new(RedisCommandKind::RandomKey, vec![]))
        .await?;
      if !key.is_null() {
        return Ok(key);
      }
    }
    Ok(RedisValue::Null)
  } else {
    args_value_cmd(client, RedisCommandKind::RandomKey, vec![]).await
  }
}

pub async fn sort<C: ClientLike>(
  client: &C,
  key: RedisKey,
  options: SortOptions,
  store: Option<RedisKey>,
) -> Result<RedisValue, RedisError> {
  let mut args = vec![key.clone().into()];
  options.into_args(&mut args);

  match store {
    Some(destination) if spans_slots(client, &[key.clone(), destination.clone()]) => {
      let executor = emulation_executor(client, "SORT")?;
      let sorted = run_for_key(&executor, &key, RedisCommand::new(RedisCommandKind::Sort, args))
        .await?
        .into_array();

      let count = sorted.len() as i64;
      let command = RedisCommand::new(RedisCommandKind::Unlink, vec![destination.clone().into()]);
      run_for_key(&executor, &destination, command).await?;
      if !sorted.is_empty() {
        let mut args = Vec::with_capacity(sorted.len() + 1);
        args.push(destination.clone().into());
        args.extend(sorted);

        run_for_key(&executor, &destination, RedisCommand::new(RedisCommandKind::RPush, args)).await?;
      }
      Ok(RedisValue::Integer(count))
    },
    Some(destination) => {
      args.push(static_val!(STORE));
      args.push(destination.into());
      args_value_cmd(client, RedisCommandKind::Sort, args).await
    },
    None => args_value_cmd(client, RedisCommandKind::Sort, args).await,
  }
}

