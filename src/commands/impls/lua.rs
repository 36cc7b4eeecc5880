use super::*;
use crate::{
  types::{MultipleKeys, MultipleStrings, MultipleValues},
  utils,
};

async fn eval_cmd<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  script: RedisValue,
  keys: MultipleKeys,
  args: MultipleValues,
) -> Result<RedisValue, RedisError> {
  let keys = keys.inner();
  check_same_slot(client, kind.cmd_str(), &keys)?;

  let mut cmd_args = Vec::with_capacity(2 + keys.len() + args.len());
  cmd_args.push(script);
  cmd_args.push(to!(keys.len())?);
  cmd_args.extend(keys.into_iter().map(|k| k.into()));
  cmd_args.extend(args.inner());

  args_value_cmd(client, kind, cmd_args).await
}

pub async fn eval<C: ClientLike>(
  client: &C,
  script: RedisValue,
  keys: MultipleKeys,
  args: MultipleValues,
) -> Result<RedisValue, RedisError> {
  eval_cmd(client, RedisCommandKind::Eval, script, keys, args).await
}

pub async fn evalsha<C: ClientLike>(
  client: &C,
  hash: RedisValue,
  keys: MultipleKeys,
  args: MultipleValues,
) -> Result<RedisValue, RedisError> {
  eval_cmd(client, RedisCommandKind::EvalSha, hash, keys, args).await
}

/// Load the script on the server, or on every primary in a cluster so that `EVALSHA` works for any key.
pub async fn script_load<C: ClientLike>(client: &C, script: RedisValue) -> Result<RedisValue, RedisError> {
  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "SCRIPT LOAD")?;
    let result = executor
      .run_on_all_primaries(RedisCommand::new(RedisCommandKind::ScriptLoad, vec![script]))
      .await?;

    Ok(result.into_values()?.into_iter().next().unwrap_or(RedisValue::Null))
  } else {
    one_arg_value_cmd(client, RedisCommandKind::ScriptLoad, script).await
  }
}

pub async fn script_exists<C: ClientLike>(client: &C, hashes: MultipleStrings) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&hashes)?;
  args_value_cmd(client, RedisCommandKind::ScriptExists, hashes.into_values()).await
}

pub async fn script_flush<C: ClientLike>(client: &C, r#async: bool) -> Result<RedisValue, RedisError> {
  let args = if r#async { vec![static_val!(ASYNC)] } else { vec![] };

  if client.inner().is_clustered() {
    let executor = emulation_executor(client, "SCRIPT FLUSH")?;
    expect_all_ok(
      executor
        .run_on_all_primaries(RedisCommand::new(RedisCommandKind::ScriptFlush, args))
        .await?,
    )
  } else {
    args_value_cmd(client, RedisCommandKind::ScriptFlush, args).await
  }
}

ok_cmd!(script_kill, ScriptKill);
