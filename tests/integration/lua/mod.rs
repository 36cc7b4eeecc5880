use crate::utils::TestContext;
use conduit::{error::RedisError, interfaces::*, util};

static ECHO_SCRIPT: &str = "return {KEYS[1], ARGV[1], ARGV[2]}";

pub async fn should_load_script<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: LuaInterface,
{
  let script_hash = util::sha1_hash(ECHO_SCRIPT);
  let exists: Vec<bool> = client.script_exists(script_hash.as_str()).await?;
  assert_eq!(exists, vec![false]);

  let hash: String = client.script_load(ECHO_SCRIPT).await?;
  assert_eq!(hash, script_hash);
  let exists: Vec<bool> = client.script_exists(vec![script_hash.as_str(), "missing"]).await?;
  assert_eq!(exists, vec![true, false]);

  client.script_flush(false).await?;
  let exists: Vec<bool> = client.script_exists(script_hash.as_str()).await?;
  assert_eq!(exists, vec![false]);
  Ok(())
}

pub async fn should_evalsha_echo_script<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: LuaInterface,
{
  let hash: String = client.script_load(ECHO_SCRIPT).await?;

  let result: Vec<String> = client.evalsha(hash, "foo", vec!["bar", "baz"]).await?;
  assert_eq!(result, vec!["foo", "bar", "baz"]);
  Ok(())
}

pub async fn should_eval_echo_script<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: LuaInterface,
{
  let result: Vec<String> = client.eval(ECHO_SCRIPT, "foo", vec!["bar", "baz"]).await?;
  assert_eq!(result, vec!["foo", "bar", "baz"]);

  let exists: Vec<bool> = client.script_exists(util::sha1_hash(ECHO_SCRIPT)).await?;
  assert_eq!(exists, vec![true]);
  Ok(())
}

pub async fn should_error_evalsha_missing_script<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: LuaInterface,
{
  client
    .evalsha::<(), _, _, _>(util::sha1_hash(ECHO_SCRIPT), "foo", vec!["bar"])
    .await
}
