use crate::utils::TestContext;
use conduit::{
  clients::{ClusterConnection, RedisConnection},
  error::{RedisError, RedisErrorKind},
  interfaces::*,
  types::RedisValue,
};

pub async fn should_run_get_set_trx(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  client.multi().await?;
  assert!(client.is_queueing());

  let queued: RedisValue = client.set("foo", "bar", None, None, false).await?;
  assert_eq!(queued, RedisValue::Queued);
  let _: RedisValue = client.get("foo").await?;
  let _: RedisValue = client.incr("baz").await?;

  let results = client.exec().await?.expect("Transaction was aborted");
  assert_eq!(results, vec![RedisValue::from("bar"), RedisValue::Integer(1)]);
  assert!(!client.is_queueing());
  Ok(())
}

pub async fn should_run_error_get_set_trx(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  let _: () = client.set("foo", "bar", None, None, false).await?;

  client.multi().await?;
  let _: RedisValue = client.incr("foo").await?;
  let _: RedisValue = client.get("foo").await?;
  client.exec().await?;

  Ok(())
}

pub async fn should_ignore_nested_multi(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  client.multi().await?;
  client.multi().await?;
  let _: RedisValue = client.incr("foo").await?;

  let results = client.exec().await?;
  assert_eq!(results, Some(vec![RedisValue::Integer(1)]));
  Ok(())
}

pub async fn should_abort_when_watched_key_changes(
  client: RedisConnection,
  context: TestContext,
) -> Result<(), RedisError> {
  let other = context.factory.get_connection()?;
  let _: () = client.set("foo", "original", None, None, false).await?;

  client.watch("foo").await?;
  let _: () = other.set("foo", "changed", None, None, false).await?;

  client.multi().await?;
  let _: RedisValue = client.set("foo", "mine", None, None, false).await?;
  assert_eq!(client.exec().await?, None);

  assert_eq!(client.get::<String, _>("foo").await?, "changed");
  other.close().await;
  Ok(())
}

pub async fn should_run_after_unwatch(client: RedisConnection, context: TestContext) -> Result<(), RedisError> {
  let other = context.factory.get_connection()?;

  client.watch(vec!["foo", "bar"]).await?;
  client.unwatch().await?;
  let _: () = other.set("foo", "changed", None, None, false).await?;

  client.multi().await?;
  let _: RedisValue = client.set("foo", "mine", None, None, false).await?;
  let _: RedisValue = client.get("foo").await?;
  assert_eq!(client.exec().await?, Some(vec![RedisValue::from("mine")]));

  other.close().await;
  Ok(())
}

pub async fn should_discard_trx(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  client.multi().await?;
  let _: RedisValue = client.set("foo", "bar", None, None, false).await?;
  client.discard().await?;

  check_null!(client, "foo");
  let error = client.exec().await.unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);
  Ok(())
}

pub async fn should_fail_multi_in_cluster(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  client.multi().await
}
