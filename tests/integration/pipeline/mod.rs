use crate::utils::TestContext;
use conduit::{
  clients::ClusterConnection,
  connection::ConnectionMode,
  error::{RedisError, RedisErrorKind},
  interfaces::*,
  types::RedisValue,
};

pub async fn should_return_results_in_order<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface + ListInterface,
{
  client.open_pipeline().await?;
  assert_eq!(client.mode(), ConnectionMode::Pipelined);

  let queued: RedisValue = client.incr("foo").await?;
  assert_eq!(queued, RedisValue::Queued);
  let _: RedisValue = client.set("bar", "baz", None, None, false).await?;
  let _: RedisValue = client.incr("foo").await?;
  let _: RedisValue = client.rpush("list", vec![1, 2, 3]).await?;
  let _: RedisValue = client.get("bar").await?;

  let results = client.close_pipeline().await?;
  assert_eq!(results, vec![
    RedisValue::Integer(1),
    RedisValue::Integer(2),
    RedisValue::Integer(3),
    RedisValue::from("baz"),
  ]);
  assert_eq!(client.mode(), ConnectionMode::Normal);
  Ok(())
}

pub async fn should_map_queued_values_to_none<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  client.open_pipeline().await?;
  let value: Option<String> = client.get("foo").await?;
  assert!(value.is_none());

  let results = client.close_pipeline().await?;
  assert_eq!(results, vec![RedisValue::Null]);
  Ok(())
}

pub async fn should_carry_partial_results_on_failure<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface + ListInterface,
{
  let _: () = client.set("foo", "bar", None, None, false).await?;

  client.open_pipeline().await?;
  let _: RedisValue = client.incr("counter").await?;
  let _: RedisValue = client.rpush("foo", "a").await?;
  let _: RedisValue = client.incr("counter").await?;

  let mut error = client.close_pipeline().await.unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::Pipeline);
  let partial = error.take_partial_results().expect("Missing partial results");
  assert_eq!(partial.len(), 3);
  assert_eq!(partial[0].as_ref().ok(), Some(&RedisValue::Integer(1)));
  assert!(partial[1].is_err());
  assert_eq!(partial[2].as_ref().ok(), Some(&RedisValue::Integer(2)));
  Ok(())
}

pub async fn should_close_without_open_pipeline<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ClientLike,
{
  assert!(client.close_pipeline().await?.is_empty());
  Ok(())
}

pub async fn should_error_multi_during_pipeline<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: TransactionInterface,
{
  client.open_pipeline().await?;
  let result = client.multi().await;
  let _ = client.close_pipeline().await;
  result
}

pub async fn should_reject_emulation_in_pipeline(
  client: ClusterConnection,
  _: TestContext,
) -> Result<(), RedisError> {
  client.open_pipeline().await?;
  let result: Result<RedisValue, RedisError> = client.mget(vec!["a", "b"]).await;
  let _ = client.close_pipeline().await;

  let error = result.unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);
  Ok(())
}
