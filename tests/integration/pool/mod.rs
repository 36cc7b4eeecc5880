use crate::utils::TestContext;
use conduit::{
  clients::{ConnectionFactory, RedisConnection},
  error::{RedisError, RedisErrorKind},
  interfaces::*,
  types::PoolConfig,
};
use std::time::Duration;

fn create_pooled_factory(context: &TestContext, max_total: usize) -> ConnectionFactory {
  let mut config = context.factory.config().clone();
  config.share_native_connection = false;
  config.pool = Some(PoolConfig {
    max_total,
    max_idle: max_total,
    max_wait: Duration::from_millis(50),
  });

  context.factory_with(config)
}

pub async fn should_fail_when_pool_exhausted(_: RedisConnection, context: TestContext) -> Result<(), RedisError> {
  let factory = create_pooled_factory(&context, 1);
  let first = factory.get_connection()?;
  let second = factory.get_connection()?;

  let _: i64 = first.incr("foo").await?;
  let error = second.incr::<i64, _>("foo").await.unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::PoolExhausted);

  first.close().await;
  assert_eq!(second.incr::<i64, _>("foo").await?, 2);
  second.close().await;
  factory.destroy().await;
  Ok(())
}

pub async fn should_reuse_released_connections(_: RedisConnection, context: TestContext) -> Result<(), RedisError> {
  let factory = create_pooled_factory(&context, 2);
  let connects = context.driver.connect_count();

  for _ in 0 .. 5 {
    let connection = factory.get_connection()?;
    let _: i64 = connection.incr("foo").await?;
    connection.close().await;
  }
  assert_eq!(context.driver.connect_count(), connects + 1);

  factory.destroy().await;
  Ok(())
}

pub async fn should_close_pooled_connections_on_destroy(
  _: RedisConnection,
  context: TestContext,
) -> Result<(), RedisError> {
  let open = context.driver.open_connections();
  let factory = create_pooled_factory(&context, 2);
  let first = factory.get_connection()?;
  let second = factory.get_connection()?;
  let _: i64 = first.incr("foo").await?;
  let _: i64 = second.incr("foo").await?;
  assert_eq!(context.driver.open_connections(), open + 2);

  first.close().await;
  second.close().await;
  factory.destroy().await;
  assert_eq!(context.driver.open_connections(), open);
  assert!(factory.get_connection().is_err());
  Ok(())
}

pub async fn should_block_dedicated_connection_per_handle(
  client: RedisConnection,
  context: TestContext,
) -> Result<(), RedisError> {
  let factory = create_pooled_factory(&context, 2);
  let blocked = factory.get_connection()?;
  let jh = tokio::spawn(async move {
    let result: Option<(String, i64)> = blocked.blpop("list", 0.2).await?;
    blocked.close().await;
    Ok::<_, RedisError>(result)
  });

  // the blocked handle owns one connection, so another handle can still run commands
  let other = factory.get_connection()?;
  let _: i64 = other.rpush("other", 1).await?;
  other.close().await;
  let _: i64 = client.incr("foo").await?;

  let result = jh.await.expect("Failed to join task")?;
  assert!(result.is_none());
  factory.destroy().await;
  Ok(())
}
