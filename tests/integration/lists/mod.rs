use crate::utils::TestContext;
use conduit::{
  clients::{ClusterConnection, RedisConnection},
  error::RedisError,
  interfaces::*,
  types::LMoveDirection,
};
use std::time::Duration;
use tokio::time::{sleep, Instant};

const COUNT: i64 = 10;

async fn create_count_data<C>(client: &C, key: &str) -> Result<Vec<i64>, RedisError>
where
  C: ListInterface,
{
  let mut values = Vec::with_capacity(COUNT as usize);
  for idx in 0 .. COUNT {
    let _: () = client.rpush(key, idx).await?;
    values.push(idx);
  }

  Ok(values)
}

pub async fn should_push_and_pop_values<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ListInterface,
{
  let expected = create_count_data(&client, "foo").await?;
  assert_eq!(client.llen::<i64, _>("foo").await?, COUNT);

  let values: Vec<i64> = client.lrange("foo", 0, -1).await?;
  assert_eq!(values, expected);

  let first: i64 = client.lpop("foo", None).await?;
  assert_eq!(first, 0);
  let last: Vec<i64> = client.rpop("foo", Some(2)).await?;
  assert_eq!(last, vec![9, 8]);
  assert_eq!(client.llen::<i64, _>("foo").await?, COUNT - 3);

  let len: i64 = client.lpushx("missing", "a").await?;
  assert_eq!(len, 0);
  Ok(())
}

pub async fn should_insert_and_remove_values<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ListInterface,
{
  let _: () = client.rpush("foo", vec!["a", "b", "a", "c", "a"]).await?;

  let len: i64 = client.linsert("foo", true, "c", "z").await?;
  assert_eq!(len, 6);
  let removed: i64 = client.lrem("foo", -2, "a").await?;
  assert_eq!(removed, 2);

  let values: Vec<String> = client.lrange("foo", 0, -1).await?;
  assert_eq!(values, vec!["a", "b", "z", "c"]);
  let position: Option<i64> = client.lpos("foo", "z", None, None).await?;
  assert_eq!(position, Some(2));

  let _: () = client.lset("foo", 0, "y").await?;
  let _: () = client.ltrim("foo", 0, 1).await?;
  let values: Vec<String> = client.lrange("foo", 0, -1).await?;
  assert_eq!(values, vec!["y", "b"]);
  Ok(())
}

pub async fn should_move_between_lists<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ListInterface,
{
  let _: () = client.rpush("a", vec![1, 2, 3]).await?;

  let moved: i64 = client
    .lmove("a", "b", LMoveDirection::Right, LMoveDirection::Left)
    .await?;
  assert_eq!(moved, 3);
  let moved: i64 = client.rpoplpush("a", "b").await?;
  assert_eq!(moved, 2);

  let values: Vec<i64> = client.lrange("b", 0, -1).await?;
  assert_eq!(values, vec![2, 3]);
  let values: Vec<i64> = client.lrange("a", 0, -1).await?;
  assert_eq!(values, vec![1]);

  let moved: Option<i64> = client.rpoplpush("missing", "b").await?;
  assert!(moved.is_none());
  Ok(())
}

pub async fn should_time_out_blocking_pop<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: ListInterface,
{
  let started = Instant::now();
  let result: Option<(String, i64)> = client.blpop(vec!["a", "b"], 0.2).await?;
  assert!(result.is_none());

  let elapsed = started.elapsed();
  assert!(elapsed >= Duration::from_millis(190), "returned after {:?}", elapsed);
  assert!(elapsed < Duration::from_secs(2), "returned after {:?}", elapsed);
  Ok(())
}

pub async fn should_blpop_pushed_value(client: RedisConnection, context: TestContext) -> Result<(), RedisError> {
  let pusher = context.factory.get_connection()?;
  let jh = tokio::spawn(async move {
    sleep(Duration::from_millis(50)).await;
    let _: () = pusher.rpush("foo", 42).await?;
    pusher.close().await;
    Ok::<_, RedisError>(())
  });

  let result: (String, i64) = client.blpop("foo", 0.0).await?;
  assert_eq!(result, ("foo".into(), 42));
  let _ = jh.await;
  Ok(())
}

pub async fn should_blpop_first_non_empty_list_across_slots(
  client: ClusterConnection,
  _: TestContext,
) -> Result<(), RedisError> {
  assert_ne!(client.cluster_slot_for_key("a"), client.cluster_slot_for_key("b"));
  let _: () = client.rpush("b", vec![1, 2]).await?;
  let _: () = client.rpush("c", 3).await?;

  let result: (String, i64) = client.blpop(vec!["a", "b", "c"], 0.05).await?;
  assert_eq!(result, ("b".into(), 1));
  Ok(())
}
