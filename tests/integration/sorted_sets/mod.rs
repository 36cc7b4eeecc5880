use crate::utils::TestContext;
use conduit::{
  clients::ClusterConnection,
  error::{RedisError, RedisErrorKind},
  interfaces::*,
  types::{AggregateOptions, Ordering, SetOptions},
};

pub async fn should_add_and_read_members<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SortedSetsInterface,
{
  let added: i64 = client
    .zadd("foo", None, None, false, false, vec![(1.0, "a"), (2.0, "b"), (3.0, "c")])
    .await?;
  assert_eq!(added, 3);
  assert_eq!(client.zcard::<i64, _>("foo").await?, 3);

  let members: Vec<String> = client.zrange("foo", 0, -1, false).await?;
  assert_eq!(members, vec!["a", "b", "c"]);
  let members: Vec<String> = client.zrevrange("foo", 0, 1, false).await?;
  assert_eq!(members, vec!["c", "b"]);
  let members: Vec<String> = client.zrangebyscore("foo", 2.0, "+inf", false, None).await?;
  assert_eq!(members, vec!["b", "c"]);

  assert_eq!(client.zcount::<i64, _, _, _>("foo", "-inf", 2.0).await?, 2);
  assert_eq!(client.zrank::<i64, _, _>("foo", "c").await?, 2);
  assert_eq!(client.zscore::<f64, _, _>("foo", "b").await?, 2.0);
  Ok(())
}

pub async fn should_add_with_options<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SortedSetsInterface,
{
  let _: () = client.zadd("foo", None, None, false, false, vec![(5.0, "a")]).await?;

  let added: i64 = client
    .zadd("foo", Some(SetOptions::NX), None, false, false, vec![(1.0, "a"), (1.0, "b")])
    .await?;
  assert_eq!(added, 1);
  assert_eq!(client.zscore::<f64, _, _>("foo", "a").await?, 5.0);

  let changed: i64 = client
    .zadd("foo", None, Some(Ordering::GreaterThan), true, false, vec![(4.0, "a"), (6.0, "b")])
    .await?;
  assert_eq!(changed, 1);
  assert_eq!(client.zscore::<f64, _, _>("foo", "a").await?, 5.0);
  assert_eq!(client.zscore::<f64, _, _>("foo", "b").await?, 6.0);

  let score: f64 = client.zincrby("foo", 2.5, "a").await?;
  assert_eq!(score, 7.5);
  let removed: i64 = client.zrem("foo", vec!["a", "missing"]).await?;
  assert_eq!(removed, 1);
  Ok(())
}

pub async fn should_store_union_in_one_slot<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SortedSetsInterface,
{
  let _: () = client
    .zadd("{z}a", None, None, false, false, vec![(1.0, "x"), (2.0, "y")])
    .await?;
  let _: () = client
    .zadd("{z}b", None, None, false, false, vec![(10.0, "y"), (20.0, "z")])
    .await?;

  let count: i64 = client
    .zunionstore("{z}dest", vec!["{z}a", "{z}b"], vec![2.0, 1.0], Some(AggregateOptions::Max))
    .await?;
  assert_eq!(count, 3);
  assert_eq!(client.zscore::<f64, _, _>("{z}dest", "x").await?, 2.0);
  assert_eq!(client.zscore::<f64, _, _>("{z}dest", "y").await?, 10.0);

  let count: i64 = client
    .zinterstore("{z}dest", vec!["{z}a", "{z}b"], vec![], None)
    .await?;
  assert_eq!(count, 1);
  assert_eq!(client.zscore::<f64, _, _>("{z}dest", "y").await?, 12.0);
  Ok(())
}

pub async fn should_reject_store_across_slots(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  let _: () = client.zadd("a", None, None, false, false, vec![(1.0, "x")]).await?;
  let _: () = client.zadd("b", None, None, false, false, vec![(1.0, "y")]).await?;

  let error = client
    .zunionstore::<i64, _, _>("c", vec!["a", "b"], vec![], None)
    .await
    .unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);
  assert_eq!(client.zcard::<i64, _>("c").await?, 0);
  Ok(())
}
