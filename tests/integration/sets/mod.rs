use crate::utils::TestContext;
use conduit::{error::RedisError, interfaces::*};
use std::collections::HashSet;

fn sets(values: Vec<&str>) -> HashSet<String> {
  values.into_iter().map(|s| s.to_owned()).collect()
}

async fn create_sets<C>(client: &C) -> Result<(), RedisError>
where
  C: SetsInterface,
{
  let _: () = client.sadd("a", vec!["1", "2", "3"]).await?;
  let _: () = client.sadd("b", vec!["2", "3", "4"]).await?;
  let _: () = client.sadd("c", vec!["3", "5"]).await?;
  Ok(())
}

pub async fn should_sadd_and_srem_elements<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SetsInterface,
{
  let result: i64 = client.sadd("foo", vec![1, 2, 3]).await?;
  assert_eq!(result, 3);
  let result: i64 = client.sadd("foo", vec![3, 4]).await?;
  assert_eq!(result, 1);
  assert_eq!(client.scard::<i64, _>("foo").await?, 4);

  let result: i64 = client.srem("foo", vec![1, 5]).await?;
  assert_eq!(result, 1);
  assert!(client.sismember::<bool, _, _>("foo", 2).await?);
  assert!(!client.sismember::<bool, _, _>("foo", 1).await?);

  let members: HashSet<String> = client.smembers("foo").await?;
  assert_eq!(members, sets(vec!["2", "3", "4"]));
  Ok(())
}

pub async fn should_pop_and_read_random_members<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SetsInterface,
{
  let _: () = client.sadd("foo", vec!["a", "b", "c"]).await?;

  let random: Vec<String> = client.srandmember("foo", Some(2)).await?;
  assert_eq!(random.len(), 2);
  let popped: String = client.spop("foo", None).await?;
  assert!(["a", "b", "c"].contains(&popped.as_str()));
  assert_eq!(client.scard::<i64, _>("foo").await?, 2);

  let popped: Vec<String> = client.spop("foo", Some(5)).await?;
  assert_eq!(popped.len(), 2);
  assert_eq!(client.scard::<i64, _>("foo").await?, 0);
  Ok(())
}

pub async fn should_combine_sets<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SetsInterface,
{
  create_sets(&client).await?;

  let result: HashSet<String> = client.sinter(vec!["a", "b", "c"]).await?;
  assert_eq!(result, sets(vec!["3"]));
  let result: HashSet<String> = client.sunion(vec!["a", "b", "c"]).await?;
  assert_eq!(result, sets(vec!["1", "2", "3", "4", "5"]));
  let result: HashSet<String> = client.sdiff(vec!["a", "b"]).await?;
  assert_eq!(result, sets(vec!["1"]));
  let result: HashSet<String> = client.sinter(vec!["a", "missing"]).await?;
  assert!(result.is_empty());

  Ok(())
}

pub async fn should_store_combined_sets<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SetsInterface,
{
  create_sets(&client).await?;

  let count: i64 = client.sunionstore("foo", vec!["a", "c"]).await?;
  assert_eq!(count, 4);
  let members: HashSet<String> = client.smembers("foo").await?;
  assert_eq!(members, sets(vec!["1", "2", "3", "5"]));

  let count: i64 = client.sinterstore("bar", vec!["a", "b"]).await?;
  assert_eq!(count, 2);
  let count: i64 = client.sdiffstore("baz", vec!["b", "a"]).await?;
  assert_eq!(count, 1);
  let members: HashSet<String> = client.smembers("baz").await?;
  assert_eq!(members, sets(vec!["4"]));

  // storing an empty result removes the destination
  let count: i64 = client.sinterstore("foo", vec!["a", "missing"]).await?;
  assert_eq!(count, 0);
  assert_eq!(client.scard::<i64, _>("foo").await?, 0);
  Ok(())
}

pub async fn should_smove_members<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: SetsInterface,
{
  create_sets(&client).await?;

  let moved: bool = client.smove("a", "c", "1").await?;
  assert!(moved);
  let moved: bool = client.smove("a", "c", "missing").await?;
  assert!(!moved);

  let members: HashSet<String> = client.smembers("a").await?;
  assert_eq!(members, sets(vec!["2", "3"]));
  let members: HashSet<String> = client.smembers("c").await?;
  assert_eq!(members, sets(vec!["1", "3", "5"]));
  Ok(())
}
