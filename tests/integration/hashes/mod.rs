use crate::utils::TestContext;
use conduit::{error::RedisError, interfaces::*};
use std::collections::{HashMap, HashSet};

pub async fn should_hset_and_hget<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: HashesInterface,
{
  let result: i64 = client.hset("foo", ("a", 1)).await?;
  assert_eq!(result, 1);
  let result: i64 = client.hset("foo", vec![("b", 2), ("c", 3)]).await?;
  assert_eq!(result, 2);

  let a: i64 = client.hget("foo", "a").await?;
  assert_eq!(a, 1);
  let b: i64 = client.hget("foo", "b").await?;
  assert_eq!(b, 2);
  let missing: Option<i64> = client.hget("foo", "d").await?;
  assert!(missing.is_none());

  Ok(())
}

pub async fn should_hset_and_hdel<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: HashesInterface,
{
  let _: () = client.hset("foo", vec![("a", 1), ("b", 2), ("c", 3)]).await?;

  let result: i64 = client.hdel("foo", vec!["a", "b"]).await?;
  assert_eq!(result, 2);
  let result: i64 = client.hdel("foo", "c").await?;
  assert_eq!(result, 1);
  let result: Option<i64> = client.hget("foo", "a").await?;
  assert!(result.is_none());

  Ok(())
}

pub async fn should_hgetall<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: HashesInterface,
{
  let _: () = client.hset("foo", vec![("a", 1), ("b", 2), ("c", 3)]).await?;

  let values: HashMap<String, i64> = client.hgetall("foo").await?;
  assert_eq!(values, maplit::hashmap! {
    "a".to_owned() => 1,
    "b".to_owned() => 2,
    "c".to_owned() => 3,
  });
  let values: HashMap<String, i64> = client.hgetall("missing").await?;
  assert!(values.is_empty());

  Ok(())
}

pub async fn should_increment_fields<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: HashesInterface,
{
  let result: i64 = client.hincrby("foo", "a", 1).await?;
  assert_eq!(result, 1);
  let result: i64 = client.hincrby("foo", "a", 2).await?;
  assert_eq!(result, 3);

  let result: f64 = client.hincrbyfloat("foo", "b", 0.5).await?;
  assert_eq!(result, 0.5);
  let result: f64 = client.hincrbyfloat("foo", "b", 1.25).await?;
  assert_eq!(result, 1.75);

  Ok(())
}

pub async fn should_get_keys_values_and_lengths<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: HashesInterface,
{
  let _: () = client.hset("foo", vec![("a", "1"), ("b", "22")]).await?;

  let keys: HashSet<String> = client.hkeys("foo").await?;
  assert_eq!(keys, maplit::hashset! {"a".to_owned(), "b".to_owned()});
  let values: HashSet<String> = client.hvals("foo").await?;
  assert_eq!(values, maplit::hashset! {"1".to_owned(), "22".to_owned()});

  assert_eq!(client.hlen::<i64, _>("foo").await?, 2);
  assert_eq!(client.hstrlen::<i64, _, _>("foo", "b").await?, 2);
  assert!(client.hexists::<bool, _, _>("foo", "a").await?);
  assert!(!client.hexists::<bool, _, _>("foo", "c").await?);

  let set: bool = client.hsetnx("foo", "a", "x").await?;
  assert!(!set);
  let values: Vec<Option<String>> = client.hmget("foo", vec!["a", "c"]).await?;
  assert_eq!(values, vec![Some("1".to_owned()), None]);

  Ok(())
}
