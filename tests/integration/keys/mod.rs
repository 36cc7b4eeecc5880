use crate::utils::TestContext;
use conduit::{
  error::RedisError,
  interfaces::*,
  types::{Expiration, RedisMap, RedisValue},
};
use std::convert::TryInto;

pub async fn should_set_and_get_a_value<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  check_null!(client, "foo");

  let _: () = client.set("foo", "bar", None, None, false).await?;
  assert_eq!(client.get::<String, _>("foo").await?, "bar");
  Ok(())
}

pub async fn should_set_and_del_a_value<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface + StringsInterface,
{
  check_null!(client, "foo");

  let result: Option<String> = client.set("foo", "bar", None, None, true).await?;
  assert!(result.is_none());

  assert_eq!(client.get::<String, _>("foo").await?, "bar");
  assert_eq!(client.del::<i64, _>("foo").await?, 1);

  check_null!(client, "foo");
  Ok(())
}

pub async fn should_incr_and_decr_a_value<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  let count: u64 = client.incr("foo").await?;
  assert_eq!(count, 1);
  let count: u64 = client.incr_by("foo", 2).await?;
  assert_eq!(count, 3);
  let count: u64 = client.decr("foo").await?;
  assert_eq!(count, 2);
  let count: u64 = client.decr_by("foo", 2).await?;
  assert_eq!(count, 0);

  Ok(())
}

pub async fn should_mset_and_mget_values<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  let values = maplit::hashmap! {
    "a" => 1,
    "b" => 2,
    "c" => 3,
  };
  client.mset(values).await?;

  let result: Vec<Option<i64>> = client.mget(vec!["c", "missing", "a", "b"]).await?;
  assert_eq!(result, vec![Some(3), None, Some(1), Some(2)]);
  Ok(())
}

pub async fn should_error_mset_empty_map<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  let values: RedisMap = Vec::<(&str, i64)>::new().try_into()?;
  client.mset(values).await
}

pub async fn should_msetnx_values<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  let written: bool = client.msetnx(vec![("a", 1), ("b", 2)]).await?;
  assert!(written);

  let written: bool = client.msetnx(vec![("a", 3), ("c", 4)]).await?;
  assert!(!written);
  assert_eq!(client.get::<i64, _>("a").await?, 1);
  Ok(())
}

pub async fn should_count_keys_across_slots<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface + StringsInterface,
{
  client.mset(vec![("a", 1), ("b", 2), ("c", 3)]).await?;

  let count: i64 = client.exists(vec!["a", "b", "c", "missing"]).await?;
  assert_eq!(count, 3);
  let count: i64 = client.touch(vec!["a", "missing"]).await?;
  assert_eq!(count, 1);
  let count: i64 = client.del(vec!["a", "b", "c", "missing"]).await?;
  assert_eq!(count, 3);
  let count: i64 = client.exists(vec!["a", "b", "c"]).await?;
  assert_eq!(count, 0);

  Ok(())
}

pub async fn should_expire_and_persist_key<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface + StringsInterface,
{
  let _: () = client.set("foo", "bar", None, None, false).await?;
  assert_eq!(client.ttl::<i64, _>("foo").await?, -1);
  assert!(client.expire::<bool, _>("foo", 100).await?);

  let ttl: i64 = client.ttl("foo").await?;
  assert!(ttl > 0 && ttl <= 100);
  assert!(client.persist::<bool, _>("foo").await?);
  assert_eq!(client.ttl::<i64, _>("foo").await?, -1);
  assert_eq!(client.ttl::<i64, _>("missing").await?, -2);

  Ok(())
}

pub async fn should_rename_key_with_ttl<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface + StringsInterface,
{
  let _: () = client
    .set("foo", "value", Some(Expiration::EX(100)), None, false)
    .await?;
  let _: () = client.rename("foo", "bar").await?;

  check_null!(client, "foo");
  assert_eq!(client.get::<String, _>("bar").await?, "value");
  let ttl: i64 = client.ttl("bar").await?;
  assert!(ttl > 0 && ttl <= 100);

  Ok(())
}

pub async fn should_error_rename_missing_key<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface,
{
  client.rename::<(), _, _>("foo", "bar").await
}

pub async fn should_not_renamenx_over_existing_key<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface + StringsInterface,
{
  client.mset(vec![("foo", 1), ("bar", 2)]).await?;

  let renamed: bool = client.renamenx("foo", "bar").await?;
  assert!(!renamed);
  assert_eq!(client.get::<i64, _>("foo").await?, 1);
  assert_eq!(client.get::<i64, _>("bar").await?, 2);

  let renamed: bool = client.renamenx("foo", "baz").await?;
  assert!(renamed);
  check_null!(client, "foo");
  assert_eq!(client.get::<i64, _>("baz").await?, 1);

  Ok(())
}

pub async fn should_dump_and_restore_key<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface + StringsInterface,
{
  let _: () = client.set("foo", "abc", None, None, false).await?;
  let dumped: RedisValue = client.dump("foo").await?;
  assert!(!dumped.is_null());

  let _: () = client.restore("bar", 0, dumped.clone(), false, false).await?;
  assert_eq!(client.get::<String, _>("bar").await?, "abc");

  let result: Result<(), RedisError> = client.restore("bar", 0, dumped, false, false).await;
  assert!(result.is_err());
  Ok(())
}

pub async fn should_modify_ranges<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  let _: () = client.set("foo", "0123456789", None, None, false).await?;

  let range: String = client.getrange("foo", 0, 4).await?;
  assert_eq!(range, "01234");
  let len: i64 = client.setrange("foo", 4, "abc").await?;
  assert_eq!(len, 10);
  assert_eq!(client.get::<String, _>("foo").await?, "0123abc789");
  let len: i64 = client.append("foo", "!").await?;
  assert_eq!(len, 11);
  assert_eq!(client.strlen::<i64, _>("foo").await?, 11);

  Ok(())
}

pub async fn should_getset_and_getdel_values<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: StringsInterface,
{
  let old: Option<String> = client.getset("foo", "bar").await?;
  assert!(old.is_none());
  let old: String = client.getset("foo", "baz").await?;
  assert_eq!(old, "bar");

  let value: String = client.getdel("foo").await?;
  assert_eq!(value, "baz");
  check_null!(client, "foo");
  Ok(())
}
