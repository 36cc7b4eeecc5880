use super::*;
use crate::{
  types::{MultipleKeys, MultipleValues},
  utils,
};
use std::collections::HashSet;

pub async fn sadd<C: ClientLike>(client: &C, key: RedisKey, members: MultipleValues) -> Result<RedisValue, RedisError> {
  let mut args = Vec::with_capacity(1 + members.len());
  args.push(key.into());
  args.extend(members.inner());

  args_value_cmd(client, RedisCommandKind::SAdd, args).await
}

pub async fn srem<C: ClientLike>(client: &C, key: RedisKey, members: MultipleValues) -> Result<RedisValue, RedisError> {
  let mut args = Vec::with_capacity(1 + members.len());
  args.push(key.into());
  args.extend(members.inner());

  args_value_cmd(client, RedisCommandKind::SRem, args).await
}

pub async fn scard<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::SCard, key.into()).await
}

pub async fn smembers<C: ClientLike>(client: &C, key: RedisKey) -> Result<RedisValue, RedisError> {
  one_arg_value_cmd(client, RedisCommandKind::SMembers, key.into()).await
}

pub async fn sismember<C: ClientLike>(client: &C, key: RedisKey, member: RedisValue) -> Result<RedisValue, RedisError> {
  args_value_cmd(client, RedisCommandKind::SIsMember, vec![key.into(), member]).await
}

pub async fn spop<C: ClientLike>(client: &C, key: RedisKey, count: Option<usize>) -> Result<RedisValue, RedisError> {
  let mut args = vec![key.into()];
  if let Some(count) = count {
    args.push(to!(count)?);
  }

  args_value_cmd(client, RedisCommandKind::SPop, args).await
}

pub async fn srandmember<C: ClientLike>(
  client: &C,
  key: RedisKey,
  count: Option<i64>,
) -> Result<RedisValue, RedisError> {
  let mut args = vec![key.into()];
  if let Some(count) = count {
    args.push(count.into());
  }

  args_value_cmd(client, RedisCommandKind::SRandMember, args).await
}

pub async fn smove<C: ClientLike>(
  client: &C,
  source: RedisKey,
  destination: RedisKey,
  member: RedisValue,
) -> Result<RedisValue, RedisError> {
  if spans_slots(client, &[source.clone(), destination.clone()]) {
    let executor = emulation_executor(client, "SMOVE")?;
    let command = RedisCommand::new(RedisCommandKind::SRem, vec![source.clone().into(), member.clone()]);
    let removed = run_for_key(&executor, &source, command).await?.as_i64().unwrap_or(0) > 0;

    if removed {
      let command = RedisCommand::new(RedisCommandKind::SAdd, vec![destination.clone().into(), member]);
      run_for_key(&executor, &destination, command).await?;
    }
    Ok(RedisValue::Boolean(removed))
  } else {
    args_value_cmd(client, RedisCommandKind::SMove, vec![
      source.into(),
      destination.into(),
      member,
    ])
    .await
  }
}

/// Read the members of every set, in the order of the keys.
async fn read_members(
  executor: &ClusterCommandExecutor,
  keys: &[RedisKey],
) -> Result<Vec<HashSet<RedisValue>>, RedisError> {
  let members = executor
    .run_for_keys(keys.to_vec(), |key| {
      RedisCommand::new(RedisCommandKind::SMembers, vec![key.into()])
    })
    .await?
    .values_sorted_by_keys(keys)?;

  Ok(
    members
      .into_iter()
      .map(|members| members.into_array().into_iter().collect())
      .collect(),
  )
}

/// Intersect the sets one at a time, stopping as soon as the intersection is empty.
async fn intersect_across_slots(
  executor: &ClusterCommandExecutor,
  keys: &[RedisKey],
) -> Result<HashSet<RedisValue>, RedisError> {
  let mut result: Option<HashSet<RedisValue>> = None;

  for key in keys.iter() {
    let command = RedisCommand::new(RedisCommandKind::SMembers, vec![key.clone().into()]);
    let members: HashSet<RedisValue> = run_for_key(executor, key, command).await?.into_array().into_iter().collect();

    let next = match result.take() {
      Some(current) => current.intersection(&members).cloned().collect(),
      None => members,
    };
    if next.is_empty() {
      return Ok(next);
    }
    result = Some(next);
  }

  Ok(result.unwrap_or_default())
}

async fn union_across_slots(
  executor: &ClusterCommandExecutor,
  keys: &[RedisKey],
) -> Result<HashSet<RedisValue>, RedisError> {
  let mut result = HashSet::new();
  for members in read_members(executor, keys).await?.into_iter() {
    result.extend(members);
  }

  Ok(result)
}

async fn diff_across_slots(
  executor: &ClusterCommandExecutor,
  keys: &[RedisKey],
) -> Result<HashSet<RedisValue>, RedisError> {
  let mut sets = read_members(executor, keys).await?.into_iter();
  let mut result = sets.next().unwrap_or_default();
  for members in sets {
    if result.is_empty() {
      break;
    }
    result.retain(|member| !members.contains(member));
  }

  Ok(result)
}

/// Replace the destination set with the provided members, returning the new cardinality.
async fn store_set(
  executor: &ClusterCommandExecutor,
  destination: RedisKey,
  members: HashSet<RedisValue>,
) -> Result<RedisValue, RedisError> {
  let count = members.len() as i64;
  let command = RedisCommand::new(RedisCommandKind::Unlink, vec![destination.clone().into()]);
  run_for_key(executor, &destination, command).await?;

  if !members.is_empty() {
    let mut args = Vec::with_capacity(1 + members.len());
    args.push(destination.clone().into());
    args.extend(members);

    run_for_key(executor, &destination, RedisCommand::new(RedisCommandKind::SAdd, args)).await?;
  }
  Ok(RedisValue::Integer(count))
}

#[derive(Clone, Copy)]
enum SetOperation {
  Inter,
  Union,
  Diff,
}

impl SetOperation {
  fn kind(&self, store: bool) -> RedisCommandKind {
    match (*self, store) {
      (SetOperation::Inter, false) => RedisCommandKind::SInter,
      (SetOperation::Inter, true) => RedisCommandKind::SInterStore,
      (SetOperation::Union, false) => RedisCommandKind::SUnion,
      (SetOperation::Union, true) => RedisCommandKind::SUnionStore,
      (SetOperation::Diff, false) => RedisCommandKind::SDiff,
      (SetOperation::Diff, true) => RedisCommandKind::SDiffStore,
    }
  }

  async fn across_slots(
    &self,
    executor: &ClusterCommandExecutor,
    keys: &[RedisKey],
  ) -> Result<HashSet<RedisValue>, RedisError> {
    match *self {
      SetOperation::Inter => intersect_across_slots(executor, keys).await,
      SetOperation::Union => union_across_slots(executor, keys).await,
      SetOperation::Diff => diff_across_slots(executor, keys).await,
    }
  }
}

async fn combine<C: ClientLike>(
  client: &C,
  operation: SetOperation,
  keys: MultipleKeys,
) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&keys)?;
  let keys = keys.inner();
  let kind = operation.kind(false);

  if spans_slots(client, &keys) {
    let executor = emulation_executor(client, kind.cmd_str())?;
    let members = operation.across_slots(&executor, &keys).await?;
    Ok(RedisValue::Array(members.into_iter().collect()))
  } else {
    let args = keys.into_iter().map(|k| k.into()).collect();
    args_value_cmd(client, kind, args).await
  }
}

async fn combine_and_store<C: ClientLike>(
  client: &C,
  operation: SetOperation,
  destination: RedisKey,
  keys: MultipleKeys,
) -> Result<RedisValue, RedisError> {
  utils::check_empty_keys(&keys)?;
  let keys = keys.inner();
  let kind = operation.kind(true);

  let mut all_keys = Vec::with_capacity(keys.len() + 1);
  all_keys.push(destination.clone());
  all_keys.extend(keys.iter().cloned());

  if spans_slots(client, &all_keys) {
    let executor = emulation_executor(client, kind.cmd_str())?;
    let members = operation.across_slots(&executor, &keys).await?;
    store_set(&executor, destination, members).await
  } else {
    let args = all_keys.into_iter().map(|k| k.into()).collect();
    args_value_cmd(client, kind, args).await
  }
}

pub async fn sinter<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  combine(client, SetOperation::Inter, keys).await
}

pub async fn sunion<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  combine(client, SetOperation::Union, keys).await
}

pub async fn sdiff<C: ClientLike>(client: &C, keys: MultipleKeys) -> Result<RedisValue, RedisError> {
  combine(client, SetOperation::Diff, keys).await
}

pub async fn sinterstore<C: ClientLike>(
  client: &C,
  destination: RedisKey,
  keys: MultipleKeys,
) -> Result<RedisValue, RedisError> {
  combine_and_store(client, SetOperation::Inter, destination, keys).await
}

pub async fn sunionstore<C: ClientLike>(
  client: &C,
  destination: RedisKey,
  keys: MultipleKeys,
) -> Result<RedisValue, RedisError> {
  combine_and_store(client, SetOperation::Union, destination, keys).await
}

pub async fn sdiffstore<C: ClientLike>(
  client: &C,
  destination: RedisKey,
  keys: MultipleKeys,
) -> Result<RedisValue, RedisError> {
  combine_and_store(client, SetOperation::Diff, destination, keys).await
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::cluster_connection;
  use crate::{interfaces::*, mocks::MockDriver};
  use std::collections::HashSet;

  #[tokio::test]
  async fn should_emulate_set_algebra_across_slots() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    let _: i64 = connection.sadd("a", vec!["1", "2", "3"]).await.unwrap();
    let _: i64 = connection.sadd("b", vec!["2", "3", "4"]).await.unwrap();
    let _: i64 = connection.sadd("c", vec!["3", "5"]).await.unwrap();

    let inter: HashSet<String> = connection.sinter(vec!["a", "b", "c"]).await.unwrap();
    assert_eq!(inter, vec!["3".to_owned()].into_iter().collect());
    let union: HashSet<String> = connection.sunion(vec!["a", "b", "c"]).await.unwrap();
    assert_eq!(union.len(), 5);
    let diff: HashSet<String> = connection.sdiff(vec!["a", "b"]).await.unwrap();
    assert_eq!(diff, vec!["1".to_owned()].into_iter().collect());
  }

  #[tokio::test]
  async fn should_store_emulated_union() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    let _: i64 = connection.sadd("a", vec!["1", "2"]).await.unwrap();
    let _: i64 = connection.sadd("b", vec!["2", "3"]).await.unwrap();
    let _: i64 = connection.sadd("dest", "stale").await.unwrap();

    let count: i64 = connection.sunionstore("dest", vec!["a", "b"]).await.unwrap();
    assert_eq!(count, 3);
    let members: HashSet<String> = connection.smembers("dest").await.unwrap();
    assert!(!members.contains("stale"));
    assert_eq!(members.len(), 3);
  }

  #[tokio::test]
  async fn should_move_member_across_slots() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    let _: i64 = connection.sadd("a", "x").await.unwrap();

    let moved: bool = connection.smove("a", "b", "x").await.unwrap();
    assert!(moved);
    let moved: bool = connection.smove("a", "b", "x").await.unwrap();
    assert!(!moved);
    let is_member: bool = connection.sismember("b", "x").await.unwrap();
    assert!(is_member);
    let exists: i64 = connection.exists("a").await.unwrap();
    assert_eq!(exists, 0);
  }
}
