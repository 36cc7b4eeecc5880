use super::*;
use crate::{
  types::{GeoUnit, GeoValue, MultipleValues, SetOptions},
  utils,
};

pub async fn geoadd<C: ClientLike>(
  client: &C,
  key: RedisKey,
  options: Option<SetOptions>,
  changed: bool,
  values: Vec<GeoValue>,
) -> Result<RedisValue, RedisError> {
  if values.is_empty() {
    return Err(RedisError::new(
      RedisErrorKind::InvalidArgument,
      "At least one position is required.",
    ));
  }

  let mut args = Vec::with_capacity(3 + values.len() * 3);
  args.push(key.into());
  if let Some(options) = options {
    args.push(options.to_str().into());
  }
  if changed {
    args.push(static_val!(CHANGED));
  }
  for value in values.into_iter() {
    args.push(utils::f64_to_redis_string(value.coordinates.longitude)?);
    args.push(utils::f64_to_redis_string(value.coordinates.latitude)?);
    args.push(value.member);
  }

  args_value_cmd(client, RedisCommandKind::GeoAdd, args).await
}

async fn members_cmd<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  key: RedisKey,
  members: MultipleValues,
) -> Result<RedisValue, RedisError> {
  let mut args = Vec::with_capacity(1 + members.len());
  args.push(key.into());
  args.extend(members.inner());

  args_value_cmd(client, kind, args).await
}

pub async fn geopos<C: ClientLike>(client: &C, key: RedisKey, members: MultipleValues) -> Result<RedisValue, RedisError> {
  members_cmd(client, RedisCommandKind::GeoPos, key, members).await
}

pub async fn geohash<C: ClientLike>(
  client: &C,
  key: RedisKey,
  members: MultipleValues,
) -> Result<RedisValue, RedisError> {
  members_cmd(client, RedisCommandKind::GeoHash, key, members).await
}

pub async fn geodist<C: ClientLike>(
  client: &C,
  key: RedisKey,
  first: RedisValue,
  second: RedisValue,
  unit: Option<GeoUnit>,
) -> Result<RedisValue, RedisError> {
  let mut args = vec![key.into(), first, second];
  if let Some(unit) = unit {
    args.push(unit.to_str().into());
  }

  args_value_cmd(client, RedisCommandKind::GeoDist, args).await
}
