use crate::{
  error::{RedisError, RedisErrorKind},
  types::{GeoPosition, RedisKey, RedisValue},
};
use bytes::Bytes;
use bytes_utils::Str;
use std::{
  collections::{BTreeMap, BTreeSet, HashMap, HashSet},
  hash::{BuildHasher, Hash},
};

fn nil_error(target: &str) -> RedisError {
  RedisError::new(RedisErrorKind::NotFound, format!("Cannot convert nil to {}.", target))
}

fn queued_error() -> RedisError {
  RedisError::new(
    RedisErrorKind::InvalidArgument,
    "The value is not available until the pipeline or transaction is closed. Use `()` or `Option<T>` instead.",
  )
}

/// Unwrap single element arrays, which some commands return for scalar values.
fn unwrap_single(value: RedisValue) -> Result<RedisValue, RedisError> {
  match value {
    RedisValue::Array(mut values) => {
      if values.len() == 1 {
        Ok(values.pop().unwrap_or(RedisValue::Null))
      } else {
        Err(RedisError::new_parse("Cannot convert array to number."))
      }
    },
    value => Ok(value),
  }
}

macro_rules! to_signed_number(
  ($t:ty, $v:expr) => {
    match unwrap_single($v)? {
      RedisValue::Double(f) => Ok(f as $t),
      RedisValue::Integer(i) => Ok(i as $t),
      RedisValue::Boolean(b) => Ok(if b { 1 } else { 0 }),
      RedisValue::String(s) => s.parse::<$t>().map_err(|e| e.into()),
      RedisValue::Bytes(b) => std::str::from_utf8(&b)?.parse::<$t>().map_err(|e| e.into()),
      RedisValue::Null => Err(nil_error("number")),
      RedisValue::Queued => Err(queued_error()),
      _ => Err(RedisError::new_parse("Cannot convert to number.")),
    }
  }
);

macro_rules! to_unsigned_number(
  ($t:ty, $v:expr) => {
    match unwrap_single($v)? {
      RedisValue::Double(f) => if f.is_sign_negative() {
        Err(RedisError::new_parse("Cannot convert from negative number."))
      } else {
        Ok(f as $t)
      },
      RedisValue::Integer(i) => if i < 0 {
        Err(RedisError::new_parse("Cannot convert from negative number."))
      } else {
        Ok(i as $t)
      },
      RedisValue::Boolean(b) => Ok(if b { 1 } else { 0 }),
      RedisValue::String(s) => s.parse::<$t>().map_err(|e| e.into()),
      RedisValue::Bytes(b) => std::str::from_utf8(&b)?.parse::<$t>().map_err(|e| e.into()),
      RedisValue::Null => Err(nil_error("number")),
      RedisValue::Queued => Err(queued_error()),
      _ => Err(RedisError::new_parse("Cannot convert to number.")),
    }
  }
);

macro_rules! impl_signed_number (
  ($t:ty) => {
    impl FromRedis for $t {
      fn from_value(value: RedisValue) -> Result<$t, RedisError> {
        to_signed_number!($t, value)
      }
    }
  }
);

macro_rules! impl_unsigned_number (
  ($t:ty) => {
    impl FromRedis for $t {
      fn from_value(value: RedisValue) -> Result<$t, RedisError> {
        to_unsigned_number!($t, value)
      }
    }
  }
);

/// A trait used to [convert](crate::types::RedisValue::convert) various forms of [RedisValue](crate::types::RedisValue)
/// into different types.
///
/// While a connection is pipelining or queueing a transaction every command returns `RedisValue::Queued`. Callers
/// should use `()` or `Option<T>` as the response type in those modes, since `Option<T>` maps the placeholder to
/// `None`.
pub trait FromRedis: Sized {
  fn from_value(value: RedisValue) -> Result<Self, RedisError>;

  #[doc(hidden)]
  fn from_values(values: Vec<RedisValue>) -> Result<Vec<Self>, RedisError> {
    values.into_iter().map(|v| Self::from_value(v)).collect()
  }

  #[doc(hidden)]
  fn from_owned_bytes(_: Vec<u8>) -> Option<Vec<Self>> {
    None
  }

  #[doc(hidden)]
  fn is_tuple() -> bool {
    false
  }
}

impl FromRedis for RedisValue {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    Ok(value)
  }
}

impl FromRedis for () {
  fn from_value(_: RedisValue) -> Result<Self, RedisError> {
    Ok(())
  }
}

impl_signed_number!(i8);
impl_signed_number!(i16);
impl_signed_number!(i32);
impl_signed_number!(i64);
impl_signed_number!(i128);
impl_signed_number!(isize);

impl FromRedis for u8 {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    to_unsigned_number!(u8, value)
  }

  fn from_owned_bytes(d: Vec<u8>) -> Option<Vec<Self>> {
    Some(d)
  }
}

impl_unsigned_number!(u16);
impl_unsigned_number!(u32);
impl_unsigned_number!(u64);
impl_unsigned_number!(u128);
impl_unsigned_number!(usize);

impl FromRedis for String {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    match value {
      RedisValue::Null => Err(nil_error("string")),
      RedisValue::Queued => Err(queued_error()),
      value => value
        .into_string()
        .ok_or_else(|| RedisError::new_parse("Could not convert to string.")),
    }
  }
}

impl FromRedis for Str {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    match value {
      RedisValue::Null => Err(nil_error("string")),
      RedisValue::Queued => Err(queued_error()),
      value => value
        .into_bytes_str()
        .ok_or_else(|| RedisError::new_parse("Could not convert to string.")),
    }
  }
}

impl FromRedis for f64 {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    match value {
      RedisValue::Null => Err(nil_error("double")),
      RedisValue::Queued => Err(queued_error()),
      value => value
        .as_f64()
        .ok_or_else(|| RedisError::new_parse("Could not convert to double.")),
    }
  }
}

impl FromRedis for f32 {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    f64::from_value(value).map(|f| f as f32)
  }
}

impl FromRedis for bool {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    match value {
      RedisValue::Null => Err(nil_error("bool")),
      RedisValue::Queued => Err(queued_error()),
      value => value
        .as_bool()
        .ok_or_else(|| RedisError::new_parse("Could not convert to bool.")),
    }
  }
}

impl<T> FromRedis for Option<T>
where
  T: FromRedis,
{
  fn from_value(value: RedisValue) -> Result<Option<T>, RedisError> {
    match value {
      RedisValue::Null | RedisValue::Queued => Ok(None),
      value => Ok(Some(T::from_value(value)?)),
    }
  }
}

impl FromRedis for Bytes {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    match value {
      RedisValue::Null => Err(nil_error("bytes")),
      value => value
        .into_bytes()
        .ok_or_else(|| RedisError::new_parse("Cannot parse into bytes.")),
    }
  }
}

impl FromRedis for RedisKey {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    match value {
      RedisValue::Null => Err(nil_error("key")),
      value => RedisKey::try_from(value),
    }
  }
}

impl FromRedis for GeoPosition {
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    let (longitude, latitude): (f64, f64) = value.convert()?;
    Ok(GeoPosition { longitude, latitude })
  }
}

impl<T> FromRedis for Vec<T>
where
  T: FromRedis,
{
  fn from_value(value: RedisValue) -> Result<Vec<T>, RedisError> {
    match value {
      RedisValue::Bytes(bytes) => {
        if let Some(out) = T::from_owned_bytes(bytes.to_vec()) {
          Ok(out)
        } else {
          Ok(vec![T::from_value(RedisValue::Bytes(bytes))?])
        }
      },
      RedisValue::String(string) => {
        // check whether T is a byte without consuming `string`
        if T::from_owned_bytes(vec![]).is_some() {
          T::from_owned_bytes(string.into_inner().to_vec())
            .ok_or_else(|| RedisError::new_parse("Could not convert string to bytes."))
        } else {
          Ok(vec![T::from_value(RedisValue::String(string))?])
        }
      },
      RedisValue::Array(values) => T::from_values(values),
      RedisValue::Map(map) => {
        let mut out = Vec::with_capacity(map.len() * 2);
        for (key, value) in map.inner().into_iter() {
          if T::is_tuple() {
            // try to convert to a 2-element tuple since that's a common use case from `HGETALL`, etc
            out.push(T::from_value(RedisValue::Array(vec![key.into(), value]))?);
          } else {
            out.push(T::from_value(key.into())?);
            out.push(T::from_value(value)?);
          }
        }
        Ok(out)
      },
      RedisValue::Null | RedisValue::Queued => Ok(vec![]),
      value => Ok(vec![T::from_value(value)?]),
    }
  }
}

impl<K, V, S> FromRedis for HashMap<K, V, S>
where
  K: FromRedisKey + Eq + Hash,
  V: FromRedis,
  S: BuildHasher + Default,
{
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    let map = match value {
      RedisValue::Null => return Ok(HashMap::default()),
      RedisValue::Array(_) | RedisValue::Map(_) => value.into_map()?,
      _ => return Err(RedisError::new_parse("Cannot convert to map.")),
    };

    map
      .inner()
      .into_iter()
      .map(|(k, v)| Ok((K::from_key(k)?, V::from_value(v)?)))
      .collect()
  }
}

impl<V, S> FromRedis for HashSet<V, S>
where
  V: FromRedis + Hash + Eq,
  S: BuildHasher + Default,
{
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    value.into_array().into_iter().map(|v| V::from_value(v)).collect()
  }
}

impl<K, V> FromRedis for BTreeMap<K, V>
where
  K: FromRedisKey + Ord,
  V: FromRedis,
{
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    let map = match value {
      RedisValue::Null => return Ok(BTreeMap::new()),
      RedisValue::Array(_) | RedisValue::Map(_) => value.into_map()?,
      _ => return Err(RedisError::new_parse("Cannot convert to map.")),
    };

    map
      .inner()
      .into_iter()
      .map(|(k, v)| Ok((K::from_key(k)?, V::from_value(v)?)))
      .collect()
  }
}

impl<V> FromRedis for BTreeSet<V>
where
  V: FromRedis + Ord,
{
  fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    value.into_array().into_iter().map(|v| V::from_value(v)).collect()
  }
}

// adapted from mitsuhiko
macro_rules! impl_from_redis_tuple {
  () => ();
  ($($name:ident,)+) => (
    #[doc(hidden)]
    impl<$($name: FromRedis),*> FromRedis for ($($name,)*) {
      fn is_tuple() -> bool {
        true
      }

      #[allow(non_snake_case, unused_variables)]
      fn from_value(v: RedisValue) -> Result<($($name,)*), RedisError> {
        if let RedisValue::Array(mut values) = v {
          let mut n = 0;
          $(let $name = (); n += 1;)*
          if values.len() != n {
            return Err(RedisError::new_parse("Invalid tuple dimension."));
          }

          values.reverse();
          Ok(($({let $name = (); values
            .pop()
            .ok_or_else(|| RedisError::new_parse("Expected value, found none."))?
            .convert()?
          },)*))
        } else {
          Err(RedisError::new_parse("Could not convert to tuple."))
        }
      }

      #[allow(non_snake_case, unused_variables)]
      fn from_values(mut values: Vec<RedisValue>) -> Result<Vec<($($name,)*)>, RedisError> {
        let mut n = 0;
        $(let $name = (); n += 1;)*
        if values.len() % n != 0 {
          return Err(RedisError::new_parse("Invalid tuple dimension."))
        }

        let mut out = Vec::with_capacity(values.len() / n);
        for chunk in values.chunks_exact_mut(n) {
          match chunk {
            [$($name),*] => out.push(($($name.take().convert()?),*),),
             _ => return Err(RedisError::new_parse("Invalid tuple dimension.")),
          }
        }

        Ok(out)
      }
    }
    impl_from_redis_peel!($($name,)*);
  )
}

macro_rules! impl_from_redis_peel {
  ($name:ident, $($other:ident,)*) => (impl_from_redis_tuple!($($other,)*);)
}

impl_from_redis_tuple! { T1, T2, T3, T4, T5, T6, T7, T8, }

macro_rules! impl_from_str_from_redis_key (
  ($t:ty) => {
    impl FromRedisKey for $t {
      fn from_key(value: RedisKey) -> Result<$t, RedisError> {
        value
          .as_str()
          .and_then(|k| k.parse::<$t>().ok())
          .ok_or_else(|| RedisError::new_parse("Cannot parse key from bytes."))
      }
    }
  }
);

/// A trait used to convert `RedisKey` values to various types.
pub trait FromRedisKey: Sized {
  fn from_key(value: RedisKey) -> Result<Self, RedisError>;
}

impl_from_str_from_redis_key!(u8);
impl_from_str_from_redis_key!(u16);
impl_from_str_from_redis_key!(u32);
impl_from_str_from_redis_key!(u64);
impl_from_str_from_redis_key!(usize);
impl_from_str_from_redis_key!(i8);
impl_from_str_from_redis_key!(i16);
impl_from_str_from_redis_key!(i32);
impl_from_str_from_redis_key!(i64);
impl_from_str_from_redis_key!(isize);
impl_from_str_from_redis_key!(f64);

impl FromRedisKey for String {
  fn from_key(value: RedisKey) -> Result<Self, RedisError> {
    value
      .into_string()
      .ok_or_else(|| RedisError::new_parse("Cannot parse key as string."))
  }
}

impl FromRedisKey for Str {
  fn from_key(value: RedisKey) -> Result<Self, RedisError> {
    Ok(Str::from_inner(value.into_bytes())?)
  }
}

impl FromRedisKey for Bytes {
  fn from_key(value: RedisKey) -> Result<Self, RedisError> {
    Ok(value.into_bytes())
  }
}

impl FromRedisKey for RedisKey {
  fn from_key(value: RedisKey) -> Result<Self, RedisError> {
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use crate::{error::RedisError, types::RedisValue};
  use std::collections::{BTreeMap, HashMap, HashSet};

  #[test]
  fn should_convert_null() {
    let _foo: () = RedisValue::Null.convert().unwrap();
  }

  #[test]
  fn should_convert_numbers() {
    let foo: i64 = RedisValue::String("123".into()).convert().unwrap();
    assert_eq!(foo, 123);
    let foo: u32 = RedisValue::Integer(123).convert().unwrap();
    assert_eq!(foo, 123);
    let foo: usize = RedisValue::Bytes("42".as_bytes().to_vec().into()).convert().unwrap();
    assert_eq!(foo, 42);
    let foo: f64 = RedisValue::String("123.5".into()).convert().unwrap();
    assert_eq!(foo, 123.5);
    let foo: i64 = RedisValue::Array(vec![RedisValue::Integer(7)]).convert().unwrap();
    assert_eq!(foo, 7);
  }

  #[test]
  fn should_reject_negative_unsigned_numbers() {
    let result: Result<u64, RedisError> = RedisValue::Integer(-1).convert();
    assert!(result.is_err());
  }

  #[test]
  fn should_return_not_found_with_null_scalar_values() {
    let result: Result<u64, RedisError> = RedisValue::Null.convert();
    assert!(result.unwrap_err().is_not_found());
    let result: Result<String, RedisError> = RedisValue::Null.convert();
    assert!(result.unwrap_err().is_not_found());
    let result: Result<bool, RedisError> = RedisValue::Null.convert();
    assert!(result.unwrap_err().is_not_found());
  }

  #[test]
  fn should_map_queued_values_to_none() {
    let foo: Option<i64> = RedisValue::Queued.convert().unwrap();
    assert_eq!(foo, None);

    let result: Result<i64, RedisError> = RedisValue::Queued.convert();
    assert!(result.is_err());
  }

  #[test]
  fn should_convert_bools() {
    let foo: bool = RedisValue::Integer(0).convert().unwrap();
    assert!(!foo);
    let foo: bool = RedisValue::Integer(1).convert().unwrap();
    assert!(foo);
    let foo: bool = RedisValue::String("OK".into()).convert().unwrap();
    assert!(foo);
  }

  #[test]
  fn should_convert_bytes() {
    let foo: Vec<u8> = RedisValue::Bytes("foo".as_bytes().to_vec().into()).convert().unwrap();
    assert_eq!(foo, "foo".as_bytes().to_vec());
    let foo: Vec<u8> = RedisValue::String("foo".into()).convert().unwrap();
    assert_eq!(foo, "foo".as_bytes().to_vec());
  }

  #[test]
  fn should_convert_arrays() {
    let foo: Vec<String> = RedisValue::Array(vec!["a".into(), "b".into()]).convert().unwrap();
    assert_eq!(foo, vec!["a".to_owned(), "b".to_owned()]);
  }

  #[test]
  fn should_convert_maps() {
    let foo: HashMap<String, u16> = RedisValue::Array(vec!["a".into(), 1.into(), "b".into(), 2.into()])
      .convert()
      .unwrap();
    assert_eq!(foo, maplit::hashmap! { "a".to_owned() => 1, "b".to_owned() => 2 });

    let foo: BTreeMap<String, u16> = RedisValue::Null.convert().unwrap();
    assert!(foo.is_empty());
  }

  #[test]
  fn should_convert_sets() {
    let foo: HashSet<String> = RedisValue::Array(vec!["a".into(), "b".into(), "a".into()])
      .convert()
      .unwrap();
    assert_eq!(foo, maplit::hashset! { "a".to_owned(), "b".to_owned() });
  }

  #[test]
  fn should_convert_array_tuples() {
    let foo: Vec<(String, i64)> = RedisValue::Array(vec!["a".into(), 1.into(), "b".into(), 2.into()])
      .convert()
      .unwrap();
    assert_eq!(foo, vec![("a".to_owned(), 1), ("b".to_owned(), 2)]);
  }
}
