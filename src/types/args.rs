use crate::{
  error::{RedisError, RedisErrorKind},
  types::FromRedis,
  utils,
};
use bytes::Bytes;
use bytes_utils::Str;
use float_cmp::approx_eq;
use std::{
  borrow::Cow,
  collections::{BTreeMap, HashMap, HashSet, VecDeque},
  convert::{TryFrom, TryInto},
  fmt,
  hash::{Hash, Hasher},
  iter::FromIterator,
  mem,
  ops::{Deref, DerefMut},
  str,
};

pub static QUEUED: &str = "QUEUED";
pub static NIL: &str = "nil";
pub static OK: &str = "OK";
pub static PONG: &str = "PONG";

macro_rules! impl_from_str_for_redis_key(
  ($t:ty) => {
    impl From<$t> for RedisKey {
      fn from(val: $t) -> Self {
        RedisKey { key: val.to_string().into() }
      }
    }
  }
);

/// A key in Redis.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RedisKey {
  key: Bytes,
}

impl RedisKey {
  /// Create a new `RedisKey` from static bytes without copying.
  pub const fn from_static(b: &'static [u8]) -> Self {
    RedisKey {
      key: Bytes::from_static(b),
    }
  }

  /// Create a new `RedisKey` from a `&'static str` without copying.
  pub const fn from_static_str(b: &'static str) -> Self {
    RedisKey {
      key: Bytes::from_static(b.as_bytes()),
    }
  }

  /// Read the key as a str slice if it can be parsed as a UTF8 string.
  pub fn as_str(&self) -> Option<&str> {
    str::from_utf8(&self.key).ok()
  }

  /// Read the key as a byte slice.
  pub fn as_bytes(&self) -> &[u8] {
    &self.key
  }

  /// Read the inner `Bytes` struct.
  pub fn inner(&self) -> &Bytes {
    &self.key
  }

  /// Read the key as a lossy UTF8 string with `String::from_utf8_lossy`.
  pub fn as_str_lossy(&self) -> Cow<str> {
    String::from_utf8_lossy(&self.key)
  }

  /// Convert the key to a UTF8 string, if possible.
  pub fn into_string(self) -> Option<String> {
    String::from_utf8(self.key.to_vec()).ok()
  }

  /// Read the inner bytes making up the key.
  pub fn into_bytes(self) -> Bytes {
    self.key
  }

  /// Hash the key to find the associated cluster hash slot.
  pub fn cluster_hash(&self) -> u16 {
    redis_protocol::redis_keyslot(&self.key)
  }

  /// Replace this key with an empty byte array, returning the bytes from the original key.
  pub fn take(&mut self) -> Bytes {
    self.key.split_to(self.key.len())
  }

  /// Attempt to convert the key to any type that implements [FromRedis](crate::types::FromRedis).
  pub fn convert<K>(self) -> Result<K, RedisError>
  where
    K: FromRedis,
  {
    K::from_value(RedisValue::Bytes(self.key))
  }
}

impl fmt::Display for RedisKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str_lossy())
  }
}

impl TryFrom<RedisValue> for RedisKey {
  type Error = RedisError;

  fn try_from(value: RedisValue) -> Result<Self, Self::Error> {
    let val = match value {
      RedisValue::String(s) => RedisKey { key: s.into_inner() },
      RedisValue::Integer(i) => RedisKey {
        key: i.to_string().into(),
      },
      RedisValue::Double(f) => RedisKey {
        key: f.to_string().into(),
      },
      RedisValue::Bytes(b) => RedisKey { key: b },
      RedisValue::Boolean(b) => match b {
        true => RedisKey {
          key: utils::static_bytes(b"true"),
        },
        false => RedisKey {
          key: utils::static_bytes(b"false"),
        },
      },
      RedisValue::Queued => RedisKey::from_static_str(QUEUED),
      _ => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidArgument,
          "Cannot convert to key.",
        ))
      },
    };

    Ok(val)
  }
}

impl From<Bytes> for RedisKey {
  fn from(b: Bytes) -> Self {
    RedisKey { key: b }
  }
}

impl<'a> From<&'a [u8]> for RedisKey {
  fn from(b: &'a [u8]) -> Self {
    RedisKey { key: b.to_vec().into() }
  }
}

impl From<String> for RedisKey {
  fn from(s: String) -> Self {
    RedisKey { key: s.into() }
  }
}

impl<'a> From<&'a str> for RedisKey {
  fn from(s: &'a str) -> Self {
    RedisKey {
      key: s.as_bytes().to_vec().into(),
    }
  }
}

impl<'a> From<&'a String> for RedisKey {
  fn from(s: &'a String) -> Self {
    RedisKey { key: s.clone().into() }
  }
}

impl From<Str> for RedisKey {
  fn from(s: Str) -> Self {
    RedisKey { key: s.into_inner() }
  }
}

impl<'a> From<&'a RedisKey> for RedisKey {
  fn from(k: &'a RedisKey) -> RedisKey {
    k.clone()
  }
}

impl_from_str_for_redis_key!(u8);
impl_from_str_for_redis_key!(u16);
impl_from_str_for_redis_key!(u32);
impl_from_str_for_redis_key!(u64);
impl_from_str_for_redis_key!(usize);
impl_from_str_for_redis_key!(i8);
impl_from_str_for_redis_key!(i16);
impl_from_str_for_redis_key!(i32);
impl_from_str_for_redis_key!(i64);
impl_from_str_for_redis_key!(isize);

/// A map of `(RedisKey, RedisValue)` pairs.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct RedisMap {
  pub(crate) inner: HashMap<RedisKey, RedisValue>,
}

impl RedisMap {
  /// Create a new empty map.
  pub fn new() -> Self {
    RedisMap { inner: HashMap::new() }
  }

  /// Replace the value with an empty map.
  pub fn take(&mut self) -> Self {
    RedisMap {
      inner: mem::take(&mut self.inner),
    }
  }

  /// Read the number of (key, value) pairs in the map.
  pub fn len(&self) -> usize {
    self.inner.len()
  }

  /// Whether the map is empty.
  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }

  /// Take the inner `HashMap`.
  pub fn inner(self) -> HashMap<RedisKey, RedisValue> {
    self.inner
  }
}

impl Deref for RedisMap {
  type Target = HashMap<RedisKey, RedisValue>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl DerefMut for RedisMap {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.inner
  }
}

impl<K, V> TryFrom<HashMap<K, V>> for RedisMap
where
  K: TryInto<RedisKey>,
  K::Error: Into<RedisError>,
  V: TryInto<RedisValue>,
  V::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(value: HashMap<K, V>) -> Result<Self, Self::Error> {
    Ok(RedisMap {
      inner: utils::into_redis_map(value.into_iter())?,
    })
  }
}

impl<K, V> TryFrom<BTreeMap<K, V>> for RedisMap
where
  K: TryInto<RedisKey>,
  K::Error: Into<RedisError>,
  V: TryInto<RedisValue>,
  V::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(value: BTreeMap<K, V>) -> Result<Self, Self::Error> {
    Ok(RedisMap {
      inner: utils::into_redis_map(value.into_iter())?,
    })
  }
}

impl<K, V> TryFrom<(K, V)> for RedisMap
where
  K: TryInto<RedisKey>,
  K::Error: Into<RedisError>,
  V: TryInto<RedisValue>,
  V::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from((key, value): (K, V)) -> Result<Self, Self::Error> {
    let mut inner = HashMap::with_capacity(1);
    inner.insert(to!(key)?, to!(value)?);
    Ok(RedisMap { inner })
  }
}

impl<K, V> TryFrom<Vec<(K, V)>> for RedisMap
where
  K: TryInto<RedisKey>,
  K::Error: Into<RedisError>,
  V: TryInto<RedisValue>,
  V::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(values: Vec<(K, V)>) -> Result<Self, Self::Error> {
    Ok(RedisMap {
      inner: utils::into_redis_map(values.into_iter())?,
    })
  }
}

impl<K, V> TryFrom<VecDeque<(K, V)>> for RedisMap
where
  K: TryInto<RedisKey>,
  K::Error: Into<RedisError>,
  V: TryInto<RedisValue>,
  V::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(values: VecDeque<(K, V)>) -> Result<Self, Self::Error> {
    Ok(RedisMap {
      inner: utils::into_redis_map(values.into_iter())?,
    })
  }
}

/// The kind of value from Redis.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RedisValueKind {
  Boolean,
  Integer,
  Double,
  String,
  Bytes,
  Null,
  Queued,
  Map,
  Array,
}

impl fmt::Display for RedisValueKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let s = match *self {
      RedisValueKind::Boolean => "Boolean",
      RedisValueKind::Integer => "Integer",
      RedisValueKind::Double => "Double",
      RedisValueKind::String => "String",
      RedisValueKind::Bytes => "Bytes",
      RedisValueKind::Null => "nil",
      RedisValueKind::Queued => "Queued",
      RedisValueKind::Map => "Map",
      RedisValueKind::Array => "Array",
    };

    write!(f, "{}", s)
  }
}

/// A value used in a Redis command or returned by the server.
#[derive(Clone, Debug)]
pub enum RedisValue {
  /// A boolean value.
  Boolean(bool),
  /// An integer value.
  Integer(i64),
  /// A double floating point number.
  Double(f64),
  /// A string value.
  String(Str),
  /// A value to represent non-UTF8 strings or byte arrays.
  Bytes(Bytes),
  /// A `nil` value.
  Null,
  /// A placeholder returned while a connection is pipelining or queueing a transaction. The real value is
  /// available when the batch is closed.
  Queued,
  /// A map of key/value pairs.
  Map(RedisMap),
  /// An ordered list of values.
  Array(Vec<RedisValue>),
}

impl PartialEq for RedisValue {
  fn eq(&self, other: &Self) -> bool {
    use RedisValue::*;

    match (self, other) {
      (Boolean(s), Boolean(o)) => s == o,
      (Integer(s), Integer(o)) => s == o,
      (Double(s), Double(o)) => approx_eq!(f64, *s, *o, ulps = 2),
      (String(s), String(o)) => s == o,
      (Bytes(s), Bytes(o)) => s == o,
      (Null, Null) => true,
      (Queued, Queued) => true,
      (Map(s), Map(o)) => s == o,
      (Array(s), Array(o)) => s == o,
      _ => false,
    }
  }
}

impl Eq for RedisValue {}

impl RedisValue {
  /// Create a new `RedisValue::Bytes` from a static byte slice without copying.
  pub fn from_static(b: &'static [u8]) -> Self {
    RedisValue::Bytes(Bytes::from_static(b))
  }

  /// Create a new `RedisValue::String` from a static `str` without copying.
  pub fn from_static_str(s: &'static str) -> Self {
    RedisValue::String(utils::static_str(s))
  }

  /// Create a new `RedisValue` with the `OK` status.
  pub fn new_ok() -> Self {
    Self::from_static_str(OK)
  }

  /// Whether the value is a simple string OK value.
  pub fn is_ok(&self) -> bool {
    match *self {
      RedisValue::String(ref s) => *s == OK,
      _ => false,
    }
  }

  /// Read the type of the value without any associated data.
  pub fn kind(&self) -> RedisValueKind {
    match *self {
      RedisValue::Boolean(_) => RedisValueKind::Boolean,
      RedisValue::Integer(_) => RedisValueKind::Integer,
      RedisValue::Double(_) => RedisValueKind::Double,
      RedisValue::String(_) => RedisValueKind::String,
      RedisValue::Bytes(_) => RedisValueKind::Bytes,
      RedisValue::Null => RedisValueKind::Null,
      RedisValue::Queued => RedisValueKind::Queued,
      RedisValue::Map(_) => RedisValueKind::Map,
      RedisValue::Array(_) => RedisValueKind::Array,
    }
  }

  /// Check if the value is null.
  pub fn is_null(&self) -> bool {
    matches!(*self, RedisValue::Null)
  }

  /// Check if the value is an integer.
  pub fn is_integer(&self) -> bool {
    matches!(*self, RedisValue::Integer(_))
  }

  /// Check if the value is a string.
  pub fn is_string(&self) -> bool {
    matches!(*self, RedisValue::String(_))
  }

  /// Check if the value is an array of bytes.
  pub fn is_bytes(&self) -> bool {
    matches!(*self, RedisValue::Bytes(_))
  }

  /// Check if the value is the `Queued` placeholder.
  pub fn is_queued(&self) -> bool {
    matches!(*self, RedisValue::Queued)
  }

  /// Check if the value is a map.
  pub fn is_map(&self) -> bool {
    matches!(*self, RedisValue::Map(_))
  }

  /// Check if the value is an array.
  pub fn is_array(&self) -> bool {
    matches!(*self, RedisValue::Array(_))
  }

  /// Whether the value is null, an empty array, an empty map, or an empty string.
  pub fn is_empty(&self) -> bool {
    match self {
      RedisValue::Null => true,
      RedisValue::Array(values) => values.is_empty(),
      RedisValue::Map(map) => map.is_empty(),
      RedisValue::String(s) => s.is_empty(),
      RedisValue::Bytes(b) => b.is_empty(),
      _ => false,
    }
  }

  /// Read and return the inner value as a `u64`, if possible.
  pub fn as_u64(&self) -> Option<u64> {
    match self {
      RedisValue::Integer(ref i) => {
        if *i >= 0 {
          Some(*i as u64)
        } else {
          None
        }
      },
      RedisValue::String(ref s) => s.parse::<u64>().ok(),
      RedisValue::Double(f) => {
        if f.is_sign_negative() {
          None
        } else {
          Some(*f as u64)
        }
      },
      RedisValue::Boolean(ref b) => Some(*b as u64),
      _ => None,
    }
  }

  /// Read and return the inner value as a `i64`, if possible.
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      RedisValue::Integer(ref i) => Some(*i),
      RedisValue::String(ref s) => s.parse::<i64>().ok(),
      RedisValue::Bytes(ref b) => str::from_utf8(b).ok().and_then(|s| s.parse::<i64>().ok()),
      RedisValue::Double(f) => Some(*f as i64),
      RedisValue::Boolean(ref b) => Some(*b as i64),
      _ => None,
    }
  }

  /// Read and return the inner value as a `usize`, if possible.
  pub fn as_usize(&self) -> Option<usize> {
    self.as_u64().map(|i| i as usize)
  }

  /// Read and return the inner value as a `f64`, if possible.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      RedisValue::Double(ref f) => Some(*f),
      RedisValue::Integer(ref i) => Some(*i as f64),
      RedisValue::String(ref s) => utils::redis_string_to_f64(s).ok(),
      RedisValue::Bytes(ref b) => str::from_utf8(b).ok().and_then(|s| utils::redis_string_to_f64(s).ok()),
      _ => None,
    }
  }

  /// Read the inner value as a string slice, if possible.
  pub fn as_str(&self) -> Option<Cow<str>> {
    let s: Cow<str> = match *self {
      RedisValue::String(ref s) => Cow::Borrowed(s.deref()),
      RedisValue::Bytes(ref b) => Cow::Borrowed(str::from_utf8(b).ok()?),
      RedisValue::Integer(ref i) => Cow::Owned(i.to_string()),
      RedisValue::Double(ref f) => Cow::Owned(f.to_string()),
      RedisValue::Boolean(ref b) => Cow::Owned(b.to_string()),
      RedisValue::Queued => Cow::Borrowed(QUEUED),
      RedisValue::Null => Cow::Borrowed(NIL),
      _ => return None,
    };

    Some(s)
  }

  /// Convert the value to a UTF8 `String`, if possible.
  pub fn into_string(self) -> Option<String> {
    match self {
      RedisValue::Boolean(b) => Some(b.to_string()),
      RedisValue::Double(f) => Some(f.to_string()),
      RedisValue::String(s) => Some(s.to_string()),
      RedisValue::Bytes(b) => String::from_utf8(b.to_vec()).ok(),
      RedisValue::Integer(i) => Some(i.to_string()),
      RedisValue::Queued => Some(QUEUED.to_owned()),
      RedisValue::Array(mut inner) => {
        if inner.len() == 1 {
          inner.pop().and_then(|v| v.into_string())
        } else {
          None
        }
      },
      RedisValue::Null | RedisValue::Map(_) => None,
    }
  }

  /// Convert the value to a `Str`, if possible.
  pub fn into_bytes_str(self) -> Option<Str> {
    match self {
      RedisValue::String(s) => Some(s),
      RedisValue::Bytes(b) => Str::from_inner(b).ok(),
      other => other.into_string().map(|s| s.into()),
    }
  }

  /// Attempt to convert the value to a `bool`.
  pub fn as_bool(&self) -> Option<bool> {
    match *self {
      RedisValue::Boolean(b) => Some(b),
      RedisValue::Integer(ref i) => match *i {
        0 => Some(false),
        1 => Some(true),
        _ => None,
      },
      RedisValue::String(ref s) => match s.as_bytes() {
        b"true" | b"TRUE" | b"t" | b"T" | b"1" | b"OK" => Some(true),
        b"false" | b"FALSE" | b"f" | b"F" | b"0" => Some(false),
        _ => None,
      },
      RedisValue::Null => Some(false),
      RedisValue::Array(ref inner) => {
        if inner.len() == 1 {
          inner.first().and_then(|v| v.as_bool())
        } else {
          None
        }
      },
      _ => None,
    }
  }

  /// Read the value as a byte slice, if possible.
  pub fn as_bytes(&self) -> Option<&[u8]> {
    match *self {
      RedisValue::String(ref s) => Some(s.as_bytes()),
      RedisValue::Bytes(ref b) => Some(b),
      RedisValue::Queued => Some(QUEUED.as_bytes()),
      _ => None,
    }
  }

  /// Convert the value into a `Bytes` view.
  pub fn into_bytes(self) -> Option<Bytes> {
    let v = match self {
      RedisValue::String(s) => s.into_inner(),
      RedisValue::Bytes(b) => b,
      RedisValue::Queued => Bytes::from_static(QUEUED.as_bytes()),
      RedisValue::Array(mut inner) => {
        if inner.len() == 1 {
          return inner.pop().and_then(|v| v.into_bytes());
        } else {
          return None;
        }
      },
      RedisValue::Integer(i) => i.to_string().into(),
      RedisValue::Double(f) => f.to_string().into(),
      _ => return None,
    };

    Some(v)
  }

  /// Attempt to convert this value to a map, if it's a map or an array with an even number of elements.
  pub fn into_map(self) -> Result<RedisMap, RedisError> {
    match self {
      RedisValue::Map(map) => Ok(map),
      RedisValue::Null => Ok(RedisMap::new()),
      RedisValue::Array(values) => {
        if values.len() % 2 != 0 {
          return Err(RedisError::new_parse("Expected an even number of elements."));
        }

        let mut inner = HashMap::with_capacity(values.len() / 2);
        let mut values = values.into_iter();
        while let (Some(key), Some(value)) = (values.next(), values.next()) {
          inner.insert(key.try_into()?, value);
        }
        Ok(RedisMap { inner })
      },
      _ => Err(RedisError::new_parse("Expected array or map.")),
    }
  }

  /// Convert the array value to a set, if possible.
  pub fn into_set(self) -> Result<HashSet<RedisValue>, RedisError> {
    match self {
      RedisValue::Array(values) => Ok(values.into_iter().collect()),
      RedisValue::Null => Ok(HashSet::new()),
      _ => Err(RedisError::new_parse("Expected array.")),
    }
  }

  /// Convert this value to an array if it's an array or map.
  ///
  /// If the value is not an array or map this returns a single-element array containing the current value.
  pub fn into_array(self) -> Vec<RedisValue> {
    match self {
      RedisValue::Array(values) => values,
      RedisValue::Map(map) => {
        let mut out = Vec::with_capacity(map.len() * 2);

        for (key, value) in map.inner().into_iter() {
          out.push(key.into());
          out.push(value);
        }
        out
      },
      RedisValue::Null => Vec::new(),
      _ => vec![self],
    }
  }

  /// Return the length of the inner array if the value is an array.
  pub fn array_len(&self) -> Option<usize> {
    match self {
      RedisValue::Array(ref a) => Some(a.len()),
      _ => None,
    }
  }

  /// Replace this value with `RedisValue::Null`, returning the original value.
  pub fn take(&mut self) -> RedisValue {
    mem::replace(self, RedisValue::Null)
  }

  /// Attempt to convert this value to any value that implements the [FromRedis](crate::types::FromRedis) trait.
  pub fn convert<R>(self) -> Result<R, RedisError>
  where
    R: FromRedis,
  {
    R::from_value(self)
  }

  /// Whether the value can be hashed.
  ///
  /// Some use cases require using `RedisValue` types as keys in a `HashMap`, etc. Trying to do so with an aggregate
  /// type can panic, and this function can be used to more gracefully handle this situation.
  pub fn can_hash(&self) -> bool {
    !matches!(self.kind(), RedisValueKind::Map | RedisValueKind::Array)
  }
}

impl Hash for RedisValue {
  fn hash<H: Hasher>(&self, state: &mut H) {
    // used to prevent collisions between different types
    let prefix = match self.kind() {
      RedisValueKind::Boolean => b'B',
      RedisValueKind::Double => b'd',
      RedisValueKind::Integer => b'i',
      RedisValueKind::String => b's',
      RedisValueKind::Null => b'n',
      RedisValueKind::Queued => b'q',
      RedisValueKind::Array => b'a',
      RedisValueKind::Map => b'm',
      RedisValueKind::Bytes => b'b',
    };
    prefix.hash(state);

    match *self {
      RedisValue::Boolean(b) => b.hash(state),
      RedisValue::Double(f) => f.to_be_bytes().hash(state),
      RedisValue::Integer(d) => d.hash(state),
      RedisValue::String(ref s) => s.hash(state),
      RedisValue::Bytes(ref b) => b.hash(state),
      RedisValue::Null => NIL.hash(state),
      RedisValue::Queued => QUEUED.hash(state),
      RedisValue::Array(ref arr) => {
        for value in arr.iter() {
          value.hash(state);
        }
      },
      RedisValue::Map(ref map) => map.len().hash(state),
    }
  }
}

macro_rules! impl_from_integer(
  ($t:ty) => {
    impl From<$t> for RedisValue {
      fn from(d: $t) -> Self {
        RedisValue::Integer(d as i64)
      }
    }
  }
);

impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);
impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);

impl From<f32> for RedisValue {
  fn from(f: f32) -> Self {
    RedisValue::Double(f as f64)
  }
}

impl From<f64> for RedisValue {
  fn from(f: f64) -> Self {
    RedisValue::Double(f)
  }
}

impl TryFrom<u64> for RedisValue {
  type Error = RedisError;

  fn try_from(d: u64) -> Result<Self, Self::Error> {
    if d >= (i64::MAX as u64) {
      return Err(RedisError::new(RedisErrorKind::InvalidArgument, "Unsigned integer too large."));
    }

    Ok(RedisValue::Integer(d as i64))
  }
}

impl TryFrom<usize> for RedisValue {
  type Error = RedisError;

  fn try_from(d: usize) -> Result<Self, Self::Error> {
    if d >= (i64::MAX as usize) {
      return Err(RedisError::new(RedisErrorKind::InvalidArgument, "Unsigned integer too large."));
    }

    Ok(RedisValue::Integer(d as i64))
  }
}

impl From<Str> for RedisValue {
  fn from(s: Str) -> Self {
    RedisValue::String(s)
  }
}

impl From<Bytes> for RedisValue {
  fn from(b: Bytes) -> Self {
    RedisValue::Bytes(b)
  }
}

impl From<String> for RedisValue {
  fn from(d: String) -> Self {
    RedisValue::String(Str::from(d))
  }
}

impl<'a> From<&'a String> for RedisValue {
  fn from(s: &'a String) -> Self {
    RedisValue::String(Str::from(s.as_str()))
  }
}

impl<'a> From<&'a str> for RedisValue {
  fn from(d: &'a str) -> Self {
    RedisValue::String(Str::from(d))
  }
}

impl<'a> From<&'a [u8]> for RedisValue {
  fn from(b: &'a [u8]) -> Self {
    RedisValue::Bytes(Bytes::from(b.to_vec()))
  }
}

impl From<bool> for RedisValue {
  fn from(d: bool) -> Self {
    RedisValue::Boolean(d)
  }
}

impl<T> TryFrom<Option<T>> for RedisValue
where
  T: TryInto<RedisValue>,
  T::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(d: Option<T>) -> Result<Self, Self::Error> {
    match d {
      Some(i) => to!(i),
      None => Ok(RedisValue::Null),
    }
  }
}

impl FromIterator<RedisValue> for RedisValue {
  fn from_iter<I: IntoIterator<Item = RedisValue>>(iter: I) -> Self {
    RedisValue::Array(iter.into_iter().collect())
  }
}

impl From<RedisMap> for RedisValue {
  fn from(m: RedisMap) -> Self {
    RedisValue::Map(m)
  }
}

impl From<RedisKey> for RedisValue {
  fn from(d: RedisKey) -> Self {
    RedisValue::Bytes(d.key)
  }
}

impl From<()> for RedisValue {
  fn from(_: ()) -> Self {
    RedisValue::Null
  }
}

/// A convenience struct for functions that take one or more keys.
///
/// **Note: this can also be used to represent an empty array of keys by passing `None` to any function that takes
/// `Into<MultipleKeys>`.** This is primarily useful for `EVAL` and `EVALSHA`.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct MultipleKeys {
  keys: Vec<RedisKey>,
}

impl MultipleKeys {
  pub fn new() -> MultipleKeys {
    MultipleKeys { keys: Vec::new() }
  }

  pub fn inner(self) -> Vec<RedisKey> {
    self.keys
  }

  pub fn as_slice(&self) -> &[RedisKey] {
    &self.keys
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  pub fn into_values(self) -> Vec<RedisValue> {
    self.keys.into_iter().map(|k| k.into()).collect()
  }
}

/// A convenience alias for functions that take one or more channels or patterns.
pub type MultipleStrings = MultipleKeys;

impl From<Option<RedisKey>> for MultipleKeys {
  fn from(key: Option<RedisKey>) -> Self {
    let keys = if let Some(key) = key { vec![key] } else { vec![] };
    MultipleKeys { keys }
  }
}

impl<T> From<T> for MultipleKeys
where
  T: Into<RedisKey>,
{
  fn from(d: T) -> Self {
    MultipleKeys { keys: vec![d.into()] }
  }
}

impl<T> FromIterator<T> for MultipleKeys
where
  T: Into<RedisKey>,
{
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    MultipleKeys {
      keys: iter.into_iter().map(|k| k.into()).collect(),
    }
  }
}

impl<T> From<Vec<T>> for MultipleKeys
where
  T: Into<RedisKey>,
{
  fn from(d: Vec<T>) -> Self {
    MultipleKeys {
      keys: d.into_iter().map(|k| k.into()).collect(),
    }
  }
}

impl<T> From<VecDeque<T>> for MultipleKeys
where
  T: Into<RedisKey>,
{
  fn from(d: VecDeque<T>) -> Self {
    MultipleKeys {
      keys: d.into_iter().map(|k| k.into()).collect(),
    }
  }
}

/// Convenience struct for commands that take 1 or more values.
///
/// **Note: this can be used to represent an empty set of values by using `None` for any function that takes
/// `Into<MultipleValues>`.** This is most useful for `EVAL` and `EVALSHA`.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct MultipleValues {
  values: Vec<RedisValue>,
}

impl MultipleValues {
  pub fn inner(self) -> Vec<RedisValue> {
    self.values
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Convert this a nested `RedisValue`.
  pub fn into_values(self) -> RedisValue {
    RedisValue::Array(self.values)
  }
}

impl From<Option<RedisValue>> for MultipleValues {
  fn from(val: Option<RedisValue>) -> Self {
    let values = if let Some(val) = val { vec![val] } else { vec![] };
    MultipleValues { values }
  }
}

impl<T> TryFrom<Vec<T>> for MultipleValues
where
  T: TryInto<RedisValue>,
  T::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(d: Vec<T>) -> Result<Self, Self::Error> {
    let mut values = Vec::with_capacity(d.len());
    for value in d.into_iter() {
      values.push(to!(value)?);
    }

    Ok(MultipleValues { values })
  }
}

impl<T> TryFrom<VecDeque<T>> for MultipleValues
where
  T: TryInto<RedisValue>,
  T::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(d: VecDeque<T>) -> Result<Self, Self::Error> {
    let mut values = Vec::with_capacity(d.len());
    for value in d.into_iter() {
      values.push(to!(value)?);
    }

    Ok(MultipleValues { values })
  }
}

impl<T> TryFrom<HashSet<T>> for MultipleValues
where
  T: TryInto<RedisValue>,
  T::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from(d: HashSet<T>) -> Result<Self, Self::Error> {
    let mut values = Vec::with_capacity(d.len());
    for value in d.into_iter() {
      values.push(to!(value)?);
    }

    Ok(MultipleValues { values })
  }
}

impl<T> From<T> for MultipleValues
where
  T: Into<RedisValue>,
{
  fn from(d: T) -> Self {
    MultipleValues { values: vec![d.into()] }
  }
}

impl FromIterator<RedisValue> for MultipleValues {
  fn from_iter<I: IntoIterator<Item = RedisValue>>(iter: I) -> Self {
    MultipleValues {
      values: iter.into_iter().collect(),
    }
  }
}

/// Expiration options for the `SET` command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expiration {
  /// Expiration in seconds.
  EX(i64),
  /// Expiration in milliseconds.
  PX(i64),
  /// Expiration time, in seconds.
  EXAT(i64),
  /// Expiration time, in milliseconds.
  PXAT(i64),
  /// Do not reset the TTL.
  KEEPTTL,
}

impl Expiration {
  pub(crate) fn into_args(self) -> (Str, Option<i64>) {
    let (prefix, value) = match self {
      Expiration::EX(i) => ("EX", Some(i)),
      Expiration::PX(i) => ("PX", Some(i)),
      Expiration::EXAT(i) => ("EXAT", Some(i)),
      Expiration::PXAT(i) => ("PXAT", Some(i)),
      Expiration::KEEPTTL => ("KEEPTTL", None),
    };

    (utils::static_str(prefix), value)
  }
}

/// Options for the `SET` command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SetOptions {
  /// Only set the key if it does not already exist.
  NX,
  /// Only set the key if it already exists.
  XX,
}

impl SetOptions {
  pub(crate) fn to_str(&self) -> Str {
    utils::static_str(match *self {
      SetOptions::NX => "NX",
      SetOptions::XX => "XX",
    })
  }
}

/// The direction to move elements in a `LMOVE` command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LMoveDirection {
  Left,
  Right,
}

impl LMoveDirection {
  pub(crate) fn to_str(&self) -> Str {
    utils::static_str(match *self {
      LMoveDirection::Left => "LEFT",
      LMoveDirection::Right => "RIGHT",
    })
  }
}

/// Ordering options for the `ZADD` and `ZRANGE` families of commands.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Ordering {
  GreaterThan,
  LessThan,
}

impl Ordering {
  pub(crate) fn to_str(&self) -> Str {
    utils::static_str(match *self {
      Ordering::GreaterThan => "GT",
      Ordering::LessThan => "LT",
    })
  }
}

/// The aggregation used by `ZUNIONSTORE` and `ZINTERSTORE`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AggregateOptions {
  Sum,
  Min,
  Max,
}

impl AggregateOptions {
  pub(crate) fn to_str(&self) -> Str {
    utils::static_str(match *self {
      AggregateOptions::Sum => "SUM",
      AggregateOptions::Min => "MIN",
      AggregateOptions::Max => "MAX",
    })
  }
}

/// Sort direction for `SORT`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  pub(crate) fn to_str(&self) -> Str {
    utils::static_str(match *self {
      SortOrder::Asc => "ASC",
      SortOrder::Desc => "DESC",
    })
  }
}

/// Arguments to the `SORT` command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SortOptions {
  /// An external key pattern used to weight elements.
  pub by:     Option<Str>,
  /// An `(offset, count)` pair.
  pub limit:  Option<(i64, i64)>,
  /// External key patterns to fetch instead of the elements themselves.
  pub get:    Vec<Str>,
  pub order:  Option<SortOrder>,
  /// Sort lexicographically instead of numerically.
  pub alpha:  bool,
}

impl SortOptions {
  pub(crate) fn into_args(self, args: &mut Vec<RedisValue>) {
    if let Some(by) = self.by {
      args.push(utils::static_str("BY").into());
      args.push(by.into());
    }
    if let Some((offset, count)) = self.limit {
      args.push(utils::static_str("LIMIT").into());
      args.push(offset.into());
      args.push(count.into());
    }
    for pattern in self.get.into_iter() {
      args.push(utils::static_str("GET").into());
      args.push(pattern.into());
    }
    if let Some(order) = self.order {
      args.push(order.to_str().into());
    }
    if self.alpha {
      args.push(utils::static_str("ALPHA").into());
    }
  }
}

/// A geospatial `(longitude, latitude)` pair.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoPosition {
  pub longitude: f64,
  pub latitude:  f64,
}

impl From<(f64, f64)> for GeoPosition {
  fn from(d: (f64, f64)) -> Self {
    GeoPosition {
      longitude: d.0,
      latitude:  d.1,
    }
  }
}

/// Units for the `GEODIST` and `GEOSEARCH` commands.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GeoUnit {
  Meters,
  Kilometers,
  Miles,
  Feet,
}

impl GeoUnit {
  pub(crate) fn to_str(&self) -> Str {
    utils::static_str(match *self {
      GeoUnit::Meters => "m",
      GeoUnit::Kilometers => "km",
      GeoUnit::Miles => "mi",
      GeoUnit::Feet => "ft",
    })
  }
}

/// A `(longitude, latitude, member)` tuple for `GEOADD`.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoValue {
  pub coordinates: GeoPosition,
  pub member:      RedisValue,
}

impl<T> TryFrom<(f64, f64, T)> for GeoValue
where
  T: TryInto<RedisValue>,
  T::Error: Into<RedisError>,
{
  type Error = RedisError;

  fn try_from((longitude, latitude, member): (f64, f64, T)) -> Result<Self, Self::Error> {
    Ok(GeoValue {
      coordinates: GeoPosition { longitude, latitude },
      member:      to!(member)?,
    })
  }
}

/// The flavor of `INFO` sections that can be requested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InfoKind {
  Default,
  All,
  Keyspace,
  Cluster,
  CommandStats,
  Cpu,
  Replication,
  Stats,
  Persistence,
  Memory,
  Clients,
  Server,
}

impl InfoKind {
  pub(crate) fn to_str(&self) -> &'static str {
    match *self {
      InfoKind::Default => "default",
      InfoKind::All => "all",
      InfoKind::Keyspace => "keyspace",
      InfoKind::Cluster => "cluster",
      InfoKind::CommandStats => "commandstats",
      InfoKind::Cpu => "cpu",
      InfoKind::Replication => "replication",
      InfoKind::Stats => "stats",
      InfoKind::Persistence => "persistence",
      InfoKind::Memory => "memory",
      InfoKind::Clients => "clients",
      InfoKind::Server => "server",
    }
  }
}

/// A stream entry ID argument.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum XID {
  /// The `*` ID, letting the server generate one.
  Auto,
  /// The `$` ID, meaning the last entry in the stream.
  Max,
  /// The `>` ID used with consumer groups.
  NewInGroup,
  /// A concrete ID.
  Manual(Str),
}

impl XID {
  pub(crate) fn into_str(self) -> Str {
    match self {
      XID::Auto => utils::static_str("*"),
      XID::Max => utils::static_str("$"),
      XID::NewInGroup => utils::static_str(">"),
      XID::Manual(s) => s,
    }
  }
}

impl<'a> From<&'a str> for XID {
  fn from(value: &'a str) -> Self {
    match value {
      "*" => XID::Auto,
      "$" => XID::Max,
      ">" => XID::NewInGroup,
      _ => XID::Manual(value.into()),
    }
  }
}

impl From<String> for XID {
  fn from(value: String) -> Self {
    XID::from(value.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn should_convert_flat_array_to_map() {
    let value = RedisValue::Array(vec!["a".into(), 1.into(), "b".into(), 2.into()]);
    let map = value.into_map().unwrap();

    assert_eq!(map.get(&RedisKey::from("a")), Some(&RedisValue::Integer(1)));
    assert_eq!(map.get(&RedisKey::from("b")), Some(&RedisValue::Integer(2)));
  }

  #[test]
  fn should_reject_odd_array_as_map() {
    let value = RedisValue::Array(vec!["a".into()]);
    assert!(value.into_map().is_err());
  }

  #[test]
  fn should_hash_keys_with_hash_tags_to_same_slot() {
    let a = RedisKey::from("{user1}.following");
    let b = RedisKey::from("{user1}.followers");

    assert_eq!(a.cluster_hash(), b.cluster_hash());
  }

  #[test]
  fn should_compare_doubles_approximately() {
    assert_eq!(RedisValue::Double(0.1 + 0.2), RedisValue::Double(0.3));
  }
}
