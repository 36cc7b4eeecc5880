use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tokio::time::Instant;

/// A stream entry ID.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StreamId {
  pub ms:  u64,
  pub seq: u64,
}

impl StreamId {
  pub fn parse(value: &[u8], default_seq: u64) -> Option<StreamId> {
    let value = std::str::from_utf8(value).ok()?;
    match value {
      "-" => return Some(StreamId { ms: 0, seq: 0 }),
      "+" => {
        return Some(StreamId {
          ms:  u64::MAX,
          seq: u64::MAX,
        })
      },
      _ => {},
    };

    match value.split_once('-') {
      Some((ms, seq)) => Some(StreamId {
        ms:  ms.parse().ok()?,
        seq: seq.parse().ok()?,
      }),
      None => Some(StreamId {
        ms:  value.parse().ok()?,
        seq: default_seq,
      }),
    }
  }

  pub fn to_bytes(self) -> Bytes {
    format!("{}-{}", self.ms, self.seq).into()
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsumerGroup {
  pub last_delivered: StreamId,
  pub pending:        BTreeMap<StreamId, Bytes>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MockStream {
  pub entries: BTreeMap<StreamId, Vec<(Bytes, Bytes)>>,
  pub last_id: StreamId,
  pub groups:  BTreeMap<Bytes, ConsumerGroup>,
}

/// A value stored in the in-memory database.
#[derive(Clone, Debug, PartialEq)]
pub enum MockValue {
  String(Bytes),
  List(VecDeque<Bytes>),
  Set(BTreeSet<Bytes>),
  Hash(BTreeMap<Bytes, Bytes>),
  ZSet(BTreeMap<Bytes, f64>),
  Stream(MockStream),
}

impl MockValue {
  pub fn type_name(&self) -> &'static str {
    match *self {
      MockValue::String(_) => "string",
      MockValue::List(_) => "list",
      MockValue::Set(_) => "set",
      MockValue::Hash(_) => "hash",
      MockValue::ZSet(_) => "zset",
      MockValue::Stream(_) => "stream",
    }
  }

  fn is_empty_container(&self) -> bool {
    match *self {
      MockValue::List(ref l) => l.is_empty(),
      MockValue::Set(ref s) => s.is_empty(),
      MockValue::Hash(ref h) => h.is_empty(),
      MockValue::ZSet(ref z) => z.is_empty(),
      MockValue::String(_) | MockValue::Stream(_) => false,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Entry {
  pub value:      MockValue,
  pub expires_at: Option<Instant>,
}

impl Entry {
  pub fn new(value: MockValue) -> Self {
    Entry {
      value,
      expires_at: None,
    }
  }
}

pub const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

macro_rules! typed_accessors(
  ($get:ident, $create:ident, $variant:ident, $t:ty) => {
    pub fn $get(&mut self, key: &[u8]) -> Result<Option<&mut $t>, &'static str> {
      match self.get_mut(key) {
        Some(Entry { value: MockValue::$variant(inner), .. }) => Ok(Some(inner)),
        Some(_) => Err(WRONG_TYPE),
        None => Ok(None),
      }
    }

    pub fn $create(&mut self, key: &[u8]) -> Result<&mut $t, &'static str> {
      self.expire(key);
      let entry = self
        .entries
        .entry(Bytes::copy_from_slice(key))
        .or_insert_with(|| Entry::new(MockValue::$variant(Default::default())));

      match entry.value {
        MockValue::$variant(ref mut inner) => Ok(inner),
        _ => Err(WRONG_TYPE),
      }
    }
  }
);

/// One numbered database on a mock node.
#[derive(Clone, Debug, Default)]
pub struct MockDb {
  entries: HashMap<Bytes, Entry>,
}

impl MockDb {
  /// Remove the key if its TTL elapsed.
  pub fn expire(&mut self, key: &[u8]) {
    let expired = self
      .entries
      .get(key)
      .and_then(|entry| entry.expires_at)
      .map(|at| at <= Instant::now())
      .unwrap_or(false);

    if expired {
      self.entries.remove(key);
    }
  }

  fn expire_all(&mut self) {
    let now = Instant::now();
    self
      .entries
      .retain(|_, entry| entry.expires_at.map(|at| at > now).unwrap_or(true));
  }

  pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
    self.expire(key);
    self.entries.get_mut(key)
  }

  pub fn get(&mut self, key: &[u8]) -> Option<&Entry> {
    self.expire(key);
    self.entries.get(key)
  }

  pub fn contains(&mut self, key: &[u8]) -> bool {
    self.get(key).is_some()
  }

  pub fn insert(&mut self, key: &[u8], entry: Entry) {
    self.entries.insert(Bytes::copy_from_slice(key), entry);
  }

  pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
    self.expire(key);
    self.entries.remove(key)
  }

  /// Remove the key if it holds an empty list, set, hash or sorted set.
  pub fn remove_if_empty(&mut self, key: &[u8]) {
    let empty = self
      .entries
      .get(key)
      .map(|entry| entry.value.is_empty_container())
      .unwrap_or(false);

    if empty {
      self.entries.remove(key);
    }
  }

  /// Read a snapshot of the value, used to detect changes to watched keys.
  pub fn snapshot(&mut self, key: &[u8]) -> Option<MockValue> {
    self.get(key).map(|entry| entry.value.clone())
  }

  pub fn keys(&mut self) -> Vec<Bytes> {
    self.expire_all();
    let mut keys: Vec<Bytes> = self.entries.keys().cloned().collect();
    keys.sort();
    keys
  }

  pub fn len(&mut self) -> usize {
    self.expire_all();
    self.entries.len()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn string(&mut self, key: &[u8]) -> Result<Option<&Bytes>, &'static str> {
    match self.get(key) {
      Some(Entry {
        value: MockValue::String(s),
        ..
      }) => Ok(Some(s)),
      Some(_) => Err(WRONG_TYPE),
      None => Ok(None),
    }
  }

  /// Replace the value, clearing any TTL.
  pub fn set_string(&mut self, key: &[u8], value: Bytes) {
    self.insert(key, Entry::new(MockValue::String(value)));
  }

  typed_accessors!(list, list_or_create, List, VecDeque<Bytes>);
  typed_accessors!(set, set_or_create, Set, BTreeSet<Bytes>);
  typed_accessors!(hash, hash_or_create, Hash, BTreeMap<Bytes, Bytes>);
  typed_accessors!(zset, zset_or_create, ZSet, BTreeMap<Bytes, f64>);
  typed_accessors!(stream, stream_or_create, Stream, MockStream);
}

/// Match a string against a glob-style pattern with the same rules as `KEYS` and `PSUBSCRIBE`.
pub fn glob_match(pattern: &[u8], value: &[u8]) -> bool {
  let (mut p, mut v) = (0, 0);
  let (mut star_p, mut star_v) = (None, 0);

  while v < value.len() {
    if p < pattern.len() {
      match pattern[p] {
        b'*' => {
          star_p = Some(p);
          star_v = v;
          p += 1;
          continue;
        },
        b'?' => {
          p += 1;
          v += 1;
          continue;
        },
        b'[' => {
          if let Some((matched, next)) = match_class(&pattern[p ..], value[v]) {
            if matched {
              p += next;
              v += 1;
              continue;
            }
          }
        },
        b'\\' if p + 1 < pattern.len() => {
          if pattern[p + 1] == value[v] {
            p += 2;
            v += 1;
            continue;
          }
        },
        c => {
          if c == value[v] {
            p += 1;
            v += 1;
            continue;
          }
        },
      }
    }

    match star_p {
      Some(sp) => {
        p = sp + 1;
        star_v += 1;
        v = star_v;
      },
      None => return false,
    }
  }

  pattern[p ..].iter().all(|c| *c == b'*')
}

/// Match a `[...]` class at the start of the pattern, returning whether it matched and the class length.
fn match_class(pattern: &[u8], c: u8) -> Option<(bool, usize)> {
  let end = pattern.iter().skip(1).position(|b| *b == b']')? + 1;
  let mut class = &pattern[1 .. end];
  let negate = class.first() == Some(&b'^');
  if negate {
    class = &class[1 ..];
  }

  let mut matched = false;
  let mut idx = 0;
  while idx < class.len() {
    if idx + 2 < class.len() && class[idx + 1] == b'-' {
      if class[idx] <= c && c <= class[idx + 2] {
        matched = true;
      }
      idx += 3;
    } else {
      if class[idx] == c {
        matched = true;
      }
      idx += 1;
    }
  }

  Some((matched != negate, end + 1))
}

const DUMP_PREFIX: &[u8] = b"CONDUIT-MOCK-DUMP";

fn put_item(buf: &mut BytesMut, item: &[u8]) {
  buf.put_u32(item.len() as u32);
  buf.put_slice(item);
}

fn get_item(buf: &mut Bytes) -> Option<Bytes> {
  if buf.remaining() < 4 {
    return None;
  }
  let len = buf.get_u32() as usize;
  if buf.remaining() < len {
    return None;
  }
  Some(buf.split_to(len))
}

/// Serialize a value for `DUMP`. Streams are not supported.
pub fn dump_value(value: &MockValue) -> Option<Bytes> {
  let mut buf = BytesMut::new();
  buf.put_slice(DUMP_PREFIX);

  match value {
    MockValue::String(ref s) => {
      buf.put_u8(0);
      put_item(&mut buf, s);
    },
    MockValue::List(ref l) => {
      buf.put_u8(1);
      buf.put_u32(l.len() as u32);
      l.iter().for_each(|item| put_item(&mut buf, item));
    },
    MockValue::Set(ref s) => {
      buf.put_u8(2);
      buf.put_u32(s.len() as u32);
      s.iter().for_each(|item| put_item(&mut buf, item));
    },
    MockValue::Hash(ref h) => {
      buf.put_u8(3);
      buf.put_u32(h.len() as u32);
      for (field, value) in h.iter() {
        put_item(&mut buf, field);
        put_item(&mut buf, value);
      }
    },
    MockValue::ZSet(ref z) => {
      buf.put_u8(4);
      buf.put_u32(z.len() as u32);
      for (member, score) in z.iter() {
        put_item(&mut buf, member);
        buf.put_f64(*score);
      }
    },
    MockValue::Stream(_) => return None,
  };

  Some(buf.freeze())
}

/// Parse a payload created by `dump_value`.
pub fn restore_value(payload: &[u8]) -> Option<MockValue> {
  if !payload.starts_with(DUMP_PREFIX) || payload.len() < DUMP_PREFIX.len() + 1 {
    return None;
  }
  let mut buf = Bytes::copy_from_slice(&payload[DUMP_PREFIX.len() ..]);
  let kind = buf.get_u8();
  if kind == 0 {
    return get_item(&mut buf).map(MockValue::String);
  }

  if buf.remaining() < 4 {
    return None;
  }
  let count = buf.get_u32() as usize;
  let value = match kind {
    1 => MockValue::List((0 .. count).map(|_| get_item(&mut buf)).collect::<Option<_>>()?),
    2 => MockValue::Set((0 .. count).map(|_| get_item(&mut buf)).collect::<Option<_>>()?),
    3 => {
      let mut hash = BTreeMap::new();
      for _ in 0 .. count {
        hash.insert(get_item(&mut buf)?, get_item(&mut buf)?);
      }
      MockValue::Hash(hash)
    },
    4 => {
      let mut zset = BTreeMap::new();
      for _ in 0 .. count {
        let member = get_item(&mut buf)?;
        if buf.remaining() < 8 {
          return None;
        }
        zset.insert(member, buf.get_f64());
      }
      MockValue::ZSet(zset)
    },
    _ => return None,
  };

  Some(value)
}

const GEO_STEP: u32 = 26;
const GEO_LAT_MIN: f64 = -85.05112878;
const GEO_LAT_MAX: f64 = 85.05112878;
const GEO_LONG_MIN: f64 = -180.0;
const GEO_LONG_MAX: f64 = 180.0;
const EARTH_RADIUS_METERS: f64 = 6372797.560856;
const GEOHASH_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

fn interleave(lat: u32, long: u32) -> u64 {
  let mut out = 0u64;
  for bit in 0 .. 32 {
    out |= (((lat >> bit) & 1) as u64) << (2 * bit);
    out |= (((long >> bit) & 1) as u64) << (2 * bit + 1);
  }
  out
}

fn deinterleave(value: u64) -> (u32, u32) {
  let (mut lat, mut long) = (0u32, 0u32);
  for bit in 0 .. 32 {
    lat |= (((value >> (2 * bit)) & 1) as u32) << bit;
    long |= (((value >> (2 * bit + 1)) & 1) as u32) << bit;
  }
  (lat, long)
}

/// Whether the coordinates can be indexed.
pub fn geo_valid(longitude: f64, latitude: f64) -> bool {
  (GEO_LONG_MIN ..= GEO_LONG_MAX).contains(&longitude) && (GEO_LAT_MIN ..= GEO_LAT_MAX).contains(&latitude)
}

/// Encode coordinates as the 52 bit interleaved score used by geo sorted sets.
pub fn geo_encode(longitude: f64, latitude: f64) -> f64 {
  let scale = (1u64 << GEO_STEP) as f64;
  let lat = ((latitude - GEO_LAT_MIN) / (GEO_LAT_MAX - GEO_LAT_MIN) * scale) as u32;
  let long = ((longitude - GEO_LONG_MIN) / (GEO_LONG_MAX - GEO_LONG_MIN) * scale) as u32;

  interleave(lat, long) as f64
}

/// Decode a geo score to the center of its cell.
pub fn geo_decode(score: f64) -> (f64, f64) {
  let scale = (1u64 << GEO_STEP) as f64;
  let (lat, long) = deinterleave(score as u64);
  let lat_unit = (GEO_LAT_MAX - GEO_LAT_MIN) / scale;
  let long_unit = (GEO_LONG_MAX - GEO_LONG_MIN) / scale;

  let latitude = GEO_LAT_MIN + (lat as f64 + 0.5) * lat_unit;
  let longitude = GEO_LONG_MIN + (long as f64 + 0.5) * long_unit;
  (longitude, latitude)
}

/// The haversine distance between two points, in meters.
pub fn geo_distance(from: (f64, f64), to: (f64, f64)) -> f64 {
  let (lon1, lat1) = (from.0.to_radians(), from.1.to_radians());
  let (lon2, lat2) = (to.0.to_radians(), to.1.to_radians());
  let u = ((lat2 - lat1) / 2.0).sin();
  let v = ((lon2 - lon1) / 2.0).sin();

  2.0 * EARTH_RADIUS_METERS * (u * u + lat1.cos() * lat2.cos() * v * v).sqrt().asin()
}

/// Encode coordinates as an 11 character geohash string with the standard latitude range.
pub fn geo_hash_string(longitude: f64, latitude: f64) -> String {
  let (mut lat_range, mut long_range) = ((-90.0, 90.0), (-180.0, 180.0));
  let mut out = String::with_capacity(11);
  let mut even = true;
  let (mut bits, mut value) = (0, 0usize);

  while out.len() < 11 {
    let (range, coord): (&mut (f64, f64), f64) = if even {
      (&mut long_range, longitude)
    } else {
      (&mut lat_range, latitude)
    };
    let mid = (range.0 + range.1) / 2.0;
    value <<= 1;
    if coord >= mid {
      value |= 1;
      range.0 = mid;
    } else {
      range.1 = mid;
    }
    even = !even;

    bits += 1;
    if bits == 5 {
      out.push(GEOHASH_ALPHABET[value] as char);
      bits = 0;
      value = 0;
    }
  }

  out
}

/// Convert a distance in meters to the provided unit.
pub fn geo_convert_distance(meters: f64, unit: &str) -> Option<f64> {
  Some(match unit.to_lowercase().as_str() {
    "m" => meters,
    "km" => meters / 1000.0,
    "mi" => meters / 1609.34,
    "ft" => meters * 3.28084,
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn should_match_glob_patterns() {
    assert!(glob_match(b"*", b"foo"));
    assert!(glob_match(b"f*o", b"foooo"));
    assert!(glob_match(b"h?llo", b"hello"));
    assert!(glob_match(b"h[ae]llo", b"hallo"));
    assert!(!glob_match(b"h[^e]llo", b"hello"));
    assert!(glob_match(b"h[a-b]llo", b"hbllo"));
    assert!(glob_match(b"news.*", b"news.tech"));
    assert!(!glob_match(b"news.*", b"weather"));
    assert!(glob_match(b"\\*", b"*"));
  }

  #[test]
  fn should_restore_dumped_values() {
    let mut zset = BTreeMap::new();
    zset.insert(Bytes::from("a"), 1.5);
    let values = vec![
      MockValue::String("foo".into()),
      MockValue::List(vec![Bytes::from("a"), Bytes::from("b")].into()),
      MockValue::ZSet(zset),
    ];

    for value in values.into_iter() {
      let dumped = dump_value(&value).unwrap();
      assert_eq!(restore_value(&dumped), Some(value));
    }
    assert_eq!(restore_value(b"garbage"), None);
  }

  #[test]
  fn should_round_trip_geo_scores_within_precision() {
    let (longitude, latitude) = geo_decode(geo_encode(13.361389, 38.115556));

    assert!((longitude - 13.361389).abs() < 0.0001);
    assert!((latitude - 38.115556).abs() < 0.0001);
  }

  #[test]
  fn should_measure_geo_distance() {
    let distance = geo_distance((13.361389, 38.115556), (15.087269, 37.502669));
    assert!((distance - 166274.15).abs() < 1.0);
  }

  #[test]
  fn should_compute_geohash_strings() {
    assert!(geo_hash_string(13.361389, 38.115556).starts_with("sqc8b49rn"));
  }

  #[tokio::test(start_paused = true)]
  async fn should_expire_keys_lazily() {
    let mut db = MockDb::default();
    db.insert(b"foo", Entry {
      value:      MockValue::String("bar".into()),
      expires_at: Some(Instant::now() + std::time::Duration::from_secs(1)),
    });

    assert!(db.contains(b"foo"));
    tokio::time::advance(std::time::Duration::from_secs(2)).await;
    assert!(!db.contains(b"foo"));
  }
}
