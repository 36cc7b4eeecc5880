use crate::{
  error::{RedisError, RedisErrorKind},
  types::{RedisKey, RedisValue},
  utils,
};
use bytes_utils::Str;

/// The cursor that starts a new iteration.
pub const STARTING_CURSOR: u64 = 0;

/// The types of values supported by the [type](https://redis.io/commands/type) command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScanType {
  Set,
  String,
  ZSet,
  List,
  Hash,
  Stream,
}

impl ScanType {
  pub(crate) fn to_str(&self) -> Str {
    utils::static_str(match *self {
      ScanType::Set => "set",
      ScanType::String => "string",
      ScanType::List => "list",
      ScanType::ZSet => "zset",
      ScanType::Hash => "hash",
      ScanType::Stream => "stream",
    })
  }
}

/// Options shared by `SCAN`, `HSCAN`, `SSCAN` and `ZSCAN`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanOptions {
  /// A glob-style pattern that results must match.
  pub pattern: Option<Str>,
  /// A hint for how many elements the server visits per call.
  pub count:   Option<u32>,
  /// Only return keys holding values of this type. Only used by `SCAN`.
  pub r#type:  Option<ScanType>,
}

impl ScanOptions {
  /// Only return results that match the glob-style pattern.
  pub fn matching<S: Into<Str>>(pattern: S) -> Self {
    ScanOptions {
      pattern: Some(pattern.into()),
      ..ScanOptions::default()
    }
  }

  pub fn with_count(mut self, count: u32) -> Self {
    self.count = Some(count);
    self
  }

  pub fn with_type(mut self, kind: ScanType) -> Self {
    self.r#type = Some(kind);
    self
  }

  /// Whether the pattern only matches keys in one hash slot, because it contains a literal hash tag.
  pub(crate) fn hash_tag_slot(&self) -> Option<u16> {
    let pattern = self.pattern.as_ref()?.as_bytes();
    let open = pattern.iter().position(|b| *b == b'{')?;
    let close = pattern[open + 1 ..].iter().position(|b| *b == b'}')? + open + 1;
    let tag = &pattern[open + 1 .. close];
    let is_literal = pattern[.. close].iter().all(|b| !matches!(*b, b'*' | b'?' | b'[' | b'\\'));

    if tag.is_empty() || !is_literal {
      None
    } else {
      Some(redis_protocol::redis_keyslot(pattern))
    }
  }

  pub(crate) fn into_args(self, args: &mut Vec<RedisValue>, with_type: bool) {
    if let Some(pattern) = self.pattern {
      args.push(utils::static_str("MATCH").into());
      args.push(pattern.into());
    }
    if let Some(count) = self.count {
      args.push(utils::static_str("COUNT").into());
      args.push(count.into());
    }
    if let Some(kind) = self.r#type.filter(|_| with_type) {
      args.push(utils::static_str("TYPE").into());
      args.push(kind.to_str().into());
    }
  }
}

/// One page of results from a `SCAN` family command.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanPage<T> {
  /// The cursor used to read the next page, or `0` when the iteration is finished.
  pub cursor:  u64,
  pub results: T,
}

impl<T> ScanPage<T> {
  /// Whether this is the last page of the iteration.
  pub fn is_finished(&self) -> bool {
    self.cursor == STARTING_CURSOR
  }
}

impl ScanPage<Vec<RedisValue>> {
  /// Parse a `[cursor, [results...]]` reply.
  pub(crate) fn from_value(value: RedisValue) -> Result<Self, RedisError> {
    let mut parts = value.into_array();
    if parts.len() != 2 {
      return Err(RedisError::new(
        RedisErrorKind::Protocol,
        "Expected a cursor and an array of results.",
      ));
    }

    let results = parts.pop().map(|r| r.into_array()).unwrap_or_default();
    let cursor = parts
      .pop()
      .and_then(|c| c.as_str().and_then(|s| s.parse::<u64>().ok()))
      .ok_or_else(|| RedisError::new(RedisErrorKind::Protocol, "Invalid scan cursor."))?;

    Ok(ScanPage { cursor, results })
  }

  pub(crate) fn into_keys(self) -> Result<ScanPage<Vec<RedisKey>>, RedisError> {
    let results = self
      .results
      .into_iter()
      .map(|key| key.try_into())
      .collect::<Result<Vec<RedisKey>, _>>()?;

    Ok(ScanPage {
      cursor: self.cursor,
      results,
    })
  }

  pub(crate) fn into_pairs(self) -> Result<ScanPage<Vec<(RedisKey, RedisValue)>>, RedisError> {
    if self.results.len() % 2 != 0 {
      return Err(RedisError::new_parse("Expected an even number of elements."));
    }

    let mut results = Vec::with_capacity(self.results.len() / 2);
    let mut values = self.results.into_iter();
    while let (Some(field), Some(value)) = (values.next(), values.next()) {
      results.push((field.try_into()?, value));
    }

    Ok(ScanPage {
      cursor: self.cursor,
      results,
    })
  }

  pub(crate) fn into_scores(self) -> Result<ScanPage<Vec<(RedisValue, f64)>>, RedisError> {
    if self.results.len() % 2 != 0 {
      return Err(RedisError::new_parse("Expected an even number of elements."));
    }

    let mut results = Vec::with_capacity(self.results.len() / 2);
    let mut values = self.results.into_iter();
    while let (Some(member), Some(score)) = (values.next(), values.next()) {
      let score = score
        .as_f64()
        .ok_or_else(|| RedisError::new_parse("Invalid sorted set score."))?;
      results.push((member, score));
    }

    Ok(ScanPage {
      cursor: self.cursor,
      results,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reply(cursor: &str, results: Vec<RedisValue>) -> RedisValue {
    RedisValue::Array(vec![cursor.into(), RedisValue::Array(results)])
  }

  #[test]
  fn should_parse_scan_reply() {
    let page = ScanPage::from_value(reply("17", vec!["a".into(), "b".into()])).unwrap();

    assert_eq!(page.cursor, 17);
    assert!(!page.is_finished());
    assert_eq!(page.into_keys().unwrap().results, vec![RedisKey::from("a"), RedisKey::from("b")]);
  }

  #[test]
  fn should_parse_zscan_scores() {
    let page = ScanPage::from_value(reply("0", vec!["a".into(), "1.5".into(), "b".into(), "-inf".into()]))
      .unwrap()
      .into_scores()
      .unwrap();

    assert!(page.is_finished());
    assert_eq!(page.results[0], (RedisValue::from("a"), 1.5));
    assert_eq!(page.results[1].1, f64::NEG_INFINITY);
  }

  #[test]
  fn should_reject_odd_hscan_results() {
    let page = ScanPage::from_value(reply("0", vec!["a".into()])).unwrap();
    assert!(page.into_pairs().is_err());
    assert!(ScanPage::from_value(RedisValue::Array(vec!["0".into()])).is_err());
  }

  #[test]
  fn should_find_literal_hash_tags() {
    assert_eq!(
      ScanOptions::matching("{user1}:*").hash_tag_slot(),
      Some(redis_protocol::redis_keyslot(b"{user1}:*"))
    );
    assert_eq!(ScanOptions::matching("user*:{1}").hash_tag_slot(), None);
    assert_eq!(ScanOptions::matching("{}:*").hash_tag_slot(), None);
    assert_eq!(ScanOptions::default().hash_tag_slot(), None);
  }

  #[test]
  fn should_only_send_type_for_key_scans() {
    let options = ScanOptions::matching("a*").with_count(5).with_type(ScanType::Hash);

    let mut args = Vec::new();
    options.clone().into_args(&mut args, true);
    let expected: Vec<RedisValue> = vec![
      "MATCH".into(),
      "a*".into(),
      "COUNT".into(),
      5.into(),
      "TYPE".into(),
      "hash".into(),
    ];
    assert_eq!(args, expected);

    let mut args = Vec::new();
    options.into_args(&mut args, false);
    assert_eq!(args.len(), 4);
  }
}
