use crate::{
  mocks::{
    db::*,
    server::{
      arg, array, bulk, bulk_array, db, err, float_bulk, format_float, int, min_args, normalize_range, null, ok,
      parse_float, parse_int, scan_reply, syntax_error, unix_ms, upper, MockData, Reply, ScanArgs, Session,
    },
  },
  types::Resp2Frame,
};
use bytes::Bytes;
use std::{
  cmp::Ordering,
  collections::{BTreeMap, BTreeSet, VecDeque},
  ops::Bound,
};

/// Run a command against lists, hashes, sets, sorted sets, streams or geo indexes.
pub fn run(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  let db = db(data, session);

  match name {
    "LPUSH" | "RPUSH" | "LPUSHX" | "RPUSHX" | "LPOP" | "RPOP" | "LLEN" | "LRANGE" | "LINDEX" | "LINSERT" | "LREM"
    | "LSET" | "LTRIM" | "LPOS" | "LMOVE" | "RPOPLPUSH" | "BLPOP" | "BRPOP" | "BLMOVE" | "BRPOPLPUSH" => {
      lists(db, name, args)
    },
    "HSET" | "HSETNX" | "HGET" | "HGETALL" | "HDEL" | "HEXISTS" | "HINCRBY" | "HINCRBYFLOAT" | "HKEYS" | "HVALS"
    | "HLEN" | "HMGET" | "HSTRLEN" | "HSCAN" => hashes(db, name, args),
    "SADD" | "SREM" | "SCARD" | "SMEMBERS" | "SISMEMBER" | "SPOP" | "SRANDMEMBER" | "SMOVE" | "SINTER"
    | "SUNION" | "SDIFF" | "SINTERSTORE" | "SUNIONSTORE" | "SDIFFSTORE" | "SSCAN" => sets(db, name, args),
    "ZADD" | "ZCARD" | "ZCOUNT" | "ZINCRBY" | "ZRANGE" | "ZRANGEBYSCORE" | "ZREVRANGE" | "ZRANK" | "ZREM"
    | "ZSCORE" | "ZUNIONSTORE" | "ZINTERSTORE" | "BZPOPMIN" | "BZPOPMAX" | "ZSCAN" => sorted_sets(db, name, args),
    "XADD" | "XLEN" | "XRANGE" | "XREVRANGE" | "XDEL" | "XTRIM" | "XREAD" | "XGROUP CREATE" | "XGROUP DESTROY"
    | "XREADGROUP" | "XACK" => streams(db, name, args),
    "GEOADD" | "GEOPOS" | "GEODIST" | "GEOHASH" => geo(db, name, args),
    _ => Err(err(format!(
      "ERR unknown command '{}', with args beginning with: ",
      name.to_lowercase()
    ))),
  }
}

fn pop(list: &mut VecDeque<Bytes>, left: bool) -> Option<Bytes> {
  if left {
    list.pop_front()
  } else {
    list.pop_back()
  }
}

fn push(list: &mut VecDeque<Bytes>, value: Bytes, left: bool) {
  if left {
    list.push_front(value);
  } else {
    list.push_back(value);
  }
}

fn direction(value: &[u8]) -> Result<bool, Resp2Frame> {
  match upper(value).as_str() {
    "LEFT" => Ok(true),
    "RIGHT" => Ok(false),
    _ => Err(syntax_error()),
  }
}

fn list_move(db: &mut MockDb, source: &[u8], destination: &[u8], from_left: bool, to_left: bool) -> Reply {
  db.list(destination).map_err(err)?;
  let value = match db.list(source).map_err(err)? {
    Some(list) => pop(list, from_left),
    None => None,
  };
  let value = match value {
    Some(value) => value,
    None => return Ok(null()),
  };

  db.remove_if_empty(source);
  push(db.list_or_create(destination).map_err(err)?, value.clone(), to_left);
  Ok(bulk(value))
}

fn lists(db: &mut MockDb, name: &str, args: &[Bytes]) -> Reply {
  match name {
    "LPUSH" | "RPUSH" | "LPUSHX" | "RPUSHX" => {
      min_args(name, args, 2)?;
      let key = &args[0];
      let left = name.starts_with('L');
      if name.ends_with('X') && db.list(key).map_err(err)?.is_none() {
        return Ok(int(0));
      }

      let list = db.list_or_create(key).map_err(err)?;
      for value in args[1 ..].iter() {
        push(list, value.clone(), left);
      }
      Ok(int(list.len() as i64))
    },
    "LPOP" | "RPOP" => {
      let key = arg(args, 0)?;
      let count = args.get(1).map(|c| parse_int(c)).transpose()?;
      let left = name == "LPOP";
      let list = match db.list(key).map_err(err)? {
        Some(list) => list,
        None => return Ok(null()),
      };

      let reply = match count {
        Some(count) => {
          let values: Vec<Bytes> = (0 .. count.max(0)).filter_map(|_| pop(list, left)).collect();
          bulk_array(values)
        },
        None => pop(list, left).map(bulk).unwrap_or_else(null),
      };
      db.remove_if_empty(key);
      Ok(reply)
    },
    "LLEN" => Ok(int(
      db.list(arg(args, 0)?).map_err(err)?.map(|l| l.len()).unwrap_or(0) as i64,
    )),
    "LRANGE" => {
      let (key, start, stop) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, parse_int(arg(args, 2)?)?);
      let list = match db.list(key).map_err(err)? {
        Some(list) => list,
        None => return Ok(array(vec![])),
      };
      Ok(match normalize_range(start, stop, list.len()) {
        Some((start, stop)) => bulk_array(list.range(start ..= stop).cloned()),
        None => array(vec![]),
      })
    },
    "LINDEX" => {
      let (key, idx) = (arg(args, 0)?, parse_int(arg(args, 1)?)?);
      let list = match db.list(key).map_err(err)? {
        Some(list) => list,
        None => return Ok(null()),
      };
      let idx = if idx < 0 { list.len() as i64 + idx } else { idx };
      Ok(
        usize::try_from(idx)
          .ok()
          .and_then(|idx| list.get(idx))
          .cloned()
          .map(bulk)
          .unwrap_or_else(null),
      )
    },
    "LINSERT" => {
      let (key, position, pivot, value) = (arg(args, 0)?, upper(arg(args, 1)?), arg(args, 2)?, arg(args, 3)?);
      let offset = match position.as_str() {
        "BEFORE" => 0,
        "AFTER" => 1,
        _ => return Err(syntax_error()),
      };
      let list = match db.list(key).map_err(err)? {
        Some(list) => list,
        None => return Ok(int(0)),
      };
      match list.iter().position(|v| v == pivot) {
        Some(idx) => {
          list.insert(idx + offset, value.clone());
          Ok(int(list.len() as i64))
        },
        None => Ok(int(-1)),
      }
    },
    "LREM" => {
      let (key, count, value) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, arg(args, 2)?);
      let list = match db.list(key).map_err(err)? {
        Some(list) => list,
        None => return Ok(int(0)),
      };
      let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
      let mut removed = 0;

      let mut kept: Vec<Bytes> = Vec::with_capacity(list.len());
      let values: Vec<Bytes> = if count < 0 {
        list.drain(..).rev().collect()
      } else {
        list.drain(..).collect()
      };
      for item in values.into_iter() {
        if removed < limit && item == *value {
          removed += 1;
        } else {
          kept.push(item);
        }
      }
      if count < 0 {
        kept.reverse();
      }
      list.extend(kept);
      db.remove_if_empty(key);
      Ok(int(removed as i64))
    },
    "LSET" => {
      let (key, idx, value) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, arg(args, 2)?);
      let list = db.list(key).map_err(err)?.ok_or_else(|| err("ERR no such key"))?;
      let idx = if idx < 0 { list.len() as i64 + idx } else { idx };
      let slot = usize::try_from(idx)
        .ok()
        .and_then(|idx| list.get_mut(idx))
        .ok_or_else(|| err("ERR index out of range"))?;
      *slot = value.clone();
      Ok(ok())
    },
    "LTRIM" => {
      let (key, start, stop) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, parse_int(arg(args, 2)?)?);
      if let Some(list) = db.list(key).map_err(err)? {
        match normalize_range(start, stop, list.len()) {
          Some((start, stop)) => {
            list.truncate(stop + 1);
            list.drain(.. start);
          },
          None => list.clear(),
        }
      }
      db.remove_if_empty(key);
      Ok(ok())
    },
    "LPOS" => {
      let (key, value) = (arg(args, 0)?, arg(args, 1)?);
      let (mut rank, mut count, mut maxlen) = (1, None, 0);
      let mut idx = 2;
      while idx < args.len() {
        let amount = parse_int(arg(args, idx + 1)?)?;
        match upper(&args[idx]).as_str() {
          "RANK" if amount != 0 => rank = amount,
          "COUNT" if amount >= 0 => count = Some(amount as usize),
          "MAXLEN" if amount >= 0 => maxlen = amount as usize,
          _ => return Err(syntax_error()),
        }
        idx += 2;
      }

      let list = db.list(key).map_err(err)?.cloned().unwrap_or_default();
      let limit = if maxlen == 0 { list.len() } else { maxlen };
      let indexes: Box<dyn Iterator<Item = usize>> = if rank > 0 {
        Box::new(0 .. list.len())
      } else {
        Box::new((0 .. list.len()).rev())
      };
      let matches: Vec<usize> = indexes
        .take(limit)
        .filter(|idx| list[*idx] == *value)
        .skip(rank.unsigned_abs() as usize - 1)
        .take(match count {
          Some(0) => usize::MAX,
          Some(count) => count,
          None => 1,
        })
        .collect();

      Ok(match count {
        Some(_) => array(matches.into_iter().map(|idx| int(idx as i64)).collect()),
        None => matches.first().map(|idx| int(*idx as i64)).unwrap_or_else(null),
      })
    },
    "LMOVE" | "BLMOVE" => list_move(
      db,
      arg(args, 0)?,
      arg(args, 1)?,
      direction(arg(args, 2)?)?,
      direction(arg(args, 3)?)?,
    ),
    "RPOPLPUSH" | "BRPOPLPUSH" => list_move(db, arg(args, 0)?, arg(args, 1)?, false, true),
    _ => {
      // BLPOP and BRPOP
      min_args(name, args, 2)?;
      let left = name == "BLPOP";
      for key in args[.. args.len() - 1].iter() {
        let value = match db.list(key).map_err(err)? {
          Some(list) => pop(list, left),
          None => None,
        };
        if let Some(value) = value {
          db.remove_if_empty(key);
          return Ok(bulk_array(vec![key.clone(), value]));
        }
      }
      Ok(null())
    },
  }
}

fn hashes(db: &mut MockDb, name: &str, args: &[Bytes]) -> Reply {
  let key = arg(args, 0)?;

  match name {
    "HSET" => {
      if args.len() < 3 || args.len() % 2 == 0 {
        return Err(err("ERR wrong number of arguments for 'hset' command"));
      }
      let hash = db.hash_or_create(key).map_err(err)?;
      let added = args[1 ..]
        .chunks(2)
        .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
        .count();
      Ok(int(added as i64))
    },
    "HSETNX" => {
      let (field, value) = (arg(args, 1)?, arg(args, 2)?);
      let hash = db.hash_or_create(key).map_err(err)?;
      if hash.contains_key(field) {
        Ok(int(0))
      } else {
        hash.insert(field.clone(), value.clone());
        Ok(int(1))
      }
    },
    "HGET" => {
      let field = arg(args, 1)?;
      Ok(
        db.hash(key)
          .map_err(err)?
          .and_then(|h| h.get(field).cloned())
          .map(bulk)
          .unwrap_or_else(null),
      )
    },
    "HMGET" => {
      min_args(name, args, 2)?;
      let hash = db.hash(key).map_err(err)?.cloned().unwrap_or_default();
      Ok(array(
        args[1 ..]
          .iter()
          .map(|field| hash.get(field).cloned().map(bulk).unwrap_or_else(null))
          .collect(),
      ))
    },
    "HGETALL" => {
      let hash = db.hash(key).map_err(err)?.cloned().unwrap_or_default();
      Ok(bulk_array(hash.into_iter().flat_map(|(k, v)| [k, v])))
    },
    "HSCAN" => {
      let scan = ScanArgs::parse(&args[1 ..])?;
      let fields: Vec<(Bytes, Bytes)> = db
        .hash(key)
        .map_err(err)?
        .map(|h| h.clone().into_iter().collect())
        .unwrap_or_default();
      let (cursor, visited) = scan.window(&fields);
      let items = visited
        .iter()
        .filter(|(field, _)| scan.matches(field))
        .flat_map(|(field, value)| [bulk(field.clone()), bulk(value.clone())])
        .collect();

      Ok(scan_reply(cursor, items))
    },
    "HKEYS" => Ok(bulk_array(
      db.hash(key).map_err(err)?.map(|h| h.keys().cloned().collect()).unwrap_or_else(Vec::new),
    )),
    "HVALS" => Ok(bulk_array(
      db.hash(key).map_err(err)?.map(|h| h.values().cloned().collect()).unwrap_or_else(Vec::new),
    )),
    "HLEN" => Ok(int(db.hash(key).map_err(err)?.map(|h| h.len()).unwrap_or(0) as i64)),
    "HSTRLEN" => {
      let field = arg(args, 1)?;
      Ok(int(
        db.hash(key)
          .map_err(err)?
          .and_then(|h| h.get(field).map(|v| v.len()))
          .unwrap_or(0) as i64,
      ))
    },
    "HEXISTS" => {
      let field = arg(args, 1)?;
      Ok(int(
        db.hash(key).map_err(err)?.map(|h| h.contains_key(field)).unwrap_or(false) as i64,
      ))
    },
    "HDEL" => {
      min_args(name, args, 2)?;
      let removed = match db.hash(key).map_err(err)? {
        Some(hash) => args[1 ..].iter().filter(|f| hash.remove(*f).is_some()).count(),
        None => 0,
      };
      db.remove_if_empty(key);
      Ok(int(removed as i64))
    },
    "HINCRBY" => {
      let (field, delta) = (arg(args, 1)?, parse_int(arg(args, 2)?)?);
      let hash = db.hash_or_create(key).map_err(err)?;
      let current = match hash.get(field) {
        Some(value) => parse_int(value).map_err(|_| err("ERR hash value is not an integer"))?,
        None => 0,
      };
      let next = current
        .checked_add(delta)
        .ok_or_else(|| err("ERR increment or decrement would overflow"))?;
      hash.insert(field.clone(), next.to_string().into());
      Ok(int(next))
    },
    _ => {
      // HINCRBYFLOAT
      let (field, delta) = (arg(args, 1)?, parse_float(arg(args, 2)?)?);
      let hash = db.hash_or_create(key).map_err(err)?;
      let current = match hash.get(field) {
        Some(value) => parse_float(value).map_err(|_| err("ERR hash value is not a float"))?,
        None => 0.0,
      };
      let next = current + delta;
      hash.insert(field.clone(), format_float(next).into());
      Ok(float_bulk(next))
    },
  }
}

fn read_set(db: &mut MockDb, key: &[u8]) -> Result<BTreeSet<Bytes>, Resp2Frame> {
  Ok(db.set(key).map_err(err)?.cloned().unwrap_or_default())
}

fn set_algebra(db: &mut MockDb, name: &str, keys: &[Bytes]) -> Result<BTreeSet<Bytes>, Resp2Frame> {
  let mut sets = Vec::with_capacity(keys.len());
  for key in keys.iter() {
    sets.push(read_set(db, key)?);
  }
  let mut sets = sets.into_iter();
  let first = sets.next().unwrap_or_default();

  Ok(sets.fold(first, |acc, set| match name {
    "SINTER" => acc.intersection(&set).cloned().collect(),
    "SUNION" => acc.union(&set).cloned().collect(),
    _ => acc.difference(&set).cloned().collect(),
  }))
}

fn random_member(set: &BTreeSet<Bytes>) -> Option<Bytes> {
  if set.is_empty() {
    None
  } else {
    set.iter().nth(rand::random::<usize>() % set.len()).cloned()
  }
}

fn sets(db: &mut MockDb, name: &str, args: &[Bytes]) -> Reply {
  let key = arg(args, 0)?;

  match name {
    "SADD" => {
      min_args(name, args, 2)?;
      let set = db.set_or_create(key).map_err(err)?;
      Ok(int(args[1 ..].iter().filter(|m| set.insert((*m).clone())).count() as i64))
    },
    "SREM" => {
      min_args(name, args, 2)?;
      let removed = match db.set(key).map_err(err)? {
        Some(set) => args[1 ..].iter().filter(|m| set.remove(*m)).count(),
        None => 0,
      };
      db.remove_if_empty(key);
      Ok(int(removed as i64))
    },
    "SCARD" => Ok(int(read_set(db, key)?.len() as i64)),
    "SMEMBERS" => Ok(bulk_array(read_set(db, key)?)),
    "SSCAN" => {
      let scan = ScanArgs::parse(&args[1 ..])?;
      let members: Vec<Bytes> = read_set(db, key)?.into_iter().collect();
      let (cursor, visited) = scan.window(&members);
      let items = visited
        .iter()
        .filter(|member| scan.matches(member))
        .map(|member| bulk(member.clone()))
        .collect();

      Ok(scan_reply(cursor, items))
    },
    "SISMEMBER" => Ok(int(read_set(db, key)?.contains(arg(args, 1)?) as i64)),
    "SPOP" => {
      let count = args.get(1).map(|c| parse_int(c)).transpose()?;
      let set = match db.set(key).map_err(err)? {
        Some(set) => set,
        None => return Ok(if count.is_some() { array(vec![]) } else { null() }),
      };

      let mut popped = Vec::new();
      for _ in 0 .. count.unwrap_or(1).max(0) {
        match random_member(set) {
          Some(member) => {
            set.remove(&member);
            popped.push(member);
          },
          None => break,
        }
      }
      db.remove_if_empty(key);

      Ok(match count {
        Some(_) => bulk_array(popped),
        None => popped.pop().map(bulk).unwrap_or_else(null),
      })
    },
    "SRANDMEMBER" => {
      let count = args.get(1).map(|c| parse_int(c)).transpose()?;
      let set = read_set(db, key)?;

      Ok(match count {
        None => random_member(&set).map(bulk).unwrap_or_else(null),
        Some(count) if count < 0 => bulk_array((0 .. count.unsigned_abs()).filter_map(|_| random_member(&set))),
        Some(count) => {
          let mut members: Vec<Bytes> = set.into_iter().collect();
          crate::utils::shuffle(&mut members);
          members.truncate(count as usize);
          bulk_array(members)
        },
      })
    },
    "SMOVE" => {
      let (destination, member) = (arg(args, 1)?, arg(args, 2)?);
      db.set(destination).map_err(err)?;
      let removed = match db.set(key).map_err(err)? {
        Some(set) => set.remove(member),
        None => false,
      };
      if !removed {
        return Ok(int(0));
      }
      db.remove_if_empty(key);
      db.set_or_create(destination).map_err(err)?.insert(member.clone());
      Ok(int(1))
    },
    "SINTER" | "SUNION" | "SDIFF" => Ok(bulk_array(set_algebra(db, name, args)?)),
    _ => {
      // the STORE variants
      min_args(name, args, 2)?;
      let result = set_algebra(db, name.trim_end_matches("STORE"), &args[1 ..])?;
      let len = result.len();
      db.remove(key);
      if len > 0 {
        db.insert(key, Entry::new(MockValue::Set(result)));
      }
      Ok(int(len as i64))
    },
  }
}

/// Read the members ordered by score, then by member.
pub fn sorted_members(zset: &BTreeMap<Bytes, f64>) -> Vec<(Bytes, f64)> {
  let mut members: Vec<(Bytes, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
  members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
  members
}

fn parse_score_bound(value: &[u8]) -> Result<(f64, bool), Resp2Frame> {
  let bound = match value.first() {
    Some(b'(') => (parse_float(&value[1 ..])?, true),
    _ => (parse_float(value)?, false),
  };
  Ok(bound)
}

fn in_score_range(score: f64, min: (f64, bool), max: (f64, bool)) -> bool {
  let above = if min.1 { score > min.0 } else { score >= min.0 };
  let below = if max.1 { score < max.0 } else { score <= max.0 };
  above && below
}

fn scored_frames(members: Vec<(Bytes, f64)>, with_scores: bool) -> Resp2Frame {
  let mut out = Vec::with_capacity(members.len() * 2);
  for (member, score) in members.into_iter() {
    out.push(bulk(member));
    if with_scores {
      out.push(float_bulk(score));
    }
  }
  array(out)
}

fn read_zset(db: &mut MockDb, key: &[u8]) -> Result<BTreeMap<Bytes, f64>, Resp2Frame> {
  Ok(db.zset(key).map_err(err)?.cloned().unwrap_or_default())
}

/// Read a sorted set, treating plain sets as sorted sets where every score is 1.
fn read_weighted(db: &mut MockDb, key: &[u8]) -> Result<BTreeMap<Bytes, f64>, Resp2Frame> {
  match db.get(key).map(|e| &e.value) {
    Some(MockValue::Set(set)) => Ok(set.iter().map(|m| (m.clone(), 1.0)).collect()),
    _ => read_zset(db, key),
  }
}

fn range_by_score(
  zset: &BTreeMap<Bytes, f64>,
  min: (f64, bool),
  max: (f64, bool),
  rev: bool,
  limit: Option<(i64, i64)>,
) -> Vec<(Bytes, f64)> {
  let mut members: Vec<(Bytes, f64)> = sorted_members(zset)
    .into_iter()
    .filter(|(_, score)| in_score_range(*score, min, max))
    .collect();
  if rev {
    members.reverse();
  }
  if let Some((offset, count)) = limit {
    let count = if count < 0 { usize::MAX } else { count as usize };
    members = members.into_iter().skip(offset.max(0) as usize).take(count).collect();
  }
  members
}

fn sorted_sets(db: &mut MockDb, name: &str, args: &[Bytes]) -> Reply {
  let key = arg(args, 0)?;

  match name {
    "ZADD" => {
      let (mut nx, mut xx, mut gt, mut lt, mut ch, mut incr) = (false, false, false, false, false, false);
      let mut idx = 1;
      while idx < args.len() {
        match upper(&args[idx]).as_str() {
          "NX" => nx = true,
          "XX" => xx = true,
          "GT" => gt = true,
          "LT" => lt = true,
          "CH" => ch = true,
          "INCR" => incr = true,
          _ => break,
        }
        idx += 1;
      }
      let pairs = &args[idx ..];
      if pairs.is_empty() || pairs.len() % 2 != 0 || (nx && xx) || (gt && lt) || (nx && (gt || lt)) {
        return Err(syntax_error());
      }
      if incr && pairs.len() != 2 {
        return Err(err("ERR INCR option supports a single increment-element pair"));
      }
      let mut scores = Vec::with_capacity(pairs.len() / 2);
      for pair in pairs.chunks(2) {
        scores.push((parse_float(&pair[0])?, pair[1].clone()));
      }

      if xx && db.zset(key).map_err(err)?.is_none() {
        return Ok(if incr { null() } else { int(0) });
      }
      let zset = db.zset_or_create(key).map_err(err)?;
      let (mut added, mut changed, mut last) = (0, 0, None);
      for (score, member) in scores.into_iter() {
        let current = zset.get(&member).copied();
        if (nx && current.is_some()) || (xx && current.is_none()) {
          continue;
        }
        let next = match (incr, current) {
          (true, Some(current)) => current + score,
          _ => score,
        };
        if let Some(current) = current {
          if (gt && next <= current) || (lt && next >= current) {
            continue;
          }
          if next != current {
            changed += 1;
          }
        } else {
          added += 1;
        }
        zset.insert(member, next);
        last = Some(next);
      }
      db.remove_if_empty(key);

      Ok(if incr {
        last.map(float_bulk).unwrap_or_else(null)
      } else if ch {
        int(added + changed)
      } else {
        int(added)
      })
    },
    "ZCARD" => Ok(int(read_zset(db, key)?.len() as i64)),
    "ZCOUNT" => {
      let (min, max) = (parse_score_bound(arg(args, 1)?)?, parse_score_bound(arg(args, 2)?)?);
      Ok(int(
        read_zset(db, key)?
          .values()
          .filter(|score| in_score_range(**score, min, max))
          .count() as i64,
      ))
    },
    "ZINCRBY" => {
      let (delta, member) = (parse_float(arg(args, 1)?)?, arg(args, 2)?);
      let zset = db.zset_or_create(key).map_err(err)?;
      let score = zset.get(member).copied().unwrap_or(0.0) + delta;
      if score.is_nan() {
        return Err(err("ERR resulting score is not a number (NaN)"));
      }
      zset.insert(member.clone(), score);
      Ok(float_bulk(score))
    },
    "ZRANGE" | "ZREVRANGE" => {
      let (start, stop) = (arg(args, 1)?, arg(args, 2)?);
      let (mut by_score, mut rev, mut with_scores, mut limit) = (false, name == "ZREVRANGE", false, None);
      let mut idx = 3;
      while idx < args.len() {
        match upper(&args[idx]).as_str() {
          "BYSCORE" => by_score = true,
          "REV" => rev = true,
          "WITHSCORES" => with_scores = true,
          "LIMIT" => {
            limit = Some((parse_int(arg(args, idx + 1)?)?, parse_int(arg(args, idx + 2)?)?));
            idx += 2;
          },
          _ => return Err(syntax_error()),
        }
        idx += 1;
      }
      let zset = read_zset(db, key)?;

      let members = if by_score {
        let (min, max) = if rev { (stop, start) } else { (start, stop) };
        range_by_score(&zset, parse_score_bound(min)?, parse_score_bound(max)?, rev, limit)
      } else {
        let mut members = sorted_members(&zset);
        if rev {
          members.reverse();
        }
        match normalize_range(parse_int(start)?, parse_int(stop)?, members.len()) {
          Some((start, stop)) => members.drain(start ..= stop).collect(),
          None => Vec::new(),
        }
      };
      Ok(scored_frames(members, with_scores))
    },
    "ZRANGEBYSCORE" => {
      let (min, max) = (parse_score_bound(arg(args, 1)?)?, parse_score_bound(arg(args, 2)?)?);
      let (mut with_scores, mut limit) = (false, None);
      let mut idx = 3;
      while idx < args.len() {
        match upper(&args[idx]).as_str() {
          "WITHSCORES" => with_scores = true,
          "LIMIT" => {
            limit = Some((parse_int(arg(args, idx + 1)?)?, parse_int(arg(args, idx + 2)?)?));
            idx += 2;
          },
          _ => return Err(syntax_error()),
        }
        idx += 1;
      }
      let zset = read_zset(db, key)?;
      Ok(scored_frames(range_by_score(&zset, min, max, false, limit), with_scores))
    },
    "ZRANK" => {
      let member = arg(args, 1)?;
      Ok(
        sorted_members(&read_zset(db, key)?)
          .iter()
          .position(|(m, _)| m == member)
          .map(|idx| int(idx as i64))
          .unwrap_or_else(null),
      )
    },
    "ZSCORE" => {
      let member = arg(args, 1)?;
      Ok(read_zset(db, key)?.get(member).map(|s| float_bulk(*s)).unwrap_or_else(null))
    },
    "ZSCAN" => {
      let scan = ScanArgs::parse(&args[1 ..])?;
      let members = sorted_members(&read_zset(db, key)?);
      let (cursor, visited) = scan.window(&members);
      let items = visited
        .iter()
        .filter(|(member, _)| scan.matches(member))
        .flat_map(|(member, score)| [bulk(member.clone()), float_bulk(*score)])
        .collect();

      Ok(scan_reply(cursor, items))
    },
    "ZREM" => {
      min_args(name, args, 2)?;
      let removed = match db.zset(key).map_err(err)? {
        Some(zset) => args[1 ..].iter().filter(|m| zset.remove(*m).is_some()).count(),
        None => 0,
      };
      db.remove_if_empty(key);
      Ok(int(removed as i64))
    },
    "ZUNIONSTORE" | "ZINTERSTORE" => {
      let numkeys = parse_int(arg(args, 1)?)?;
      if numkeys <= 0 || args.len() < 2 + numkeys as usize {
        return Err(syntax_error());
      }
      let sources = &args[2 .. 2 + numkeys as usize];
      let mut weights = vec![1.0; sources.len()];
      let mut aggregate = String::from("SUM");
      let mut idx = 2 + numkeys as usize;
      while idx < args.len() {
        match upper(&args[idx]).as_str() {
          "WEIGHTS" => {
            for weight in weights.iter_mut() {
              idx += 1;
              *weight = parse_float(arg(args, idx)?)?;
            }
          },
          "AGGREGATE" => {
            idx += 1;
            aggregate = upper(arg(args, idx)?);
          },
          _ => return Err(syntax_error()),
        }
        idx += 1;
      }

      let combine = |a: f64, b: f64| match aggregate.as_str() {
        "MIN" => a.min(b),
        "MAX" => a.max(b),
        _ => a + b,
      };
      let mut result: Option<BTreeMap<Bytes, f64>> = None;
      for (source, weight) in sources.iter().zip(weights.into_iter()) {
        let weighted: BTreeMap<Bytes, f64> = read_weighted(db, source)?
          .into_iter()
          .map(|(m, s)| (m, s * weight))
          .collect();

        result = Some(match result {
          None => weighted,
          Some(mut acc) if name == "ZUNIONSTORE" => {
            for (member, score) in weighted.into_iter() {
              let next = match acc.get(&member) {
                Some(current) => combine(*current, score),
                None => score,
              };
              acc.insert(member, next);
            }
            acc
          },
          Some(acc) => acc
            .into_iter()
            .filter_map(|(member, score)| weighted.get(&member).map(|other| (member, combine(score, *other))))
            .collect(),
        });
      }

      let result = result.unwrap_or_default();
      let len = result.len();
      db.remove(key);
      if len > 0 {
        db.insert(key, Entry::new(MockValue::ZSet(result)));
      }
      Ok(int(len as i64))
    },
    _ => {
      // BZPOPMIN and BZPOPMAX
      min_args(name, args, 2)?;
      for key in args[.. args.len() - 1].iter() {
        let zset = match db.zset(key).map_err(err)? {
          Some(zset) => zset,
          None => continue,
        };
        let members = sorted_members(zset);
        let popped = if name == "BZPOPMIN" { members.first() } else { members.last() };
        if let Some((member, score)) = popped.cloned() {
          zset.remove(&member);
          db.remove_if_empty(key);
          return Ok(array(vec![bulk(key.clone()), bulk(member), float_bulk(score)]));
        }
      }
      Ok(null())
    },
  }
}

fn invalid_stream_id() -> Resp2Frame {
  err("ERR Invalid stream ID specified as stream command argument")
}

fn entry_frame(id: &StreamId, fields: &[(Bytes, Bytes)]) -> Resp2Frame {
  array(vec![
    bulk(id.to_bytes()),
    bulk_array(fields.iter().flat_map(|(f, v)| [f.clone(), v.clone()])),
  ])
}

/// Parse a range bound, where a `(` prefix makes the bound exclusive.
fn stream_bound(value: &[u8], default_seq: u64) -> Result<Bound<StreamId>, Resp2Frame> {
  match value.first() {
    Some(b'(') => Ok(Bound::Excluded(
      StreamId::parse(&value[1 ..], default_seq).ok_or_else(invalid_stream_id)?,
    )),
    _ => Ok(Bound::Included(
      StreamId::parse(value, default_seq).ok_or_else(invalid_stream_id)?,
    )),
  }
}

fn trim_stream(stream: &mut MockStream, strategy: &str, threshold: &[u8]) -> Result<usize, Resp2Frame> {
  let before = stream.entries.len();
  match strategy {
    "MAXLEN" => {
      let maxlen = parse_int(threshold)?.max(0) as usize;
      while stream.entries.len() > maxlen {
        let first = stream.entries.keys().next().copied();
        match first {
          Some(id) => stream.entries.remove(&id),
          None => break,
        };
      }
    },
    "MINID" => {
      let min = StreamId::parse(threshold, 0).ok_or_else(invalid_stream_id)?;
      stream.entries = stream.entries.split_off(&min);
    },
    _ => return Err(syntax_error()),
  }
  Ok(before - stream.entries.len())
}

/// Parse a trim strategy starting at `idx`, returning the strategy, threshold and the next index.
fn parse_trim<'a>(args: &'a [Bytes], idx: usize) -> Result<(String, &'a Bytes, usize), Resp2Frame> {
  let strategy = upper(arg(args, idx)?);
  let mut next = idx + 1;
  if matches!(&arg(args, next)?[..], b"=" | b"~") {
    next += 1;
  }
  let threshold = arg(args, next)?;
  next += 1;
  if args.get(next).map(|a| upper(a) == "LIMIT").unwrap_or(false) {
    next += 2;
  }
  Ok((strategy, threshold, next))
}

/// Split the arguments after `STREAMS` into keys and IDs.
fn stream_keys_and_ids(args: &[Bytes]) -> Result<(&[Bytes], &[Bytes]), Resp2Frame> {
  let idx = args
    .iter()
    .position(|a| upper(a) == "STREAMS")
    .ok_or_else(syntax_error)?;
  let rest = &args[idx + 1 ..];
  if rest.is_empty() || rest.len() % 2 != 0 {
    return Err(err(
      "ERR Unbalanced 'xread' list of streams: for each stream key an ID or '$' must be specified.",
    ));
  }
  Ok(rest.split_at(rest.len() / 2))
}

fn read_count(args: &[Bytes]) -> Result<usize, Resp2Frame> {
  match args.iter().position(|a| upper(a) == "COUNT") {
    Some(idx) => Ok(parse_int(arg(args, idx + 1)?)?.max(0) as usize),
    None => Ok(usize::MAX),
  }
}

fn next_stream_id(stream: &MockStream, requested: &[u8]) -> Result<StreamId, Resp2Frame> {
  if requested == b"*" {
    let ms = unix_ms().max(0) as u64;
    return Ok(if ms <= stream.last_id.ms {
      StreamId {
        ms:  stream.last_id.ms,
        seq: stream.last_id.seq + 1,
      }
    } else {
      StreamId { ms, seq: 0 }
    });
  }

  let id = StreamId::parse(requested, 0).ok_or_else(invalid_stream_id)?;
  if id == StreamId::default() {
    Err(err("ERR The ID specified in XADD must be greater than 0-0"))
  } else if id <= stream.last_id {
    Err(err(
      "ERR The ID specified in XADD is equal or smaller than the target stream top item",
    ))
  } else {
    Ok(id)
  }
}

fn streams(db: &mut MockDb, name: &str, args: &[Bytes]) -> Reply {
  match name {
    "XADD" => {
      let key = arg(args, 0)?;
      let (mut no_create, mut trim) = (false, None);
      let mut idx = 1;
      loop {
        match upper(arg(args, idx)?).as_str() {
          "NOMKSTREAM" => {
            no_create = true;
            idx += 1;
          },
          "MAXLEN" | "MINID" => {
            let (strategy, threshold, next) = parse_trim(args, idx)?;
            trim = Some((strategy, threshold.clone()));
            idx = next;
          },
          _ => break,
        }
      }
      let requested = arg(args, idx)?;
      let fields = &args[idx + 1 ..];
      if fields.is_empty() || fields.len() % 2 != 0 {
        return Err(err("ERR wrong number of arguments for 'xadd' command"));
      }
      if no_create && db.stream(key).map_err(err)?.is_none() {
        return Ok(null());
      }

      let stream = db.stream_or_create(key).map_err(err)?;
      let id = next_stream_id(stream, requested)?;
      let pairs = fields.chunks(2).map(|p| (p[0].clone(), p[1].clone())).collect();
      stream.entries.insert(id, pairs);
      stream.last_id = id;
      if let Some((strategy, threshold)) = trim {
        trim_stream(stream, &strategy, &threshold)?;
      }
      Ok(bulk(id.to_bytes()))
    },
    "XLEN" => Ok(int(
      db.stream(arg(args, 0)?).map_err(err)?.map(|s| s.entries.len()).unwrap_or(0) as i64,
    )),
    "XRANGE" | "XREVRANGE" => {
      let key = arg(args, 0)?;
      let (first, second) = (arg(args, 1)?, arg(args, 2)?);
      let (start, end) = if name == "XRANGE" { (first, second) } else { (second, first) };
      let (start, end) = (stream_bound(start, 0)?, stream_bound(end, u64::MAX)?);
      let count = read_count(&args[3 ..])?;
      let stream = match db.stream(key).map_err(err)? {
        Some(stream) => stream,
        None => return Ok(array(vec![])),
      };
      let empty = match (&start, &end) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => s >= e,
        _ => false,
      };
      if empty {
        return Ok(array(vec![]));
      }

      let range = stream.entries.range((start, end));
      let entries: Vec<Resp2Frame> = if name == "XRANGE" {
        range.take(count).map(|(id, f)| entry_frame(id, f)).collect()
      } else {
        range.rev().take(count).map(|(id, f)| entry_frame(id, f)).collect()
      };
      Ok(array(entries))
    },
    "XDEL" => {
      let key = arg(args, 0)?;
      min_args(name, args, 2)?;
      let mut ids = Vec::with_capacity(args.len() - 1);
      for id in args[1 ..].iter() {
        ids.push(StreamId::parse(id, 0).ok_or_else(invalid_stream_id)?);
      }
      let stream = match db.stream(key).map_err(err)? {
        Some(stream) => stream,
        None => return Ok(int(0)),
      };
      Ok(int(ids.iter().filter(|id| stream.entries.remove(*id).is_some()).count() as i64))
    },
    "XTRIM" => {
      let key = arg(args, 0)?;
      let (strategy, threshold, _) = parse_trim(args, 1)?;
      match db.stream(key).map_err(err)? {
        Some(stream) => Ok(int(trim_stream(stream, &strategy, threshold)? as i64)),
        None => Ok(int(0)),
      }
    },
    "XREAD" => {
      let count = read_count(args)?;
      let (keys, ids) = stream_keys_and_ids(args)?;
      let mut out = Vec::new();
      for (key, id) in keys.iter().zip(ids.iter()) {
        let stream = match db.stream(key).map_err(err)? {
          Some(stream) => stream,
          None => continue,
        };
        let after = if &id[..] == b"$" {
          stream.last_id
        } else {
          StreamId::parse(id, 0).ok_or_else(invalid_stream_id)?
        };
        let entries: Vec<Resp2Frame> = stream
          .entries
          .range((Bound::Excluded(after), Bound::Unbounded))
          .take(count)
          .map(|(id, f)| entry_frame(id, f))
          .collect();
        if !entries.is_empty() {
          out.push(array(vec![bulk(key.clone()), array(entries)]));
        }
      }
      Ok(if out.is_empty() { null() } else { array(out) })
    },
    "XGROUP CREATE" => {
      let (key, group, id) = (arg(args, 0)?, arg(args, 1)?, arg(args, 2)?);
      let create = args[3 ..].iter().any(|a| upper(a) == "MKSTREAM");
      if !create && db.stream(key).map_err(err)?.is_none() {
        return Err(err(
          "ERR The XGROUP subcommand requires the key to exist. Note that for CREATE you may want to use the MKSTREAM \
           option to create an empty stream automatically.",
        ));
      }
      let stream = db.stream_or_create(key).map_err(err)?;
      if stream.groups.contains_key(group) {
        return Err(err("BUSYGROUP Consumer Group name already exists"));
      }
      let last_delivered = if &id[..] == b"$" {
        stream.last_id
      } else {
        StreamId::parse(id, 0).ok_or_else(invalid_stream_id)?
      };
      stream.groups.insert(group.clone(), ConsumerGroup {
        last_delivered,
        pending: BTreeMap::new(),
      });
      Ok(ok())
    },
    "XGROUP DESTROY" => {
      let (key, group) = (arg(args, 0)?, arg(args, 1)?);
      Ok(int(
        db.stream(key)
          .map_err(err)?
          .map(|s| s.groups.remove(group).is_some())
          .unwrap_or(false) as i64,
      ))
    },
    "XREADGROUP" => {
      if upper(arg(args, 0)?) != "GROUP" {
        return Err(syntax_error());
      }
      let (group, consumer) = (arg(args, 1)?, arg(args, 2)?);
      let count = read_count(args)?;
      let no_ack = args.iter().any(|a| upper(a) == "NOACK");
      let (keys, ids) = stream_keys_and_ids(args)?;

      let mut out = Vec::new();
      for (key, id) in keys.iter().zip(ids.iter()) {
        let missing_group = || {
          err(format!(
            "NOGROUP No such key '{}' or consumer group '{}' in XREADGROUP with GROUP option",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(group)
          ))
        };
        let stream = db.stream(key).map_err(err)?.ok_or_else(missing_group)?;
        let entries = &stream.entries;
        let state = stream.groups.get_mut(group).ok_or_else(missing_group)?;

        if &id[..] == b">" {
          let delivered: Vec<(StreamId, Vec<(Bytes, Bytes)>)> = entries
            .range((Bound::Excluded(state.last_delivered), Bound::Unbounded))
            .take(count)
            .map(|(id, f)| (*id, f.clone()))
            .collect();
          if let Some((last, _)) = delivered.last() {
            state.last_delivered = *last;
          }
          if !no_ack {
            for (id, _) in delivered.iter() {
              state.pending.insert(*id, consumer.clone());
            }
          }
          if !delivered.is_empty() {
            let frames = delivered.iter().map(|(id, f)| entry_frame(id, f)).collect();
            out.push(array(vec![bulk(key.clone()), array(frames)]));
          }
        } else {
          let after = StreamId::parse(id, 0).ok_or_else(invalid_stream_id)?;
          let frames = state
            .pending
            .range((Bound::Excluded(after), Bound::Unbounded))
            .filter(|(_, owner)| *owner == consumer)
            .take(count)
            .filter_map(|(id, _)| entries.get(id).map(|f| entry_frame(id, f)))
            .collect();
          out.push(array(vec![bulk(key.clone()), array(frames)]));
        }
      }
      Ok(if out.is_empty() { null() } else { array(out) })
    },
    _ => {
      // XACK
      let (key, group) = (arg(args, 0)?, arg(args, 1)?);
      min_args(name, args, 3)?;
      let mut ids = Vec::with_capacity(args.len() - 2);
      for id in args[2 ..].iter() {
        ids.push(StreamId::parse(id, 0).ok_or_else(invalid_stream_id)?);
      }
      let state = match db.stream(key).map_err(err)?.and_then(|s| s.groups.get_mut(group)) {
        Some(state) => state,
        None => return Ok(int(0)),
      };
      Ok(int(ids.iter().filter(|id| state.pending.remove(*id).is_some()).count() as i64))
    },
  }
}

/// Replace `$` IDs in an `XREAD` command with the current last ID of each stream, so a blocking read only returns
/// entries added after the command arrived.
pub fn pin_stream_ids(db: &mut MockDb, parts: &mut [Bytes]) {
  if parts.first().map(|n| upper(n) != "XREAD").unwrap_or(true) {
    return;
  }
  let idx = match parts.iter().position(|a| upper(a) == "STREAMS") {
    Some(idx) => idx + 1,
    None => return,
  };
  let half = (parts.len() - idx) / 2;

  for offset in 0 .. half {
    let (key_idx, id_idx) = (idx + offset, idx + half + offset);
    if &parts[id_idx][..] != b"$" {
      continue;
    }
    let last = db
      .stream(&parts[key_idx])
      .ok()
      .flatten()
      .map(|s| s.last_id)
      .unwrap_or_default();
    parts[id_idx] = last.to_bytes();
  }
}

fn geo(db: &mut MockDb, name: &str, args: &[Bytes]) -> Reply {
  let key = arg(args, 0)?;

  match name {
    "GEOADD" => {
      let (mut nx, mut xx, mut ch) = (false, false, false);
      let mut idx = 1;
      while idx < args.len() {
        match upper(&args[idx]).as_str() {
          "NX" => nx = true,
          "XX" => xx = true,
          "CH" => ch = true,
          _ => break,
        }
        idx += 1;
      }
      let values = &args[idx ..];
      if values.is_empty() || values.len() % 3 != 0 || (nx && xx) {
        return Err(syntax_error());
      }
      let mut points = Vec::with_capacity(values.len() / 3);
      for chunk in values.chunks(3) {
        let (longitude, latitude) = (parse_float(&chunk[0])?, parse_float(&chunk[1])?);
        if !geo_valid(longitude, latitude) {
          return Err(err(format!(
            "ERR invalid longitude,latitude pair {:.6},{:.6}",
            longitude, latitude
          )));
        }
        points.push((geo_encode(longitude, latitude), chunk[2].clone()));
      }

      let zset = db.zset_or_create(key).map_err(err)?;
      let (mut added, mut changed) = (0, 0);
      for (score, member) in points.into_iter() {
        match zset.get(&member).copied() {
          Some(_) if nx => continue,
          None if xx => continue,
          Some(current) => {
            if current != score {
              changed += 1;
            }
          },
          None => added += 1,
        }
        zset.insert(member, score);
      }
      db.remove_if_empty(key);
      Ok(int(if ch { added + changed } else { added }))
    },
    "GEOPOS" => {
      let zset = read_zset(db, key)?;
      Ok(array(
        args[1 ..]
          .iter()
          .map(|member| match zset.get(member) {
            Some(score) => {
              let (longitude, latitude) = geo_decode(*score);
              bulk_array(vec![
                Bytes::from(longitude.to_string()),
                Bytes::from(latitude.to_string()),
              ])
            },
            None => null(),
          })
          .collect(),
      ))
    },
    "GEODIST" => {
      let (first, second) = (arg(args, 1)?, arg(args, 2)?);
      let unit = args.get(3).map(|u| String::from_utf8_lossy(u).to_string()).unwrap_or_else(|| "m".into());
      let zset = read_zset(db, key)?;
      let (first, second) = match (zset.get(first), zset.get(second)) {
        (Some(first), Some(second)) => (geo_decode(*first), geo_decode(*second)),
        _ => return Ok(null()),
      };
      let distance = geo_convert_distance(geo_distance(first, second), &unit)
        .ok_or_else(|| err("ERR unsupported unit provided. please use M, KM, FT, MI"))?;
      Ok(bulk(format!("{:.4}", distance)))
    },
    _ => {
      // GEOHASH
      let zset = read_zset(db, key)?;
      Ok(array(
        args[1 ..]
          .iter()
          .map(|member| match zset.get(member) {
            Some(score) => {
              let (longitude, latitude) = geo_decode(*score);
              bulk(geo_hash_string(longitude, latitude))
            },
            None => null(),
          })
          .collect(),
      ))
    },
  }
}
