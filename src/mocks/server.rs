use crate::{
  mocks::{
    collections,
    db::{dump_value, glob_match, restore_value, Entry, MockDb, MockValue},
  },
  protocol::utils as protocol_utils,
  types::{Message, Resp2Frame, Server, SlotRange, SLOT_COUNT},
};
use bytes::Bytes;
use bytes_utils::Str;
use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{sync::broadcast, time::Instant};

/// The result of running a command. Both sides are reply frames, the error side is returned early with `?`.
pub type Reply = Result<Resp2Frame, Resp2Frame>;

/// The number of databases on each node.
pub const DATABASES: usize = 16;

/// Commands whose first argument is a subcommand.
const CONTAINER_COMMANDS: &[&str] = &["CLUSTER", "CONFIG", "CLIENT", "SCRIPT", "PUBSUB", "XGROUP", "SENTINEL"];
/// Commands a sentinel node answers besides `SENTINEL` subcommands.
const SENTINEL_NODE_COMMANDS: &[&str] = &["AUTH", "PING", "QUIT", "CLIENT SETNAME", "CLIENT GETNAME", "CLIENT ID"];

/// One simulated server.
#[derive(Debug)]
pub struct MockNode {
  pub id:        String,
  pub server:    Server,
  pub slots:     Vec<SlotRange>,
  pub dbs:       Vec<MockDb>,
  pub config:    BTreeMap<String, String>,
  /// Slots being migrated away from the node, with the index of the importing node.
  pub migrating: BTreeMap<u16, usize>,
  pub clients:   usize,
  /// Whether the node is a sentinel rather than a data node.
  pub sentinel:  bool,
}

impl MockNode {
  pub fn new(idx: usize, server: Server, slots: Vec<SlotRange>) -> Self {
    let config = [
      ("maxmemory", "0"),
      ("maxmemory-policy", "noeviction"),
      ("timeout", "0"),
      ("databases", "16"),
      ("appendonly", "no"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    MockNode {
      id: format!("{:040x}", (idx as u128 + 1) * 0x1111_1111_1111),
      server,
      slots,
      config,
      dbs: vec![MockDb::default(); DATABASES],
      migrating: BTreeMap::new(),
      clients: 0,
      sentinel: false,
    }
  }
}

/// A connection subscribed to channels or patterns.
#[derive(Debug)]
pub struct Subscriber {
  pub tx:       broadcast::Sender<Message>,
  pub channels: BTreeSet<Bytes>,
  pub patterns: BTreeSet<Bytes>,
}

/// A primary monitored by the simulated sentinels.
#[derive(Clone, Debug)]
pub struct Monitored {
  pub primary:  Server,
  pub replicas: Vec<Server>,
  pub quorum:   i64,
}

/// Everything shared by the simulated servers.
#[derive(Debug)]
pub struct MockData {
  pub clustered:         bool,
  pub nodes:             Vec<MockNode>,
  pub scripts:           HashMap<String, Bytes>,
  pub subscribers:       HashMap<u64, Subscriber>,
  pub password:          Option<String>,
  pub sentinel_password: Option<String>,
  /// The primaries monitored by the sentinel nodes, by service name.
  pub monitored:         BTreeMap<String, Monitored>,
  pub last_save:         i64,
}

impl MockData {
  /// Read the password required by the node.
  pub fn password_for(&self, node: usize) -> Option<&String> {
    if self.nodes[node].sentinel {
      self.sentinel_password.as_ref()
    } else {
      self.password.as_ref()
    }
  }

  pub fn node_for_server(&self, server: &Server) -> Option<usize> {
    self.nodes.iter().position(|node| node.server == *server)
  }

  pub fn slot_owner(&self, slot: u16) -> Option<usize> {
    self
      .nodes
      .iter()
      .position(|node| node.slots.iter().any(|range| range.contains(slot)))
  }

  pub fn node_by_id(&self, id: &[u8]) -> Option<usize> {
    self.nodes.iter().position(|node| node.id.as_bytes() == id)
  }

  /// Move ownership of the slot to the provided node.
  pub fn assign_slot(&mut self, slot: u16, owner: usize) {
    for node in self.nodes.iter_mut() {
      remove_slot(&mut node.slots, slot);
      node.migrating.remove(&slot);
    }
    if let Some(node) = self.nodes.get_mut(owner) {
      add_slot(&mut node.slots, slot);
    }
  }
}

fn remove_slot(ranges: &mut Vec<SlotRange>, slot: u16) {
  let mut out = Vec::with_capacity(ranges.len() + 1);
  for range in ranges.drain(..) {
    if !range.contains(slot) {
      out.push(range);
      continue;
    }
    if range.start < slot {
      out.push(SlotRange::new(range.start, slot - 1));
    }
    if range.end > slot {
      out.push(SlotRange::new(slot + 1, range.end));
    }
  }
  *ranges = out;
}

fn add_slot(ranges: &mut Vec<SlotRange>, slot: u16) {
  if ranges.iter().any(|range| range.contains(slot)) {
    return;
  }
  ranges.push(SlotRange::new(slot, slot));
  ranges.sort();

  let mut merged: Vec<SlotRange> = Vec::with_capacity(ranges.len());
  for range in ranges.drain(..) {
    match merged.last_mut() {
      Some(last) if last.end + 1 >= range.start => last.end = last.end.max(range.end),
      _ => merged.push(range),
    }
  }
  *ranges = merged;
}

/// Per connection server state.
#[derive(Debug)]
pub struct Session {
  pub id:            u64,
  pub node:          usize,
  pub db:            usize,
  pub name:          Option<Bytes>,
  pub multi:         Option<Vec<Vec<Bytes>>>,
  pub multi_failed:  bool,
  pub watched:       Vec<(usize, Bytes, Option<MockValue>)>,
  pub asking:        bool,
  pub authenticated: bool,
  pub messages:      Option<broadcast::Sender<Message>>,
}

impl Session {
  pub fn new(id: u64, node: usize, messages: Option<broadcast::Sender<Message>>) -> Self {
    Session {
      id,
      node,
      messages,
      db: 0,
      name: None,
      multi: None,
      multi_failed: false,
      watched: Vec::new(),
      asking: false,
      authenticated: false,
    }
  }
}

pub fn err<S: Into<String>>(details: S) -> Resp2Frame {
  Resp2Frame::Error(Str::from(details.into()))
}

pub fn ok() -> Resp2Frame {
  protocol_utils::ok_frame()
}

pub fn status(value: &'static str) -> Resp2Frame {
  Resp2Frame::SimpleString(Bytes::from_static(value.as_bytes()))
}

pub fn int(value: i64) -> Resp2Frame {
  Resp2Frame::Integer(value)
}

pub fn bulk<B: Into<Bytes>>(value: B) -> Resp2Frame {
  Resp2Frame::BulkString(value.into())
}

pub fn null() -> Resp2Frame {
  Resp2Frame::Null
}

pub fn array(values: Vec<Resp2Frame>) -> Resp2Frame {
  Resp2Frame::Array(values)
}

pub fn bulk_array<I: IntoIterator<Item = Bytes>>(values: I) -> Resp2Frame {
  Resp2Frame::Array(values.into_iter().map(Resp2Frame::BulkString).collect())
}

pub fn format_float(value: f64) -> String {
  if value.is_infinite() {
    if value.is_sign_positive() {
      "inf".into()
    } else {
      "-inf".into()
    }
  } else {
    value.to_string()
  }
}

pub fn float_bulk(value: f64) -> Resp2Frame {
  bulk(format_float(value))
}

pub fn syntax_error() -> Resp2Frame {
  err("ERR syntax error")
}

pub fn upper(value: &[u8]) -> String {
  String::from_utf8_lossy(value).to_uppercase()
}

pub fn parse_int(value: &[u8]) -> Result<i64, Resp2Frame> {
  std::str::from_utf8(value)
    .ok()
    .and_then(|s| s.parse::<i64>().ok())
    .ok_or_else(|| err("ERR value is not an integer or out of range"))
}

pub fn parse_float(value: &[u8]) -> Result<f64, Resp2Frame> {
  let parsed = std::str::from_utf8(value).ok().and_then(|s| match s.to_lowercase().as_str() {
    "inf" | "+inf" => Some(f64::INFINITY),
    "-inf" => Some(f64::NEG_INFINITY),
    s => s.parse::<f64>().ok().filter(|f| !f.is_nan()),
  });

  parsed.ok_or_else(|| err("ERR value is not a valid float"))
}

pub fn arg<'a>(args: &'a [Bytes], idx: usize) -> Result<&'a Bytes, Resp2Frame> {
  args.get(idx).ok_or_else(syntax_error)
}

pub fn min_args(name: &str, args: &[Bytes], min: usize) -> Result<(), Resp2Frame> {
  if args.len() < min {
    Err(err(format!(
      "ERR wrong number of arguments for '{}' command",
      name.to_lowercase()
    )))
  } else {
    Ok(())
  }
}

/// Resolve an inclusive `start`/`stop` pair with negative offsets against a sequence length.
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
  let len = len as i64;
  let start = if start < 0 { (len + start).max(0) } else { start };
  let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

  if start > stop || start >= len || stop < 0 {
    None
  } else {
    Some((start as usize, stop as usize))
  }
}

pub fn unix_ms() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as i64)
    .unwrap_or(0)
}

pub fn db<'a>(data: &'a mut MockData, session: &Session) -> &'a mut MockDb {
  &mut data.nodes[session.node].dbs[session.db]
}

pub fn script_digest(script: &[u8]) -> String {
  use sha1::Digest;

  let mut hasher = sha1::Sha1::new();
  hasher.update(script);
  format!("{:x}", hasher.finalize())
}

/// Split the command parts into the command name, including any subcommand, and its arguments.
pub fn split_command(parts: &[Bytes]) -> (String, &[Bytes]) {
  let name = match parts.first() {
    Some(name) => upper(name),
    None => return (String::new(), parts),
  };

  if CONTAINER_COMMANDS.contains(&name.as_str()) && parts.len() > 1 {
    (format!("{} {}", name, upper(&parts[1])), &parts[2 ..])
  } else {
    (name, &parts[1 ..])
  }
}

/// Read how long a blocking command may wait, where `Some(None)` waits forever.
pub fn blocking_timeout(name: &str, args: &[Bytes]) -> Option<Option<Duration>> {
  match name {
    "BLPOP" | "BRPOP" | "BZPOPMIN" | "BZPOPMAX" | "BLMOVE" | "BRPOPLPUSH" => {
      let secs = args.last().and_then(|t| parse_float(t).ok())?;
      Some(if secs <= 0.0 {
        None
      } else {
        Some(Duration::from_secs_f64(secs))
      })
    },
    "XREAD" | "XREADGROUP" => {
      let idx = args.iter().position(|a| upper(a) == "BLOCK")?;
      let ms = args.get(idx + 1).and_then(|t| parse_int(t).ok())?;
      Some(if ms <= 0 {
        None
      } else {
        Some(Duration::from_millis(ms as u64))
      })
    },
    _ => None,
  }
}

/// The cursor and options of a `SCAN` family command.
pub struct ScanArgs {
  pub cursor:  usize,
  pub pattern: Option<Bytes>,
  pub count:   usize,
  pub kind:    Option<String>,
}

impl ScanArgs {
  /// Parse the cursor and the `MATCH`, `COUNT` and `TYPE` options that follow it.
  pub fn parse(args: &[Bytes]) -> Result<ScanArgs, Resp2Frame> {
    let cursor = std::str::from_utf8(arg(args, 0)?)
      .ok()
      .and_then(|cursor| cursor.parse::<usize>().ok())
      .ok_or_else(|| err("ERR invalid cursor"))?;
    let mut parsed = ScanArgs {
      cursor,
      pattern: None,
      count: 10,
      kind: None,
    };

    let mut idx = 1;
    while idx < args.len() {
      let value = args.get(idx + 1).ok_or_else(syntax_error)?;
      match upper(&args[idx]).as_str() {
        "MATCH" => parsed.pattern = Some(value.clone()),
        "COUNT" => {
          let count = parse_int(value)?;
          if count < 1 {
            return Err(syntax_error());
          }
          parsed.count = count as usize;
        },
        "TYPE" => parsed.kind = Some(String::from_utf8_lossy(value).to_lowercase()),
        _ => return Err(syntax_error()),
      }
      idx += 2;
    }

    Ok(parsed)
  }

  pub fn matches(&self, value: &[u8]) -> bool {
    self.pattern.as_ref().map(|p| glob_match(p, value)).unwrap_or(true)
  }

  /// Read the items visited by this call and the cursor that continues after them.
  pub fn window<'a, T>(&self, items: &'a [T]) -> (usize, &'a [T]) {
    let start = self.cursor.min(items.len());
    let end = start.saturating_add(self.count).min(items.len());
    let next = if end >= items.len() { 0 } else { end };

    (next, &items[start .. end])
  }
}

/// Build a `[cursor, [items...]]` reply.
pub fn scan_reply(cursor: usize, items: Vec<Resp2Frame>) -> Resp2Frame {
  array(vec![bulk(cursor.to_string()), array(items)])
}

/// Check that the keys hash to one slot served by the session's node.
pub fn check_slots(data: &mut MockData, session: &Session, keys: &[&[u8]]) -> Option<Resp2Frame> {
  if !data.clustered || keys.is_empty() {
    return None;
  }

  let slot = redis_protocol::redis_keyslot(keys[0]);
  if keys.iter().any(|key| redis_protocol::redis_keyslot(key) != slot) {
    return Some(err("CROSSSLOT Keys in request don't hash to the same slot"));
  }
  let owner = match data.slot_owner(slot) {
    Some(owner) => owner,
    None => return Some(err("CLUSTERDOWN Hash slot not served")),
  };

  if owner == session.node {
    let target = data.nodes[owner].migrating.get(&slot).copied();
    if let Some(target) = target {
      let db = &mut data.nodes[owner].dbs[session.db];
      if keys.iter().any(|key| !db.contains(key)) {
        return Some(err(format!("ASK {} {}", slot, data.nodes[target].server)));
      }
    }
    None
  } else if session.asking && data.nodes[owner].migrating.get(&slot) == Some(&session.node) {
    None
  } else {
    Some(err(format!("MOVED {} {}", slot, data.nodes[owner].server)))
  }
}

/// Run one command against the simulated server.
pub fn execute(data: &mut MockData, session: &mut Session, parts: &[Bytes]) -> Resp2Frame {
  let (name, args) = split_command(parts);

  if data.password_for(session.node).is_some() && !session.authenticated && name != "AUTH" {
    return err("NOAUTH Authentication required.");
  }
  if session.multi.is_some() && !matches!(name.as_str(), "EXEC" | "DISCARD" | "MULTI" | "WATCH") {
    if let Some(ref mut queue) = session.multi {
      queue.push(parts.to_vec());
    }
    return protocol_utils::queued_frame();
  }

  run(data, session, &name, args).unwrap_or_else(|e| e)
}

fn run(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  if data.nodes[session.node].sentinel && !name.starts_with("SENTINEL") && !SENTINEL_NODE_COMMANDS.contains(&name) {
    return Err(err(format!("ERR unknown command '{}'", name.to_lowercase())));
  }

  match name {
    "MULTI" | "EXEC" | "DISCARD" | "WATCH" | "UNWATCH" => transaction(data, session, name, args),
    "AUTH" | "PING" | "ECHO" | "SELECT" | "QUIT" | "CLIENT SETNAME" | "CLIENT GETNAME" | "CLIENT ID" | "INFO"
    | "DBSIZE" | "FLUSHDB" | "FLUSHALL" | "TIME" | "LASTSAVE" | "SAVE" | "BGSAVE" | "CONFIG GET" | "CONFIG SET"
    | "CONFIG RESETSTAT" => server(data, session, name, args),
    "DEL" | "UNLINK" | "EXISTS" | "TOUCH" | "EXPIRE" | "PEXPIRE" | "EXPIREAT" | "PEXPIREAT" | "PERSIST" | "TTL"
    | "PTTL" | "TYPE" | "RENAME" | "RENAMENX" | "DUMP" | "RESTORE" | "MOVE" | "COPY" | "KEYS" | "RANDOMKEY"
    | "SORT" | "SCAN" => keys(data, session, name, args),
    "GET" | "SET" | "SETNX" | "SETEX" | "PSETEX" | "GETSET" | "GETDEL" | "GETRANGE" | "SETRANGE" | "APPEND"
    | "STRLEN" | "INCR" | "INCRBY" | "DECR" | "DECRBY" | "INCRBYFLOAT" | "MGET" | "MSET" | "MSETNX" => {
      strings(data, session, name, args)
    },
    "SUBSCRIBE" | "PSUBSCRIBE" | "UNSUBSCRIBE" | "PUNSUBSCRIBE" | "PUBLISH" | "PUBSUB CHANNELS"
    | "PUBSUB NUMSUB" | "PUBSUB NUMPAT" => pubsub(data, session, name, args),
    "EVAL" | "EVALSHA" | "SCRIPT LOAD" | "SCRIPT EXISTS" | "SCRIPT FLUSH" | "SCRIPT KILL" => {
      scripts(data, name, args)
    },
    "ASKING" => {
      session.asking = true;
      Ok(ok())
    },
    _ if name.starts_with("CLUSTER") => cluster(data, session, name, args),
    _ if name.starts_with("SENTINEL") => sentinel(data, session, name, args),
    _ => collections::run(data, session, name, args),
  }
}

fn transaction(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  match name {
    "MULTI" => {
      if session.multi.is_some() {
        return Err(err("ERR MULTI calls can not be nested"));
      }
      session.multi = Some(Vec::new());
      session.multi_failed = false;
      Ok(ok())
    },
    "EXEC" => {
      let queue = session.multi.take().ok_or_else(|| err("ERR EXEC without MULTI"))?;
      let watched: Vec<_> = session.watched.drain(..).collect();
      if session.multi_failed {
        session.multi_failed = false;
        return Err(err("EXECABORT Transaction discarded because of previous errors."));
      }

      let node = session.node;
      let modified = watched
        .into_iter()
        .any(|(idx, key, snapshot)| data.nodes[node].dbs[idx].snapshot(&key) != snapshot);
      if modified {
        return Ok(null());
      }

      let results = queue
        .iter()
        .map(|parts| execute(data, session, parts))
        .collect();
      Ok(array(results))
    },
    "DISCARD" => {
      if session.multi.take().is_none() {
        return Err(err("ERR DISCARD without MULTI"));
      }
      session.watched.clear();
      session.multi_failed = false;
      Ok(ok())
    },
    "WATCH" => {
      if session.multi.is_some() {
        return Err(err("ERR WATCH inside MULTI is not allowed"));
      }
      min_args(name, args, 1)?;
      for key in args.iter() {
        let snapshot = db(data, session).snapshot(key);
        session.watched.push((session.db, key.clone(), snapshot));
      }
      Ok(ok())
    },
    _ => {
      session.watched.clear();
      Ok(ok())
    },
  }
}

fn info(data: &mut MockData, session: &Session, section: Option<String>) -> String {
  let node = &mut data.nodes[session.node];
  let mode = if data.clustered { "cluster" } else { "standalone" };
  let mut sections = vec![
    (
      "server",
      format!(
        "# Server\r\nredis_version:7.2.0\r\nredis_mode:{}\r\ntcp_port:{}\r\nrun_id:{}\r\n",
        mode, node.server.port, node.id
      ),
    ),
    (
      "clients",
      format!("# Clients\r\nconnected_clients:{}\r\n", node.clients),
    ),
    (
      "persistence",
      format!("# Persistence\r\nrdb_last_save_time:{}\r\n", data.last_save),
    ),
  ];

  let mut keyspace = String::from("# Keyspace\r\n");
  for (idx, db) in node.dbs.iter_mut().enumerate() {
    let len = db.len();
    if len > 0 {
      keyspace.push_str(&format!("db{}:keys={},expires=0,avg_ttl=0\r\n", idx, len));
    }
  }
  sections.push(("keyspace", keyspace));

  let section = section.map(|s| s.to_lowercase());
  sections
    .into_iter()
    .filter(|(name, _)| match section.as_deref() {
      None | Some("default") | Some("all") | Some("everything") => true,
      Some(section) => section == *name,
    })
    .map(|(_, text)| text)
    .collect::<Vec<_>>()
    .join("\r\n")
}

fn server(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  match name {
    "AUTH" => {
      min_args(name, args, 1)?;
      let password = String::from_utf8_lossy(&args[args.len() - 1]).to_string();
      match data.password_for(session.node) {
        Some(expected) if *expected == password => {
          session.authenticated = true;
          Ok(ok())
        },
        Some(_) => Err(err(
          "WRONGPASS invalid username-password pair or user is disabled.",
        )),
        None => Err(err(
          "ERR AUTH <password> called without any password configured for the default user.",
        )),
      }
    },
    "PING" => Ok(match args.first() {
      Some(message) => bulk(message.clone()),
      None => status("PONG"),
    }),
    "ECHO" => Ok(bulk(arg(args, 0)?.clone())),
    "SELECT" => {
      let idx = parse_int(arg(args, 0)?)?;
      if data.clustered && idx != 0 {
        return Err(err("ERR SELECT is not allowed in cluster mode"));
      }
      if idx < 0 || idx as usize >= DATABASES {
        return Err(err("ERR DB index is out of range"));
      }
      session.db = idx as usize;
      Ok(ok())
    },
    "QUIT" => Ok(ok()),
    "CLIENT SETNAME" => {
      session.name = Some(arg(args, 0)?.clone());
      Ok(ok())
    },
    "CLIENT GETNAME" => Ok(session.name.clone().map(bulk).unwrap_or_else(null)),
    "CLIENT ID" => Ok(int(session.id as i64)),
    "INFO" => {
      let section = args.first().map(|s| String::from_utf8_lossy(s).to_string());
      Ok(bulk(info(data, session, section)))
    },
    "DBSIZE" => Ok(int(db(data, session).len() as i64)),
    "FLUSHDB" => {
      db(data, session).clear();
      Ok(ok())
    },
    "FLUSHALL" => {
      data.nodes[session.node].dbs.iter_mut().for_each(|db| db.clear());
      Ok(ok())
    },
    "TIME" => {
      let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or(0);
      Ok(bulk_array(vec![
        Bytes::from((micros / 1_000_000).to_string()),
        Bytes::from((micros % 1_000_000).to_string()),
      ]))
    },
    "LASTSAVE" => Ok(int(data.last_save)),
    "SAVE" => {
      data.last_save = unix_ms() / 1000;
      Ok(ok())
    },
    "BGSAVE" => {
      data.last_save = unix_ms() / 1000;
      Ok(status("Background saving started"))
    },
    "CONFIG GET" => {
      let pattern = arg(args, 0)?;
      let config = &data.nodes[session.node].config;
      let mut out = Vec::new();
      for (key, value) in config.iter() {
        if glob_match(pattern, key.as_bytes()) {
          out.push(Bytes::from(key.clone()));
          out.push(Bytes::from(value.clone()));
        }
      }
      Ok(bulk_array(out))
    },
    "CONFIG SET" => {
      if args.len() < 2 || args.len() % 2 != 0 {
        return Err(syntax_error());
      }
      let config = &mut data.nodes[session.node].config;
      for pair in args.chunks(2) {
        config.insert(
          String::from_utf8_lossy(&pair[0]).to_lowercase(),
          String::from_utf8_lossy(&pair[1]).to_string(),
        );
      }
      Ok(ok())
    },
    _ => Ok(ok()),
  }
}

fn deadline_from_ms(ms: i64) -> Option<Instant> {
  if ms <= 0 {
    None
  } else {
    Some(Instant::now() + Duration::from_millis(ms as u64))
  }
}

/// Set a relative TTL, deleting the key if the TTL is not positive. Returns whether the key existed.
fn set_ttl(db: &mut MockDb, key: &[u8], ms: i64) -> bool {
  if !db.contains(key) {
    return false;
  }
  if ms <= 0 {
    db.remove(key);
  } else if let Some(entry) = db.get_mut(key) {
    entry.expires_at = deadline_from_ms(ms);
  }
  true
}

fn remaining_ms(entry: &Entry) -> Option<i64> {
  entry
    .expires_at
    .map(|at| at.saturating_duration_since(Instant::now()).as_millis() as i64)
}

fn sort_values(data: &mut MockData, session: &Session, args: &[Bytes]) -> Reply {
  let key = arg(args, 0)?;
  let (mut by, mut limit, mut gets, mut desc, mut alpha, mut store) = (None, None, Vec::new(), false, false, None);
  let mut idx = 1;
  while idx < args.len() {
    match upper(&args[idx]).as_str() {
      "BY" => {
        by = Some(arg(args, idx + 1)?.clone());
        idx += 2;
      },
      "LIMIT" => {
        limit = Some((parse_int(arg(args, idx + 1)?)?, parse_int(arg(args, idx + 2)?)?));
        idx += 3;
      },
      "GET" => {
        gets.push(arg(args, idx + 1)?.clone());
        idx += 2;
      },
      "ASC" => idx += 1,
      "DESC" => {
        desc = true;
        idx += 1;
      },
      "ALPHA" => {
        alpha = true;
        idx += 1;
      },
      "STORE" => {
        store = Some(arg(args, idx + 1)?.clone());
        idx += 2;
      },
      _ => return Err(syntax_error()),
    }
  }

  let db = db(data, session);
  let mut values: Vec<Bytes> = match db.get(key).map(|e| &e.value) {
    None => Vec::new(),
    Some(MockValue::List(l)) => l.iter().cloned().collect(),
    Some(MockValue::Set(s)) => s.iter().cloned().collect(),
    Some(MockValue::ZSet(z)) => collections::sorted_members(z).into_iter().map(|(m, _)| m).collect(),
    Some(_) => return Err(err(crate::mocks::db::WRONG_TYPE)),
  };
  let substitute = |pattern: &Bytes, value: &Bytes| -> Bytes {
    let pattern = String::from_utf8_lossy(pattern);
    Bytes::from(pattern.replacen('*', &String::from_utf8_lossy(value), 1))
  };

  let skip_sort = by.as_ref().map(|b| !b.contains(&b'*')).unwrap_or(false);
  if !skip_sort {
    let mut weighted = Vec::with_capacity(values.len());
    for value in values.into_iter() {
      let weight = match by {
        Some(ref pattern) => db.string(&substitute(pattern, &value)).ok().flatten().cloned(),
        None => Some(value.clone()),
      };
      weighted.push((weight, value));
    }

    if alpha {
      weighted.sort_by(|a, b| a.0.cmp(&b.0));
    } else {
      let mut numeric = Vec::with_capacity(weighted.len());
      for (weight, value) in weighted.into_iter() {
        let score = match weight {
          Some(ref w) => parse_float(w).map_err(|_| err("ERR One or more scores can't be converted into double"))?,
          None => 0.0,
        };
        numeric.push((score, value));
      }
      numeric.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
      weighted = numeric.into_iter().map(|(_, v)| (None, v)).collect();
    }
    values = weighted.into_iter().map(|(_, v)| v).collect();
    if desc {
      values.reverse();
    }
  }

  if let Some((offset, count)) = limit {
    let offset = offset.max(0) as usize;
    let count = if count < 0 { values.len() } else { count as usize };
    values = values.into_iter().skip(offset).take(count).collect();
  }

  let output: Vec<Option<Bytes>> = if gets.is_empty() {
    values.into_iter().map(Some).collect()
  } else {
    let mut out = Vec::with_capacity(values.len() * gets.len());
    for value in values.iter() {
      for pattern in gets.iter() {
        if &pattern[..] == b"#" {
          out.push(Some(value.clone()));
        } else {
          out.push(db.string(&substitute(pattern, value)).ok().flatten().cloned());
        }
      }
    }
    out
  };

  match store {
    Some(destination) => {
      let len = output.len();
      db.remove(&destination);
      if len > 0 {
        let list = output.into_iter().map(|v| v.unwrap_or_default()).collect();
        db.insert(&destination, Entry::new(MockValue::List(list)));
      }
      Ok(int(len as i64))
    },
    None => Ok(array(
      output
        .into_iter()
        .map(|v| v.map(bulk).unwrap_or_else(null))
        .collect(),
    )),
  }
}

fn keys(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  match name {
    "DEL" | "UNLINK" => {
      min_args(name, args, 1)?;
      let db = db(data, session);
      Ok(int(args.iter().filter(|key| db.remove(key).is_some()).count() as i64))
    },
    "EXISTS" | "TOUCH" => {
      min_args(name, args, 1)?;
      let db = db(data, session);
      Ok(int(args.iter().filter(|key| db.contains(key)).count() as i64))
    },
    "EXPIRE" | "PEXPIRE" => {
      let (key, value) = (arg(args, 0)?, parse_int(arg(args, 1)?)?);
      let ms = if name == "EXPIRE" { value.saturating_mul(1000) } else { value };
      Ok(int(set_ttl(db(data, session), key, ms) as i64))
    },
    "EXPIREAT" | "PEXPIREAT" => {
      let (key, value) = (arg(args, 0)?, parse_int(arg(args, 1)?)?);
      let at = if name == "EXPIREAT" { value.saturating_mul(1000) } else { value };
      Ok(int(set_ttl(db(data, session), key, at - unix_ms()) as i64))
    },
    "PERSIST" => {
      let key = arg(args, 0)?;
      match db(data, session).get_mut(key) {
        Some(entry) if entry.expires_at.is_some() => {
          entry.expires_at = None;
          Ok(int(1))
        },
        _ => Ok(int(0)),
      }
    },
    "TTL" | "PTTL" => {
      let key = arg(args, 0)?;
      let remaining = match db(data, session).get(key) {
        None => return Ok(int(-2)),
        Some(entry) => match remaining_ms(entry) {
          Some(ms) => ms,
          None => return Ok(int(-1)),
        },
      };
      Ok(int(if name == "TTL" { (remaining + 500) / 1000 } else { remaining }))
    },
    "TYPE" => {
      let key = arg(args, 0)?;
      Ok(match db(data, session).get(key) {
        Some(entry) => status(entry.value.type_name()),
        None => status("none"),
      })
    },
    "RENAME" | "RENAMENX" => {
      let (source, destination) = (arg(args, 0)?, arg(args, 1)?);
      let db = db(data, session);
      if !db.contains(source) {
        return Err(err("ERR no such key"));
      }
      if name == "RENAMENX" && db.contains(destination) {
        return Ok(int(0));
      }
      if let Some(entry) = db.remove(source) {
        db.insert(destination, entry);
      }
      Ok(if name == "RENAME" { ok() } else { int(1) })
    },
    "DUMP" => {
      let key = arg(args, 0)?;
      match db(data, session).get(key) {
        Some(entry) => dump_value(&entry.value)
          .map(bulk)
          .ok_or_else(|| err("ERR DUMP is not supported for this type")),
        None => Ok(null()),
      }
    },
    "RESTORE" => {
      let (key, ttl, payload) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, arg(args, 2)?);
      let flags: Vec<String> = args[3 ..].iter().map(|a| upper(a)).collect();
      let (replace, absolute) = (
        flags.iter().any(|f| f == "REPLACE"),
        flags.iter().any(|f| f == "ABSTTL"),
      );
      let value =
        restore_value(payload).ok_or_else(|| err("ERR DUMP payload version or checksum are wrong"))?;
      let db = db(data, session);
      if db.contains(key) && !replace {
        return Err(err("BUSYKEY Target key name already exists."));
      }

      let ms = if absolute && ttl > 0 { ttl - unix_ms() } else { ttl };
      if absolute && ttl > 0 && ms <= 0 {
        db.remove(key);
        return Ok(ok());
      }
      db.insert(key, Entry {
        value,
        expires_at: deadline_from_ms(ms),
      });
      Ok(ok())
    },
    "MOVE" => {
      if data.clustered {
        return Err(err("ERR MOVE is not allowed in cluster mode"));
      }
      let (key, target) = (arg(args, 0)?, parse_int(arg(args, 1)?)?);
      if target < 0 || target as usize >= DATABASES {
        return Err(err("ERR DB index is out of range"));
      }
      if target as usize == session.db {
        return Err(err("ERR source and destination objects are the same"));
      }
      let node = &mut data.nodes[session.node];
      if node.dbs[target as usize].contains(key) {
        return Ok(int(0));
      }
      match node.dbs[session.db].remove(key) {
        Some(entry) => {
          node.dbs[target as usize].insert(key, entry);
          Ok(int(1))
        },
        None => Ok(int(0)),
      }
    },
    "COPY" => {
      let (source, destination) = (arg(args, 0)?, arg(args, 1)?);
      let mut target_db = session.db;
      let mut replace = false;
      let mut idx = 2;
      while idx < args.len() {
        match upper(&args[idx]).as_str() {
          "DB" => {
            target_db = parse_int(arg(args, idx + 1)?)? as usize;
            idx += 2;
          },
          "REPLACE" => {
            replace = true;
            idx += 1;
          },
          _ => return Err(syntax_error()),
        }
      }
      if target_db >= DATABASES {
        return Err(err("ERR DB index is out of range"));
      }

      let node = &mut data.nodes[session.node];
      let entry = match node.dbs[session.db].get(source) {
        Some(entry) => entry.clone(),
        None => return Ok(int(0)),
      };
      if node.dbs[target_db].contains(destination) && !replace {
        return Ok(int(0));
      }
      node.dbs[target_db].insert(destination, entry);
      Ok(int(1))
    },
    "KEYS" => {
      let pattern = arg(args, 0)?;
      let keys = db(data, session).keys();
      Ok(bulk_array(keys.into_iter().filter(|key| glob_match(pattern, key))))
    },
    "SCAN" => {
      let scan = ScanArgs::parse(args)?;
      let db = db(data, session);
      let keys = db.keys();
      let (cursor, page) = scan.window(&keys);

      let mut found = Vec::new();
      for key in page.iter().filter(|key| scan.matches(key)) {
        let kind = db.get(key).map(|entry| entry.value.type_name());
        if scan.kind.as_deref().map(|expected| kind == Some(expected)).unwrap_or(true) {
          found.push(bulk(key.clone()));
        }
      }
      Ok(scan_reply(cursor, found))
    },
    "RANDOMKEY" => {
      let keys = db(data, session).keys();
      Ok(match keys.len() {
        0 => null(),
        len => bulk(keys[rand::random::<usize>() % len].clone()),
      })
    },
    _ => sort_values(data, session, args),
  }
}

fn string_value(db: &mut MockDb, key: &[u8]) -> Result<Option<Bytes>, Resp2Frame> {
  db.string(key).map(|v| v.cloned()).map_err(err)
}

fn incr_by(db: &mut MockDb, key: &[u8], delta: i64) -> Reply {
  let current = match string_value(db, key)? {
    Some(value) => parse_int(&value)?,
    None => 0,
  };
  let next = current
    .checked_add(delta)
    .ok_or_else(|| err("ERR increment or decrement would overflow"))?;

  let expires_at = db.get(key).and_then(|e| e.expires_at);
  db.insert(key, Entry {
    value: MockValue::String(next.to_string().into()),
    expires_at,
  });
  Ok(int(next))
}

fn strings(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  let db = db(data, session);

  match name {
    "GET" => Ok(string_value(db, arg(args, 0)?)?.map(bulk).unwrap_or_else(null)),
    "SET" => {
      let (key, value) = (arg(args, 0)?, arg(args, 1)?);
      let (mut nx, mut xx, mut get, mut keep_ttl, mut expires_at) = (false, false, false, false, None);
      let mut idx = 2;
      while idx < args.len() {
        match upper(&args[idx]).as_str() {
          "NX" => nx = true,
          "XX" => xx = true,
          "GET" => get = true,
          "KEEPTTL" => keep_ttl = true,
          option @ ("EX" | "PX" | "EXAT" | "PXAT") => {
            let amount = parse_int(arg(args, idx + 1)?)?;
            if amount <= 0 && (option == "EX" || option == "PX") {
              return Err(err("ERR invalid expire time in 'set' command"));
            }
            let ms = match option {
              "EX" => amount * 1000,
              "PX" => amount,
              "EXAT" => amount * 1000 - unix_ms(),
              _ => amount - unix_ms(),
            };
            expires_at = Some(Instant::now() + Duration::from_millis(ms.max(0) as u64));
            idx += 1;
          },
          _ => return Err(syntax_error()),
        }
        idx += 1;
      }
      if nx && xx {
        return Err(syntax_error());
      }

      let previous = if get { string_value(db, key)? } else { None };
      let exists = db.contains(key);
      if (nx && exists) || (xx && !exists) {
        return Ok(if get { previous.map(bulk).unwrap_or_else(null) } else { null() });
      }
      if keep_ttl {
        expires_at = db.get(key).and_then(|e| e.expires_at);
      }
      db.insert(key, Entry {
        value: MockValue::String(value.clone()),
        expires_at,
      });

      Ok(if get { previous.map(bulk).unwrap_or_else(null) } else { ok() })
    },
    "SETNX" => {
      let (key, value) = (arg(args, 0)?, arg(args, 1)?);
      if db.contains(key) {
        Ok(int(0))
      } else {
        db.set_string(key, value.clone());
        Ok(int(1))
      }
    },
    "SETEX" | "PSETEX" => {
      let (key, amount, value) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, arg(args, 2)?);
      if amount <= 0 {
        return Err(err(format!(
          "ERR invalid expire time in '{}' command",
          name.to_lowercase()
        )));
      }
      let ms = if name == "SETEX" { amount * 1000 } else { amount };
      db.insert(key, Entry {
        value:      MockValue::String(value.clone()),
        expires_at: deadline_from_ms(ms),
      });
      Ok(ok())
    },
    "GETSET" => {
      let (key, value) = (arg(args, 0)?, arg(args, 1)?);
      let previous = string_value(db, key)?;
      db.set_string(key, value.clone());
      Ok(previous.map(bulk).unwrap_or_else(null))
    },
    "GETDEL" => {
      let key = arg(args, 0)?;
      let previous = string_value(db, key)?;
      db.remove(key);
      Ok(previous.map(bulk).unwrap_or_else(null))
    },
    "GETRANGE" => {
      let (key, start, end) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, parse_int(arg(args, 2)?)?);
      let value = string_value(db, key)?.unwrap_or_default();
      Ok(match normalize_range(start, end, value.len()) {
        Some((start, end)) => bulk(value.slice(start ..= end)),
        None => bulk(Bytes::new()),
      })
    },
    "SETRANGE" => {
      let (key, offset, value) = (arg(args, 0)?, parse_int(arg(args, 1)?)?, arg(args, 2)?);
      if offset < 0 {
        return Err(err("ERR offset is out of range"));
      }
      let mut current = string_value(db, key)?.map(|b| b.to_vec()).unwrap_or_default();
      let end = offset as usize + value.len();
      if current.len() < end {
        current.resize(end, 0);
      }
      current[offset as usize .. end].copy_from_slice(value);
      let len = current.len();
      db.set_string(key, current.into());
      Ok(int(len as i64))
    },
    "APPEND" => {
      let (key, value) = (arg(args, 0)?, arg(args, 1)?);
      let mut current = string_value(db, key)?.map(|b| b.to_vec()).unwrap_or_default();
      current.extend_from_slice(value);
      let len = current.len();
      let expires_at = db.get(key).and_then(|e| e.expires_at);
      db.insert(key, Entry {
        value: MockValue::String(current.into()),
        expires_at,
      });
      Ok(int(len as i64))
    },
    "STRLEN" => Ok(int(
      string_value(db, arg(args, 0)?)?.map(|v| v.len()).unwrap_or(0) as i64,
    )),
    "INCR" => incr_by(db, arg(args, 0)?, 1),
    "DECR" => incr_by(db, arg(args, 0)?, -1),
    "INCRBY" => incr_by(db, arg(args, 0)?, parse_int(arg(args, 1)?)?),
    "DECRBY" => incr_by(db, arg(args, 0)?, -parse_int(arg(args, 1)?)?),
    "INCRBYFLOAT" => {
      let (key, delta) = (arg(args, 0)?, parse_float(arg(args, 1)?)?);
      let current = match string_value(db, key)? {
        Some(value) => parse_float(&value)?,
        None => 0.0,
      };
      let next = current + delta;
      if next.is_infinite() {
        return Err(err("ERR increment would produce NaN or Infinity"));
      }
      let expires_at = db.get(key).and_then(|e| e.expires_at);
      db.insert(key, Entry {
        value: MockValue::String(format_float(next).into()),
        expires_at,
      });
      Ok(float_bulk(next))
    },
    "MGET" => {
      min_args(name, args, 1)?;
      // MGET reads nil for keys holding other types
      Ok(array(
        args
          .iter()
          .map(|key| db.string(key).ok().flatten().cloned().map(bulk).unwrap_or_else(null))
          .collect(),
      ))
    },
    "MSET" | "MSETNX" => {
      if args.is_empty() || args.len() % 2 != 0 {
        return Err(err(format!(
          "ERR wrong number of arguments for '{}' command",
          name.to_lowercase()
        )));
      }
      if name == "MSETNX" && args.chunks(2).any(|pair| db.contains(&pair[0])) {
        return Ok(int(0));
      }
      for pair in args.chunks(2) {
        db.set_string(&pair[0], pair[1].clone());
      }
      Ok(if name == "MSET" { ok() } else { int(1) })
    },
    _ => Err(err(format!("ERR unknown command '{}'", name))),
  }
}

fn subscription_frame(kind: &'static str, channel: Option<Bytes>, count: usize) -> Resp2Frame {
  array(vec![
    bulk(kind),
    channel.map(bulk).unwrap_or_else(null),
    int(count as i64),
  ])
}

fn pubsub(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  match name {
    "SUBSCRIBE" | "PSUBSCRIBE" => {
      min_args(name, args, 1)?;
      let tx = session
        .messages
        .clone()
        .ok_or_else(|| err("ERR the connection does not receive pubsub messages"))?;
      let subscriber = data.subscribers.entry(session.id).or_insert_with(|| Subscriber {
        tx,
        channels: BTreeSet::new(),
        patterns: BTreeSet::new(),
      });

      let mut frames = Vec::with_capacity(args.len());
      for channel in args.iter() {
        if name == "SUBSCRIBE" {
          subscriber.channels.insert(channel.clone());
        } else {
          subscriber.patterns.insert(channel.clone());
        }
        let count = subscriber.channels.len() + subscriber.patterns.len();
        let kind = if name == "SUBSCRIBE" { "subscribe" } else { "psubscribe" };
        frames.push(subscription_frame(kind, Some(channel.clone()), count));
      }

      Ok(if frames.len() == 1 {
        frames.pop().unwrap_or_else(null)
      } else {
        array(frames)
      })
    },
    "UNSUBSCRIBE" | "PUNSUBSCRIBE" => {
      let kind = if name == "UNSUBSCRIBE" { "unsubscribe" } else { "punsubscribe" };
      let subscriber = match data.subscribers.get_mut(&session.id) {
        Some(subscriber) => subscriber,
        None => return Ok(subscription_frame(kind, None, 0)),
      };
      let targets: Vec<Bytes> = if args.is_empty() {
        if name == "UNSUBSCRIBE" {
          subscriber.channels.iter().cloned().collect()
        } else {
          subscriber.patterns.iter().cloned().collect()
        }
      } else {
        args.to_vec()
      };

      let mut frames = Vec::with_capacity(targets.len());
      for target in targets.into_iter() {
        if name == "UNSUBSCRIBE" {
          subscriber.channels.remove(&target);
        } else {
          subscriber.patterns.remove(&target);
        }
        let count = subscriber.channels.len() + subscriber.patterns.len();
        frames.push(subscription_frame(kind, Some(target), count));
      }
      if subscriber.channels.is_empty() && subscriber.patterns.is_empty() {
        data.subscribers.remove(&session.id);
      }

      Ok(match frames.len() {
        0 => subscription_frame(kind, None, 0),
        1 => frames.pop().unwrap_or_else(null),
        _ => array(frames),
      })
    },
    "PUBLISH" => {
      let (channel, message) = (arg(args, 0)?, arg(args, 1)?);
      let channel_str = Str::from_inner(channel.clone()).unwrap_or_else(|_| Str::from(String::from_utf8_lossy(channel).to_string()));
      let value = protocol_utils::string_or_bytes(message.clone());
      let mut receivers = 0;

      for subscriber in data.subscribers.values() {
        if subscriber.channels.contains(channel) {
          receivers += 1;
          let _ = subscriber.tx.send(Message {
            channel: channel_str.clone(),
            pattern: None,
            value:   value.clone(),
          });
        }
        for pattern in subscriber.patterns.iter().filter(|p| glob_match(p, channel)) {
          receivers += 1;
          let _ = subscriber.tx.send(Message {
            channel: channel_str.clone(),
            pattern: Some(Str::from(String::from_utf8_lossy(pattern).to_string())),
            value:   value.clone(),
          });
        }
      }
      Ok(int(receivers))
    },
    "PUBSUB CHANNELS" => {
      let channels: BTreeSet<Bytes> = data
        .subscribers
        .values()
        .flat_map(|s| s.channels.iter().cloned())
        .filter(|channel| args.first().map(|p| glob_match(p, channel)).unwrap_or(true))
        .collect();
      Ok(bulk_array(channels))
    },
    "PUBSUB NUMSUB" => {
      let mut out = Vec::with_capacity(args.len() * 2);
      for channel in args.iter() {
        let count = data.subscribers.values().filter(|s| s.channels.contains(channel)).count();
        out.push(bulk(channel.clone()));
        out.push(int(count as i64));
      }
      Ok(array(out))
    },
    _ => Ok(int(
      data.subscribers.values().map(|s| s.patterns.len()).sum::<usize>() as i64,
    )),
  }
}

/// Scripts are not interpreted. Running one replies with its keys followed by its arguments.
fn scripts(data: &mut MockData, name: &str, args: &[Bytes]) -> Reply {
  match name {
    "EVAL" | "EVALSHA" => {
      let (script, numkeys) = (arg(args, 0)?, parse_int(arg(args, 1)?)?);
      if numkeys < 0 || numkeys as usize > args.len() - 2 {
        return Err(err("ERR Number of keys can't be greater than number of args"));
      }
      if name == "EVAL" {
        data.scripts.insert(script_digest(script), script.clone());
      } else if !data.scripts.contains_key(String::from_utf8_lossy(script).to_lowercase().as_str()) {
        return Err(err("NOSCRIPT No matching script. Please use EVAL."));
      }
      Ok(bulk_array(args[2 ..].iter().cloned()))
    },
    "SCRIPT LOAD" => {
      let script = arg(args, 0)?;
      let digest = script_digest(script);
      data.scripts.insert(digest.clone(), script.clone());
      Ok(bulk(digest))
    },
    "SCRIPT EXISTS" => Ok(array(
      args
        .iter()
        .map(|sha| int(data.scripts.contains_key(String::from_utf8_lossy(sha).to_lowercase().as_str()) as i64))
        .collect(),
    )),
    "SCRIPT FLUSH" => {
      data.scripts.clear();
      Ok(ok())
    },
    _ => Err(err("NOTBUSY No scripts in execution right now.")),
  }
}

/// Render the `CLUSTER NODES` response from the point of view of the provided node.
pub fn cluster_nodes(data: &MockData, myself: usize) -> String {
  let mut out = String::new();
  for (idx, node) in data.nodes.iter().enumerate() {
    let flags = if idx == myself { "myself,master" } else { "master" };
    let slots: Vec<String> = node.slots.iter().map(|r| r.to_string()).collect();
    out.push_str(&format!(
      "{} {}:{}@{} {} - 0 0 {} connected {}\n",
      node.id,
      node.server.host,
      node.server.port,
      node.server.port as u32 + 10000,
      flags,
      idx + 1,
      slots.join(" ")
    ));
  }
  out
}

fn parse_slot(value: &[u8]) -> Result<u16, Resp2Frame> {
  let slot = parse_int(value)?;
  if slot < 0 || slot >= SLOT_COUNT as i64 {
    Err(err("ERR Invalid or out of range slot"))
  } else {
    Ok(slot as u16)
  }
}

fn cluster(data: &mut MockData, session: &mut Session, name: &str, args: &[Bytes]) -> Reply {
  if !data.clustered {
    return Err(err("ERR This instance has cluster support disabled"));
  }

  match name {
    "CLUSTER NODES" => Ok(bulk(cluster_nodes(data, session.node))),
    "CLUSTER INFO" => {
      let assigned: usize = data.nodes.iter().flat_map(|n| n.slots.iter()).map(|r| r.len()).sum();
      let state = if assigned == SLOT_COUNT as usize { "ok" } else { "fail" };
      Ok(bulk(format!(
        "cluster_state:{}\r\ncluster_slots_assigned:{}\r\ncluster_slots_ok:{}\r\ncluster_known_nodes:{}\r\ncluster_size:{}\r\n",
        state,
        assigned,
        assigned,
        data.nodes.len(),
        data.nodes.iter().filter(|n| !n.slots.is_empty()).count()
      )))
    },
    "CLUSTER KEYSLOT" => Ok(int(redis_protocol::redis_keyslot(arg(args, 0)?) as i64)),
    "CLUSTER MYID" => Ok(bulk(data.nodes[session.node].id.clone())),
    "CLUSTER COUNTKEYSINSLOT" => {
      let slot = parse_slot(arg(args, 0)?)?;
      let keys = db(data, session).keys();
      Ok(int(
        keys.iter().filter(|k| redis_protocol::redis_keyslot(k) == slot).count() as i64,
      ))
    },
    "CLUSTER GETKEYSINSLOT" => {
      let (slot, count) = (parse_slot(arg(args, 0)?)?, parse_int(arg(args, 1)?)?);
      let keys = db(data, session).keys();
      Ok(bulk_array(
        keys
          .into_iter()
          .filter(|k| redis_protocol::redis_keyslot(k) == slot)
          .take(count.max(0) as usize),
      ))
    },
    "CLUSTER ADDSLOTS" => {
      min_args(name, args, 1)?;
      for slot in args.iter() {
        let slot = parse_slot(slot)?;
        if data.slot_owner(slot).is_some() {
          return Err(err(format!("ERR Slot {} is already busy", slot)));
        }
        data.assign_slot(slot, session.node);
      }
      Ok(ok())
    },
    "CLUSTER DELSLOTS" => {
      min_args(name, args, 1)?;
      for slot in args.iter() {
        let slot = parse_slot(slot)?;
        remove_slot(&mut data.nodes[session.node].slots, slot);
      }
      Ok(ok())
    },
    "CLUSTER SETSLOT" => {
      let slot = parse_slot(arg(args, 0)?)?;
      match upper(arg(args, 1)?).as_str() {
        "NODE" => {
          let owner = data
            .node_by_id(arg(args, 2)?)
            .ok_or_else(|| err("ERR I don't know about node"))?;
          data.assign_slot(slot, owner);
        },
        "MIGRATING" => {
          let target = data
            .node_by_id(arg(args, 2)?)
            .ok_or_else(|| err("ERR I don't know about node"))?;
          data.nodes[session.node].migrating.insert(slot, target);
        },
        "STABLE" => {
          data.nodes[session.node].migrating.remove(&slot);
        },
        "IMPORTING" => {},
        _ => return Err(syntax_error()),
      }
      Ok(ok())
    },
    "CLUSTER FORGET" | "CLUSTER REPLICATE" => {
      let id = arg(args, 0)?;
      if data.node_by_id(id).is_none() {
        return Err(err(format!("ERR Unknown node {}", String::from_utf8_lossy(id))));
      }
      Ok(ok())
    },
    "CLUSTER MEET" => {
      arg(args, 1)?;
      Ok(ok())
    },
    _ => Err(err(format!("ERR unknown subcommand '{}'", name))),
  }
}

fn sentinel_fields(fields: Vec<(&'static str, String)>) -> Resp2Frame {
  array(fields.into_iter().flat_map(|(k, v)| [bulk(k), bulk(v)]).collect())
}

fn node_run_id(data: &MockData, server: &Server) -> String {
  data
    .node_for_server(server)
    .map(|idx| data.nodes[idx].id.clone())
    .unwrap_or_default()
}

fn primary_fields(data: &MockData, name: &str, monitored: &Monitored, sentinels: usize) -> Resp2Frame {
  sentinel_fields(vec![
    ("name", name.to_owned()),
    ("ip", monitored.primary.host.to_string()),
    ("port", monitored.primary.port.to_string()),
    ("runid", node_run_id(data, &monitored.primary)),
    ("flags", "master".to_owned()),
    ("num-slaves", monitored.replicas.len().to_string()),
    ("num-other-sentinels", sentinels.saturating_sub(1).to_string()),
    ("quorum", monitored.quorum.to_string()),
  ])
}

fn no_such_primary() -> Resp2Frame {
  err("ERR No such master with that name")
}

fn sentinel(data: &mut MockData, session: &Session, name: &str, args: &[Bytes]) -> Reply {
  let sentinels: Vec<Server> = data
    .nodes
    .iter()
    .filter(|node| node.sentinel)
    .map(|node| node.server.clone())
    .collect();
  if !data.nodes[session.node].sentinel {
    return Err(err(format!("ERR unknown command '{}'", name.to_lowercase())));
  }
  if name == "SENTINEL MASTERS" {
    let primaries = data
      .monitored
      .iter()
      .map(|(service, monitored)| primary_fields(data, service, monitored, sentinels.len()))
      .collect();
    return Ok(array(primaries));
  }
  if name == "SENTINEL FLUSHCONFIG" {
    return Ok(ok());
  }

  let service = String::from_utf8_lossy(arg(args, 0)?).to_string();
  match name {
    "SENTINEL GET-MASTER-ADDR-BY-NAME" => Ok(match data.monitored.get(&service) {
      Some(monitored) => array(vec![
        bulk(monitored.primary.host.to_string()),
        bulk(monitored.primary.port.to_string()),
      ]),
      None => null(),
    }),
    "SENTINEL MASTER" => {
      let monitored = data.monitored.get(&service).ok_or_else(no_such_primary)?;
      Ok(primary_fields(data, &service, monitored, sentinels.len()))
    },
    "SENTINEL REPLICAS" | "SENTINEL SLAVES" => {
      let monitored = data.monitored.get(&service).ok_or_else(no_such_primary)?;
      let replicas = monitored
        .replicas
        .iter()
        .map(|replica| {
          sentinel_fields(vec![
            ("name", replica.to_string()),
            ("ip", replica.host.to_string()),
            ("port", replica.port.to_string()),
            ("runid", node_run_id(data, replica)),
            ("flags", "slave".to_owned()),
            ("master-host", monitored.primary.host.to_string()),
            ("master-port", monitored.primary.port.to_string()),
          ])
        })
        .collect();
      Ok(array(replicas))
    },
    "SENTINEL SENTINELS" => {
      data.monitored.get(&service).ok_or_else(no_such_primary)?;
      let me = &data.nodes[session.node].server;
      let others = sentinels
        .iter()
        .filter(|server| *server != me)
        .map(|server| {
          sentinel_fields(vec![
            ("name", server.to_string()),
            ("ip", server.host.to_string()),
            ("port", server.port.to_string()),
            ("runid", node_run_id(data, server)),
            ("flags", "sentinel".to_owned()),
          ])
        })
        .collect();
      Ok(array(others))
    },
    "SENTINEL CKQUORUM" => {
      let monitored = data.monitored.get(&service).ok_or_else(no_such_primary)?;
      if (sentinels.len() as i64) < monitored.quorum {
        return Err(err(format!(
          "NOQUORUM {} usable Sentinels. Not enough available Sentinels to reach the specified quorum for this master",
          sentinels.len()
        )));
      }
      Ok(Resp2Frame::SimpleString(Bytes::from(format!(
        "OK {} usable Sentinels. Quorum and failover authorization can be reached",
        sentinels.len()
      ))))
    },
    "SENTINEL FAILOVER" => {
      let (old, new) = {
        let monitored = data.monitored.get_mut(&service).ok_or_else(no_such_primary)?;
        if monitored.replicas.is_empty() {
          return Err(err("NOGOODSLAVE No suitable replica to promote"));
        }
        let promoted = monitored.replicas.remove(0);
        let demoted = std::mem::replace(&mut monitored.primary, promoted.clone());
        monitored.replicas.push(demoted.clone());
        (demoted, promoted)
      };

      // the promoted replica was in sync
      if let (Some(old), Some(new)) = (data.node_for_server(&old), data.node_for_server(&new)) {
        let dbs = data.nodes[old].dbs.clone();
        data.nodes[new].dbs = dbs;
      }
      Ok(ok())
    },
    "SENTINEL REMOVE" => {
      data.monitored.remove(&service).ok_or_else(no_such_primary)?;
      Ok(ok())
    },
    "SENTINEL MONITOR" => {
      let host = String::from_utf8_lossy(arg(args, 1)?).to_string();
      let port = parse_int(arg(args, 2)?)?;
      let quorum = parse_int(arg(args, 3)?)?;
      if quorum < 1 {
        return Err(err("ERR Quorum must be 1 or greater."));
      }
      if port < 1 || port > u16::MAX as i64 {
        return Err(err("ERR Invalid port"));
      }
      if data.monitored.contains_key(&service) {
        return Err(err("ERR Duplicated master name"));
      }

      data.monitored.insert(service, Monitored {
        primary: Server::new(host, port as u16),
        replicas: Vec::new(),
        quorum,
      });
      Ok(ok())
    },
    _ => Err(err(format!(
      "ERR Unknown sentinel subcommand '{}'",
      name.trim_start_matches("SENTINEL ").to_lowercase()
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn data(clustered: bool) -> MockData {
    let nodes = if clustered {
      vec![
        MockNode::new(0, Server::new("127.0.0.1", 30001), vec![SlotRange::new(0, 8191)]),
        MockNode::new(1, Server::new("127.0.0.1", 30002), vec![SlotRange::new(8192, 16383)]),
      ]
    } else {
      vec![MockNode::new(0, Server::new("127.0.0.1", 6379), vec![
        SlotRange::new(0, 16383),
      ])]
    };

    MockData {
      clustered,
      nodes,
      scripts: HashMap::new(),
      subscribers: HashMap::new(),
      password: None,
      sentinel_password: None,
      monitored: BTreeMap::new(),
      last_save: 0,
    }
  }

  fn parts(values: &[&str]) -> Vec<Bytes> {
    values.iter().map(|v| Bytes::from(v.to_string())).collect()
  }

  #[test]
  fn should_split_and_merge_slot_ranges() {
    let mut ranges = vec![SlotRange::new(0, 10)];
    remove_slot(&mut ranges, 5);
    assert_eq!(ranges, vec![SlotRange::new(0, 4), SlotRange::new(6, 10)]);

    add_slot(&mut ranges, 5);
    assert_eq!(ranges, vec![SlotRange::new(0, 10)]);
  }

  #[test]
  fn should_queue_commands_in_multi() {
    let mut data = data(false);
    let mut session = Session::new(1, 0, None);

    assert_eq!(execute(&mut data, &mut session, &parts(&["MULTI"])), ok());
    assert_eq!(
      execute(&mut data, &mut session, &parts(&["SET", "foo", "bar"])),
      protocol_utils::queued_frame()
    );
    assert_eq!(
      execute(&mut data, &mut session, &parts(&["EXEC"])),
      array(vec![ok()])
    );
    assert_eq!(
      execute(&mut data, &mut session, &parts(&["GET", "foo"])),
      bulk("bar")
    );
  }

  #[test]
  fn should_abort_exec_when_watched_key_changes() {
    let mut data = data(false);
    let mut first = Session::new(1, 0, None);
    let mut second = Session::new(2, 0, None);

    execute(&mut data, &mut first, &parts(&["WATCH", "foo"]));
    execute(&mut data, &mut first, &parts(&["MULTI"]));
    execute(&mut data, &mut first, &parts(&["SET", "foo", "1"]));
    execute(&mut data, &mut second, &parts(&["SET", "foo", "2"]));

    assert_eq!(execute(&mut data, &mut first, &parts(&["EXEC"])), null());
  }

  #[test]
  fn should_redirect_keys_owned_by_other_nodes() {
    let mut data = data(true);
    let session = Session::new(1, 0, None);
    // "foo" hashes to 12182
    let reply = check_slots(&mut data, &session, &[b"foo"]);

    assert_eq!(reply, Some(err("MOVED 12182 127.0.0.1:30002")));
    assert_eq!(
      check_slots(&mut data, &session, &[b"foo", b"bar"]),
      Some(err("CROSSSLOT Keys in request don't hash to the same slot"))
    );
  }

  #[test]
  fn should_render_parseable_cluster_nodes() {
    let data = data(true);
    let text = cluster_nodes(&data, 1);
    let nodes = crate::protocol::cluster::parse_cluster_nodes(&text, None).unwrap();

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1].slots, vec![SlotRange::new(8192, 16383)]);
    assert!(nodes[1].has_flag(crate::types::NodeFlag::Myself));
  }

  #[test]
  fn should_sort_numerically_and_alphabetically() {
    let mut data = data(false);
    let mut session = Session::new(1, 0, None);
    execute(&mut data, &mut session, &parts(&["RPUSH", "list", "3", "10", "1"]));

    assert_eq!(
      execute(&mut data, &mut session, &parts(&["SORT", "list"])),
      bulk_array(parts(&["1", "3", "10"]))
    );
    assert_eq!(
      execute(&mut data, &mut session, &parts(&["SORT", "list", "ALPHA", "DESC"])),
      bulk_array(parts(&["3", "10", "1"]))
    );
  }

  #[test]
  fn should_page_through_keys_with_cursor() {
    let mut data = data(false);
    let mut session = Session::new(1, 0, None);
    for idx in 0 .. 5 {
      execute(&mut data, &mut session, &parts(&["SET", format!("key{}", idx).as_str(), "1"]));
    }
    execute(&mut data, &mut session, &parts(&["RPUSH", "list", "a"]));

    assert_eq!(
      execute(&mut data, &mut session, &parts(&["SCAN", "0", "COUNT", "4"])),
      scan_reply(4, parts(&["key0", "key1", "key2", "key3"]).into_iter().map(bulk).collect())
    );
    assert_eq!(
      execute(&mut data, &mut session, &parts(&["SCAN", "4", "COUNT", "4", "TYPE", "string"])),
      scan_reply(0, vec![bulk("key4")])
    );
    assert_eq!(
      execute(&mut data, &mut session, &parts(&["SCAN", "abc"])),
      err("ERR invalid cursor")
    );
  }

  fn sentinel_data() -> MockData {
    let mut data = data(false);
    data.nodes[0].server = Server::new("127.0.0.1", 6380);
    data
      .nodes
      .push(MockNode::new(1, Server::new("127.0.0.1", 6381), vec![]));
    for (idx, port) in [26379, 26380].iter().enumerate() {
      let mut node = MockNode::new(idx + 2, Server::new("127.0.0.1", *port), vec![]);
      node.sentinel = true;
      data.nodes.push(node);
    }
    data.monitored.insert("mymaster".into(), Monitored {
      primary:  Server::new("127.0.0.1", 6380),
      replicas: vec![Server::new("127.0.0.1", 6381)],
      quorum:   2,
    });
    data
  }

  #[test]
  fn should_answer_sentinel_commands_on_sentinel_nodes() {
    let mut data = sentinel_data();
    let mut sentinel = Session::new(1, 2, None);
    let mut primary = Session::new(2, 0, None);

    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "GET-MASTER-ADDR-BY-NAME", "mymaster"])),
      bulk_array(parts(&["127.0.0.1", "6380"]))
    );
    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "GET-MASTER-ADDR-BY-NAME", "other"])),
      null()
    );
    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["GET", "foo"])),
      err("ERR unknown command 'get'")
    );
    assert_eq!(
      execute(&mut data, &mut primary, &parts(&["SENTINEL", "MASTERS"])),
      err("ERR unknown command 'sentinel masters'")
    );
  }

  #[test]
  fn should_promote_replica_on_failover() {
    let mut data = sentinel_data();
    let mut sentinel = Session::new(1, 3, None);
    let mut primary = Session::new(2, 0, None);
    execute(&mut data, &mut primary, &parts(&["SET", "foo", "bar"]));

    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "FAILOVER", "mymaster"])),
      ok()
    );
    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "GET-MASTER-ADDR-BY-NAME", "mymaster"])),
      bulk_array(parts(&["127.0.0.1", "6381"]))
    );
    let mut promoted = Session::new(3, 1, None);
    assert_eq!(execute(&mut data, &mut promoted, &parts(&["GET", "foo"])), bulk("bar"));
  }

  #[test]
  fn should_validate_monitor_arguments() {
    let mut data = sentinel_data();
    let mut sentinel = Session::new(1, 2, None);

    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "MONITOR", "other", "127.0.0.1", "7000", "0"])),
      err("ERR Quorum must be 1 or greater.")
    );
    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "MONITOR", "mymaster", "127.0.0.1", "7000", "1"])),
      err("ERR Duplicated master name")
    );
    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "MONITOR", "other", "127.0.0.1", "7000", "1"])),
      ok()
    );
    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "REMOVE", "other"])),
      ok()
    );
    assert_eq!(
      execute(&mut data, &mut sentinel, &parts(&["SENTINEL", "MASTER", "other"])),
      err("ERR No such master with that name")
    );
  }
}
