use crate::{
  error::{RedisError, RedisErrorKind},
  protocol::utils as protocol_utils,
  types::{RedisValue, Resp2Frame},
};
use bytes_utils::Str;
use std::{collections::HashMap, fmt, sync::OnceLock, time::Duration};

/// The shape of the reply a command produces, used to select a converter for the raw frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReplyShape {
  /// A status reply such as `OK`. Status replies are left out of pipeline and transaction results.
  Status,
  /// An integer reply.
  Integer,
  /// An integer `0`/`1` reply, or `OK`/nil for conditional writes.
  Boolean,
  /// A bulk string holding a floating point number.
  Double,
  /// Any value, returned as-is.
  Value,
  /// An array of values, where nil is read as an empty array.
  Array,
  /// A flat array of key/value pairs, read as a map.
  Map,
}

/// Where a command's key arguments live.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeySpec {
  /// The command takes no keys.
  None,
  /// The first argument is the only key.
  First,
  /// The first two arguments are keys.
  FirstTwo,
  /// Every argument is a key.
  All,
  /// Every argument but the last, as with `BLPOP`.
  AllButLast,
  /// Alternating keys and values, as with `MSET`.
  Alternating,
  /// `numkeys` follows the script or SHA1 argument, as with `EVAL`.
  Eval,
  /// A destination key followed by `numkeys` source keys, as with `ZUNIONSTORE`.
  NumKeysAfterDest,
  /// Keys follow the `STREAMS` token, as with `XREAD`.
  Streams,
  /// The first argument, and the argument after `STORE` if present.
  Sort,
}

pub(crate) mod flags {
  pub const NONE: u8 = 0;
  /// The command may block the connection server side.
  pub const BLOCKING: u8 = 1;
  /// The command changes the transaction state of the connection.
  pub const TRANSACTION: u8 = 1 << 1;
  /// The command changes the pubsub state of the connection.
  pub const PUBSUB: u8 = 1 << 2;
  /// The command runs on an arbitrary node in a cluster.
  pub const RANDOM_NODE: u8 = 1 << 3;
}

/// An entry in the static command registry.
#[derive(Debug)]
pub struct CommandInfo {
  pub kind:  RedisCommandKind,
  /// The command name, including any subcommand.
  pub name:  &'static str,
  pub shape: ReplyShape,
  /// The arity, counted with the same rules as `COMMAND INFO`. Negative values are minimums.
  pub arity: i16,
  pub keys:  KeySpec,
  pub flags: u8,
}

macro_rules! command_registry {
  ($( $variant:ident => ($name:expr, $shape:ident, $arity:expr, $keys:ident, $flags:expr) ),* $(,)?) => {
    /// A command in the static registry.
    #[derive(Clone, Copy, Eq, PartialEq, Hash)]
    pub enum RedisCommandKind {
      $( $variant, )*
    }

    static COMMAND_TABLE: &[CommandInfo] = &[
      $( CommandInfo {
        kind:  RedisCommandKind::$variant,
        name:  $name,
        shape: ReplyShape::$shape,
        arity: $arity,
        keys:  KeySpec::$keys,
        flags: $flags,
      }, )*
    ];
  };
}

command_registry! {
  Append => ("APPEND", Integer, 3, First, flags::NONE),
  Asking => ("ASKING", Status, 1, None, flags::NONE),
  Auth => ("AUTH", Status, -2, None, flags::NONE),
  BgSave => ("BGSAVE", Status, -1, None, flags::NONE),
  BlMove => ("BLMOVE", Value, 6, FirstTwo, flags::BLOCKING),
  BlPop => ("BLPOP", Value, -3, AllButLast, flags::BLOCKING),
  BrPop => ("BRPOP", Value, -3, AllButLast, flags::BLOCKING),
  BrPopLPush => ("BRPOPLPUSH", Value, 4, FirstTwo, flags::BLOCKING),
  BzPopMin => ("BZPOPMIN", Value, -3, AllButLast, flags::BLOCKING),
  BzPopMax => ("BZPOPMAX", Value, -3, AllButLast, flags::BLOCKING),
  ClientGetName => ("CLIENT GETNAME", Value, 2, None, flags::NONE),
  ClientId => ("CLIENT ID", Integer, 2, None, flags::NONE),
  ClientSetName => ("CLIENT SETNAME", Status, 3, None, flags::NONE),
  ClusterAddSlots => ("CLUSTER ADDSLOTS", Status, -3, None, flags::NONE),
  ClusterCountKeysInSlot => ("CLUSTER COUNTKEYSINSLOT", Integer, 3, None, flags::NONE),
  ClusterDelSlots => ("CLUSTER DELSLOTS", Status, -3, None, flags::NONE),
  ClusterForget => ("CLUSTER FORGET", Status, 3, None, flags::NONE),
  ClusterGetKeysInSlot => ("CLUSTER GETKEYSINSLOT", Array, 4, None, flags::NONE),
  ClusterInfo => ("CLUSTER INFO", Value, 2, None, flags::RANDOM_NODE),
  ClusterKeySlot => ("CLUSTER KEYSLOT", Integer, 3, None, flags::RANDOM_NODE),
  ClusterMeet => ("CLUSTER MEET", Status, -4, None, flags::NONE),
  ClusterMyId => ("CLUSTER MYID", Value, 2, None, flags::NONE),
  ClusterNodes => ("CLUSTER NODES", Value, 2, None, flags::RANDOM_NODE),
  ClusterReplicate => ("CLUSTER REPLICATE", Status, 3, None, flags::NONE),
  ClusterSetSlot => ("CLUSTER SETSLOT", Status, -4, None, flags::NONE),
  ConfigGet => ("CONFIG GET", Map, -3, None, flags::NONE),
  ConfigResetStat => ("CONFIG RESETSTAT", Status, 2, None, flags::NONE),
  ConfigSet => ("CONFIG SET", Status, -4, None, flags::NONE),
  Copy => ("COPY", Boolean, -3, FirstTwo, flags::NONE),
  DbSize => ("DBSIZE", Integer, 1, None, flags::NONE),
  Decr => ("DECR", Integer, 2, First, flags::NONE),
  DecrBy => ("DECRBY", Integer, 3, First, flags::NONE),
  Del => ("DEL", Integer, -2, All, flags::NONE),
  Discard => ("DISCARD", Status, 1, None, flags::TRANSACTION),
  Dump => ("DUMP", Value, 2, First, flags::NONE),
  Echo => ("ECHO", Value, 2, None, flags::RANDOM_NODE),
  Eval => ("EVAL", Value, -3, Eval, flags::NONE),
  EvalSha => ("EVALSHA", Value, -3, Eval, flags::NONE),
  Exec => ("EXEC", Value, 1, None, flags::TRANSACTION),
  Exists => ("EXISTS", Integer, -2, All, flags::NONE),
  Expire => ("EXPIRE", Boolean, -3, First, flags::NONE),
  ExpireAt => ("EXPIREAT", Boolean, -3, First, flags::NONE),
  FlushAll => ("FLUSHALL", Status, -1, None, flags::NONE),
  FlushDb => ("FLUSHDB", Status, -1, None, flags::NONE),
  GeoAdd => ("GEOADD", Integer, -5, First, flags::NONE),
  GeoDist => ("GEODIST", Double, -4, First, flags::NONE),
  GeoHash => ("GEOHASH", Array, -2, First, flags::NONE),
  GeoPos => ("GEOPOS", Array, -2, First, flags::NONE),
  Get => ("GET", Value, 2, First, flags::NONE),
  GetDel => ("GETDEL", Value, 2, First, flags::NONE),
  GetRange => ("GETRANGE", Value, 4, First, flags::NONE),
  GetSet => ("GETSET", Value, 3, First, flags::NONE),
  HDel => ("HDEL", Integer, -3, First, flags::NONE),
  HExists => ("HEXISTS", Boolean, 3, First, flags::NONE),
  HGet => ("HGET", Value, 3, First, flags::NONE),
  HGetAll => ("HGETALL", Map, 2, First, flags::NONE),
  HIncrBy => ("HINCRBY", Integer, 4, First, flags::NONE),
  HIncrByFloat => ("HINCRBYFLOAT", Double, 4, First, flags::NONE),
  HKeys => ("HKEYS", Array, 2, First, flags::NONE),
  HLen => ("HLEN", Integer, 2, First, flags::NONE),
  HMGet => ("HMGET", Array, -3, First, flags::NONE),
  HScan => ("HSCAN", Value, -3, First, flags::NONE),
  HSet => ("HSET", Integer, -4, First, flags::NONE),
  HSetNx => ("HSETNX", Boolean, 4, First, flags::NONE),
  HStrLen => ("HSTRLEN", Integer, 3, First, flags::NONE),
  HVals => ("HVALS", Array, 2, First, flags::NONE),
  Incr => ("INCR", Integer, 2, First, flags::NONE),
  IncrBy => ("INCRBY", Integer, 3, First, flags::NONE),
  IncrByFloat => ("INCRBYFLOAT", Double, 3, First, flags::NONE),
  Info => ("INFO", Value, -1, None, flags::NONE),
  Keys => ("KEYS", Array, 2, None, flags::NONE),
  LastSave => ("LASTSAVE", Integer, 1, None, flags::RANDOM_NODE),
  LIndex => ("LINDEX", Value, 3, First, flags::NONE),
  LInsert => ("LINSERT", Integer, 5, First, flags::NONE),
  LLen => ("LLEN", Integer, 2, First, flags::NONE),
  LMove => ("LMOVE", Value, 5, FirstTwo, flags::NONE),
  LPop => ("LPOP", Value, -2, First, flags::NONE),
  LPos => ("LPOS", Value, -3, First, flags::NONE),
  LPush => ("LPUSH", Integer, -3, First, flags::NONE),
  LPushX => ("LPUSHX", Integer, -3, First, flags::NONE),
  LRange => ("LRANGE", Array, 4, First, flags::NONE),
  LRem => ("LREM", Integer, 4, First, flags::NONE),
  LSet => ("LSET", Status, 4, First, flags::NONE),
  LTrim => ("LTRIM", Status, 4, First, flags::NONE),
  MGet => ("MGET", Array, -2, All, flags::NONE),
  Move => ("MOVE", Boolean, 3, First, flags::NONE),
  MSet => ("MSET", Status, -3, Alternating, flags::NONE),
  MSetNx => ("MSETNX", Boolean, -3, Alternating, flags::NONE),
  Multi => ("MULTI", Status, 1, None, flags::TRANSACTION),
  Persist => ("PERSIST", Boolean, 2, First, flags::NONE),
  PExpire => ("PEXPIRE", Boolean, -3, First, flags::NONE),
  PExpireAt => ("PEXPIREAT", Boolean, -3, First, flags::NONE),
  Ping => ("PING", Value, -1, None, flags::RANDOM_NODE),
  PSetEx => ("PSETEX", Status, 4, First, flags::NONE),
  PSubscribe => ("PSUBSCRIBE", Value, -2, None, flags::PUBSUB),
  PTtl => ("PTTL", Integer, 2, First, flags::NONE),
  Publish => ("PUBLISH", Integer, 3, None, flags::RANDOM_NODE),
  PubsubChannels => ("PUBSUB CHANNELS", Array, -2, None, flags::RANDOM_NODE),
  PubsubNumPat => ("PUBSUB NUMPAT", Integer, 2, None, flags::RANDOM_NODE),
  PubsubNumSub => ("PUBSUB NUMSUB", Map, -2, None, flags::RANDOM_NODE),
  PUnsubscribe => ("PUNSUBSCRIBE", Value, -1, None, flags::PUBSUB),
  Quit => ("QUIT", Status, 1, None, flags::NONE),
  RandomKey => ("RANDOMKEY", Value, 1, None, flags::RANDOM_NODE),
  Rename => ("RENAME", Status, 3, FirstTwo, flags::NONE),
  RenameNx => ("RENAMENX", Boolean, 3, FirstTwo, flags::NONE),
  Restore => ("RESTORE", Status, -4, First, flags::NONE),
  RPop => ("RPOP", Value, -2, First, flags::NONE),
  RPopLPush => ("RPOPLPUSH", Value, 3, FirstTwo, flags::NONE),
  RPush => ("RPUSH", Integer, -3, First, flags::NONE),
  RPushX => ("RPUSHX", Integer, -3, First, flags::NONE),
  SAdd => ("SADD", Integer, -3, First, flags::NONE),
  Save => ("SAVE", Status, 1, None, flags::NONE),
  Scan => ("SCAN", Value, -2, None, flags::NONE),
  SCard => ("SCARD", Integer, 2, First, flags::NONE),
  ScriptExists => ("SCRIPT EXISTS", Array, -3, None, flags::RANDOM_NODE),
  ScriptFlush => ("SCRIPT FLUSH", Status, -2, None, flags::NONE),
  ScriptKill => ("SCRIPT KILL", Status, 2, None, flags::NONE),
  ScriptLoad => ("SCRIPT LOAD", Value, 3, None, flags::NONE),
  SDiff => ("SDIFF", Array, -2, All, flags::NONE),
  SDiffStore => ("SDIFFSTORE", Integer, -3, All, flags::NONE),
  Select => ("SELECT", Status, 2, None, flags::NONE),
  SentinelCkQuorum => ("SENTINEL CKQUORUM", Value, 3, None, flags::NONE),
  SentinelFailover => ("SENTINEL FAILOVER", Status, 3, None, flags::NONE),
  SentinelFlushConfig => ("SENTINEL FLUSHCONFIG", Status, 2, None, flags::NONE),
  SentinelGetMasterAddrByName => ("SENTINEL GET-MASTER-ADDR-BY-NAME", Value, 3, None, flags::NONE),
  SentinelMaster => ("SENTINEL MASTER", Value, 3, None, flags::NONE),
  SentinelMasters => ("SENTINEL MASTERS", Array, 2, None, flags::NONE),
  SentinelMonitor => ("SENTINEL MONITOR", Status, 6, None, flags::NONE),
  SentinelRemove => ("SENTINEL REMOVE", Status, 3, None, flags::NONE),
  SentinelReplicas => ("SENTINEL REPLICAS", Array, 3, None, flags::NONE),
  SentinelSentinels => ("SENTINEL SENTINELS", Array, 3, None, flags::NONE),
  Set => ("SET", Status, -3, First, flags::NONE),
  SetEx => ("SETEX", Status, 4, First, flags::NONE),
  SetNx => ("SETNX", Boolean, 3, First, flags::NONE),
  SetRange => ("SETRANGE", Integer, 4, First, flags::NONE),
  SInter => ("SINTER", Array, -2, All, flags::NONE),
  SInterStore => ("SINTERSTORE", Integer, -3, All, flags::NONE),
  SIsMember => ("SISMEMBER", Boolean, 3, First, flags::NONE),
  SMembers => ("SMEMBERS", Array, 2, First, flags::NONE),
  SMove => ("SMOVE", Boolean, 4, FirstTwo, flags::NONE),
  Sort => ("SORT", Value, -2, Sort, flags::NONE),
  SPop => ("SPOP", Value, -2, First, flags::NONE),
  SRandMember => ("SRANDMEMBER", Value, -2, First, flags::NONE),
  SRem => ("SREM", Integer, -3, First, flags::NONE),
  SScan => ("SSCAN", Value, -3, First, flags::NONE),
  StrLen => ("STRLEN", Integer, 2, First, flags::NONE),
  Subscribe => ("SUBSCRIBE", Value, -2, None, flags::PUBSUB),
  SUnion => ("SUNION", Array, -2, All, flags::NONE),
  SUnionStore => ("SUNIONSTORE", Integer, -3, All, flags::NONE),
  Time => ("TIME", Array, 1, None, flags::RANDOM_NODE),
  Touch => ("TOUCH", Integer, -2, All, flags::NONE),
  Ttl => ("TTL", Integer, 2, First, flags::NONE),
  Type => ("TYPE", Value, 2, First, flags::NONE),
  Unlink => ("UNLINK", Integer, -2, All, flags::NONE),
  Unsubscribe => ("UNSUBSCRIBE", Value, -1, None, flags::PUBSUB),
  Unwatch => ("UNWATCH", Status, 1, None, flags::TRANSACTION),
  Watch => ("WATCH", Status, -2, All, flags::TRANSACTION),
  XAck => ("XACK", Integer, -4, First, flags::NONE),
  XAdd => ("XADD", Value, -5, First, flags::NONE),
  XDel => ("XDEL", Integer, -3, First, flags::NONE),
  XGroupCreate => ("XGROUP CREATE", Status, -5, First, flags::NONE),
  XGroupDestroy => ("XGROUP DESTROY", Boolean, 4, First, flags::NONE),
  XLen => ("XLEN", Integer, 2, First, flags::NONE),
  XRange => ("XRANGE", Array, -4, First, flags::NONE),
  XRead => ("XREAD", Value, -4, Streams, flags::NONE),
  XReadGroup => ("XREADGROUP", Value, -7, Streams, flags::NONE),
  XRevRange => ("XREVRANGE", Array, -4, First, flags::NONE),
  XTrim => ("XTRIM", Integer, -4, First, flags::NONE),
  ZAdd => ("ZADD", Value, -4, First, flags::NONE),
  ZCard => ("ZCARD", Integer, 2, First, flags::NONE),
  ZCount => ("ZCOUNT", Integer, 4, First, flags::NONE),
  ZIncrBy => ("ZINCRBY", Double, 4, First, flags::NONE),
  ZInterStore => ("ZINTERSTORE", Integer, -4, NumKeysAfterDest, flags::NONE),
  ZRange => ("ZRANGE", Array, -4, First, flags::NONE),
  ZRangeByScore => ("ZRANGEBYSCORE", Array, -4, First, flags::NONE),
  ZRank => ("ZRANK", Value, 3, First, flags::NONE),
  ZRem => ("ZREM", Integer, -3, First, flags::NONE),
  ZRevRange => ("ZREVRANGE", Array, -4, First, flags::NONE),
  ZScan => ("ZSCAN", Value, -3, First, flags::NONE),
  ZScore => ("ZSCORE", Double, 3, First, flags::NONE),
  ZUnionStore => ("ZUNIONSTORE", Integer, -4, NumKeysAfterDest, flags::NONE),
  Custom => ("", Value, -1, First, flags::NONE),
}

fn name_index() -> &'static HashMap<&'static str, RedisCommandKind> {
  static INDEX: OnceLock<HashMap<&'static str, RedisCommandKind>> = OnceLock::new();

  INDEX.get_or_init(|| {
    COMMAND_TABLE
      .iter()
      .filter(|info| !info.name.is_empty())
      .map(|info| (info.name, info.kind))
      .collect()
  })
}

impl fmt::Debug for RedisCommandKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_str_debug())
  }
}

impl RedisCommandKind {
  /// Read the registry entry for the command.
  pub fn info(&self) -> &'static CommandInfo {
    // the table is generated in the same order as the enum
    &COMMAND_TABLE[*self as usize]
  }

  /// Resolve a command name, with or without a subcommand, in the registry.
  pub fn from_name(name: &str) -> Option<RedisCommandKind> {
    name_index().get(name.to_uppercase().as_str()).copied()
  }

  /// Read the command's protocol string, including the subcommand.
  pub fn cmd_str(&self) -> &'static str {
    self.info().name
  }

  /// Read the command's protocol string without panicking.
  pub fn to_str_debug(&self) -> &'static str {
    match *self {
      RedisCommandKind::Custom => "CUSTOM",
      _ => self.info().name,
    }
  }

  pub fn reply_shape(&self) -> ReplyShape {
    self.info().shape
  }

  pub fn arity(&self) -> i16 {
    self.info().arity
  }

  pub fn key_spec(&self) -> KeySpec {
    self.info().keys
  }

  pub fn is_blocking(&self) -> bool {
    self.info().flags & flags::BLOCKING != 0
  }

  pub fn is_transaction_command(&self) -> bool {
    self.info().flags & flags::TRANSACTION != 0
  }

  pub fn is_pubsub_command(&self) -> bool {
    self.info().flags & flags::PUBSUB != 0
  }

  /// Whether the command can run on any cluster node.
  pub fn use_random_cluster_node(&self) -> bool {
    self.info().flags & flags::RANDOM_NODE != 0
  }

  pub fn is_multi(&self) -> bool {
    matches!(*self, RedisCommandKind::Multi)
  }

  pub fn is_exec(&self) -> bool {
    matches!(*self, RedisCommandKind::Exec)
  }

  pub fn is_discard(&self) -> bool {
    matches!(*self, RedisCommandKind::Discard)
  }

  pub fn ends_transaction(&self) -> bool {
    matches!(*self, RedisCommandKind::Exec | RedisCommandKind::Discard)
  }

  pub fn is_custom(&self) -> bool {
    matches!(*self, RedisCommandKind::Custom)
  }

  pub fn closes_connection(&self) -> bool {
    matches!(*self, RedisCommandKind::Quit)
  }

  pub fn is_subscribe(&self) -> bool {
    matches!(*self, RedisCommandKind::Subscribe | RedisCommandKind::PSubscribe)
  }

  pub fn is_unsubscribe(&self) -> bool {
    matches!(*self, RedisCommandKind::Unsubscribe | RedisCommandKind::PUnsubscribe)
  }
}

/// A command and its arguments.
#[derive(Clone)]
pub struct RedisCommand {
  /// The command and optional subcommand name.
  pub kind:      RedisCommandKind,
  /// The name of a command that is not in the registry.
  pub custom:    Option<Str>,
  /// The provided arguments.
  pub args:      Vec<RedisValue>,
  /// How long the command blocks server side, where zero means forever.
  ///
  /// Also used for commands like `XREAD` that only block based on an argument.
  pub block:     Option<Duration>,
  /// A reply shape that replaces the registry entry, for commands whose reply depends on their arguments.
  pub shape:     Option<ReplyShape>,
  /// An explicit hash slot, for commands that should run on a specific slot's node but take no keys.
  pub hash_slot: Option<u16>,
}

impl fmt::Debug for RedisCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RedisCommand")
      .field("command", &self.cmd_str())
      .field("arguments", &self.args)
      .finish()
  }
}

impl fmt::Display for RedisCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.cmd_str())
  }
}

impl From<(RedisCommandKind, Vec<RedisValue>)> for RedisCommand {
  fn from((kind, args): (RedisCommandKind, Vec<RedisValue>)) -> Self {
    RedisCommand::new(kind, args)
  }
}

impl RedisCommand {
  pub fn new(kind: RedisCommandKind, args: Vec<RedisValue>) -> Self {
    RedisCommand {
      kind,
      args,
      custom: None,
      block: None,
      shape: None,
      hash_slot: None,
    }
  }

  /// Create a command by name, resolving it in the registry when possible.
  ///
  /// Names with a subcommand may be passed either as one string (`"CLUSTER NODES"`) or with the subcommand as the
  /// first argument.
  pub fn new_custom(name: &str, mut args: Vec<RedisValue>) -> Result<Self, RedisError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(RedisError::new(RedisErrorKind::InvalidCommand, "Missing command name."));
    }

    if let Some(kind) = RedisCommandKind::from_name(name) {
      return Ok(RedisCommand::new(kind, args));
    }
    let subcommand = args
      .first()
      .and_then(|arg| arg.as_str())
      .map(|sub| format!("{} {}", name, sub));
    if let Some(kind) = subcommand.and_then(|full| RedisCommandKind::from_name(&full)) {
      args.remove(0);
      return Ok(RedisCommand::new(kind, args));
    }

    Ok(RedisCommand {
      custom: Some(name.to_uppercase().into()),
      ..RedisCommand::new(RedisCommandKind::Custom, args)
    })
  }

  pub fn with_block(mut self, timeout: Duration) -> Self {
    self.block = Some(timeout);
    self
  }

  pub fn with_shape(mut self, shape: ReplyShape) -> Self {
    self.shape = Some(shape);
    self
  }

  pub fn with_hash_slot(mut self, slot: u16) -> Self {
    self.hash_slot = Some(slot);
    self
  }

  /// Read the protocol string for the command.
  pub fn cmd_str(&self) -> &str {
    match self.custom {
      Some(ref name) => name,
      None => self.kind.cmd_str(),
    }
  }

  pub fn reply_shape(&self) -> ReplyShape {
    self.shape.unwrap_or_else(|| self.kind.reply_shape())
  }

  /// Whether the command blocks the connection server side.
  pub fn is_blocking(&self) -> bool {
    self.block.is_some() || self.kind.is_blocking()
  }

  /// Check the argument count against the registry arity.
  pub fn check_arity(&self) -> Result<(), RedisError> {
    if self.kind.is_custom() {
      return Ok(());
    }

    let words = self.kind.cmd_str().split(' ').count();
    let total = (self.args.len() + words) as i16;
    let arity = self.kind.arity();
    let valid = if arity >= 0 { total == arity } else { total >= -arity };

    if valid {
      Ok(())
    } else {
      Err(RedisError::new(
        RedisErrorKind::InvalidArgument,
        format!(
          "ERR wrong number of arguments for '{}' command",
          self.kind.cmd_str().to_lowercase()
        ),
      ))
    }
  }

  /// Read the key arguments.
  pub fn keys(&self) -> Vec<&[u8]> {
    fn key(arg: &RedisValue) -> Option<&[u8]> {
      arg.as_bytes()
    }

    match self.kind.key_spec() {
      KeySpec::None => Vec::new(),
      KeySpec::First => self.args.first().and_then(key).into_iter().collect(),
      KeySpec::FirstTwo => self.args.iter().take(2).filter_map(key).collect(),
      KeySpec::All => self.args.iter().filter_map(key).collect(),
      KeySpec::AllButLast => {
        let len = self.args.len().saturating_sub(1);
        self.args.iter().take(len).filter_map(key).collect()
      },
      KeySpec::Alternating => self.args.iter().step_by(2).filter_map(key).collect(),
      KeySpec::Eval => {
        let numkeys = self.args.get(1).and_then(|n| n.as_usize()).unwrap_or(0);
        self.args.iter().skip(2).take(numkeys).filter_map(key).collect()
      },
      KeySpec::NumKeysAfterDest => {
        let numkeys = self.args.get(1).and_then(|n| n.as_usize()).unwrap_or(0);
        self
          .args
          .first()
          .into_iter()
          .chain(self.args.iter().skip(2).take(numkeys))
          .filter_map(key)
          .collect()
      },
      KeySpec::Streams => {
        let position = self
          .args
          .iter()
          .position(|arg| arg.as_str().map(|s| s.eq_ignore_ascii_case("STREAMS")).unwrap_or(false));

        match position {
          Some(idx) => {
            let remaining = self.args.len() - idx - 1;
            self.args.iter().skip(idx + 1).take(remaining / 2).filter_map(key).collect()
          },
          None => Vec::new(),
        }
      },
      KeySpec::Sort => {
        let store = self
          .args
          .iter()
          .position(|arg| arg.as_str().map(|s| s.eq_ignore_ascii_case("STORE")).unwrap_or(false))
          .and_then(|idx| self.args.get(idx + 1));

        self.args.first().into_iter().chain(store).filter_map(key).collect()
      },
    }
  }

  /// Read the first key in the arguments.
  pub fn first_key(&self) -> Option<&[u8]> {
    self.keys().into_iter().next()
  }

  /// Read the hash slot used to route the command, if any.
  pub fn cluster_hash(&self) -> Option<u16> {
    self
      .hash_slot
      .or_else(|| self.first_key().map(redis_protocol::redis_keyslot))
  }

  /// Convert to a single frame with an array of bulk strings.
  pub fn to_frame(&self) -> Result<Resp2Frame, RedisError> {
    protocol_utils::command_to_frame(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn should_build_table_in_enum_order() {
    for (idx, info) in COMMAND_TABLE.iter().enumerate() {
      assert_eq!(info.kind as usize, idx);
    }
  }

  #[test]
  fn should_resolve_names() {
    assert_eq!(RedisCommandKind::from_name("get"), Some(RedisCommandKind::Get));
    assert_eq!(
      RedisCommandKind::from_name("cluster nodes"),
      Some(RedisCommandKind::ClusterNodes)
    );
    assert_eq!(RedisCommandKind::from_name("foo"), None);
  }

  #[test]
  fn should_resolve_custom_subcommands() {
    let command = RedisCommand::new_custom("CONFIG", vec!["GET".into(), "maxmemory".into()]).unwrap();
    assert_eq!(command.kind, RedisCommandKind::ConfigGet);
    assert_eq!(command.args, vec![RedisValue::from("maxmemory")]);

    let command = RedisCommand::new_custom("foo.bar", vec!["baz".into()]).unwrap();
    assert!(command.kind.is_custom());
    assert_eq!(command.cmd_str(), "FOO.BAR");
  }

  #[test]
  fn should_check_arity() {
    assert!(RedisCommand::new(RedisCommandKind::Get, vec!["foo".into()])
      .check_arity()
      .is_ok());
    assert!(RedisCommand::new(RedisCommandKind::Get, vec![]).check_arity().is_err());
    assert!(RedisCommand::new(RedisCommandKind::Del, vec!["a".into(), "b".into()])
      .check_arity()
      .is_ok());
    assert!(RedisCommand::new(RedisCommandKind::ConfigGet, vec!["*".into()])
      .check_arity()
      .is_ok());
  }

  #[test]
  fn should_find_keys() {
    let command = RedisCommand::new(RedisCommandKind::BlPop, vec!["a".into(), "b".into(), 0.into()]);
    assert_eq!(command.keys(), vec![b"a" as &[u8], b"b"]);

    let command = RedisCommand::new(RedisCommandKind::MSet, vec![
      "a".into(),
      1.into(),
      "b".into(),
      2.into(),
    ]);
    assert_eq!(command.keys(), vec![b"a" as &[u8], b"b"]);

    let command = RedisCommand::new(RedisCommandKind::Eval, vec![
      "return 1".into(),
      2.into(),
      "a".into(),
      "b".into(),
      "c".into(),
    ]);
    assert_eq!(command.keys(), vec![b"a" as &[u8], b"b"]);

    let command = RedisCommand::new(RedisCommandKind::XRead, vec![
      "COUNT".into(),
      1.into(),
      "STREAMS".into(),
      "a".into(),
      "b".into(),
      "0".into(),
      "0".into(),
    ]);
    assert_eq!(command.keys(), vec![b"a" as &[u8], b"b"]);

    let command = RedisCommand::new(RedisCommandKind::Sort, vec!["a".into(), "STORE".into(), "b".into()]);
    assert_eq!(command.keys(), vec![b"a" as &[u8], b"b"]);
  }

  #[test]
  fn should_hash_first_key() {
    let command = RedisCommand::new(RedisCommandKind::Get, vec!["foo".into()]);
    assert_eq!(command.cluster_hash(), Some(12182));

    let command = RedisCommand::new(RedisCommandKind::Ping, vec![]);
    assert_eq!(command.cluster_hash(), None);
  }
}
