use crate::{
  error::{RedisError, RedisErrorKind},
  types::{RedisValue, Server},
};
use std::collections::HashMap;

/// A primary, replica or sentinel as reported by `SENTINEL MASTERS`, `SENTINEL REPLICAS` or `SENTINEL SENTINELS`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SentinelServer {
  /// The name of the monitored service, or `host:port` for replicas and other sentinels.
  pub name:       String,
  pub server:     Server,
  /// The flags reported by the sentinel, such as `master`, `slave` or `s_down`.
  pub flags:      Vec<String>,
  /// Every field in the reply, including the ones above.
  pub properties: HashMap<String, String>,
}

impl SentinelServer {
  /// Parse one flat `field, value, ...` array from a sentinel reply.
  pub(crate) fn from_value(value: RedisValue) -> Result<SentinelServer, RedisError> {
    let mut properties = HashMap::new();
    let mut values = value.into_array().into_iter();
    while let (Some(field), Some(value)) = (values.next(), values.next()) {
      if let (Some(field), Some(value)) = (field.into_string(), value.into_string()) {
        properties.insert(field, value);
      }
    }

    let host = properties
      .get("ip")
      .cloned()
      .ok_or_else(|| RedisError::new(RedisErrorKind::Sentinel, "Failed to read sentinel node IP address."))?;
    let port = properties
      .get("port")
      .and_then(|port| port.parse::<u16>().ok())
      .ok_or_else(|| RedisError::new(RedisErrorKind::Sentinel, "Failed to read sentinel node port."))?;
    let name = properties
      .get("name")
      .cloned()
      .unwrap_or_else(|| format!("{}:{}", host, port));
    let flags = properties
      .get("flags")
      .map(|flags| flags.split(',').map(|f| f.to_owned()).collect())
      .unwrap_or_default();

    Ok(SentinelServer {
      name,
      server: Server::new(host, port),
      flags,
      properties,
    })
  }

  /// Parse an array of servers.
  pub(crate) fn from_array(value: RedisValue) -> Result<Vec<SentinelServer>, RedisError> {
    value.into_array().into_iter().map(SentinelServer::from_value).collect()
  }

  fn has_flag(&self, flag: &str) -> bool {
    self.flags.iter().any(|f| f == flag)
  }

  pub fn is_primary(&self) -> bool {
    self.has_flag("master")
  }

  pub fn is_replica(&self) -> bool {
    self.has_flag("slave")
  }

  /// Whether the sentinel considers the server down.
  pub fn is_down(&self) -> bool {
    self.has_flag("s_down") || self.has_flag("o_down")
  }

  /// The number of sentinels that must agree a primary is down, if reported.
  pub fn quorum(&self) -> Option<u32> {
    self.properties.get("quorum").and_then(|q| q.parse().ok())
  }

  /// The number of replicas attached to a primary, if reported.
  pub fn num_replicas(&self) -> Option<u32> {
    self.properties.get("num-slaves").and_then(|n| n.parse().ok())
  }

  pub fn run_id(&self) -> Option<&str> {
    self.properties.get("runid").map(|id| id.as_str())
  }
}
