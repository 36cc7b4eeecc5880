use crate::{
  error::{RedisError, RedisErrorKind},
  types::{ClusterNode, LinkState, NodeFlag, Server, SlotRange, SLOT_COUNT},
};
use bytes_utils::Str;

fn parse_slot(value: &str) -> Result<u16, RedisError> {
  let slot = value.parse::<u16>()?;

  if slot >= SLOT_COUNT {
    Err(RedisError::new(
      RedisErrorKind::Protocol,
      format!("Invalid cluster slot: {}", slot),
    ))
  } else {
    Ok(slot)
  }
}

fn parse_slot_range(value: &str) -> Result<Option<SlotRange>, RedisError> {
  // importing or migrating slots look like `[1234->-<id>]` and are still owned by the source node
  if value.starts_with('[') {
    return Ok(None);
  }

  match value.split_once('-') {
    Some((start, end)) => Ok(Some(SlotRange::new(parse_slot(start)?, parse_slot(end)?))),
    None => {
      let slot = parse_slot(value)?;
      Ok(Some(SlotRange::new(slot, slot)))
    },
  }
}

/// Parse the address column, which looks like `host:port@cport[,hostname]`.
///
/// Nodes that have not been assigned an address yet report `:0@0`, in which case `default_host` is used if the line
/// describes the node that answered the command.
fn parse_address(value: &str, is_myself: bool, default_host: Option<&Server>) -> Result<Server, RedisError> {
  let (address, hostname) = match value.split_once(',') {
    Some((address, hostname)) => (address, Some(hostname).filter(|h| !h.is_empty())),
    None => (value, None),
  };
  let address = address.split('@').next().unwrap_or(address);
  let (host, port) = address
    .rsplit_once(':')
    .ok_or_else(|| RedisError::new(RedisErrorKind::Protocol, format!("Invalid node address: {}", value)))?;
  let port = port.parse::<u16>()?;

  if host.is_empty() || port == 0 {
    match default_host {
      Some(server) if is_myself => Ok(server.clone()),
      _ => Err(RedisError::new(
        RedisErrorKind::Protocol,
        format!("Missing node address: {}", value),
      )),
    }
  } else {
    Ok(Server::new(hostname.unwrap_or(host), port))
  }
}

fn parse_line(line: &str, default_host: Option<&Server>) -> Result<Option<ClusterNode>, RedisError> {
  let parts: Vec<&str> = line.split_whitespace().collect();
  if parts.is_empty() {
    return Ok(None);
  }
  if parts.len() < 8 {
    return Err(RedisError::new(
      RedisErrorKind::Protocol,
      format!("Invalid CLUSTER NODES line: {}", line),
    ));
  }

  let mut flags: Vec<NodeFlag> = parts[2].split(',').filter_map(NodeFlag::from_str).collect();
  flags.sort();
  flags.dedup();
  let is_myself = flags.contains(&NodeFlag::Myself);

  if flags.contains(&NodeFlag::NoAddr) && !is_myself {
    // the node is still known to the cluster but cannot be reached
    trace!("Skipping node without address: {}", parts[0]);
    return Ok(None);
  }

  let server = parse_address(parts[1], is_myself, default_host)?;
  let primary_id = match parts[3] {
    "-" => None,
    id => Some(Str::from(id)),
  };
  let link_state = match parts[7] {
    "connected" => LinkState::Connected,
    _ => LinkState::Disconnected,
  };
  let mut slots = Vec::with_capacity(parts.len() - 8);
  for part in parts[8 ..].iter() {
    if let Some(range) = parse_slot_range(part)? {
      slots.push(range);
    }
  }
  slots.sort();

  Ok(Some(ClusterNode {
    id: Str::from(parts[0]),
    server,
    slots,
    flags,
    primary_id,
    link_state,
  }))
}

/// Parse the response to `CLUSTER NODES`.
///
/// `default_host` is the server that answered the command, used for the `myself` line when the node does not know
/// its own address. The nodes are returned sorted by address.
///
/// <https://redis.io/commands/cluster-nodes/>
pub fn parse_cluster_nodes(data: &str, default_host: Option<&Server>) -> Result<Vec<ClusterNode>, RedisError> {
  let mut nodes = Vec::new();
  for line in data.lines() {
    if let Some(node) = parse_line(line.trim(), default_host)? {
      nodes.push(node);
    }
  }
  nodes.sort();

  if nodes.is_empty() {
    Err(RedisError::new(
      RedisErrorKind::Protocol,
      "Empty CLUSTER NODES response.",
    ))
  } else {
    Ok(nodes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const NODES: &str = "07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30004@31004 slave \
                       e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected\n\
                       67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:30002@31002 master - 0 1426238316232 2 \
                       connected 5461-10922\n\
                       292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30003@31003 master - 0 1426238318243 3 \
                       connected 10923-16383\n\
                       6ec23923021cf3ffec47632106199cb7f496ce01 127.0.0.1:30005@31005 slave \
                       67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 0 1426238316232 5 connected\n\
                       824fe116063bc5fcf9f4ffd895bc17aee7731ac3 127.0.0.1:30006@31006 slave \
                       292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 0 1426238317741 6 connected\n\
                       e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001 myself,master - 0 0 1 \
                       connected 0-5460\n";

  #[test]
  fn should_parse_cluster_nodes() {
    let nodes = parse_cluster_nodes(NODES, None).unwrap();
    assert_eq!(nodes.len(), 6);

    let first = &nodes[0];
    assert_eq!(first.server, Server::new("127.0.0.1", 30001));
    assert_eq!(first.slots, vec![SlotRange::new(0, 5460)]);
    assert!(first.is_primary());
    assert!(first.has_flag(NodeFlag::Myself));

    let replica = &nodes[3];
    assert_eq!(replica.server, Server::new("127.0.0.1", 30004));
    assert!(replica.is_replica());
    assert_eq!(
      replica.primary_id.as_deref(),
      Some("e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca")
    );
    assert!(replica.slots.is_empty());
  }

  #[test]
  fn should_parse_single_slots_and_skip_migrating_slots() {
    let data = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001 myself,master - 0 0 1 connected \
                0-100 200 [201->-292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f]";
    let nodes = parse_cluster_nodes(data, None).unwrap();

    assert_eq!(nodes[0].slots, vec![SlotRange::new(0, 100), SlotRange::new(200, 200)]);
  }

  #[test]
  fn should_use_default_host_for_myself_without_address() {
    let data = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca :0@0 myself,master - 0 0 1 connected 0-16383";
    let server = Server::new("10.0.0.1", 6379);
    let nodes = parse_cluster_nodes(data, Some(&server)).unwrap();

    assert_eq!(nodes[0].server, server);
  }

  #[test]
  fn should_prefer_announced_hostnames() {
    let data = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 10.0.0.1:6379@16379,redis-1.example.com myself,master - 0 \
                0 1 connected 0-16383";
    let nodes = parse_cluster_nodes(data, None).unwrap();

    assert_eq!(nodes[0].server, Server::new("redis-1.example.com", 6379));
  }

  #[test]
  fn should_mark_failing_nodes() {
    let data = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001 master,fail - 0 0 1 disconnected \
                0-16383";
    let nodes = parse_cluster_nodes(data, None).unwrap();

    assert!(!nodes[0].is_active());
  }

  #[test]
  fn should_reject_invalid_lines() {
    assert!(parse_cluster_nodes("foo bar baz", None).is_err());
    assert!(parse_cluster_nodes("", None).is_err());
  }
}
