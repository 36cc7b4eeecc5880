use crate::types::Server;
use bytes_utils::Str;
use std::{cmp::Ordering, fmt};

/// The number of hash slots in a cluster.
pub const SLOT_COUNT: u16 = 16384;

/// An inclusive range of hash slots.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SlotRange {
  pub start: u16,
  pub end:   u16,
}

impl SlotRange {
  pub fn new(start: u16, end: u16) -> Self {
    SlotRange { start, end }
  }

  /// Whether the range contains the provided slot.
  pub fn contains(&self, slot: u16) -> bool {
    slot >= self.start && slot <= self.end
  }

  /// The number of slots in the range.
  pub fn len(&self) -> usize {
    (self.end - self.start) as usize + 1
  }

  pub fn is_empty(&self) -> bool {
    false
  }
}

impl fmt::Display for SlotRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.start == self.end {
      write!(f, "{}", self.start)
    } else {
      write!(f, "{}-{}", self.start, self.end)
    }
  }
}

/// Flags reported for a node by `CLUSTER NODES`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum NodeFlag {
  Myself,
  Primary,
  Replica,
  PFail,
  Fail,
  Handshake,
  NoAddr,
  NoFailover,
}

impl NodeFlag {
  pub(crate) fn from_str(s: &str) -> Option<NodeFlag> {
    Some(match s {
      "myself" => NodeFlag::Myself,
      "master" => NodeFlag::Primary,
      "slave" | "replica" => NodeFlag::Replica,
      "fail?" => NodeFlag::PFail,
      "fail" => NodeFlag::Fail,
      "handshake" => NodeFlag::Handshake,
      "noaddr" => NodeFlag::NoAddr,
      "nofailover" => NodeFlag::NoFailover,
      _ => return None,
    })
  }

  pub(crate) fn to_str(&self) -> &'static str {
    match *self {
      NodeFlag::Myself => "myself",
      NodeFlag::Primary => "master",
      NodeFlag::Replica => "slave",
      NodeFlag::PFail => "fail?",
      NodeFlag::Fail => "fail",
      NodeFlag::Handshake => "handshake",
      NodeFlag::NoAddr => "noaddr",
      NodeFlag::NoFailover => "nofailover",
    }
  }
}

/// The state of the cluster bus link to a node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LinkState {
  Connected,
  Disconnected,
}

/// A node in a cluster, as reported by `CLUSTER NODES`.
///
/// Nodes are immutable values. Every topology refresh produces new nodes.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClusterNode {
  /// The node ID.
  pub id:         Str,
  /// The node's client address.
  pub server:     Server,
  /// The slot ranges owned by the node, sorted.
  pub slots:      Vec<SlotRange>,
  /// The node flags, sorted and deduplicated.
  pub flags:      Vec<NodeFlag>,
  /// The ID of the primary, if the node is a replica.
  pub primary_id: Option<Str>,
  pub link_state: LinkState,
}

impl ClusterNode {
  /// Create a node with only an address. Used when a caller targets a node that is not in a topology snapshot yet.
  pub fn from_server(server: Server) -> Self {
    ClusterNode {
      id: Str::from(""),
      server,
      slots: Vec::new(),
      flags: vec![NodeFlag::Primary],
      primary_id: None,
      link_state: LinkState::Connected,
    }
  }

  pub fn has_flag(&self, flag: NodeFlag) -> bool {
    self.flags.contains(&flag)
  }

  pub fn is_primary(&self) -> bool {
    self.has_flag(NodeFlag::Primary)
  }

  pub fn is_replica(&self) -> bool {
    self.has_flag(NodeFlag::Replica)
  }

  /// Whether the node answered the cluster bus and is not flagged as failing.
  pub fn is_active(&self) -> bool {
    self.link_state == LinkState::Connected
      && !self.has_flag(NodeFlag::Fail)
      && !self.has_flag(NodeFlag::PFail)
      && !self.has_flag(NodeFlag::NoAddr)
      && !self.has_flag(NodeFlag::Handshake)
  }

  /// Whether the node owns the provided slot.
  pub fn serves_slot(&self, slot: u16) -> bool {
    self.slots.iter().any(|range| range.contains(slot))
  }

  /// Whether the node has a usable ID, as opposed to one created with `from_server`.
  pub fn has_id(&self) -> bool {
    !self.id.is_empty()
  }
}

impl fmt::Display for ClusterNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.has_id() {
      write!(f, "{} ({})", self.server, &self.id)
    } else {
      write!(f, "{}", self.server)
    }
  }
}

impl PartialOrd for ClusterNode {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for ClusterNode {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .server
      .cmp(&other.server)
      .then_with(|| self.id.as_bytes().cmp(other.id.as_bytes()))
  }
}

/// The state argument of `CLUSTER SETSLOT`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SlotState {
  /// Import the slot from the node with the provided ID.
  Importing(Str),
  /// Migrate the slot to the node with the provided ID.
  Migrating(Str),
  /// Clear any importing or migrating state.
  Stable,
  /// Assign the slot to the node with the provided ID.
  Node(Str),
}

impl SlotState {
  pub(crate) fn into_args(self) -> Vec<Str> {
    match self {
      SlotState::Importing(id) => vec![Str::from_static("IMPORTING"), id],
      SlotState::Migrating(id) => vec![Str::from_static("MIGRATING"), id],
      SlotState::Stable => vec![Str::from_static("STABLE")],
      SlotState::Node(id) => vec![Str::from_static("NODE"), id],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn should_check_slot_ownership() {
    let node = ClusterNode {
      slots: vec![SlotRange::new(0, 100), SlotRange::new(200, 200)],
      ..ClusterNode::from_server(Server::new("127.0.0.1", 30001))
    };

    assert!(node.serves_slot(0));
    assert!(node.serves_slot(100));
    assert!(node.serves_slot(200));
    assert!(!node.serves_slot(150));
  }

  #[test]
  fn should_treat_failing_nodes_as_inactive() {
    let node = ClusterNode {
      flags: vec![NodeFlag::Primary, NodeFlag::PFail],
      ..ClusterNode::from_server(Server::new("127.0.0.1", 30001))
    };

    assert!(!node.is_active());
  }
}
