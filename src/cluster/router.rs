use crate::{
  cluster::executor::ClusterCommandExecutor,
  error::{RedisError, RedisErrorKind},
  types::RedisKey,
};
use redis_protocol::redis_keyslot;
use std::{fmt, sync::Arc};

/// Decides whether a multi-key command can be sent as-is, or must be emulated across nodes.
pub trait SlotRouter: Send + Sync + fmt::Debug {
  /// Whether commands run against a cluster.
  fn is_clustered(&self) -> bool;

  /// Whether every key hashes to the same slot.
  fn same_slot(&self, keys: &[&[u8]]) -> bool;

  /// Read the executor used to emulate commands across nodes.
  fn executor(&self) -> Option<&Arc<ClusterCommandExecutor>>;

  fn same_slot_keys(&self, keys: &[RedisKey]) -> bool {
    let keys: Vec<&[u8]> = keys.iter().map(|key| key.as_bytes()).collect();
    self.same_slot(&keys)
  }

  fn cluster_executor(&self) -> Result<&Arc<ClusterCommandExecutor>, RedisError> {
    self
      .executor()
      .ok_or_else(|| RedisError::new(RedisErrorKind::InvalidCommand, "Cluster is not configured!"))
  }
}

/// The router used against a single server, where every command runs as-is.
#[derive(Clone, Debug, Default)]
pub struct StandaloneRouter;

impl SlotRouter for StandaloneRouter {
  fn is_clustered(&self) -> bool {
    false
  }

  fn same_slot(&self, _: &[&[u8]]) -> bool {
    true
  }

  fn executor(&self) -> Option<&Arc<ClusterCommandExecutor>> {
    None
  }
}

/// The router used against a cluster.
#[derive(Debug)]
pub struct ClusterRouter {
  executor: Arc<ClusterCommandExecutor>,
}

impl ClusterRouter {
  pub fn new(executor: Arc<ClusterCommandExecutor>) -> Self {
    ClusterRouter { executor }
  }
}

impl SlotRouter for ClusterRouter {
  fn is_clustered(&self) -> bool {
    true
  }

  fn same_slot(&self, keys: &[&[u8]]) -> bool {
    let mut slots = keys.iter().map(|key| redis_keyslot(key));

    match slots.next() {
      Some(first) => slots.all(|slot| slot == first),
      None => true,
    }
  }

  fn executor(&self) -> Option<&Arc<ClusterCommandExecutor>> {
    Some(&self.executor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn should_compare_slots() {
    let router = StandaloneRouter;
    assert!(router.same_slot(&[b"a", b"b"]));
    assert!(router.cluster_executor().is_err());

    let slots: Vec<u16> = ["a", "b", "c"].iter().map(|k| redis_keyslot(k.as_bytes())).collect();
    assert_ne!(slots[0], slots[1]);
    assert_ne!(slots[1], slots[2]);
    assert_eq!(redis_keyslot(b"{a}1"), redis_keyslot(b"{a}2"));
  }
}
