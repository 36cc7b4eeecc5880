use crate::{
  error::{RedisError, RedisErrorKind},
  types::{ClusterNode, RedisKey},
};
use std::{collections::HashMap, fmt};

/// The outcome of a command run against one cluster node.
#[derive(Clone, Debug)]
pub struct NodeResult<T> {
  /// The node that ran the command.
  pub node:  ClusterNode,
  /// The key that selected the node, for multi-key dispatch.
  pub key:   Option<RedisKey>,
  pub value: T,
}

impl<T> NodeResult<T> {
  pub fn new(node: ClusterNode, key: Option<RedisKey>, value: T) -> Self {
    NodeResult { node, key, value }
  }

  /// Map the inner value, keeping the node and key.
  pub fn map<U, F>(self, func: F) -> NodeResult<U>
  where
    F: FnOnce(T) -> U,
  {
    NodeResult {
      node:  self.node,
      key:   self.key,
      value: func(self.value),
    }
  }
}

/// The aggregate result of a scatter-gather call.
///
/// Failures on individual nodes do not abort sibling calls. Every node's outcome is kept, in the order the calls were
/// issued, so callers can inspect both the values and the failures.
#[derive(Clone, Debug)]
pub struct MultiNodeResult<T> {
  results: Vec<NodeResult<Result<T, RedisError>>>,
}

impl<T> Default for MultiNodeResult<T> {
  fn default() -> Self {
    MultiNodeResult { results: Vec::new() }
  }
}

impl<T> MultiNodeResult<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node's outcome.
  pub fn add(&mut self, result: NodeResult<Result<T, RedisError>>) {
    self.results.push(result);
  }

  /// Read every per-node outcome.
  pub fn results(&self) -> &[NodeResult<Result<T, RedisError>>] {
    &self.results
  }

  pub fn len(&self) -> usize {
    self.results.len()
  }

  pub fn is_empty(&self) -> bool {
    self.results.is_empty()
  }

  /// Whether any node failed.
  pub fn has_errors(&self) -> bool {
    self.results.iter().any(|r| r.value.is_err())
  }

  /// Read the failures along with the node and key that produced them.
  pub fn errors(&self) -> Vec<(&ClusterNode, Option<&RedisKey>, &RedisError)> {
    self
      .results
      .iter()
      .filter_map(|r| match r.value {
        Err(ref e) => Some((&r.node, r.key.as_ref(), e)),
        Ok(_) => None,
      })
      .collect()
  }

  /// Read the successful values, in issue order.
  pub fn values(&self) -> Vec<&T> {
    self.results.iter().filter_map(|r| r.value.as_ref().ok()).collect()
  }

  /// Read the first successful value.
  pub fn first_value(&self) -> Option<&T> {
    self.results.iter().find_map(|r| r.value.as_ref().ok())
  }

  /// Convert to the successful values, failing with an error that describes every failed node if any node failed.
  pub fn into_values(self) -> Result<Vec<T>, RedisError> {
    if self.has_errors() {
      return Err(self.into_error());
    }

    Ok(self.results.into_iter().filter_map(|r| r.value.ok()).collect())
  }

  /// Convert to the successful values in the order of the provided keys, failing if any node failed.
  ///
  /// Results without a key, or with keys that are not in `keys`, are sorted last.
  pub fn values_sorted_by_keys(self, keys: &[RedisKey]) -> Result<Vec<T>, RedisError> {
    if self.has_errors() {
      return Err(self.into_error());
    }

    let positions: HashMap<&RedisKey, usize> = keys.iter().enumerate().map(|(idx, key)| (key, idx)).collect();
    let mut values: Vec<(usize, T)> = self
      .results
      .into_iter()
      .filter_map(|r| {
        let position = r
          .key
          .as_ref()
          .and_then(|k| positions.get(k).copied())
          .unwrap_or(usize::MAX);
        r.value.ok().map(|v| (position, v))
      })
      .collect();
    values.sort_by_key(|(position, _)| *position);

    Ok(values.into_iter().map(|(_, v)| v).collect())
  }

  fn into_error(self) -> RedisError {
    let failures: Vec<String> = self
      .results
      .iter()
      .filter_map(|r| match r.value {
        Err(ref e) => Some(format!("{}: {}", r.node.server, e)),
        Ok(_) => None,
      })
      .collect();
    let kind = self
      .results
      .iter()
      .find_map(|r| r.value.as_ref().err().map(|e| e.kind().clone()))
      .unwrap_or(RedisErrorKind::Unknown);

    RedisError::new(
      kind,
      format!("Error executing on {} node(s): {}", failures.len(), failures.join(", ")),
    )
  }
}

impl<T: Clone> MultiNodeResult<T> {
  /// Read the first successful value that is not empty according to `is_empty`, or `default`.
  pub fn first_non_empty_or<F>(&self, default: T, is_empty: F) -> T
  where
    F: Fn(&T) -> bool,
  {
    self
      .results
      .iter()
      .filter_map(|r| r.value.as_ref().ok())
      .find(|v| !is_empty(v))
      .cloned()
      .unwrap_or(default)
  }
}

impl<T: fmt::Debug> fmt::Display for MultiNodeResult<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for result in self.results.iter() {
      writeln!(f, "{} => {:?}", result.node.server, result.value)?;
    }
    Ok(())
  }
}

impl<T> IntoIterator for MultiNodeResult<T> {
  type IntoIter = std::vec::IntoIter<NodeResult<Result<T, RedisError>>>;
  type Item = NodeResult<Result<T, RedisError>>;

  fn into_iter(self) -> Self::IntoIter {
    self.results.into_iter()
  }
}

impl<T> FromIterator<NodeResult<Result<T, RedisError>>> for MultiNodeResult<T> {
  fn from_iter<I: IntoIterator<Item = NodeResult<Result<T, RedisError>>>>(iter: I) -> Self {
    MultiNodeResult {
      results: iter.into_iter().collect(),
    }
  }
}
