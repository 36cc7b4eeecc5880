//! Connection providers for standalone, cluster and sentinel deployments, the pending result plumbing for pipelines
//! and transactions, and the per-caller connection state machine.

use crate::{driver::DriverConnection, error::RedisError, types::Server};
use async_trait::async_trait;
use std::{fmt, sync::Arc};

pub mod inner;
pub mod invoker;
pub mod pool;
pub mod provider;
pub mod sentinel;
pub mod shared;

pub use inner::{ConnectionInner, ConnectionMode};
pub use invoker::PendingResult;
pub use pool::PoolingConnectionProvider;
pub use provider::{ClusterConnectionProvider, StandaloneConnectionProvider};
pub use sentinel::SentinelConnectionProvider;
pub use shared::SharedConnection;

/// The kind of driver connection requested from a `ConnectionProvider`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ConnectionKind {
  /// A connection to the configured server, or a slot-routing connection when running against a cluster.
  Plain,
  /// A slot-routing connection to a cluster.
  Cluster,
  /// A connection used to receive pubsub messages.
  PubSub,
  /// A connection to one specific server.
  Node(Server),
}

/// Creates and releases driver connections.
#[async_trait]
pub trait ConnectionProvider: Send + Sync + fmt::Debug {
  /// Read a connection of the requested kind.
  async fn acquire(&self, kind: ConnectionKind) -> Result<Arc<dyn DriverConnection>, RedisError>;

  /// Return a connection previously read from `acquire`.
  async fn release(&self, connection: Arc<dyn DriverConnection>) -> Result<(), RedisError>;

  /// Close every resource held by the provider.
  async fn destroy(&self) {}
}
