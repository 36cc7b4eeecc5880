use crate::{
  connection::sentinel::parse_primary_address,
  driver::{request_response, DriverConnection},
  error::{ErrorTranslator, RedisError, RedisErrorKind},
  protocol::{
    command::{RedisCommand, RedisCommandKind},
    utils as protocol_utils,
  },
  types::{RedisValue, SentinelServer, Server},
  utils,
};
use std::{fmt, sync::Arc, time::Duration};

struct SentinelInner {
  id:         Arc<String>,
  connection: Arc<dyn DriverConnection>,
  translator: Arc<dyn ErrorTranslator>,
  timeout:    Duration,
}

impl_log_name!(SentinelInner);

/// A connection to one sentinel node, used to inspect and manage the services it monitors.
///
/// Created by `ConnectionFactory::get_sentinel_connection`, which connects to the first sentinel that answers. Clones
/// share the same connection.
///
/// ```rust no_run
/// use conduit::prelude::*;
///
/// async fn example(factory: &ConnectionFactory) -> Result<(), RedisError> {
///   let sentinel = factory.get_sentinel_connection().await?;
///   let primary = sentinel.get_master_addr_by_name("mymaster").await?;
///   println!("Primary: {:?}", primary);
///
///   sentinel.close().await;
///   Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SentinelConnection {
  inner: Arc<SentinelInner>,
}

impl fmt::Debug for SentinelConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SentinelConnection")
      .field("id", &self.inner.id)
      .field("server", self.inner.connection.server())
      .finish()
  }
}

impl SentinelConnection {
  pub(crate) fn new(
    connection: Arc<dyn DriverConnection>,
    translator: Arc<dyn ErrorTranslator>,
    timeout: Duration,
  ) -> Self {
    SentinelConnection {
      inner: Arc::new(SentinelInner {
        id: Arc::new(format!("conduit-sentinel-{}", utils::random_string(10))),
        connection,
        translator,
        timeout,
      }),
    }
  }

  /// The sentinel node this connection talks to.
  pub fn server(&self) -> &Server {
    self.inner.connection.server()
  }

  pub fn is_open(&self) -> bool {
    self.inner.connection.is_open()
  }

  async fn request(&self, kind: RedisCommandKind, args: Vec<RedisValue>) -> Result<RedisValue, RedisError> {
    if !self.is_open() {
      return Err(RedisError::new(RedisErrorKind::Canceled, "Connection closed."));
    }

    _trace!(self.inner, "Sending {} to {}", kind.cmd_str(), self.server());
    request_response(self.inner.connection.as_ref(), RedisCommand::new(kind, args), self.inner.timeout)
      .await
      .map_err(|e| self.inner.translator.translate(e))
  }

  async fn ok_request(&self, kind: RedisCommandKind, args: Vec<RedisValue>) -> Result<(), RedisError> {
    let response = self.request(kind, args).await?;
    protocol_utils::expect_ok(&response)
  }

  /// Read the state of every monitored primary.
  ///
  /// <https://redis.io/docs/management/sentinel/#sentinel-api>
  pub async fn masters(&self) -> Result<Vec<SentinelServer>, RedisError> {
    let response = self.request(RedisCommandKind::SentinelMasters, vec![]).await?;
    SentinelServer::from_array(response)
  }

  /// Read the state of the primary monitored under `name`.
  pub async fn master(&self, name: &str) -> Result<SentinelServer, RedisError> {
    let response = self.request(RedisCommandKind::SentinelMaster, vec![name.into()]).await?;
    SentinelServer::from_value(response)
  }

  /// Read the replicas of the primary monitored under `name`.
  pub async fn replicas(&self, name: &str) -> Result<Vec<SentinelServer>, RedisError> {
    let response = self.request(RedisCommandKind::SentinelReplicas, vec![name.into()]).await?;
    SentinelServer::from_array(response)
  }

  /// Read the other sentinels monitoring the primary under `name`.
  pub async fn sentinels(&self, name: &str) -> Result<Vec<SentinelServer>, RedisError> {
    let response = self.request(RedisCommandKind::SentinelSentinels, vec![name.into()]).await?;
    SentinelServer::from_array(response)
  }

  /// Read the address of the primary monitored under `name`, or `None` if the name is unknown.
  pub async fn get_master_addr_by_name(&self, name: &str) -> Result<Option<Server>, RedisError> {
    let response = self
      .request(RedisCommandKind::SentinelGetMasterAddrByName, vec![name.into()])
      .await?;

    if response.is_null() {
      Ok(None)
    } else {
      parse_primary_address(response).map(Some)
    }
  }

  /// Force a failover of the primary monitored under `name` without asking the other sentinels.
  pub async fn failover(&self, name: &str) -> Result<(), RedisError> {
    _debug!(self.inner, "Forcing failover of {}", name);
    self.ok_request(RedisCommandKind::SentinelFailover, vec![name.into()]).await
  }

  /// Start monitoring a primary under `name`. `quorum` sentinels must agree before the primary is considered down.
  pub async fn monitor(&self, name: &str, primary: &Server, quorum: u32) -> Result<(), RedisError> {
    let args = vec![
      name.into(),
      primary.host.clone().into(),
      primary.port.into(),
      quorum.into(),
    ];
    self.ok_request(RedisCommandKind::SentinelMonitor, args).await
  }

  /// Stop monitoring the primary under `name`.
  pub async fn remove(&self, name: &str) -> Result<(), RedisError> {
    self.ok_request(RedisCommandKind::SentinelRemove, vec![name.into()]).await
  }

  /// Check whether enough sentinels are reachable to authorize a failover of the primary under `name`, returning the
  /// sentinel's description of the quorum.
  pub async fn ckquorum(&self, name: &str) -> Result<String, RedisError> {
    let response = self.request(RedisCommandKind::SentinelCkQuorum, vec![name.into()]).await?;

    response
      .into_string()
      .ok_or_else(|| RedisError::new_parse("Expected a string quorum reply."))
  }

  /// Rewrite the sentinel's config file with its current state.
  pub async fn flushconfig(&self) -> Result<(), RedisError> {
    self.ok_request(RedisCommandKind::SentinelFlushConfig, vec![]).await
  }

  /// Close the connection. Later requests fail with `Canceled`.
  pub async fn close(&self) {
    _debug!(self.inner, "Closing sentinel connection to {}", self.server());
    self.inner.connection.close().await;
  }
}
