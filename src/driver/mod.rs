//! The contract with the low level driver that owns sockets and the wire protocol.
//!
//! Everything above this module only sees `Arc<dyn DriverConnection>` values and RESP2 frames. The crate ships a TCP
//! driver, a slot-routing cluster connection built on top of any driver, and an in-memory driver behind the `mocks`
//! feature.

use crate::{
  error::{RedisError, RedisErrorKind},
  protocol::{
    cluster::parse_cluster_nodes,
    command::{RedisCommand, RedisCommandKind},
    utils as protocol_utils,
  },
  types::*,
  utils,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::broadcast;

pub mod cluster;
pub mod tcp;

pub use cluster::ClusterDriverConnection;
pub use tcp::TcpDriver;

/// The future returned by `dispatch`.
///
/// Server error replies resolve to `Ok(Resp2Frame::Error)`. An `Err` means the command never received a reply.
pub type ResponseFuture = BoxFuture<'static, Result<Resp2Frame, RedisError>>;

/// Options used to dial one server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectOptions {
  pub server:          Server,
  pub username:        Option<String>,
  pub password:        Option<String>,
  /// The database selected after connecting.
  pub database:        Option<u8>,
  pub client_name:     Option<String>,
  pub tls:             Option<TlsConfig>,
  pub connect_timeout: Duration,
  /// Whether the connection will be used to receive pubsub messages.
  pub pubsub:          bool,
}

impl ConnectOptions {
  pub fn from_config(config: &ClientConfig, server: Server) -> Self {
    ConnectOptions {
      server,
      username: config.username.clone(),
      password: config.password.clone(),
      database: config.database,
      client_name: config.client_name.clone(),
      tls: config.tls.clone(),
      connect_timeout: config.connect_timeout,
      pubsub: false,
    }
  }

  /// Copy the options with a different server.
  pub fn with_server(&self, server: Server) -> Self {
    ConnectOptions {
      server,
      ..self.clone()
    }
  }

  /// Copy the options for a pubsub connection.
  pub fn as_pubsub(&self) -> Self {
    ConnectOptions {
      pubsub: true,
      ..self.clone()
    }
  }
}

/// A live connection returned by a `Driver`.
#[async_trait]
pub trait DriverConnection: Send + Sync + fmt::Debug {
  /// A unique identifier for the connection, used by pools to track checkouts.
  fn id(&self) -> u64;

  /// The server the connection was dialed against.
  fn server(&self) -> &Server;

  /// Write the command and return a future that resolves to its reply frame.
  ///
  /// Replies resolve in the order commands were dispatched.
  fn dispatch(&self, command: RedisCommand) -> ResponseFuture;

  /// Whether commands are written to the socket as soon as they are dispatched.
  fn set_auto_flush(&self, enabled: bool);

  /// Write every buffered command to the socket.
  fn flush(&self);

  fn is_open(&self) -> bool;

  /// Whether the connection sent `MULTI` without a matching `EXEC` or `DISCARD`.
  fn is_multi(&self) -> bool;

  /// Subscribe to pubsub messages received on the connection.
  fn messages(&self) -> Option<broadcast::Receiver<Message>> {
    None
  }

  /// Close the connection, failing any commands still in flight.
  async fn close(&self);
}

/// A factory for driver connections.
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
  /// Dial the server described by `options` and run the connection handshake.
  async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn DriverConnection>, RedisError>;

  /// Release driver level resources, waiting up to `quiet_period` for connections to close but never longer than
  /// `timeout`.
  async fn shutdown(&self, _quiet_period: Duration, _timeout: Duration) -> Result<(), RedisError> {
    Ok(())
  }

  /// Read the cluster state from the server in `options` with `CLUSTER NODES`.
  async fn fetch_topology(&self, options: &ConnectOptions) -> Result<Vec<ClusterNode>, RedisError> {
    let connection = self.connect(options).await?;
    let command = RedisCommand::new(RedisCommandKind::ClusterNodes, vec![]);
    let result = request_response(connection.as_ref(), command, options.connect_timeout).await;
    connection.close().await;

    let response = result?;
    let text = match response.as_str() {
      Some(text) => text.into_owned(),
      None => {
        return Err(RedisError::new(
          RedisErrorKind::Protocol,
          "Invalid CLUSTER NODES response.",
        ))
      },
    };
    parse_cluster_nodes(&text, Some(&options.server))
  }
}

/// Dispatch a command and wait for its reply, converting error frames into errors.
pub async fn request_response(
  connection: &dyn DriverConnection,
  command: RedisCommand,
  timeout: Duration,
) -> Result<RedisValue, RedisError> {
  let frame = utils::apply_timeout(connection.dispatch(command), timeout).await?;
  protocol_utils::frame_to_results(frame)
}

/// Run the connection handshake: `AUTH`, `SELECT` and `CLIENT SETNAME`.
pub(crate) async fn handshake(connection: &dyn DriverConnection, options: &ConnectOptions) -> Result<(), RedisError> {
  if let Some(ref password) = options.password {
    let mut args: Vec<RedisValue> = Vec::with_capacity(2);
    if let Some(ref username) = options.username {
      args.push(username.into());
    }
    args.push(password.into());

    let command = RedisCommand::new(RedisCommandKind::Auth, args);
    if let Err(mut e) = request_response(connection, command, options.connect_timeout).await {
      e.change_kind(RedisErrorKind::Auth);
      return Err(e);
    }
  }
  if let Some(db) = options.database {
    let command = RedisCommand::new(RedisCommandKind::Select, vec![db.into()]);
    request_response(connection, command, options.connect_timeout).await?;
  }
  if let Some(ref name) = options.client_name {
    let command = RedisCommand::new(RedisCommandKind::ClientSetName, vec![name.into()]);
    request_response(connection, command, options.connect_timeout).await?;
  }

  Ok(())
}
