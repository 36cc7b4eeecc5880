use crate::{
  clients::pubsub::Subscription,
  cluster::{executor::ClusterCommandExecutor, router::SlotRouter},
  connection::{
    invoker::{self, PendingResult},
    ConnectionKind,
    ConnectionProvider,
    SharedConnection,
  },
  driver::{self, DriverConnection},
  error::{ErrorTranslator, RedisError, RedisErrorKind},
  protocol::command::{RedisCommand, RedisCommandKind},
  types::{ClientConfig, MultipleStrings, PipelineFlushPolicy, RedisValue},
  utils,
};
use parking_lot::Mutex;
use std::{convert::TryFrom, fmt, mem, sync::Arc};
use tokio::sync::Mutex as AsyncMutex;

/// The execution mode of a connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionMode {
  /// Commands run immediately and return their result.
  Normal,
  /// Commands are written immediately, but their results are only available from `close_pipeline`.
  Pipelined,
  /// Commands are queued server side inside `MULTI`, and their results are only available from `exec`.
  Queueing,
  /// The connection owns a live subscription. Commands still run immediately.
  Subscribed,
}

struct ConnectionState {
  mode:         ConnectionMode,
  queue:        Vec<PendingResult>,
  buffered:     usize,
  database:     u8,
  subscription: Option<Subscription>,
  closed:       bool,
  validated:    bool,
}

/// The state shared by every handle to one logical connection.
///
/// Commands run on the factory's shared driver connection when one is configured. Pipelines, transactions, blocking
/// commands and transaction control commands always run on a dedicated driver connection that is acquired from the
/// connection provider on first use and released on `close`.
pub struct ConnectionInner {
  /// An identifier used in log lines.
  pub id:     Arc<String>,
  /// The config used to create the connection.
  pub config: Arc<ClientConfig>,
  provider:   Arc<dyn ConnectionProvider>,
  shared:     Option<Arc<SharedConnection>>,
  router:     Arc<dyn SlotRouter>,
  translator: Arc<dyn ErrorTranslator>,
  state:      Mutex<ConnectionState>,
  dedicated:  AsyncMutex<Option<Arc<dyn DriverConnection>>>,
}

impl fmt::Debug for ConnectionInner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectionInner")
      .field("id", &self.id)
      .field("mode", &self.mode())
      .field("shared", &self.shared.is_some())
      .field("clustered", &self.router.is_clustered())
      .finish()
  }
}

impl_log_name!(ConnectionInner);

impl ConnectionInner {
  pub fn new(
    config: Arc<ClientConfig>,
    provider: Arc<dyn ConnectionProvider>,
    shared: Option<Arc<SharedConnection>>,
    router: Arc<dyn SlotRouter>,
    translator: Arc<dyn ErrorTranslator>,
  ) -> Arc<ConnectionInner> {
    let id = Arc::new(format!("conduit-{}", utils::random_string(10)));
    let database = config.database.unwrap_or(0);

    Arc::new(ConnectionInner {
      id,
      config,
      provider,
      shared,
      router,
      translator,
      state: Mutex::new(ConnectionState {
        mode: ConnectionMode::Normal,
        queue: Vec::new(),
        buffered: 0,
        database,
        subscription: None,
        closed: false,
        validated: false,
      }),
      dedicated: AsyncMutex::new(None),
    })
  }

  /// Read the current mode. A subscription that is no longer alive leaves the connection in `Normal` mode.
  pub fn mode(&self) -> ConnectionMode {
    let state = self.state.lock();

    match state.mode {
      ConnectionMode::Subscribed => {
        let alive = state.subscription.as_ref().map(|s| s.is_alive()).unwrap_or(false);
        if alive {
          ConnectionMode::Subscribed
        } else {
          ConnectionMode::Normal
        }
      },
      mode => mode,
    }
  }

  pub fn is_pipelined(&self) -> bool {
    self.mode() == ConnectionMode::Pipelined
  }

  pub fn is_queueing(&self) -> bool {
    self.mode() == ConnectionMode::Queueing
  }

  pub fn is_subscribed(&self) -> bool {
    self.mode() == ConnectionMode::Subscribed
  }

  pub fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  pub fn is_clustered(&self) -> bool {
    self.router.is_clustered()
  }

  /// Whether the connection sends non-blocking commands on the factory's shared driver connection.
  pub fn uses_shared_connection(&self) -> bool {
    self.shared.is_some()
  }

  /// Read the selected database index.
  pub fn database(&self) -> u8 {
    self.state.lock().database
  }

  /// Read the live subscription, if any.
  pub fn subscription(&self) -> Option<Subscription> {
    self.state.lock().subscription.clone().filter(|s| s.is_alive())
  }

  pub fn router(&self) -> &Arc<dyn SlotRouter> {
    &self.router
  }

  /// Read the executor used to emulate multi-key commands, or an error when not running against a cluster.
  pub fn cluster_executor(&self) -> Result<&Arc<ClusterCommandExecutor>, RedisError> {
    self.router.cluster_executor()
  }

  pub fn translate(&self, error: RedisError) -> RedisError {
    self.translator.translate(error)
  }

  fn default_database(&self) -> u8 {
    self.config.database.unwrap_or(0)
  }

  fn connection_kind(&self) -> ConnectionKind {
    if self.router.is_clustered() {
      ConnectionKind::Cluster
    } else {
      ConnectionKind::Plain
    }
  }

  fn check_open(&self) -> Result<(), RedisError> {
    if self.state.lock().closed {
      Err(RedisError::new(RedisErrorKind::InvalidCommand, "Connection is closed."))
    } else {
      Ok(())
    }
  }

  /// Check that a command emulated with several round trips can run in the current mode.
  pub fn check_emulation(&self, operation: &str) -> Result<(), RedisError> {
    self.check_open()?;

    match self.mode() {
      ConnectionMode::Pipelined | ConnectionMode::Queueing => Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        format!(
          "{} across hash slots is not supported in pipeline / transaction mode.",
          operation
        ),
      )),
      _ => Ok(()),
    }
  }

  fn check_command(&self, mode: ConnectionMode, command: &RedisCommand) -> Result<(), RedisError> {
    match command.kind {
      RedisCommandKind::Watch | RedisCommandKind::Unwatch | RedisCommandKind::Move if self.router.is_clustered() => {
        Err(RedisError::new_cluster_unsupported(command.kind.cmd_str()))
      },
      RedisCommandKind::Watch | RedisCommandKind::Unwatch if mode == ConnectionMode::Queueing => Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "WATCH is not supported when a transaction is active",
      )),
      RedisCommandKind::Multi | RedisCommandKind::Exec | RedisCommandKind::Discard => Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "Use multi, exec or discard to control transactions.",
      )),
      kind if kind.is_subscribe() || kind.is_unsubscribe() => Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "Use subscribe or psubscribe to receive messages.",
      )),
      _ => Ok(()),
    }
  }

  fn requires_dedicated(&self, mode: ConnectionMode, command: &RedisCommand) -> bool {
    self.shared.is_none()
      || matches!(mode, ConnectionMode::Pipelined | ConnectionMode::Queueing)
      || command.is_blocking()
      || command.kind.is_transaction_command()
  }

  /// Read the dedicated driver connection, acquiring a new one if it does not exist or was closed.
  async fn dedicated_connection(&self) -> Result<Arc<dyn DriverConnection>, RedisError> {
    let mut guard = self.dedicated.lock().await;

    if let Some(connection) = guard.as_ref() {
      if connection.is_open() {
        return Ok(connection.clone());
      }
    }
    if let Some(old) = guard.take() {
      _debug!(self, "Replacing closed dedicated connection {}", old.id());
      if let Err(e) = self.provider.release(old).await {
        _warn!(self, "Failed to release closed connection: {:?}", e);
      }
    }

    let connection = self
      .provider
      .acquire(self.connection_kind())
      .await
      .map_err(|e| self.translate(e))?;
    let database = self.state.lock().database;
    if database != self.default_database() {
      _debug!(self, "Selecting database {} on new connection {}", database, connection.id());
      let command = RedisCommand::new(RedisCommandKind::Select, vec![database.into()]);

      if let Err(e) = driver::request_response(connection.as_ref(), command, self.config.command_timeout).await {
        let _ = self.provider.release(connection).await;
        return Err(self.translate(e));
      }
    }

    *guard = Some(connection.clone());
    Ok(connection)
  }

  async fn connection_for(
    &self,
    mode: ConnectionMode,
    command: &RedisCommand,
  ) -> Result<Arc<dyn DriverConnection>, RedisError> {
    match self.shared {
      Some(ref shared) if !self.requires_dedicated(mode, command) => {
        let validated = mem::replace(&mut self.state.lock().validated, true);
        let connection = if validated {
          shared.get().await
        } else {
          shared.get_validated().await
        };

        connection.map_err(|e| self.translate(e))
      },
      _ => self.dedicated_connection().await,
    }
  }

  async fn run(&self, connection: &dyn DriverConnection, command: RedisCommand) -> Result<RedisValue, RedisError> {
    let timeout = utils::command_timeout(self.config.command_timeout, &command);
    let shape = command.reply_shape();
    _trace!(self, "Sending {} to {}", command.cmd_str(), connection.server());

    let frame = utils::apply_timeout(connection.dispatch(command), timeout)
      .await
      .map_err(|e| self.translate(e))?;
    shape.convert(frame).map_err(|e| self.translate(e))
  }

  fn enqueue(&self, connection: &dyn DriverConnection, command: RedisCommand) -> Result<RedisValue, RedisError> {
    let mut state = self.state.lock();
    if !matches!(state.mode, ConnectionMode::Pipelined | ConnectionMode::Queueing) {
      return Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "The pipeline or transaction closed while the command was issued.",
      ));
    }

    state.queue.push(PendingResult::dispatch(connection, command));
    if state.mode == ConnectionMode::Pipelined {
      if let PipelineFlushPolicy::Buffered(count) = self.config.flush_policy {
        state.buffered += 1;
        if state.buffered >= count {
          connection.flush();
          state.buffered = 0;
        }
      }
    }

    Ok(RedisValue::Queued)
  }

  /// Send a command in the current mode.
  ///
  /// Pipelined and queued commands return `RedisValue::Queued`, and their results are returned when the batch closes.
  pub async fn request(&self, command: RedisCommand) -> Result<RedisValue, RedisError> {
    self.check_open()?;
    let mode = self.mode();
    self.check_command(mode, &command)?;

    let connection = self.connection_for(mode, &command).await?;
    match mode {
      ConnectionMode::Pipelined | ConnectionMode::Queueing => self.enqueue(connection.as_ref(), command),
      ConnectionMode::Normal | ConnectionMode::Subscribed => self.run(connection.as_ref(), command).await,
    }
  }

  /// Send a command by name, resolving the name in the command registry and checking its arity.
  pub async fn execute(&self, name: &str, args: Vec<RedisValue>) -> Result<RedisValue, RedisError> {
    let command = RedisCommand::new_custom(name, args).map_err(|e| self.translate(e))?;
    command.check_arity().map_err(|e| self.translate(e))?;

    match command.kind {
      RedisCommandKind::Multi => self.multi().await.map(|_| RedisValue::new_ok()),
      RedisCommandKind::Exec => Ok(match self.exec().await? {
        Some(values) => RedisValue::Array(values),
        None => RedisValue::Null,
      }),
      RedisCommandKind::Discard => self.discard().await.map(|_| RedisValue::new_ok()),
      RedisCommandKind::Select => {
        let db = command
          .args
          .first()
          .and_then(|arg| arg.as_u64())
          .and_then(|db| u8::try_from(db).ok())
          .ok_or_else(|| RedisError::new(RedisErrorKind::InvalidArgument, "Invalid database index."))?;

        self.select(db).await.map(|_| RedisValue::new_ok())
      },
      _ => self.request(command).await,
    }
  }

  /// Start a pipeline. Opening a pipeline twice has no effect.
  pub async fn open_pipeline(&self) -> Result<(), RedisError> {
    self.check_open()?;
    match self.mode() {
      ConnectionMode::Pipelined => return Ok(()),
      ConnectionMode::Queueing => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Cannot open a pipeline while a transaction is active.",
        ))
      },
      ConnectionMode::Subscribed => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Cannot open a pipeline while subscribed.",
        ))
      },
      ConnectionMode::Normal => {},
    };
    if let PipelineFlushPolicy::Buffered(0) = self.config.flush_policy {
      return Err(RedisError::new(
        RedisErrorKind::Config,
        "Buffered flush policy requires a buffer size greater than zero.",
      ));
    }

    let connection = self.dedicated_connection().await?;
    if self.config.flush_policy != PipelineFlushPolicy::EachCommand {
      connection.set_auto_flush(false);
    }

    let mut state = self.state.lock();
    state.mode = ConnectionMode::Pipelined;
    state.queue.clear();
    state.buffered = 0;
    _debug!(self, "Opened pipeline with {:?}", self.config.flush_policy);
    Ok(())
  }

  /// Flush the pipeline and wait for every result, returning them in issue order without status replies.
  ///
  /// Closing a connection that is not pipelined returns an empty list.
  pub async fn close_pipeline(&self) -> Result<Vec<RedisValue>, RedisError> {
    let pending = {
      let mut state = self.state.lock();
      if state.mode != ConnectionMode::Pipelined {
        return Ok(Vec::new());
      }

      state.mode = ConnectionMode::Normal;
      state.buffered = 0;
      mem::take(&mut state.queue)
    };

    let connection = self.dedicated.lock().await.clone();
    if let Some(connection) = connection {
      connection.flush();
      connection.set_auto_flush(true);
    }

    _debug!(self, "Closing pipeline with {} command(s)", pending.len());
    let resolved = invoker::await_all(pending, self.config.command_timeout).await;
    invoker::collect_results(
      resolved,
      self.config.convert_pipeline_and_tx_results,
      self.translator.as_ref(),
    )
  }

  /// Start a transaction. Starting a transaction twice has no effect.
  pub async fn multi(&self) -> Result<(), RedisError> {
    self.check_open()?;
    if self.router.is_clustered() {
      return Err(RedisError::new_cluster_unsupported("MULTI"));
    }
    match self.mode() {
      ConnectionMode::Queueing => return Ok(()),
      ConnectionMode::Pipelined => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Cannot start a transaction while a pipeline is open.",
        ))
      },
      ConnectionMode::Subscribed => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Cannot start a transaction while subscribed.",
        ))
      },
      ConnectionMode::Normal => {},
    };

    let connection = self.dedicated_connection().await?;
    let command = RedisCommand::new(RedisCommandKind::Multi, vec![]);
    self.run(connection.as_ref(), command).await?;

    let mut state = self.state.lock();
    state.mode = ConnectionMode::Queueing;
    state.queue.clear();
    Ok(())
  }

  fn take_transaction(&self) -> Result<Vec<PendingResult>, RedisError> {
    let mut state = self.state.lock();
    if state.mode != ConnectionMode::Queueing {
      return Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "No ongoing transaction. Did you forget to call multi?",
      ));
    }

    state.mode = ConnectionMode::Normal;
    Ok(mem::take(&mut state.queue))
  }

  /// Resolve the commands of a transaction whose connection was lost, failing each of them with `error`.
  async fn abandon_transaction(&self, queued: Vec<PendingResult>, error: RedisError) -> RedisError {
    _warn!(self, "Abandoning transaction with {} command(s): {:?}", queued.len(), error);
    let resolved = invoker::await_all(queued, self.config.command_timeout).await;
    let partial = resolved.iter().map(|_| Err(error.clone())).collect();

    RedisError::new_pipeline(error, partial)
  }

  /// Run the queued commands, returning their results in issue order without status replies.
  ///
  /// Returns `None` when a watched key was modified and the transaction was aborted.
  pub async fn exec(&self) -> Result<Option<Vec<RedisValue>>, RedisError> {
    self.check_open()?;
    let queued = self.take_transaction()?;
    let connection = match self.dedicated_connection().await {
      Ok(connection) => connection,
      Err(e) => return Err(self.abandon_transaction(queued, e).await),
    };

    _debug!(self, "Executing transaction with {} command(s)", queued.len());
    let exec = PendingResult::dispatch(
      connection.as_ref(),
      RedisCommand::new(RedisCommandKind::Exec, vec![]),
    );
    invoker::exec_results(
      queued,
      exec,
      self.config.command_timeout,
      self.config.convert_pipeline_and_tx_results,
      self.translator.as_ref(),
    )
    .await
  }

  /// Discard the queued commands.
  pub async fn discard(&self) -> Result<(), RedisError> {
    self.check_open()?;
    let queued = self.take_transaction()?;
    let connection = match self.dedicated_connection().await {
      Ok(connection) => connection,
      Err(e) => return Err(self.abandon_transaction(queued, e).await),
    };

    let command = RedisCommand::new(RedisCommandKind::Discard, vec![]);
    let result = self.run(connection.as_ref(), command).await;
    let _ = invoker::await_all(queued, self.config.command_timeout).await;
    result.map(|_| ())
  }

  /// Select the database used by the dedicated connection.
  pub async fn select(&self, db: u8) -> Result<(), RedisError> {
    self.check_open()?;
    if self.router.is_clustered() {
      return if db == 0 {
        Ok(())
      } else {
        Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Cannot SELECT non zero index in cluster mode.",
        ))
      };
    }
    if self.shared.is_some() {
      return Err(RedisError::new(
        RedisErrorKind::InvalidCommand,
        "Selecting a new database is not supported with a shared connection. Use separate connection factories to \
         work with multiple databases.",
      ));
    }

    let command = RedisCommand::new(RedisCommandKind::Select, vec![db.into()]);
    self.request(command).await?;
    self.state.lock().database = db;
    Ok(())
  }

  async fn open_subscription(&self, targets: MultipleStrings, pattern: bool) -> Result<Subscription, RedisError> {
    self.check_open()?;
    match self.mode() {
      ConnectionMode::Pipelined | ConnectionMode::Queueing => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Cannot subscribe in pipeline / transaction mode",
        ))
      },
      ConnectionMode::Subscribed => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "Connection already subscribed",
        ))
      },
      ConnectionMode::Normal => {},
    };

    let connection = self
      .provider
      .acquire(ConnectionKind::PubSub)
      .await
      .map_err(|e| self.translate(e))?;
    let subscription = Subscription::new(
      self.id.clone(),
      connection,
      self.provider.clone(),
      self.translator.clone(),
      self.config.command_timeout,
    );

    let result = if pattern {
      subscription.psubscribe(targets).await
    } else {
      subscription.subscribe(targets).await
    };
    if let Err(e) = result {
      subscription.close().await;
      return Err(e);
    }

    let mut state = self.state.lock();
    state.mode = ConnectionMode::Subscribed;
    state.subscription = Some(subscription.clone());
    Ok(subscription)
  }

  /// Subscribe to channels on a new pubsub connection.
  pub async fn subscribe(&self, channels: MultipleStrings) -> Result<Subscription, RedisError> {
    self.open_subscription(channels, false).await
  }

  /// Subscribe to channel patterns on a new pubsub connection.
  pub async fn psubscribe(&self, patterns: MultipleStrings) -> Result<Subscription, RedisError> {
    self.open_subscription(patterns, true).await
  }

  /// Close the connection.
  ///
  /// Closes the subscription, abandons an open pipeline or transaction, restores the configured database and releases
  /// the dedicated connection. Closing twice has no effect.
  pub async fn close(&self) {
    let (mode, pending, subscription, database) = {
      let mut state = self.state.lock();
      if state.closed {
        return;
      }

      state.closed = true;
      let mode = mem::replace(&mut state.mode, ConnectionMode::Normal);
      (mode, mem::take(&mut state.queue), state.subscription.take(), state.database)
    };
    _debug!(self, "Closing connection in {:?} mode", mode);

    if let Some(subscription) = subscription {
      subscription.close().await;
    }

    let dedicated = self.dedicated.lock().await.take();
    let connection = match dedicated {
      Some(connection) => connection,
      None => return,
    };
    match mode {
      ConnectionMode::Pipelined => {
        connection.flush();
        connection.set_auto_flush(true);
      },
      ConnectionMode::Queueing => {
        let command = RedisCommand::new(RedisCommandKind::Discard, vec![]);
        if let Err(e) = driver::request_response(connection.as_ref(), command, self.config.command_timeout).await {
          _warn!(self, "Failed to discard transaction: {:?}", e);
        }
      },
      _ => {},
    };
    let _ = invoker::await_all(pending, self.config.command_timeout).await;

    let default_database = self.default_database();
    if database != default_database && connection.is_open() {
      let command = RedisCommand::new(RedisCommandKind::Select, vec![default_database.into()]);
      if let Err(e) = driver::request_response(connection.as_ref(), command, self.config.command_timeout).await {
        _warn!(self, "Failed to reset the database index: {:?}", e);
      }
    }
    if let Err(e) = self.provider.release(connection).await {
      _warn!(self, "Failed to release connection: {:?}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    cluster::router::StandaloneRouter,
    connection::{PoolingConnectionProvider, StandaloneConnectionProvider},
    driver::ConnectOptions,
    error::DefaultErrorTranslator,
    mocks::MockDriver,
    types::{PoolConfig, Server},
  };
  use std::time::Duration;

  fn provider(driver: &MockDriver, config: &ClientConfig) -> Arc<dyn ConnectionProvider> {
    let options = ConnectOptions::from_config(config, driver.servers()[0].clone());
    Arc::new(StandaloneConnectionProvider::new(Arc::new(driver.clone()), options))
  }

  fn connection(driver: &MockDriver, config: ClientConfig, share: bool) -> Arc<ConnectionInner> {
    let provider = provider(driver, &config);
    let shared = if share {
      Some(Arc::new(SharedConnection::new(
        provider.clone(),
        ConnectionKind::Plain,
        false,
        config.command_timeout,
      )))
    } else {
      None
    };

    on_shared(provider, shared, config)
  }

  fn on_shared(
    provider: Arc<dyn ConnectionProvider>,
    shared: Option<Arc<SharedConnection>>,
    config: ClientConfig,
  ) -> Arc<ConnectionInner> {
    ConnectionInner::new(
      Arc::new(config),
      provider,
      shared,
      Arc::new(StandaloneRouter),
      Arc::new(DefaultErrorTranslator),
    )
  }

  fn pings(driver: &MockDriver) -> usize {
    driver
      .commands_on(&server(driver))
      .into_iter()
      .filter(|name| name == "PING")
      .count()
  }

  fn set(key: &str, value: &str) -> RedisCommand {
    RedisCommand::new(RedisCommandKind::Set, vec![key.into(), value.into()])
  }

  fn get(key: &str) -> RedisCommand {
    RedisCommand::new(RedisCommandKind::Get, vec![key.into()])
  }

  fn incr(key: &str) -> RedisCommand {
    RedisCommand::new(RedisCommandKind::Incr, vec![key.into()])
  }

  fn server(driver: &MockDriver) -> Server {
    driver.servers()[0].clone()
  }

  #[tokio::test]
  async fn should_validate_the_shared_connection_once_per_connection() {
    let driver = MockDriver::standalone();
    let config = ClientConfig::default();
    let provider = provider(&driver, &config);
    let shared = Arc::new(SharedConnection::new(
      provider.clone(),
      ConnectionKind::Plain,
      true,
      config.command_timeout,
    ));

    let first = on_shared(provider.clone(), Some(shared.clone()), config.clone());
    for _ in 0 .. 10 {
      first.request(get("foo")).await.unwrap();
    }
    // a new shared connection is not checked with PING
    assert_eq!(pings(&driver), 0);

    let second = on_shared(provider, Some(shared), config);
    for _ in 0 .. 10 {
      second.request(get("foo")).await.unwrap();
    }
    assert_eq!(pings(&driver), 1);
    assert_eq!(driver.connect_count(), 1);
  }

  #[tokio::test]
  async fn should_fail_queued_commands_when_the_transaction_connection_is_lost() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), false);

    inner.multi().await.unwrap();
    assert_eq!(inner.request(incr("foo")).await.unwrap(), RedisValue::Queued);
    assert_eq!(inner.request(incr("bar")).await.unwrap(), RedisValue::Queued);

    driver.fail_server(&server(&driver));
    let mut error = inner.exec().await.unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::Pipeline);
    let partial = error.take_partial_results().unwrap();
    assert_eq!(partial.len(), 2);
    assert!(partial.iter().all(|result| result.is_err()));
    assert_eq!(inner.mode(), ConnectionMode::Normal);

    driver.recover_server(&server(&driver));
    assert_eq!(inner.request(incr("foo")).await.unwrap(), RedisValue::Integer(1));
  }

  #[tokio::test]
  async fn should_run_commands_immediately() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), true);

    assert_eq!(inner.request(set("foo", "bar")).await.unwrap(), RedisValue::new_ok());
    assert_eq!(inner.request(get("foo")).await.unwrap(), RedisValue::from("bar"));
    assert_eq!(inner.mode(), ConnectionMode::Normal);
    assert_eq!(driver.open_connections(), 1);
  }

  #[tokio::test]
  async fn should_return_pipeline_results_in_order() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), true);

    inner.open_pipeline().await.unwrap();
    inner.open_pipeline().await.unwrap();
    assert_eq!(inner.request(set("foo", "1")).await.unwrap(), RedisValue::Queued);
    inner.request(incr("foo")).await.unwrap();
    inner.request(get("foo")).await.unwrap();

    let results = inner.close_pipeline().await.unwrap();
    assert_eq!(results, vec![RedisValue::Integer(2), RedisValue::from("2")]);
    assert!(inner.close_pipeline().await.unwrap().is_empty());
    assert_eq!(inner.mode(), ConnectionMode::Normal);
  }

  #[tokio::test]
  async fn should_flush_pipeline_on_close() {
    let driver = MockDriver::standalone();
    let config = ClientConfig {
      flush_policy: PipelineFlushPolicy::OnClose,
      ..ClientConfig::default()
    };
    let inner = connection(&driver, config, false);

    inner.open_pipeline().await.unwrap();
    inner.request(set("foo", "1")).await.unwrap();
    inner.request(get("foo")).await.unwrap();
    assert!(!driver.commands_on(&server(&driver)).contains(&"SET".to_owned()));

    let results = inner.close_pipeline().await.unwrap();
    assert_eq!(results, vec![RedisValue::from("1")]);
    assert!(driver.commands_on(&server(&driver)).contains(&"SET".to_owned()));
  }

  #[tokio::test]
  async fn should_flush_buffered_pipelines() {
    let driver = MockDriver::standalone();
    let config = ClientConfig {
      flush_policy: PipelineFlushPolicy::Buffered(2),
      ..ClientConfig::default()
    };
    let inner = connection(&driver, config, false);

    inner.open_pipeline().await.unwrap();
    inner.request(incr("foo")).await.unwrap();
    assert!(!driver.commands_on(&server(&driver)).contains(&"INCR".to_owned()));
    inner.request(incr("foo")).await.unwrap();
    assert!(driver.commands_on(&server(&driver)).contains(&"INCR".to_owned()));
    inner.request(incr("foo")).await.unwrap();

    let results = inner.close_pipeline().await.unwrap();
    assert_eq!(results, vec![
      RedisValue::Integer(1),
      RedisValue::Integer(2),
      RedisValue::Integer(3)
    ]);
  }

  #[tokio::test]
  async fn should_collect_pipeline_failures() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), false);
    inner.request(set("foo", "bar")).await.unwrap();

    inner.open_pipeline().await.unwrap();
    inner.request(get("foo")).await.unwrap();
    inner.request(incr("foo")).await.unwrap();
    inner.request(get("foo")).await.unwrap();

    let error = inner.close_pipeline().await.unwrap_err();
    assert!(error.is_pipeline());
    let partial = error.partial_results().unwrap();
    assert_eq!(partial.len(), 3);
    assert!(partial[1].is_err());
    assert_eq!(partial[2], Ok(RedisValue::from("bar")));
  }

  #[tokio::test]
  async fn should_run_transactions() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), true);

    inner.multi().await.unwrap();
    inner.multi().await.unwrap();
    assert_eq!(inner.request(set("foo", "1")).await.unwrap(), RedisValue::Queued);
    inner.request(incr("foo")).await.unwrap();

    let results = inner.exec().await.unwrap();
    assert_eq!(results, Some(vec![RedisValue::Integer(2)]));
    assert_eq!(inner.request(get("foo")).await.unwrap(), RedisValue::from("2"));
  }

  #[tokio::test]
  async fn should_abort_when_a_watched_key_changes() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), true);
    let other = connection(&driver, ClientConfig::default(), false);

    let watch = RedisCommand::new(RedisCommandKind::Watch, vec!["foo".into()]);
    inner.request(watch).await.unwrap();
    other.request(set("foo", "changed")).await.unwrap();

    inner.multi().await.unwrap();
    inner.request(set("foo", "mine")).await.unwrap();
    assert_eq!(inner.exec().await.unwrap(), None);
    assert_eq!(other.request(get("foo")).await.unwrap(), RedisValue::from("changed"));
  }

  #[tokio::test]
  async fn should_discard_transactions() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), false);

    inner.multi().await.unwrap();
    inner.request(set("foo", "1")).await.unwrap();
    inner.discard().await.unwrap();

    assert_eq!(inner.request(get("foo")).await.unwrap(), RedisValue::Null);
    let error = inner.exec().await.unwrap_err();
    assert_eq!(error.details(), "No ongoing transaction. Did you forget to call multi?");
    assert!(inner.discard().await.is_err());
  }

  #[tokio::test]
  async fn should_reject_invalid_mode_changes() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), false);

    inner.multi().await.unwrap();
    let watch = RedisCommand::new(RedisCommandKind::Watch, vec!["foo".into()]);
    let error = inner.request(watch).await.unwrap_err();
    assert_eq!(error.details(), "WATCH is not supported when a transaction is active");
    assert_eq!(*inner.open_pipeline().await.unwrap_err().kind(), RedisErrorKind::InvalidCommand);
    let error = inner.subscribe("foo".into()).await.unwrap_err();
    assert_eq!(error.details(), "Cannot subscribe in pipeline / transaction mode");
    inner.discard().await.unwrap();

    inner.open_pipeline().await.unwrap();
    assert!(inner.multi().await.is_err());
    assert!(inner.subscribe("foo".into()).await.is_err());
    inner.close_pipeline().await.unwrap();
  }

  #[tokio::test]
  async fn should_track_subscriptions() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), true);

    let subscription = inner.subscribe("foo".into()).await.unwrap();
    assert_eq!(inner.mode(), ConnectionMode::Subscribed);
    let error = inner.psubscribe("f*".into()).await.unwrap_err();
    assert_eq!(error.details(), "Connection already subscribed");

    let publish = RedisCommand::new(RedisCommandKind::Publish, vec!["foo".into(), "bar".into()]);
    assert_eq!(inner.request(publish).await.unwrap(), RedisValue::Integer(1));

    subscription.unsubscribe(Vec::<String>::new()).await.unwrap();
    assert_eq!(inner.mode(), ConnectionMode::Normal);
    assert!(inner.subscription().is_none());
  }

  #[tokio::test]
  async fn should_select_and_reset_the_database() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), false);

    inner.select(2).await.unwrap();
    inner.request(set("foo", "bar")).await.unwrap();
    assert_eq!(inner.database(), 2);
    inner.close().await;

    let selects = driver
      .commands_on(&server(&driver))
      .into_iter()
      .filter(|name| name == "SELECT")
      .count();
    assert_eq!(selects, 2);

    let other = connection(&driver, ClientConfig::default(), false);
    assert_eq!(other.request(get("foo")).await.unwrap(), RedisValue::Null);
  }

  #[tokio::test]
  async fn should_reject_select_with_a_shared_connection() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), true);

    let error = inner.select(1).await.unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);
  }

  #[tokio::test]
  async fn should_run_custom_commands() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), false);

    let result = inner.execute("SET", vec!["foo".into(), "bar".into()]).await.unwrap();
    assert!(result.is_ok());
    assert_eq!(
      inner.execute("get", vec!["foo".into()]).await.unwrap(),
      RedisValue::from("bar")
    );

    let error = inner.execute("GET", vec![]).await.unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::InvalidArgument);

    inner.execute("MULTI", vec![]).await.unwrap();
    assert!(inner.is_queueing());
    inner.execute("INCR", vec!["bar".into()]).await.unwrap();
    let result = inner.execute("EXEC", vec![]).await.unwrap();
    assert_eq!(result, RedisValue::Array(vec![RedisValue::Integer(1)]));
  }

  #[tokio::test]
  async fn should_reject_commands_after_close() {
    let driver = MockDriver::standalone();
    let inner = connection(&driver, ClientConfig::default(), false);

    inner.request(set("foo", "bar")).await.unwrap();
    inner.close().await;
    inner.close().await;

    assert!(inner.request(get("foo")).await.is_err());
    assert_eq!(driver.open_connections(), 0);
  }

  #[tokio::test]
  async fn should_discard_open_transactions_before_returning_to_the_pool() {
    let driver = MockDriver::standalone();
    let config = ClientConfig::default();
    let pool = PoolConfig {
      max_total: 1,
      max_idle:  1,
      max_wait:  Duration::from_millis(100),
    };
    let provider: Arc<dyn ConnectionProvider> = Arc::new(PoolingConnectionProvider::new(
      provider(&driver, &config),
      pool,
      config.command_timeout,
    ));

    let first = ConnectionInner::new(
      Arc::new(config.clone()),
      provider.clone(),
      None,
      Arc::new(StandaloneRouter),
      Arc::new(DefaultErrorTranslator),
    );
    first.multi().await.unwrap();
    first.request(set("foo", "bar")).await.unwrap();
    first.close().await;

    let second = ConnectionInner::new(
      Arc::new(config),
      provider,
      None,
      Arc::new(StandaloneRouter),
      Arc::new(DefaultErrorTranslator),
    );
    assert_eq!(second.request(get("foo")).await.unwrap(), RedisValue::Null);
    assert_eq!(driver.connect_count(), 1);
  }
}
