use crate::{
  connection::{ConnectionKind, ConnectionProvider},
  driver::DriverConnection,
  error::{RedisError, RedisErrorKind},
  protocol::command::{RedisCommand, RedisCommandKind},
  types::PoolConfig,
  utils,
};
use async_trait::async_trait;
use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::{
  collections::HashMap,
  fmt,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct Pool {
  idle:    SegQueue<Arc<dyn DriverConnection>>,
  permits: Arc<Semaphore>,
}

impl Pool {
  fn new(max_total: usize) -> Self {
    Pool {
      idle:    SegQueue::new(),
      permits: Arc::new(Semaphore::new(max_total)),
    }
  }
}

struct CheckedOut {
  kind:    ConnectionKind,
  // returned to the pool's semaphore when the entry is dropped
  _permit: OwnedSemaphorePermit,
  conn:    Arc<dyn DriverConnection>,
}

/// A provider that keeps one bounded pool of connections per connection kind.
///
/// Pools are created on first use and filled by the wrapped provider. A checkout waits up to `max_wait` for a free
/// slot and then fails with `PoolExhausted`.
pub struct PoolingConnectionProvider {
  inner:       Arc<dyn ConnectionProvider>,
  config:      PoolConfig,
  timeout:     Duration,
  pools:       Mutex<HashMap<ConnectionKind, Arc<Pool>>>,
  checked_out: Mutex<HashMap<u64, CheckedOut>>,
  in_flight:   AtomicUsize,
  destroyed:   AtomicBool,
}

impl fmt::Debug for PoolingConnectionProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PoolingConnectionProvider")
      .field("config", &self.config)
      .field("active", &self.active_count())
      .finish()
  }
}

fn destroyed_error() -> RedisError {
  RedisError::new(RedisErrorKind::Canceled, "Connection provider was destroyed.")
}

fn exhausted_error() -> RedisError {
  RedisError::new(RedisErrorKind::PoolExhausted, "Could not get a resource from the pool")
}

impl PoolingConnectionProvider {
  /// Wrap a provider with pools sized by `config`. `timeout` bounds the `DISCARD` sent to connections returned
  /// mid-transaction.
  pub fn new(inner: Arc<dyn ConnectionProvider>, config: PoolConfig, timeout: Duration) -> Self {
    PoolingConnectionProvider {
      inner,
      config,
      timeout,
      pools: Mutex::new(HashMap::new()),
      checked_out: Mutex::new(HashMap::new()),
      in_flight: AtomicUsize::new(0),
      destroyed: AtomicBool::new(false),
    }
  }

  fn pool(&self, kind: &ConnectionKind) -> Arc<Pool> {
    self
      .pools
      .lock()
      .entry(kind.clone())
      .or_insert_with(|| Arc::new(Pool::new(self.config.max_total)))
      .clone()
  }

  /// Read the number of idle connections of the provided kind.
  pub fn idle_count(&self, kind: &ConnectionKind) -> usize {
    self.pools.lock().get(kind).map(|pool| pool.idle.len()).unwrap_or(0)
  }

  /// Read the number of checked out connections.
  pub fn active_count(&self) -> usize {
    self.checked_out.lock().len()
  }

  /// Read a connection without waiting, failing with `PoolExhausted` if the pool is at capacity.
  pub async fn try_acquire(&self, kind: ConnectionKind) -> Result<Arc<dyn DriverConnection>, RedisError> {
    if self.destroyed.load(Ordering::SeqCst) {
      return Err(destroyed_error());
    }

    let pool = self.pool(&kind);
    let permit = pool.permits.clone().try_acquire_owned().map_err(|_| exhausted_error())?;
    self.checkout(kind, pool, permit).await
  }

  async fn checkout(
    &self,
    kind: ConnectionKind,
    pool: Arc<Pool>,
    permit: OwnedSemaphorePermit,
  ) -> Result<Arc<dyn DriverConnection>, RedisError> {
    let conn = loop {
      match pool.idle.pop() {
        Some(conn) if conn.is_open() => break conn,
        Some(conn) => {
          debug!("Discarding closed idle connection {}", conn.id());
          let _ = self.inner.release(conn).await;
        },
        None => {
          self.in_flight.fetch_add(1, Ordering::SeqCst);
          let result = self.inner.acquire(kind.clone()).await;
          self.in_flight.fetch_sub(1, Ordering::SeqCst);
          break result?;
        },
      }
    };

    if self.destroyed.load(Ordering::SeqCst) {
      warn!("Closing connection {} acquired after the provider was destroyed.", conn.id());
      let _ = self.inner.release(conn).await;
      return Err(destroyed_error());
    }

    trace!("Checked out connection {} ({:?})", conn.id(), kind);
    self.checked_out.lock().insert(conn.id(), CheckedOut {
      kind,
      _permit: permit,
      conn: conn.clone(),
    });
    Ok(conn)
  }
}

#[async_trait]
impl ConnectionProvider for PoolingConnectionProvider {
  async fn acquire(&self, kind: ConnectionKind) -> Result<Arc<dyn DriverConnection>, RedisError> {
    if self.destroyed.load(Ordering::SeqCst) {
      return Err(destroyed_error());
    }

    let pool = self.pool(&kind);
    let permit = match tokio::time::timeout(self.config.max_wait, pool.permits.clone().acquire_owned()).await {
      Ok(Ok(permit)) => permit,
      Ok(Err(_)) => return Err(destroyed_error()),
      Err(_) => return Err(exhausted_error()),
    };

    self.checkout(kind, pool, permit).await
  }

  async fn release(&self, conn: Arc<dyn DriverConnection>) -> Result<(), RedisError> {
    let entry = self.checked_out.lock().remove(&conn.id());
    let entry = match entry {
      Some(entry) => entry,
      None => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidArgument,
          "Returned connection was either previously returned or does not belong to this connection provider",
        ))
      },
    };

    conn.set_auto_flush(true);
    conn.flush();
    if conn.is_multi() && conn.is_open() {
      debug!("Discarding transaction on connection {} before returning it.", conn.id());
      let discard = conn.dispatch(RedisCommand::new(RedisCommandKind::Discard, vec![]));
      if let Err(e) = utils::apply_timeout(discard, self.timeout).await {
        warn!("Failed to discard transaction on connection {}: {:?}", conn.id(), e);
        let _ = self.inner.release(conn).await;
        return Ok(());
      }
    }

    let pool = self.pools.lock().get(&entry.kind).cloned();
    let reusable = conn.is_open() && !self.destroyed.load(Ordering::SeqCst);
    match pool {
      Some(pool) if reusable && pool.idle.len() < self.config.max_idle => {
        trace!("Returned connection {} to the pool.", conn.id());
        pool.idle.push(conn);
      },
      _ => {
        self.inner.release(conn).await?;
      },
    }

    drop(entry);
    Ok(())
  }

  async fn destroy(&self) {
    self.destroyed.store(true, Ordering::SeqCst);

    let checked_out: Vec<CheckedOut> = self.checked_out.lock().drain().map(|(_, entry)| entry).collect();
    if !checked_out.is_empty() {
      warn!(
        "{} connection(s) were not released before the pool was destroyed.",
        checked_out.len()
      );
    }
    let in_flight = self.in_flight.load(Ordering::SeqCst);
    if in_flight > 0 {
      warn!("{} connection acquisition(s) still in progress while destroying the pool.", in_flight);
    }

    for entry in checked_out.into_iter() {
      let _ = self.inner.release(entry.conn.clone()).await;
    }

    let pools: Vec<Arc<Pool>> = self.pools.lock().drain().map(|(_, pool)| pool).collect();
    for pool in pools.into_iter() {
      pool.permits.close();
      while let Some(conn) = pool.idle.pop() {
        let _ = self.inner.release(conn).await;
      }
    }

    self.inner.destroy().await;
  }
}
