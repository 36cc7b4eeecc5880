use crate::{
  connection::ConnectionProvider,
  driver::DriverConnection,
  error::{ErrorTranslator, RedisError, RedisErrorKind},
  protocol::{
    command::{RedisCommand, RedisCommandKind},
    utils as protocol_utils,
  },
  types::{Message, MultipleStrings, RedisValue},
  utils,
};
use bytes_utils::Str;
use futures::Stream;
use parking_lot::RwLock;
use std::{
  collections::BTreeSet,
  fmt,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

struct SubscriptionInner {
  id:         Arc<String>,
  connection: Arc<dyn DriverConnection>,
  provider:   Arc<dyn ConnectionProvider>,
  translator: Arc<dyn ErrorTranslator>,
  timeout:    Duration,
  channels:   RwLock<BTreeSet<Str>>,
  patterns:   RwLock<BTreeSet<Str>>,
  closed:     AtomicBool,
}

impl_log_name!(SubscriptionInner);

/// The state of a subscribed connection, tracking the channels and patterns it listens to.
///
/// A subscription owns its own driver connection. Commands issued on the connection that created the subscription
/// keep running on the command connection.
///
/// ```rust no_run
/// use conduit::prelude::*;
/// use futures::StreamExt;
///
/// async fn example(connection: &RedisConnection) -> Result<(), RedisError> {
///   let subscription = connection.subscribe("foo").await?;
///   let mut messages = Box::pin(subscription.messages());
///
///   let _: i64 = connection.publish("foo", "bar").await?;
///   while let Some(message) = messages.next().await {
///     println!("Recv {:?} on {}", message.value, message.channel);
///   }
///
///   subscription.close().await;
///   Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Subscription {
  inner: Arc<SubscriptionInner>,
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.inner.id)
      .field("channels", &self.channels())
      .field("patterns", &self.patterns())
      .finish()
  }
}

fn into_strs(values: MultipleStrings) -> Vec<Str> {
  values
    .inner()
    .into_iter()
    .map(|key| Str::from(key.as_str_lossy().into_owned()))
    .collect()
}

impl Subscription {
  pub(crate) fn new(
    id: Arc<String>,
    connection: Arc<dyn DriverConnection>,
    provider: Arc<dyn ConnectionProvider>,
    translator: Arc<dyn ErrorTranslator>,
    timeout: Duration,
  ) -> Self {
    Subscription {
      inner: Arc::new(SubscriptionInner {
        id,
        connection,
        provider,
        translator,
        timeout,
        channels: RwLock::new(BTreeSet::new()),
        patterns: RwLock::new(BTreeSet::new()),
        closed: AtomicBool::new(false),
      }),
    }
  }

  fn check_open(&self) -> Result<(), RedisError> {
    if self.inner.closed.load(Ordering::Acquire) {
      Err(RedisError::new(RedisErrorKind::InvalidCommand, "Subscription is closed."))
    } else {
      Ok(())
    }
  }

  async fn send(&self, kind: RedisCommandKind, targets: &[Str]) -> Result<(), RedisError> {
    let args: Vec<RedisValue> = targets.iter().map(|s| RedisValue::String(s.clone())).collect();
    let command = RedisCommand::new(kind, args);
    _trace!(self.inner, "Sending {} on subscription", command.cmd_str());

    let frame = utils::apply_timeout(self.inner.connection.dispatch(command), self.inner.timeout)
      .await
      .map_err(|e| self.inner.translator.translate(e))?;
    protocol_utils::frame_to_results(frame)
      .map(|_| ())
      .map_err(|e| self.inner.translator.translate(e))
  }

  /// Subscribe to additional channels.
  pub async fn subscribe<S>(&self, channels: S) -> Result<(), RedisError>
  where
    S: Into<MultipleStrings>,
  {
    self.check_open()?;
    let channels = into_strs(channels.into());
    if channels.is_empty() {
      return Err(RedisError::new(
        RedisErrorKind::InvalidArgument,
        "At least one channel is required.",
      ));
    }

    self.send(RedisCommandKind::Subscribe, &channels).await?;
    self.inner.channels.write().extend(channels);
    Ok(())
  }

  /// Subscribe to additional channel patterns.
  pub async fn psubscribe<S>(&self, patterns: S) -> Result<(), RedisError>
  where
    S: Into<MultipleStrings>,
  {
    self.check_open()?;
    let patterns = into_strs(patterns.into());
    if patterns.is_empty() {
      return Err(RedisError::new(
        RedisErrorKind::InvalidArgument,
        "At least one pattern is required.",
      ));
    }

    self.send(RedisCommandKind::PSubscribe, &patterns).await?;
    self.inner.patterns.write().extend(patterns);
    Ok(())
  }

  /// Unsubscribe from the provided channels, or from every channel if none are provided.
  pub async fn unsubscribe<S>(&self, channels: S) -> Result<(), RedisError>
  where
    S: Into<MultipleStrings>,
  {
    self.check_open()?;
    let mut channels = into_strs(channels.into());
    if channels.is_empty() {
      channels = self.inner.channels.read().iter().cloned().collect();
    }
    if channels.is_empty() {
      return Ok(());
    }

    self.send(RedisCommandKind::Unsubscribe, &channels).await?;
    let mut tracked = self.inner.channels.write();
    for channel in channels.iter() {
      tracked.remove(channel);
    }
    Ok(())
  }

  /// Unsubscribe from the provided patterns, or from every pattern if none are provided.
  pub async fn punsubscribe<S>(&self, patterns: S) -> Result<(), RedisError>
  where
    S: Into<MultipleStrings>,
  {
    self.check_open()?;
    let mut patterns = into_strs(patterns.into());
    if patterns.is_empty() {
      patterns = self.inner.patterns.read().iter().cloned().collect();
    }
    if patterns.is_empty() {
      return Ok(());
    }

    self.send(RedisCommandKind::PUnsubscribe, &patterns).await?;
    let mut tracked = self.inner.patterns.write();
    for pattern in patterns.iter() {
      tracked.remove(pattern);
    }
    Ok(())
  }

  /// Read the channels the subscription listens to.
  pub fn channels(&self) -> BTreeSet<Str> {
    self.inner.channels.read().clone()
  }

  /// Read the patterns the subscription listens to.
  pub fn patterns(&self) -> BTreeSet<Str> {
    self.inner.patterns.read().clone()
  }

  /// Whether the subscription is open and listens to at least one channel or pattern.
  pub fn is_alive(&self) -> bool {
    !self.inner.closed.load(Ordering::Acquire)
      && self.inner.connection.is_open()
      && (!self.inner.channels.read().is_empty() || !self.inner.patterns.read().is_empty())
  }

  /// A stream of messages received after this call. The stream ends when the subscription closes.
  ///
  /// Messages are dropped for consumers that fall too far behind.
  pub fn messages(&self) -> impl Stream<Item = Message> {
    let rx = match self.inner.connection.messages() {
      Some(rx) => rx,
      None => {
        _warn!(self.inner, "Subscription connection does not deliver messages.");
        broadcast::channel(1).1
      },
    };

    BroadcastStream::new(rx).filter_map(|message| message.ok())
  }

  /// Unsubscribe from everything and release the connection. Closing twice has no effect.
  pub async fn close(&self) {
    if self.inner.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    _debug!(self.inner, "Closing subscription.");

    if self.inner.connection.is_open() {
      let channels: Vec<Str> = self.inner.channels.read().iter().cloned().collect();
      let patterns: Vec<Str> = self.inner.patterns.read().iter().cloned().collect();

      if !channels.is_empty() {
        if let Err(e) = self.send(RedisCommandKind::Unsubscribe, &channels).await {
          _warn!(self.inner, "Failed to unsubscribe: {:?}", e);
        }
      }
      if !patterns.is_empty() {
        if let Err(e) = self.send(RedisCommandKind::PUnsubscribe, &patterns).await {
          _warn!(self.inner, "Failed to punsubscribe: {:?}", e);
        }
      }
    }
    self.inner.channels.write().clear();
    self.inner.patterns.write().clear();

    if let Err(e) = self.inner.provider.release(self.inner.connection.clone()).await {
      _warn!(self.inner, "Failed to release subscription connection: {:?}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    connection::{ConnectionKind, StandaloneConnectionProvider},
    driver::{self, ConnectOptions, Driver},
    error::DefaultErrorTranslator,
    mocks::MockDriver,
    types::ClientConfig,
  };

  async fn subscription(driver: &MockDriver) -> Subscription {
    let options = ConnectOptions::from_config(&ClientConfig::default(), driver.servers()[0].clone());
    let provider = Arc::new(StandaloneConnectionProvider::new(Arc::new(driver.clone()), options));
    let connection = provider.acquire(ConnectionKind::PubSub).await.unwrap();

    Subscription::new(
      Arc::new("test".to_owned()),
      connection,
      provider,
      Arc::new(DefaultErrorTranslator),
      Duration::from_secs(5),
    )
  }

  async fn publish(driver: &MockDriver, channel: &str, message: &str) -> RedisValue {
    let options = ConnectOptions::from_config(&ClientConfig::default(), driver.servers()[0].clone());
    let connection = driver.connect(&options).await.unwrap();
    let command = RedisCommand::new(RedisCommandKind::Publish, vec![channel.into(), message.into()]);
    let result = driver::request_response(connection.as_ref(), command, Duration::from_secs(5)).await;
    connection.close().await;
    result.unwrap()
  }

  #[tokio::test]
  async fn should_receive_channel_and_pattern_messages() {
    let driver = MockDriver::standalone();
    let subscription = subscription(&driver).await;
    subscription.subscribe("foo").await.unwrap();
    subscription.psubscribe("ba*").await.unwrap();
    assert!(subscription.is_alive());

    let mut messages = Box::pin(subscription.messages());
    assert_eq!(publish(&driver, "foo", "1").await, RedisValue::Integer(1));
    assert_eq!(publish(&driver, "bar", "2").await, RedisValue::Integer(1));

    let first = messages.next().await.unwrap();
    assert_eq!(&*first.channel, "foo");
    assert_eq!(first.value, RedisValue::from("1"));
    assert!(!first.is_pattern());

    let second = messages.next().await.unwrap();
    assert_eq!(&*second.channel, "bar");
    assert_eq!(second.pattern.as_deref(), Some("ba*"));
  }

  #[tokio::test]
  async fn should_track_channels_and_patterns() {
    let driver = MockDriver::standalone();
    let subscription = subscription(&driver).await;
    subscription.subscribe(vec!["a", "b"]).await.unwrap();
    subscription.psubscribe("c*").await.unwrap();

    subscription.unsubscribe("a").await.unwrap();
    assert_eq!(subscription.channels().len(), 1);
    subscription.unsubscribe(Vec::<String>::new()).await.unwrap();
    assert!(subscription.channels().is_empty());
    assert!(subscription.is_alive());

    subscription.punsubscribe(Vec::<String>::new()).await.unwrap();
    assert!(!subscription.is_alive());
  }

  #[tokio::test]
  async fn should_close_and_release_the_connection() {
    let driver = MockDriver::standalone();
    let subscription = subscription(&driver).await;
    subscription.subscribe("foo").await.unwrap();

    subscription.close().await;
    subscription.close().await;
    assert!(!subscription.is_alive());
    assert_eq!(driver.open_connections(), 0);
    assert_eq!(publish(&driver, "foo", "1").await, RedisValue::Integer(0));
    assert!(subscription.subscribe("foo").await.is_err());
  }
}
