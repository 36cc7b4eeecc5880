use bytes_utils::string::Utf8Error as BytesUtf8Error;
use futures::channel::oneshot::Canceled;
use redis_protocol::types::RedisProtocolError;
use std::{
  borrow::{Borrow, Cow},
  convert::Infallible,
  error::Error,
  fmt,
  io::Error as IoError,
  num::{ParseFloatError, ParseIntError},
  str::Utf8Error,
  string::FromUtf8Error,
};
use tokio::{task::JoinError, time::error::Elapsed};
use url::ParseError;

use crate::types::RedisValue;

/// An enum representing the type of error from Redis.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RedisErrorKind {
  /// A client configuration error.
  Config,
  /// An authentication error.
  Auth,
  /// An IO error with the underlying connection.
  IO,
  /// An invalid command, such as trying to call `exec` outside of a transaction or `move` on a cluster.
  InvalidCommand,
  /// An invalid argument or set of arguments to a command.
  InvalidArgument,
  /// An invalid URL error.
  Url,
  /// A protocol error such as an invalid or unexpected frame from the server.
  Protocol,
  /// A TLS error.
  #[cfg(feature = "enable-native-tls")]
  #[cfg_attr(docsrs, doc(cfg(feature = "enable-native-tls")))]
  Tls,
  /// An error indicating the request was canceled, usually because the connection closed.
  Canceled,
  /// An error that could not be classified more specifically.
  Unknown,
  /// A timeout error.
  Timeout,
  /// A cluster error, such as a redirection or a failed topology lookup.
  Cluster,
  /// A parser error.
  Parse,
  /// An error indicating a value was not found, often used when trying to cast a `nil` response from the server to a
  /// non-nullable type.
  NotFound,
  /// A connection pool could not provide a connection within the configured wait time.
  PoolExhausted,
  /// One or more commands in a pipeline or transaction failed. The partial results are attached to the error.
  Pipeline,
  /// An error communicating with the sentinel nodes, or a service name they do not monitor.
  Sentinel,
}

impl RedisErrorKind {
  pub fn to_str(&self) -> &'static str {
    match *self {
      RedisErrorKind::Auth => "Authentication Error",
      RedisErrorKind::IO => "IO Error",
      RedisErrorKind::InvalidArgument => "Invalid Argument",
      RedisErrorKind::InvalidCommand => "Invalid Command",
      RedisErrorKind::Url => "Url Error",
      RedisErrorKind::Protocol => "Protocol Error",
      RedisErrorKind::Unknown => "Unknown Error",
      RedisErrorKind::Canceled => "Canceled",
      RedisErrorKind::Cluster => "Cluster Error",
      RedisErrorKind::Timeout => "Timeout Error",
      #[cfg(feature = "enable-native-tls")]
      RedisErrorKind::Tls => "TLS Error",
      RedisErrorKind::Config => "Config Error",
      RedisErrorKind::Parse => "Parse Error",
      RedisErrorKind::NotFound => "Not Found",
      RedisErrorKind::PoolExhausted => "Pool Exhausted",
      RedisErrorKind::Pipeline => "Pipeline Error",
      RedisErrorKind::Sentinel => "Sentinel Error",
    }
  }

  /// Whether the error kind describes a broken or unusable connection.
  pub fn is_connection_failure(&self) -> bool {
    match *self {
      RedisErrorKind::IO | RedisErrorKind::Auth | RedisErrorKind::Canceled => true,
      #[cfg(feature = "enable-native-tls")]
      RedisErrorKind::Tls => true,
      _ => false,
    }
  }
}

/// An error from Redis.
pub struct RedisError {
  /// Details about the specific error condition.
  details: Cow<'static, str>,
  /// The kind of error.
  kind:    RedisErrorKind,
  /// The results collected before a pipeline or transaction failed, in issue order.
  partial: Option<Vec<Result<RedisValue, RedisError>>>,
}

impl Clone for RedisError {
  fn clone(&self) -> Self {
    RedisError {
      details: self.details.clone(),
      kind:    self.kind.clone(),
      partial: self.partial.clone(),
    }
  }
}

impl PartialEq for RedisError {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind && self.details == other.details
  }
}

impl Eq for RedisError {}

impl fmt::Debug for RedisError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Redis Error - kind: {:?}, details: {}", self.kind, self.details)
  }
}

impl fmt::Display for RedisError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}: {}", self.kind.to_str(), self.details)
  }
}

#[doc(hidden)]
impl From<RedisProtocolError> for RedisError {
  fn from(e: RedisProtocolError) -> Self {
    RedisError::new(RedisErrorKind::Protocol, format!("{}", e))
  }
}

#[doc(hidden)]
impl From<()> for RedisError {
  fn from(_: ()) -> Self {
    RedisError::new(RedisErrorKind::Canceled, "Empty error.")
  }
}

#[doc(hidden)]
impl From<tokio::sync::oneshot::error::RecvError> for RedisError {
  fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
    RedisError::new(RedisErrorKind::Canceled, "Connection closed before a response was received.")
  }
}

#[doc(hidden)]
impl From<tokio::sync::AcquireError> for RedisError {
  fn from(_: tokio::sync::AcquireError) -> Self {
    RedisError::new(RedisErrorKind::PoolExhausted, "Pool was closed.")
  }
}

#[doc(hidden)]
impl From<Elapsed> for RedisError {
  fn from(_: Elapsed) -> Self {
    RedisError::new(RedisErrorKind::Timeout, "Redis command timed out")
  }
}

#[doc(hidden)]
impl From<IoError> for RedisError {
  fn from(e: IoError) -> Self {
    RedisError::new(RedisErrorKind::IO, format!("{:?}", e))
  }
}

#[doc(hidden)]
impl From<ParseError> for RedisError {
  fn from(e: ParseError) -> Self {
    RedisError::new(RedisErrorKind::Url, format!("{:?}", e))
  }
}

#[doc(hidden)]
impl From<ParseFloatError> for RedisError {
  fn from(_: ParseFloatError) -> Self {
    RedisError::new(RedisErrorKind::Parse, "Invalid floating point number.")
  }
}

#[doc(hidden)]
impl From<ParseIntError> for RedisError {
  fn from(_: ParseIntError) -> Self {
    RedisError::new(RedisErrorKind::Parse, "Invalid integer string.")
  }
}

#[doc(hidden)]
impl From<FromUtf8Error> for RedisError {
  fn from(_: FromUtf8Error) -> Self {
    RedisError::new(RedisErrorKind::Parse, "Invalid UTF-8 string.")
  }
}

#[doc(hidden)]
impl From<Utf8Error> for RedisError {
  fn from(_: Utf8Error) -> Self {
    RedisError::new(RedisErrorKind::Parse, "Invalid UTF-8 string.")
  }
}

#[doc(hidden)]
impl<S> From<BytesUtf8Error<S>> for RedisError {
  fn from(e: BytesUtf8Error<S>) -> Self {
    e.utf8_error().into()
  }
}

#[doc(hidden)]
impl From<fmt::Error> for RedisError {
  fn from(e: fmt::Error) -> Self {
    RedisError::new(RedisErrorKind::Unknown, format!("{:?}", e))
  }
}

#[doc(hidden)]
impl From<Canceled> for RedisError {
  fn from(e: Canceled) -> Self {
    RedisError::new(RedisErrorKind::Canceled, format!("{}", e))
  }
}

#[doc(hidden)]
impl From<JoinError> for RedisError {
  fn from(e: JoinError) -> Self {
    RedisError::new(RedisErrorKind::Unknown, format!("Spawn Error: {:?}", e))
  }
}

#[doc(hidden)]
impl From<Infallible> for RedisError {
  fn from(e: Infallible) -> Self {
    warn!("Infallible error: {:?}", e);
    RedisError::new(RedisErrorKind::Unknown, "Unknown error.")
  }
}

#[doc(hidden)]
#[cfg(feature = "enable-native-tls")]
#[cfg_attr(docsrs, doc(cfg(feature = "enable-native-tls")))]
impl From<native_tls::Error> for RedisError {
  fn from(e: native_tls::Error) -> Self {
    RedisError::new(RedisErrorKind::Tls, format!("{:?}", e))
  }
}

impl RedisError {
  /// Create a new Redis error with the provided details.
  pub fn new<T>(kind: RedisErrorKind, details: T) -> RedisError
  where
    T: Into<Cow<'static, str>>,
  {
    RedisError {
      kind,
      details: details.into(),
      partial: None,
    }
  }

  /// Create a new `Pipeline` error that wraps the first failure and carries every result collected so far.
  pub fn new_pipeline(first: RedisError, partial: Vec<Result<RedisValue, RedisError>>) -> RedisError {
    RedisError {
      kind:    RedisErrorKind::Pipeline,
      details: format!("Pipeline contained errors. First error: {}", first).into(),
      partial: Some(partial),
    }
  }

  /// Read the type of error without any associated data.
  pub fn kind(&self) -> &RedisErrorKind {
    &self.kind
  }

  /// Change the kind of the error.
  pub fn change_kind(&mut self, kind: RedisErrorKind) {
    self.kind = kind;
  }

  /// Read details about the error.
  pub fn details(&self) -> &str {
    self.details.borrow()
  }

  /// Read the partial results attached to a `Pipeline` error, in issue order.
  pub fn partial_results(&self) -> Option<&[Result<RedisValue, RedisError>]> {
    self.partial.as_deref()
  }

  /// Take the partial results attached to a `Pipeline` error.
  pub fn take_partial_results(&mut self) -> Option<Vec<Result<RedisValue, RedisError>>> {
    self.partial.take()
  }

  /// Create a new empty Canceled error.
  pub fn new_canceled() -> Self {
    RedisError::new(RedisErrorKind::Canceled, "Canceled.")
  }

  /// Create a new command timeout error.
  pub fn new_timeout() -> Self {
    RedisError::new(RedisErrorKind::Timeout, "Redis command timed out")
  }

  /// Create a new parse error with the provided details.
  pub(crate) fn new_parse<T>(details: T) -> Self
  where
    T: Into<Cow<'static, str>>,
  {
    RedisError::new(RedisErrorKind::Parse, details)
  }

  /// Create a new error for an operation that has no meaning on a cluster.
  pub(crate) fn new_cluster_unsupported(operation: &str) -> Self {
    RedisError::new(
      RedisErrorKind::InvalidCommand,
      format!("{} is not supported in cluster mode.", operation),
    )
  }

  /// Whether the error is a `Cluster` error.
  pub fn is_cluster(&self) -> bool {
    matches!(self.kind, RedisErrorKind::Cluster)
  }

  /// Whether the error is a `Canceled` error.
  pub fn is_canceled(&self) -> bool {
    matches!(self.kind, RedisErrorKind::Canceled)
  }

  /// Whether the error is a `NotFound` error.
  pub fn is_not_found(&self) -> bool {
    matches!(self.kind, RedisErrorKind::NotFound)
  }

  /// Whether the error is a `Timeout` error.
  pub fn is_timeout(&self) -> bool {
    matches!(self.kind, RedisErrorKind::Timeout)
  }

  /// Whether the error is a `PoolExhausted` error.
  pub fn is_pool_exhausted(&self) -> bool {
    matches!(self.kind, RedisErrorKind::PoolExhausted)
  }

  /// Whether the error is a `Pipeline` aggregate error.
  pub fn is_pipeline(&self) -> bool {
    matches!(self.kind, RedisErrorKind::Pipeline)
  }
}

impl Error for RedisError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    None
  }
}

/// A function that maps raw driver and server errors onto the public error taxonomy.
///
/// Every error produced by a driver passes through exactly one translator before it reaches a caller. The translator
/// is handed to each component when it is constructed, so tests can substitute their own.
pub trait ErrorTranslator: Send + Sync + fmt::Debug {
  /// Translate a raw error.
  fn translate(&self, error: RedisError) -> RedisError;
}

/// The default translator, which classifies server errors by their reply prefix.
#[derive(Clone, Debug, Default)]
pub struct DefaultErrorTranslator;

static CLUSTER_PREFIXES: &[&str] = &["MOVED ", "ASK ", "CLUSTERDOWN", "CROSSSLOT", "TRYAGAIN"];
static AUTH_PREFIXES: &[&str] = &["NOAUTH", "WRONGPASS", "NOPERM"];
static ARGUMENT_PREFIXES: &[&str] = &[
  "WRONGTYPE",
  "ERR syntax",
  "ERR wrong number",
  "ERR value is not",
  "ERR no such key",
  "ERR invalid",
  "BUSYKEY",
];
static COMMAND_PREFIXES: &[&str] = &["ERR unknown command", "EXECABORT", "ERR MULTI", "ERR EXEC", "ERR DISCARD"];

impl ErrorTranslator for DefaultErrorTranslator {
  fn translate(&self, mut error: RedisError) -> RedisError {
    if error.kind != RedisErrorKind::Unknown {
      return error;
    }

    let details = error.details();
    let kind = if CLUSTER_PREFIXES.iter().any(|p| details.starts_with(p)) {
      RedisErrorKind::Cluster
    } else if AUTH_PREFIXES.iter().any(|p| details.starts_with(p)) {
      RedisErrorKind::Auth
    } else if ARGUMENT_PREFIXES.iter().any(|p| details.starts_with(p)) {
      RedisErrorKind::InvalidArgument
    } else if COMMAND_PREFIXES.iter().any(|p| details.starts_with(p)) {
      RedisErrorKind::InvalidCommand
    } else if details.starts_with("NOSCRIPT") {
      RedisErrorKind::NotFound
    } else {
      RedisErrorKind::Unknown
    };

    error.change_kind(kind);
    error
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn should_classify_cluster_redirections() {
    let translated = DefaultErrorTranslator.translate(RedisError::new(RedisErrorKind::Unknown, "MOVED 3999 127.0.0.1:6381"));
    assert_eq!(translated.kind(), &RedisErrorKind::Cluster);
    assert_eq!(translated.details(), "MOVED 3999 127.0.0.1:6381");
  }

  #[test]
  fn should_classify_argument_errors() {
    let translated = DefaultErrorTranslator.translate(RedisError::new(
      RedisErrorKind::Unknown,
      "WRONGTYPE Operation against a key holding the wrong kind of value",
    ));
    assert_eq!(translated.kind(), &RedisErrorKind::InvalidArgument);
  }

  #[test]
  fn should_not_reclassify_known_errors() {
    let translated = DefaultErrorTranslator.translate(RedisError::new(RedisErrorKind::IO, "MOVED 1 foo:1"));
    assert_eq!(translated.kind(), &RedisErrorKind::IO);
  }

  #[test]
  fn should_carry_partial_results() {
    let first = RedisError::new(RedisErrorKind::InvalidArgument, "WRONGTYPE");
    let error = RedisError::new_pipeline(first.clone(), vec![Ok(1.into()), Err(first)]);

    assert!(error.is_pipeline());
    assert_eq!(error.partial_results().map(|p| p.len()), Some(2));
  }
}
