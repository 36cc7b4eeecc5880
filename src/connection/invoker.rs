//! Pending results for pipelines and transactions.
//!
//! Commands issued while pipelined or queueing are dispatched right away, but their replies are only awaited when the
//! batch closes. Every pending result is resolved exactly once, in issue order.

use crate::{
  driver::{DriverConnection, ResponseFuture},
  error::{ErrorTranslator, RedisError, RedisErrorKind},
  protocol::{
    command::{RedisCommand, ReplyShape},
    utils as protocol_utils,
  },
  types::{RedisValue, Resp2Frame},
};
use futures::future::join_all;
use std::{fmt, time::Duration};
use tokio::time::Instant;

/// A dispatched command whose reply has not been awaited yet.
pub struct PendingResult {
  command:  String,
  response: ResponseFuture,
  shape:    ReplyShape,
}

impl fmt::Debug for PendingResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PendingResult")
      .field("command", &self.command)
      .field("shape", &self.shape)
      .finish()
  }
}

impl PendingResult {
  pub fn new(command: &RedisCommand, response: ResponseFuture) -> Self {
    PendingResult {
      command: command.cmd_str().to_owned(),
      shape: command.reply_shape(),
      response,
    }
  }

  /// Dispatch the command on the connection without waiting for its reply.
  pub fn dispatch(connection: &dyn DriverConnection, command: RedisCommand) -> Self {
    let name = command.cmd_str().to_owned();
    let shape = command.reply_shape();

    PendingResult {
      command: name,
      response: connection.dispatch(command),
      shape,
    }
  }

  /// Read the name of the command.
  pub fn command(&self) -> &str {
    &self.command
  }

  pub fn shape(&self) -> ReplyShape {
    self.shape
  }

  /// Whether the command only replies with a status, such as `OK`.
  pub fn is_status(&self) -> bool {
    self.shape == ReplyShape::Status
  }
}

/// A pending result after its reply arrived, or failed to arrive.
#[derive(Debug)]
pub(crate) struct Resolved {
  pub shape:  ReplyShape,
  pub result: Result<Resp2Frame, RedisError>,
}

/// Convert a reply frame with the reply shape, or as a raw value when `convert` is false.
pub fn convert_frame(shape: ReplyShape, frame: Resp2Frame, convert: bool) -> Result<RedisValue, RedisError> {
  if convert {
    shape.convert(frame)
  } else {
    protocol_utils::frame_to_results(frame)
  }
}

/// Wait for every pending result with one shared deadline. A timeout of zero waits forever.
///
/// Replies that do not arrive before the deadline resolve to a `Timeout` error.
pub(crate) async fn await_all(pending: Vec<PendingResult>, timeout: Duration) -> Vec<Resolved> {
  let deadline = if timeout.is_zero() {
    None
  } else {
    Some(Instant::now() + timeout)
  };

  let calls = pending.into_iter().map(|pending| async move {
    let result = match deadline {
      Some(deadline) => match tokio::time::timeout_at(deadline, pending.response).await {
        Ok(result) => result,
        Err(_) => Err(RedisError::new_timeout()),
      },
      None => pending.response.await,
    };

    Resolved {
      shape: pending.shape,
      result,
    }
  });

  join_all(calls).await
}

/// Convert resolved replies into the results of a batch, leaving out status replies.
///
/// Every failure is kept in place. If anything failed the result is a `Pipeline` error wrapping the first failure, or
/// the timeout if any reply timed out, with every result collected so far.
pub(crate) fn collect_results(
  resolved: Vec<Resolved>,
  convert: bool,
  translator: &dyn ErrorTranslator,
) -> Result<Vec<RedisValue>, RedisError> {
  let mut results = Vec::with_capacity(resolved.len());
  let mut first_error = None;
  let mut timed_out = false;

  for entry in resolved.into_iter() {
    let shape = entry.shape;
    let result = entry
      .result
      .and_then(|frame| convert_frame(shape, frame, convert))
      .map_err(|e| translator.translate(e));

    match result {
      Ok(value) => {
        if shape != ReplyShape::Status {
          results.push(Ok(value));
        }
      },
      Err(e) => {
        timed_out |= e.is_timeout();
        if first_error.is_none() {
          first_error = Some(e.clone());
        }
        results.push(Err(e));
      },
    }
  }

  match first_error {
    Some(first) => {
      let first = if timed_out { RedisError::new_timeout() } else { first };
      Err(RedisError::new_pipeline(first, results))
    },
    None => Ok(results.into_iter().filter_map(|result| result.ok()).collect()),
  }
}

/// Wait for the queued replies and the `EXEC` reply of a transaction, then unwrap the per-command results.
///
/// Returns `None` when a watched key was modified and the server aborted the transaction.
pub(crate) async fn exec_results(
  queued: Vec<PendingResult>,
  exec: PendingResult,
  timeout: Duration,
  convert: bool,
  translator: &dyn ErrorTranslator,
) -> Result<Option<Vec<RedisValue>>, RedisError> {
  let shapes: Vec<ReplyShape> = queued.iter().map(|pending| pending.shape).collect();
  let mut pending = queued;
  pending.push(exec);

  let mut resolved = await_all(pending, timeout).await;
  let exec = match resolved.pop() {
    Some(exec) => exec,
    None => return Err(RedisError::new(RedisErrorKind::Unknown, "Missing EXEC reply.")),
  };
  if let Some(e) = resolved.into_iter().find_map(|entry| entry.result.err()) {
    if e.is_timeout() {
      return Err(RedisError::new_pipeline(e, Vec::new()));
    }
  }

  match exec.result.map_err(|e| translator.translate(e))? {
    Resp2Frame::Null => Ok(None),
    Resp2Frame::Error(details) => Err(translator.translate(protocol_utils::pretty_error(&details))),
    Resp2Frame::Array(frames) => {
      if frames.len() != shapes.len() {
        return Err(RedisError::new(
          RedisErrorKind::Protocol,
          format!("Expected {} transaction results, found {}.", shapes.len(), frames.len()),
        ));
      }

      let resolved = shapes
        .into_iter()
        .zip(frames.into_iter())
        .map(|(shape, frame)| Resolved {
          shape,
          result: Ok(frame),
        })
        .collect();
      collect_results(resolved, convert, translator).map(Some)
    },
    _ => Err(RedisError::new(RedisErrorKind::Protocol, "Invalid EXEC reply.")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{error::DefaultErrorTranslator, protocol::command::RedisCommandKind};
  use bytes::Bytes;
  use futures::FutureExt;

  fn pending(kind: RedisCommandKind, frame: Result<Resp2Frame, RedisError>) -> PendingResult {
    let command = RedisCommand::new(kind, vec![]);
    PendingResult::new(&command, async move { frame }.boxed())
  }

  fn bulk(s: &'static str) -> Resp2Frame {
    Resp2Frame::BulkString(Bytes::from_static(s.as_bytes()))
  }

  #[tokio::test]
  async fn should_skip_status_results() {
    let batch = vec![
      pending(RedisCommandKind::Set, Ok(Resp2Frame::SimpleString("OK".into()))),
      pending(RedisCommandKind::Get, Ok(bulk("bar"))),
      pending(RedisCommandKind::Incr, Ok(Resp2Frame::Integer(1))),
    ];

    let resolved = await_all(batch, Duration::from_secs(1)).await;
    let results = collect_results(resolved, true, &DefaultErrorTranslator).unwrap();
    assert_eq!(results, vec![RedisValue::from("bar"), RedisValue::Integer(1)]);
  }

  #[tokio::test]
  async fn should_keep_failures_in_place() {
    let batch = vec![
      pending(RedisCommandKind::Get, Ok(bulk("bar"))),
      pending(
        RedisCommandKind::Incr,
        Ok(Resp2Frame::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())),
      ),
      pending(RedisCommandKind::Set, Ok(Resp2Frame::Error("ERR syntax error".into()))),
      pending(RedisCommandKind::Get, Ok(bulk("baz"))),
    ];

    let resolved = await_all(batch, Duration::from_secs(1)).await;
    let error = collect_results(resolved, true, &DefaultErrorTranslator).unwrap_err();
    assert!(error.is_pipeline());
    assert!(error.details().contains("WRONGTYPE"));

    let partial = error.partial_results().unwrap();
    assert_eq!(partial.len(), 4);
    assert_eq!(partial[0], Ok(RedisValue::from("bar")));
    assert_eq!(*partial[1].as_ref().unwrap_err().kind(), RedisErrorKind::InvalidArgument);
    assert!(partial[2].is_err());
    assert_eq!(partial[3], Ok(RedisValue::from("baz")));
  }

  #[tokio::test(start_paused = true)]
  async fn should_time_out_unresolved_results() {
    let command = RedisCommand::new(RedisCommandKind::Get, vec![]);
    let never = PendingResult::new(&command, futures::future::pending().boxed());
    let batch = vec![pending(RedisCommandKind::Get, Ok(bulk("bar"))), never];

    let resolved = await_all(batch, Duration::from_millis(500)).await;
    let error = collect_results(resolved, true, &DefaultErrorTranslator).unwrap_err();
    assert!(error.details().contains("Redis command timed out"));

    let partial = error.partial_results().unwrap();
    assert_eq!(partial[0], Ok(RedisValue::from("bar")));
    assert!(partial[1].as_ref().unwrap_err().is_timeout());
  }

  #[tokio::test]
  async fn should_return_raw_values_without_conversion() {
    let batch = vec![pending(RedisCommandKind::Expire, Ok(Resp2Frame::Integer(1)))];

    let resolved = await_all(batch, Duration::from_secs(1)).await;
    assert_eq!(collect_results(resolved, true, &DefaultErrorTranslator).unwrap(), vec![
      RedisValue::Boolean(true)
    ]);

    let batch = vec![pending(RedisCommandKind::Expire, Ok(Resp2Frame::Integer(1)))];
    let resolved = await_all(batch, Duration::from_secs(1)).await;
    assert_eq!(collect_results(resolved, false, &DefaultErrorTranslator).unwrap(), vec![
      RedisValue::Integer(1)
    ]);
  }

  #[tokio::test]
  async fn should_unwrap_exec_replies() {
    let queued = vec![
      pending(RedisCommandKind::Set, Ok(Resp2Frame::SimpleString("QUEUED".into()))),
      pending(RedisCommandKind::Incr, Ok(Resp2Frame::SimpleString("QUEUED".into()))),
    ];
    let exec = pending(
      RedisCommandKind::Exec,
      Ok(Resp2Frame::Array(vec![
        Resp2Frame::SimpleString("OK".into()),
        Resp2Frame::Integer(2),
      ])),
    );

    let results = exec_results(queued, exec, Duration::from_secs(1), true, &DefaultErrorTranslator)
      .await
      .unwrap();
    assert_eq!(results, Some(vec![RedisValue::Integer(2)]));

    let exec = pending(RedisCommandKind::Exec, Ok(Resp2Frame::Null));
    let results = exec_results(Vec::new(), exec, Duration::from_secs(1), true, &DefaultErrorTranslator)
      .await
      .unwrap();
    assert_eq!(results, None);
  }
}
