use crate::{
  error::{RedisError, RedisErrorKind},
  protocol::command::{RedisCommand, ReplyShape},
  types::*,
  utils,
};
use bytes::Bytes;
use bytes_utils::Str;
use std::{collections::HashMap, str};

/// A cluster redirection parsed from a `MOVED` or `ASK` error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Redirection {
  /// The slot moved permanently. The topology is stale.
  Moved { slot: u16, server: Server },
  /// The slot is being migrated. Retry once on the target after `ASKING`.
  Ask { slot: u16, server: Server },
}

impl Redirection {
  pub fn server(&self) -> &Server {
    match self {
      Redirection::Moved { ref server, .. } | Redirection::Ask { ref server, .. } => server,
    }
  }

  pub fn slot(&self) -> u16 {
    match self {
      Redirection::Moved { slot, .. } | Redirection::Ask { slot, .. } => *slot,
    }
  }
}

/// Parse a `MOVED <slot> <host:port>` or `ASK <slot> <host:port>` error string.
pub fn parse_redirection(data: &str) -> Option<Redirection> {
  let mut parts = data.split(' ');
  let (kind, slot, server) = (parts.next()?, parts.next()?, parts.next()?);
  if parts.next().is_some() {
    return None;
  }
  let slot = slot.parse::<u16>().ok()?;
  let server = Server::from_str(server)?;

  match kind {
    "MOVED" => Some(Redirection::Moved { slot, server }),
    "ASK" => Some(Redirection::Ask { slot, server }),
    _ => None,
  }
}

/// Read the redirection from an error, if it describes one.
pub fn error_to_redirection(error: &RedisError) -> Option<Redirection> {
  parse_redirection(error.details())
}

/// Create an unclassified error from a server error reply.
pub fn pretty_error(resp: &str) -> RedisError {
  RedisError::new(RedisErrorKind::Unknown, resp.to_owned())
}

pub fn queued_frame() -> Resp2Frame {
  Resp2Frame::SimpleString(utils::static_bytes(QUEUED.as_bytes()))
}

pub fn ok_frame() -> Resp2Frame {
  Resp2Frame::SimpleString(utils::static_bytes(OK.as_bytes()))
}

pub fn frame_is_queued(frame: &Resp2Frame) -> bool {
  match frame {
    Resp2Frame::SimpleString(ref data) => data == QUEUED.as_bytes(),
    _ => false,
  }
}

pub fn is_ok(frame: &Resp2Frame) -> bool {
  match frame {
    Resp2Frame::SimpleString(ref data) => data == OK.as_bytes(),
    _ => false,
  }
}

/// Try to parse the data as a string, and failing that return a byte slice.
pub fn string_or_bytes(data: Bytes) -> RedisValue {
  if let Ok(s) = Str::from_inner(data.clone()) {
    RedisValue::String(s)
  } else {
    RedisValue::Bytes(data)
  }
}

pub fn frame_to_str(frame: &Resp2Frame) -> Option<Str> {
  match frame {
    Resp2Frame::SimpleString(ref data) | Resp2Frame::BulkString(ref data) => Str::from_inner(data.clone()).ok(),
    Resp2Frame::Error(ref data) => Some(data.clone()),
    _ => None,
  }
}

/// Convert a frame to a `RedisError`.
pub fn frame_to_error(frame: &Resp2Frame) -> Option<RedisError> {
  match frame {
    Resp2Frame::Error(ref data) => Some(pretty_error(data)),
    _ => None,
  }
}

/// Parse the protocol frame into a redis value, with support for arbitrarily nested arrays.
///
/// Error frames at any depth are returned as errors.
pub fn frame_to_results(frame: Resp2Frame) -> Result<RedisValue, RedisError> {
  let value = match frame {
    Resp2Frame::Null => RedisValue::Null,
    Resp2Frame::SimpleString(data) => {
      if data == QUEUED.as_bytes() {
        RedisValue::Queued
      } else {
        string_or_bytes(data)
      }
    },
    Resp2Frame::Error(data) => return Err(pretty_error(&data)),
    Resp2Frame::BulkString(data) => string_or_bytes(data),
    Resp2Frame::Integer(i) => i.into(),
    Resp2Frame::Array(data) => RedisValue::Array(
      data
        .into_iter()
        .map(frame_to_results)
        .collect::<Result<Vec<RedisValue>, _>>()?,
    ),
  };

  Ok(value)
}

/// Convert a frame to a nested `RedisMap`.
pub fn frame_to_map(frame: Resp2Frame) -> Result<RedisMap, RedisError> {
  match frame {
    Resp2Frame::Array(data) => {
      if data.len() % 2 != 0 {
        return Err(RedisError::new(
          RedisErrorKind::Protocol,
          "Expected an even number of frames.",
        ));
      }

      let mut inner = HashMap::with_capacity(data.len() / 2);
      let mut frames = data.into_iter();
      while let (Some(key), Some(value)) = (frames.next(), frames.next()) {
        let key: RedisKey = frame_to_results(key)?.try_into()?;
        inner.insert(key, frame_to_results(value)?);
      }

      Ok(RedisMap { inner })
    },
    Resp2Frame::Null => Ok(RedisMap::new()),
    Resp2Frame::Error(data) => Err(pretty_error(&data)),
    _ => Err(RedisError::new(RedisErrorKind::Protocol, "Expected array frames.")),
  }
}

impl ReplyShape {
  /// The value used when the server replies with nil.
  pub fn default_value(&self) -> RedisValue {
    match *self {
      ReplyShape::Array => RedisValue::Array(Vec::new()),
      ReplyShape::Map => RedisValue::Map(RedisMap::new()),
      ReplyShape::Boolean => RedisValue::Boolean(false),
      _ => RedisValue::Null,
    }
  }

  /// Convert a reply frame to a value with this shape.
  pub fn convert(&self, frame: Resp2Frame) -> Result<RedisValue, RedisError> {
    if let Some(error) = frame_to_error(&frame) {
      return Err(error);
    }
    if matches!(frame, Resp2Frame::Null) {
      return Ok(self.default_value());
    }

    match *self {
      ReplyShape::Status | ReplyShape::Integer | ReplyShape::Value | ReplyShape::Array => frame_to_results(frame),
      ReplyShape::Boolean => match frame {
        Resp2Frame::Integer(i) => Ok(RedisValue::Boolean(i != 0)),
        Resp2Frame::SimpleString(ref data) if data == OK.as_bytes() => Ok(RedisValue::Boolean(true)),
        frame => {
          let value = frame_to_results(frame)?;
          value.as_bool().map(RedisValue::Boolean).ok_or_else(|| {
            RedisError::new_parse(format!("Could not convert {} to boolean.", value.kind()))
          })
        },
      },
      ReplyShape::Double => match frame {
        Resp2Frame::Integer(i) => Ok(RedisValue::Double(i as f64)),
        frame => match frame_to_str(&frame) {
          Some(s) => Ok(RedisValue::Double(utils::redis_string_to_f64(&s)?)),
          None => Err(RedisError::new_parse("Expected floating point string.")),
        },
      },
      ReplyShape::Map => frame_to_map(frame).map(RedisValue::Map),
    }
  }
}

pub fn value_to_outgoing_frame(value: &RedisValue) -> Result<Resp2Frame, RedisError> {
  let frame = match value {
    RedisValue::Double(ref f) => Resp2Frame::BulkString(f.to_string().into()),
    RedisValue::Boolean(ref b) => Resp2Frame::BulkString(b.to_string().into()),
    RedisValue::Integer(ref i) => Resp2Frame::BulkString(i.to_string().into()),
    RedisValue::String(ref s) => Resp2Frame::BulkString(s.inner().clone()),
    RedisValue::Bytes(ref b) => Resp2Frame::BulkString(b.clone()),
    RedisValue::Queued => Resp2Frame::BulkString(Bytes::from_static(QUEUED.as_bytes())),
    RedisValue::Null => Resp2Frame::Null,
    _ => {
      return Err(RedisError::new(
        RedisErrorKind::InvalidArgument,
        format!("Invalid argument type: {}", value.kind()),
      ))
    },
  };

  Ok(frame)
}

/// Serialize the command as an array of bulk strings. Names with a subcommand are split into separate frames.
pub fn command_to_frame(command: &RedisCommand) -> Result<Resp2Frame, RedisError> {
  let parts: Vec<&str> = command.cmd_str().split(' ').filter(|s| !s.is_empty()).collect();
  let mut bulk_strings = Vec::with_capacity(parts.len() + command.args.len());

  for part in parts.into_iter() {
    bulk_strings.push(Resp2Frame::BulkString(Bytes::copy_from_slice(part.as_bytes())));
  }
  for value in command.args.iter() {
    bulk_strings.push(value_to_outgoing_frame(value)?);
  }

  Ok(Resp2Frame::Array(bulk_strings))
}

/// Read the string items of a command frame, as the server sees them.
pub fn frame_to_command_parts(frame: &Resp2Frame) -> Option<Vec<Bytes>> {
  match frame {
    Resp2Frame::Array(ref frames) => frames
      .iter()
      .map(|f| match f {
        Resp2Frame::BulkString(ref b) | Resp2Frame::SimpleString(ref b) => Some(b.clone()),
        _ => None,
      })
      .collect(),
    _ => None,
  }
}

/// Convert a value to the frame a server would send for it.
pub fn value_to_reply_frame(value: RedisValue) -> Resp2Frame {
  match value {
    RedisValue::Null => Resp2Frame::Null,
    RedisValue::Integer(i) => Resp2Frame::Integer(i),
    RedisValue::Boolean(b) => Resp2Frame::Integer(b as i64),
    RedisValue::Double(f) => Resp2Frame::BulkString(f.to_string().into()),
    RedisValue::String(s) => Resp2Frame::BulkString(s.into_inner()),
    RedisValue::Bytes(b) => Resp2Frame::BulkString(b),
    RedisValue::Queued => queued_frame(),
    RedisValue::Map(map) => {
      let mut out = Vec::with_capacity(map.len() * 2);
      for (key, value) in map.inner().into_iter() {
        out.push(Resp2Frame::BulkString(key.into_bytes()));
        out.push(value_to_reply_frame(value));
      }
      Resp2Frame::Array(out)
    },
    RedisValue::Array(values) => Resp2Frame::Array(values.into_iter().map(value_to_reply_frame).collect()),
  }
}

/// Parse a `message` or `pmessage` push frame.
pub fn frame_to_pubsub(frame: &Resp2Frame) -> Option<Message> {
  let frames = match frame {
    Resp2Frame::Array(ref frames) => frames,
    _ => return None,
  };
  let kind = frames.first().and_then(frame_to_str)?;

  match (&*kind, frames.len()) {
    ("message", 3) => Some(Message {
      channel: frame_to_str(&frames[1])?,
      pattern: None,
      value:   frame_to_results(frames[2].clone()).ok()?,
    }),
    ("pmessage", 4) => Some(Message {
      pattern: Some(frame_to_str(&frames[1])?),
      channel: frame_to_str(&frames[2])?,
      value:   frame_to_results(frames[3].clone()).ok()?,
    }),
    _ => None,
  }
}

/// Whether the frame is a subscription confirmation such as `["subscribe", "foo", 1]`.
pub fn is_subscription_response(frame: &Resp2Frame) -> bool {
  match frame {
    Resp2Frame::Array(ref frames) if frames.len() == 3 => frames
      .first()
      .and_then(frame_to_str)
      .map(|kind| matches!(&*kind, "subscribe" | "psubscribe" | "unsubscribe" | "punsubscribe"))
      .unwrap_or(false),
    _ => false,
  }
}

pub fn expect_ok(value: &RedisValue) -> Result<(), RedisError> {
  match *value {
    RedisValue::String(ref resp) => {
      if *resp == OK || *resp == QUEUED {
        Ok(())
      } else {
        Err(RedisError::new(
          RedisErrorKind::Unknown,
          format!("Expected OK, found {}", resp),
        ))
      }
    },
    RedisValue::Queued => Ok(()),
    _ => Err(RedisError::new(
      RedisErrorKind::Unknown,
      format!("Expected OK, found {:?}.", value),
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::protocol::command::RedisCommandKind;

  #[test]
  fn should_parse_moved_error() {
    let redirection = parse_redirection("MOVED 3999 127.0.0.1:30002").unwrap();
    assert_eq!(redirection, Redirection::Moved {
      slot:   3999,
      server: Server::new("127.0.0.1", 30002),
    });
  }

  #[test]
  fn should_parse_ask_error() {
    let redirection = parse_redirection("ASK 12182 127.0.0.1:30003").unwrap();
    assert_eq!(redirection.slot(), 12182);
    assert_eq!(redirection.server(), &Server::new("127.0.0.1", 30003));
  }

  #[test]
  fn should_not_parse_other_errors() {
    assert!(parse_redirection("CROSSSLOT Keys in request don't hash to the same slot").is_none());
    assert!(parse_redirection("ERR foo bar").is_none());
  }

  #[test]
  fn should_split_subcommands_when_framing() {
    let command = RedisCommand::new(RedisCommandKind::ConfigGet, vec!["maxmemory".into()]);
    let frame = command_to_frame(&command).unwrap();

    assert_eq!(frame_to_command_parts(&frame).unwrap(), vec![
      Bytes::from_static(b"CONFIG"),
      Bytes::from_static(b"GET"),
      Bytes::from_static(b"maxmemory")
    ]);
  }

  #[test]
  fn should_convert_boolean_replies() {
    assert_eq!(
      ReplyShape::Boolean.convert(Resp2Frame::Integer(1)).unwrap(),
      RedisValue::Boolean(true)
    );
    assert_eq!(ReplyShape::Boolean.convert(ok_frame()).unwrap(), RedisValue::Boolean(true));
    assert_eq!(
      ReplyShape::Boolean.convert(Resp2Frame::Null).unwrap(),
      RedisValue::Boolean(false)
    );
  }

  #[test]
  fn should_use_default_values_for_nil() {
    assert_eq!(
      ReplyShape::Array.convert(Resp2Frame::Null).unwrap(),
      RedisValue::Array(vec![])
    );
    assert!(ReplyShape::Map
      .convert(Resp2Frame::Null)
      .unwrap()
      .into_map()
      .unwrap()
      .is_empty());
    assert_eq!(ReplyShape::Value.convert(Resp2Frame::Null).unwrap(), RedisValue::Null);
  }

  #[test]
  fn should_convert_double_replies() {
    let frame = Resp2Frame::BulkString(Bytes::from_static(b"1.5"));
    assert_eq!(ReplyShape::Double.convert(frame).unwrap(), RedisValue::Double(1.5));
  }

  #[test]
  fn should_return_errors_from_error_frames() {
    let error = ReplyShape::Value
      .convert(Resp2Frame::Error("WRONGTYPE Operation against a key".into()))
      .unwrap_err();
    assert_eq!(error.details(), "WRONGTYPE Operation against a key");
  }

  #[test]
  fn should_parse_pubsub_messages() {
    let frame = Resp2Frame::Array(vec![
      Resp2Frame::BulkString("pmessage".into()),
      Resp2Frame::BulkString("foo*".into()),
      Resp2Frame::BulkString("foobar".into()),
      Resp2Frame::BulkString("baz".into()),
    ]);
    let message = frame_to_pubsub(&frame).unwrap();

    assert_eq!(message.channel, "foobar");
    assert_eq!(message.pattern.as_deref(), Some("foo*"));
    assert_eq!(message.value, RedisValue::from("baz"));
  }
}
