use crate::{error::RedisError, types::Server};
use bytes::BytesMut;
use redis_protocol::resp2::{
  decode::decode_mut as resp2_decode,
  encode::encode_bytes as resp2_encode,
  types::Frame as Resp2Frame,
};
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};

#[cfg(feature = "network-logs")]
use std::str;

#[cfg(not(feature = "network-logs"))]
fn log_resp2_frame(_: &str, _: &Resp2Frame, _: bool) {}

#[cfg(feature = "network-logs")]
#[derive(Debug)]
enum DebugFrame {
  String(String),
  Bytes(Vec<u8>),
  Integer(i64),
  Array(Vec<DebugFrame>),
}

#[cfg(feature = "network-logs")]
impl<'a> From<&'a Resp2Frame> for DebugFrame {
  fn from(f: &'a Resp2Frame) -> Self {
    match f {
      Resp2Frame::Error(s) => DebugFrame::String(s.to_string()),
      Resp2Frame::SimpleString(b) | Resp2Frame::BulkString(b) => match str::from_utf8(b) {
        Ok(s) => DebugFrame::String(s.to_owned()),
        Err(_) => DebugFrame::Bytes(b.to_vec()),
      },
      Resp2Frame::Integer(i) => DebugFrame::Integer(*i),
      Resp2Frame::Null => DebugFrame::String("nil".into()),
      Resp2Frame::Array(frames) => DebugFrame::Array(frames.iter().map(|f| f.into()).collect()),
    }
  }
}

#[cfg(feature = "network-logs")]
fn log_resp2_frame(name: &str, frame: &Resp2Frame, encode: bool) {
  let prefix = if encode { "Encoded" } else { "Decoded" };
  trace!("{}: {} {:?}", name, prefix, DebugFrame::from(frame))
}

/// A RESP2 codec for one connection to one server.
pub struct RedisCodec {
  pub name:   Arc<String>,
  pub server: Server,
}

impl RedisCodec {
  pub fn new(name: Arc<String>, server: Server) -> Self {
    RedisCodec { name, server }
  }
}

impl Encoder<Resp2Frame> for RedisCodec {
  type Error = RedisError;

  fn encode(&mut self, item: Resp2Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
    let offset = dst.len();
    let res = resp2_encode(dst, &item)?;
    let len = res.saturating_sub(offset);

    trace!(
      "{}: Encoded {} bytes to {}. Buffer len: {}",
      self.name,
      len,
      self.server,
      res
    );
    log_resp2_frame(&self.name, &item, true);
    Ok(())
  }
}

impl Decoder for RedisCodec {
  type Error = RedisError;
  type Item = Resp2Frame;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    trace!("{}: Recv {} bytes from {}.", self.name, src.len(), self.server);
    if src.is_empty() {
      return Ok(None);
    }

    if let Some((frame, amt, _)) = resp2_decode(src)? {
      trace!("{}: Parsed {} bytes from {}", self.name, amt, self.server);
      log_resp2_frame(&self.name, &frame, false);
      Ok(Some(frame))
    } else {
      Ok(None)
    }
  }
}
