use crate::{
  driver::{handshake, ConnectOptions, Driver, DriverConnection, ResponseFuture},
  error::{RedisError, RedisErrorKind},
  protocol::{codec::RedisCodec, command::RedisCommand, utils as protocol_utils},
  types::*,
  utils,
};
use async_trait::async_trait;
use futures::{
  stream::{SplitSink, SplitStream},
  SinkExt,
  StreamExt,
};
use parking_lot::Mutex;
use socket2::SockRef;
use std::{
  collections::VecDeque,
  fmt,
  sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};
use tokio::{
  io::{AsyncRead, AsyncWrite},
  net::TcpStream,
  sync::{broadcast, mpsc, oneshot},
  task::JoinHandle,
};
use tokio_util::codec::Framed;

#[cfg(feature = "enable-native-tls")]
use tokio_native_tls::{native_tls::TlsConnector as NativeTlsConnector, TlsConnector};

/// The number of pubsub messages buffered per receiver before older messages are dropped.
const MESSAGE_CAPACITY: usize = 1024;

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type Transport = Framed<Box<dyn AsyncStream>, RedisCodec>;

enum WriterMessage {
  Frame { frame: Resp2Frame, flush: bool },
  Flush,
  Close,
}

struct Responder {
  tx:       oneshot::Sender<Result<Resp2Frame, RedisError>>,
  /// The number of frames that make up the reply. Subscriptions receive one confirmation per channel.
  expected: usize,
  buffer:   Vec<Resp2Frame>,
}

type Responders = Arc<Mutex<VecDeque<Responder>>>;

fn cancel_responders(responders: &Responders, reason: &str) {
  for responder in responders.lock().drain(..) {
    let _ = responder
      .tx
      .send(Err(RedisError::new(RedisErrorKind::Canceled, reason.to_owned())));
  }
}

/// The driver that dials servers over TCP, optionally with TLS.
#[derive(Debug, Default)]
pub struct TcpDriver {
  next_id: AtomicU64,
  open:    Arc<AtomicUsize>,
}

impl TcpDriver {
  pub fn new() -> Self {
    Self::default()
  }
}

async fn connect_tcp(options: &ConnectOptions) -> Result<TcpStream, RedisError> {
  let server = &options.server;
  let addr = tokio::net::lookup_host((&*server.host, server.port))
    .await?
    .next()
    .ok_or_else(|| RedisError::new(RedisErrorKind::IO, format!("Failed to resolve {}", server)))?;

  debug!("Creating TCP connection to {} at {}", server, addr);
  let socket = utils::apply_timeout(TcpStream::connect(addr), options.connect_timeout).await?;
  socket.set_nodelay(true)?;
  SockRef::from(&socket).set_keepalive(true)?;
  Ok(socket)
}

#[cfg(feature = "enable-native-tls")]
async fn wrap_tls(
  socket: TcpStream,
  server: &Server,
  tls: &TlsConfig,
) -> Result<Box<dyn AsyncStream>, RedisError> {
  let mut builder = NativeTlsConnector::builder();
  if !tls.verify_peer {
    builder.danger_accept_invalid_certs(true);
    builder.danger_accept_invalid_hostnames(true);
  }
  let connector = TlsConnector::from(builder.build()?);

  debug!("Starting TLS handshake with {}", server);
  let stream = connector.connect(&server.host, socket).await?;
  Ok(Box::new(stream))
}

#[cfg(not(feature = "enable-native-tls"))]
async fn wrap_tls(_: TcpStream, _: &Server, _: &TlsConfig) -> Result<Box<dyn AsyncStream>, RedisError> {
  Err(RedisError::new(
    RedisErrorKind::Config,
    "TLS connections require the `enable-native-tls` feature.",
  ))
}

#[async_trait]
impl Driver for TcpDriver {
  async fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn DriverConnection>, RedisError> {
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    let socket = connect_tcp(options).await?;
    let stream: Box<dyn AsyncStream> = match options.tls {
      Some(ref tls) => wrap_tls(socket, &options.server, tls).await?,
      None => Box::new(socket),
    };
    let name = Arc::new(format!("{}-{}", options.server, id));
    let transport = Framed::new(stream, RedisCodec::new(name.clone(), options.server.clone()));

    let connection = TcpConnection::spawn(id, name, options, transport, self.open.clone());
    if let Err(e) = handshake(&connection, options).await {
      connection.close().await;
      return Err(e);
    }

    Ok(Arc::new(connection))
  }

  async fn shutdown(&self, quiet_period: Duration, timeout: Duration) -> Result<(), RedisError> {
    let wait = quiet_period.min(timeout);
    let started = tokio::time::Instant::now();

    while self.open.load(Ordering::SeqCst) > 0 && started.elapsed() < wait {
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let remaining = self.open.load(Ordering::SeqCst);
    if remaining > 0 {
      warn!("Shutting down TCP driver with {} open connection(s).", remaining);
    }
    Ok(())
  }
}

/// A connection to one server, with separate reader and writer tasks.
pub struct TcpConnection {
  id:         u64,
  name:       Arc<String>,
  server:     Server,
  writer:     mpsc::UnboundedSender<WriterMessage>,
  responders: Responders,
  auto_flush: AtomicBool,
  open:       Arc<AtomicBool>,
  multi:      AtomicBool,
  messages:   Option<broadcast::Sender<Message>>,
  reader:     Mutex<Option<JoinHandle<()>>>,
  counter:    Arc<AtomicUsize>,
  registered: AtomicBool,
}

impl fmt::Debug for TcpConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TcpConnection")
      .field("id", &self.id)
      .field("server", &self.server)
      .field("open", &self.open.load(Ordering::SeqCst))
      .finish()
  }
}

impl TcpConnection {
  fn spawn(
    id: u64,
    name: Arc<String>,
    options: &ConnectOptions,
    transport: Transport,
    counter: Arc<AtomicUsize>,
  ) -> Self {
    let (sink, stream) = transport.split();
    let (writer, rx) = mpsc::unbounded_channel();
    let responders: Responders = Arc::new(Mutex::new(VecDeque::new()));
    let open = Arc::new(AtomicBool::new(true));
    let messages = if options.pubsub {
      Some(broadcast::channel(MESSAGE_CAPACITY).0)
    } else {
      None
    };
    counter.fetch_add(1, Ordering::SeqCst);

    // the writer task exits on its own once it receives `Close` or the sender is dropped
    let _ = tokio::spawn(write_frames(
      name.clone(),
      sink,
      rx,
      responders.clone(),
      open.clone(),
    ));
    let reader_task = tokio::spawn(read_frames(
      name.clone(),
      stream,
      responders.clone(),
      messages.clone(),
      open.clone(),
    ));

    TcpConnection {
      id,
      name,
      writer,
      responders,
      open,
      messages,
      counter,
      server: options.server.clone(),
      auto_flush: AtomicBool::new(true),
      multi: AtomicBool::new(false),
      reader: Mutex::new(Some(reader_task)),
      registered: AtomicBool::new(true),
    }
  }

  fn unregister(&self) {
    if self.registered.swap(false, Ordering::SeqCst) {
      self.counter.fetch_sub(1, Ordering::SeqCst);
    }
  }
}

async fn write_frames(
  name: Arc<String>,
  mut sink: SplitSink<Transport, Resp2Frame>,
  mut rx: mpsc::UnboundedReceiver<WriterMessage>,
  responders: Responders,
  open: Arc<AtomicBool>,
) {
  while let Some(message) = rx.recv().await {
    let result = match message {
      WriterMessage::Frame { frame, flush: true } => sink.send(frame).await,
      WriterMessage::Frame { frame, flush: false } => sink.feed(frame).await,
      WriterMessage::Flush => sink.flush().await,
      WriterMessage::Close => {
        let _ = sink.close().await;
        break;
      },
    };

    if let Err(e) = result {
      warn!("{}: Error writing to socket: {:?}", name, e);
      open.store(false, Ordering::SeqCst);
      cancel_responders(&responders, "Failed to write to the connection.");
      break;
    }
  }
  trace!("{}: Ending writer task.", name);
}

async fn read_frames(
  name: Arc<String>,
  mut stream: SplitStream<Transport>,
  responders: Responders,
  messages: Option<broadcast::Sender<Message>>,
  open: Arc<AtomicBool>,
) {
  while let Some(result) = stream.next().await {
    let frame = match result {
      Ok(frame) => frame,
      Err(e) => {
        warn!("{}: Error reading from socket: {:?}", name, e);
        break;
      },
    };

    if let Some(ref tx) = messages {
      if let Some(message) = protocol_utils::frame_to_pubsub(&frame) {
        trace!("{}: Received message on {}", name, message.channel);
        let _ = tx.send(message);
        continue;
      }
    }

    let mut guard = responders.lock();
    let finished = match guard.front_mut() {
      Some(responder) => {
        responder.buffer.push(frame);
        responder.buffer.len() >= responder.expected
      },
      None => {
        warn!("{}: Dropping unexpected frame.", name);
        false
      },
    };
    if finished {
      if let Some(mut responder) = guard.pop_front() {
        let frame = if responder.expected == 1 {
          responder.buffer.pop().unwrap_or(Resp2Frame::Null)
        } else {
          Resp2Frame::Array(responder.buffer)
        };
        let _ = responder.tx.send(Ok(frame));
      }
    }
  }

  debug!("{}: Connection closed.", name);
  open.store(false, Ordering::SeqCst);
  cancel_responders(&responders, "Connection closed.");
}

#[async_trait]
impl DriverConnection for TcpConnection {
  fn id(&self) -> u64 {
    self.id
  }

  fn server(&self) -> &Server {
    &self.server
  }

  fn dispatch(&self, command: RedisCommand) -> ResponseFuture {
    let frame = match command.to_frame() {
      Ok(frame) => frame,
      Err(e) => return Box::pin(async move { Err(e) }),
    };
    if !self.is_open() {
      return Box::pin(async move {
        Err(RedisError::new(RedisErrorKind::Canceled, "Connection closed."))
      });
    }

    if command.kind.is_multi() {
      self.multi.store(true, Ordering::SeqCst);
    } else if command.kind.ends_transaction() {
      self.multi.store(false, Ordering::SeqCst);
    }
    let expected = if command.kind.is_subscribe() || command.kind.is_unsubscribe() {
      command.args.len().max(1)
    } else {
      1
    };
    trace!("{}: Sending {}", self.name, command.cmd_str());

    let (tx, rx) = oneshot::channel();
    {
      // the responder queue lock is held while writing so replies line up with the write order
      let mut responders = self.responders.lock();
      responders.push_back(Responder {
        tx,
        expected,
        buffer: Vec::with_capacity(expected),
      });

      let flush = self.auto_flush.load(Ordering::SeqCst);
      if self.writer.send(WriterMessage::Frame { frame, flush }).is_err() {
        let _ = responders.pop_back();
        return Box::pin(async move {
          Err(RedisError::new(RedisErrorKind::Canceled, "Connection closed."))
        });
      }
    }

    Box::pin(async move { rx.await? })
  }

  fn set_auto_flush(&self, enabled: bool) {
    self.auto_flush.store(enabled, Ordering::SeqCst);
  }

  fn flush(&self) {
    let _ = self.writer.send(WriterMessage::Flush);
  }

  fn is_open(&self) -> bool {
    self.open.load(Ordering::SeqCst)
  }

  fn is_multi(&self) -> bool {
    self.multi.load(Ordering::SeqCst)
  }

  fn messages(&self) -> Option<broadcast::Receiver<Message>> {
    self.messages.as_ref().map(|tx| tx.subscribe())
  }

  async fn close(&self) {
    if self.open.swap(false, Ordering::SeqCst) {
      debug!("{}: Closing connection.", self.name);
    }

    let _ = self.writer.send(WriterMessage::Close);
    if let Some(reader) = self.reader.lock().take() {
      reader.abort();
    }
    cancel_responders(&self.responders, "Connection closed.");
    self.unregister();
  }
}

impl Drop for TcpConnection {
  fn drop(&mut self) {
    if let Some(reader) = self.reader.lock().take() {
      reader.abort();
    }
    self.unregister();
  }
}
