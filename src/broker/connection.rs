//! A single TCP session: socket, buffered reader/writer, handshake,
//! keepalive, read loop dispatching to subscriptions, and a write path
//! serialised by a single mutex so a `PUB` header and its payload are never
//! interleaved with another writer.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{ConnectionError, ProtocolError};
use crate::ids::SubscriptionId;
use crate::protocol::codec::{self, Verb};
use crate::protocol::types::{ConnectOpts, ServerInfo};

use super::subscription::{Callback, Message, SubscriptionTable};

/// Lifecycle of one connection. Only `Connected` has a populated
/// subscription table that will actually receive traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    WaitingInfo = 1,
    Handshaking = 2,
    Connected = 3,
    Closing = 4,
    Closed = 5,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Disconnected,
            1 => Self::WaitingInfo,
            2 => Self::Handshaking,
            3 => Self::Connected,
            4 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

struct AtomicState(AtomicU8);

impl AtomicState {
    fn new(s: ConnectionState) -> Self {
        Self(AtomicU8::new(s as u8))
    }
    fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }
    fn set(&self, s: ConnectionState) {
        self.0.store(s as u8, Ordering::SeqCst);
    }
}

/// One TCP session to the broker, plus everything the read loop needs to
/// dispatch `MSG` frames to registered subscriptions.
pub struct Connection {
    write_half: Arc<Mutex<OwnedWriteHalf>>,
    state: Arc<AtomicState>,
    server_info: ServerInfo,
    subscriptions: Arc<SubscriptionTable>,
    read_task: Mutex<Option<JoinHandle<()>>>,
    errors_tx: mpsc::UnboundedSender<ConnectionError>,
}

/// Delivered whenever the connection observes a protocol-level error
/// (`-ERR`) or the read loop terminates.
pub type ErrorReceiver = mpsc::UnboundedReceiver<ConnectionError>;

impl Connection {
    /// Resolve `host`, connect with a timeout, complete the handshake
    /// (accepting a permissive `PING` before `+OK`), and spawn the read
    /// loop. Returns the connection plus a receiver for out-of-band
    /// connection errors observed after the handshake.
    pub async fn open(config: &Config) -> Result<(Self, ErrorReceiver), ConnectionError> {
        let addr = resolve_addr(&config.host, config.port).await?;

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionError::ConnectTimeout(config.connect_timeout))??;
        stream.set_nodelay(true).ok();

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let handshake = tokio::time::timeout(
            config.handshake_timeout,
            Self::handshake(&mut reader, &mut write_half),
        )
        .await
        .map_err(|_| ConnectionError::HandshakeTimeout(config.handshake_timeout))?;
        let server_info = handshake?;

        let write_half = Arc::new(Mutex::new(write_half));
        let subscriptions = Arc::new(SubscriptionTable::new());
        let state = Arc::new(AtomicState::new(ConnectionState::Connected));
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        let read_task = tokio::spawn(read_loop(
            reader,
            write_half.clone(),
            subscriptions.clone(),
            state.clone(),
            errors_tx.clone(),
        ));

        Ok((
            Self {
                write_half,
                state,
                server_info,
                subscriptions,
                read_task: Mutex::new(Some(read_task)),
                errors_tx,
            },
            errors_rx,
        ))
    }

    /// Drive the handshake: await `INFO`, send `CONNECT`, then accept
    /// exactly one of `+OK`, `-ERR`, or a permissive pre-`+OK` `PING`
    /// (replied to with `PONG`, after which the connection is considered
    /// established).
    async fn handshake(
        reader: &mut BufReader<OwnedReadHalf>,
        write_half: &mut OwnedWriteHalf,
    ) -> Result<ServerInfo, ConnectionError> {
        let info_line = read_line(reader).await?;
        let info_line = info_line.ok_or(ConnectionError::Closed)?;
        let info = match codec::classify(&info_line) {
            Verb::Info(args) => codec::parse_info(&args).map_err(ConnectionError::from)?,
            other => {
                return Err(ConnectionError::Protocol(ProtocolError::Malformed(format!(
                    "expected INFO, got {other:?}"
                ))))
            }
        };

        let opts = ConnectOpts::default();
        let connect_line = codec::build_connect(&opts).map_err(ConnectionError::from)?;
        write_half.write_all(connect_line.as_bytes()).await?;
        write_half.flush().await?;

        loop {
            let line = read_line(reader).await?.ok_or(ConnectionError::Closed)?;
            match codec::classify(&line) {
                Verb::Ok => return Ok(info),
                Verb::Err(msg) => {
                    return Err(ConnectionError::Protocol(ProtocolError::ServerError(msg)))
                }
                Verb::Ping => {
                    write_half.write_all(codec::build_pong().as_bytes()).await?;
                    write_half.flush().await?;
                    return Ok(info);
                }
                other => {
                    debug!(?other, "ignoring unexpected line during handshake");
                    continue;
                }
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn require_connected(&self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::Closed)
        }
    }

    /// Validate the subject is non-empty with no whitespace, check the
    /// payload against `server_info.max_payload`, then write the `PUB`
    /// header, payload, and trailing `\r\n` as one uninterrupted write.
    pub async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: &[u8],
    ) -> Result<(), ConnectionError> {
        self.require_connected()?;
        validate_subject(subject)?;
        if let Some(r) = reply {
            validate_subject(r)?;
        }
        if payload.len() > self.server_info.max_payload {
            return Err(ConnectionError::Protocol(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: self.server_info.max_payload,
            }));
        }

        let header = codec::build_pub_header(subject, reply, payload.len());
        let mut w = self.write_half.lock().await;
        w.write_all(header.as_bytes()).await?;
        w.write_all(payload).await?;
        w.write_all(codec::CRLF.as_bytes()).await?;
        w.flush().await?;
        Ok(())
    }

    /// Allocate the next sid, register the callback, flush `SUB` to the
    /// wire, and only then return — so a publish issued right after this
    /// call can rely on the subscription being registered.
    pub async fn subscribe(
        &self,
        subject: &str,
        callback: Callback,
    ) -> Result<SubscriptionId, ConnectionError> {
        self.require_connected()?;
        validate_subject(subject)?;

        let sid = self.subscriptions.alloc_sid();
        self.subscriptions
            .register(sid, subject.to_string(), callback)
            .await;

        let line = codec::build_sub(subject, None, sid);
        let mut w = self.write_half.lock().await;
        w.write_all(line.as_bytes()).await?;
        w.flush().await?;
        drop(w);

        Ok(SubscriptionId::new(sid.to_string()))
    }

    /// Idempotent: an unknown sid is a no-op, matching broker semantics.
    pub async fn unsubscribe(
        &self,
        sid: &SubscriptionId,
        max_msgs: Option<u64>,
    ) -> Result<(), ConnectionError> {
        let sid_num: u64 = sid
            .as_str()
            .parse()
            .map_err(|_| ConnectionError::Io(format!("invalid sid: {sid}")))?;

        self.subscriptions.remove(sid_num).await;

        if self.is_connected() {
            let line = codec::build_unsub(sid_num, max_msgs);
            let mut w = self.write_half.lock().await;
            w.write_all(line.as_bytes()).await?;
            w.flush().await?;
        }
        Ok(())
    }

    /// Idempotent. Cancels the read loop, closes the socket, and
    /// transitions to `Closed`.
    pub async fn close(&self) {
        if matches!(
            self.state(),
            ConnectionState::Closing | ConnectionState::Closed
        ) {
            return;
        }
        self.state.set(ConnectionState::Closing);

        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        let mut w = self.write_half.lock().await;
        let _ = w.shutdown().await;

        self.state.set(ConnectionState::Closed);
        let _ = self.errors_tx.send(ConnectionError::Closed);
    }

    pub(crate) async fn raw_subscribe_count(&self) -> usize {
        self.subscriptions.len().await
    }
}

async fn read_line(
    reader: &mut BufReader<OwnedReadHalf>,
) -> Result<Option<String>, ConnectionError> {
    use tokio::io::AsyncBufReadExt;
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Reads exactly `size` payload bytes (a raw byte count, not a length-tagged
/// value) followed by the trailing `\r\n`, which is read and discarded.
async fn read_exact_payload(
    reader: &mut BufReader<OwnedReadHalf>,
    size: usize,
) -> Result<Vec<u8>, ConnectionError> {
    let mut buf = vec![0u8; size];
    reader.read_exact(&mut buf).await?;
    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await?;
    Ok(buf)
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    write_half: Arc<Mutex<OwnedWriteHalf>>,
    subscriptions: Arc<SubscriptionTable>,
    state: Arc<AtomicState>,
    errors_tx: mpsc::UnboundedSender<ConnectionError>,
) {
    loop {
        let line = match read_line(&mut reader).await {
            Ok(Some(l)) => l,
            Ok(None) => {
                debug!("read loop: EOF, connection closed by peer");
                break;
            }
            Err(e) => {
                warn!(error = %e, "read loop: socket error");
                let _ = errors_tx.send(e);
                break;
            }
        };

        match codec::classify(&line) {
            Verb::Msg(args) => {
                let header = match codec::parse_msg_args(&args) {
                    Ok(h) => h,
                    Err(e) => {
                        warn!(error = %e, line = %line.trim(), "invalid MSG header, skipping");
                        continue;
                    }
                };
                let payload = match read_exact_payload(&mut reader, header.size).await {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "failed reading MSG payload");
                        let _ = errors_tx.send(e);
                        break;
                    }
                };
                let msg = Message {
                    subject: header.subject,
                    sid: SubscriptionId::new(header.sid.to_string()),
                    reply: header.reply,
                    payload,
                };
                trace!(sid = header.sid, "dispatching MSG");
                subscriptions.dispatch(header.sid, msg).await;
            }
            Verb::Ping => {
                let mut w = write_half.lock().await;
                if w.write_all(codec::build_pong().as_bytes()).await.is_err() {
                    break;
                }
                let _ = w.flush().await;
            }
            Verb::Pong => {}
            Verb::Ok => {}
            Verb::Err(msg) => {
                let err = ProtocolError::ServerError(msg);
                warn!(%err, "server -ERR observed");
                let _ = errors_tx.send(ConnectionError::Protocol(err));
            }
            Verb::Info(_) | Verb::ConnectAck => {}
            Verb::Unknown(verb) => {
                let err = ProtocolError::UnknownVerb(verb);
                debug!(%err, "unknown verb, skipping line");
            }
        }
    }

    state.set(ConnectionState::Closed);
    let _ = errors_tx.send(ConnectionError::Closed);
}

fn validate_subject(subject: &str) -> Result<(), ConnectionError> {
    if subject.is_empty() {
        return Err(ConnectionError::InvalidSubject("empty subject".into()));
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(ConnectionError::InvalidSubject(format!(
            "subject {subject:?} contains whitespace"
        )));
    }
    Ok(())
}

async fn resolve_addr(host: &str, port: u16) -> Result<std::net::SocketAddr, ConnectionError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(std::net::SocketAddr::new(ip, port));
    }
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(ConnectionError::from)?;
    addrs
        .next()
        .ok_or_else(|| ConnectionError::Io(format!("no addresses found for host {host:?}")))
}
