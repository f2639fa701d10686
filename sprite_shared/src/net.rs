//! Publish/subscribe transport.
//!
//! - [`PubSocket`] binds a TCP endpoint and broadcasts every payload to all
//!   connected subscribers. Sends never wait: payloads go into a bounded
//!   broadcast queue, and a per-subscriber task writes them out. A subscriber
//!   that falls behind skips the oldest queued payloads.
//! - [`SubSocket`] connects to a publisher, announces a topic filter, and
//!   buffers received payloads for non-blocking polling.
//!
//! On the wire every payload is one frame: a big-endian `u32` length followed
//! by that many bytes. The first frame a subscriber sends is a JSON
//! [`Subscribe`] handshake; after that traffic is publisher → subscriber only.
//!
//! Delivery is best effort: no acknowledgements, no retries, and payloads
//! published while nobody is subscribed are dropped.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::broadcast::{
        self,
        error::{RecvError, TryRecvError},
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::error::NetError;

/// Handshake protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame either side accepts.
pub const MAX_FRAME_LEN: usize = 1024;

/// Payloads queued per publisher before slow subscribers start skipping.
const PUB_QUEUE_LEN: usize = 16;

/// Payloads buffered on the subscriber side between polls.
const SUB_QUEUE_LEN: usize = 16;

/// How long a new connection has to send its handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// First frame sent by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribe {
    pub protocol: u32,
    /// Prefix filter; empty receives everything.
    pub topic: String,
}

/// Normalizes `tcp://host:port` and `tcp://*:port` endpoints to a socket
/// address string. Plain `host:port` passes through.
pub fn endpoint_addr(endpoint: &str) -> Result<String, NetError> {
    let addr = endpoint.strip_prefix("tcp://").unwrap_or(endpoint);
    if addr.is_empty() || !addr.contains(':') {
        return Err(NetError::InvalidAddr {
            addr: endpoint.to_string(),
        });
    }
    match addr.strip_prefix("*:") {
        Some(port) => Ok(format!("0.0.0.0:{port}")),
        None => Ok(addr.to_string()),
    }
}

/// The part of `payload` after its topic, if it is addressed to `topic`.
///
/// A payload is addressed to a topic when it starts with the topic followed
/// by a space, or is exactly the topic. The empty topic matches everything.
pub fn topic_body<'a>(payload: &'a [u8], topic: &str) -> Option<&'a [u8]> {
    if topic.is_empty() {
        return Some(payload);
    }
    let rest = payload.strip_prefix(topic.as_bytes())?;
    match rest.split_first() {
        None => Some(rest),
        Some((b' ', body)) => Some(body),
        Some(_) => None,
    }
}

/// Length-prefixed frames over a TCP stream.
#[derive(Debug)]
pub struct FrameConn {
    stream: TcpStream,
}

impl FrameConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result<(), NetError> {
        if payload.len() > MAX_FRAME_LEN {
            return Err(NetError::FrameTooLarge {
                len: payload.len(),
                max: MAX_FRAME_LEN,
            });
        }
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(payload);
        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Reads one frame. `Ok(None)` means the peer closed the connection
    /// between frames.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, NetError> {
        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(NetError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        let mut payload = BytesMut::zeroed(len);
        self.stream.read_exact(&mut payload).await?;
        Ok(Some(payload.freeze()))
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.stream.peer_addr()?)
    }
}

/// Publishing end of a channel.
pub struct PubSocket {
    tx: broadcast::Sender<Bytes>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

impl PubSocket {
    /// Binds `endpoint` and starts accepting subscribers.
    pub async fn bind(endpoint: &str) -> Result<Self, NetError> {
        let addr = endpoint_addr(endpoint)?;
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| NetError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let (tx, _) = broadcast::channel(PUB_QUEUE_LEN);
        let accept_task = tokio::spawn(accept_loop(listener, tx.clone()));
        info!(%local_addr, "Publisher bound");
        Ok(Self {
            tx,
            local_addr: Some(local_addr),
            accept_task: Some(accept_task),
        })
    }

    /// A publisher with no network endpoint; only
    /// [`subscribe_local`](Self::subscribe_local) subscribers receive.
    pub fn in_process() -> Self {
        let (tx, _) = broadcast::channel(PUB_QUEUE_LEN);
        Self {
            tx,
            local_addr: None,
            accept_task: None,
        }
    }

    /// Subscribes within this process, bypassing TCP.
    pub fn subscribe_local(&self, topic: &str) -> SubSocket {
        SubSocket {
            rx: self.tx.subscribe(),
            topic: topic.to_string(),
            reader_task: None,
            skipped: 0,
        }
    }

    /// Queues `payload` for every current subscriber and returns how many
    /// there are. Zero means the payload was dropped.
    pub fn send(&self, payload: Bytes) -> usize {
        self.tx.send(payload).unwrap_or(0)
    }

    /// Subscribers currently attached, including ones still handshaking.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for PubSocket {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, tx: broadcast::Sender<Bytes>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(%peer, error = %e, "set_nodelay failed");
                }
                // Subscribe before the handshake so the connection counts as
                // a peer immediately.
                let rx = tx.subscribe();
                tokio::spawn(serve_subscriber(FrameConn::new(stream), peer, rx));
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

async fn read_handshake(conn: &mut FrameConn) -> Result<Subscribe, NetError> {
    let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv())
        .await
        .map_err(|_| NetError::Handshake("timed out".to_string()))??
        .ok_or_else(|| NetError::Handshake("closed before handshake".to_string()))?;
    let hello: Subscribe =
        serde_json::from_slice(&frame).map_err(|e| NetError::Handshake(e.to_string()))?;
    if hello.protocol != PROTOCOL_VERSION {
        return Err(NetError::Handshake(format!(
            "protocol {} != {}",
            hello.protocol, PROTOCOL_VERSION
        )));
    }
    Ok(hello)
}

async fn serve_subscriber(
    mut conn: FrameConn,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<Bytes>,
) {
    let topic = match read_handshake(&mut conn).await {
        Ok(hello) => hello.topic,
        Err(e) => {
            warn!(%peer, error = %e, "Rejected subscriber");
            return;
        }
    };
    info!(%peer, topic = %topic, "Subscriber connected");

    loop {
        match rx.recv().await {
            Ok(payload) => {
                if topic_body(&payload, &topic).is_none() {
                    continue;
                }
                if payload.len() > MAX_FRAME_LEN {
                    warn!(%peer, len = payload.len(), max = MAX_FRAME_LEN, "Payload too large for a frame, not sent");
                    continue;
                }
                if let Err(e) = conn.send(&payload).await {
                    info!(%peer, error = %e, "Subscriber disconnected");
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(%peer, skipped, "Subscriber behind, dropped stale payloads");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Result of one non-blocking poll of a [`SubSocket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    Payload(Bytes),
    Empty,
    /// The publisher is gone and the buffer is drained.
    Closed,
}

/// Subscribing end of a channel.
pub struct SubSocket {
    rx: broadcast::Receiver<Bytes>,
    topic: String,
    reader_task: Option<JoinHandle<()>>,
    skipped: u64,
}

impl SubSocket {
    /// Connects to the publisher at `endpoint` and subscribes to `topic`.
    pub async fn connect(endpoint: &str, topic: &str) -> Result<Self, NetError> {
        let addr = endpoint_addr(endpoint)?;
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| NetError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let mut conn = FrameConn::new(stream);

        let hello = serde_json::to_vec(&Subscribe {
            protocol: PROTOCOL_VERSION,
            topic: topic.to_string(),
        })
        .map_err(|e| NetError::Handshake(e.to_string()))?;
        conn.send(&hello).await?;

        let peer = conn.peer_addr()?;
        let (tx, rx) = broadcast::channel(SUB_QUEUE_LEN);
        let reader_task = tokio::spawn(read_loop(conn, peer, tx));
        info!(%peer, topic = %topic, "Subscriber connected");

        Ok(Self {
            rx,
            topic: topic.to_string(),
            reader_task: Some(reader_task),
            skipped: 0,
        })
    }

    /// Returns the oldest buffered payload matching the topic, if any.
    pub fn try_recv(&mut self) -> Recv {
        loop {
            match self.rx.try_recv() {
                Ok(payload) if topic_body(&payload, &self.topic).is_some() => {
                    return Recv::Payload(payload)
                }
                Ok(_) => continue,
                Err(TryRecvError::Lagged(n)) => self.skipped += n,
                Err(TryRecvError::Empty) => return Recv::Empty,
                Err(TryRecvError::Closed) => return Recv::Closed,
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payloads overwritten in the local buffer before they were polled.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Drop for SubSocket {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

async fn read_loop(mut conn: FrameConn, peer: SocketAddr, tx: broadcast::Sender<Bytes>) {
    loop {
        match conn.recv().await {
            Ok(Some(payload)) => {
                // Fails only if the SubSocket is gone; the task is about to be
                // aborted in that case.
                let _ = tx.send(payload);
            }
            Ok(None) => {
                info!(%peer, "Publisher closed connection");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "Subscriber connection failed");
                break;
            }
        }
    }
}
