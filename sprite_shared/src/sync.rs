//! Position sync channel.
//!
//! A [`SyncChannel`] is either a publisher or a subscriber for its whole
//! life. The control loop calls [`SyncChannel::tick`] once per frame:
//!
//! - Publisher: encodes the local [`SyncSnapshot`] and broadcasts it. Never
//!   waits for subscribers; with none attached the message is dropped.
//! - Subscriber: drains everything received since the last tick and applies
//!   only the newest message. Nothing pending, a malformed message, or a lost
//!   publisher all leave the snapshot untouched.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::SyncConfig;
use crate::error::NetError;
use crate::net::{topic_body, PubSocket, Recv, SubSocket, MAX_FRAME_LEN};
use crate::wire::{SyncSnapshot, WireFormat};

/// Channel role, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Publisher,
    #[default]
    Subscriber,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publisher" | "pub" | "server" => Ok(Role::Publisher),
            "subscriber" | "sub" | "client" => Ok(Role::Subscriber),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Publisher => f.write_str("publisher"),
            Role::Subscriber => f.write_str("subscriber"),
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Publisher queued the snapshot for `peers` subscribers.
    Sent { peers: usize },
    /// Publisher had no subscribers; the snapshot was dropped.
    NoPeers,
    /// Publisher could not encode the snapshot.
    Skipped,
    /// Subscriber applied the newest message, ignoring `discarded` older ones.
    Applied { discarded: usize },
    /// Subscriber had nothing pending.
    Idle,
    /// Subscriber's newest message did not decode.
    Malformed,
    /// Subscriber lost its publisher.
    Disconnected,
}

enum Endpoint {
    Publisher(PubSocket),
    Subscriber(SubSocket),
}

pub struct SyncChannel {
    endpoint: Endpoint,
    format: WireFormat,
    topic: String,
    disconnect_reported: bool,
}

impl SyncChannel {
    /// Binds (publisher) or connects (subscriber) using `cfg`.
    pub async fn open(role: Role, cfg: &SyncConfig) -> Result<Self, NetError> {
        match role {
            Role::Publisher => {
                let socket = PubSocket::bind(&cfg.endpoint).await?;
                Ok(Self::publisher(socket, cfg.wire.clone(), &cfg.topic))
            }
            Role::Subscriber => {
                let socket = SubSocket::connect(&cfg.endpoint, &cfg.topic).await?;
                Ok(Self::subscriber(socket, cfg.wire.clone()))
            }
        }
    }

    /// Publishes on `socket`. A non-empty `topic` prefixes every message.
    pub fn publisher(socket: PubSocket, format: WireFormat, topic: &str) -> Self {
        Self {
            endpoint: Endpoint::Publisher(socket),
            format,
            topic: topic.to_string(),
            disconnect_reported: false,
        }
    }

    /// Applies messages from `socket`, stripping its topic prefix.
    pub fn subscriber(socket: SubSocket, format: WireFormat) -> Self {
        let topic = socket.topic().to_string();
        Self {
            endpoint: Endpoint::Subscriber(socket),
            format,
            topic,
            disconnect_reported: false,
        }
    }

    pub fn role(&self) -> Role {
        match self.endpoint {
            Endpoint::Publisher(_) => Role::Publisher,
            Endpoint::Subscriber(_) => Role::Subscriber,
        }
    }

    pub fn format(&self) -> &WireFormat {
        &self.format
    }

    /// The publisher socket, if this is a publisher.
    pub fn pub_socket(&self) -> Option<&PubSocket> {
        match &self.endpoint {
            Endpoint::Publisher(socket) => Some(socket),
            Endpoint::Subscriber(_) => None,
        }
    }

    /// Runs one sync step against `snapshot`. Never blocks.
    pub fn tick(&mut self, snapshot: &mut SyncSnapshot) -> TickOutcome {
        match &mut self.endpoint {
            Endpoint::Publisher(socket) => {
                publish(socket, &self.format, &self.topic, snapshot)
            }
            Endpoint::Subscriber(socket) => {
                let outcome = apply_latest(socket, &self.format, &self.topic, snapshot);
                if outcome == TickOutcome::Disconnected && !self.disconnect_reported {
                    warn!("Publisher connection lost, holding last known positions");
                    self.disconnect_reported = true;
                }
                outcome
            }
        }
    }
}

fn publish(
    socket: &PubSocket,
    format: &WireFormat,
    topic: &str,
    snapshot: &SyncSnapshot,
) -> TickOutcome {
    let message = match format.encode(snapshot) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, ?snapshot, "Snapshot not sent");
            return TickOutcome::Skipped;
        }
    };
    let payload = if topic.is_empty() {
        Bytes::from(message)
    } else {
        Bytes::from(format!("{topic} {message}"))
    };
    if payload.len() > MAX_FRAME_LEN {
        warn!(len = payload.len(), max = MAX_FRAME_LEN, "Sync message too large for a frame, not sent");
        return TickOutcome::Skipped;
    }

    match socket.send(payload) {
        0 => {
            debug!("No subscribers, snapshot dropped");
            TickOutcome::NoPeers
        }
        peers => {
            trace!(peers, "Snapshot published");
            TickOutcome::Sent { peers }
        }
    }
}

fn apply_latest(
    socket: &mut SubSocket,
    format: &WireFormat,
    topic: &str,
    snapshot: &mut SyncSnapshot,
) -> TickOutcome {
    let mut latest = None;
    let mut received = 0usize;
    let mut closed = false;
    loop {
        match socket.try_recv() {
            Recv::Payload(payload) => {
                received += 1;
                latest = Some(payload);
            }
            Recv::Empty => break,
            Recv::Closed => {
                closed = true;
                break;
            }
        }
    }

    let Some(payload) = latest else {
        return if closed {
            TickOutcome::Disconnected
        } else {
            TickOutcome::Idle
        };
    };

    let Some(body) = topic_body(&payload, topic) else {
        warn!(topic, "Discarding sync message for another topic");
        return TickOutcome::Malformed;
    };
    match format.decode_bytes(body) {
        Ok(decoded) => {
            *snapshot = decoded;
            trace!(discarded = received - 1, ?decoded, "Snapshot applied");
            TickOutcome::Applied {
                discarded: received - 1,
            }
        }
        Err(e) => {
            warn!(error = %e, "Discarding malformed sync message");
            TickOutcome::Malformed
        }
    }
}
