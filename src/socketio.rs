//! Streamlabs socket API client.
//!
//! Streamlabs pushes alerts over socket.io (engine.io protocol 3) on a
//! websocket. Only the parts of the protocol a listening client needs are
//! handled: the open handshake, pings, and `event` frames.

use crate::relay::Inbound;
use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{WebSocketStream, connect_async};

/// Default Streamlabs socket endpoint.
pub const DEFAULT_SOCKET_URL: &str = "https://sockets.streamlabs.com";

/// Ping interval used until the server announces its own.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Name of the socket.io event carrying alerts.
const ALERT_EVENT: &str = "event";

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet type `{0}`")]
    UnknownType(char),

    #[error("malformed packet payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event packet is not a non-empty array with a name")]
    MalformedEvent,
}

/// Handshake data of an engine.io `open` packet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    #[serde(default)]
    pub sid: String,
    /// Milliseconds between client pings.
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

impl OpenInfo {
    pub fn ping_interval(&self) -> Duration {
        match self.ping_interval {
            0 => DEFAULT_PING_INTERVAL,
            ms => Duration::from_millis(ms),
        }
    }
}

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Upgrade,
    Noop,
    /// socket.io namespace connect acknowledgement.
    Connect,
    /// socket.io namespace disconnect.
    Disconnect,
    /// socket.io event: its name and first argument.
    Event { name: String, payload: Value },
    /// socket.io error with its raw payload.
    Error(String),
    /// Acks and binary placeholders, which a listener does not need.
    Ignored,
}

/// Decode an engine.io text frame.
///
/// # Examples
///
/// ```
/// use alertfold::socketio::{Packet, decode_packet};
/// use serde_json::json;
///
/// let packet = decode_packet(r#"42["event",{"type":"bits","message":[]}]"#).unwrap();
/// assert_eq!(
///     packet,
///     Packet::Event {
///         name: "event".into(),
///         payload: json!({"type": "bits", "message": []}),
///     }
/// );
/// ```
pub fn decode_packet(text: &str) -> Result<Packet, PacketError> {
    let kind = text.chars().next().ok_or(PacketError::Empty)?;
    let body = &text[kind.len_utf8()..];

    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(body)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping(body.to_string())),
        '3' => Ok(Packet::Pong(body.to_string())),
        '4' => decode_message(body),
        '5' => Ok(Packet::Upgrade),
        '6' => Ok(Packet::Noop),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn decode_message(body: &str) -> Result<Packet, PacketError> {
    let kind = body.chars().next().ok_or(PacketError::Empty)?;
    let rest = &body[kind.len_utf8()..];

    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(rest),
        '4' => Ok(Packet::Error(rest.to_string())),
        '3' | '5' | '6' => Ok(Packet::Ignored),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn decode_event(rest: &str) -> Result<Packet, PacketError> {
    // Optional "/namespace," prefix, then an optional ack id.
    let rest = match rest.strip_prefix('/') {
        Some(with_nsp) => with_nsp.split_once(',').map_or("", |(_, data)| data),
        None => rest,
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    let args: Vec<Value> = serde_json::from_str(rest)?;
    let mut args = args.into_iter();
    let Some(Value::String(name)) = args.next() else {
        return Err(PacketError::MalformedEvent);
    };

    Ok(Packet::Event {
        name,
        payload: args.next().unwrap_or(Value::Null),
    })
}

/// Connection settings for [`run`].
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Socket server base URL (`https://` or `wss://`).
    pub url: String,
    /// Streamlabs socket API token.
    pub token: String,
    pub base_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        SocketConfig {
            url: url.into(),
            token: token.into(),
            base_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
        }
    }

    /// The websocket URL to dial, with the token and protocol parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use alertfold::socketio::SocketConfig;
    ///
    /// let url = SocketConfig::new("https://sockets.streamlabs.com", "tok").endpoint().unwrap();
    /// assert_eq!(
    ///     url.as_str(),
    ///     "wss://sockets.streamlabs.com/socket.io/?token=tok&EIO=3&transport=websocket"
    /// );
    /// ```
    pub fn endpoint(&self) -> Result<url::Url, url::ParseError> {
        let mut url = url::Url::parse(&self.url)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        // Only fails for cannot-be-a-base URLs, which parse would have
        // produced with a non-http scheme.
        let _ = url.set_scheme(scheme);
        url.set_path("/socket.io/");
        url.query_pairs_mut()
            .clear()
            .append_pair("token", &self.token)
            .append_pair("EIO", "3")
            .append_pair("transport", "websocket");
        Ok(url)
    }
}

enum SessionEnd {
    Shutdown,
    Closed(String),
}

/// Stay connected to the socket server until `shutdown` flips to `true`,
/// forwarding every alert event into `sink`.
///
/// Connection failures and disconnects are logged and retried with
/// exponential back-off. Returns early if the relay stops listening.
pub async fn run(config: SocketConfig, sink: Sender<Inbound>, mut shutdown: watch::Receiver<bool>) {
    let endpoint = match config.endpoint() {
        Ok(url) => url,
        Err(e) => {
            warn!("invalid socket URL {}: {e}", config.url);
            return;
        }
    };
    let mut delay = config.base_reconnect_delay;

    while !*shutdown.borrow() {
        info!("Connecting to Streamlabs...");
        match connect_async(endpoint.as_str()).await {
            Ok((stream, _)) => {
                info!("Connected to Streamlabs");
                delay = config.base_reconnect_delay;
                match drive(stream, &sink, &mut shutdown).await {
                    Ok(SessionEnd::Shutdown) => break,
                    Ok(SessionEnd::Closed(reason)) => {
                        info!("Disconnected from Streamlabs ({reason})")
                    }
                    Err(e) => info!("Disconnected from Streamlabs ({e})"),
                }
            }
            Err(e) => warn!("Connection to Streamlabs failed: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
        delay = (delay * 2).min(config.max_reconnect_delay);
    }
}

async fn drive<S>(
    mut ws: WebSocketStream<S>,
    sink: &Sender<Inbound>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd, tungstenite::Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ping = new_ping_timer(DEFAULT_PING_INTERVAL);

    loop {
        tokio::select! {
            frame = ws.next() => {
                let Some(frame) = frame else {
                    return Ok(SessionEnd::Closed("stream ended".into()));
                };
                match frame? {
                    Message::Text(text) => match decode_packet(text.as_str()) {
                        Ok(Packet::Open(info)) => {
                            debug!("socket session {} opened", info.sid);
                            ping = new_ping_timer(info.ping_interval());
                        }
                        Ok(Packet::Ping(data)) => ws.send(Message::text(format!("3{data}"))).await?,
                        Ok(Packet::Event { name, payload }) if name == ALERT_EVENT => {
                            if !payload.is_object() {
                                debug!("ignoring non-object event payload");
                            } else if sink.send(Inbound::Event(payload)).is_err() {
                                return Ok(SessionEnd::Shutdown);
                            }
                        }
                        Ok(Packet::Close) | Ok(Packet::Disconnect) => {
                            return Ok(SessionEnd::Closed("server closed the session".into()));
                        }
                        Ok(Packet::Error(data)) => warn!("socket error: {data}"),
                        Ok(_) => {}
                        Err(e) => warn!("ignoring frame: {e}"),
                    },
                    Message::Close(frame) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_owned())
                            .unwrap_or_else(|| "closed".into());
                        return Ok(SessionEnd::Closed(reason));
                    }
                    _ => {}
                }
            }
            _ = ping.tick() => ws.send(Message::text("2")).await?,
            _ = shutdown.changed() => {
                let _ = ws.close(None).await;
                return Ok(SessionEnd::Shutdown);
            }
        }
    }
}

fn new_ping_timer(period: Duration) -> tokio::time::Interval {
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}
