//! A single socket from upgrade to close.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parley_core::protocol::{OutboundFrame, close_code};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::manager::Inner;

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionEnd {
    pub code: u16,
    pub reason: String,
}

impl SessionEnd {
    fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: close_code::ABNORMAL,
            reason: reason.into(),
        }
    }

    fn from_close_frame(frame: Option<CloseFrame>) -> Self {
        match frame {
            Some(frame) => Self {
                code: u16::from(frame.code),
                reason: frame.reason.as_str().to_owned(),
            },
            None => Self {
                code: close_code::NO_STATUS,
                reason: String::new(),
            },
        }
    }
}

/// Open a socket to `url`, attaching a bearer token when present.
pub(crate) async fn open(url: &str, auth_token: Option<&str>) -> Result<Socket, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    if let Some(token) = auth_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let _ = request.headers_mut().insert(AUTHORIZATION, value);
    }

    match connect_async(request).await {
        Ok((socket, _response)) => Ok(socket),
        Err(tungstenite::Error::Http(response))
            if matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) =>
        {
            Err(TransportError::Unauthorized(response.status().to_string()))
        }
        Err(e) => Err(TransportError::Open {
            url: url.to_owned(),
            reason: e.to_string(),
        }),
    }
}

/// Drive an open socket until it closes or `cancel` fires.
///
/// Outbound frames come from `outbound`; a `ping` frame is written every
/// `heartbeat`. Inbound text is handed to the manager for decoding.
pub(crate) async fn run(
    socket: Socket,
    inner: &Inner,
    generation: u64,
    outbound: &mut mpsc::Receiver<Message>,
    cancel: &CancellationToken,
    heartbeat: Duration,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = time::interval_at(Instant::now() + heartbeat, heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ping = serde_json::to_string(&OutboundFrame::Ping).unwrap_or_default();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: Utf8Bytes::from_static("manual disconnect"),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                let _ = sink.close().await;
                return SessionEnd {
                    code: close_code::NORMAL,
                    reason: "manual disconnect".into(),
                };
            }

            Some(frame) = outbound.recv() => {
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "socket write failed");
                    inner.report_send_failure(generation, &e.to_string());
                    return SessionEnd::abnormal(e.to_string());
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = sink.send(Message::Text(ping.clone().into())).await {
                    return SessionEnd::abnormal(e.to_string());
                }
                trace!("heartbeat ping sent");
            }

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => inner.handle_text(generation, text.as_str()),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => inner.handle_text(generation, text),
                    Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => return SessionEnd::from_close_frame(frame),
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::abnormal(e.to_string()),
                None => return SessionEnd::abnormal("stream ended"),
            },
        }
    }
}
