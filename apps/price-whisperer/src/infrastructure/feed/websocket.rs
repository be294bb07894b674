//! WebSocket Tick Source
//!
//! Connects to a tick feed over WebSocket, sends one subscribe request and
//! turns the incoming frames into a [`TickStream`].
//!
//! # Protocol
//!
//! 1. Connect to the configured `ws://` or `wss://` URL
//! 2. Send `{"action":"subscribe","chain":...,"token_address":...}`
//! 3. Receive JSON tick messages (see [`super::codec`])
//! 4. Answer pings with pongs
//!
//! A close frame ends the stream. Reconnecting is left to the caller.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::codec::{FeedMessage, TickCodec};
use crate::application::ports::{FeedError, RawTick, TickSource, TickStream};
use crate::domain::pricing::Instrument;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Tick source backed by a WebSocket feed.
#[derive(Debug, Clone)]
pub struct WebSocketTickSource {
    url: String,
    codec: TickCodec,
}

impl WebSocketTickSource {
    /// Create a source for the given feed URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            codec: TickCodec::new(),
        }
    }

    /// The feed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TickSource for WebSocketTickSource {
    async fn subscribe(&self, instrument: &Instrument) -> Result<TickStream, FeedError> {
        tracing::info!(url = %self.url, instrument = %instrument, "Connecting to tick feed");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;

        let (mut write, read) = ws_stream.split();

        let request = self.codec.encode_subscribe(instrument)?;
        write
            .send(Message::Text(request.into()))
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;

        tracing::debug!(instrument = %instrument, "Subscribe request sent");

        let connection = FeedConnection {
            write,
            read,
            codec: self.codec,
            pending: VecDeque::new(),
            done: false,
        };

        Ok(stream::unfold(connection, FeedConnection::next_tick).boxed())
    }
}

/// One open feed connection, owned by the tick stream.
struct FeedConnection {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    codec: TickCodec,
    pending: VecDeque<Result<RawTick, FeedError>>,
    done: bool,
}

impl FeedConnection {
    async fn next_tick(mut self) -> Option<(Result<RawTick, FeedError>, Self)> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some((item, self));
            }
            if self.done {
                return None;
            }

            match self.read.next().await {
                Some(Ok(Message::Text(text))) => self.handle_text(&text),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.handle_text(text),
                    Err(e) => self.fail(FeedError::Decode(e.to_string())),
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = self.write.send(Message::Pong(payload)).await {
                        self.fail(FeedError::Transport(e.to_string()));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Tick feed closed by server");
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => self.fail(FeedError::Transport(e.to_string())),
                None => {
                    tracing::info!("Tick feed connection ended");
                    return None;
                }
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode tick feed message");
                self.fail(e.into());
                return;
            }
        };

        for message in messages {
            match message {
                FeedMessage::Tick(tick) => self.pending.push_back(Ok(tick)),
                FeedMessage::Error(message) => {
                    self.fail(FeedError::Upstream(message));
                    return;
                }
                FeedMessage::Other => tracing::trace!("Ignoring non-tick feed message"),
            }
        }
    }

    /// Queue a terminal error behind any ticks already decoded.
    fn fail(&mut self, error: FeedError) {
        self.pending.push_back(Err(error));
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;

    async fn serve(frames: Vec<Message>) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();

            let subscribe = match ws.next().await {
                Some(Ok(Message::Text(text))) => text.to_string(),
                other => panic!("expected subscribe request, got {other:?}"),
            };

            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            // Drain until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
            subscribe
        });

        (format!("ws://{addr}"), server)
    }

    fn instrument() -> Instrument {
        Instrument::new("ethereum", "0xabc")
    }

    #[tokio::test]
    async fn streams_ticks_until_close() {
        let (url, server) = serve(vec![
            Message::Text(r#"{"type":"subscribed"}"#.into()),
            Message::Text(
                r#"[{"price":{"amount":"100.00"}},{"price":{"amount":"101.50"}}]"#.into(),
            ),
            Message::Ping(vec![1, 2, 3].into()),
            Message::Text(r#"{"price":{"amount":"99.25"}}"#.into()),
            Message::Close(None),
        ])
        .await;

        let source = WebSocketTickSource::new(url);
        let ticks: Vec<_> = source
            .subscribe(&instrument())
            .await
            .unwrap()
            .collect()
            .await;

        let amounts: Vec<_> = ticks
            .into_iter()
            .map(|t| t.unwrap().price.amount)
            .collect();
        assert_eq!(amounts, vec!["100.00", "101.50", "99.25"]);

        let subscribe: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(subscribe["action"], "subscribe");
        assert_eq!(subscribe["token_address"], "0xabc");
    }

    #[tokio::test]
    async fn upstream_error_ends_stream() {
        let (url, _server) = serve(vec![
            Message::Text(r#"[{"price":{"amount":"1"}},{"error":"token not found"}]"#.into()),
            Message::Text(r#"{"price":{"amount":"2"}}"#.into()),
        ])
        .await;

        let mut stream = WebSocketTickSource::new(url)
            .subscribe(&instrument())
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap().price.amount, "1");
        assert_eq!(
            stream.next().await.unwrap().unwrap_err(),
            FeedError::Upstream("token not found".into())
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn undecodable_frame_is_a_decode_error() {
        let (url, _server) = serve(vec![Message::Text("not json".into())]).await;

        let mut stream = WebSocketTickSource::new(url)
            .subscribe(&instrument())
            .await
            .unwrap();

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn connection_refused_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WebSocketTickSource::new(format!("ws://{addr}"))
            .subscribe(&instrument())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "connect");
    }
}
