//! [`Transport`] over an upgraded axum WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use super::{Payload, Transport, TransportError, TransportReader, TransportWriter};

pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

pub struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
}

impl Transport for WebSocket {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (WsReader, WsWriter) {
        let (sink, stream) = StreamExt::split(self);
        (WsReader { stream }, WsWriter { sink })
    }
}

#[async_trait]
impl TransportReader for WsReader {
    async fn recv(&mut self) -> Result<Option<Payload>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Payload::Text(text))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(Payload::Binary(data))),
                // axum answers pings itself.
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => return Err(TransportError::Read(e.into())),
            }
        }
    }
}

#[async_trait]
impl TransportWriter for WsWriter {
    async fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        let msg = match payload {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(data) => Message::Binary(data),
        };
        self.sink
            .send(msg)
            .await
            .map_err(|e| TransportError::Write(e.into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let notified = self
            .sink
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::Write(e.into()));
        let _ = self.sink.close().await;
        notified
    }
}
